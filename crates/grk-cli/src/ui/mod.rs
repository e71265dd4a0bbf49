//! # CLI UI Module
//!
//! Styling and formatting layer for `grk` output.
//!
//! Human output uses prefixed status lines (`[ok]`, `[err]`, ...), section
//! headers and borderless tables. Every command also accepts `--json`, which
//! bypasses this module entirely.
//!
//! ## Module Structure
//!
//! - `color`: Color mode detection and terminal capability checks
//! - `style`: Message types, prefixes, and styling functions
//! - `format`: Utility formatters (bytes, time, truncation)
//! - `table`: Table rendering with comfy-table
//! - `progress`: Spinner for builds and model calls

pub mod color;
pub mod format;
pub mod progress;
pub mod style;
pub mod table;

pub use color::ColorMode;
pub use progress::{Progress, ProgressMode};
pub use style::{MessageType, Style};
