//! # grk CLI
//!
//! Command-line interface for the Grounded Retrieval Kernel.
//!
//! This binary builds knowledge-base scans of a project and answers questions
//! grounded in them. Run `grk --help` for usage information.

mod cli;
pub mod ui;

use std::process::ExitCode;

fn main() -> ExitCode {
    cli::run()
}
