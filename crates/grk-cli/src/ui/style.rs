//! Message styling for CLI output.
//!
//! | Prefix | Meaning | Color |
//! |--------|---------|-------|
//! | `[ok]` | Success | Green |
//! | `[err]` | Error | Red |
//! | `[warn]` | Warning | Yellow |
//! | `[info]` | Information | Blue |
//! | `[hint]` | Suggestion | Cyan |
//! | `[skip]` | Skipped | Dim |

use grk_core::ConfidenceLevel;
use owo_colors::OwoColorize;

use super::color::ColorMode;

/// Message severity/type for CLI output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    /// Operation completed successfully
    Ok,
    /// Operation failed
    Err,
    /// Operation succeeded with caveats
    Warn,
    /// Neutral status
    Info,
    /// Actionable next step
    Hint,
    /// Intentionally not done
    Skip,
}

impl MessageType {
    pub fn prefix(&self) -> &'static str {
        match self {
            Self::Ok => "[ok]",
            Self::Err => "[err]",
            Self::Warn => "[warn]",
            Self::Info => "[info]",
            Self::Hint => "[hint]",
            Self::Skip => "[skip]",
        }
    }
}

/// Styling for one invocation.
///
/// ```
/// use grk_cli::ui::{Style, MessageType, ColorMode};
///
/// let style = Style::new(ColorMode::Never);
/// assert_eq!(style.message(MessageType::Ok, "Published"), "[ok] Published");
/// ```
#[derive(Debug, Clone)]
pub struct Style {
    color_mode: ColorMode,
    quiet: bool,
}

impl Style {
    pub fn new(color_mode: ColorMode) -> Self {
        Self {
            color_mode,
            quiet: false,
        }
    }

    /// Suppress `[info]` and `[hint]` lines.
    pub fn with_quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }

    pub fn colors_enabled(&self) -> bool {
        self.color_mode.is_enabled()
    }

    pub fn color_mode(&self) -> ColorMode {
        self.color_mode
    }

    pub fn is_quiet(&self) -> bool {
        self.quiet
    }

    /// A message with a type prefix.
    pub fn message(&self, msg_type: MessageType, text: &str) -> String {
        let prefix = msg_type.prefix();
        if self.colors_enabled() {
            let colored_prefix = match msg_type {
                MessageType::Ok => prefix.green().to_string(),
                MessageType::Err => prefix.red().to_string(),
                MessageType::Warn => prefix.yellow().to_string(),
                MessageType::Info => prefix.blue().to_string(),
                MessageType::Hint => prefix.cyan().to_string(),
                MessageType::Skip => prefix.dimmed().to_string(),
            };
            format!("{} {}", colored_prefix, text)
        } else {
            format!("{} {}", prefix, text)
        }
    }

    /// Print a message to stdout, honoring quiet mode.
    pub fn print(&self, msg_type: MessageType, text: &str) {
        if self.quiet && matches!(msg_type, MessageType::Info | MessageType::Hint) {
            return;
        }
        println!("{}", self.message(msg_type, text));
    }

    /// Indented `label: value` line under a message.
    pub fn message_detail(&self, label: &str, value: &str) -> String {
        format!("     {}: {}", label, value)
    }

    pub fn section(&self, title: &str) -> String {
        if self.colors_enabled() {
            title.bold().to_string()
        } else {
            title.to_string()
        }
    }

    /// Error with optional cause and hint lines.
    pub fn error_with_context(&self, msg: &str, cause: Option<&str>, hint: Option<&str>) -> String {
        let mut output = self.message(MessageType::Err, msg);
        if let Some(cause_text) = cause {
            output.push_str(&format!("\n      Cause: {}", cause_text));
        }
        if let Some(hint_text) = hint {
            output.push_str(&format!("\n      Hint: {}", hint_text));
        }
        output
    }

    pub fn list_item(&self, prefix: &str, text: &str) -> String {
        let styled_prefix = if self.colors_enabled() {
            match prefix {
                "+" => prefix.green().to_string(),
                "-" => prefix.red().to_string(),
                "~" => prefix.yellow().to_string(),
                _ => prefix.to_string(),
            }
        } else {
            prefix.to_string()
        };
        format!("  {} {}", styled_prefix, text)
    }

    pub fn key_value(&self, key: &str, value: &str) -> String {
        if self.colors_enabled() {
            format!("{}: {}", key.dimmed(), value)
        } else {
            format!("{}: {}", key, value)
        }
    }

    pub fn scan_id(&self, id: &str) -> String {
        if self.colors_enabled() {
            id.yellow().to_string()
        } else {
            id.to_string()
        }
    }

    pub fn file_path(&self, path: &str) -> String {
        if self.colors_enabled() {
            path.cyan().to_string()
        } else {
            path.to_string()
        }
    }

    /// Chunk location `path:Lstart-end`.
    pub fn location(&self, path: &str, start: u32, end: u32) -> String {
        format!("{}:L{}-{}", self.file_path(path), start, end)
    }

    pub fn confidence(&self, level: ConfidenceLevel, score: f64) -> String {
        let text = format!("{} ({:.2})", level, score);
        if !self.colors_enabled() {
            return text;
        }
        match level {
            ConfidenceLevel::High => text.green().to_string(),
            ConfidenceLevel::Medium => text.yellow().to_string(),
            ConfidenceLevel::Low => text.red().to_string(),
        }
    }

    pub fn dim(&self, text: &str) -> String {
        if self.colors_enabled() {
            text.dimmed().to_string()
        } else {
            text.to_string()
        }
    }
}
