//! Common constants used throughout grk-core.
//!
//! Paths, directory names and file classification tables live here so the
//! scanner, workspace and engine agree on them.

// ============================================================================
// Directory Names
// ============================================================================

/// The name of the GRK data directory within a project.
///
/// All GRK-managed data lives under `.grounded/` at the project root.
pub const GROUNDED_DIR: &str = ".grounded";

/// The name of the global GRK configuration directory (`~/.grk/`).
pub const GRK_HOME_DIR: &str = ".grk";

/// Project-specific ignore file, read in addition to `.gitignore`.
pub const GRK_IGNORE_FILENAME: &str = ".grkignore";

// ============================================================================
// File Names
// ============================================================================

/// The name of the global configuration file.
pub const GLOBAL_CONFIG_FILENAME: &str = "config.yaml";

/// The name of the project-level configuration file (inside `.grounded/`).
pub const PROJECT_CONFIG_FILENAME: &str = "config.yaml";

/// Externally produced stack facts (inside `.grounded/`).
pub const STACK_FILENAME: &str = "stack.json";

/// Externally produced route index (inside `.grounded/`).
pub const ROUTES_FILENAME: &str = "routes.jsonl";

/// Ask history (inside `.grounded/`).
pub const ASK_LOG_FILENAME: &str = "asks.jsonl";

/// Environment variable overriding the global config path.
pub const GRK_CONFIG_ENV: &str = "GRK_CONFIG";

// ============================================================================
// Ignored Directories
// ============================================================================

/// Directories that are always skipped during file traversal.
pub const ALWAYS_IGNORED_DIRS: &[&str] = &[
    ".git",
    ".grounded",
    "target",
    "node_modules",
    "vendor",
    ".next",
    "dist",
    "build",
    "__pycache__",
    ".venv",
    "venv",
    ".mypy_cache",
    ".pytest_cache",
];

/// Check if a directory name should always be ignored.
#[inline]
pub fn should_ignore_dir(name: &str) -> bool {
    ALWAYS_IGNORED_DIRS.contains(&name)
}

// ============================================================================
// Binary File Extensions
// ============================================================================

/// File extensions that indicate binary (non-text) content.
pub const BINARY_EXTENSIONS: &[&str] = &[
    // Images
    "png", "jpg", "jpeg", "gif", "bmp", "ico", "webp", "tiff", "tif",
    // Audio/Video
    "mp3", "mp4", "wav", "avi", "mov", "mkv", "flac", "ogg", "webm", // Archives
    "zip", "tar", "gz", "rar", "7z", "bz2", "xz", // Binaries/Executables
    "exe", "dll", "so", "dylib", "bin", "o", "a", "lib", "obj", // Documents
    "pdf", "doc", "docx", "xls", "xlsx", "ppt", "pptx", // Fonts
    "ttf", "otf", "woff", "woff2", "eot", // Database
    "db", "sqlite", "sqlite3", // Other binary/generated formats
    "pyc", "pyo", "class", "jar", "war",
];

/// Generated files that are listed in the file index but never chunked.
pub const EXCLUDED_EXTENSIONS: &[&str] = &["lock", "map", "min.js", "min.css"];

/// Check if a file extension indicates binary content.
#[inline]
pub fn is_binary_extension(ext: &str) -> bool {
    BINARY_EXTENSIONS.contains(&ext.to_lowercase().as_str())
}

/// Check if a file name marks generated content excluded from chunking.
pub fn is_excluded_file_name(name: &str) -> bool {
    let lower = name.to_lowercase();
    EXCLUDED_EXTENSIONS
        .iter()
        .any(|ext| lower.ends_with(&format!(".{}", ext)))
}

// ============================================================================
// Languages
// ============================================================================

/// Map a file extension to a language name.
pub fn language_for_extension(ext: &str) -> Option<&'static str> {
    let lang = match ext.to_lowercase().as_str() {
        "rs" => "Rust",
        "py" => "Python",
        "js" | "mjs" | "cjs" | "jsx" => "JavaScript",
        "ts" | "tsx" => "TypeScript",
        "go" => "Go",
        "java" => "Java",
        "kt" | "kts" => "Kotlin",
        "rb" => "Ruby",
        "php" => "PHP",
        "cs" => "C#",
        "c" | "h" => "C",
        "cpp" | "cc" | "hpp" | "hh" => "C++",
        "swift" => "Swift",
        "scala" => "Scala",
        "vue" => "Vue",
        "svelte" => "Svelte",
        "html" | "htm" => "HTML",
        "css" | "scss" | "sass" | "less" => "CSS",
        "sql" => "SQL",
        "sh" | "bash" | "zsh" => "Shell",
        "md" | "markdown" => "Markdown",
        "json" => "JSON",
        "yaml" | "yml" => "YAML",
        "toml" => "TOML",
        "xml" => "XML",
        _ => return None,
    };
    Some(lang)
}

// ============================================================================
// Tests
// ============================================================================
