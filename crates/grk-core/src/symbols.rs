//! Regex-based structure extraction.
//!
//! Declared symbols, imports and construct boundaries are recognized line by
//! line with a small set of patterns shared by the scanner and the chunk
//! builder. This is heuristic: the goal is good split points and useful
//! retrieval signals, not a parse.

use std::sync::LazyLock;

use regex::Regex;

// ============================================================================
// Syntax families
// ============================================================================

/// Groups of languages that share import syntax.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyntaxFamily {
    Rust,
    Php,
    JsTs,
    Python,
    Ruby,
    Go,
    Jvm,
    Other,
}

impl SyntaxFamily {
    /// Family for a file extension (without the dot).
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_lowercase().as_str() {
            "rs" => Self::Rust,
            "php" => Self::Php,
            "js" | "mjs" | "cjs" | "jsx" | "ts" | "tsx" | "vue" | "svelte" => Self::JsTs,
            "py" => Self::Python,
            "rb" => Self::Ruby,
            "go" => Self::Go,
            "java" | "kt" | "kts" | "scala" | "cs" => Self::Jvm,
            _ => Self::Other,
        }
    }
}

// ============================================================================
// Patterns
// ============================================================================

static CLASS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^\s*(?:export\s+)?(?:default\s+)?(?:pub(?:\([^)]*\))?\s+)?(?:(?:public|private|protected|internal|abstract|final|static|sealed|data|open)\s+)*(?:class|interface|trait|struct|enum|module|object|record)\s+([A-Za-z_][A-Za-z0-9_]*)",
    )
    .expect("Invalid regex")
});

static IMPL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(?:unsafe\s+)?impl\b").expect("Invalid regex"));

static FUNCTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^\s*(?:export\s+)?(?:default\s+)?(?:pub(?:\([^)]*\))?\s+)?(?:(?:public|private|protected|internal|static|async|final|abstract|override|unsafe|const|extern)\s+)*(?:fn|function|def|func)\s+(?:\([^)]*\)\s*)?(?:self\.)?&?([A-Za-z_][A-Za-z0-9_]*[!?]?)",
    )
    .expect("Invalid regex")
});

static ARROW_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^\s*(?:export\s+)?(?:const|let|var)\s+([A-Za-z_$][A-Za-z0-9_$]*)\s*=\s*(?:async\s+)?(?:\([^)]*\)|[A-Za-z_$][A-Za-z0-9_$]*)\s*=>",
    )
    .expect("Invalid regex")
});

static METHOD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^\s*(?:(?:public|private|protected|internal|static|final|abstract|synchronized|override|virtual|async)\s+)+[\w<>\[\],?]+\s+([a-zA-Z_][a-zA-Z0-9_]*)\s*\(",
    )
    .expect("Invalid regex")
});

static JS_IMPORT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?:import\s+(?:.*?\s+from\s+)?['"]([^'"]+)['"])|(?:require\s*\(\s*['"]([^'"]+)['"]\s*\))"#,
    )
    .expect("Invalid regex")
});

static RUST_IMPORT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^\s*(?:pub(?:\([^)]*\))?\s+)?(?:use\s+([a-zA-Z_][a-zA-Z0-9_:]*)|mod\s+([a-zA-Z_][a-zA-Z0-9_]*)\s*;)")
        .expect("Invalid regex")
});

static PHP_IMPORT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?m)^\s*(?:use\s+([A-Za-z_\\][A-Za-z0-9_\\]*)|(?:require|include)(?:_once)?\s*\(?\s*['"]([^'"]+)['"])"#,
    )
    .expect("Invalid regex")
});

static PYTHON_IMPORT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^\s*(?:from\s+([a-zA-Z_.][a-zA-Z0-9_.]*)|import\s+([a-zA-Z_][a-zA-Z0-9_.]*))")
        .expect("Invalid regex")
});

static RUBY_IMPORT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?m)^\s*require(?:_relative)?\s*\(?\s*['"]([^'"]+)['"]"#).expect("Invalid regex")
});

static GO_IMPORT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?m)^\s*(?:import\s+)?(?:[a-zA-Z_][a-zA-Z0-9_]*\s+)?"([a-zA-Z0-9_./-]+)"\s*$"#)
        .expect("Invalid regex")
});

static JVM_IMPORT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^\s*(?:import|using)\s+(?:static\s+)?([a-zA-Z_][a-zA-Z0-9_.]*)")
        .expect("Invalid regex")
});

// ============================================================================
// Boundaries
// ============================================================================

/// Whether a line opens a class-like construct (class, trait, struct, impl...).
pub fn is_class_opener(line: &str) -> bool {
    CLASS_RE.is_match(line) || IMPL_RE.is_match(line)
}

/// Whether a line opens a function or method.
pub fn is_function_opener(line: &str) -> bool {
    FUNCTION_RE.is_match(line) || ARROW_RE.is_match(line) || METHOD_RE.is_match(line)
}

/// Whether a line closes a block.
pub fn is_closing_line(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed.starts_with('}')
        || trimmed == "end"
        || trimmed == ");"
        || trimmed == "];"
        || trimmed.starts_with("</")
}

// ============================================================================
// Extraction
// ============================================================================

/// Symbols declared on a single line.
pub fn declared_on_line(line: &str) -> Option<String> {
    [&*CLASS_RE, &*FUNCTION_RE, &*ARROW_RE, &*METHOD_RE]
        .iter()
        .find_map(|re| re.captures(line))
        .and_then(|cap| cap.get(1))
        .map(|m| m.as_str().to_string())
}

/// Symbols declared in `text`, in order of first appearance, deduplicated.
pub fn extract_declarations(text: &str) -> Vec<String> {
    let mut symbols: Vec<String> = Vec::new();
    for line in text.lines() {
        if let Some(name) = declared_on_line(line) {
            if !symbols.contains(&name) {
                symbols.push(name);
            }
        }
    }
    symbols
}

/// Imports in `text` for the given syntax family, deduplicated.
pub fn extract_imports(text: &str, family: SyntaxFamily) -> Vec<String> {
    let re: &Regex = match family {
        SyntaxFamily::Rust => &RUST_IMPORT_RE,
        SyntaxFamily::Php => &PHP_IMPORT_RE,
        SyntaxFamily::JsTs => &JS_IMPORT_RE,
        SyntaxFamily::Python => &PYTHON_IMPORT_RE,
        SyntaxFamily::Ruby => &RUBY_IMPORT_RE,
        SyntaxFamily::Go => &GO_IMPORT_RE,
        SyntaxFamily::Jvm => &JVM_IMPORT_RE,
        SyntaxFamily::Other => return Vec::new(),
    };

    let mut imports: Vec<String> = Vec::new();
    for cap in re.captures_iter(text) {
        if let Some(m) = cap.get(1).or_else(|| cap.get(2)) {
            let value = m.as_str().trim_end_matches("::").to_string();
            if !value.is_empty() && !imports.contains(&value) {
                imports.push(value);
            }
        }
    }
    imports
}

/// Turn an import into a path-like reference (`App\Models\User` → `App/Models/User`).
pub fn import_to_reference(import: &str) -> String {
    import
        .replace("::", "/")
        .replace('\\', "/")
        .trim_start_matches('/')
        .to_string()
}

/// Whether `text` mentions `symbol` as a whole word.
pub fn mentions_word(text: &str, symbol: &str) -> bool {
    if symbol.is_empty() {
        return false;
    }
    let is_word = |c: char| c.is_alphanumeric() || c == '_' || c == '$';
    text.match_indices(symbol).any(|(idx, _)| {
        let before = text[..idx].chars().next_back();
        let after = text[idx + symbol.len()..].chars().next();
        !before.is_some_and(is_word) && !after.is_some_and(is_word)
    })
}

// ============================================================================
// Tests
// ============================================================================
