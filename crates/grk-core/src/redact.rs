//! Secret redaction for content that leaves the machine.
//!
//! Two passes, in order:
//!
//! 1. Whole-content redaction for sensitive files (env files, keys,
//!    credential stores, secrets directories). The content becomes a one-line
//!    notice that keeps the line count.
//! 2. Inline redaction of secret-shaped substrings. Labels and keys are kept;
//!    only the value is replaced with [`REDACTION_MARKER`].
//!
//! Redaction is idempotent, and content without hits is returned borrowed.

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::config::RedactionConfig;
use crate::errors::GrkError;

/// Replacement for redacted values.
pub const REDACTION_MARKER: &str = "[REDACTED]";

const FILE_NOTICE_PREFIX: &str = "[grk: sensitive file redacted";

const SENSITIVE_FILE_NAMES: &[&str] = &[
    ".npmrc",
    ".pypirc",
    ".netrc",
    ".htpasswd",
    ".pgpass",
    "id_rsa",
    "id_dsa",
    "id_ecdsa",
    "id_ed25519",
    "credentials",
    "credentials.json",
    "credentials.yml",
    "secrets.json",
    "secrets.yml",
    "secrets.yaml",
    "master.key",
    "auth.json",
];

const SENSITIVE_EXTENSIONS: &[&str] = &["pem", "key", "p12", "pfx", "jks", "keystore", "kdbx"];

const SENSITIVE_DIRS: &[&str] = &["secrets", ".secrets", ".ssh", ".aws", ".gnupg"];

const ENV_TEMPLATE_SUFFIXES: &[&str] = &["example", "sample", "template", "dist"];

const PLACEHOLDER_VALUES: &[&str] = &[
    "null", "nil", "none", "undefined", "true", "false", "string", "str", "bool", "int",
    "number", "changeme", "required", "optional", "secret", "password", "xxx", "xxxx",
];

static PRIVATE_KEY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)-----BEGIN ([A-Z0-9 ]*)PRIVATE KEY-----.*?-----END [A-Z0-9 ]*PRIVATE KEY-----")
        .expect("Invalid regex")
});

static CONNECTION_STRING_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b([a-zA-Z][a-zA-Z0-9+.\-]*://)([^:/\s@]+):([^@\s/]+)@").expect("Invalid regex")
});

static SECRET_ASSIGNMENT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?i)([A-Za-z0-9_.\-]*(?:passwd|password|pwd|secret|token|api[_\-]?key|access[_\-]?key|private[_\-]?key|auth[_\-]?key|credentials?)[A-Za-z0-9_.\-]*["']?)(\s*(?:=>|:=|[:=])\s*)(?:"([^"\n]*)"|'([^'\n]*)'|([^"'\s,;]+))"#,
    )
    .expect("Invalid regex")
});

static HEX_TOKEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b[0-9a-fA-F]{32,}\b").expect("Invalid regex"));

static BASE64_TOKEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[A-Za-z0-9+_\-]{40,}={0,2}").expect("Invalid regex"));

// ============================================================================
// Redacted
// ============================================================================

/// Redaction result.
#[derive(Debug, Clone, PartialEq)]
pub struct Redacted<'a> {
    pub content: Cow<'a, str>,
    /// Replacements per rule.
    pub hits: BTreeMap<String, usize>,
}

impl Redacted<'_> {
    /// Whether anything was replaced.
    pub fn changed(&self) -> bool {
        matches!(self.content, Cow::Owned(_))
    }

    pub fn total_hits(&self) -> usize {
        self.hits.values().sum()
    }
}

// ============================================================================
// Redactor
// ============================================================================

#[derive(Debug, Clone)]
struct InlineRule {
    name: String,
    regex: Regex,
}

/// Configured redactor.
#[derive(Debug, Clone)]
pub struct Redactor {
    enabled: bool,
    extra_names: Vec<String>,
    extra_rules: Vec<InlineRule>,
}

impl Default for Redactor {
    fn default() -> Self {
        Self {
            enabled: true,
            extra_names: Vec::new(),
            extra_rules: Vec::new(),
        }
    }
}

impl Redactor {
    pub fn new(config: &RedactionConfig) -> Result<Self, GrkError> {
        let extra_rules = config
            .extra_patterns
            .iter()
            .enumerate()
            .map(|(i, pattern)| {
                Regex::new(pattern)
                    .map(|regex| InlineRule {
                        name: format!("custom-{}", i + 1),
                        regex,
                    })
                    .map_err(|e| GrkError::InvalidConfiguration {
                        message: format!("Invalid redaction pattern '{}': {}", pattern, e),
                        hint: "Fix redaction.extraPatterns in config.yaml".to_string(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            enabled: config.enabled,
            extra_names: config
                .extra_sensitive_names
                .iter()
                .map(|n| n.to_lowercase())
                .collect(),
            extra_rules,
        })
    }

    /// A redactor that passes everything through.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Whether a project-relative path names a sensitive file.
    pub fn is_sensitive_path(&self, path: &str) -> bool {
        let lower = path.to_lowercase();
        let segments: Vec<&str> = lower.split('/').filter(|s| !s.is_empty()).collect();
        let Some((name, dirs)) = segments.split_last() else {
            return false;
        };

        if is_env_file(name)
            || SENSITIVE_FILE_NAMES.contains(name)
            || dirs.iter().any(|d| SENSITIVE_DIRS.contains(d))
        {
            return true;
        }
        if let Some((_, ext)) = name.rsplit_once('.') {
            if SENSITIVE_EXTENSIONS.contains(&ext) {
                return true;
            }
        }
        self.extra_names.iter().any(|extra| match extra.strip_prefix('*') {
            Some(suffix) => name.ends_with(suffix),
            None => *name == extra.as_str() || dirs.contains(&extra.as_str()),
        })
    }

    /// Redact `content` read from `path`.
    pub fn redact<'a>(&self, path: &str, content: &'a str) -> Redacted<'a> {
        let mut hits = BTreeMap::new();
        if !self.enabled || content.starts_with(FILE_NOTICE_PREFIX) {
            return Redacted {
                content: Cow::Borrowed(content),
                hits,
            };
        }

        if self.is_sensitive_path(path) {
            hits.insert("sensitive-file".to_string(), 1);
            return Redacted {
                content: Cow::Owned(file_notice(content.lines().count())),
                hits,
            };
        }

        let mut current: Cow<'a, str> = Cow::Borrowed(content);
        let builtin: [(&str, &Regex, Replacer); 5] = [
            ("private-key", &*PRIVATE_KEY_RE, replace_private_key),
            ("connection-string", &*CONNECTION_STRING_RE, replace_connection_password),
            ("secret-assignment", &*SECRET_ASSIGNMENT_RE, replace_assignment_value),
            ("hex-token", &*HEX_TOKEN_RE, replace_whole),
            ("base64-token", &*BASE64_TOKEN_RE, replace_base64),
        ];
        for (name, regex, replacer) in builtin {
            apply_rule(&mut current, &mut hits, name, regex, replacer);
        }
        for rule in &self.extra_rules {
            apply_rule(&mut current, &mut hits, &rule.name, &rule.regex, replace_whole);
        }

        if !hits.is_empty() {
            tracing::debug!("Redacted {} value(s) in {}", hits.values().sum::<usize>(), path);
        }
        Redacted {
            content: current,
            hits,
        }
    }
}

fn is_env_file(name: &str) -> bool {
    if name == ".env" || name == ".envrc" {
        return true;
    }
    match name.strip_prefix(".env.") {
        Some(suffix) => !ENV_TEMPLATE_SUFFIXES.contains(&suffix),
        None => name.ends_with(".env"),
    }
}

fn file_notice(lines: usize) -> String {
    format!("{} ({} lines)]", FILE_NOTICE_PREFIX, lines)
}

// ============================================================================
// Inline rules
// ============================================================================

/// Replacement for one match, or `None` to leave it untouched.
type Replacer = fn(&Captures<'_>) -> Option<String>;

fn apply_rule(
    current: &mut Cow<'_, str>,
    hits: &mut BTreeMap<String, usize>,
    name: &str,
    regex: &Regex,
    replacer: Replacer,
) {
    let text: &str = current.as_ref();
    let mut count = 0;
    let mut out = String::with_capacity(text.len());
    let mut last = 0;

    for caps in regex.captures_iter(text) {
        let Some(whole) = caps.get(0) else { continue };
        if inside_marker(text, whole.start(), whole.end()) {
            continue;
        }
        if let Some(replacement) = replacer(&caps) {
            if replacement == whole.as_str() {
                continue;
            }
            out.push_str(&text[last..whole.start()]);
            out.push_str(&replacement);
            last = whole.end();
            count += 1;
        }
    }

    if count > 0 {
        out.push_str(&text[last..]);
        *hits.entry(name.to_string()).or_insert(0) += count;
        *current = Cow::Owned(out);
    }
}

/// Whether `start..end` lies within an existing redaction marker.
fn inside_marker(text: &str, start: usize, end: usize) -> bool {
    text.match_indices(REDACTION_MARKER)
        .any(|(pos, m)| start >= pos && end <= pos + m.len())
        || text[start..end] == *REDACTION_MARKER
}

fn replace_whole(_caps: &Captures<'_>) -> Option<String> {
    Some(REDACTION_MARKER.to_string())
}

fn replace_private_key(caps: &Captures<'_>) -> Option<String> {
    let kind = caps.get(1).map(|m| m.as_str()).unwrap_or("");
    Some(format!(
        "-----BEGIN {kind}PRIVATE KEY-----\n{REDACTION_MARKER}\n-----END {kind}PRIVATE KEY-----"
    ))
}

fn replace_connection_password(caps: &Captures<'_>) -> Option<String> {
    let password = caps.get(3)?.as_str();
    if password == REDACTION_MARKER || is_placeholder(password) {
        return None;
    }
    Some(format!("{}{}:{}@", &caps[1], &caps[2], REDACTION_MARKER))
}

fn replace_assignment_value(caps: &Captures<'_>) -> Option<String> {
    let (quote, value) = match (caps.get(3), caps.get(4), caps.get(5)) {
        (Some(inner), _, _) => ("\"", inner.as_str()),
        (_, Some(inner), _) => ("'", inner.as_str()),
        (_, _, Some(bare)) => ("", bare.as_str()),
        _ => return None,
    };
    if value == REDACTION_MARKER || is_placeholder(value) {
        return None;
    }
    // Unquoted identifiers and member accesses are code, not values.
    if quote.is_empty()
        && value.chars().all(|c| c.is_ascii_alphabetic() || c == '_' || c == '.')
    {
        return None;
    }
    Some(format!("{}{}{quote}{REDACTION_MARKER}{quote}", &caps[1], &caps[2]))
}

fn replace_base64(caps: &Captures<'_>) -> Option<String> {
    let token = caps.get(0)?.as_str();
    let has_upper = token.chars().any(|c| c.is_ascii_uppercase());
    let has_lower = token.chars().any(|c| c.is_ascii_lowercase());
    let has_digit = token.chars().any(|c| c.is_ascii_digit());
    (has_upper && has_lower && has_digit).then(|| REDACTION_MARKER.to_string())
}

/// Values that are code or obvious placeholders rather than secrets.
fn is_placeholder(value: &str) -> bool {
    let lower = value.to_lowercase();
    value.chars().count() < 4
        || PLACEHOLDER_VALUES.contains(&lower.as_str())
        || value.starts_with(['$', '<', '{', '%', '@', '[', '(', '&', '*', '!'])
        || value.contains(['(', ')'])
        || value.contains("->")
        || value.contains("::")
        || lower.starts_with("env")
        || lower.starts_with("process.env")
        || lower.starts_with("os.environ")
        || lower.starts_with("config.")
        || lower.starts_with("self.")
        || lower.starts_with("this.")
        || lower.chars().all(|c| c == 'x' || c == '*' || c == '.')
}
