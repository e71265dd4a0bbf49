//! Query analysis.
//!
//! Turns a natural-language question into the structured hints the candidate
//! strategies work from: path mentions, symbol-like tokens, route mentions,
//! domain intent flags, stack vocabulary and plain keywords.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use unicode_segmentation::UnicodeSegmentation;

use crate::routes::RouteMention;
use crate::stack::StackFacts;

/// Extensions recognized in bare file mentions.
const KNOWN_EXTENSIONS: &[&str] = &[
    "rs", "py", "js", "ts", "jsx", "tsx", "mjs", "cjs", "go", "java", "kt", "scala", "c", "cpp",
    "h", "hpp", "cs", "rb", "php", "swift", "ex", "exs", "erl", "hs", "lua", "pl", "sh", "bash",
    "vue", "svelte", "json", "yaml", "yml", "toml", "xml", "md", "css", "scss", "less", "html",
    "sql", "graphql", "proto", "twig", "blade",
];

const HTTP_METHODS: &[&str] = &["GET", "POST", "PUT", "PATCH", "DELETE", "HEAD", "OPTIONS"];

const STOPWORDS: &[&str] = &[
    "a", "about", "an", "and", "any", "are", "as", "at", "be", "been", "but", "by", "can",
    "code", "could", "did", "do", "does", "done", "explain", "file", "files", "find", "for",
    "from", "get", "handle", "handled", "handles", "happen", "happens", "have", "how", "i",
    "if", "in", "into", "is", "it", "its", "me", "my", "of", "on", "or", "our", "show", "so",
    "that", "the", "their", "then", "there", "these", "this", "to", "use", "used", "uses",
    "was", "we", "what", "when", "where", "which", "who", "why", "will", "with", "work",
    "works", "would", "you", "your",
];

const ROUTE_WORDS: &[&str] = &[
    "api", "controller", "controllers", "endpoint", "endpoints", "route", "routes", "routing",
    "url", "urls", "request", "requests",
];

const AUTH_WORDS: &[&str] = &[
    "auth", "authentication", "authenticate", "authorization", "login", "logout", "signin",
    "signup", "session", "sessions", "password", "passwords", "token", "tokens", "register",
    "registration", "permission", "permissions", "guard",
];

const DATABASE_WORDS: &[&str] = &[
    "db", "database", "migration", "migrations", "model", "models", "query", "queries",
    "table", "tables", "schema", "orm", "repository", "entity", "entities", "sql",
];

static PASCAL_CASE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z][a-z0-9]+(?:[A-Z][A-Za-z0-9]*)+$").expect("Invalid regex"));

static CAMEL_CASE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z][a-z0-9]*[A-Z][A-Za-z0-9]*$").expect("Invalid regex"));

static SNAKE_CASE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z][a-z0-9]*(?:_[a-z0-9]+)+$").expect("Invalid regex"));

static CAPITALIZED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z][a-z0-9]{2,}$").expect("Invalid regex"));

static IDENTIFIER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_$][A-Za-z0-9_$]*$").expect("Invalid regex"));

// ============================================================================
// QueryAnalysis
// ============================================================================

/// Intent flags inferred from the vocabulary of a query.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainFlags {
    pub route: bool,
    pub auth: bool,
    pub database: bool,
}

impl DomainFlags {
    pub fn any(&self) -> bool {
        self.route || self.auth || self.database
    }

    /// Path fragments typical for the flagged domains, lowercase.
    pub fn path_hints(&self) -> Vec<&'static str> {
        let mut hints = Vec::new();
        if self.auth {
            hints.extend(["auth", "login", "session", "guard", "middleware", "password"]);
        }
        if self.database {
            hints.extend(["models", "migrations", "database", "repositories", "entities", "schema"]);
        }
        if self.route {
            hints.extend(["routes", "controllers", "http", "api", "handlers"]);
        }
        hints
    }
}

/// Structured view of a query.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryAnalysis {
    pub query: String,
    /// Explicit file or path mentions, as written.
    pub paths: Vec<String>,
    /// Symbol-like tokens (`LoginController`, `handleRequest`, `user_id`).
    pub symbols: Vec<String>,
    pub routes: Vec<RouteMention>,
    pub domains: DomainFlags,
    /// Keywords that name part of the project's stack.
    pub stack_terms: Vec<String>,
    /// Lowercase keywords with stop words removed.
    pub keywords: Vec<String>,
}

impl QueryAnalysis {
    /// Whether the analysis produced nothing to search with.
    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
            && self.symbols.is_empty()
            && self.routes.is_empty()
            && !self.domains.any()
            && self.keywords.is_empty()
    }
}

/// Analyze a query against the project's stack.
pub fn analyze(query: &str, stack: &StackFacts) -> QueryAnalysis {
    let mut analysis = QueryAnalysis {
        query: query.to_string(),
        ..Default::default()
    };

    let tokens: Vec<&str> = query
        .split_whitespace()
        .map(trim_token)
        .filter(|t| !t.is_empty())
        .collect();

    for (i, token) in tokens.iter().enumerate() {
        if token.starts_with('/') {
            let method = i
                .checked_sub(1)
                .map(|prev| tokens[prev].to_ascii_uppercase())
                .filter(|prev| HTTP_METHODS.contains(&prev.as_str()));
            push_unique_route(&mut analysis.routes, RouteMention {
                method,
                uri: token.to_string(),
            });
            continue;
        }
        if is_path_mention(token) {
            push_unique(&mut analysis.paths, token.to_string());
            continue;
        }
        for symbol in symbol_candidates(token, i == 0) {
            push_unique(&mut analysis.symbols, symbol);
        }
    }

    for word in query.unicode_words() {
        let lower = word.to_lowercase();
        if lower.chars().count() < 2 || STOPWORDS.contains(&lower.as_str()) {
            continue;
        }
        if lower.chars().all(|c| c.is_ascii_digit()) {
            continue;
        }
        push_unique(&mut analysis.keywords, lower);
    }

    analysis.domains = DomainFlags {
        route: !analysis.routes.is_empty()
            || analysis.keywords.iter().any(|k| ROUTE_WORDS.contains(&k.as_str())),
        auth: analysis.keywords.iter().any(|k| AUTH_WORDS.contains(&k.as_str())),
        database: analysis.keywords.iter().any(|k| DATABASE_WORDS.contains(&k.as_str())),
    };

    let vocabulary = stack.vocabulary();
    analysis.stack_terms = analysis
        .keywords
        .iter()
        .filter(|k| vocabulary.contains(k) || vocabulary.contains(&format!("{}s", k)))
        .cloned()
        .collect();

    tracing::debug!(
        "Query analysis: {} paths, {} symbols, {} routes, {} keywords",
        analysis.paths.len(),
        analysis.symbols.len(),
        analysis.routes.len(),
        analysis.keywords.len()
    );
    analysis
}

fn trim_token(token: &str) -> &str {
    token
        .trim_matches(|c: char| matches!(c, '"' | '\'' | '`' | ',' | ';' | '?' | '!' | '(' | '[' | '<' | '>' | ']'))
        .trim_end_matches("()")
        .trim_end_matches([')', '.', ':'])
}

fn is_path_mention(token: &str) -> bool {
    if token.contains("://") {
        return false;
    }
    if token.contains('/') && token.split('/').filter(|s| !s.is_empty()).count() >= 2 {
        return true;
    }
    token
        .rsplit_once('.')
        .filter(|(stem, _)| !stem.is_empty())
        .is_some_and(|(_, ext)| KNOWN_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
}

/// Symbol-like parts of a token. `Class::method` and `Class@method` yield both
/// halves. A lone capitalized word only counts when it does not open the query.
fn symbol_candidates(token: &str, first: bool) -> Vec<String> {
    let parts: Vec<&str> = if token.contains("::") {
        token.split("::").collect()
    } else if token.contains('@') && !token.starts_with('@') {
        token.split('@').collect()
    } else if token.contains("->") {
        token.split("->").collect()
    } else {
        vec![token]
    };
    let compound = parts.len() > 1;

    parts
        .into_iter()
        .map(|p| p.trim_start_matches('$'))
        .filter(|p| IDENTIFIER_RE.is_match(p))
        .filter(|p| {
            compound
                || PASCAL_CASE_RE.is_match(p)
                || CAMEL_CASE_RE.is_match(p)
                || SNAKE_CASE_RE.is_match(p)
                || (!first
                    && CAPITALIZED_RE.is_match(p)
                    && !STOPWORDS.contains(&p.to_lowercase().as_str()))
        })
        .map(str::to_string)
        .collect()
}

fn push_unique(items: &mut Vec<String>, item: String) {
    if !items.contains(&item) {
        items.push(item);
    }
}

fn push_unique_route(items: &mut Vec<RouteMention>, item: RouteMention) {
    if !items.contains(&item) {
        items.push(item);
    }
}
