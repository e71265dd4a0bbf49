//! Candidate gathering.
//!
//! Every strategy is evaluated in a single forward pass over the snapshot's
//! chunk stream. Each strategy has its own limit; a chunk joins the pool the
//! first time any strategy with room left matches it. The keyword-in-path
//! fallback is only used when the other strategies leave the pool under
//! `minCandidatePool`.

use std::collections::{BTreeMap, HashSet};
use std::fmt;

use grk_db::ChunkRecord;
use serde::Serialize;

use crate::config::StrategyLimits;
use crate::routes::RouteIndex;
use crate::stack::StackFacts;

use super::query::QueryAnalysis;

// ============================================================================
// Strategy / Signal
// ============================================================================

/// The strategy that can discover a chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Strategy {
    Path,
    Symbol,
    Import,
    Route,
    Domain,
    Stack,
    Keyword,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::Path => "path",
            Strategy::Symbol => "symbol",
            Strategy::Import => "import",
            Strategy::Route => "route",
            Strategy::Domain => "domain",
            Strategy::Stack => "stack",
            Strategy::Keyword => "keyword",
        }
    }

    fn limit(&self, limits: &StrategyLimits) -> usize {
        match self {
            Strategy::Path => limits.path,
            Strategy::Symbol => limits.symbol,
            Strategy::Import => limits.import,
            Strategy::Route => limits.route,
            Strategy::Domain => limits.domain,
            Strategy::Stack => limits.stack,
            Strategy::Keyword => limits.keyword,
        }
    }
}

/// One reason a chunk matched the query. Carries the matched term.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "term", rename_all = "camelCase")]
pub enum Signal {
    ExactPath(String),
    PathContains(String),
    SymbolDeclared(String),
    SymbolUsed(String),
    Import(String),
    RouteHandler(String),
    DomainPath(String),
    Keyword(String),
    FrameworkPathHint(String),
}

impl Signal {
    pub fn strategy(&self) -> Strategy {
        match self {
            Signal::ExactPath(_) | Signal::PathContains(_) => Strategy::Path,
            Signal::SymbolDeclared(_) | Signal::SymbolUsed(_) => Strategy::Symbol,
            Signal::Import(_) => Strategy::Import,
            Signal::RouteHandler(_) => Strategy::Route,
            Signal::DomainPath(_) => Strategy::Domain,
            Signal::FrameworkPathHint(_) => Strategy::Stack,
            Signal::Keyword(_) => Strategy::Keyword,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Signal::ExactPath(_) => "exact-path",
            Signal::PathContains(_) => "path",
            Signal::SymbolDeclared(_) => "symbol",
            Signal::SymbolUsed(_) => "symbol-use",
            Signal::Import(_) => "import",
            Signal::RouteHandler(_) => "route",
            Signal::DomainPath(_) => "domain",
            Signal::Keyword(_) => "keyword",
            Signal::FrameworkPathHint(_) => "stack",
        }
    }

    pub fn term(&self) -> &str {
        match self {
            Signal::ExactPath(t)
            | Signal::PathContains(t)
            | Signal::SymbolDeclared(t)
            | Signal::SymbolUsed(t)
            | Signal::Import(t)
            | Signal::RouteHandler(t)
            | Signal::DomainPath(t)
            | Signal::Keyword(t)
            | Signal::FrameworkPathHint(t) => t,
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind(), self.term())
    }
}

// ============================================================================
// QueryMatcher
// ============================================================================

/// Lowercased query hints resolved against the stack and the route index.
#[derive(Debug, Clone, Default)]
pub struct QueryMatcher {
    paths: Vec<String>,
    symbols: Vec<String>,
    /// `(handler path, route label)`.
    route_handlers: Vec<(String, String)>,
    domain_hints: Vec<&'static str>,
    /// `(directory prefix, stack term)`.
    conventions: Vec<(String, String)>,
    keywords: Vec<String>,
}

impl QueryMatcher {
    pub fn new(analysis: &QueryAnalysis, stack: &StackFacts, routes: &RouteIndex) -> Self {
        let mut route_handlers: Vec<(String, String)> = Vec::new();
        for mention in &analysis.routes {
            let label = match &mention.method {
                Some(m) => format!("{} {}", m, mention.uri),
                None => mention.uri.clone(),
            };
            for entry in routes.resolve(mention) {
                route_handlers.push((entry.handler_path.to_lowercase(), label.clone()));
            }
        }
        let mut named_terms: Vec<String> = analysis.keywords.clone();
        named_terms.extend(analysis.symbols.iter().cloned());
        for entry in routes.by_name_or_action(&named_terms) {
            let label = entry
                .name
                .clone()
                .or_else(|| entry.action.clone())
                .unwrap_or_else(|| entry.uri.clone());
            route_handlers.push((entry.handler_path.to_lowercase(), label));
        }
        route_handlers.dedup();

        let conventions = stack
            .conventions_for(&analysis.stack_terms)
            .into_iter()
            .map(|c| {
                let dir = c.path.trim_matches('/').to_lowercase();
                (dir, c.role.clone())
            })
            .collect();

        Self {
            paths: analysis
                .paths
                .iter()
                .map(|p| p.trim_start_matches("./").trim_matches('/').to_lowercase())
                .collect(),
            symbols: analysis.symbols.iter().map(|s| s.to_lowercase()).collect(),
            route_handlers,
            domain_hints: analysis.domains.path_hints(),
            conventions,
            keywords: analysis.keywords.clone(),
        }
    }

    /// Every signal the chunk carries for this query.
    pub fn signals(&self, chunk: &ChunkRecord) -> Vec<Signal> {
        let path = chunk.path.to_lowercase();
        let mut signals = Vec::new();

        for mention in &self.paths {
            if path == *mention || path.ends_with(&format!("/{}", mention)) {
                signals.push(Signal::ExactPath(mention.clone()));
            } else if path.contains(mention.as_str()) {
                signals.push(Signal::PathContains(mention.clone()));
            }
        }

        let declared: Vec<String> = chunk.symbols.iter().map(|s| s.to_lowercase()).collect();
        let used: Vec<String> = chunk.used_symbols.iter().map(|s| s.to_lowercase()).collect();
        for symbol in &self.symbols {
            if declared.contains(symbol) {
                signals.push(Signal::SymbolDeclared(symbol.clone()));
            } else if used.contains(symbol) {
                signals.push(Signal::SymbolUsed(symbol.clone()));
            }
        }

        for symbol in self.symbols.iter().chain(&self.paths) {
            let hit = chunk.imports.iter().chain(&chunk.references).any(|import| {
                let import = import.to_lowercase();
                let last = import.rsplit(['/', '\\', ':', '.']).next().unwrap_or(&import);
                last == symbol.as_str() || (symbol.contains('/') && import.contains(symbol.as_str()))
            });
            if hit {
                signals.push(Signal::Import(symbol.clone()));
            }
        }

        if let Some((_, label)) = self.route_handlers.iter().find(|(handler, _)| *handler == path) {
            signals.push(Signal::RouteHandler(label.clone()));
        }

        let segments: Vec<&str> = path.split('/').collect();
        let stem = segments.last().map(|s| s.split('.').next().unwrap_or(s)).unwrap_or("");
        for hint in &self.domain_hints {
            let dir_hit = segments[..segments.len().saturating_sub(1)].contains(hint);
            if dir_hit || stem.contains(hint) {
                signals.push(Signal::DomainPath((*hint).to_string()));
            }
        }

        for (dir, role) in &self.conventions {
            if path.starts_with(&format!("{}/", dir)) {
                signals.push(Signal::FrameworkPathHint(role.clone()));
            }
        }

        let declared_joined = declared.join(" ");
        for keyword in &self.keywords {
            if path.contains(keyword.as_str()) || declared_joined.contains(keyword.as_str()) {
                signals.push(Signal::Keyword(keyword.clone()));
            }
        }

        signals
    }
}

// ============================================================================
// Gathering
// ============================================================================

/// A chunk in the candidate pool with the signals it carries.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub chunk: ChunkRecord,
    pub signals: Vec<Signal>,
}

/// The candidate pool in first-seen order.
#[derive(Debug, Clone, Default)]
pub struct CandidatePool {
    pub candidates: Vec<Candidate>,
    /// Chunks admitted per strategy.
    pub per_strategy: BTreeMap<Strategy, usize>,
    pub used_keyword_fallback: bool,
}

impl CandidatePool {
    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }
}

/// Gather candidates from one pass over `chunks`.
pub fn gather(
    chunks: impl Iterator<Item = ChunkRecord>,
    matcher: &QueryMatcher,
    limits: &StrategyLimits,
    min_pool: usize,
) -> CandidatePool {
    let mut pool = CandidatePool::default();
    let mut seen: HashSet<String> = HashSet::new();
    let mut keyword_only: Vec<Candidate> = Vec::new();

    for chunk in chunks {
        if seen.contains(&chunk.id) {
            continue;
        }
        let signals = matcher.signals(&chunk);
        if signals.is_empty() {
            continue;
        }

        let mut strategies: Vec<Strategy> = signals
            .iter()
            .map(Signal::strategy)
            .filter(|s| *s != Strategy::Keyword)
            .collect();
        strategies.sort();
        strategies.dedup();

        if strategies.is_empty() {
            if keyword_only.len() < limits.keyword {
                keyword_only.push(Candidate { chunk, signals });
            }
            continue;
        }

        let mut admitted = false;
        for strategy in strategies {
            let count = pool.per_strategy.entry(strategy).or_insert(0);
            if *count < strategy.limit(limits) {
                *count += 1;
                admitted = true;
            }
        }
        if admitted {
            seen.insert(chunk.id.clone());
            pool.candidates.push(Candidate { chunk, signals });
        }
    }

    if pool.len() < min_pool && !keyword_only.is_empty() {
        pool.used_keyword_fallback = true;
        for candidate in keyword_only {
            if seen.insert(candidate.chunk.id.clone()) {
                *pool.per_strategy.entry(Strategy::Keyword).or_insert(0) += 1;
                pool.candidates.push(candidate);
            }
        }
    }

    tracing::debug!(
        "Gathered {} candidates (keyword fallback: {})",
        pool.len(),
        pool.used_keyword_fallback
    );
    pool
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retrieval::query::analyze;
    use crate::routes::RouteEntry;
    use crate::stack::PathConvention;

    fn chunk(path: &str, symbols: &[&str]) -> ChunkRecord {
        ChunkRecord {
            id: format!("id-{}", path),
            old_id: None,
            path: path.to_string(),
            start_line: 1,
            end_line: 40,
            sequence: 0,
            file_hash: "h".to_string(),
            content_hash: "c".to_string(),
            is_complete_file: true,
            symbols: symbols.iter().map(|s| s.to_string()).collect(),
            used_symbols: Vec::new(),
            imports: Vec::new(),
            references: Vec::new(),
            size_bytes: 1600,
        }
    }

    fn matcher(query: &str) -> QueryMatcher {
        let analysis = analyze(query, &StackFacts::default());
        QueryMatcher::new(&analysis, &StackFacts::default(), &RouteIndex::default())
    }

    #[test]
    fn test_path_signals() {
        let m = matcher("What is in src/store.rs?");
        let exact = m.signals(&chunk("crates/db/src/store.rs", &[]));
        assert!(exact.contains(&Signal::ExactPath("src/store.rs".to_string())));

        let m = matcher("Explain app/Http/Controllers");
        let contains = m.signals(&chunk("app/Http/Controllers/HomeController.php", &[]));
        assert!(contains.contains(&Signal::PathContains("app/http/controllers".to_string())));
    }

    #[test]
    fn test_symbol_and_import_signals() {
        let m = matcher("Who calls UserRepository?");
        let declared = m.signals(&chunk("app/Repositories/UserRepository.php", &["UserRepository"]));
        assert!(declared.contains(&Signal::SymbolDeclared("userrepository".to_string())));

        let mut importer = chunk("app/Services/Billing.php", &["Billing"]);
        importer.imports = vec!["App\\Repositories\\UserRepository".to_string()];
        let signals = m.signals(&importer);
        assert!(signals.contains(&Signal::Import("userrepository".to_string())));

        let mut user = chunk("app/Services/Audit.php", &["Audit"]);
        user.used_symbols = vec!["UserRepository".to_string()];
        assert!(m.signals(&user).contains(&Signal::SymbolUsed("userrepository".to_string())));
    }

    #[test]
    fn test_route_and_stack_signals() {
        let routes = RouteIndex::new(vec![RouteEntry {
            method: Some("POST".to_string()),
            uri: "/checkout".to_string(),
            handler_path: "app/Shop/CheckoutController.php".to_string(),
            action: Some("store".to_string()),
            name: Some("checkout".to_string()),
        }]);
        let stack = StackFacts {
            conventions: vec![PathConvention {
                role: "controllers".to_string(),
                path: "app/Shop".to_string(),
            }],
            ..Default::default()
        };
        let analysis = analyze("Which controller handles POST /checkout?", &stack);
        let m = QueryMatcher::new(&analysis, &stack, &routes);
        let signals = m.signals(&chunk("app/Shop/CheckoutController.php", &[]));
        assert!(signals.contains(&Signal::RouteHandler("POST /checkout".to_string())));
        assert!(signals.contains(&Signal::FrameworkPathHint("controllers".to_string())));
    }

    #[test]
    fn test_gather_dedups_and_limits() {
        let m = matcher("How does login work?");
        let chunks = vec![
            chunk("app/Auth/LoginController.php", &["LoginController"]),
            chunk("app/Auth/LoginController.php", &["LoginController"]),
            chunk("app/Auth/SessionGuard.php", &["SessionGuard"]),
            chunk("app/Shop/CartController.php", &["CartController"]),
        ];
        let limits = StrategyLimits {
            domain: 1,
            ..Default::default()
        };
        let pool = gather(chunks.into_iter(), &m, &limits, 0);
        let paths: Vec<&str> = pool.candidates.iter().map(|c| c.chunk.path.as_str()).collect();
        assert_eq!(paths, vec!["app/Auth/LoginController.php"]);
        assert_eq!(pool.per_strategy.get(&Strategy::Domain), Some(&1));
    }

    #[test]
    fn test_keyword_fallback_only_when_underfilled() {
        let m = matcher("Where is invoice rounding?");
        let chunks = || {
            vec![
                chunk("app/Billing/InvoiceTotals.php", &["InvoiceTotals"]),
                chunk("app/Shop/CartController.php", &["CartController"]),
            ]
            .into_iter()
        };

        let pool = gather(chunks(), &m, &StrategyLimits::default(), 10);
        assert!(pool.used_keyword_fallback);
        assert_eq!(pool.len(), 1);
        assert_eq!(pool.candidates[0].chunk.path, "app/Billing/InvoiceTotals.php");

        let pool = gather(chunks(), &m, &StrategyLimits::default(), 0);
        assert!(pool.is_empty());
    }

    #[test]
    fn test_signal_display() {
        assert_eq!(Signal::SymbolDeclared("Foo".to_string()).to_string(), "symbol:Foo");
        assert_eq!(Signal::Keyword("login".to_string()).strategy(), Strategy::Keyword);
    }
}
