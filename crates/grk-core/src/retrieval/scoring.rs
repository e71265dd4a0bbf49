//! Additive relevance scoring.

use grk_db::ChunkRecord;

use crate::config::RetrievalConfig;

use super::candidates::{Candidate, Signal};

/// A candidate with its relevance score.
#[derive(Debug, Clone)]
pub struct ScoredCandidate {
    pub chunk: ChunkRecord,
    pub score: f64,
    pub signals: Vec<Signal>,
}

/// Boost contributed by one signal.
pub fn signal_boost(signal: &Signal, config: &RetrievalConfig) -> f64 {
    let b = &config.boosts;
    match signal {
        Signal::ExactPath(_) => b.exact_path,
        Signal::PathContains(_) => b.path_contains,
        Signal::SymbolDeclared(_) => b.symbol_declared,
        Signal::SymbolUsed(_) => b.symbol_used,
        Signal::Import(_) => b.import,
        Signal::RouteHandler(_) => b.route_handler,
        Signal::DomainPath(_) => b.domain_path,
        Signal::Keyword(_) => b.keyword,
        Signal::FrameworkPathHint(_) => b.framework_path_hint,
    }
}

/// Score of one chunk given its signals.
///
/// Boosts add up; complete-file chunks are then scaled up and overlong ones
/// scaled down.
pub fn score_chunk(chunk: &ChunkRecord, signals: &[Signal], config: &RetrievalConfig) -> f64 {
    let mut score: f64 = signals.iter().map(|s| signal_boost(s, config)).sum();
    if chunk.is_complete_file {
        score *= config.complete_file_multiplier;
    }
    if chunk.line_count() > config.overlong_lines {
        score *= config.overlong_multiplier;
    }
    score
}

/// Score and rank candidates by descending score. Ties keep pool order.
pub fn rank(candidates: Vec<Candidate>, config: &RetrievalConfig) -> Vec<ScoredCandidate> {
    let mut scored: Vec<ScoredCandidate> = candidates
        .into_iter()
        .map(|c| ScoredCandidate {
            score: score_chunk(&c.chunk, &c.signals, config),
            chunk: c.chunk,
            signals: c.signals,
        })
        .collect();
    scored.sort_by(|a, b| b.score.total_cmp(&a.score));
    scored
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(path: &str, start: u32, end: u32, complete: bool) -> ChunkRecord {
        ChunkRecord {
            id: format!("{}:{}", path, start),
            old_id: None,
            path: path.to_string(),
            start_line: start,
            end_line: end,
            sequence: 0,
            file_hash: "h".to_string(),
            content_hash: "c".to_string(),
            is_complete_file: complete,
            symbols: Vec::new(),
            used_symbols: Vec::new(),
            imports: Vec::new(),
            references: Vec::new(),
            size_bytes: 0,
        }
    }

    #[test]
    fn test_boosts_add_up() {
        let config = RetrievalConfig::default();
        let signals = vec![
            Signal::SymbolDeclared("login".to_string()),
            Signal::Keyword("login".to_string()),
        ];
        let score = score_chunk(&chunk("a.rs", 1, 10, false), &signals, &config);
        assert_eq!(score, config.boosts.symbol_declared + config.boosts.keyword);
    }

    #[test]
    fn test_multipliers() {
        let config = RetrievalConfig::default();
        let signals = vec![Signal::Keyword("x".to_string())];
        let plain = score_chunk(&chunk("a.rs", 1, 10, false), &signals, &config);
        let complete = score_chunk(&chunk("a.rs", 1, 10, true), &signals, &config);
        let overlong = score_chunk(&chunk("a.rs", 1, 400, false), &signals, &config);
        assert!(complete > plain);
        assert!(overlong < plain);
    }

    #[test]
    fn test_rank_is_stable() {
        let config = RetrievalConfig::default();
        let candidates = vec![
            Candidate {
                chunk: chunk("b.rs", 1, 10, false),
                signals: vec![Signal::Keyword("k".to_string())],
            },
            Candidate {
                chunk: chunk("a.rs", 1, 10, false),
                signals: vec![Signal::ExactPath("a.rs".to_string())],
            },
            Candidate {
                chunk: chunk("c.rs", 1, 10, false),
                signals: vec![Signal::Keyword("k".to_string())],
            },
        ];
        let ranked = rank(candidates, &config);
        let paths: Vec<&str> = ranked.iter().map(|c| c.chunk.path.as_str()).collect();
        assert_eq!(paths, vec!["a.rs", "b.rs", "c.rs"]);
    }

    #[test]
    fn test_login_outranks_cart() {
        let config = RetrievalConfig::default();
        let login = score_chunk(
            &chunk("app/Auth/LoginController.php", 1, 80, true),
            &[
                Signal::DomainPath("auth".to_string()),
                Signal::DomainPath("login".to_string()),
                Signal::Keyword("login".to_string()),
            ],
            &config,
        );
        let cart = score_chunk(
            &chunk("app/Shop/CartController.php", 1, 80, true),
            &[Signal::FrameworkPathHint("controllers".to_string())],
            &config,
        );
        assert!(login > cart);
    }
}
