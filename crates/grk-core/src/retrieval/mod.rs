//! Retrieval engine.
//!
//! A retrieval runs five steps over the current scan:
//!
//! 1. [`query::analyze`] extracts paths, symbols, routes, domain flags, stack
//!    terms and keywords from the question.
//! 2. [`candidates::gather`] unions bounded strategies in one pass over the
//!    chunk stream.
//! 3. [`scoring::rank`] scores candidates additively and sorts them.
//! 4. [`selection::select`] keeps the best chunks under a per-file cap and an
//!    estimated content budget.
//! 5. [`materialize::materialize`] re-reads each chunk from the working tree
//!    and redacts it.

pub mod candidates;
pub mod facts;
pub mod materialize;
pub mod query;
pub mod scoring;
pub mod selection;

use std::collections::BTreeMap;
use std::time::Instant;

use grk_db::{ChunkRecord, SnapshotReader};
use serde::Serialize;

use crate::config::RetrievalConfig;
use crate::errors::GrkError;
use crate::redact::Redactor;
use crate::working_tree::WorkingTree;

pub use candidates::{Signal, Strategy};
pub use facts::{FactsCache, ProjectFacts};
pub use materialize::RetrievedChunk;
pub use query::{DomainFlags, QueryAnalysis};

/// Counters describing one retrieval.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RetrievalStats {
    /// Chunks admitted to the pool per strategy.
    pub candidates_per_strategy: BTreeMap<String, usize>,
    pub candidates: usize,
    pub keyword_fallback: bool,
    pub selected: usize,
    pub dropped_at_materialization: usize,
    pub estimated_bytes: u64,
    pub elapsed_ms: u64,
}

/// Result of a retrieval.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Retrieval {
    pub analysis: QueryAnalysis,
    /// Chunks in descending relevance.
    pub chunks: Vec<RetrievedChunk>,
    pub stats: RetrievalStats,
}

impl Retrieval {
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}

/// Read-only retrieval over a published scan.
#[derive(Debug, Clone, Copy)]
pub struct RetrievalEngine<'a> {
    config: &'a RetrievalConfig,
    redactor: &'a Redactor,
}

impl<'a> RetrievalEngine<'a> {
    pub fn new(config: &'a RetrievalConfig, redactor: &'a Redactor) -> Self {
        Self { config, redactor }
    }

    /// Retrieve chunks for `query` from a snapshot.
    pub fn retrieve(
        &self,
        query: &str,
        reader: &SnapshotReader,
        facts: &ProjectFacts,
        tree: &dyn WorkingTree,
    ) -> Result<Retrieval, GrkError> {
        let chunks = reader.stream_chunks()?;
        let retrieval = self.retrieve_from(query, chunks, facts, tree);
        tracing::info!(
            "Retrieved {} chunks from scan {} ({} candidates, {}ms)",
            retrieval.chunks.len(),
            reader.scan_id(),
            retrieval.stats.candidates,
            retrieval.stats.elapsed_ms
        );
        Ok(retrieval)
    }

    /// Retrieve chunks for `query` from any chunk sequence.
    pub fn retrieve_from(
        &self,
        query: &str,
        chunks: impl Iterator<Item = ChunkRecord>,
        facts: &ProjectFacts,
        tree: &dyn WorkingTree,
    ) -> Retrieval {
        let started = Instant::now();
        let analysis = query::analyze(query, &facts.stack);
        let matcher = candidates::QueryMatcher::new(&analysis, &facts.stack, &facts.routes);

        let pool = candidates::gather(
            chunks,
            &matcher,
            &self.config.strategy_limits,
            self.config.min_candidate_pool,
        );
        let mut stats = RetrievalStats {
            candidates_per_strategy: pool
                .per_strategy
                .iter()
                .map(|(s, n)| (s.as_str().to_string(), *n))
                .collect(),
            candidates: pool.len(),
            keyword_fallback: pool.used_keyword_fallback,
            ..Default::default()
        };

        let ranked = scoring::rank(pool.candidates, self.config);
        let selection = selection::select(ranked, self.config);
        stats.selected = selection.chunks.len();
        stats.estimated_bytes = selection.estimated_bytes;

        let (chunks, dropped) = materialize::materialize(selection.chunks, tree, self.redactor);
        stats.dropped_at_materialization = dropped;
        stats.elapsed_ms = started.elapsed().as_millis() as u64;

        Retrieval {
            analysis,
            chunks,
            stats,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::fs;
    use std::path::Path;
    use std::sync::Arc;

    use tempfile::TempDir;

    use crate::chunker::ChunkBuilder;
    use crate::config::ChunkingConfig;
    use crate::scanner::{FileManifestSource, FsScanner};
    use crate::stack::{PathConvention, StackFacts};
    use crate::working_tree::FsWorkingTree;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn php_controller(namespace: &str, name: &str, methods: &[&str]) -> String {
        let mut out = format!("<?php\n\nnamespace App\\{};\n\nclass {}\n{{\n", namespace, name);
        for m in methods {
            out.push_str(&format!(
                "    public function {}($request)\n    {{\n        return view('{}');\n    }}\n\n",
                m, m
            ));
        }
        out.push_str("}\n");
        out
    }

    /// A small shop project with an auth area and a cart area.
    fn shop_project() -> (TempDir, Vec<ChunkRecord>) {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        write(
            root,
            "app/Auth/LoginController.php",
            &php_controller("Auth", "LoginController", &["showLoginForm", "login", "logout"]),
        );
        write(
            root,
            "app/Shop/CartController.php",
            &php_controller("Shop", "CartController", &["index", "add", "remove", "redirectToLogin"]),
        );
        write(
            root,
            "app/Models/Order.php",
            "<?php\n\nnamespace App\\Models;\n\nclass Order\n{\n}\n",
        );

        let files = FsScanner::new(root).scan().unwrap();
        let config = ChunkingConfig::default();
        let chunks = ChunkBuilder::new(&config)
            .build(&files)
            .into_iter()
            .flat_map(|(_, chunks)| chunks)
            .collect();
        (temp, chunks)
    }

    fn laravel_facts() -> ProjectFacts {
        ProjectFacts {
            stack: Arc::new(StackFacts {
                languages: vec!["PHP".to_string()],
                frameworks: vec!["Laravel".to_string()],
                conventions: vec![PathConvention {
                    role: "controllers".to_string(),
                    path: "app".to_string(),
                }],
                ..Default::default()
            }),
            routes: Arc::default(),
        }
    }

    #[test]
    fn test_login_question_prefers_login_controller() {
        let (temp, chunks) = shop_project();
        let config = RetrievalConfig::default();
        let redactor = Redactor::default();
        let engine = RetrievalEngine::new(&config, &redactor);
        let tree = FsWorkingTree::new(temp.path());

        let retrieval =
            engine.retrieve_from("How does login work?", chunks.into_iter(), &laravel_facts(), &tree);

        let paths: Vec<&str> = retrieval.chunks.iter().map(|c| c.chunk.path.as_str()).collect();
        assert_eq!(paths.first(), Some(&"app/Auth/LoginController.php"));
        // The cart only declares `redirectToLogin`, so it comes in through the keyword fallback.
        let cart_index = paths
            .iter()
            .position(|p| *p == "app/Shop/CartController.php")
            .expect("cart retrieved through the login keyword");
        assert!(cart_index > 0);
        assert!(retrieval.chunks[0].score > retrieval.chunks[cart_index].score);
        assert!(retrieval.chunks[0].content.contains("class LoginController"));
        assert!(retrieval.stats.candidates >= 2);
    }

    #[test]
    fn test_controller_question_ranks_by_relevance() {
        let (temp, chunks) = shop_project();
        let config = RetrievalConfig::default();
        let redactor = Redactor::default();
        let engine = RetrievalEngine::new(&config, &redactor);
        let tree = FsWorkingTree::new(temp.path());

        let retrieval = engine.retrieve_from(
            "Which controller handles login?",
            chunks.into_iter(),
            &laravel_facts(),
            &tree,
        );
        let login = retrieval
            .chunks
            .iter()
            .find(|c| c.chunk.path == "app/Auth/LoginController.php")
            .expect("login selected");
        let cart = retrieval
            .chunks
            .iter()
            .find(|c| c.chunk.path == "app/Shop/CartController.php")
            .expect("cart selected via the controllers convention");
        assert!(login.score > cart.score);
        assert_eq!(retrieval.chunks[0].chunk.path, "app/Auth/LoginController.php");
    }

    #[test]
    fn test_no_candidates() {
        let (temp, chunks) = shop_project();
        let config = RetrievalConfig::default();
        let redactor = Redactor::default();
        let engine = RetrievalEngine::new(&config, &redactor);
        let tree = FsWorkingTree::new(temp.path());

        let retrieval = engine.retrieve_from(
            "quantum entanglement telemetry",
            chunks.into_iter(),
            &ProjectFacts::default(),
            &tree,
        );
        assert!(retrieval.is_empty());
        assert_eq!(retrieval.stats.candidates, 0);
        assert_eq!(retrieval.stats.selected, 0);
    }

    #[test]
    fn test_bounds_and_dropped_files() {
        let temp = TempDir::new().unwrap();
        let mut contents = HashMap::new();
        for i in 0..8 {
            let body: String = (0..120)
                .map(|l| format!("// payment step {} line {}\n", i, l))
                .collect();
            let rel = format!("src/payment/step{}.rs", i);
            write(temp.path(), &rel, &body);
            contents.insert(rel, body);
        }
        let files = FsScanner::new(temp.path()).scan().unwrap();
        let chunking = ChunkingConfig {
            small_file_lines: 20,
            min_lines: 30,
            max_lines: 40,
            ..Default::default()
        };
        let chunks: Vec<ChunkRecord> = ChunkBuilder::new(&chunking)
            .build(&files)
            .into_iter()
            .flat_map(|(_, c)| c)
            .collect();
        fs::remove_file(temp.path().join("src/payment/step0.rs")).unwrap();

        let config = RetrievalConfig {
            max_chunks: 6,
            min_diverse_files: 3,
            max_content_bytes: 9_000,
            avg_bytes_per_line: 40,
            ..Default::default()
        };
        let redactor = Redactor::default();
        let engine = RetrievalEngine::new(&config, &redactor);
        let retrieval = engine.retrieve_from(
            "Where is the payment flow?",
            chunks.into_iter(),
            &ProjectFacts::default(),
            &FsWorkingTree::new(temp.path()),
        );

        assert!(retrieval.stats.selected <= config.max_chunks);
        assert!(retrieval.stats.estimated_bytes <= config.max_content_bytes);
        let mut per_file: HashMap<&str, usize> = HashMap::new();
        for c in &retrieval.chunks {
            *per_file.entry(c.chunk.path.as_str()).or_default() += 1;
        }
        assert!(per_file.values().all(|n| *n <= config.per_file_cap()));
        assert!(!per_file.contains_key("src/payment/step0.rs"));
        assert_eq!(
            retrieval.chunks.len() + retrieval.stats.dropped_at_materialization,
            retrieval.stats.selected
        );
        assert!(retrieval.stats.dropped_at_materialization >= 1);
    }
}
