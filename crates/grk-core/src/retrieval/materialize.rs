//! Content materialization from the live working tree.

use grk_db::ChunkRecord;
use serde::Serialize;

use crate::redact::Redactor;
use crate::working_tree::WorkingTree;

use super::candidates::Signal;
use super::scoring::ScoredCandidate;

/// A selected chunk with its current content.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RetrievedChunk {
    pub chunk: ChunkRecord,
    pub score: f64,
    pub signals: Vec<Signal>,
    /// Lines `start_line..=end_line` as they are on disk now.
    pub content: String,
    /// Whether the redactor changed the content.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub redacted: bool,
}

impl RetrievedChunk {
    /// `path:Lstart-end`.
    pub fn location(&self) -> String {
        format!(
            "{}:L{}-{}",
            self.chunk.path, self.chunk.start_line, self.chunk.end_line
        )
    }
}

/// Read the content of each selected chunk, dropping chunks whose file is
/// gone or unreadable. Returns the chunks and the number dropped.
pub fn materialize(
    selected: Vec<ScoredCandidate>,
    tree: &dyn WorkingTree,
    redactor: &Redactor,
) -> (Vec<RetrievedChunk>, usize) {
    let mut chunks = Vec::with_capacity(selected.len());
    let mut dropped = 0;

    for candidate in selected {
        let c = &candidate.chunk;
        let Some(text) = tree.read_lines(&c.path, c.start_line, c.end_line) else {
            tracing::warn!(
                "Dropping chunk {} ({}:{}-{}): source not readable",
                c.id,
                c.path,
                c.start_line,
                c.end_line
            );
            dropped += 1;
            continue;
        };

        let redacted = redactor.redact(&c.path, &text);
        let changed = redacted.changed();
        let content = redacted.content.into_owned();
        chunks.push(RetrievedChunk {
            chunk: candidate.chunk,
            score: candidate.score,
            signals: candidate.signals,
            content,
            redacted: changed,
        });
    }

    (chunks, dropped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct MapTree(HashMap<String, String>);

    impl WorkingTree for MapTree {
        fn read_file(&self, path: &str) -> Option<String> {
            self.0.get(path).cloned()
        }

        fn head_commit(&self) -> Option<String> {
            None
        }
    }

    fn selected(path: &str, start: u32, end: u32) -> ScoredCandidate {
        ScoredCandidate {
            chunk: ChunkRecord {
                id: format!("{}:{}", path, start),
                old_id: None,
                path: path.to_string(),
                start_line: start,
                end_line: end,
                sequence: 0,
                file_hash: "h".to_string(),
                content_hash: "c".to_string(),
                is_complete_file: false,
                symbols: Vec::new(),
                used_symbols: Vec::new(),
                imports: Vec::new(),
                references: Vec::new(),
                size_bytes: 0,
            },
            score: 1.0,
            signals: Vec::new(),
        }
    }

    #[test]
    fn test_reads_live_lines_and_drops_missing() {
        let tree = MapTree(HashMap::from([
            ("src/a.rs".to_string(), "l1\nl2\nl3\nl4\n".to_string()),
            (".env".to_string(), "KEY=value\n".to_string()),
        ]));
        let (chunks, dropped) = materialize(
            vec![
                selected("src/a.rs", 2, 3),
                selected("src/gone.rs", 1, 5),
                selected(".env", 1, 1),
            ],
            &tree,
            &Redactor::default(),
        );
        assert_eq!(dropped, 1);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].content, "l2\nl3");
        assert_eq!(chunks[0].location(), "src/a.rs:L2-3");
        assert!(!chunks[0].redacted);
        assert!(chunks[1].redacted);
        assert!(!chunks[1].content.contains("value"));
    }
}
