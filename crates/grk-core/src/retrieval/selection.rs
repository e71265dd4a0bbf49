//! Diversified selection under a per-file cap and a content budget.

use std::collections::HashMap;

use crate::config::RetrievalConfig;

use super::scoring::ScoredCandidate;

/// Chunks chosen for materialization.
#[derive(Debug, Clone, Default)]
pub struct Selection {
    pub chunks: Vec<ScoredCandidate>,
    /// Sum of the estimated sizes of the selected chunks.
    pub estimated_bytes: u64,
    /// Chunks passed over because their file was at the cap.
    pub skipped_by_file_cap: usize,
    /// Chunks passed over because they did not fit the budget.
    pub skipped_by_budget: usize,
}

/// Estimated content size of a chunk.
pub fn estimate_bytes(line_count: u32, config: &RetrievalConfig) -> u64 {
    u64::from(line_count) * config.avg_bytes_per_line
}

/// Walk `ranked` in order, keeping chunks that fit.
///
/// A chunk over the per-file cap or the remaining budget is skipped, not
/// replaced; the walk continues with the next one. It stops once `maxChunks`
/// chunks are selected or the budget is exhausted.
pub fn select(ranked: Vec<ScoredCandidate>, config: &RetrievalConfig) -> Selection {
    let cap = config.per_file_cap();
    let mut per_file: HashMap<String, usize> = HashMap::new();
    let mut selection = Selection::default();

    for candidate in ranked {
        if selection.chunks.len() >= config.max_chunks
            || selection.estimated_bytes >= config.max_content_bytes
        {
            break;
        }

        let taken = per_file.get(&candidate.chunk.path).copied().unwrap_or(0);
        if taken >= cap {
            selection.skipped_by_file_cap += 1;
            continue;
        }

        let estimate = estimate_bytes(candidate.chunk.line_count(), config);
        if selection.estimated_bytes + estimate > config.max_content_bytes {
            selection.skipped_by_budget += 1;
            continue;
        }

        per_file.insert(candidate.chunk.path.clone(), taken + 1);
        selection.estimated_bytes += estimate;
        selection.chunks.push(candidate);
    }

    tracing::debug!(
        "Selected {} chunks (~{} bytes, {} over file cap, {} over budget)",
        selection.chunks.len(),
        selection.estimated_bytes,
        selection.skipped_by_file_cap,
        selection.skipped_by_budget
    );
    selection
}
