//! Chunk builder.
//!
//! Splits each indexable file into line-bounded chunks:
//!
//! - files up to `smallFileLines` become one complete-file chunk
//! - larger files are cut greedily inside a `[minLines, maxLines]` window at
//!   the best-weighted break point (blank > class > function > closing), or
//!   at the window's upper bound when no candidate exists
//!
//! The chunks of a file always cover `1..=line_count` exactly once, in order.

use std::collections::HashMap;

use grk_db::{ChunkRecord, ChunkRepository};
use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info};

use crate::chunk_id::{compute_chunk_id, content_hash};
use crate::config::{BreakWeights, ChunkingConfig};
use crate::scanner::SourceFile;
use crate::symbols::{
    declared_on_line, extract_imports, import_to_reference, is_class_opener, is_closing_line,
    is_function_opener, mentions_word, SyntaxFamily,
};

// ============================================================================
// Break points
// ============================================================================

/// Weight of splitting after each line (index 0 = after line 1).
///
/// A blank or closing line is a break point after itself; a class or
/// function opener makes the line before it a break point.
fn break_weights(lines: &[&str], weights: &BreakWeights) -> Vec<u32> {
    let mut result = vec![0u32; lines.len()];
    for (idx, line) in lines.iter().enumerate() {
        let mut w = 0;
        if line.trim().is_empty() {
            w = w.max(weights.blank);
        }
        if is_closing_line(line) {
            w = w.max(weights.closing);
        }
        if let Some(next) = lines.get(idx + 1) {
            if is_class_opener(next) {
                w = w.max(weights.class);
            } else if is_function_opener(next) {
                w = w.max(weights.function);
            }
        }
        result[idx] = w;
    }
    result
}

/// Line ranges `(start, end)` (1-based, inclusive) for a file.
///
/// Line sizes count one byte for the newline.
pub fn plan_ranges(lines: &[&str], config: &ChunkingConfig) -> Vec<(u32, u32)> {
    let total = lines.len();
    if total == 0 {
        return Vec::new();
    }
    if total <= config.small_file_lines as usize {
        return vec![(1, total as u32)];
    }

    let weights = break_weights(lines, &config.break_weights);
    // prefix[i] = bytes of lines 1..=i
    let mut prefix = Vec::with_capacity(total + 1);
    prefix.push(0u64);
    for line in lines {
        let last = prefix.last().copied().unwrap_or(0);
        prefix.push(last + line.len() as u64 + 1);
    }
    let bytes = |start: usize, end: usize| prefix[end] - prefix[start - 1];

    let min = config.min_lines.max(1) as usize;
    let max = (config.max_lines as usize).max(min);
    let mut ranges = Vec::new();
    let mut start = 1usize;

    while start <= total {
        let remaining = total - start + 1;
        if remaining <= min
            || (remaining <= max && bytes(start, total) <= config.max_chunk_bytes)
        {
            ranges.push((start as u32, total as u32));
            break;
        }

        let lo = start + min - 1;
        let mut hi = (start + max - 1).min(total - 1);
        // Soft byte limit: pull the upper bound in, never below `lo`.
        while hi > lo && bytes(start, hi) > config.max_chunk_bytes {
            hi -= 1;
        }

        // Highest weight wins; among equals the later line keeps chunks larger.
        let mut split = hi;
        let mut best = 0;
        for end in lo..=hi {
            let w = weights[end - 1];
            if w > 0 && w >= best {
                best = w;
                split = end;
            }
        }

        ranges.push((start as u32, split as u32));
        start = split + 1;
    }

    ranges
}

// ============================================================================
// ChunkBuilder
// ============================================================================

/// Builds chunk records from source files.
#[derive(Debug, Clone)]
pub struct ChunkBuilder<'a> {
    config: &'a ChunkingConfig,
}

impl<'a> ChunkBuilder<'a> {
    pub fn new(config: &'a ChunkingConfig) -> Self {
        Self { config }
    }

    /// Chunks of one file, in sequence order. Empty for non-indexable or empty files.
    pub fn chunk_file(&self, file: &SourceFile) -> Vec<ChunkRecord> {
        if !file.is_indexable() {
            return Vec::new();
        }
        let lines: Vec<&str> = file.content.lines().collect();
        let ranges = plan_ranges(&lines, self.config);
        let complete = ranges.len() == 1;
        let family = file
            .extension
            .as_deref()
            .map(SyntaxFamily::from_extension)
            .unwrap_or(SyntaxFamily::Other);

        ranges
            .into_iter()
            .enumerate()
            .map(|(seq, (start, end))| {
                let slice = &lines[(start - 1) as usize..end as usize];
                let text = slice.join("\n");

                let symbols: Vec<String> = slice.iter().filter_map(|l| declared_on_line(l)).fold(
                    Vec::new(),
                    |mut acc, s| {
                        if !acc.contains(&s) {
                            acc.push(s);
                        }
                        acc
                    },
                );
                let used_symbols: Vec<String> = file
                    .symbols
                    .iter()
                    .filter(|s| !symbols.contains(s) && mentions_word(&text, s))
                    .cloned()
                    .collect();
                let imports = extract_imports(&text, family);
                let references = imports.iter().map(|i| import_to_reference(i)).collect();

                ChunkRecord {
                    id: compute_chunk_id(&file.path, &file.content_hash, start, end),
                    old_id: None,
                    path: file.path.clone(),
                    start_line: start,
                    end_line: end,
                    sequence: seq as u32,
                    file_hash: file.content_hash.clone(),
                    content_hash: content_hash(text.as_bytes()),
                    is_complete_file: complete,
                    symbols,
                    used_symbols,
                    imports,
                    references,
                    size_bytes: text.len() as u64,
                }
            })
            .collect()
    }

    /// Chunk every file in parallel; output is sorted by path.
    pub fn build(&self, files: &[SourceFile]) -> Vec<(SourceFile, Vec<ChunkRecord>)> {
        let mut built: Vec<(SourceFile, Vec<ChunkRecord>)> = files
            .par_iter()
            .map(|file| (file.clone(), self.chunk_file(file)))
            .collect();
        built.sort_by(|a, b| a.0.path.cmp(&b.0.path));
        built
    }

    /// Full build into an (empty) repository.
    pub fn build_into(&self, files: &[SourceFile], repository: &mut dyn ChunkRepository) -> usize {
        let mut chunk_count = 0;
        for (file, chunks) in self.build(files) {
            chunk_count += chunks.len();
            repository.replace_file(file.to_file_record(), chunks);
        }
        info!(
            "Built {} chunks from {} files",
            chunk_count,
            repository.file_count()
        );
        chunk_count
    }

    /// Apply a change set to `repository`.
    ///
    /// `changed` holds the current content of added and modified paths;
    /// `deleted` lists removed paths. Other files are left untouched. A new
    /// chunk with the same `(start, end)` as a previous chunk of its path
    /// records the previous id as `old_id`.
    pub fn rebuild(
        &self,
        repository: &mut dyn ChunkRepository,
        changed: &[SourceFile],
        deleted: &[String],
    ) -> RebuildSummary {
        let mut summary = RebuildSummary::default();

        for path in deleted {
            if let Some(old) = repository.remove_file(path) {
                summary.deleted_files += 1;
                summary.chunks_removed += old.len();
            }
        }

        for (file, mut chunks) in self.build(changed) {
            let previous: HashMap<(u32, u32), String> = repository
                .chunks_for(&file.path)
                .iter()
                .map(|c| ((c.start_line, c.end_line), c.id.clone()))
                .collect();

            for chunk in &mut chunks {
                if let Some(old) = previous.get(&(chunk.start_line, chunk.end_line)) {
                    if *old != chunk.id {
                        chunk.old_id = Some(old.clone());
                        summary.lineage_kept += 1;
                    }
                }
            }

            let existed = repository.file(&file.path).is_some();
            summary.chunks_written += chunks.len();
            let replaced = repository.replace_file(file.to_file_record(), chunks);
            if existed {
                summary.modified_files += 1;
            } else {
                summary.added_files += 1;
            }
            summary.chunks_removed += replaced.len();
        }

        debug!(
            "Rebuild: +{} ~{} -{} files, {} chunks written",
            summary.added_files, summary.modified_files, summary.deleted_files, summary.chunks_written
        );
        summary
    }
}

/// What an incremental rebuild changed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RebuildSummary {
    pub added_files: usize,
    pub modified_files: usize,
    pub deleted_files: usize,
    pub chunks_written: usize,
    pub chunks_removed: usize,
    /// New chunks that carry the id of the chunk they replaced.
    pub lineage_kept: usize,
}

// ============================================================================
// Tests
// ============================================================================
