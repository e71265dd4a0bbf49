use std::collections::{BTreeSet, HashSet};

use serde::Serialize;
use tracing::{info, warn};

use super::reader::SnapshotReader;
use crate::error::DbResult;

/// Maximum ids listed per category in a report.
const SAMPLE_LIMIT: usize = 20;

/// Advisory consistency report for one scan.
///
/// Problems are data, not errors: a report with issues still means the scan is
/// readable.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    pub scan_id: String,
    pub file_count: usize,
    pub chunk_count: usize,
    /// Distinct chunk ids referenced by file records.
    pub referenced_count: usize,
    /// Referenced by a file but absent from the chunk set.
    pub missing_count: usize,
    /// Present in the chunk set but referenced by no file.
    pub orphaned_count: usize,
    /// Chunk ids that appear more than once in the chunk set.
    pub duplicate_count: usize,
    pub missing_samples: Vec<String>,
    pub orphaned_samples: Vec<String>,
    pub duplicate_samples: Vec<String>,
}

impl ValidationReport {
    pub fn is_consistent(&self) -> bool {
        self.missing_count == 0 && self.orphaned_count == 0 && self.duplicate_count == 0
    }
}

impl SnapshotReader {
    /// Cross-check file chunk lists against the chunk set.
    pub fn validate(&self) -> DbResult<ValidationReport> {
        let mut report = ValidationReport {
            scan_id: self.scan_id().to_string(),
            ..Default::default()
        };

        let mut referenced: HashSet<String> = HashSet::new();
        for file in self.stream_files()? {
            report.file_count += 1;
            referenced.extend(file.chunk_ids);
        }
        report.referenced_count = referenced.len();

        let mut present: HashSet<String> = HashSet::new();
        let mut duplicates: BTreeSet<String> = BTreeSet::new();
        for chunk in self.stream_chunks()? {
            report.chunk_count += 1;
            if !present.insert(chunk.id.clone()) {
                duplicates.insert(chunk.id);
            }
        }

        let missing: BTreeSet<&String> = referenced.difference(&present).collect();
        let orphaned: BTreeSet<&String> = present.difference(&referenced).collect();

        report.missing_count = missing.len();
        report.orphaned_count = orphaned.len();
        report.duplicate_count = duplicates.len();
        report.missing_samples = missing.into_iter().take(SAMPLE_LIMIT).cloned().collect();
        report.orphaned_samples = orphaned.into_iter().take(SAMPLE_LIMIT).cloned().collect();
        report.duplicate_samples = duplicates.into_iter().take(SAMPLE_LIMIT).collect();

        if report.is_consistent() {
            info!(
                "Scan {} is consistent ({} files, {} chunks)",
                report.scan_id, report.file_count, report.chunk_count
            );
        } else {
            warn!(
                "Scan {} has {} missing, {} orphaned, {} duplicate chunk ids",
                report.scan_id, report.missing_count, report.orphaned_count, report.duplicate_count
            );
        }
        Ok(report)
    }
}
