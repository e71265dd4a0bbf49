//! Immutable knowledge-base snapshots.
//!
//! A scan is written once into `scans/.staging-<id>/`, renamed to
//! `scans/<id>/`, and only then made current by replacing the `CURRENT`
//! pointer file. Readers resolve `CURRENT` once at open time and never observe
//! a partially written scan.

mod builder;
#[cfg(test)]
mod fixtures;
mod layout;
mod reader;
mod retention;
mod validate;

pub use builder::{
    BuildOptions, PublishOutcome, SnapshotBuilder, DEFAULT_FILE_INDEX_JSONL_THRESHOLD,
    DEFAULT_RETAIN_SCANS,
};
pub use layout::StoreLayout;
pub use reader::{FileIter, SnapshotReader};
pub use retention::{list_scans, prune_scans, PruneReport};
pub use validate::ValidationReport;

use std::fs;

use crate::error::{DbError, DbResult};

// ============================================================================
// Current-scan pointer
// ============================================================================

/// Read the current scan id, if one has been published.
pub fn read_current(layout: &StoreLayout) -> DbResult<Option<String>> {
    let path = layout.current_path();
    if !path.exists() {
        return Ok(None);
    }

    let content = fs::read_to_string(&path)
        .map_err(|e| DbError::snapshot_io(&path, format!("Failed to read pointer: {}", e)))?;
    let id = content.trim();
    if id.is_empty() {
        return Ok(None);
    }
    if !layout::is_valid_scan_id(id) {
        return Err(DbError::snapshot_parse(
            &path,
            format!("Invalid scan id in pointer: '{}'", id),
        ));
    }
    Ok(Some(id.to_string()))
}

/// Point `CURRENT` at `scan_id` with a single rename.
pub fn write_current(layout: &StoreLayout, scan_id: &str) -> DbResult<()> {
    let path = layout.current_path();
    let tmp = layout.root().join("CURRENT.tmp");

    fs::create_dir_all(layout.root())
        .map_err(|e| DbError::snapshot_io(layout.root(), format!("Failed to create directory: {}", e)))?;
    fs::write(&tmp, format!("{}\n", scan_id))
        .map_err(|e| DbError::snapshot_io(&tmp, format!("Failed to write pointer: {}", e)))?;
    fs::rename(&tmp, &path)
        .map_err(|e| DbError::snapshot_io(&path, format!("Failed to replace pointer: {}", e)))?;
    Ok(())
}
