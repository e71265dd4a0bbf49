use std::fs;

use serde::Serialize;
use tracing::{debug, info, warn};

use super::layout::{self, StoreLayout, META_FILE};
use super::read_current;
use crate::error::{DbError, DbResult};
use crate::records::ScanMeta;

/// Scans removed and kept by [`prune_scans`].
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PruneReport {
    pub removed: Vec<String>,
    pub kept: Vec<String>,
    pub stale_staging_removed: usize,
}

/// All readable scans, oldest first by recorded scan time.
///
/// Directories without a parseable `meta.json` are skipped.
pub fn list_scans(layout: &StoreLayout) -> DbResult<Vec<ScanMeta>> {
    let scans_dir = layout.scans_dir();
    if !scans_dir.exists() {
        return Ok(Vec::new());
    }

    let entries = fs::read_dir(&scans_dir)
        .map_err(|e| DbError::snapshot_io(&scans_dir, format!("Failed to list scans: {}", e)))?;

    let mut scans = Vec::new();
    for entry in entries.flatten() {
        let name = entry.file_name().to_string_lossy().to_string();
        if !layout::is_valid_scan_id(&name) || !entry.path().is_dir() {
            continue;
        }
        let meta_path = entry.path().join(META_FILE);
        let meta = fs::read_to_string(&meta_path)
            .map_err(|e| e.to_string())
            .and_then(|s| serde_json::from_str::<ScanMeta>(&s).map_err(|e| e.to_string()));
        match meta {
            Ok(meta) => scans.push(meta),
            Err(e) => warn!("Ignoring scan directory {}: {}", entry.path().display(), e),
        }
    }

    scans.sort_by(|a, b| {
        a.created_at
            .cmp(&b.created_at)
            .then_with(|| a.scan_id.cmp(&b.scan_id))
    });
    Ok(scans)
}

/// Keep the `retain` most recent scans and delete the rest, oldest first.
///
/// The current scan is never deleted. Leftover staging directories from
/// interrupted builds are removed too, so callers must hold the build lease.
pub fn prune_scans(layout: &StoreLayout, retain: usize) -> DbResult<PruneReport> {
    let retain = retain.max(1);
    let current = read_current(layout)?;
    let scans = list_scans(layout)?;
    let mut report = PruneReport::default();

    let cutoff = scans.len().saturating_sub(retain);
    for (index, meta) in scans.into_iter().enumerate() {
        let is_current = current.as_deref() == Some(meta.scan_id.as_str());
        if index >= cutoff || is_current {
            report.kept.push(meta.scan_id);
            continue;
        }

        let dir = layout.scan_dir(&meta.scan_id);
        fs::remove_dir_all(&dir)
            .map_err(|e| DbError::snapshot_io(&dir, format!("Failed to remove scan: {}", e)))?;
        debug!("Pruned scan {}", meta.scan_id);
        report.removed.push(meta.scan_id);
    }

    if let Ok(entries) = fs::read_dir(layout.scans_dir()) {
        for entry in entries.flatten() {
            let name = entry.file_name().to_string_lossy().to_string();
            if StoreLayout::is_staging_name(&name) && fs::remove_dir_all(entry.path()).is_ok() {
                report.stale_staging_removed += 1;
            }
        }
    }

    if !report.removed.is_empty() {
        info!(
            "Retention removed {} scan(s), kept {}",
            report.removed.len(),
            report.kept.len()
        );
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::{ScanStats, SCHEMA_VERSION};
    use crate::snapshot::fixtures::sample_repository;
    use crate::snapshot::{write_current, BuildOptions, SnapshotBuilder};
    use chrono::{Duration, Utc};
    use tempfile::TempDir;

    fn fake_scan(layout: &StoreLayout, id: &str, age_minutes: i64) {
        let dir = layout.scan_dir(id);
        fs::create_dir_all(&dir).unwrap();
        let meta = ScanMeta {
            schema_version: SCHEMA_VERSION,
            scan_id: id.to_string(),
            project: "demo".to_string(),
            head_commit: None,
            created_at: Utc::now() - Duration::minutes(age_minutes),
            parent_scan: None,
            file_index_format: Default::default(),
            stats: ScanStats::default(),
        };
        fs::write(dir.join(META_FILE), serde_json::to_string(&meta).unwrap()).unwrap();
    }

    #[test]
    fn test_fourth_build_leaves_three_most_recent() {
        let temp = TempDir::new().unwrap();
        let layout = StoreLayout::new(temp.path());
        fake_scan(&layout, "scan-a", 30);
        fake_scan(&layout, "scan-b", 20);
        fake_scan(&layout, "scan-c", 10);
        write_current(&layout, "scan-c").unwrap();

        let outcome = SnapshotBuilder::new(&layout, BuildOptions::default())
            .publish(&sample_repository(), "demo", None)
            .unwrap();

        assert_eq!(outcome.pruned.removed, vec!["scan-a".to_string()]);
        let remaining: Vec<String> = list_scans(&layout)
            .unwrap()
            .into_iter()
            .map(|m| m.scan_id)
            .collect();
        assert_eq!(
            remaining,
            vec![
                "scan-b".to_string(),
                "scan-c".to_string(),
                outcome.meta.scan_id.clone()
            ]
        );
    }

    #[test]
    fn test_current_scan_survives_pruning() {
        let temp = TempDir::new().unwrap();
        let layout = StoreLayout::new(temp.path());
        fake_scan(&layout, "old-current", 60);
        fake_scan(&layout, "newer-1", 5);
        fake_scan(&layout, "newer-2", 1);
        write_current(&layout, "old-current").unwrap();

        let report = prune_scans(&layout, 1).unwrap();
        assert_eq!(report.removed, vec!["newer-1".to_string()]);
        assert!(layout.scan_dir("old-current").exists());
        assert!(layout.scan_dir("newer-2").exists());
    }

    #[test]
    fn test_stale_staging_and_unreadable_dirs() {
        let temp = TempDir::new().unwrap();
        let layout = StoreLayout::new(temp.path());
        fs::create_dir_all(layout.staging_dir("crashed")).unwrap();
        fs::create_dir_all(layout.scan_dir("no-meta")).unwrap();

        let report = prune_scans(&layout, 3).unwrap();
        assert_eq!(report.stale_staging_removed, 1);
        assert!(report.removed.is_empty());
        assert!(layout.scan_dir("no-meta").exists());
    }

    #[test]
    fn test_list_scans_empty_store() {
        let temp = TempDir::new().unwrap();
        assert!(list_scans(&StoreLayout::new(temp.path())).unwrap().is_empty());
    }
}
