use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::layout::{self, StoreLayout, CHUNKS_FILE, DIRECTORIES_FILE, META_FILE};
use super::retention::{prune_scans, PruneReport};
use super::write_current;
use crate::error::{DbError, DbResult};
use crate::jsonl::write_jsonl;
use crate::records::{DirectoryStats, FileIndexFormat, FileRecord, ScanMeta, ScanStats, SCHEMA_VERSION};
use crate::repository::ChunkRepository;

// ============================================================================
// Options & outcome
// ============================================================================

/// Default number of scans kept after a publish.
pub const DEFAULT_RETAIN_SCANS: usize = 3;

/// Default file count above which the file index is written as JSONL.
pub const DEFAULT_FILE_INDEX_JSONL_THRESHOLD: usize = 5_000;

/// Options for [`SnapshotBuilder`].
#[derive(Debug, Clone)]
pub struct BuildOptions {
    /// Scans kept after publishing (the current one always survives).
    pub retain_scans: usize,
    /// File count above which `files.jsonl` replaces `files.json`.
    pub file_index_jsonl_threshold: usize,
    /// Scan this build was derived from, recorded in its metadata.
    pub parent_scan: Option<String>,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            retain_scans: DEFAULT_RETAIN_SCANS,
            file_index_jsonl_threshold: DEFAULT_FILE_INDEX_JSONL_THRESHOLD,
            parent_scan: None,
        }
    }
}

/// Result of a successful publish.
#[derive(Debug, Clone)]
pub struct PublishOutcome {
    /// Metadata of the new current scan.
    pub meta: ScanMeta,
    /// Scans removed by retention.
    pub pruned: PruneReport,
}

// ============================================================================
// SnapshotBuilder
// ============================================================================

/// Writes a repository's working set as a new immutable scan.
///
/// Callers must hold the project's [`crate::BuildLease`].
pub struct SnapshotBuilder<'a> {
    layout: &'a StoreLayout,
    options: BuildOptions,
}

impl<'a> SnapshotBuilder<'a> {
    pub fn new(layout: &'a StoreLayout, options: BuildOptions) -> Self {
        Self { layout, options }
    }

    /// Write, publish and prune.
    ///
    /// The current pointer is flipped only after the scan directory is fully
    /// written and renamed into place. On failure the staging directory is
    /// removed and the previous scan stays current.
    pub fn publish(
        &self,
        repository: &dyn ChunkRepository,
        project: &str,
        head_commit: Option<&str>,
    ) -> DbResult<PublishOutcome> {
        let created_at = Utc::now();
        let scan_id = generate_scan_id(created_at);
        let staging = self.layout.staging_dir(&scan_id);
        let target = self.layout.scan_dir(&scan_id);

        fs::create_dir_all(&staging)
            .map_err(|e| DbError::snapshot_io(&staging, format!("Failed to create staging: {}", e)))?;

        let meta = match self.write_scan(&staging, &scan_id, created_at, repository, project, head_commit) {
            Ok(meta) => meta,
            Err(e) => {
                if let Err(cleanup) = fs::remove_dir_all(&staging) {
                    warn!("Failed to remove staging {}: {}", staging.display(), cleanup);
                }
                return Err(e);
            }
        };

        fs::rename(&staging, &target).map_err(|e| {
            if let Err(cleanup) = fs::remove_dir_all(&staging) {
                warn!("Failed to remove staging {}: {}", staging.display(), cleanup);
            }
            DbError::snapshot_io(&target, format!("Failed to publish scan: {}", e))
        })?;
        write_current(self.layout, &scan_id)?;

        info!(
            "Published scan {} ({} files, {} chunks)",
            scan_id, meta.stats.file_count, meta.stats.chunk_count
        );

        let pruned = prune_after_publish(self.layout, self.options.retain_scans);
        Ok(PublishOutcome { meta, pruned })
    }

    fn write_scan(
        &self,
        dir: &Path,
        scan_id: &str,
        created_at: DateTime<Utc>,
        repository: &dyn ChunkRepository,
        project: &str,
        head_commit: Option<&str>,
    ) -> DbResult<ScanMeta> {
        let file_count = repository.file_count();
        let format = if file_count > self.options.file_index_jsonl_threshold {
            FileIndexFormat::Jsonl
        } else {
            FileIndexFormat::Json
        };

        let files_path = dir.join(layout::files_file(format));
        match format {
            FileIndexFormat::Json => {
                let files: Vec<&FileRecord> = repository.files().collect();
                write_json(&files_path, &files)?;
            }
            FileIndexFormat::Jsonl => {
                write_jsonl(&files_path, repository.files())?;
            }
        }
        debug!("Wrote {} file records ({})", file_count, format);

        let chunks = repository
            .files()
            .flat_map(|file| repository.chunks_for(&file.path).iter());
        let chunk_count = write_jsonl(&dir.join(CHUNKS_FILE), chunks)?;
        debug!("Wrote {} chunk records", chunk_count);

        let directories = directory_stats(repository);
        write_json(&dir.join(DIRECTORIES_FILE), &directories)?;

        let meta = ScanMeta {
            schema_version: SCHEMA_VERSION,
            scan_id: scan_id.to_string(),
            project: project.to_string(),
            head_commit: head_commit.map(str::to_string),
            created_at,
            parent_scan: self.options.parent_scan.clone(),
            file_index_format: format,
            stats: scan_stats(repository),
        };
        // Written last: a scan directory without meta.json is never readable.
        write_json(&dir.join(META_FILE), &meta)?;
        Ok(meta)
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Retention after the pointer flip. The new scan is already current, so a
/// failure here is logged and reported as an empty prune.
fn prune_after_publish(layout: &StoreLayout, retain: usize) -> PruneReport {
    match prune_scans(layout, retain) {
        Ok(report) => report,
        Err(e) => {
            warn!("Retention after publish failed: {}", e);
            PruneReport::default()
        }
    }
}

/// Time-sortable, collision-resistant scan id.
fn generate_scan_id(now: DateTime<Utc>) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{}-{}", now.format("%Y%m%dT%H%M%S%3fZ"), &suffix[..8])
}

fn write_json<T: serde::Serialize + ?Sized>(path: &Path, value: &T) -> DbResult<()> {
    let file = File::create(path)
        .map_err(|e| DbError::snapshot_io(path, format!("Failed to create: {}", e)))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, value)?;
    writer
        .flush()
        .map_err(|e| DbError::snapshot_io(path, format!("Failed to flush: {}", e)))?;
    writer
        .get_ref()
        .sync_all()
        .map_err(|e| DbError::snapshot_io(path, format!("Failed to sync: {}", e)))?;
    Ok(())
}

fn scan_stats(repository: &dyn ChunkRepository) -> ScanStats {
    let mut stats = ScanStats::default();
    for file in repository.files() {
        stats.file_count += 1;
        if !file.is_indexable() {
            continue;
        }
        let chunks = repository.chunks_for(&file.path);
        stats.indexed_file_count += 1;
        stats.chunk_count += chunks.len() as u64;
        stats.complete_file_chunks += chunks.iter().filter(|c| c.is_complete_file).count() as u64;
        stats.total_lines += u64::from(file.line_count);
        stats.total_bytes += file.size;
    }
    stats
}

fn directory_stats(repository: &dyn ChunkRepository) -> Vec<DirectoryStats> {
    let mut dirs: BTreeMap<String, DirectoryStats> = BTreeMap::new();
    for file in repository.files() {
        let dir = file.directory();
        let entry = dirs.entry(dir.to_string()).or_insert_with(|| DirectoryStats {
            path: dir.to_string(),
            ..Default::default()
        });
        entry.file_count += 1;
        entry.chunk_count += repository.chunks_for(&file.path).len() as u64;
        entry.line_count += u64::from(file.line_count);
        entry.bytes += file.size;
        if let Some(language) = &file.language {
            *entry.languages.entry(language.clone()).or_insert(0) += 1;
        }
    }
    dirs.into_values().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::fixtures::sample_repository;
    use crate::snapshot::{read_current, SnapshotReader};
    use tempfile::TempDir;

    #[test]
    fn test_publish_writes_complete_scan_and_flips_pointer() {
        let temp = TempDir::new().unwrap();
        let layout = StoreLayout::new(temp.path().join(".grounded"));
        let repo = sample_repository();

        let outcome = SnapshotBuilder::new(&layout, BuildOptions::default())
            .publish(&repo, "demo", Some("abc123"))
            .unwrap();

        let scan_id = &outcome.meta.scan_id;
        assert_eq!(read_current(&layout).unwrap().as_deref(), Some(scan_id.as_str()));
        let dir = layout.scan_dir(scan_id);
        for name in [META_FILE, "files.json", CHUNKS_FILE, DIRECTORIES_FILE] {
            assert!(dir.join(name).exists(), "missing {}", name);
        }
        assert!(!layout.staging_dir(scan_id).exists());
        assert_eq!(outcome.meta.stats.file_count, 3);
        assert_eq!(outcome.meta.stats.indexed_file_count, 2);
        assert_eq!(outcome.meta.stats.chunk_count, 3);
        assert_eq!(outcome.meta.head_commit.as_deref(), Some("abc123"));
    }

    #[test]
    fn test_large_file_index_uses_jsonl() {
        let temp = TempDir::new().unwrap();
        let layout = StoreLayout::new(temp.path());
        let options = BuildOptions {
            file_index_jsonl_threshold: 1,
            ..Default::default()
        };

        let outcome = SnapshotBuilder::new(&layout, options)
            .publish(&sample_repository(), "demo", None)
            .unwrap();
        assert_eq!(outcome.meta.file_index_format, FileIndexFormat::Jsonl);

        let reader = SnapshotReader::open_current(&layout, None).unwrap();
        assert_eq!(reader.files().unwrap().len(), 3);
    }

    #[test]
    fn test_retention_failure_after_publish_is_not_an_error() {
        let temp = TempDir::new().unwrap();
        let layout = StoreLayout::new(temp.path());
        let current = layout.current_path();
        fs::create_dir_all(current.parent().unwrap()).unwrap();
        fs::write(&current, "not a scan id\n").unwrap();
        assert!(prune_scans(&layout, 1).is_err());

        let report = prune_after_publish(&layout, 1);
        assert!(report.removed.is_empty());
        assert!(report.kept.is_empty());
    }

    #[test]
    fn test_directory_stats() {
        let dirs = directory_stats(&sample_repository());
        let paths: Vec<&str> = dirs.iter().map(|d| d.path.as_str()).collect();
        assert_eq!(paths, vec!["", "src"]);
        let src = &dirs[1];
        assert_eq!(src.file_count, 2);
        assert_eq!(src.chunk_count, 3);
        assert_eq!(src.languages.get("Rust"), Some(&2));
    }

    #[test]
    fn test_scan_ids_sort_by_time() {
        let earlier = generate_scan_id("2026-01-01T00:00:00Z".parse().unwrap());
        let later = generate_scan_id("2026-01-01T00:00:01Z".parse().unwrap());
        assert!(earlier < later);
        assert!(layout::is_valid_scan_id(&earlier));
    }
}
