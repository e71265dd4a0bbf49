use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use super::layout::{self, StoreLayout, CHUNKS_FILE, DIRECTORIES_FILE, META_FILE};
use super::read_current;
use crate::cache::Cache;
use crate::error::{DbError, DbResult};
use crate::jsonl::JsonlStream;
use crate::records::{ChunkRecord, DirectoryStats, FileIndexFormat, FileRecord, ScanMeta, SCHEMA_VERSION};

/// Default TTL for chunk lookups cached by the reader.
const DEFAULT_CHUNK_TTL: Duration = Duration::from_secs(300);

// ============================================================================
// FileIter
// ============================================================================

/// Forward-only sequence over a scan's file index.
///
/// Array-form indexes are small and loaded up front; line-delimited indexes
/// are streamed.
pub enum FileIter {
    Loaded(std::vec::IntoIter<FileRecord>),
    Streamed(JsonlStream<FileRecord>),
}

impl Iterator for FileIter {
    type Item = FileRecord;

    fn next(&mut self) -> Option<FileRecord> {
        match self {
            Self::Loaded(iter) => iter.next(),
            Self::Streamed(stream) => stream.next(),
        }
    }
}

// ============================================================================
// SnapshotReader
// ============================================================================

/// Read access to one published scan.
///
/// The reader pins a scan at open time; publishing a newer scan does not
/// affect an open reader.
pub struct SnapshotReader {
    meta: ScanMeta,
    scan_dir: PathBuf,
    cache: Option<Arc<dyn Cache<ChunkRecord>>>,
    cache_ttl: Duration,
    passes: AtomicUsize,
}

impl SnapshotReader {
    /// Open the scan `scan_id`.
    pub fn open(
        layout: &StoreLayout,
        scan_id: &str,
        cache: Option<Arc<dyn Cache<ChunkRecord>>>,
    ) -> DbResult<Self> {
        if !layout::is_valid_scan_id(scan_id) {
            return Err(DbError::ScanNotFound {
                scan_id: scan_id.to_string(),
            });
        }
        let scan_dir = layout.scan_dir(scan_id);
        let meta_path = scan_dir.join(META_FILE);
        if !meta_path.exists() {
            return Err(DbError::ScanNotFound {
                scan_id: scan_id.to_string(),
            });
        }

        let meta: ScanMeta = read_json(&meta_path)?;
        if meta.schema_version > SCHEMA_VERSION {
            return Err(DbError::UnsupportedSchema {
                scan_id: scan_id.to_string(),
                found: meta.schema_version,
                supported: SCHEMA_VERSION,
            });
        }

        debug!(
            "Opened scan {} (schema v{}, {} chunks)",
            meta.scan_id, meta.schema_version, meta.stats.chunk_count
        );
        Ok(Self {
            meta,
            scan_dir,
            cache,
            cache_ttl: DEFAULT_CHUNK_TTL,
            passes: AtomicUsize::new(0),
        })
    }

    /// Open the scan the `CURRENT` pointer names.
    ///
    /// Fails with [`DbError::ScanNotAvailable`] when nothing was published or
    /// the pointed-to scan is gone.
    pub fn open_current(
        layout: &StoreLayout,
        cache: Option<Arc<dyn Cache<ChunkRecord>>>,
    ) -> DbResult<Self> {
        let unavailable = || DbError::ScanNotAvailable {
            root: layout.root().to_path_buf(),
        };
        let scan_id = read_current(layout)?.ok_or_else(unavailable)?;
        match Self::open(layout, &scan_id, cache) {
            Err(DbError::ScanNotFound { .. }) => Err(unavailable()),
            other => other,
        }
    }

    /// Set the TTL used for chunks cached during lookups.
    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    pub fn meta(&self) -> &ScanMeta {
        &self.meta
    }

    pub fn scan_id(&self) -> &str {
        &self.meta.scan_id
    }

    pub fn scan_dir(&self) -> &Path {
        &self.scan_dir
    }

    // ------------------------------------------------------------------------
    // Whole-collection reads
    // ------------------------------------------------------------------------

    /// Directory statistics (empty for scans written without them).
    pub fn directories(&self) -> DbResult<Vec<DirectoryStats>> {
        let path = self.scan_dir.join(DIRECTORIES_FILE);
        if !path.exists() {
            return Ok(Vec::new());
        }
        read_json(&path)
    }

    /// The complete file index.
    pub fn files(&self) -> DbResult<Vec<FileRecord>> {
        Ok(self.stream_files()?.collect())
    }

    // ------------------------------------------------------------------------
    // Streams
    // ------------------------------------------------------------------------

    /// Single-pass sequence over the file index.
    pub fn stream_files(&self) -> DbResult<FileIter> {
        let format = self.meta.file_index_format;
        let path = self.scan_dir.join(layout::files_file(format));
        match format {
            FileIndexFormat::Json => {
                let files: Vec<FileRecord> = read_json(&path)?;
                Ok(FileIter::Loaded(files.into_iter()))
            }
            FileIndexFormat::Jsonl => Ok(FileIter::Streamed(JsonlStream::open(&path)?)),
        }
    }

    /// Single-pass sequence over the chunk set.
    ///
    /// Structurally invalid records are skipped like malformed ones.
    pub fn stream_chunks(&self) -> DbResult<impl Iterator<Item = ChunkRecord>> {
        let stream = JsonlStream::<ChunkRecord>::open(&self.scan_dir.join(CHUNKS_FILE))?;
        self.passes.fetch_add(1, Ordering::Relaxed);
        Ok(stream.filter(|chunk| {
            let ok = chunk.is_well_formed();
            if !ok {
                warn!(
                    "Skipping invalid chunk '{}' ({}:{}-{})",
                    chunk.id, chunk.path, chunk.start_line, chunk.end_line
                );
            }
            ok
        }))
    }

    /// Number of chunk streams opened by this reader.
    pub fn streaming_passes(&self) -> usize {
        self.passes.load(Ordering::Relaxed)
    }

    // ------------------------------------------------------------------------
    // Lookups
    // ------------------------------------------------------------------------

    /// Look up a single chunk by id.
    pub fn chunk(&self, id: &str) -> DbResult<Option<ChunkRecord>> {
        Ok(self.chunks_by_ids(&[id])?.into_iter().next())
    }

    /// Look up chunks by id, in request order; unknown ids are omitted.
    ///
    /// Cached entries are served first. Remaining ids are resolved with one
    /// streaming pass that caches every record it reads and stops as soon as
    /// all ids are found.
    pub fn chunks_by_ids(&self, ids: &[&str]) -> DbResult<Vec<ChunkRecord>> {
        let mut found: HashMap<String, ChunkRecord> = HashMap::with_capacity(ids.len());
        let mut wanted: HashSet<&str> = HashSet::new();

        for &id in ids {
            match self.cache.as_ref().and_then(|c| c.get(&self.cache_key(id))) {
                Some(chunk) => {
                    found.insert(id.to_string(), chunk);
                }
                None => {
                    wanted.insert(id);
                }
            }
        }

        if !wanted.is_empty() {
            let cache_hits = found.len();
            for chunk in self.stream_chunks()? {
                if let Some(cache) = &self.cache {
                    cache.put(&self.cache_key(&chunk.id), chunk.clone(), self.cache_ttl);
                }
                if wanted.remove(chunk.id.as_str()) {
                    found.insert(chunk.id.clone(), chunk);
                    if wanted.is_empty() {
                        break;
                    }
                }
            }
            debug!(
                "Chunk lookup: {} requested, {} from cache, {} unresolved",
                ids.len(),
                cache_hits,
                wanted.len()
            );
        }

        Ok(ids.iter().filter_map(|id| found.get(*id).cloned()).collect())
    }

    fn cache_key(&self, chunk_id: &str) -> String {
        format!("{}:{}", self.meta.scan_id, chunk_id)
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> DbResult<T> {
    let file = File::open(path)
        .map_err(|e| DbError::snapshot_io(path, format!("Failed to open: {}", e)))?;
    serde_json::from_reader(BufReader::new(file))
        .map_err(|e| DbError::snapshot_parse(path, e.to_string()))
}
