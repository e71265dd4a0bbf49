//! Chunk identity.
//!
//! A chunk id is the lowercase hex SHA-256 of `(path, file hash, start, end)`.
//! Two older formats still appear in snapshots written before content
//! addressing:
//!
//! - legacy v2: `<12 hex of sha256(path)>:<start>-<end>`
//! - legacy v1: `chunk_<NNNN>` (position only)
//!
//! Ids are only ever compared, never parsed back into attributes.

use std::sync::LazyLock;

use grk_db::{ChunkRecord, ChunkRepository, FileRecord, MemoryChunkRepository};
use regex::Regex;
use serde::Serialize;
use sha2::{Digest, Sha256};

/// Length of a current-format id.
pub const CHUNK_ID_LEN: usize = 64;

/// Hex characters of the path hash in a legacy v2 id.
const LEGACY_V2_PATH_HASH_LEN: usize = 12;

static LEGACY_V2_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9a-f]{12}:[0-9]+-[0-9]+$").expect("Invalid regex"));

static LEGACY_V1_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^chunk_[0-9]{4}$").expect("Invalid regex"));

// ============================================================================
// Computation
// ============================================================================

/// Compute the current-format id of a chunk.
///
/// Fields are separated by a NUL byte so that `("a:1", ...)` and `("a", "1:...")`
/// cannot collide.
pub fn compute_chunk_id(path: &str, file_hash: &str, start_line: u32, end_line: u32) -> String {
    let mut hasher = Sha256::new();
    hasher.update(path.as_bytes());
    hasher.update([0u8]);
    hasher.update(file_hash.as_bytes());
    hasher.update([0u8]);
    hasher.update(start_line.to_string().as_bytes());
    hasher.update([0u8]);
    hasher.update(end_line.to_string().as_bytes());
    hex::encode(hasher.finalize())
}

/// Produce a legacy v2 id.
pub fn legacy_v2_chunk_id(path: &str, start_line: u32, end_line: u32) -> String {
    let path_hash = hex::encode(Sha256::digest(path.as_bytes()));
    format!(
        "{}:{}-{}",
        &path_hash[..LEGACY_V2_PATH_HASH_LEN],
        start_line,
        end_line
    )
}

/// Produce a legacy v1 id.
pub fn legacy_v1_chunk_id(sequence: u32) -> String {
    format!("chunk_{:04}", sequence)
}

/// Stable id of a file record, derived from its path.
pub fn file_id(path: &str) -> String {
    hex::encode(Sha256::digest(path.as_bytes()))
}

/// Hex SHA-256 of arbitrary content.
pub fn content_hash(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

// ============================================================================
// Format detection
// ============================================================================

/// Format of a chunk id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ChunkIdFormat {
    Current,
    LegacyV2,
    LegacyV1,
    Unrecognized,
}

impl std::fmt::Display for ChunkIdFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Current => write!(f, "current"),
            Self::LegacyV2 => write!(f, "legacy-v2"),
            Self::LegacyV1 => write!(f, "legacy-v1"),
            Self::Unrecognized => write!(f, "unrecognized"),
        }
    }
}

/// Classify an id into exactly one format.
pub fn detect_format(id: &str) -> ChunkIdFormat {
    if id.len() == CHUNK_ID_LEN
        && id
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
    {
        ChunkIdFormat::Current
    } else if LEGACY_V2_RE.is_match(id) {
        ChunkIdFormat::LegacyV2
    } else if LEGACY_V1_RE.is_match(id) {
        ChunkIdFormat::LegacyV1
    } else {
        ChunkIdFormat::Unrecognized
    }
}

// ============================================================================
// Verification and regeneration
// ============================================================================

/// Whether a chunk's stored id matches the id recomputed from its attributes.
pub fn verify(chunk: &ChunkRecord) -> bool {
    chunk.id == compute_chunk_id(&chunk.path, &chunk.file_hash, chunk.start_line, chunk.end_line)
}

/// Recompute the id, moving the previous id into `old_id`.
///
/// Returns `false` (and leaves the chunk untouched) when the id is already
/// current.
pub fn regenerate(chunk: &mut ChunkRecord) -> bool {
    let fresh = compute_chunk_id(&chunk.path, &chunk.file_hash, chunk.start_line, chunk.end_line);
    if fresh == chunk.id {
        return false;
    }
    chunk.old_id = Some(std::mem::replace(&mut chunk.id, fresh));
    true
}

// ============================================================================
// Snapshot-wide report and migration
// ============================================================================

/// Id formats and drift across a set of chunks.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IdVerificationReport {
    pub total: usize,
    pub current: usize,
    pub legacy_v2: usize,
    pub legacy_v1: usize,
    pub unrecognized: usize,
    /// Current-format ids that no longer match their attributes.
    pub drifted: Vec<String>,
}

impl IdVerificationReport {
    /// Build a report over a chunk sequence.
    pub fn from_chunks<'a>(chunks: impl IntoIterator<Item = &'a ChunkRecord>) -> Self {
        let mut report = Self::default();
        for chunk in chunks {
            report.record(chunk);
        }
        report.drifted.sort();
        report
    }

    fn record(&mut self, chunk: &ChunkRecord) {
        self.total += 1;
        match detect_format(&chunk.id) {
            ChunkIdFormat::Current => {
                self.current += 1;
                if !verify(chunk) {
                    self.drifted.push(chunk.id.clone());
                }
            }
            ChunkIdFormat::LegacyV2 => self.legacy_v2 += 1,
            ChunkIdFormat::LegacyV1 => self.legacy_v1 += 1,
            ChunkIdFormat::Unrecognized => self.unrecognized += 1,
        }
    }

    /// Whether every id is current and none drifted.
    pub fn is_clean(&self) -> bool {
        self.current == self.total && self.drifted.is_empty()
    }

    /// Ids a migration would rewrite.
    pub fn needs_migration(&self) -> usize {
        self.total - self.current + self.drifted.len()
    }
}

/// Rewrite every non-current or drifted id in `repository`.
///
/// File records' chunk lists follow the new ids. Returns the number of chunks
/// whose id changed.
pub fn migrate_repository(repository: &mut MemoryChunkRepository) -> usize {
    let paths: Vec<String> = repository.files().map(|f| f.path.clone()).collect();
    let mut changed = 0;

    for path in paths {
        let mut chunks = repository.chunks_for(&path).to_vec();
        let mut file_changed = false;
        for chunk in &mut chunks {
            if regenerate(chunk) {
                changed += 1;
                file_changed = true;
            }
        }
        if file_changed {
            if let Some(file) = repository.file(&path).cloned() {
                repository.replace_file(file, chunks);
            }
        }
    }

    changed
}

/// Convenience used by builders: a file record with path-derived id.
pub fn new_file_record(path: &str, content_hash: String, line_count: u32, size: u64) -> FileRecord {
    FileRecord {
        id: file_id(path),
        path: path.to_string(),
        extension: None,
        language: None,
        size,
        content_hash,
        line_count,
        binary: false,
        excluded: false,
        symbols: Vec::new(),
        imports: Vec::new(),
        chunk_ids: Vec::new(),
    }
}

// ============================================================================
// Tests
// ============================================================================
