//! On-disk record schema for knowledge-base scans.
//!
//! Every artifact written by [`crate::snapshot::SnapshotBuilder`] is made of
//! these records. Optional fields use `#[serde(default)]` so that scans written
//! by an older scanner remain readable; [`ScanMeta::schema_version`] is checked
//! at the read boundary to reject scans written by a newer, incompatible build.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Constants
// ============================================================================

/// Current on-disk schema version.
///
/// - `1`: chunk ids in `chunk_<NNNN>` / `<path-hash>:<start>-<end>` form, no `oldId`
/// - `2`: content-addressed ids, `oldId` lineage, directory statistics
pub const SCHEMA_VERSION: u32 = 2;

// ============================================================================
// FileRecord
// ============================================================================

/// One file as seen by the scanner when the scan was taken.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRecord {
    /// Stable id derived from the path hash.
    pub id: String,

    /// Project-relative path with forward slashes.
    pub path: String,

    /// File extension without the leading dot.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extension: Option<String>,

    /// Detected language, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,

    /// Size in bytes.
    #[serde(default)]
    pub size: u64,

    /// Content hash of the whole file (hex).
    pub content_hash: String,

    /// Number of lines in the file.
    #[serde(default)]
    pub line_count: u32,

    /// Whether the file was detected as binary.
    #[serde(default)]
    pub binary: bool,

    /// Whether the file was excluded from chunking.
    #[serde(default)]
    pub excluded: bool,

    /// Symbols declared in the file.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub symbols: Vec<String>,

    /// Imports declared in the file.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub imports: Vec<String>,

    /// Ids of the chunks owned by this file, in sequence order.
    #[serde(default)]
    pub chunk_ids: Vec<String>,
}

impl FileRecord {
    /// Whether the file takes part in chunking.
    pub fn is_indexable(&self) -> bool {
        !self.binary && !self.excluded
    }

    /// Top-level-relative directory of this file (`""` for root files).
    pub fn directory(&self) -> &str {
        self.path.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("")
    }
}

// ============================================================================
// ChunkRecord
// ============================================================================

/// One chunk: a contiguous, 1-based inclusive line range of one file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkRecord {
    /// Chunk identity.
    pub id: String,

    /// Previous identity, kept when the id was regenerated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_id: Option<String>,

    /// Owning file path.
    pub path: String,

    /// First line (1-based, inclusive).
    pub start_line: u32,

    /// Last line (1-based, inclusive).
    pub end_line: u32,

    /// Position of this chunk within its file (0-based).
    #[serde(default)]
    pub sequence: u32,

    /// Content hash of the owning file when the chunk was built.
    pub file_hash: String,

    /// Content hash of the chunk's own lines.
    #[serde(default)]
    pub content_hash: String,

    /// True iff this is the only chunk of its file.
    #[serde(default)]
    pub is_complete_file: bool,

    /// Symbols declared inside the chunk.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub symbols: Vec<String>,

    /// File-level symbols referenced inside the chunk.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub used_symbols: Vec<String>,

    /// Imports that appear inside the chunk.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub imports: Vec<String>,

    /// Outbound references (import targets resolved to paths when known).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub references: Vec<String>,

    /// Serialized size of the chunk's content in bytes.
    #[serde(default)]
    pub size_bytes: u64,
}

impl ChunkRecord {
    /// Number of lines covered by this chunk.
    pub fn line_count(&self) -> u32 {
        self.end_line.saturating_sub(self.start_line) + 1
    }

    /// Structural sanity check applied when reading snapshots.
    pub fn is_well_formed(&self) -> bool {
        !self.id.is_empty() && !self.path.is_empty() && self.start_line >= 1 && self.end_line >= self.start_line
    }
}

// ============================================================================
// ScanMeta
// ============================================================================

/// Storage format used for a scan's file index.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileIndexFormat {
    /// `files.json`: a single JSON array.
    #[default]
    Json,
    /// `files.jsonl`: one record per line, used above the size threshold.
    Jsonl,
}

impl std::fmt::Display for FileIndexFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Json => write!(f, "json"),
            Self::Jsonl => write!(f, "jsonl"),
        }
    }
}

/// Aggregate statistics for one scan.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanStats {
    /// Files in the index (including excluded ones).
    pub file_count: u64,
    /// Files that were chunked.
    #[serde(default)]
    pub indexed_file_count: u64,
    /// Chunks in the chunk set.
    pub chunk_count: u64,
    /// Chunks flagged `isCompleteFile`.
    #[serde(default)]
    pub complete_file_chunks: u64,
    /// Sum of line counts over indexed files.
    #[serde(default)]
    pub total_lines: u64,
    /// Sum of sizes over indexed files.
    #[serde(default)]
    pub total_bytes: u64,
}

/// Metadata for one immutable scan.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanMeta {
    /// Schema version the scan was written with.
    pub schema_version: u32,

    /// Unique, time-sortable scan id (also the directory name).
    pub scan_id: String,

    /// Project identity.
    pub project: String,

    /// Git HEAD commit at scan time, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub head_commit: Option<String>,

    /// When the scan was written.
    pub created_at: DateTime<Utc>,

    /// Scan this one was incrementally derived from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_scan: Option<String>,

    /// Format of the file index.
    #[serde(default)]
    pub file_index_format: FileIndexFormat,

    /// Aggregate statistics.
    #[serde(default)]
    pub stats: ScanStats,
}

// ============================================================================
// DirectoryStats
// ============================================================================

/// Aggregate statistics for one directory (non-recursive).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryStats {
    /// Directory path (`""` for the project root).
    pub path: String,
    /// Files directly in this directory.
    pub file_count: u64,
    /// Chunks owned by those files.
    pub chunk_count: u64,
    /// Total lines of those files.
    pub line_count: u64,
    /// Total bytes of those files.
    pub bytes: u64,
    /// Per-language file counts.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub languages: BTreeMap<String, u64>,
}

// ============================================================================
// Tests
// ============================================================================
