//! Error types for grk-db.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for grk-db operations.
pub type DbResult<T> = Result<T, DbError>;

/// Errors that can occur in grk-db operations.
#[derive(Debug, Error)]
pub enum DbError {
    // ========================================================================
    // Snapshot errors
    // ========================================================================
    /// Snapshot file I/O error.
    #[error("Snapshot I/O error at {path}: {message}")]
    SnapshotIo { path: PathBuf, message: String },

    /// Snapshot file could not be parsed.
    #[error("Snapshot parse error at {path}: {message}")]
    SnapshotParse { path: PathBuf, message: String },

    /// The project has no published scan (no CURRENT pointer or missing directory).
    #[error("No knowledge-base scan available under {root}")]
    ScanNotAvailable { root: PathBuf },

    /// The requested scan id does not exist.
    #[error("Scan '{scan_id}' not found")]
    ScanNotFound { scan_id: String },

    /// The scan was written by a newer, incompatible schema.
    #[error("Scan '{scan_id}' uses schema version {found}; this build supports up to {supported}")]
    UnsupportedSchema {
        scan_id: String,
        found: u32,
        supported: u32,
    },

    // ========================================================================
    // Lease errors
    // ========================================================================
    /// The build lease file could not be opened or locked.
    #[error("Build lease error at {path}: {message}")]
    Lease { path: PathBuf, message: String },

    // ========================================================================
    // General errors
    // ========================================================================
    /// IO error wrapper.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error wrapper.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl DbError {
    /// Create a snapshot I/O error.
    pub fn snapshot_io(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::SnapshotIo {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a snapshot parse error.
    pub fn snapshot_parse(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::SnapshotParse {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a lease error.
    pub fn lease(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Lease {
            path: path.into(),
            message: message.into(),
        }
    }
}
