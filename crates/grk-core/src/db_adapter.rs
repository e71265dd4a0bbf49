//! Adapter layer for grk-db infrastructure.
//!
//! Maps storage errors into [`GrkError`] so domain code only deals with one
//! error type.
//!
//! ```text
//! grk-core domain code (engine, retrieval, chunker)
//!        ↓
//!   db_adapter (this module)
//!        ↓
//!     grk-db (snapshots, JSONL streams, lease, cache)
//! ```

use grk_db::DbError;

use crate::errors::GrkError;

/// Convert a grk-db error to a grk-core error.
pub fn from_db_error(err: DbError) -> GrkError {
    match err {
        DbError::Io(io_err) => GrkError::Io(io_err),
        DbError::Json(json_err) => GrkError::Json(json_err),
        DbError::SnapshotIo { path, message } => GrkError::SnapshotIo { path, message },
        DbError::SnapshotParse { path, message } => GrkError::SnapshotParse { path, message },
        DbError::ScanNotAvailable { root } => GrkError::KnowledgeBaseUnavailable { root },
        DbError::ScanNotFound { scan_id } => GrkError::ScanNotFound(scan_id),
        DbError::UnsupportedSchema {
            scan_id,
            found,
            supported,
        } => GrkError::UnsupportedSchema {
            scan_id,
            found,
            supported,
        },
        DbError::Lease { path, message } => GrkError::BuildLease { path, message },
    }
}

impl From<DbError> for GrkError {
    fn from(err: DbError) -> Self {
        from_db_error(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_scan_not_available_maps_to_unavailable() {
        let err = from_db_error(DbError::ScanNotAvailable {
            root: PathBuf::from("/p/.grounded"),
        });
        assert!(matches!(err, GrkError::KnowledgeBaseUnavailable { .. }));
    }

    #[test]
    fn test_lease_error_keeps_path() {
        let err: GrkError = DbError::lease("/p/.grounded/build.lock", "denied").into();
        match err {
            GrkError::BuildLease { path, message } => {
                assert_eq!(path, PathBuf::from("/p/.grounded/build.lock"));
                assert_eq!(message, "denied");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
