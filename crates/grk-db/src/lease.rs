//! Per-project build lease.
//!
//! At most one build may run for a project at a time. The lease is an
//! advisory exclusive lock on `.grounded/build.lock`; it is released when the
//! [`BuildLease`] is dropped, or by the OS if the process dies.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use fs2::FileExt;
use tracing::debug;

use crate::error::{DbError, DbResult};

/// Held exclusive build lease.
#[derive(Debug)]
pub struct BuildLease {
    file: File,
    path: PathBuf,
}

impl BuildLease {
    /// Try to take the lease without blocking.
    ///
    /// Returns `Ok(None)` when another build already holds it.
    pub fn try_acquire(path: &Path) -> DbResult<Option<Self>> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| DbError::lease(parent, format!("Failed to create directory: {}", e)))?;
        }

        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .map_err(|e| DbError::lease(path, format!("Failed to open: {}", e)))?;

        match file.try_lock_exclusive() {
            Ok(()) => {}
            Err(e) if e.kind() == fs2::lock_contended_error().kind() => {
                debug!("Build lease {} is held by another build", path.display());
                return Ok(None);
            }
            Err(e) => return Err(DbError::lease(path, format!("Failed to lock: {}", e))),
        }

        // Best-effort owner marker for operators inspecting the lock file.
        let _ = file.set_len(0);
        let _ = writeln!(file, "{}", std::process::id());

        debug!("Acquired build lease {}", path.display());
        Ok(Some(Self {
            file,
            path: path.to_path_buf(),
        }))
    }

    /// Path of the lock file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for BuildLease {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
        debug!("Released build lease {}", self.path.display());
    }
}
