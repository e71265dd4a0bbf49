//! Workspace detection.
//!
//! A [`Workspace`] is a project directory plus the `.grounded/` data directory
//! that holds its configuration, external facts and published scans.

use std::path::{Path, PathBuf};

use grk_db::StoreLayout;

use crate::constants::{
    ASK_LOG_FILENAME, GROUNDED_DIR, PROJECT_CONFIG_FILENAME, ROUTES_FILENAME, STACK_FILENAME,
};
use crate::errors::GrkError;

/// Check if a path is a disk root (e.g., `C:\` on Windows, `/` on Unix).
fn is_disk_root(path: &Path) -> bool {
    if path.parent().is_some() {
        return false;
    }

    #[cfg(windows)]
    {
        if let Some(s) = path.to_str() {
            if s.len() >= 2 && s.chars().nth(1) == Some(':') {
                return true;
            }
        }
    }

    #[cfg(not(windows))]
    {
        if path == Path::new("/") {
            return true;
        }
    }

    path.canonicalize().is_ok_and(|p| p.parent().is_none())
}

// ============================================================================
// Workspace
// ============================================================================

/// A resolved GRK workspace.
///
/// ```ignore
/// let workspace = Workspace::resolve(Path::new("."))?;
/// println!("Data dir: {}", workspace.data_dir().display());
/// ```
#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
    data_dir: PathBuf,
    has_git: bool,
}

impl Workspace {
    /// Create a `Workspace` from a root directory path.
    ///
    /// # Errors
    ///
    /// Returns [`GrkError::PathNotFound`] if the path does not exist or is not
    /// a directory, and [`GrkError::InvalidPath`] for a filesystem root.
    pub fn from_root(root: &Path) -> Result<Self, GrkError> {
        let root = root
            .canonicalize()
            .map_err(|_| GrkError::PathNotFound(root.display().to_string()))?;

        if !root.is_dir() {
            return Err(GrkError::PathNotFound(root.display().to_string()));
        }

        if is_disk_root(&root) {
            return Err(GrkError::InvalidPath(format!(
                "Cannot use disk root as a GRK project: {}. \
                 Run grk inside a project directory instead.",
                root.display()
            )));
        }

        let data_dir = root.join(GROUNDED_DIR);
        let has_git = root.join(".git").exists();

        Ok(Self {
            root,
            data_dir,
            has_git,
        })
    }

    /// Resolve a workspace by walking up from `start_dir`.
    ///
    /// The first ancestor holding `.grounded/` or `.git` wins. When neither is
    /// found, `start_dir` itself is the candidate so `grk init` works anywhere.
    pub fn resolve(start_dir: &Path) -> Result<Self, GrkError> {
        let start = start_dir
            .canonicalize()
            .map_err(|_| GrkError::PathNotFound(start_dir.display().to_string()))?;

        let mut current = start.as_path();
        loop {
            if is_disk_root(current) {
                break;
            }
            if current.join(GROUNDED_DIR).is_dir() || current.join(".git").exists() {
                return Self::from_root(current);
            }
            match current.parent() {
                Some(parent) => current = parent,
                None => break,
            }
        }

        Self::from_root(&start)
    }

    /// Absolute path to the project root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path to `.grounded/`.
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn has_git(&self) -> bool {
        self.has_git
    }

    /// Whether `.grounded/` exists.
    pub fn is_initialized(&self) -> bool {
        self.data_dir.is_dir()
    }

    /// Project display name: the root directory's name.
    pub fn default_name(&self) -> String {
        self.root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "project".to_string())
    }

    /// Snapshot store layout rooted at `.grounded/`.
    pub fn store_layout(&self) -> StoreLayout {
        StoreLayout::new(&self.data_dir)
    }

    /// `.grounded/config.yaml`
    pub fn config_path(&self) -> PathBuf {
        self.data_dir.join(PROJECT_CONFIG_FILENAME)
    }

    /// `.grounded/stack.json`
    pub fn stack_path(&self) -> PathBuf {
        self.data_dir.join(STACK_FILENAME)
    }

    /// `.grounded/routes.jsonl`
    pub fn routes_path(&self) -> PathBuf {
        self.data_dir.join(ROUTES_FILENAME)
    }

    /// `.grounded/asks.jsonl`
    pub fn ask_log_path(&self) -> PathBuf {
        self.data_dir.join(ASK_LOG_FILENAME)
    }

    /// Convert an absolute or root-relative path into a normalized
    /// project-relative path with forward slashes.
    pub fn relative_path(&self, path: &Path) -> Option<String> {
        let rel = if path.is_absolute() {
            path.strip_prefix(&self.root).ok()?
        } else {
            path
        };
        let text = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        if text.is_empty() {
            None
        } else {
            Some(text)
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
