use std::path::{Path, PathBuf};

use crate::records::FileIndexFormat;

const SCANS_DIR: &str = "scans";
const CURRENT_FILE: &str = "CURRENT";
const LOCK_FILE: &str = "build.lock";
const STAGING_PREFIX: &str = ".staging-";

pub(crate) const META_FILE: &str = "meta.json";
pub(crate) const FILES_JSON: &str = "files.json";
pub(crate) const FILES_JSONL: &str = "files.jsonl";
pub(crate) const CHUNKS_FILE: &str = "chunks.jsonl";
pub(crate) const DIRECTORIES_FILE: &str = "directories.json";

/// Paths of a project's knowledge-base store, rooted at its data directory.
#[derive(Debug, Clone)]
pub struct StoreLayout {
    root: PathBuf,
}

impl StoreLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn scans_dir(&self) -> PathBuf {
        self.root.join(SCANS_DIR)
    }

    pub fn current_path(&self) -> PathBuf {
        self.root.join(CURRENT_FILE)
    }

    pub fn lock_path(&self) -> PathBuf {
        self.root.join(LOCK_FILE)
    }

    pub fn scan_dir(&self, scan_id: &str) -> PathBuf {
        self.scans_dir().join(scan_id)
    }

    pub fn staging_dir(&self, scan_id: &str) -> PathBuf {
        self.scans_dir().join(format!("{}{}", STAGING_PREFIX, scan_id))
    }

    pub(crate) fn is_staging_name(name: &str) -> bool {
        name.starts_with(STAGING_PREFIX)
    }
}

/// File inside a scan directory holding the file index in `format`.
pub(crate) fn files_file(format: FileIndexFormat) -> &'static str {
    match format {
        FileIndexFormat::Json => FILES_JSON,
        FileIndexFormat::Jsonl => FILES_JSONL,
    }
}

/// Scan ids become directory names; reject anything that could escape `scans/`.
pub(crate) fn is_valid_scan_id(id: &str) -> bool {
    !id.is_empty()
        && !id.starts_with('.')
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_paths() {
        let layout = StoreLayout::new("/p/.grounded");
        assert_eq!(layout.current_path(), PathBuf::from("/p/.grounded/CURRENT"));
        assert_eq!(layout.lock_path(), PathBuf::from("/p/.grounded/build.lock"));
        assert_eq!(layout.scan_dir("s1"), PathBuf::from("/p/.grounded/scans/s1"));
        assert_eq!(
            layout.staging_dir("s1"),
            PathBuf::from("/p/.grounded/scans/.staging-s1")
        );
        assert!(StoreLayout::is_staging_name(".staging-s1"));
    }

    #[test]
    fn test_scan_id_validation() {
        assert!(is_valid_scan_id("20260101T101010123Z-1a2b3c4d"));
        assert!(!is_valid_scan_id(""));
        assert!(!is_valid_scan_id(".staging-x"));
        assert!(!is_valid_scan_id("../x"));
        assert!(!is_valid_scan_id("a/b"));
    }
}
