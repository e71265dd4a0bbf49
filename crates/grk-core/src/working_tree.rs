//! Working-tree access.
//!
//! Retrieval re-reads chunk content from the live tree rather than from the
//! snapshot, so answers always quote what is on disk now.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::debug;

/// Read access to the current files of a project.
pub trait WorkingTree: Send + Sync {
    /// Full text of a project-relative file, `None` if missing or unreadable.
    fn read_file(&self, path: &str) -> Option<String>;

    /// Lines `start..=end` (1-based) joined with `\n`.
    ///
    /// `None` when the file is missing or shorter than `start`. A range past
    /// the end of the file is clamped.
    fn read_lines(&self, path: &str, start: u32, end: u32) -> Option<String> {
        let content = self.read_file(path)?;
        slice_lines(&content, start, end)
    }

    /// Commit checked out in the tree, when known.
    fn head_commit(&self) -> Option<String>;
}

/// Lines `start..=end` of `content`.
pub fn slice_lines(content: &str, start: u32, end: u32) -> Option<String> {
    if start == 0 || end < start {
        return None;
    }
    let lines: Vec<&str> = content
        .lines()
        .skip((start - 1) as usize)
        .take((end - start + 1) as usize)
        .collect();
    if lines.is_empty() {
        return None;
    }
    Some(lines.join("\n"))
}

/// Working tree rooted at a directory on disk.
#[derive(Debug, Clone)]
pub struct FsWorkingTree {
    root: PathBuf,
}

impl FsWorkingTree {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> Option<PathBuf> {
        // Paths come from snapshots; refuse anything that escapes the root.
        if path.split('/').any(|seg| seg == "..") || Path::new(path).is_absolute() {
            return None;
        }
        Some(self.root.join(path))
    }
}

impl WorkingTree for FsWorkingTree {
    fn read_file(&self, path: &str) -> Option<String> {
        let abs = self.resolve(path)?;
        match fs::read(&abs) {
            Ok(bytes) => Some(String::from_utf8_lossy(&bytes).into_owned()),
            Err(e) => {
                debug!("Cannot read {}: {}", abs.display(), e);
                None
            }
        }
    }

    fn head_commit(&self) -> Option<String> {
        let output = Command::new("git")
            .arg("-C")
            .arg(&self.root)
            .arg("rev-parse")
            .arg("HEAD")
            .output()
            .ok()?;
        if !output.status.success() {
            return None;
        }
        let head = String::from_utf8_lossy(&output.stdout).trim().to_string();
        (!head.is_empty()).then_some(head)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_slice_lines() {
        let text = "a\nb\nc\nd\n";
        assert_eq!(slice_lines(text, 2, 3).as_deref(), Some("b\nc"));
        assert_eq!(slice_lines(text, 3, 99).as_deref(), Some("c\nd"));
        assert_eq!(slice_lines(text, 5, 9), None);
        assert_eq!(slice_lines(text, 0, 2), None);
        assert_eq!(slice_lines(text, 3, 2), None);
    }

    #[test]
    fn test_read_lines_from_disk() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("src")).unwrap();
        fs::write(temp.path().join("src/a.rs"), "one\ntwo\nthree\n").unwrap();

        let tree = FsWorkingTree::new(temp.path());
        assert_eq!(tree.read_lines("src/a.rs", 2, 2).as_deref(), Some("two"));
        assert!(tree.read_lines("src/missing.rs", 1, 1).is_none());
        assert!(tree.read_file("../etc/passwd").is_none());
    }

    #[test]
    fn test_head_commit_outside_repository() {
        let temp = TempDir::new().unwrap();
        assert!(FsWorkingTree::new(temp.path()).head_commit().is_none());
    }
}
