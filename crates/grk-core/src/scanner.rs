//! File manifest: the scanner port and the built-in filesystem scanner.
//!
//! The chunk builder never walks the disk itself. It consumes [`SourceFile`]s
//! from a [`FileManifestSource`], which may be an external scanner or the
//! [`FsScanner`] shipped here (gitignore-aware walk, SHA-256 content hashes,
//! regex symbol and import extraction).

use std::fs;
use std::path::{Path, PathBuf};

use grk_db::FileRecord;
use ignore::WalkBuilder;
use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::chunk_id::{content_hash, file_id};
use crate::constants::{
    is_binary_extension, is_excluded_file_name, language_for_extension, should_ignore_dir,
    GRK_IGNORE_FILENAME,
};
use crate::errors::GrkError;
use crate::symbols::{extract_declarations, extract_imports, SyntaxFamily};

/// Files above this size are listed but not chunked.
pub const MAX_FILE_BYTES: u64 = 1_000_000;

/// Bytes inspected for NUL when sniffing binary content.
const BINARY_SNIFF_BYTES: usize = 8 * 1024;

// ============================================================================
// SourceFile
// ============================================================================

/// One file as produced by a manifest source.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceFile {
    /// Project-relative path with forward slashes.
    pub path: String,
    /// Text content (empty for binary or excluded files).
    pub content: String,
    pub content_hash: String,
    pub line_count: u32,
    pub size: u64,
    pub extension: Option<String>,
    pub language: Option<String>,
    pub symbols: Vec<String>,
    pub imports: Vec<String>,
    pub binary: bool,
    pub excluded: bool,
}

impl SourceFile {
    /// Build a text source file, extracting symbols and imports from `content`.
    pub fn from_text(path: impl Into<String>, content: impl Into<String>) -> Self {
        let path = path.into();
        let content = content.into();
        let extension = extension_of(&path);
        let family = extension
            .as_deref()
            .map(SyntaxFamily::from_extension)
            .unwrap_or(SyntaxFamily::Other);

        Self {
            content_hash: content_hash(content.as_bytes()),
            line_count: count_lines(&content),
            size: content.len() as u64,
            language: extension
                .as_deref()
                .and_then(language_for_extension)
                .map(str::to_string),
            symbols: extract_declarations(&content),
            imports: extract_imports(&content, family),
            binary: false,
            excluded: false,
            extension,
            path,
            content,
        }
    }

    /// Whether the file takes part in chunking.
    pub fn is_indexable(&self) -> bool {
        !self.binary && !self.excluded
    }

    /// The file's index record (chunk ids are filled in by the repository).
    pub fn to_file_record(&self) -> FileRecord {
        FileRecord {
            id: file_id(&self.path),
            path: self.path.clone(),
            extension: self.extension.clone(),
            language: self.language.clone(),
            size: self.size,
            content_hash: self.content_hash.clone(),
            line_count: self.line_count,
            binary: self.binary,
            excluded: self.excluded,
            symbols: self.symbols.clone(),
            imports: self.imports.clone(),
            chunk_ids: Vec::new(),
        }
    }
}

/// Number of lines as the chunk builder sees them (a trailing newline does
/// not start a new line).
pub fn count_lines(content: &str) -> u32 {
    content.lines().count() as u32
}

fn extension_of(path: &str) -> Option<String> {
    let name = path.rsplit('/').next().unwrap_or(path);
    name.rsplit_once('.')
        .filter(|(stem, _)| !stem.is_empty())
        .map(|(_, ext)| ext.to_lowercase())
}

// ============================================================================
// FileManifestSource
// ============================================================================

/// Produces the files of a working tree.
pub trait FileManifestSource {
    /// Every file of the tree, sorted by path.
    fn scan(&self) -> Result<Vec<SourceFile>, GrkError>;

    /// Only the given project-relative paths. Paths that no longer exist are
    /// omitted from the result.
    fn scan_paths(&self, paths: &[String]) -> Result<Vec<SourceFile>, GrkError>;
}

// ============================================================================
// FsScanner
// ============================================================================

/// Gitignore-aware scanner over a directory.
#[derive(Debug, Clone)]
pub struct FsScanner {
    root: PathBuf,
}

impl FsScanner {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Relative paths of all candidate files.
    fn walk(&self) -> Result<Vec<String>, GrkError> {
        if !self.root.is_dir() {
            return Err(GrkError::ScanFailed {
                path: self.root.clone(),
                message: "not a directory".to_string(),
            });
        }

        let walker = WalkBuilder::new(&self.root)
            .hidden(true)
            .git_ignore(true)
            .git_global(true)
            .git_exclude(true)
            .require_git(false)
            .add_custom_ignore_filename(GRK_IGNORE_FILENAME)
            .follow_links(false)
            .filter_entry(|entry| {
                let name = entry.file_name().to_string_lossy();
                !should_ignore_dir(&name)
            })
            .build();

        let mut paths = Vec::new();
        for result in walker {
            let entry = match result {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Error walking directory: {}", e);
                    continue;
                }
            };
            if !entry.file_type().is_some_and(|t| t.is_file()) {
                continue;
            }
            if let Some(rel) = relative(&self.root, entry.path()) {
                paths.push(rel);
            }
        }
        paths.sort();
        Ok(paths)
    }

    /// Read and classify one file. `None` when it disappeared.
    fn read(&self, rel: &str) -> Result<Option<SourceFile>, GrkError> {
        let abs = self.root.join(rel);
        let bytes = match fs::read(&abs) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(GrkError::ScanFailed {
                    path: abs,
                    message: e.to_string(),
                })
            }
        };

        let extension = extension_of(rel);
        let name = rel.rsplit('/').next().unwrap_or(rel);
        let size = bytes.len() as u64;
        let binary = extension.as_deref().is_some_and(is_binary_extension)
            || bytes[..bytes.len().min(BINARY_SNIFF_BYTES)].contains(&0);

        if binary || size > MAX_FILE_BYTES || is_excluded_file_name(name) {
            return Ok(Some(SourceFile {
                path: rel.to_string(),
                content: String::new(),
                content_hash: content_hash(&bytes),
                line_count: 0,
                size,
                language: extension
                    .as_deref()
                    .and_then(language_for_extension)
                    .map(str::to_string),
                extension,
                symbols: Vec::new(),
                imports: Vec::new(),
                binary,
                excluded: !binary,
            }));
        }

        let content = String::from_utf8_lossy(&bytes).into_owned();
        Ok(Some(SourceFile::from_text(rel, content)))
    }
}

impl FileManifestSource for FsScanner {
    fn scan(&self) -> Result<Vec<SourceFile>, GrkError> {
        let paths = self.walk()?;
        debug!("Scanning {} files under {}", paths.len(), self.root.display());
        let files = self.scan_paths(&paths)?;
        info!(
            "Scanned {} files ({} indexable)",
            files.len(),
            files.iter().filter(|f| f.is_indexable()).count()
        );
        Ok(files)
    }

    fn scan_paths(&self, paths: &[String]) -> Result<Vec<SourceFile>, GrkError> {
        let results: Vec<Result<Option<SourceFile>, GrkError>> =
            paths.par_iter().map(|p| self.read(p)).collect();

        let mut files = Vec::with_capacity(results.len());
        for result in results {
            if let Some(file) = result? {
                files.push(file);
            }
        }
        files.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(files)
    }
}

fn relative(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    let text = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/");
    (!text.is_empty()).then_some(text)
}

// ============================================================================
// Tests
// ============================================================================
