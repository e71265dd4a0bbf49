//! Chunk repository port.
//!
//! The chunk builder writes into a [`ChunkRepository`]; the snapshot builder
//! reads from one. [`MemoryChunkRepository`] is the in-process implementation,
//! seeded either empty (full build) or from a published scan (incremental
//! rebuild).

use std::collections::BTreeMap;

use crate::error::DbResult;
use crate::records::{ChunkRecord, FileRecord};
use crate::snapshot::SnapshotReader;

/// Mutable working set of files and their chunks for one build.
pub trait ChunkRepository {
    /// All files in path order.
    fn files(&self) -> Box<dyn Iterator<Item = &FileRecord> + '_>;

    /// One file by path.
    fn file(&self, path: &str) -> Option<&FileRecord>;

    /// Chunks of one file in sequence order (empty if unknown).
    fn chunks_for(&self, path: &str) -> &[ChunkRecord];

    /// Insert or replace a file and its chunks, returning the chunks it replaced.
    fn replace_file(&mut self, file: FileRecord, chunks: Vec<ChunkRecord>) -> Vec<ChunkRecord>;

    /// Remove a file, returning its chunks if it was present.
    fn remove_file(&mut self, path: &str) -> Option<Vec<ChunkRecord>>;

    /// Number of files.
    fn file_count(&self) -> usize;

    /// Number of chunks across all files.
    fn chunk_count(&self) -> usize;
}

/// `BTreeMap`-backed repository keyed by path.
#[derive(Debug, Default, Clone)]
pub struct MemoryChunkRepository {
    entries: BTreeMap<String, (FileRecord, Vec<ChunkRecord>)>,
}

impl MemoryChunkRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the full working set of a published scan.
    ///
    /// Chunks whose path has no file record are dropped.
    pub fn from_snapshot(reader: &SnapshotReader) -> DbResult<Self> {
        let mut entries: BTreeMap<String, (FileRecord, Vec<ChunkRecord>)> = reader
            .stream_files()?
            .map(|file| (file.path.clone(), (file, Vec::new())))
            .collect();

        for chunk in reader.stream_chunks()? {
            if let Some((_, chunks)) = entries.get_mut(&chunk.path) {
                chunks.push(chunk);
            }
        }
        for (_, chunks) in entries.values_mut() {
            chunks.sort_by_key(|c| (c.start_line, c.sequence));
        }

        Ok(Self { entries })
    }
}

impl ChunkRepository for MemoryChunkRepository {
    fn files(&self) -> Box<dyn Iterator<Item = &FileRecord> + '_> {
        Box::new(self.entries.values().map(|(file, _)| file))
    }

    fn file(&self, path: &str) -> Option<&FileRecord> {
        self.entries.get(path).map(|(file, _)| file)
    }

    fn chunks_for(&self, path: &str) -> &[ChunkRecord] {
        self.entries
            .get(path)
            .map(|(_, chunks)| chunks.as_slice())
            .unwrap_or(&[])
    }

    fn replace_file(&mut self, mut file: FileRecord, chunks: Vec<ChunkRecord>) -> Vec<ChunkRecord> {
        file.chunk_ids = chunks.iter().map(|c| c.id.clone()).collect();
        self.entries
            .insert(file.path.clone(), (file, chunks))
            .map(|(_, old)| old)
            .unwrap_or_default()
    }

    fn remove_file(&mut self, path: &str) -> Option<Vec<ChunkRecord>> {
        self.entries.remove(path).map(|(_, chunks)| chunks)
    }

    fn file_count(&self) -> usize {
        self.entries.len()
    }

    fn chunk_count(&self) -> usize {
        self.entries.values().map(|(_, chunks)| chunks.len()).sum()
    }
}
