//! Shared test data for snapshot tests.

use crate::jsonl::{write_jsonl, JsonlStream};
use crate::records::{ChunkRecord, FileRecord};
use crate::repository::{ChunkRepository, MemoryChunkRepository};
use crate::snapshot::SnapshotReader;

pub(crate) fn file(path: &str, lines: u32, language: Option<&str>) -> FileRecord {
    FileRecord {
        id: format!("file-{}", path.replace('/', "-")),
        path: path.to_string(),
        extension: path.rsplit_once('.').map(|(_, ext)| ext.to_string()),
        language: language.map(str::to_string),
        size: u64::from(lines) * 40,
        content_hash: format!("hash-{}", path),
        line_count: lines,
        binary: false,
        excluded: false,
        symbols: Vec::new(),
        imports: Vec::new(),
        chunk_ids: Vec::new(),
    }
}

pub(crate) fn chunk(path: &str, id: &str, start: u32, end: u32, sequence: u32) -> ChunkRecord {
    ChunkRecord {
        id: id.to_string(),
        old_id: None,
        path: path.to_string(),
        start_line: start,
        end_line: end,
        sequence,
        file_hash: format!("hash-{}", path),
        content_hash: format!("content-{}", id),
        is_complete_file: false,
        symbols: Vec::new(),
        used_symbols: Vec::new(),
        imports: Vec::new(),
        references: Vec::new(),
        size_bytes: u64::from(end - start + 1) * 40,
    }
}

/// Three files: two indexed Rust sources (one split in two) and an excluded README.
pub(crate) fn sample_repository() -> MemoryChunkRepository {
    let mut repo = MemoryChunkRepository::new();

    let mut whole = chunk("src/lib.rs", "c-lib", 1, 10, 0);
    whole.is_complete_file = true;
    repo.replace_file(file("src/lib.rs", 10, Some("Rust")), vec![whole]);

    repo.replace_file(
        file("src/main.rs", 500, Some("Rust")),
        vec![
            chunk("src/main.rs", "c-main-0", 1, 260, 0),
            chunk("src/main.rs", "c-main-1", 261, 500, 1),
        ],
    );

    let mut readme = file("README.md", 5, Some("Markdown"));
    readme.excluded = true;
    repo.replace_file(readme, Vec::new());

    repo
}

/// Rewrite a published chunk set keeping only records accepted by `keep`.
pub(crate) fn rewrite_chunks(reader: &SnapshotReader, keep: impl Fn(&ChunkRecord) -> bool) {
    let path = reader.scan_dir().join("chunks.jsonl");
    let kept: Vec<ChunkRecord> = JsonlStream::<ChunkRecord>::open(&path)
        .unwrap()
        .filter(|c| keep(c))
        .collect();
    write_jsonl(&path, &kept).unwrap();
}
