//! # grk-db
//!
//! Storage layer for GRK - immutable knowledge-base snapshots.
//!
//! This crate owns everything that touches the on-disk snapshot format, isolated
//! from the retrieval and grounding logic in `grk-core`:
//!
//! - Typed records for files, chunks, scan metadata and directory statistics
//! - A snapshot builder that writes to a staging directory and publishes by rename
//! - A reader with whole-collection reads, forward-only streams and cached lookups
//! - An advisory consistency validator
//! - Retention (keep the N most recent scans) and the per-project build lease
//!
//! ## Architecture
//!
//! ```text
//! grk-cli → grk-core → (ChunkRepository, Cache)
//!              ↑
//!           grk-db (snapshot store, JSONL streams, lease, TTL cache)
//!           grk-model (text-completion providers)
//! ```
//!
//! ## Usage
//!
//! ```ignore
//! use grk_db::{SnapshotBuilder, SnapshotReader, StoreLayout, BuildOptions};
//!
//! let layout = StoreLayout::new("/path/to/project/.grounded");
//! let outcome = SnapshotBuilder::new(&layout, BuildOptions::default())
//!     .publish(&repository, "my-project", Some("abc123"))?;
//!
//! let reader = SnapshotReader::open_current(&layout, None)?;
//! for chunk in reader.stream_chunks()? {
//!     println!("{} {}:{}-{}", chunk.id, chunk.path, chunk.start_line, chunk.end_line);
//! }
//! ```

pub mod cache;
pub mod error;
pub mod jsonl;
pub mod lease;
pub mod records;
pub mod repository;
pub mod snapshot;

pub use cache::{Cache, MemoryCache};
pub use error::{DbError, DbResult};
pub use jsonl::JsonlStream;
pub use lease::BuildLease;
pub use records::{
    ChunkRecord, DirectoryStats, FileIndexFormat, FileRecord, ScanMeta, ScanStats, SCHEMA_VERSION,
};
pub use repository::{ChunkRepository, MemoryChunkRepository};
pub use snapshot::{
    list_scans, prune_scans, read_current, write_current, BuildOptions, FileIter, PruneReport,
    PublishOutcome, SnapshotBuilder, SnapshotReader, StoreLayout, ValidationReport,
};
