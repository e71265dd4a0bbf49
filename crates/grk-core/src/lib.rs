//! # grk-core
//!
//! **Grounded Retrieval Kernel** – core engine library.
//!
//! This crate indexes a source tree into addressable chunks, retrieves a
//! ranked and budget-bounded subset of them for a question, and turns a model
//! reply into an audited, confidence-scored answer. It is consumed by the
//! `grk` CLI.
//!
//! ## Main Types
//!
//! - [`GrkEngine`] – entry point for build, rebuild, retrieve and ask
//! - [`Workspace`] – a resolved project on disk
//! - [`GrkError`] – domain-specific error type
//!
//! ## Modules
//!
//! - [`chunk_id`] – deterministic chunk identity, legacy formats, migration
//! - [`scanner`] / [`chunker`] – file manifest and chunk building
//! - [`retrieval`] – query analysis, candidate strategies, scoring, selection
//! - [`redact`] – secret removal before content leaves the engine
//! - [`prompt`] / [`response`] – grounded prompt and answer formatting
//! - [`config`] – global and project configuration
//!
//! ## Example
//!
//! ```ignore
//! use grk_core::{AskOptions, GrkEngine, Workspace};
//! use std::path::Path;
//!
//! let workspace = Workspace::resolve(Path::new("."))?;
//! let engine = GrkEngine::load(None, &workspace)?;
//! if !workspace.is_initialized() {
//!     engine.init(&workspace)?;
//! }
//! engine.build(&workspace)?;
//! let outcome = engine.ask(&workspace, "How does login work?", AskOptions::default())?;
//! ```

// Modules
pub mod ask_log;
pub mod chunk_id;
pub mod chunker;
pub mod config;
pub mod constants;
pub mod db_adapter;
pub mod engine;
pub mod errors;
pub mod model_adapter;
pub mod prompt;
pub mod redact;
pub mod response;
pub mod retrieval;
pub mod routes;
pub mod scanner;
pub mod stack;
pub(crate) mod symbols;
pub mod working_tree;
pub mod workspace;

// Re-exports for convenience
pub use ask_log::{append_ask_log, read_ask_log, AskLogEntry};
pub use chunk_id::{compute_chunk_id, detect_format, ChunkIdFormat, IdVerificationReport};
pub use chunker::{ChunkBuilder, RebuildSummary};
pub use config::{
    ChunkingConfig, GlobalConfig, GrkConfig, ProjectConfig, RedactionConfig, ResponseConfig,
    RetrievalConfig, ScoringBoosts, StoreConfig, StrategyLimits,
};
pub use constants::{GLOBAL_CONFIG_FILENAME, GROUNDED_DIR, GRK_CONFIG_ENV, GRK_HOME_DIR};
pub use engine::{
    AskOptions, AskOutcome, AskResult, BuildKind, BuildOutcome, BuildReport, ChangeSet, GrkEngine,
    IdVerification, InitReport, PromptPreview, ScanListing, StatusReport,
};
pub use errors::GrkError;
pub use prompt::{Prompt, PromptBuilder, NOT_ENOUGH_CONTEXT};
pub use redact::{Redactor, REDACTION_MARKER};
pub use response::{
    AuditEntry, ConfidenceLevel, GroundedAnswer, ResponseFormatter, Snippet, SnippetSource, Usage,
};
pub use retrieval::{
    Retrieval, RetrievalEngine, RetrievalStats, RetrievedChunk, Signal, Strategy,
};
pub use routes::{RouteEntry, RouteIndex};
pub use scanner::{FileManifestSource, FsScanner, SourceFile};
pub use stack::{PathConvention, StackFacts};
pub use working_tree::{FsWorkingTree, WorkingTree};
pub use workspace::Workspace;

// Storage types that appear in engine results.
pub use grk_db::{ScanMeta, ScanStats, ValidationReport};
