//! Error types for grk-core.

use std::path::PathBuf;

use thiserror::Error;

/// Domain-specific errors for GRK operations.
#[derive(Error, Debug)]
pub enum GrkError {
    /// The project has not been initialized with `grk init`.
    #[error("Project not initialized. Run `grk init`.")]
    NotInitialized,

    /// `grk init` was run on a project that already has `.grounded/`.
    #[error("Project already initialized at `{data_dir}`.")]
    AlreadyInitialized {
        /// The existing data directory.
        data_dir: PathBuf,
    },

    /// Global configuration file is invalid.
    #[error("Global config invalid: {0}")]
    InvalidGlobalConfig(String),

    /// Project configuration is invalid.
    #[error("Project config invalid: {0}")]
    InvalidProjectConfig(String),

    /// A configuration value is invalid.
    #[error("Invalid configuration: {message}. {hint}")]
    InvalidConfiguration {
        /// Description of the invalid configuration.
        message: String,
        /// Actionable hint on how to fix it.
        hint: String,
    },

    /// A path or file was not found.
    #[error("Path not found: {0}")]
    PathNotFound(String),

    /// An invalid path was provided (e.g., disk root).
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// Invalid argument provided to an operation.
    #[error("{0}")]
    InvalidArgument(String),

    // =========================================================================
    // Knowledge Base Errors
    // =========================================================================
    /// No knowledge-base scan has been published for the project.
    #[error("Knowledge base not available under `{root}`. Run `grk build` first.")]
    KnowledgeBaseUnavailable {
        /// The project data directory.
        root: PathBuf,
    },

    /// The requested scan does not exist.
    #[error("Scan `{0}` not found.")]
    ScanNotFound(String),

    /// The scan was written by a newer schema.
    #[error("Scan `{scan_id}` uses schema version {found}; this build supports up to {supported}.")]
    UnsupportedSchema {
        /// The scan id.
        scan_id: String,
        /// Schema version on disk.
        found: u32,
        /// Highest supported version.
        supported: u32,
    },

    /// Snapshot I/O error.
    #[error("Snapshot I/O error at `{path}`: {message}")]
    SnapshotIo {
        /// Path to the snapshot file.
        path: PathBuf,
        /// Description of the I/O error.
        message: String,
    },

    /// Snapshot parse error.
    #[error("Snapshot parse error at `{path}`: {message}")]
    SnapshotParse {
        /// Path to the snapshot file.
        path: PathBuf,
        /// Description of the parse error.
        message: String,
    },

    /// The build lease could not be taken or released.
    #[error("Build lease error at `{path}`: {message}")]
    BuildLease {
        /// Path to the lock file.
        path: PathBuf,
        /// Description of the failure.
        message: String,
    },

    // =========================================================================
    // Collaborator Errors
    // =========================================================================
    /// Walking or reading the working tree failed.
    #[error("Scan of `{path}` failed: {message}")]
    ScanFailed {
        /// Path being scanned.
        path: PathBuf,
        /// Description of the failure.
        message: String,
    },

    /// The stack facts file could not be loaded.
    #[error("Failed to load stack facts from `{path}`: {message}")]
    StackLoad {
        /// Path to the stack file.
        path: PathBuf,
        /// Description of the failure.
        message: String,
    },

    /// The route index could not be loaded.
    #[error("Failed to load route index from `{path}`: {message}")]
    RouteIndexLoad {
        /// Path to the route index.
        path: PathBuf,
        /// Description of the failure.
        message: String,
    },

    // =========================================================================
    // Model Errors
    // =========================================================================
    /// The completion provider failed (timeout, non-success status, transport).
    #[error("Model provider `{provider}` failed: {message}")]
    ModelProvider {
        /// Provider name.
        provider: String,
        /// Description of the failure.
        message: String,
    },

    /// The completion provider is not usable in this build or configuration.
    #[error("Model provider `{provider}` is unavailable: {reason}")]
    ModelUnavailable {
        /// Provider name.
        provider: String,
        /// Reason why the provider is unavailable.
        reason: String,
    },

    // -------------------------------------------------------------------------
    // Log Errors
    // -------------------------------------------------------------------------
    /// An error occurred while reading or writing a log file.
    #[error("Log I/O error at {path}: {reason}")]
    LogIoError {
        /// The path to the log file.
        path: PathBuf,
        /// Description of the failure.
        reason: String,
    },

    /// An I/O error occurred.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML serialization/deserialization error.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A wrapped generic error.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl GrkError {
    /// Whether the error means "nothing has been built yet".
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::KnowledgeBaseUnavailable { .. } | Self::NotInitialized)
    }
}
