//! GRK Engine – the orchestrator behind every `grk` command.
//!
//! The [`GrkEngine`] owns the resolved configuration and the process-wide
//! collaborators (redactor, TTL caches, completion model) and wires the
//! scanner, chunk builder, snapshot store, retrieval engine, prompt builder
//! and response formatter together per operation.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use grk_db::{
    list_scans, read_current, BuildLease, BuildOptions, Cache, ChunkRecord, ChunkRepository,
    FileIndexFormat, MemoryCache, MemoryChunkRepository, ScanMeta, ScanStats, SnapshotBuilder,
    SnapshotReader, ValidationReport,
};
use grk_model::{create_completion_model, CompletionModel, CompletionProviderKind};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::ask_log::{append_ask_log, read_ask_log, AskLogEntry};
use crate::chunk_id::{migrate_repository, IdVerificationReport};
use crate::chunker::{ChunkBuilder, RebuildSummary};
use crate::config::{GrkConfig, ProjectConfig};
use crate::errors::GrkError;
use crate::prompt::{Prompt, PromptBuilder};
use crate::redact::Redactor;
use crate::response::{GroundedAnswer, ResponseFormatter, Usage};
use crate::retrieval::{FactsCache, Retrieval, RetrievalEngine, RetrievalStats};
use crate::scanner::{FileManifestSource, FsScanner};
use crate::working_tree::{FsWorkingTree, WorkingTree};
use crate::workspace::Workspace;

// ============================================================================
// Operation results
// ============================================================================

/// Result of `grk init`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InitReport {
    pub data_dir: PathBuf,
    pub config_path: PathBuf,
    pub project: String,
}

/// How a scan was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildKind {
    Full,
    Incremental,
    Migration,
}

/// A published scan.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildReport {
    pub kind: BuildKind,
    pub scan_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_scan: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub head_commit: Option<String>,
    pub stats: ScanStats,
    pub file_index_format: FileIndexFormat,
    /// Scans deleted by retention after publishing.
    pub pruned: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub changes: Option<RebuildSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ids_migrated: Option<usize>,
    pub elapsed_ms: u64,
}

/// Outcome of any operation that needs the build lease.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum BuildOutcome {
    Published(BuildReport),
    /// Another build holds the lease; nothing was done.
    Skipped {
        #[serde(rename = "lockPath")]
        lock_path: PathBuf,
    },
}

impl BuildOutcome {
    pub fn report(&self) -> Option<&BuildReport> {
        match self {
            Self::Published(report) => Some(report),
            Self::Skipped { .. } => None,
        }
    }
}

/// Paths changed since the current scan, relative to the project root or
/// absolute inside it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    pub added: Vec<String>,
    pub modified: Vec<String>,
    pub deleted: Vec<String>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.modified.is_empty() && self.deleted.is_empty()
    }
}

/// Snapshot of a project's GRK state.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusReport {
    pub root: PathBuf,
    pub data_dir: PathBuf,
    pub initialized: bool,
    pub project: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_scan: Option<ScanMeta>,
    pub scan_count: usize,
    pub has_stack_facts: bool,
    pub has_route_index: bool,
    pub ask_count: usize,
    pub model_provider: CompletionProviderKind,
    pub model_id: String,
}

/// Published scans, newest first.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanListing {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current: Option<String>,
    pub scans: Vec<ScanMeta>,
}

/// Result of `grk verify-ids`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IdVerification {
    pub scan_id: String,
    pub report: IdVerificationReport,
    /// Set when a migration was requested and needed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub migration: Option<BuildOutcome>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AskOptions {
    /// Build the prompt but do not call the model.
    pub prompt_only: bool,
}

/// A grounded answer with the retrieval it was built on.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AskResult {
    pub question: String,
    pub scan_id: String,
    pub answer: GroundedAnswer,
    pub retrieval: RetrievalStats,
}

/// A prompt that was built but not sent.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptPreview {
    pub question: String,
    pub scan_id: String,
    pub prompt: Prompt,
    pub retrieval: RetrievalStats,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum AskOutcome {
    Answered(AskResult),
    PromptOnly(PromptPreview),
}

// ============================================================================
// GrkEngine
// ============================================================================

/// The main engine for GRK operations.
///
/// Built once per process from a resolved [`GrkConfig`]. Read operations are
/// safe to run concurrently; build, rebuild and migration take the project's
/// build lease and skip when it is held.
///
/// ```ignore
/// use grk_core::{GrkEngine, Workspace};
///
/// let workspace = Workspace::resolve(Path::new("."))?;
/// let engine = GrkEngine::load(None, &workspace)?;
/// engine.build(&workspace)?;
/// let retrieval = engine.retrieve(&workspace, "How does login work?")?;
/// ```
pub struct GrkEngine {
    config: GrkConfig,
    redactor: Redactor,
    facts: FactsCache,
    chunk_cache: Arc<dyn Cache<ChunkRecord>>,
    model: Option<Arc<dyn CompletionModel>>,
}

impl GrkEngine {
    // -------------------------------------------------------------------------
    // Construction
    // -------------------------------------------------------------------------

    pub fn new(config: GrkConfig) -> Result<Self, GrkError> {
        let redactor = Redactor::new(&config.redaction)?;
        let facts = FactsCache::in_memory(&config.store);
        let chunk_cache: Arc<dyn Cache<ChunkRecord>> =
            Arc::new(MemoryCache::new(config.store.cache_capacity));
        Ok(Self {
            config,
            redactor,
            facts,
            chunk_cache,
            model: None,
        })
    }

    /// Resolve configuration for `workspace` and build an engine.
    ///
    /// `global_path` overrides `~/.grk/config.yaml`.
    pub fn load(global_path: Option<&Path>, workspace: &Workspace) -> Result<Self, GrkError> {
        let config = GrkConfig::load(global_path, workspace.root())?;
        Self::new(config)
    }

    /// Use `model` instead of the one the configuration describes.
    pub fn with_model(mut self, model: Arc<dyn CompletionModel>) -> Self {
        self.model = Some(model);
        self
    }

    pub fn config(&self) -> &GrkConfig {
        &self.config
    }

    fn project_name(&self, workspace: &Workspace) -> String {
        self.config
            .project_name
            .clone()
            .unwrap_or_else(|| workspace.default_name())
    }

    fn model(&self) -> Result<Arc<dyn CompletionModel>, GrkError> {
        match &self.model {
            Some(model) => Ok(Arc::clone(model)),
            None => Ok(Arc::from(create_completion_model(&self.config.model)?)),
        }
    }

    fn ensure_initialized(workspace: &Workspace) -> Result<(), GrkError> {
        if workspace.is_initialized() {
            Ok(())
        } else {
            Err(GrkError::NotInitialized)
        }
    }

    fn open_current(&self, workspace: &Workspace) -> Result<SnapshotReader, GrkError> {
        Self::ensure_initialized(workspace)?;
        let reader =
            SnapshotReader::open_current(&workspace.store_layout(), Some(Arc::clone(&self.chunk_cache)))?
                .with_cache_ttl(Duration::from_secs(self.config.store.cache_ttl_secs));
        Ok(reader)
    }

    fn build_options(&self, parent_scan: Option<String>) -> BuildOptions {
        BuildOptions {
            retain_scans: self.config.store.retain_scans,
            file_index_jsonl_threshold: self.config.store.file_index_jsonl_threshold,
            parent_scan,
        }
    }

    // -------------------------------------------------------------------------
    // Workspace operations
    // -------------------------------------------------------------------------

    /// Create `.grounded/` with a starter project config.
    pub fn init(&self, workspace: &Workspace) -> Result<InitReport, GrkError> {
        if workspace.is_initialized() {
            return Err(GrkError::AlreadyInitialized {
                data_dir: workspace.data_dir().to_path_buf(),
            });
        }
        fs::create_dir_all(workspace.data_dir())?;

        let project = self.project_name(workspace);
        let config_path = workspace.config_path();
        if !config_path.exists() {
            let starter = ProjectConfig {
                name: Some(project.clone()),
                ..Default::default()
            };
            let yaml = serde_yaml::to_string(&starter)?;
            fs::write(
                &config_path,
                format!(
                    "# Project overrides for grk. Any section set here replaces the global one.\n{}",
                    yaml
                ),
            )?;
        }

        info!("Initialized GRK project {} at {}", project, workspace.root().display());
        Ok(InitReport {
            data_dir: workspace.data_dir().to_path_buf(),
            config_path,
            project,
        })
    }

    /// Scan the whole working tree and publish a new scan.
    pub fn build(&self, workspace: &Workspace) -> Result<BuildOutcome, GrkError> {
        Self::ensure_initialized(workspace)?;
        let layout = workspace.store_layout();
        let Some(_lease) = BuildLease::try_acquire(&layout.lock_path())? else {
            warn!("Build already running for {}; skipping", workspace.root().display());
            return Ok(BuildOutcome::Skipped {
                lock_path: layout.lock_path(),
            });
        };

        let started = Instant::now();
        let files = FsScanner::new(workspace.root()).scan()?;
        let mut repository = MemoryChunkRepository::new();
        ChunkBuilder::new(&self.config.chunking).build_into(&files, &mut repository);

        let head = FsWorkingTree::new(workspace.root()).head_commit();
        let outcome = SnapshotBuilder::new(&layout, self.build_options(None)).publish(
            &repository,
            &self.project_name(workspace),
            head.as_deref(),
        )?;
        self.facts.invalidate(workspace);

        Ok(BuildOutcome::Published(BuildReport {
            kind: BuildKind::Full,
            scan_id: outcome.meta.scan_id,
            parent_scan: None,
            head_commit: outcome.meta.head_commit,
            stats: outcome.meta.stats,
            file_index_format: outcome.meta.file_index_format,
            pruned: outcome.pruned.removed,
            changes: None,
            ids_migrated: None,
            elapsed_ms: started.elapsed().as_millis() as u64,
        }))
    }

    /// Apply a change set on top of the current scan and publish the result.
    ///
    /// Added or modified paths that no longer exist are treated as deleted.
    pub fn rebuild(&self, workspace: &Workspace, changes: &ChangeSet) -> Result<BuildOutcome, GrkError> {
        if changes.is_empty() {
            return Err(GrkError::InvalidArgument(
                "Nothing to rebuild: pass --added, --modified or --deleted paths".to_string(),
            ));
        }
        let reader = self.open_current(workspace)?;
        let layout = workspace.store_layout();
        let Some(_lease) = BuildLease::try_acquire(&layout.lock_path())? else {
            warn!("Build already running for {}; skipping", workspace.root().display());
            return Ok(BuildOutcome::Skipped {
                lock_path: layout.lock_path(),
            });
        };

        let started = Instant::now();
        let changed = normalize_paths(workspace, changes.added.iter().chain(&changes.modified))?;
        let mut deleted = normalize_paths(workspace, changes.deleted.iter())?;

        let files = FsScanner::new(workspace.root()).scan_paths(&changed)?;
        for path in &changed {
            if !files.iter().any(|f| &f.path == path) && !deleted.contains(path) {
                debug!("{} is gone from the working tree; treating as deleted", path);
                deleted.push(path.clone());
            }
        }

        let mut repository = MemoryChunkRepository::from_snapshot(&reader)?;
        let summary = ChunkBuilder::new(&self.config.chunking).rebuild(&mut repository, &files, &deleted);

        let parent = reader.scan_id().to_string();
        let head = FsWorkingTree::new(workspace.root()).head_commit();
        let outcome = SnapshotBuilder::new(&layout, self.build_options(Some(parent.clone()))).publish(
            &repository,
            &self.project_name(workspace),
            head.as_deref(),
        )?;
        self.facts.invalidate(workspace);

        info!(
            "Rebuilt scan {} from {} ({} chunks written, {} removed)",
            outcome.meta.scan_id, parent, summary.chunks_written, summary.chunks_removed
        );
        Ok(BuildOutcome::Published(BuildReport {
            kind: BuildKind::Incremental,
            scan_id: outcome.meta.scan_id,
            parent_scan: Some(parent),
            head_commit: outcome.meta.head_commit,
            stats: outcome.meta.stats,
            file_index_format: outcome.meta.file_index_format,
            pruned: outcome.pruned.removed,
            changes: Some(summary),
            ids_migrated: None,
            elapsed_ms: started.elapsed().as_millis() as u64,
        }))
    }

    // -------------------------------------------------------------------------
    // Inspection
    // -------------------------------------------------------------------------

    /// Report project state. Works on uninitialized projects.
    pub fn status(&self, workspace: &Workspace) -> Result<StatusReport, GrkError> {
        let mut report = StatusReport {
            root: workspace.root().to_path_buf(),
            data_dir: workspace.data_dir().to_path_buf(),
            initialized: workspace.is_initialized(),
            project: self.project_name(workspace),
            current_scan: None,
            scan_count: 0,
            has_stack_facts: workspace.stack_path().exists(),
            has_route_index: workspace.routes_path().exists(),
            ask_count: 0,
            model_provider: self.config.model.provider,
            model_id: self.config.model.model_id.clone(),
        };
        if !report.initialized {
            return Ok(report);
        }

        let layout = workspace.store_layout();
        report.scan_count = list_scans(&layout)?.len();
        if let Some(scan_id) = read_current(&layout)? {
            match SnapshotReader::open(&layout, &scan_id, None) {
                Ok(reader) => report.current_scan = Some(reader.meta().clone()),
                Err(e) => warn!("Current scan {} is unreadable: {}", scan_id, e),
            }
        }
        report.ask_count = read_ask_log(&workspace.ask_log_path())?.len();
        Ok(report)
    }

    pub fn scans(&self, workspace: &Workspace) -> Result<ScanListing, GrkError> {
        Self::ensure_initialized(workspace)?;
        let layout = workspace.store_layout();
        let mut scans = list_scans(&layout)?;
        scans.reverse();
        Ok(ScanListing {
            current: read_current(&layout)?,
            scans,
        })
    }

    /// Cross-check the current scan's file index against its chunk set.
    pub fn validate(&self, workspace: &Workspace) -> Result<ValidationReport, GrkError> {
        let reader = self.open_current(workspace)?;
        Ok(reader.validate()?)
    }

    /// Classify every chunk id of the current scan. With `migrate`, rewrite
    /// legacy and drifted ids into a new scan.
    pub fn verify_ids(&self, workspace: &Workspace, migrate: bool) -> Result<IdVerification, GrkError> {
        let reader = self.open_current(workspace)?;
        let chunks: Vec<ChunkRecord> = reader.stream_chunks()?.collect();
        let report = IdVerificationReport::from_chunks(&chunks);
        drop(chunks);

        let migration = if migrate && !report.is_clean() {
            Some(self.migrate(workspace, &reader)?)
        } else {
            None
        };
        Ok(IdVerification {
            scan_id: reader.scan_id().to_string(),
            report,
            migration,
        })
    }

    fn migrate(&self, workspace: &Workspace, reader: &SnapshotReader) -> Result<BuildOutcome, GrkError> {
        let layout = workspace.store_layout();
        let Some(_lease) = BuildLease::try_acquire(&layout.lock_path())? else {
            return Ok(BuildOutcome::Skipped {
                lock_path: layout.lock_path(),
            });
        };

        let started = Instant::now();
        let mut repository = MemoryChunkRepository::from_snapshot(reader)?;
        let rewritten = migrate_repository(&mut repository);
        debug!("Migrated {} chunk ids across {} files", rewritten, repository.file_count());

        let parent = reader.scan_id().to_string();
        let outcome = SnapshotBuilder::new(&layout, self.build_options(Some(parent.clone()))).publish(
            &repository,
            &self.project_name(workspace),
            reader.meta().head_commit.as_deref(),
        )?;

        Ok(BuildOutcome::Published(BuildReport {
            kind: BuildKind::Migration,
            scan_id: outcome.meta.scan_id,
            parent_scan: Some(parent),
            head_commit: outcome.meta.head_commit,
            stats: outcome.meta.stats,
            file_index_format: outcome.meta.file_index_format,
            pruned: outcome.pruned.removed,
            changes: None,
            ids_migrated: Some(rewritten),
            elapsed_ms: started.elapsed().as_millis() as u64,
        }))
    }

    // -------------------------------------------------------------------------
    // Retrieval and answers
    // -------------------------------------------------------------------------

    pub fn retrieve(&self, workspace: &Workspace, query: &str) -> Result<Retrieval, GrkError> {
        let reader = self.open_current(workspace)?;
        self.retrieve_with(workspace, &reader, query)
    }

    fn retrieve_with(
        &self,
        workspace: &Workspace,
        reader: &SnapshotReader,
        query: &str,
    ) -> Result<Retrieval, GrkError> {
        if query.trim().is_empty() {
            return Err(GrkError::InvalidArgument("Query must not be empty".to_string()));
        }
        let facts = self.facts.load(workspace)?;
        let tree = FsWorkingTree::new(workspace.root());
        RetrievalEngine::new(&self.config.retrieval, &self.redactor).retrieve(query, reader, &facts, &tree)
    }

    /// Answer `question` from the current scan.
    ///
    /// An empty retrieval produces a "not enough context" answer without
    /// calling the model. Every answer is appended to the ask log.
    pub fn ask(
        &self,
        workspace: &Workspace,
        question: &str,
        options: AskOptions,
    ) -> Result<AskOutcome, GrkError> {
        let reader = self.open_current(workspace)?;
        let scan_id = reader.scan_id().to_string();
        let retrieval = self.retrieve_with(workspace, &reader, question)?;
        let formatter = ResponseFormatter::new(&self.config.response);

        let answer = if retrieval.is_empty() {
            info!("No chunks retrieved for question; answering with not enough context");
            formatter.not_enough_context(&retrieval.analysis, Usage::default())
        } else {
            let facts = self.facts.load(workspace)?;
            let project = self.project_name(workspace);
            let prompt = PromptBuilder::new(&project, &facts.stack).build(question, &retrieval.chunks);

            if options.prompt_only {
                return Ok(AskOutcome::PromptOnly(PromptPreview {
                    question: question.to_string(),
                    scan_id,
                    prompt,
                    retrieval: retrieval.stats,
                }));
            }

            let model = self.model()?;
            debug!(
                "Calling {} model {} with {} chars",
                model.provider(),
                model.model_id(),
                prompt.char_count()
            );
            let completion = model.complete(&prompt.system, &prompt.user)?;
            formatter.format(&retrieval.analysis, &retrieval.chunks, &completion, prompt.char_count())
        };

        let entry = AskLogEntry::new(question, scan_id.as_str(), &answer);
        if let Err(e) = append_ask_log(&workspace.ask_log_path(), &entry) {
            warn!("Failed to record ask: {}", e);
        }
        info!(
            "Answered with {} confidence ({} of {} chunks referenced)",
            answer.confidence, answer.usage.referenced_chunks, answer.usage.chunks
        );

        Ok(AskOutcome::Answered(AskResult {
            question: question.to_string(),
            scan_id,
            answer,
            retrieval: retrieval.stats,
        }))
    }
}

impl std::fmt::Debug for GrkEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GrkEngine")
            .field("config", &self.config)
            .field("redactor", &self.redactor)
            .field("model", &self.model)
            .finish()
    }
}

/// Project-relative forms of user-supplied paths.
fn normalize_paths<'a>(
    workspace: &Workspace,
    paths: impl Iterator<Item = &'a String>,
) -> Result<Vec<String>, GrkError> {
    let mut out = Vec::new();
    for raw in paths {
        let rel = workspace
            .relative_path(Path::new(raw))
            .ok_or_else(|| GrkError::InvalidPath(format!("{} is outside the project", raw)))?;
        if !out.contains(&rel) {
            out.push(rel);
        }
    }
    Ok(out)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk_id::legacy_v2_chunk_id;
    use crate::response::ConfidenceLevel;
    use grk_model::ScriptedCompletionModel;
    use tempfile::TempDir;

    const LOGIN: &str = "<?php\n\nnamespace App\\Auth;\n\nclass LoginController\n{\n    public function login($request)\n    {\n        $credentials = $request->only('email', 'password');\n        return Auth::attempt($credentials);\n    }\n}\n";
    const CART: &str = "<?php\n\nnamespace App\\Shop;\n\nclass CartController\n{\n    public function add($request)\n    {\n        return view('cart');\n    }\n}\n";

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn project() -> (TempDir, Workspace) {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "app/Auth/LoginController.php", LOGIN);
        write(temp.path(), "app/Shop/CartController.php", CART);
        let workspace = Workspace::from_root(temp.path()).unwrap();
        (temp, workspace)
    }

    fn engine(config: GrkConfig) -> GrkEngine {
        GrkEngine::new(config).unwrap()
    }

    fn built() -> (TempDir, Workspace, GrkEngine, String) {
        let (temp, workspace) = project();
        let engine = engine(GrkConfig::default());
        engine.init(&workspace).unwrap();
        let scan_id = engine.build(&workspace).unwrap().report().unwrap().scan_id.clone();
        (temp, workspace, engine, scan_id)
    }

    #[test]
    fn test_init_creates_data_dir_once() {
        let (_temp, workspace) = project();
        let engine = engine(GrkConfig::default());

        let report = engine.init(&workspace).unwrap();
        assert!(workspace.is_initialized());
        assert!(report.config_path.exists());
        let project = ProjectConfig::load_from_workspace(workspace.root()).unwrap();
        assert_eq!(project.name.as_deref(), Some(report.project.as_str()));

        let err = engine.init(&workspace).unwrap_err();
        assert!(matches!(err, GrkError::AlreadyInitialized { .. }));
    }

    #[test]
    fn test_operations_require_init_and_build() {
        let (_temp, workspace) = project();
        let engine = engine(GrkConfig::default());
        assert!(matches!(engine.build(&workspace), Err(GrkError::NotInitialized)));

        engine.init(&workspace).unwrap();
        let err = engine.retrieve(&workspace, "login").unwrap_err();
        assert!(matches!(err, GrkError::KnowledgeBaseUnavailable { .. }));

        let status = engine.status(&workspace).unwrap();
        assert!(status.initialized);
        assert!(status.current_scan.is_none());
    }

    #[test]
    fn test_build_publishes_and_retrieves() {
        let (_temp, workspace, engine, scan_id) = built();

        let status = engine.status(&workspace).unwrap();
        let current = status.current_scan.unwrap();
        assert_eq!(current.scan_id, scan_id);
        assert_eq!(current.stats.file_count, 2);
        assert_eq!(current.stats.chunk_count, 2);

        assert!(engine.validate(&workspace).unwrap().is_consistent());

        let retrieval = engine.retrieve(&workspace, "How does login work?").unwrap();
        assert_eq!(retrieval.chunks[0].chunk.path, "app/Auth/LoginController.php");
        assert!(retrieval.chunks[0].content.contains("Auth::attempt"));
    }

    #[test]
    fn test_build_skips_while_lease_is_held() {
        let (_temp, workspace) = project();
        let engine = engine(GrkConfig::default());
        engine.init(&workspace).unwrap();

        let lease = BuildLease::try_acquire(&workspace.store_layout().lock_path())
            .unwrap()
            .unwrap();
        let outcome = engine.build(&workspace).unwrap();
        assert!(matches!(outcome, BuildOutcome::Skipped { .. }));
        drop(lease);

        assert!(engine.build(&workspace).unwrap().report().is_some());
    }

    #[test]
    fn test_rebuild_applies_changes_on_top_of_current_scan() {
        let (temp, workspace, engine, first) = built();

        write(temp.path(), "app/Shop/CartController.php", &CART.replace("cart", "basket"));
        write(temp.path(), "app/Models/Order.php", "<?php\n\nclass Order\n{\n}\n");
        fs::remove_file(temp.path().join("app/Auth/LoginController.php")).unwrap();

        let changes = ChangeSet {
            added: vec!["app/Models/Order.php".to_string()],
            modified: vec![workspace
                .root()
                .join("app/Shop/CartController.php")
                .to_string_lossy()
                .into_owned()],
            deleted: vec!["app/Auth/LoginController.php".to_string()],
        };
        let outcome = engine.rebuild(&workspace, &changes).unwrap();
        let report = outcome.report().unwrap();
        assert_eq!(report.kind, BuildKind::Incremental);
        assert_eq!(report.parent_scan.as_deref(), Some(first.as_str()));

        let summary = report.changes.as_ref().unwrap();
        assert_eq!(summary.added_files, 1);
        assert_eq!(summary.modified_files, 1);
        assert_eq!(summary.deleted_files, 1);
        assert_eq!(report.stats.file_count, 2);

        assert!(engine.validate(&workspace).unwrap().is_consistent());
        let err = engine.rebuild(&workspace, &ChangeSet::default()).unwrap_err();
        assert!(matches!(err, GrkError::InvalidArgument(_)));
    }

    #[test]
    fn test_retention_keeps_three_most_recent_scans() {
        let (_temp, workspace) = project();
        let mut config = GrkConfig::default();
        config.store.retain_scans = 3;
        let engine = engine(config);
        engine.init(&workspace).unwrap();

        let mut published = Vec::new();
        for _ in 0..4 {
            let outcome = engine.build(&workspace).unwrap();
            published.push(outcome.report().unwrap().scan_id.clone());
            std::thread::sleep(Duration::from_millis(5));
        }

        let listing = engine.scans(&workspace).unwrap();
        let ids: Vec<&str> = listing.scans.iter().map(|s| s.scan_id.as_str()).collect();
        assert_eq!(ids, vec![&published[3], &published[2], &published[1]]);
        assert_eq!(listing.current.as_deref(), Some(published[3].as_str()));
        assert!(!workspace.store_layout().scan_dir(&published[0]).exists());
    }

    #[test]
    fn test_verify_ids_migrates_legacy_ids() {
        let (_temp, workspace, engine, scan_id) = built();

        let clean = engine.verify_ids(&workspace, true).unwrap();
        assert!(clean.report.is_clean());
        assert!(clean.migration.is_none());

        // Rewrite one chunk id into the path/line legacy format.
        let chunks_path = workspace.store_layout().scan_dir(&scan_id).join("chunks.jsonl");
        let text = fs::read_to_string(&chunks_path).unwrap();
        let mut lines: Vec<String> = text.lines().map(str::to_string).collect();
        let mut chunk: ChunkRecord = serde_json::from_str(&lines[0]).unwrap();
        chunk.id = legacy_v2_chunk_id(&chunk.path, chunk.start_line, chunk.end_line);
        lines[0] = serde_json::to_string(&chunk).unwrap();
        fs::write(&chunks_path, lines.join("\n") + "\n").unwrap();

        let verification = engine.verify_ids(&workspace, true).unwrap();
        assert_eq!(verification.report.legacy_v2, 1);
        let report = verification.migration.as_ref().unwrap().report().unwrap();
        assert_eq!(report.kind, BuildKind::Migration);
        assert_eq!(report.ids_migrated, Some(1));

        let after = engine.verify_ids(&workspace, false).unwrap();
        assert_eq!(after.scan_id, report.scan_id);
        assert!(after.report.is_clean());
        assert!(engine.validate(&workspace).unwrap().is_consistent());
    }

    #[test]
    fn test_ask_without_candidates_does_not_call_model() {
        let (_temp, workspace, engine, scan_id) = built();
        let engine = engine.with_model(Arc::new(ScriptedCompletionModel::failing("not expected")));

        let outcome = engine
            .ask(&workspace, "quantum entanglement telemetry", AskOptions::default())
            .unwrap();
        let AskOutcome::Answered(result) = outcome else {
            panic!("expected an answer");
        };
        assert!(result.answer.insufficient_context);
        assert!(result.answer.audit.is_empty());
        assert_eq!(result.answer.confidence, ConfidenceLevel::Low);
        assert_eq!(result.answer.usage.chunks, 0);

        let log = read_ask_log(&workspace.ask_log_path()).unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].scan_id, scan_id);
        assert_eq!(log[0].confidence, "low");
    }

    #[test]
    fn test_ask_grounds_answer_in_retrieved_chunks() {
        let (_temp, workspace, engine, _) = built();
        let model = Arc::new(ScriptedCompletionModel::new(
            "`LoginController::login` passes the credentials to `Auth::attempt` \
             (app/Auth/LoginController.php:L10).\nConfidence: high",
        ));
        let engine = engine.with_model(model.clone());

        let outcome = engine
            .ask(&workspace, "How does login work?", AskOptions::default())
            .unwrap();
        let AskOutcome::Answered(result) = outcome else {
            panic!("expected an answer");
        };
        let answer = &result.answer;
        assert!(!answer.insufficient_context);
        assert_eq!(answer.audit[0].path, "app/Auth/LoginController.php");
        assert!(answer.audit[0].referenced);
        assert!(!answer.answer.contains("Confidence:"));
        assert_eq!(answer.model_id.as_deref(), Some("scripted"));

        let (system, user) = model.last_prompt().unwrap();
        assert!(system.contains("NOT ENOUGH CONTEXT"));
        assert!(user.contains("app/Auth/LoginController.php"));
        assert_eq!(engine.status(&workspace).unwrap().ask_count, 1);
    }

    #[test]
    fn test_ask_prompt_only_skips_model_and_log() {
        let (_temp, workspace, engine, _) = built();
        let engine = engine.with_model(Arc::new(ScriptedCompletionModel::failing("not expected")));

        let outcome = engine
            .ask(&workspace, "How does login work?", AskOptions { prompt_only: true })
            .unwrap();
        let AskOutcome::PromptOnly(preview) = outcome else {
            panic!("expected a prompt preview");
        };
        assert!(preview.prompt.user.contains("class LoginController"));
        assert!(read_ask_log(&workspace.ask_log_path()).unwrap().is_empty());
    }

    #[test]
    fn test_ask_surfaces_model_failure() {
        let (_temp, workspace, engine, _) = built();
        let engine = engine.with_model(Arc::new(ScriptedCompletionModel::failing("connection refused")));

        let err = engine
            .ask(&workspace, "How does login work?", AskOptions::default())
            .unwrap_err();
        assert!(matches!(err, GrkError::ModelProvider { .. }));
    }
}
