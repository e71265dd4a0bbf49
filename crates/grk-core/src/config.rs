//! Configuration types for GRK.
//!
//! - [`GlobalConfig`]: user-level configuration stored in `~/.grk/config.yaml`
//! - [`ProjectConfig`]: project-level overrides stored in `.grounded/config.yaml`
//! - [`GrkConfig`]: the resolved, validated configuration handed to the engine
//!
//! A section present in the project file replaces the global section wholesale.
//! Missing keys inside a section fall back to their defaults.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use grk_model::ModelConfig;
use regex::Regex;

use crate::constants::{GLOBAL_CONFIG_FILENAME, GRK_HOME_DIR, GROUNDED_DIR, PROJECT_CONFIG_FILENAME};
use crate::errors::GrkError;

// ============================================================================
// Chunking
// ============================================================================

/// Files at or below this many lines become a single complete-file chunk.
pub const DEFAULT_SMALL_FILE_LINES: u32 = 400;

/// Lower bound of a chunk window, in lines.
pub const DEFAULT_MIN_LINES: u32 = 250;

/// Upper bound of a chunk window, in lines.
pub const DEFAULT_MAX_LINES: u32 = 400;

/// Soft maximum serialized size of a chunk, in bytes.
pub const DEFAULT_MAX_CHUNK_BYTES: u64 = 32 * 1024;

/// Weights of candidate split points.
///
/// Higher wins. The default ordering is blank > class > function > closing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BreakWeights {
    pub blank: u32,
    pub class: u32,
    pub function: u32,
    pub closing: u32,
}

impl Default for BreakWeights {
    fn default() -> Self {
        Self {
            blank: 4,
            class: 3,
            function: 2,
            closing: 1,
        }
    }
}

/// Chunk builder configuration.
///
/// ```yaml
/// chunking:
///   smallFileLines: 400
///   minLines: 250
///   maxLines: 400
///   maxChunkBytes: 32768
///   breakWeights: { blank: 4, class: 3, function: 2, closing: 1 }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkingConfig {
    #[serde(default = "default_small_file_lines")]
    pub small_file_lines: u32,
    #[serde(default = "default_min_lines")]
    pub min_lines: u32,
    #[serde(default = "default_max_lines")]
    pub max_lines: u32,
    #[serde(default = "default_max_chunk_bytes")]
    pub max_chunk_bytes: u64,
    #[serde(default)]
    pub break_weights: BreakWeights,
}

fn default_small_file_lines() -> u32 {
    DEFAULT_SMALL_FILE_LINES
}
fn default_min_lines() -> u32 {
    DEFAULT_MIN_LINES
}
fn default_max_lines() -> u32 {
    DEFAULT_MAX_LINES
}
fn default_max_chunk_bytes() -> u64 {
    DEFAULT_MAX_CHUNK_BYTES
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            small_file_lines: DEFAULT_SMALL_FILE_LINES,
            min_lines: DEFAULT_MIN_LINES,
            max_lines: DEFAULT_MAX_LINES,
            max_chunk_bytes: DEFAULT_MAX_CHUNK_BYTES,
            break_weights: BreakWeights::default(),
        }
    }
}

impl ChunkingConfig {
    /// Validates the chunking configuration, returning warnings for questionable values.
    pub fn validate(&self) -> Result<Vec<String>, GrkError> {
        let mut warnings = Vec::new();

        if self.min_lines == 0 {
            return Err(GrkError::InvalidConfiguration {
                message: "chunking.minLines cannot be 0".to_string(),
                hint: "Set minLines to at least 1 (recommended: 250)".to_string(),
            });
        }
        if self.max_lines < self.min_lines {
            return Err(GrkError::InvalidConfiguration {
                message: format!(
                    "chunking.maxLines ({}) is smaller than chunking.minLines ({})",
                    self.max_lines, self.min_lines
                ),
                hint: "Set maxLines greater than or equal to minLines".to_string(),
            });
        }
        if self.max_chunk_bytes == 0 {
            return Err(GrkError::InvalidConfiguration {
                message: "chunking.maxChunkBytes cannot be 0".to_string(),
                hint: "Set maxChunkBytes to a positive size (recommended: 32768)".to_string(),
            });
        }

        let w = &self.break_weights;
        if !(w.blank > w.class && w.class > w.function && w.function > w.closing) {
            warnings.push(format!(
                "chunking.breakWeights ({}, {}, {}, {}) no longer favor blank > class > function > closing",
                w.blank, w.class, w.function, w.closing
            ));
        }
        if self.small_file_lines > self.max_lines {
            warnings.push(format!(
                "chunking.smallFileLines ({}) exceeds maxLines ({}); complete-file chunks may be large",
                self.small_file_lines, self.max_lines
            ));
        }

        Ok(warnings)
    }
}

// ============================================================================
// Store
// ============================================================================

/// Snapshot store configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreConfig {
    /// Number of scans kept after each build.
    #[serde(default = "default_retain_scans")]
    pub retain_scans: usize,
    /// File count above which the file index is written as JSONL.
    #[serde(default = "default_jsonl_threshold")]
    pub file_index_jsonl_threshold: usize,
    /// TTL of cached chunk lookups, stack facts and route index.
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
    /// Maximum entries of the chunk lookup cache.
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,
}

fn default_retain_scans() -> usize {
    grk_db::snapshot::DEFAULT_RETAIN_SCANS
}
fn default_jsonl_threshold() -> usize {
    grk_db::snapshot::DEFAULT_FILE_INDEX_JSONL_THRESHOLD
}
fn default_cache_ttl_secs() -> u64 {
    300
}
fn default_cache_capacity() -> usize {
    10_000
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            retain_scans: default_retain_scans(),
            file_index_jsonl_threshold: default_jsonl_threshold(),
            cache_ttl_secs: default_cache_ttl_secs(),
            cache_capacity: default_cache_capacity(),
        }
    }
}

impl StoreConfig {
    pub fn validate(&self) -> Result<Vec<String>, GrkError> {
        let mut warnings = Vec::new();

        if self.retain_scans == 0 {
            return Err(GrkError::InvalidConfiguration {
                message: "store.retainScans cannot be 0".to_string(),
                hint: "Set retainScans to at least 1 (recommended: 3)".to_string(),
            });
        }
        if self.cache_capacity == 0 {
            return Err(GrkError::InvalidConfiguration {
                message: "store.cacheCapacity cannot be 0".to_string(),
                hint: "Set cacheCapacity to at least 1 (recommended: 10000)".to_string(),
            });
        }
        if self.retain_scans > 50 {
            warnings.push(format!(
                "store.retainScans={} keeps many scans; disk usage grows with every build",
                self.retain_scans
            ));
        }
        if self.cache_ttl_secs == 0 {
            warnings.push("store.cacheTtlSecs=0 disables caching of lookups".to_string());
        }

        Ok(warnings)
    }
}

// ============================================================================
// Retrieval
// ============================================================================

/// Additive scoring boosts.
///
/// The relative ordering `exactPath > symbolDeclared > import > routeHandler
/// > pathContains > keyword > frameworkPathHint` is enforced at load time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScoringBoosts {
    pub exact_path: f64,
    pub symbol_declared: f64,
    pub symbol_used: f64,
    pub import: f64,
    pub route_handler: f64,
    pub path_contains: f64,
    pub domain_path: f64,
    pub keyword: f64,
    pub framework_path_hint: f64,
}

impl Default for ScoringBoosts {
    fn default() -> Self {
        Self {
            exact_path: 100.0,
            symbol_declared: 60.0,
            symbol_used: 30.0,
            import: 40.0,
            route_handler: 35.0,
            path_contains: 25.0,
            domain_path: 15.0,
            keyword: 10.0,
            framework_path_hint: 5.0,
        }
    }
}

impl ScoringBoosts {
    fn validate(&self) -> Result<Vec<String>, GrkError> {
        let ordered = [
            ("exactPath", self.exact_path),
            ("symbolDeclared", self.symbol_declared),
            ("import", self.import),
            ("routeHandler", self.route_handler),
            ("pathContains", self.path_contains),
            ("keyword", self.keyword),
            ("frameworkPathHint", self.framework_path_hint),
        ];

        if let Some((name, value)) = ordered.iter().find(|(_, v)| *v <= 0.0) {
            return Err(GrkError::InvalidConfiguration {
                message: format!("retrieval.boosts.{} ({}) must be positive", name, value),
                hint: "Use positive boosts; only their ordering and relative size matter".to_string(),
            });
        }
        for pair in ordered.windows(2) {
            let (higher, hv) = pair[0];
            let (lower, lv) = pair[1];
            if hv <= lv {
                return Err(GrkError::InvalidConfiguration {
                    message: format!(
                        "retrieval.boosts.{} ({}) must be greater than retrieval.boosts.{} ({})",
                        higher, hv, lower, lv
                    ),
                    hint: "Keep exactPath > symbolDeclared > import > routeHandler > pathContains > keyword > frameworkPathHint".to_string(),
                });
            }
        }
        if self.symbol_used > self.symbol_declared {
            return Err(GrkError::InvalidConfiguration {
                message: format!(
                    "retrieval.boosts.symbolUsed ({}) cannot exceed symbolDeclared ({})",
                    self.symbol_used, self.symbol_declared
                ),
                hint: "A declaration must outrank a usage of the same symbol".to_string(),
            });
        }

        let mut warnings = Vec::new();
        if self.domain_path > self.path_contains || self.domain_path < self.keyword {
            warnings.push(format!(
                "retrieval.boosts.domainPath ({}) is outside the pathContains..keyword range",
                self.domain_path
            ));
        }
        Ok(warnings)
    }
}

/// Upper bound of candidates each gathering strategy may contribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StrategyLimits {
    pub path: usize,
    pub symbol: usize,
    pub import: usize,
    pub route: usize,
    pub domain: usize,
    pub keyword: usize,
    pub stack: usize,
}

impl Default for StrategyLimits {
    fn default() -> Self {
        Self {
            path: 50,
            symbol: 50,
            import: 30,
            route: 20,
            domain: 30,
            keyword: 30,
            stack: 20,
        }
    }
}

/// Retrieval engine configuration.
///
/// ```yaml
/// retrieval:
///   maxChunks: 12
///   minDiverseFiles: 4
///   maxContentBytes: 60000
///   boosts:
///     exactPath: 100
///     keyword: 10
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetrievalConfig {
    #[serde(default = "default_max_chunks")]
    pub max_chunks: usize,
    #[serde(default = "default_min_diverse_files")]
    pub min_diverse_files: usize,
    #[serde(default = "default_max_content_bytes")]
    pub max_content_bytes: u64,
    #[serde(default = "default_avg_bytes_per_line")]
    pub avg_bytes_per_line: u64,
    #[serde(default)]
    pub boosts: ScoringBoosts,
    #[serde(default = "default_complete_file_multiplier")]
    pub complete_file_multiplier: f64,
    /// Chunks longer than this many lines count as overlong.
    #[serde(default = "default_overlong_lines")]
    pub overlong_lines: u32,
    #[serde(default = "default_overlong_multiplier")]
    pub overlong_multiplier: f64,
    #[serde(default)]
    pub strategy_limits: StrategyLimits,
    /// Below this many candidates the keyword fallback runs.
    #[serde(default = "default_min_candidate_pool")]
    pub min_candidate_pool: usize,
}

fn default_max_chunks() -> usize {
    12
}
fn default_min_diverse_files() -> usize {
    4
}
fn default_max_content_bytes() -> u64 {
    60_000
}
fn default_avg_bytes_per_line() -> u64 {
    40
}
fn default_complete_file_multiplier() -> f64 {
    1.2
}
fn default_overlong_lines() -> u32 {
    300
}
fn default_overlong_multiplier() -> f64 {
    0.8
}
fn default_min_candidate_pool() -> usize {
    10
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            max_chunks: default_max_chunks(),
            min_diverse_files: default_min_diverse_files(),
            max_content_bytes: default_max_content_bytes(),
            avg_bytes_per_line: default_avg_bytes_per_line(),
            boosts: ScoringBoosts::default(),
            complete_file_multiplier: default_complete_file_multiplier(),
            overlong_lines: default_overlong_lines(),
            overlong_multiplier: default_overlong_multiplier(),
            strategy_limits: StrategyLimits::default(),
            min_candidate_pool: default_min_candidate_pool(),
        }
    }
}

impl RetrievalConfig {
    /// Maximum chunks any single file may contribute to a selection.
    pub fn per_file_cap(&self) -> usize {
        self.max_chunks.div_ceil(self.min_diverse_files.max(1))
    }

    pub fn validate(&self) -> Result<Vec<String>, GrkError> {
        if self.max_chunks == 0 {
            return Err(GrkError::InvalidConfiguration {
                message: "retrieval.maxChunks cannot be 0".to_string(),
                hint: "Set maxChunks to at least 1 (recommended: 8-16)".to_string(),
            });
        }
        if self.min_diverse_files == 0 {
            return Err(GrkError::InvalidConfiguration {
                message: "retrieval.minDiverseFiles cannot be 0".to_string(),
                hint: "Set minDiverseFiles to at least 1 (recommended: 4)".to_string(),
            });
        }
        if self.avg_bytes_per_line == 0 {
            return Err(GrkError::InvalidConfiguration {
                message: "retrieval.avgBytesPerLine cannot be 0".to_string(),
                hint: "Set avgBytesPerLine to a typical line width (recommended: 40)".to_string(),
            });
        }
        if self.complete_file_multiplier <= 1.0 {
            return Err(GrkError::InvalidConfiguration {
                message: format!(
                    "retrieval.completeFileMultiplier ({}) must be greater than 1.0",
                    self.complete_file_multiplier
                ),
                hint: "Complete-file chunks are favored; use a value such as 1.2".to_string(),
            });
        }
        if self.overlong_multiplier <= 0.0 || self.overlong_multiplier >= 1.0 {
            return Err(GrkError::InvalidConfiguration {
                message: format!(
                    "retrieval.overlongMultiplier ({}) must be between 0.0 and 1.0 (exclusive)",
                    self.overlong_multiplier
                ),
                hint: "Overlong chunks are penalized; use a value such as 0.8".to_string(),
            });
        }

        let mut warnings = self.boosts.validate()?;
        if self.min_diverse_files > self.max_chunks {
            warnings.push(format!(
                "retrieval.minDiverseFiles ({}) > maxChunks ({}); at most one chunk per file will be selected",
                self.min_diverse_files, self.max_chunks
            ));
        }
        if self.max_content_bytes < self.avg_bytes_per_line * 50 {
            warnings.push(format!(
                "retrieval.maxContentBytes={} is very small; most chunks will exceed the budget",
                self.max_content_bytes
            ));
        }
        Ok(warnings)
    }
}

// ============================================================================
// Redaction
// ============================================================================

/// Redactor configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RedactionConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Extra file names (exact, case-insensitive) redacted as a whole.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extra_sensitive_names: Vec<String>,
    /// Extra regular expressions whose matches are replaced inline.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extra_patterns: Vec<String>,
}

fn default_true() -> bool {
    true
}

impl Default for RedactionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            extra_sensitive_names: Vec::new(),
            extra_patterns: Vec::new(),
        }
    }
}

impl RedactionConfig {
    pub fn validate(&self) -> Result<Vec<String>, GrkError> {
        for pattern in &self.extra_patterns {
            if let Err(e) = Regex::new(pattern) {
                return Err(GrkError::InvalidConfiguration {
                    message: format!("redaction.extraPatterns entry '{}' is not a valid regex: {}", pattern, e),
                    hint: "Fix or remove the pattern".to_string(),
                });
            }
        }
        let mut warnings = Vec::new();
        if !self.enabled {
            warnings.push("redaction.enabled=false; secrets may reach prompts and output".to_string());
        }
        Ok(warnings)
    }
}

// ============================================================================
// Response
// ============================================================================

/// Response formatter configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseConfig {
    /// Maximum quoted snippets per audit entry.
    #[serde(default = "default_max_snippets")]
    pub max_snippets: usize,
    /// Lines quoted on each side of a cited line.
    #[serde(default = "default_snippet_window")]
    pub snippet_window: u32,
    #[serde(default = "default_high_threshold")]
    pub high_threshold: f64,
    #[serde(default = "default_medium_threshold")]
    pub medium_threshold: f64,
    /// Weight of the model's self-reported confidence in the blend.
    #[serde(default = "default_self_report_weight")]
    pub self_report_weight: f64,
    /// Audit entries at or above this relevance are flagged as high relevance.
    #[serde(default = "default_high_relevance_score")]
    pub high_relevance_score: f64,
}

fn default_max_snippets() -> usize {
    3
}
fn default_snippet_window() -> u32 {
    2
}
fn default_high_threshold() -> f64 {
    0.75
}
fn default_medium_threshold() -> f64 {
    0.45
}
fn default_self_report_weight() -> f64 {
    0.4
}
fn default_high_relevance_score() -> f64 {
    50.0
}

impl Default for ResponseConfig {
    fn default() -> Self {
        Self {
            max_snippets: default_max_snippets(),
            snippet_window: default_snippet_window(),
            high_threshold: default_high_threshold(),
            medium_threshold: default_medium_threshold(),
            self_report_weight: default_self_report_weight(),
            high_relevance_score: default_high_relevance_score(),
        }
    }
}

impl ResponseConfig {
    pub fn validate(&self) -> Result<Vec<String>, GrkError> {
        let in_unit = |v: f64| (0.0..=1.0).contains(&v);
        if !in_unit(self.high_threshold) || !in_unit(self.medium_threshold) {
            return Err(GrkError::InvalidConfiguration {
                message: "response.highThreshold and response.mediumThreshold must be within 0.0..=1.0"
                    .to_string(),
                hint: "Use values such as highThreshold: 0.75, mediumThreshold: 0.45".to_string(),
            });
        }
        if self.medium_threshold >= self.high_threshold {
            return Err(GrkError::InvalidConfiguration {
                message: format!(
                    "response.mediumThreshold ({}) must be lower than response.highThreshold ({})",
                    self.medium_threshold, self.high_threshold
                ),
                hint: "Keep mediumThreshold < highThreshold".to_string(),
            });
        }
        if !in_unit(self.self_report_weight) {
            return Err(GrkError::InvalidConfiguration {
                message: format!(
                    "response.selfReportWeight ({}) must be within 0.0..=1.0",
                    self.self_report_weight
                ),
                hint: "Use a value between 0.0 (ignore the model) and 1.0 (trust it fully)".to_string(),
            });
        }

        let mut warnings = Vec::new();
        if self.max_snippets == 0 {
            warnings.push("response.maxSnippets=0; audit entries will carry no quotes".to_string());
        }
        if self.self_report_weight > 0.8 {
            warnings.push(format!(
                "response.selfReportWeight ({}) lets the model's own confidence dominate citation coverage",
                self.self_report_weight
            ));
        }
        Ok(warnings)
    }
}

// ============================================================================
// GlobalConfig
// ============================================================================

/// Global (user-level) configuration for GRK.
///
/// Loaded from `~/.grk/config.yaml`. Every section is optional.
///
/// # Example YAML
///
/// ```yaml
/// store:
///   retainScans: 5
/// retrieval:
///   maxChunks: 16
/// model:
///   provider: ollama
///   modelId: qwen2.5-coder:7b
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GlobalConfig {
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub redaction: RedactionConfig,
    #[serde(default)]
    pub response: ResponseConfig,
    #[serde(default)]
    pub model: ModelConfig,
}

impl GlobalConfig {
    /// Load the global configuration from the default location (`~/.grk/config.yaml`).
    ///
    /// If the file does not exist, returns the defaults.
    ///
    /// # Errors
    ///
    /// Returns [`GrkError::InvalidGlobalConfig`] if the file exists but cannot be parsed.
    pub fn load_default() -> Result<Self, GrkError> {
        match Self::default_path() {
            Some(path) => Self::from_path(&path),
            None => {
                tracing::debug!("Could not determine home directory, using default config");
                Ok(Self::default())
            }
        }
    }

    /// Load the global configuration from a specific path.
    ///
    /// If the file does not exist, returns the defaults.
    ///
    /// # Errors
    ///
    /// Returns [`GrkError::InvalidGlobalConfig`] if the file exists but cannot be parsed.
    /// Returns [`GrkError::InvalidConfiguration`] if validation fails.
    pub fn from_path(path: &Path) -> Result<Self, GrkError> {
        if !path.exists() {
            tracing::debug!(
                "Global config not found at {}, using defaults",
                path.display()
            );
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).map_err(|e| {
            GrkError::InvalidGlobalConfig(format!("Failed to read {}: {}", path.display(), e))
        })?;

        let config: Self = serde_yaml::from_str(&content).map_err(|e| {
            GrkError::InvalidGlobalConfig(format!("Failed to parse {}: {}", path.display(), e))
        })?;

        let warnings = config.validate()?;
        for warning in warnings {
            tracing::warn!("Config warning: {}", warning);
        }

        Ok(config)
    }

    /// Get the default global config directory (`~/.grk`).
    pub fn default_dir() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(GRK_HOME_DIR))
    }

    /// Get the default global config file path (`~/.grk/config.yaml`).
    pub fn default_path() -> Option<PathBuf> {
        Self::default_dir().map(|d| d.join(GLOBAL_CONFIG_FILENAME))
    }

    /// Validate every section, collecting warnings.
    ///
    /// Returns the first critical error as [`GrkError::InvalidConfiguration`].
    pub fn validate(&self) -> Result<Vec<String>, GrkError> {
        let mut all_warnings = Vec::new();
        all_warnings.extend(self.chunking.validate()?);
        all_warnings.extend(self.store.validate()?);
        all_warnings.extend(self.retrieval.validate()?);
        all_warnings.extend(self.redaction.validate()?);
        all_warnings.extend(self.response.validate()?);
        all_warnings.extend(self.model.validate().map_err(|message| {
            GrkError::InvalidConfiguration {
                message,
                hint: "Check the `model` section of your config.yaml".to_string(),
            }
        })?);
        Ok(all_warnings)
    }

    /// Merge project overrides and validate the result.
    pub fn resolve(&self, project: &ProjectConfig) -> Result<GrkConfig, GrkError> {
        let merged = GlobalConfig {
            chunking: project.chunking.clone().unwrap_or_else(|| self.chunking.clone()),
            store: project.store.clone().unwrap_or_else(|| self.store.clone()),
            retrieval: project.retrieval.clone().unwrap_or_else(|| self.retrieval.clone()),
            redaction: project.redaction.clone().unwrap_or_else(|| self.redaction.clone()),
            response: project.response.clone().unwrap_or_else(|| self.response.clone()),
            model: project.model.clone().unwrap_or_else(|| self.model.clone()),
        };
        let warnings = merged.validate()?;
        for warning in &warnings {
            tracing::warn!("Config warning: {}", warning);
        }

        Ok(GrkConfig {
            project_name: project.name.clone(),
            chunking: merged.chunking,
            store: merged.store,
            retrieval: merged.retrieval,
            redaction: merged.redaction,
            response: merged.response,
            model: merged.model,
        })
    }
}

// ============================================================================
// ProjectConfig
// ============================================================================

/// Project-level configuration overrides.
///
/// Loaded from `.grounded/config.yaml`. Any section set here replaces the
/// global one.
///
/// ```yaml
/// name: shop-backend
/// retrieval:
///   maxChunks: 8
///   minDiverseFiles: 2
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Display name of the project. Defaults to the directory name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunking: Option<ChunkingConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub store: Option<StoreConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retrieval: Option<RetrievalConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redaction: Option<RedactionConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<ResponseConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<ModelConfig>,
}

impl ProjectConfig {
    /// Load the project configuration from a workspace root.
    pub fn load_from_workspace(workspace_root: &Path) -> Result<Self, GrkError> {
        let path = Self::config_path_for_workspace(workspace_root);
        Self::from_path(&path)
    }

    /// Load the project configuration from a specific path.
    ///
    /// If the file does not exist, returns an empty configuration.
    ///
    /// # Errors
    ///
    /// Returns [`GrkError::InvalidProjectConfig`] if the file exists but cannot be parsed.
    pub fn from_path(path: &Path) -> Result<Self, GrkError> {
        if !path.exists() {
            tracing::debug!(
                "Project config not found at {}, using defaults",
                path.display()
            );
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).map_err(|e| {
            GrkError::InvalidProjectConfig(format!("Failed to read {}: {}", path.display(), e))
        })?;

        // An empty file deserializes to unit, not to a mapping.
        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        serde_yaml::from_str(&content).map_err(|e| {
            GrkError::InvalidProjectConfig(format!("Failed to parse {}: {}", path.display(), e))
        })
    }

    /// Get the config file path for a given workspace root.
    pub fn config_path_for_workspace(workspace_root: &Path) -> PathBuf {
        workspace_root
            .join(GROUNDED_DIR)
            .join(PROJECT_CONFIG_FILENAME)
    }
}

// ============================================================================
// GrkConfig
// ============================================================================

/// Resolved, validated configuration.
///
/// Built once per engine and passed by reference; never mutated afterwards.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GrkConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_name: Option<String>,
    pub chunking: ChunkingConfig,
    pub store: StoreConfig,
    pub retrieval: RetrievalConfig,
    pub redaction: RedactionConfig,
    pub response: ResponseConfig,
    pub model: ModelConfig,
}

impl GrkConfig {
    /// Resolve from an explicit global config file (or the default location)
    /// plus the workspace's project file.
    pub fn load(global_path: Option<&Path>, workspace_root: &Path) -> Result<Self, GrkError> {
        let global = match global_path {
            Some(path) => GlobalConfig::from_path(path)?,
            None => GlobalConfig::load_default()?,
        };
        let project = ProjectConfig::load_from_workspace(workspace_root)?;
        global.resolve(&project)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use grk_model::CompletionProviderKind;
    use tempfile::TempDir;

    #[test]
    fn test_global_config_default_is_valid() {
        let config = GlobalConfig::default();
        assert!(config.validate().unwrap().is_empty());
        assert_eq!(config.chunking.min_lines, 250);
        assert_eq!(config.chunking.max_lines, 400);
        assert_eq!(config.store.retain_scans, 3);
    }

    #[test]
    fn test_global_config_from_partial_yaml() {
        let yaml = r#"
retrieval:
  maxChunks: 8
  boosts:
    keyword: 12
store:
  retainScans: 5
"#;
        let config: GlobalConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.retrieval.max_chunks, 8);
        assert_eq!(config.retrieval.min_diverse_files, 4);
        assert_eq!(config.retrieval.boosts.keyword, 12.0);
        assert_eq!(config.retrieval.boosts.exact_path, 100.0);
        assert_eq!(config.store.retain_scans, 5);
        assert_eq!(config.chunking, ChunkingConfig::default());
    }

    #[test]
    fn test_global_config_missing_file() {
        let temp = TempDir::new().unwrap();
        let config = GlobalConfig::from_path(&temp.path().join("nonexistent.yaml")).unwrap();
        assert_eq!(config.retrieval.max_chunks, 12);
    }

    #[test]
    fn test_global_config_invalid_yaml() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.yaml");
        fs::write(&path, "retrieval: [not, a, map").unwrap();
        let err = GlobalConfig::from_path(&path).unwrap_err();
        assert!(matches!(err, GrkError::InvalidGlobalConfig(_)));
    }

    #[test]
    fn test_global_config_from_path_rejects_invalid_values() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.yaml");
        fs::write(&path, "store:\n  retainScans: 0\n").unwrap();
        let err = GlobalConfig::from_path(&path).unwrap_err();
        assert!(matches!(err, GrkError::InvalidConfiguration { .. }));
    }

    #[test]
    fn test_boost_ordering_is_enforced() {
        let mut retrieval = RetrievalConfig::default();
        retrieval.boosts.keyword = 30.0;
        let err = retrieval.validate().unwrap_err();
        match err {
            GrkError::InvalidConfiguration { message, .. } => {
                assert!(message.contains("pathContains"));
                assert!(message.contains("keyword"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_symbol_used_cannot_outrank_declared() {
        let mut retrieval = RetrievalConfig::default();
        retrieval.boosts.symbol_used = 70.0;
        assert!(retrieval.validate().is_err());
    }

    #[test]
    fn test_multipliers_are_validated() {
        let mut retrieval = RetrievalConfig::default();
        retrieval.complete_file_multiplier = 1.0;
        assert!(retrieval.validate().is_err());

        let mut retrieval = RetrievalConfig::default();
        retrieval.overlong_multiplier = 1.5;
        assert!(retrieval.validate().is_err());
    }

    #[test]
    fn test_per_file_cap() {
        let retrieval = RetrievalConfig::default();
        assert_eq!(retrieval.per_file_cap(), 3);

        let retrieval = RetrievalConfig {
            max_chunks: 10,
            min_diverse_files: 4,
            ..Default::default()
        };
        assert_eq!(retrieval.per_file_cap(), 3);
    }

    #[test]
    fn test_chunking_window_is_validated() {
        let chunking = ChunkingConfig {
            min_lines: 300,
            max_lines: 200,
            ..Default::default()
        };
        assert!(chunking.validate().is_err());

        let chunking = ChunkingConfig {
            break_weights: BreakWeights {
                blank: 1,
                class: 2,
                function: 3,
                closing: 4,
            },
            ..Default::default()
        };
        assert_eq!(chunking.validate().unwrap().len(), 1);
    }

    #[test]
    fn test_response_thresholds_are_validated() {
        let response = ResponseConfig {
            high_threshold: 0.4,
            medium_threshold: 0.5,
            ..Default::default()
        };
        assert!(response.validate().is_err());
    }

    #[test]
    fn test_invalid_redaction_pattern_is_rejected() {
        let redaction = RedactionConfig {
            extra_patterns: vec!["(unclosed".to_string()],
            ..Default::default()
        };
        assert!(redaction.validate().is_err());
    }

    #[test]
    fn test_project_config_missing_and_empty_file() {
        let temp = TempDir::new().unwrap();
        let config = ProjectConfig::load_from_workspace(temp.path()).unwrap();
        assert!(config.retrieval.is_none());

        let path = ProjectConfig::config_path_for_workspace(temp.path());
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "").unwrap();
        let config = ProjectConfig::from_path(&path).unwrap();
        assert!(config.name.is_none());
    }

    #[test]
    fn test_project_config_invalid_yaml() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.yaml");
        fs::write(&path, "retrieval: {maxChunks: [").unwrap();
        assert!(matches!(
            ProjectConfig::from_path(&path),
            Err(GrkError::InvalidProjectConfig(_))
        ));
    }

    #[test]
    fn test_project_section_replaces_global_section() {
        let global: GlobalConfig = serde_yaml::from_str(
            "retrieval:\n  maxChunks: 20\n  minDiverseFiles: 5\nstore:\n  retainScans: 7\n",
        )
        .unwrap();
        let project: ProjectConfig = serde_yaml::from_str(
            "name: shop\nretrieval:\n  maxChunks: 6\nmodel:\n  provider: scripted\n  scriptedReply: ok\n",
        )
        .unwrap();

        let resolved = global.resolve(&project).unwrap();
        assert_eq!(resolved.project_name.as_deref(), Some("shop"));
        assert_eq!(resolved.retrieval.max_chunks, 6);
        // Whole section replaced: minDiverseFiles falls back to its default.
        assert_eq!(resolved.retrieval.min_diverse_files, 4);
        assert_eq!(resolved.store.retain_scans, 7);
        assert_eq!(resolved.model.provider, CompletionProviderKind::Scripted);
    }

    #[test]
    fn test_resolve_rejects_invalid_project_override() {
        let project: ProjectConfig =
            serde_yaml::from_str("retrieval:\n  maxChunks: 0\n").unwrap();
        assert!(matches!(
            GlobalConfig::default().resolve(&project),
            Err(GrkError::InvalidConfiguration { .. })
        ));
    }

    #[test]
    fn test_grk_config_load_with_explicit_global_path() {
        let temp = TempDir::new().unwrap();
        let global_path = temp.path().join("global.yaml");
        fs::write(&global_path, "response:\n  maxSnippets: 5\n").unwrap();

        let config = GrkConfig::load(Some(&global_path), temp.path()).unwrap();
        assert_eq!(config.response.max_snippets, 5);
        assert!(config.project_name.is_none());
    }
}
