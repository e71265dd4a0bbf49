//! Configuration types for grk-model.

use serde::{Deserialize, Serialize};

use crate::{DEFAULT_COMPLETION_MODEL_ID, DEFAULT_OLLAMA_BASE_URL};

// ============================================================================
// CompletionProviderKind
// ============================================================================

/// Completion provider type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CompletionProviderKind {
    /// Ollama-compatible `/api/chat` endpoint.
    #[default]
    Ollama,
    /// Fixed reply from configuration; no network.
    Scripted,
}

impl std::fmt::Display for CompletionProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ollama => write!(f, "ollama"),
            Self::Scripted => write!(f, "scripted"),
        }
    }
}

impl std::str::FromStr for CompletionProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ollama" => Ok(Self::Ollama),
            "scripted" | "static" => Ok(Self::Scripted),
            _ => Err(format!(
                "Unknown provider: '{}'. Use 'ollama' or 'scripted'.",
                s
            )),
        }
    }
}

// ============================================================================
// ModelConfig
// ============================================================================

/// Configuration for the completion model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelConfig {
    /// Provider type.
    #[serde(default)]
    pub provider: CompletionProviderKind,

    /// Model ID understood by the provider (e.g., "qwen2.5-coder:7b").
    #[serde(default = "default_model_id")]
    pub model_id: String,

    /// Base URL of the provider.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Reply returned by the scripted provider.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scripted_reply: Option<String>,
}

fn default_model_id() -> String {
    DEFAULT_COMPLETION_MODEL_ID.to_string()
}

fn default_base_url() -> String {
    DEFAULT_OLLAMA_BASE_URL.to_string()
}

fn default_timeout_secs() -> u64 {
    120
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            provider: CompletionProviderKind::default(),
            model_id: default_model_id(),
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
            scripted_reply: None,
        }
    }
}

impl ModelConfig {
    /// Scripted configuration that always answers `reply`.
    pub fn scripted(reply: impl Into<String>) -> Self {
        Self {
            provider: CompletionProviderKind::Scripted,
            scripted_reply: Some(reply.into()),
            ..Default::default()
        }
    }

    /// Validate and return warnings for questionable values.
    pub fn validate(&self) -> Result<Vec<String>, String> {
        let mut warnings = Vec::new();

        if self.model_id.trim().is_empty() {
            return Err("model.modelId must not be empty".to_string());
        }
        if self.timeout_secs == 0 {
            return Err("model.timeoutSecs must be greater than 0".to_string());
        }
        if self.provider == CompletionProviderKind::Ollama
            && !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://"))
        {
            return Err(format!(
                "model.baseUrl must start with http:// or https:// (got '{}')",
                self.base_url
            ));
        }
        if self.provider == CompletionProviderKind::Scripted && self.scripted_reply.is_none() {
            warnings.push("model.provider is 'scripted' but model.scriptedReply is not set".to_string());
        }
        if self.timeout_secs > 600 {
            warnings.push(format!(
                "model.timeoutSecs ({}) is very high; requests may appear to hang",
                self.timeout_secs
            ));
        }

        Ok(warnings)
    }
}
