//! # grk-model
//!
//! Text-completion layer for GRK.
//!
//! The grounding pipeline only needs one thing from a model: given a system
//! message and a user message, return plain text or fail explicitly. This
//! crate defines that seam ([`CompletionModel`]) and its providers:
//!
//! - **Ollama** (feature `ollama`, default): `POST {baseUrl}/api/chat` with
//!   streaming disabled
//! - **Scripted**: returns a configured reply without any network access,
//!   used for offline runs and tests
//!
//! Failures are returned as [`ModelError`]; nothing here retries.
//!
//! ## Usage
//!
//! ```ignore
//! use grk_model::{create_completion_model, ModelConfig};
//!
//! let model = create_completion_model(&ModelConfig::default())?;
//! let completion = model.complete("You are a code assistant.", "Explain src/lib.rs")?;
//! println!("{}", completion.text);
//! ```

pub mod config;
pub mod error;
mod scripted;

#[cfg(feature = "ollama")]
mod ollama;

pub use config::{CompletionProviderKind, ModelConfig};
pub use error::{ModelError, ModelResult};
pub use scripted::ScriptedCompletionModel;

#[cfg(feature = "ollama")]
pub use ollama::OllamaCompletionModel;

/// Default completion model for the Ollama provider.
pub const DEFAULT_COMPLETION_MODEL_ID: &str = "qwen2.5-coder:7b";

/// Default Ollama endpoint.
pub const DEFAULT_OLLAMA_BASE_URL: &str = "http://localhost:11434";

// ============================================================================
// Completion
// ============================================================================

/// Text returned by a provider plus whatever usage it reported.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Completion {
    /// Raw model output.
    pub text: String,
    /// Model that produced the text.
    pub model_id: String,
    /// Prompt tokens, when the provider reports them.
    pub prompt_tokens: Option<u64>,
    /// Completion tokens, when the provider reports them.
    pub completion_tokens: Option<u64>,
}

// ============================================================================
// CompletionModel Trait
// ============================================================================

/// A text-completion service.
///
/// Implementations must be `Send + Sync` so one instance can serve concurrent
/// requests.
pub trait CompletionModel: Send + Sync + std::fmt::Debug {
    /// Complete a `(system, user)` message pair.
    fn complete(&self, system: &str, user: &str) -> ModelResult<Completion>;

    /// Get the model ID.
    fn model_id(&self) -> &str;

    /// Provider name, for logs and error messages.
    fn provider(&self) -> CompletionProviderKind;
}

// ============================================================================
// Factory Functions
// ============================================================================

/// Create a completion model from configuration.
///
/// # Errors
///
/// Returns `ModelError::ProviderNotAvailable` when the provider is not
/// compiled in, or `ModelError::InvalidConfig` for unusable settings.
pub fn create_completion_model(config: &ModelConfig) -> ModelResult<Box<dyn CompletionModel>> {
    config
        .validate()
        .map_err(|message| ModelError::InvalidConfig { message })?;

    match config.provider {
        CompletionProviderKind::Scripted => {
            let reply = config.scripted_reply.clone().unwrap_or_default();
            Ok(Box::new(ScriptedCompletionModel::new(reply)))
        }
        CompletionProviderKind::Ollama => create_ollama(config),
    }
}

#[cfg(feature = "ollama")]
fn create_ollama(config: &ModelConfig) -> ModelResult<Box<dyn CompletionModel>> {
    Ok(Box::new(OllamaCompletionModel::new(config)?))
}

#[cfg(not(feature = "ollama"))]
fn create_ollama(_config: &ModelConfig) -> ModelResult<Box<dyn CompletionModel>> {
    Err(ModelError::ProviderNotAvailable {
        provider: "ollama".to_string(),
        reason: "This build was compiled without the 'ollama' feature.".to_string(),
    })
}
