//! Error types for grk-model.
//!
//! Provider failures are surfaced as-is; no retry happens in this crate.

use thiserror::Error;

/// Result type alias for grk-model operations.
pub type ModelResult<T> = Result<T, ModelError>;

/// Errors that can occur in grk-model operations.
#[derive(Debug, Error)]
pub enum ModelError {
    // ========================================================================
    // Provider errors
    // ========================================================================
    /// Provider not compiled in or not usable.
    #[error("Provider '{provider}' not available: {reason}")]
    ProviderNotAvailable { provider: String, reason: String },

    /// Invalid provider configuration.
    #[error("Invalid model configuration: {message}")]
    InvalidConfig { message: String },

    // ========================================================================
    // Request errors
    // ========================================================================
    /// The request did not complete within the configured timeout.
    #[error("Provider '{provider}' timed out after {timeout_secs}s")]
    Timeout { provider: String, timeout_secs: u64 },

    /// Transport-level failure (connection refused, DNS, TLS, ...).
    #[error("Request to provider '{provider}' failed: {message}")]
    RequestFailed { provider: String, message: String },

    /// The provider answered with a non-success status.
    #[error("Provider '{provider}' returned HTTP {status}: {body}")]
    BadStatus {
        provider: String,
        status: u16,
        body: String,
    },

    /// The provider answered with something that is not a completion.
    #[error("Invalid response from provider '{provider}': {message}")]
    InvalidResponse { provider: String, message: String },

    // ========================================================================
    // General errors
    // ========================================================================
    /// JSON error wrapper.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ModelError {
    /// Create a request failure.
    pub fn request_failed(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::RequestFailed {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Create an invalid response error.
    pub fn invalid_response(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidResponse {
            provider: provider.into(),
            message: message.into(),
        }
    }
}
