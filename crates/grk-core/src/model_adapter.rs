//! Adapter layer for grk-model infrastructure.
//!
//! Provider failures surface as [`GrkError::ModelProvider`]; nothing here
//! retries. Retry policy belongs to whoever calls the engine.

use grk_model::ModelError;

use crate::errors::GrkError;

/// Convert a grk-model error to a grk-core error.
pub fn from_model_error(err: ModelError) -> GrkError {
    match err {
        ModelError::ProviderNotAvailable { provider, reason } => {
            GrkError::ModelUnavailable { provider, reason }
        }
        ModelError::InvalidConfig { message } => GrkError::InvalidConfiguration {
            message,
            hint: "Check the `model` section of your config.yaml".to_string(),
        },
        ModelError::Timeout {
            provider,
            timeout_secs,
        } => GrkError::ModelProvider {
            provider,
            message: format!("timed out after {}s", timeout_secs),
        },
        ModelError::RequestFailed { provider, message } => {
            GrkError::ModelProvider { provider, message }
        }
        ModelError::BadStatus {
            provider,
            status,
            body,
        } => GrkError::ModelProvider {
            provider,
            message: format!("HTTP {}: {}", status, body),
        },
        ModelError::InvalidResponse { provider, message } => GrkError::ModelProvider {
            provider,
            message: format!("invalid response: {}", message),
        },
        ModelError::Json(json_err) => GrkError::Json(json_err),
    }
}

impl From<ModelError> for GrkError {
    fn from(err: ModelError) -> Self {
        from_model_error(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_maps_to_provider_error() {
        let err = from_model_error(ModelError::Timeout {
            provider: "ollama".to_string(),
            timeout_secs: 30,
        });
        match err {
            GrkError::ModelProvider { provider, message } => {
                assert_eq!(provider, "ollama");
                assert!(message.contains("30s"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_not_available_maps_to_unavailable() {
        let err = from_model_error(ModelError::ProviderNotAvailable {
            provider: "ollama".to_string(),
            reason: "feature disabled".to_string(),
        });
        assert!(matches!(err, GrkError::ModelUnavailable { .. }));
    }
}
