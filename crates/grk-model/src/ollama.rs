//! Ollama-compatible chat backend.

use std::time::{Duration, Instant};

use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::{CompletionProviderKind, ModelConfig};
use crate::error::{ModelError, ModelResult};
use crate::{Completion, CompletionModel};

const PROVIDER: &str = "ollama";

/// Maximum characters of an error body carried into [`ModelError::BadStatus`].
const ERROR_BODY_LIMIT: usize = 500;

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    stream: bool,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    message: Option<ResponseMessage>,
    #[serde(default)]
    prompt_eval_count: Option<u64>,
    #[serde(default)]
    eval_count: Option<u64>,
}

#[derive(Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: String,
}

/// Completion model backed by an Ollama server.
#[derive(Debug)]
pub struct OllamaCompletionModel {
    client: Client,
    endpoint: String,
    model_id: String,
    timeout_secs: u64,
}

impl OllamaCompletionModel {
    pub fn new(config: &ModelConfig) -> ModelResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ModelError::ProviderNotAvailable {
                provider: PROVIDER.to_string(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            client,
            endpoint: format!("{}/api/chat", config.base_url.trim_end_matches('/')),
            model_id: config.model_id.clone(),
            timeout_secs: config.timeout_secs,
        })
    }
}

impl CompletionModel for OllamaCompletionModel {
    fn complete(&self, system: &str, user: &str) -> ModelResult<Completion> {
        let request = ChatRequest {
            model: &self.model_id,
            messages: [
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
            stream: false,
        };

        debug!("POST {} (model {})", self.endpoint, self.model_id);
        let start = Instant::now();
        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .map_err(|e| {
                if e.is_timeout() {
                    ModelError::Timeout {
                        provider: PROVIDER.to_string(),
                        timeout_secs: self.timeout_secs,
                    }
                } else {
                    ModelError::request_failed(PROVIDER, e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body: String = response
                .text()
                .unwrap_or_default()
                .chars()
                .take(ERROR_BODY_LIMIT)
                .collect();
            return Err(ModelError::BadStatus {
                provider: PROVIDER.to_string(),
                status: status.as_u16(),
                body,
            });
        }

        let body: ChatResponse = response
            .json()
            .map_err(|e| ModelError::invalid_response(PROVIDER, e.to_string()))?;
        let text = body
            .message
            .map(|m| m.content)
            .ok_or_else(|| ModelError::invalid_response(PROVIDER, "missing 'message' field"))?;

        info!(
            "Completion from {} in {:.1}s ({} chars)",
            self.model_id,
            start.elapsed().as_secs_f64(),
            text.len()
        );
        Ok(Completion {
            text,
            model_id: self.model_id.clone(),
            prompt_tokens: body.prompt_eval_count,
            completion_tokens: body.eval_count,
        })
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn provider(&self) -> CompletionProviderKind {
        CompletionProviderKind::Ollama
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_normalizes_trailing_slash() {
        let config = ModelConfig {
            base_url: "http://localhost:11434/".to_string(),
            ..Default::default()
        };
        let model = OllamaCompletionModel::new(&config).unwrap();
        assert_eq!(model.endpoint, "http://localhost:11434/api/chat");
    }

    #[test]
    fn test_unreachable_server_is_an_explicit_error() {
        let config = ModelConfig {
            base_url: "http://127.0.0.1:9".to_string(),
            timeout_secs: 2,
            ..Default::default()
        };
        let model = OllamaCompletionModel::new(&config).unwrap();
        let err = model.complete("s", "u").unwrap_err();
        assert!(matches!(
            err,
            ModelError::RequestFailed { .. } | ModelError::Timeout { .. }
        ));
    }

    #[test]
    fn test_response_parsing() {
        let json = r#"{"message":{"role":"assistant","content":"hi"},"prompt_eval_count":12,"eval_count":3,"done":true}"#;
        let parsed: ChatResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.message.unwrap().content, "hi");
        assert_eq!(parsed.prompt_eval_count, Some(12));
    }
}
