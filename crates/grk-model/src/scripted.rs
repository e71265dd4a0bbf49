//! Scripted provider: fixed replies, no network.

use std::collections::VecDeque;
use std::sync::Mutex;

use tracing::debug;

use crate::config::CompletionProviderKind;
use crate::error::{ModelError, ModelResult};
use crate::{Completion, CompletionModel};

const SCRIPTED_MODEL_ID: &str = "scripted";

/// Completion model that answers from a script.
///
/// Queued replies are returned first, in order; after that every call returns
/// the default reply. A model built with [`ScriptedCompletionModel::failing`]
/// fails every call.
#[derive(Debug)]
pub struct ScriptedCompletionModel {
    default_reply: String,
    queued: Mutex<VecDeque<String>>,
    failure: Option<String>,
    last_prompt: Mutex<Option<(String, String)>>,
}

impl ScriptedCompletionModel {
    pub fn new(reply: impl Into<String>) -> Self {
        Self {
            default_reply: reply.into(),
            queued: Mutex::new(VecDeque::new()),
            failure: None,
            last_prompt: Mutex::new(None),
        }
    }

    /// A model whose every call fails with `message`.
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            failure: Some(message.into()),
            ..Self::new(String::new())
        }
    }

    /// Queue a reply ahead of the default one.
    pub fn push_reply(&self, reply: impl Into<String>) {
        self.queued
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push_back(reply.into());
    }

    /// The last `(system, user)` pair this model was called with.
    pub fn last_prompt(&self) -> Option<(String, String)> {
        self.last_prompt
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
    }
}

impl CompletionModel for ScriptedCompletionModel {
    fn complete(&self, system: &str, user: &str) -> ModelResult<Completion> {
        *self.last_prompt.lock().unwrap_or_else(|p| p.into_inner()) =
            Some((system.to_string(), user.to_string()));

        if let Some(message) = &self.failure {
            return Err(ModelError::request_failed(SCRIPTED_MODEL_ID, message.clone()));
        }

        let text = self
            .queued
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .pop_front()
            .unwrap_or_else(|| self.default_reply.clone());
        debug!("Scripted completion ({} chars)", text.len());

        Ok(Completion {
            text,
            model_id: SCRIPTED_MODEL_ID.to_string(),
            prompt_tokens: None,
            completion_tokens: None,
        })
    }

    fn model_id(&self) -> &str {
        SCRIPTED_MODEL_ID
    }

    fn provider(&self) -> CompletionProviderKind {
        CompletionProviderKind::Scripted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queued_replies_then_default() {
        let model = ScriptedCompletionModel::new("default");
        model.push_reply("first");
        assert_eq!(model.complete("s", "u").unwrap().text, "first");
        assert_eq!(model.complete("s", "u").unwrap().text, "default");
    }

    #[test]
    fn test_failing_model_records_prompt() {
        let model = ScriptedCompletionModel::failing("boom");
        let err = model.complete("system", "user").unwrap_err();
        assert!(err.to_string().contains("boom"));
        assert_eq!(
            model.last_prompt(),
            Some(("system".to_string(), "user".to_string()))
        );
    }
}
