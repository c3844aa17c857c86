//! Scripted language model for tests and offline runs

use crate::error::{LlmError, Result};
use crate::types::{CompletionRequest, CompletionResponse, ToolCall};
use crate::LanguageModel;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

enum Step {
    Respond(CompletionResponse),
    Fail(String),
}

/// Replays queued responses in order and records every request it receives
///
/// When the queue is empty the `repeat` response is returned if one was set,
/// otherwise the call fails with [`LlmError::Unavailable`].
#[derive(Default)]
pub struct ScriptedModel {
    steps: Mutex<VecDeque<Step>>,
    repeat: Option<CompletionResponse>,
    fail_with: Option<String>,
    latency: Option<Duration>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// A model that answers every call with the same response
    pub fn repeating(response: CompletionResponse) -> Self {
        Self {
            repeat: Some(response),
            ..Self::default()
        }
    }

    /// A model whose every call fails
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            fail_with: Some(message.into()),
            ..Self::default()
        }
    }

    /// Answer used by the `scripted` provider when no API is configured
    pub fn offline() -> Self {
        Self::repeating(CompletionResponse::text(
            "I'm running without a language model right now, so I can only show \
             results from the built-in city guide.",
        ))
    }

    /// Delay every response, to exercise timeouts
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn push_response(&self, response: CompletionResponse) -> &Self {
        self.lock_steps().push_back(Step::Respond(response));
        self
    }

    pub fn push_text(&self, text: impl Into<String>) -> &Self {
        self.push_response(CompletionResponse::text(text))
    }

    pub fn push_tool_call(
        &self,
        id: impl Into<String>,
        name: impl Into<String>,
        input: serde_json::Value,
    ) -> &Self {
        self.push_response(CompletionResponse::tool_calls(vec![ToolCall {
            id: id.into(),
            name: name.into(),
            input,
        }]))
    }

    pub fn push_error(&self, message: impl Into<String>) -> &Self {
        self.lock_steps().push_back(Step::Fail(message.into()));
        self
    }

    /// Number of completed or failed calls so far
    pub fn call_count(&self) -> usize {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Copies of every request received, in order
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn lock_steps(&self) -> std::sync::MutexGuard<'_, VecDeque<Step>> {
        self.steps.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request);

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        let step = self.lock_steps().pop_front();
        match step {
            Some(Step::Respond(response)) => Ok(response),
            Some(Step::Fail(message)) => Err(LlmError::Unavailable(message)),
            None => match (&self.repeat, &self.fail_with) {
                (_, Some(message)) => Err(LlmError::Unavailable(message.clone())),
                (Some(response), None) => Ok(response.clone()),
                (None, None) => Err(LlmError::Unavailable("script exhausted".to_string())),
            },
        }
    }
}
