//! Anthropic Messages API provider

use crate::error::{LlmError, Result};
use crate::types::{
    CompletionRequest, CompletionResponse, ContentBlock, Message, StopReason, TokenUsage, ToolCall,
};
use crate::LanguageModel;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info, warn};
use wayfinder_core::config::LlmConfig;

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Initial backoff delay for retries
const INITIAL_BACKOFF_MS: u64 = 500;

/// Longest Retry-After we are willing to honour inside one request
const MAX_RETRY_AFTER_SECS: u64 = 10;

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicContentBlock>,
    stop_reason: Option<String>,
    #[serde(default)]
    usage: AnthropicUsage,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum AnthropicContentBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },
    #[serde(other)]
    Unsupported,
}

#[derive(Debug, Default, Deserialize)]
struct AnthropicUsage {
    #[serde(default)]
    input_tokens: u64,
    #[serde(default)]
    output_tokens: u64,
}

/// Anthropic Claude client over plain HTTP
pub struct AnthropicModel {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
    max_tokens: u32,
    max_retries: u32,
}

impl AnthropicModel {
    /// Create a new provider
    ///
    /// # Arguments
    /// * `api_key` - Anthropic API key
    /// * `config` - model, base URL, token cap, timeout and retry settings
    pub fn new(api_key: String, config: &LlmConfig) -> Result<Self> {
        info!("Initializing Anthropic language model");
        info!("  Model: {}", config.model);
        info!("  Timeout: {}s", config.timeout_secs);

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| LlmError::Config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_key,
            model: config.model.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            max_tokens: config.max_tokens,
            max_retries: config.max_retries,
        })
    }

    fn build_request_body(&self, request: &CompletionRequest) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": self.model,
            "max_tokens": request.max_tokens.min(self.max_tokens).max(1),
            "messages": convert_messages(&request.messages),
        });

        if !request.system_prompt.is_empty() {
            body["system"] = serde_json::json!(request.system_prompt);
        }

        if !request.tools.is_empty() {
            body["tools"] = serde_json::json!(request
                .tools
                .iter()
                .map(|t| t.to_anthropic_schema())
                .collect::<Vec<_>>());
        }

        body
    }

    async fn send_once(&self, url: &str, body: &serde_json::Value) -> Result<CompletionResponse> {
        let response = self
            .client
            .post(url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(body)
            .send()
            .await?;

        let status = response.status().as_u16();

        if status == 429 {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(1);
            return Err(LlmError::RateLimited {
                retry_after: Duration::from_secs(retry_after),
            });
        }

        if !response.status().is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(LlmError::Api { status, message });
        }

        let api_response: AnthropicResponse = response.json().await?;
        Ok(parse_response(api_response))
    }
}

#[async_trait]
impl LanguageModel for AnthropicModel {
    fn name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        let url = format!("{}/v1/messages", self.base_url);
        let body = self.build_request_body(&request);
        debug!(
            model = %self.model,
            messages = request.messages.len(),
            tools = request.tools.len(),
            "Sending completion request"
        );

        let mut attempt = 0;
        loop {
            match self.send_once(&url, &body).await {
                Ok(response) => {
                    debug!(
                        stop_reason = response.stop_reason.as_str(),
                        tool_calls = response.tool_calls.len(),
                        input_tokens = response.usage.input_tokens,
                        output_tokens = response.usage.output_tokens,
                        "Completion received"
                    );
                    return Ok(response);
                }
                Err(e) if e.is_retryable() && attempt < self.max_retries => {
                    let backoff = match &e {
                        LlmError::RateLimited { retry_after } => {
                            (*retry_after).min(Duration::from_secs(MAX_RETRY_AFTER_SECS))
                        }
                        _ => Duration::from_millis(INITIAL_BACKOFF_MS * 2u64.pow(attempt)),
                    };
                    attempt += 1;
                    warn!(
                        attempt,
                        backoff_ms = backoff.as_millis() as u64,
                        "Retrying completion after transient error: {e}"
                    );
                    tokio::time::sleep(backoff).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

fn convert_messages(messages: &[Message]) -> Vec<serde_json::Value> {
    messages
        .iter()
        .map(|msg| {
            let content: Vec<serde_json::Value> = msg.content.iter().map(convert_block).collect();
            serde_json::json!({
                "role": msg.role,
                "content": content,
            })
        })
        .collect()
}

fn convert_block(block: &ContentBlock) -> serde_json::Value {
    match block {
        ContentBlock::Text { text } => serde_json::json!({ "type": "text", "text": text }),
        ContentBlock::ToolUse { id, name, input } => serde_json::json!({
            "type": "tool_use",
            "id": id,
            "name": name,
            "input": input,
        }),
        ContentBlock::ToolResult {
            tool_use_id,
            content,
            is_error,
        } => serde_json::json!({
            "type": "tool_result",
            "tool_use_id": tool_use_id,
            "content": content,
            "is_error": is_error,
        }),
    }
}

fn parse_response(api_response: AnthropicResponse) -> CompletionResponse {
    let mut texts = Vec::new();
    let mut tool_calls = Vec::new();

    for block in api_response.content {
        match block {
            AnthropicContentBlock::Text { text } => texts.push(text),
            AnthropicContentBlock::ToolUse { id, name, input } => {
                tool_calls.push(ToolCall { id, name, input })
            }
            AnthropicContentBlock::Unsupported => {}
        }
    }

    let text = if texts.is_empty() {
        None
    } else {
        Some(texts.join("\n"))
    };

    CompletionResponse {
        text,
        tool_calls,
        stop_reason: api_response
            .stop_reason
            .as_deref()
            .map(StopReason::from_anthropic)
            .unwrap_or(StopReason::Other("missing".to_string())),
        usage: TokenUsage {
            input_tokens: api_response.usage.input_tokens,
            output_tokens: api_response.usage.output_tokens,
        },
    }
}
