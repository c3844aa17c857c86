//! Language model providers for tool-calling completions
//!
//! This crate provides the [`LanguageModel`] trait used by the agent loop,
//! the external discovery source and suggestion generation, together with
//! an Anthropic Messages API provider and a scripted provider.

#![deny(warnings)]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info};
use wayfinder_core::config::LlmConfig;

mod anthropic;
pub mod error;
mod prompt;
mod scripted;
mod types;

pub use anthropic::AnthropicModel;
pub use error::{LlmError, Result};
pub use prompt::format_prompt;
pub use scripted::ScriptedModel;
pub use types::{
    CompletionRequest, CompletionResponse, ContentBlock, Message, Role, StopReason, TokenUsage,
    ToolCall, ToolDefinition,
};

/// Trait for language model providers
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Model identifier, for logging
    fn name(&self) -> &str;

    /// Run one completion
    ///
    /// Transport-level retries are the provider's concern; callers see a
    /// single success or failure per call.
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse>;
}

/// Create a language model provider based on configuration
///
/// # Arguments
/// * `config` - LLM configuration including provider type
pub fn create_language_model(config: &LlmConfig) -> Result<Arc<dyn LanguageModel>> {
    match config.provider.as_str() {
        "anthropic" => {
            let api_key = config.resolve_api_key().ok_or_else(|| {
                LlmError::Config(
                    "Anthropic API key required. Set llm.api_key or ANTHROPIC_API_KEY env var"
                        .to_string(),
                )
            })?;
            info!("Creating Anthropic language model provider");
            Ok(Arc::new(AnthropicModel::new(api_key, config)?))
        }
        "scripted" => {
            info!("Creating scripted language model provider (offline mode)");
            Ok(Arc::new(ScriptedModel::offline()))
        }
        other => Err(LlmError::Config(format!(
            "Unknown llm provider: '{other}'. Valid providers: anthropic, scripted"
        ))),
    }
}

/// Single-turn text completion without tools
///
/// Returns the trimmed text, or an error when the model produced none.
pub async fn complete_text(
    model: &dyn LanguageModel,
    system_prompt: &str,
    user: &str,
    max_tokens: u32,
) -> Result<String> {
    let request = CompletionRequest::single(system_prompt, user, max_tokens);
    let response = model.complete(request).await?;
    let text = response
        .text
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .ok_or_else(|| LlmError::InvalidResponse("model returned no text".to_string()))?;
    debug!(model = model.name(), chars = text.len(), "Text completion received");
    Ok(text)
}
