use super::{definition_for, parse_input, Tool, ToolContext, ToolOutput};
use crate::error::ToolError;
use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::json;
use wayfinder_core::{normalize_name, Preference};
use wayfinder_llm::ToolDefinition;

const NAME: &str = "record_preference";

#[derive(Debug, Deserialize, JsonSchema)]
pub struct RecordPreferenceInput {
    /// Short preference name, e.g. "pace", "budget", "avoid"
    pub key: String,
    /// What the user prefers, e.g. "slow", "mid-range", "big cities"
    pub value: String,
}

/// Remember something the user said about how they like to travel
pub struct RecordPreferenceTool;

#[async_trait]
impl Tool for RecordPreferenceTool {
    fn definition(&self) -> ToolDefinition {
        definition_for::<RecordPreferenceInput>(
            NAME,
            "Remember a travel preference the user stated (pace, budget, interests, things to avoid).",
        )
    }

    async fn execute(
        &self,
        input: serde_json::Value,
        ctx: &ToolContext,
    ) -> Result<ToolOutput, ToolError> {
        let input: RecordPreferenceInput = parse_input(NAME, input)?;
        let key = normalize_name(&input.key).replace(' ', "_");
        let value = input.value.trim().to_string();
        if key.is_empty() || value.is_empty() {
            return Err(ToolError::invalid_input(NAME, "key and value must not be empty"));
        }

        let preference = Preference {
            key: key.clone(),
            value: value.clone(),
            recorded_at_ms: ctx.clock.now_ms(),
        };
        ctx.store
            .record_preference(&ctx.session_id, preference)
            .await
            .map_err(|e| ToolError::execution_failed(NAME, e.to_string()))?;

        Ok(ToolOutput::new(json!({ "recorded": { "key": key, "value": value } })))
    }
}
