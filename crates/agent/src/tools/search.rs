use super::{definition_for, parse_input, Tool, ToolContext, ToolOutput};
use crate::error::ToolError;
use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::json;
use wayfinder_discovery::SearchRequest;
use wayfinder_llm::ToolDefinition;

const NAME: &str = "search_cities";

#[derive(Debug, Deserialize, JsonSchema)]
pub struct SearchCitiesInput {
    /// What the traveller is looking for, in their words
    #[schemars(description = "Free-text description of the places wanted, e.g. \"quiet beach towns\"")]
    pub query: String,

    /// Force a search style instead of inferring it from the query
    #[schemars(
        description = "Optional intent: hidden_gems, coastal, foodie, nature, culture, nightlife, family, romantic, budget"
    )]
    #[serde(default)]
    pub intent: Option<String>,

    /// Region or country to stay within
    #[serde(default)]
    pub region: Option<String>,

    /// Only return places within a short drive of this city
    #[serde(default)]
    pub near_city: Option<String>,

    /// Number of results (default 5)
    #[serde(default)]
    pub max_results: Option<usize>,
}

/// Multi-source city search; cities already on the route are excluded
pub struct SearchCitiesTool;

#[async_trait]
impl Tool for SearchCitiesTool {
    fn definition(&self) -> ToolDefinition {
        definition_for::<SearchCitiesInput>(
            NAME,
            "Search for towns and cities to visit. Returns ranked places with reasons. \
             Places already on the route are left out.",
        )
    }

    async fn execute(
        &self,
        input: serde_json::Value,
        ctx: &ToolContext,
    ) -> Result<ToolOutput, ToolError> {
        let input: SearchCitiesInput = parse_input(NAME, input)?;
        let exclude_cities = ctx.route.lock().await.names();

        let request = SearchRequest {
            query: input.query,
            intent: input.intent,
            region: input.region,
            near_city: input.near_city,
            exclude_cities,
            max_results: input.max_results,
        };
        let response = ctx
            .discovery
            .search(&request)
            .await
            .map_err(|e| ToolError::execution_failed(NAME, e.to_string()))?;

        let cities: Vec<serde_json::Value> = response
            .cities
            .iter()
            .map(|r| {
                json!({
                    "name": r.city.name,
                    "country": r.city.country,
                    "region": r.city.region,
                    "rating": r.city.rating,
                    "description": r.city.description,
                    "highlights": r.city.highlights,
                    "score": (r.fused_score * 100.0).round() / 100.0,
                    "reasons": r.reasons,
                })
            })
            .collect();

        Ok(ToolOutput::new(json!({
            "intent": response.intent.name,
            "strategy": response.strategy,
            "narrative": response.narrative,
            "confidence": response.confidence,
            "cached": response.cached,
            "cities": cities,
        })))
    }
}
