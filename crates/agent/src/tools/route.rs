use super::{definition_for, parse_input, Tool, ToolContext, ToolOutput};
use crate::error::ToolError;
use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::json;
use tracing::info;
use wayfinder_core::{RouteAction, RouteState, Waypoint};
use wayfinder_llm::ToolDefinition;

/// Compact route view returned by every route tool
fn route_summary(route: &RouteState) -> serde_json::Value {
    let legs: Vec<serde_json::Value> = route
        .legs()
        .iter()
        .map(|leg| {
            json!({
                "from": leg.from,
                "to": leg.to,
                "distance_km": leg.distance_km.round(),
            })
        })
        .collect();
    json!({
        "stops": route.waypoints.iter().map(|w| json!({
            "city": w.city,
            "country": w.country,
            "nights": w.nights,
        })).collect::<Vec<_>>(),
        "legs": legs,
        "total_distance_km": route.total_distance_km().round(),
        "total_nights": route.total_nights(),
    })
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct AddCityInput {
    /// City or town to add
    pub city: String,

    /// Country, used when the place is not in the city guide
    #[serde(default)]
    pub country: Option<String>,

    /// Zero-based position; appended when omitted
    #[serde(default)]
    pub position: Option<usize>,

    /// Nights to stay (default 1)
    #[serde(default)]
    pub nights: Option<u32>,
}

pub struct AddCityTool;

#[async_trait]
impl Tool for AddCityTool {
    fn definition(&self) -> ToolDefinition {
        definition_for::<AddCityInput>(
            "add_city",
            "Add a city to the user's route, optionally at a position. Only call this when the user asked for it.",
        )
    }

    async fn execute(
        &self,
        input: serde_json::Value,
        ctx: &ToolContext,
    ) -> Result<ToolOutput, ToolError> {
        let input: AddCityInput = parse_input("add_city", input)?;
        let name = input.city.trim();
        if name.is_empty() {
            return Err(ToolError::invalid_input("add_city", "city must not be empty"));
        }

        let mut waypoint = match ctx.discovery.dataset().find(name) {
            Some(city) => Waypoint::from_city(city),
            None => Waypoint::new(name, input.country.clone().unwrap_or_default()),
        };
        if let Some(nights) = input.nights {
            waypoint = waypoint.with_nights(nights.max(1));
        }
        let city = waypoint.city.clone();

        let mut route = ctx.route.lock().await;
        let mut next = route.clone();
        let position = next
            .add(waypoint, input.position)
            .map_err(|e| ToolError::execution_failed("add_city", e.to_string()))?;
        let action = RouteAction::Added {
            city: city.clone(),
            position,
        };
        ctx.commit_route(&next, action.clone())
            .await
            .map_err(|e| ToolError::execution_failed("add_city", e.to_string()))?;
        *route = next;
        info!(session = %ctx.session_id, city = %city, position, "Added city to route");

        Ok(ToolOutput::new(json!({
            "added": city,
            "position": position,
            "route": route_summary(&route),
        }))
        .with_route_action(action))
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct RemoveCityInput {
    /// City to remove (case-insensitive)
    pub city: String,
}

pub struct RemoveCityTool;

#[async_trait]
impl Tool for RemoveCityTool {
    fn definition(&self) -> ToolDefinition {
        definition_for::<RemoveCityInput>("remove_city", "Remove a city from the user's route.")
    }

    async fn execute(
        &self,
        input: serde_json::Value,
        ctx: &ToolContext,
    ) -> Result<ToolOutput, ToolError> {
        let input: RemoveCityInput = parse_input("remove_city", input)?;

        let mut route = ctx.route.lock().await;
        let mut next = route.clone();
        let removed = next
            .remove(&input.city)
            .map_err(|e| ToolError::execution_failed("remove_city", e.to_string()))?;
        let action = RouteAction::Removed {
            city: removed.city.clone(),
        };
        ctx.commit_route(&next, action.clone())
            .await
            .map_err(|e| ToolError::execution_failed("remove_city", e.to_string()))?;
        *route = next;
        info!(session = %ctx.session_id, city = %removed.city, "Removed city from route");

        Ok(ToolOutput::new(json!({
            "removed": removed.city,
            "route": route_summary(&route),
        }))
        .with_route_action(action))
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ReorderRouteInput {
    /// Every city on the route, in the new order
    pub order: Vec<String>,
}

pub struct ReorderRouteTool;

#[async_trait]
impl Tool for ReorderRouteTool {
    fn definition(&self) -> ToolDefinition {
        definition_for::<ReorderRouteInput>(
            "reorder_route",
            "Reorder the route. `order` must list every current stop exactly once.",
        )
    }

    async fn execute(
        &self,
        input: serde_json::Value,
        ctx: &ToolContext,
    ) -> Result<ToolOutput, ToolError> {
        let input: ReorderRouteInput = parse_input("reorder_route", input)?;

        let mut route = ctx.route.lock().await;
        let mut next = route.clone();
        next.reorder(&input.order)
            .map_err(|e| ToolError::execution_failed("reorder_route", e.to_string()))?;
        let action = RouteAction::Reordered {
            order: next.names(),
        };
        ctx.commit_route(&next, action.clone())
            .await
            .map_err(|e| ToolError::execution_failed("reorder_route", e.to_string()))?;
        *route = next;

        Ok(ToolOutput::new(json!({ "route": route_summary(&route) })).with_route_action(action))
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct GetRouteInput {}

pub struct GetRouteTool;

#[async_trait]
impl Tool for GetRouteTool {
    fn definition(&self) -> ToolDefinition {
        definition_for::<GetRouteInput>(
            "get_route",
            "Show the current route with legs, total driving distance and nights.",
        )
    }

    async fn execute(
        &self,
        input: serde_json::Value,
        ctx: &ToolContext,
    ) -> Result<ToolOutput, ToolError> {
        let _: GetRouteInput = parse_input("get_route", input)?;
        let route = ctx.route.lock().await;
        let longest = route.longest_leg().map(|leg| {
            json!({
                "from": leg.from,
                "to": leg.to,
                "distance_km": leg.distance_km.round(),
            })
        });
        let mut summary = route_summary(&route);
        summary["longest_leg"] = longest.unwrap_or(serde_json::Value::Null);
        Ok(ToolOutput::new(summary))
    }
}
