//! Typed tools the language model can call
//!
//! Each tool is a [`Tool`] implementation registered by name. The
//! [`ToolRegistry`] is built once and never mutated afterwards; it hands
//! the model an immutable catalog and dispatches calls to handlers.

mod preferences;
mod route;
mod search;

use crate::error::ToolError;
use crate::events::{EventSink, StreamEvent};
use async_trait::async_trait;
use futures::FutureExt;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};
use wayfinder_core::{Clock, RouteAction, RouteState, SessionStore};
use wayfinder_discovery::DiscoveryService;
use wayfinder_llm::{ToolCall, ToolDefinition};

pub use preferences::RecordPreferenceTool;
pub use route::{AddCityTool, GetRouteTool, RemoveCityTool, ReorderRouteTool};
pub use search::SearchCitiesTool;

/// What a tool handler can reach
#[derive(Clone)]
pub struct ToolContext {
    pub session_id: String,
    pub route: Arc<Mutex<RouteState>>,
    pub events: EventSink,
    pub discovery: Arc<DiscoveryService>,
    pub store: Arc<dyn SessionStore>,
    pub clock: Arc<dyn Clock>,
}

impl ToolContext {
    /// Persist a route change and report it on the event stream
    ///
    /// Saving happens before the event so a turn that times out later
    /// still keeps every change the user was told about.
    pub(crate) async fn commit_route(
        &self,
        route: &RouteState,
        change: RouteAction,
    ) -> std::result::Result<(), wayfinder_core::Error> {
        self.store.save_route(&self.session_id, route).await?;
        self.events
            .emit(StreamEvent::RouteAction {
                change,
                route: route.clone(),
            })
            .await;
        Ok(())
    }
}

/// Successful tool result
#[derive(Debug, Clone, Default)]
pub struct ToolOutput {
    pub content: serde_json::Value,
    pub route_actions: Vec<RouteAction>,
}

impl ToolOutput {
    pub fn new(content: serde_json::Value) -> Self {
        Self {
            content,
            route_actions: Vec::new(),
        }
    }

    pub fn with_route_action(mut self, action: RouteAction) -> Self {
        self.route_actions.push(action);
        self
    }
}

/// A capability exposed to the model
#[async_trait]
pub trait Tool: Send + Sync {
    fn definition(&self) -> ToolDefinition;

    async fn execute(
        &self,
        input: serde_json::Value,
        ctx: &ToolContext,
    ) -> std::result::Result<ToolOutput, ToolError>;
}

/// Outcome of one dispatched call, errors included
#[derive(Debug, Clone)]
pub struct ToolOutcome {
    pub tool_call_id: String,
    pub name: String,
    pub result: std::result::Result<ToolOutput, ToolError>,
}

impl ToolOutcome {
    pub fn is_error(&self) -> bool {
        self.result.is_err()
    }

    /// JSON handed back to the model: the output, or `{"error": ...}`
    pub fn content(&self) -> serde_json::Value {
        match &self.result {
            Ok(output) => output.content.clone(),
            Err(e) => serde_json::json!({ "error": e.to_string() }),
        }
    }

    pub fn route_actions(&self) -> &[RouteAction] {
        match &self.result {
            Ok(output) => &output.route_actions,
            Err(_) => &[],
        }
    }
}

/// Immutable tool catalog with name-keyed dispatch
pub struct ToolRegistry {
    definitions: Vec<ToolDefinition>,
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::with_builtin_tools()
    }
}

impl ToolRegistry {
    /// Register tools in order; a later tool replaces an earlier one of the same name
    pub fn new(tools: Vec<Arc<dyn Tool>>) -> Self {
        let mut definitions: Vec<ToolDefinition> = Vec::with_capacity(tools.len());
        let mut map: HashMap<String, Arc<dyn Tool>> = HashMap::with_capacity(tools.len());
        for tool in tools {
            let definition = tool.definition();
            if let Some(existing) = definitions.iter_mut().find(|d| d.name == definition.name) {
                warn!(tool = %definition.name, "Tool registered twice, keeping the later one");
                *existing = definition.clone();
            } else {
                definitions.push(definition.clone());
            }
            map.insert(definition.name, tool);
        }
        Self {
            definitions,
            tools: map,
        }
    }

    pub fn with_builtin_tools() -> Self {
        Self::new(builtin_tools())
    }

    pub fn definitions(&self) -> &[ToolDefinition] {
        &self.definitions
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Run one call; never fails, never panics
    pub async fn execute_tool(&self, call: &ToolCall, ctx: &ToolContext) -> ToolOutcome {
        let result = match self.tools.get(&call.name) {
            None => {
                warn!(tool = %call.name, "Model requested an unknown tool");
                Err(ToolError::Unknown(call.name.clone()))
            }
            Some(tool) => {
                debug!(tool = %call.name, id = %call.id, "Executing tool");
                match AssertUnwindSafe(tool.execute(call.input.clone(), ctx))
                    .catch_unwind()
                    .await
                {
                    Ok(result) => result,
                    Err(panic) => {
                        let message = panic_message(panic.as_ref());
                        warn!(tool = %call.name, "Tool panicked: {message}");
                        Err(ToolError::execution_failed(
                            &call.name,
                            format!("tool panicked: {message}"),
                        ))
                    }
                }
            }
        };
        if let Err(e) = &result {
            debug!(tool = %call.name, "Tool call failed: {e}");
        }
        ToolOutcome {
            tool_call_id: call.id.clone(),
            name: call.name.clone(),
            result,
        }
    }
}

/// The six built-in tools
pub fn builtin_tools() -> Vec<Arc<dyn Tool>> {
    vec![
        Arc::new(SearchCitiesTool),
        Arc::new(AddCityTool),
        Arc::new(RemoveCityTool),
        Arc::new(ReorderRouteTool),
        Arc::new(GetRouteTool),
        Arc::new(RecordPreferenceTool),
    ]
}

/// Definition from a typed input struct's derived JSON schema
pub fn definition_for<T: JsonSchema>(name: &str, description: &str) -> ToolDefinition {
    ToolDefinition::new(name, description, schemars::schema_for!(T).to_value())
}

/// Deserialize a tool input, treating `null` as an empty object
pub fn parse_input<T: DeserializeOwned>(
    tool: &str,
    input: serde_json::Value,
) -> std::result::Result<T, ToolError> {
    let input = if input.is_null() {
        serde_json::json!({})
    } else {
        input
    };
    serde_json::from_value(input).map_err(|e| ToolError::invalid_input(tool, e.to_string()))
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use wayfinder_core::{Config, InMemorySessionStore, ManualClock};
    use wayfinder_discovery::CityDataset;

    pub(crate) fn context() -> (ToolContext, tokio::sync::mpsc::Receiver<StreamEvent>) {
        let clock: Arc<dyn Clock> = Arc::new(ManualClock::new(1_000));
        let dataset = Arc::new(CityDataset::embedded().unwrap());
        let discovery = Arc::new(DiscoveryService::new(
            &Config::default(),
            dataset,
            None,
            clock.clone(),
        ));
        let (events, rx) = EventSink::channel(64);
        let ctx = ToolContext {
            session_id: "session-1".to_string(),
            route: Arc::new(Mutex::new(RouteState::new())),
            events,
            discovery,
            store: Arc::new(InMemorySessionStore::new()),
            clock,
        };
        (ctx, rx)
    }
}
