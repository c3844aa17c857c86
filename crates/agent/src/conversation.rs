//! Conversation turns: admission, the agent loop and proactive suggestions

use crate::agentic_loop::{AgenticLoop, LoopOutcome, Termination, ToolInvocation};
use crate::error::{AgentError, Result};
use crate::events::{EventSink, StreamEvent};
use crate::prompts::agent_system_prompt;
use crate::rate_limiter::{Admission, RateLimiter};
use crate::tools::{ToolContext, ToolRegistry};
use crate::triggers::{ProactiveTriggerEngine, SuggestionOutcome, TriggerEvent};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};
use wayfinder_core::config::AgentConfig;
use wayfinder_core::{Clock, Config, ConversationTurn, Role, RouteState, SessionStore};
use wayfinder_discovery::DiscoveryService;
use wayfinder_llm::LanguageModel;

/// Result of one completed turn
#[derive(Debug, Clone, Serialize)]
pub struct ChatReply {
    pub answer: String,
    pub termination: Termination,
    pub iterations: usize,
    pub tool_invocations: Vec<ToolInvocation>,
    pub route: RouteState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<SuggestionOutcome>,
}

/// Sweep counts from [`ConversationService::sweep`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepStats {
    pub rate_limit_keys: usize,
    pub trigger_records: usize,
    pub cache_entries: usize,
}

/// Entry point for user messages
pub struct ConversationService {
    config: AgentConfig,
    triggers_enabled: bool,
    agent: AgenticLoop,
    discovery: Arc<DiscoveryService>,
    store: Arc<dyn SessionStore>,
    clock: Arc<dyn Clock>,
    rate_limiter: RateLimiter,
    triggers: ProactiveTriggerEngine,
}

impl ConversationService {
    pub fn new(
        config: &Config,
        model: Arc<dyn LanguageModel>,
        discovery: Arc<DiscoveryService>,
        store: Arc<dyn SessionStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self::with_tools(
            config,
            model,
            Arc::new(ToolRegistry::with_builtin_tools()),
            discovery,
            store,
            clock,
        )
    }

    pub fn with_tools(
        config: &Config,
        model: Arc<dyn LanguageModel>,
        tools: Arc<ToolRegistry>,
        discovery: Arc<DiscoveryService>,
        store: Arc<dyn SessionStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let agent = AgenticLoop::new(
            model.clone(),
            tools,
            config.agent.max_iterations,
            config.agent.max_tokens,
        );
        Self {
            config: config.agent.clone(),
            triggers_enabled: config.triggers.enabled,
            agent,
            discovery,
            store: store.clone(),
            rate_limiter: RateLimiter::new(&config.rate_limit, clock.clone()),
            triggers: ProactiveTriggerEngine::new(&config.triggers, Some(model), clock.clone()),
            clock,
        }
    }

    pub fn discovery(&self) -> &Arc<DiscoveryService> {
        &self.discovery
    }

    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.store
    }

    pub fn triggers(&self) -> &ProactiveTriggerEngine {
        &self.triggers
    }

    pub fn rate_limiter(&self) -> &RateLimiter {
        &self.rate_limiter
    }

    /// Size for per-turn event channels
    pub fn event_buffer(&self) -> usize {
        self.config.event_buffer
    }

    /// Handle one user message, streaming progress to `events`
    ///
    /// A blank message, a denied admission or the turn timeout return
    /// `Err`, each also reported as an `error` event. Blank messages are
    /// rejected before they count against the rate limit. Route changes made before a
    /// timeout stay saved.
    pub async fn handle_message(
        &self,
        session_id: &str,
        message: &str,
        events: EventSink,
    ) -> Result<ChatReply> {
        let message = message.trim();
        if message.is_empty() {
            let err = AgentError::InvalidInput("message must not be empty".to_string());
            events.emit(StreamEvent::Error { message: err.user_message().to_string() }).await;
            return Err(err);
        }

        if let Admission::Denied { retry_after_ms } = self.rate_limiter.check(session_id) {
            warn!(session = session_id, retry_after_ms, "Message rejected by rate limiter");
            let err = AgentError::AdmissionDenied {
                session_id: session_id.to_string(),
                retry_after_ms,
            };
            events.emit(StreamEvent::Error { message: err.user_message().to_string() }).await;
            return Err(err);
        }

        let timeout_secs = self.config.timeout_secs;
        let turn = self.run_turn(session_id, message, events.clone());
        match tokio::time::timeout(Duration::from_secs(timeout_secs), turn).await {
            Ok(result) => {
                if let Err(e) = &result {
                    error!(session = session_id, "Conversation turn failed: {e}");
                    events.emit(StreamEvent::Error { message: e.user_message().to_string() }).await;
                }
                result
            }
            Err(_) => {
                let err = AgentError::LoopTimeout { timeout_secs };
                error!(session = session_id, timeout_secs, "Conversation turn timed out");
                events.emit(StreamEvent::Error { message: err.user_message().to_string() }).await;
                Err(err)
            }
        }
    }

    async fn run_turn(&self, session_id: &str, message: &str, events: EventSink) -> Result<ChatReply> {
        let history = self
            .store
            .recent_history(session_id, self.config.history_window)
            .await?;
        let route = self.store.load_route(session_id).await?;
        let preferences = self.store.preferences(session_id).await?;
        let system_prompt = agent_system_prompt(&route, &preferences);
        debug!(
            session = session_id,
            history = history.len(),
            stops = route.len(),
            "Starting conversation turn"
        );

        let route = Arc::new(Mutex::new(route));
        let ctx = ToolContext {
            session_id: session_id.to_string(),
            route: route.clone(),
            events: events.clone(),
            discovery: self.discovery.clone(),
            store: self.store.clone(),
            clock: self.clock.clone(),
        };

        let started_at = self.clock.now_ms();
        let outcome = self.agent.run(&system_prompt, &history, message, &ctx).await;

        self.store
            .append_turns(
                session_id,
                vec![
                    ConversationTurn::new(Role::User, message, started_at),
                    ConversationTurn::new(Role::Assistant, outcome.answer.clone(), self.clock.now_ms()),
                ],
            )
            .await?;

        let route = route.lock().await.clone();
        let suggestion = if self.triggers_enabled {
            let turn_events = trigger_events(&outcome);
            self.triggers.evaluate(session_id, &turn_events, &route).await
        } else {
            None
        };

        events
            .emit(StreamEvent::Complete {
                answer: outcome.answer.clone(),
                termination: outcome.termination,
                suggestion: suggestion.clone(),
            })
            .await;
        info!(
            session = session_id,
            termination = ?outcome.termination,
            iterations = outcome.iterations,
            suggestion = suggestion.is_some(),
            "Conversation turn complete"
        );

        Ok(ChatReply {
            answer: outcome.answer,
            termination: outcome.termination,
            iterations: outcome.iterations,
            tool_invocations: outcome.tool_invocations,
            route,
            suggestion,
        })
    }

    /// Drop expired rate-limit, trigger and cache records
    pub fn sweep(&self) -> SweepStats {
        let stats = SweepStats {
            rate_limit_keys: self.rate_limiter.cleanup(),
            trigger_records: self.triggers.cleanup(),
            cache_entries: self.discovery.cleanup_cache(),
        };
        debug!(?stats, "Swept expired state");
        stats
    }
}

/// Route changes in order, then successful searches
fn trigger_events(outcome: &LoopOutcome) -> Vec<TriggerEvent> {
    let mut events: Vec<TriggerEvent> = outcome.route_actions.iter().map(TriggerEvent::from).collect();
    events.extend(
        outcome
            .tool_invocations
            .iter()
            .filter(|t| t.name == "search_cities" && !t.is_error)
            .filter_map(|t| t.input.get("query").and_then(|q| q.as_str()))
            .map(|query| TriggerEvent::Search {
                query: query.to_string(),
            }),
    );
    events
}
