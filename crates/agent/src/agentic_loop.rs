//! Bounded tool-calling loop
//!
//! Each iteration plans (one model call), executes the requested tools
//! concurrently and reflects on whether another iteration is allowed. The
//! loop ends with a final answer, a fallback for an anomalous stop reason
//! or model failure, or the exhausted fallback once `max_iterations`
//! model calls have been spent on tool use.

use crate::events::StreamEvent;
use crate::tools::{ToolContext, ToolOutcome, ToolRegistry};
use futures::future::join_all;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};
use wayfinder_core::{ConversationTurn, Role as TurnRole, RouteAction};
use wayfinder_llm::{
    CompletionRequest, ContentBlock, LanguageModel, Message, Role, StopReason, ToolCall,
};

pub(crate) const EXHAUSTED_ANSWER: &str = "I ran out of turns before finishing that. \
    Here's where things stand; ask me to continue and I'll pick up from here.";

pub(crate) const ANOMALOUS_ANSWER: &str =
    "Sorry, I lost my train of thought there. Could you ask that again?";

pub(crate) const GENERATION_FAILED_ANSWER: &str =
    "Sorry, I can't reach the trip planner right now. Your route is unchanged; please try again in a moment.";

const EMPTY_ANSWER: &str = "Done.";

/// How a loop run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    FinalAnswer,
    Exhausted,
    Anomalous,
    GenerationFailed,
}

/// One tool call and what came back
#[derive(Debug, Clone, Serialize)]
pub struct ToolInvocation {
    pub id: String,
    pub name: String,
    pub input: serde_json::Value,
    pub output: serde_json::Value,
    pub is_error: bool,
}

#[derive(Debug, Clone)]
pub struct LoopOutcome {
    pub answer: String,
    pub termination: Termination,
    /// Model calls made
    pub iterations: usize,
    pub tool_invocations: Vec<ToolInvocation>,
    pub route_actions: Vec<RouteAction>,
}

#[derive(Debug)]
enum LoopState {
    Planning,
    Executing {
        text: Option<String>,
        calls: Vec<ToolCall>,
    },
    Reflecting,
    Responding {
        answer: String,
        termination: Termination,
    },
}

pub struct AgenticLoop {
    model: Arc<dyn LanguageModel>,
    tools: Arc<ToolRegistry>,
    max_iterations: usize,
    max_tokens: u32,
}

impl AgenticLoop {
    pub fn new(
        model: Arc<dyn LanguageModel>,
        tools: Arc<ToolRegistry>,
        max_iterations: usize,
        max_tokens: u32,
    ) -> Self {
        Self {
            model,
            tools,
            max_iterations: max_iterations.max(1),
            max_tokens,
        }
    }

    /// Run one user turn to completion
    ///
    /// Only tools and `ctx.events` cause side effects; the returned outcome
    /// carries everything the caller needs to persist the exchange.
    pub async fn run(
        &self,
        system_prompt: &str,
        history: &[ConversationTurn],
        user_message: &str,
        ctx: &ToolContext,
    ) -> LoopOutcome {
        let mut messages = history_messages(history);
        messages.push(Message::user(user_message));

        let mut iterations = 0usize;
        let mut tool_invocations = Vec::new();
        let mut route_actions = Vec::new();
        let mut state = LoopState::Planning;

        loop {
            state = match state {
                LoopState::Planning => {
                    iterations += 1;
                    debug!(iteration = iterations, max = self.max_iterations, "Planning");
                    ctx.events
                        .emit(StreamEvent::Thinking {
                            iteration: iterations,
                        })
                        .await;
                    self.plan(system_prompt, &messages).await
                }
                LoopState::Executing { text, calls } => {
                    if let Some(text) = &text {
                        ctx.events.emit(StreamEvent::Text { text: text.clone() }).await;
                    }
                    let outcomes = self.execute(&calls, ctx).await;

                    let mut assistant_blocks: Vec<ContentBlock> =
                        text.into_iter().map(ContentBlock::text).collect();
                    assistant_blocks.extend(calls.iter().map(ContentBlock::tool_use));
                    messages.push(Message::assistant_blocks(assistant_blocks));
                    messages.push(Message::user_blocks(
                        outcomes
                            .iter()
                            .map(|o| {
                                ContentBlock::tool_result(
                                    o.tool_call_id.clone(),
                                    o.content().to_string(),
                                    o.is_error(),
                                )
                            })
                            .collect(),
                    ));

                    for (call, outcome) in calls.into_iter().zip(outcomes) {
                        route_actions.extend_from_slice(outcome.route_actions());
                        tool_invocations.push(ToolInvocation {
                            output: outcome.content(),
                            is_error: outcome.is_error(),
                            id: call.id,
                            name: call.name,
                            input: call.input,
                        });
                    }
                    LoopState::Reflecting
                }
                LoopState::Reflecting => {
                    if iterations >= self.max_iterations {
                        warn!(iterations, "Agent loop reached its iteration cap");
                        LoopState::Responding {
                            answer: EXHAUSTED_ANSWER.to_string(),
                            termination: Termination::Exhausted,
                        }
                    } else {
                        LoopState::Planning
                    }
                }
                LoopState::Responding {
                    answer,
                    termination,
                } => {
                    ctx.events.emit(StreamEvent::Text { text: answer.clone() }).await;
                    info!(
                        ?termination,
                        iterations,
                        tools = tool_invocations.len(),
                        "Agent loop finished"
                    );
                    return LoopOutcome {
                        answer,
                        termination,
                        iterations,
                        tool_invocations,
                        route_actions,
                    };
                }
            };
        }
    }

    async fn plan(&self, system_prompt: &str, messages: &[Message]) -> LoopState {
        let request = CompletionRequest {
            system_prompt: system_prompt.to_string(),
            messages: messages.to_vec(),
            tools: self.tools.definitions().to_vec(),
            max_tokens: self.max_tokens,
        };

        let response = match self.model.complete(request).await {
            Ok(response) => response,
            Err(e) => {
                warn!(model = self.model.name(), "Model call failed: {e}");
                return LoopState::Responding {
                    answer: GENERATION_FAILED_ANSWER.to_string(),
                    termination: Termination::GenerationFailed,
                };
            }
        };

        let text = response
            .text
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());
        match response.stop_reason {
            StopReason::EndTurn => LoopState::Responding {
                answer: text.unwrap_or_else(|| EMPTY_ANSWER.to_string()),
                termination: Termination::FinalAnswer,
            },
            StopReason::ToolUse if !response.tool_calls.is_empty() => LoopState::Executing {
                text,
                calls: response.tool_calls,
            },
            other => {
                warn!(stop_reason = other.as_str(), "Unexpected stop reason");
                LoopState::Responding {
                    answer: ANOMALOUS_ANSWER.to_string(),
                    termination: Termination::Anomalous,
                }
            }
        }
    }

    /// All calls concurrently; outcomes and completion events in request order
    async fn execute(&self, calls: &[ToolCall], ctx: &ToolContext) -> Vec<ToolOutcome> {
        for call in calls {
            ctx.events
                .emit(StreamEvent::ToolStart {
                    id: call.id.clone(),
                    name: call.name.clone(),
                    input: call.input.clone(),
                })
                .await;
        }

        let outcomes = join_all(calls.iter().map(|call| self.tools.execute_tool(call, ctx))).await;

        for outcome in &outcomes {
            ctx.events
                .emit(StreamEvent::ToolComplete {
                    id: outcome.tool_call_id.clone(),
                    name: outcome.name.clone(),
                    output: outcome.content(),
                    is_error: outcome.is_error(),
                })
                .await;
        }
        outcomes
    }
}

/// Stored turns as alternating model messages starting with the user
///
/// Tool turns are left out and consecutive turns of one role are merged.
fn history_messages(history: &[ConversationTurn]) -> Vec<Message> {
    let mut messages: Vec<Message> = Vec::new();
    for turn in history {
        let role = match turn.role {
            TurnRole::User => Role::User,
            TurnRole::Assistant => Role::Assistant,
            TurnRole::Tool => continue,
        };
        if messages.is_empty() && role == Role::Assistant {
            continue;
        }
        match messages.last_mut() {
            Some(last) if last.role == role => {
                last.content.push(ContentBlock::text(turn.content.clone()));
            }
            _ => messages.push(match role {
                Role::User => Message::user(turn.content.clone()),
                Role::Assistant => Message::assistant(turn.content.clone()),
            }),
        }
    }
    // the new user turn follows, so the history must end with the assistant
    if messages.last().is_some_and(|m| m.role == Role::User) {
        messages.pop();
    }
    messages
}
