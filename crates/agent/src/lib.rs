//! Conversational trip planning agent
//!
//! [`ConversationService`] admits a message through the [`RateLimiter`],
//! runs the bounded [`AgenticLoop`] over the [`ToolRegistry`] and asks the
//! [`ProactiveTriggerEngine`] whether the turn deserves a suggestion.
//! Progress streams out as [`StreamEvent`]s.

#![deny(warnings)]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]

pub mod agentic_loop;
pub mod conversation;
pub mod error;
pub mod events;
mod prompts;
pub mod rate_limiter;
pub mod tools;
pub mod triggers;

pub use agentic_loop::{AgenticLoop, LoopOutcome, Termination, ToolInvocation};
pub use conversation::{ChatReply, ConversationService, SweepStats};
pub use error::{AgentError, Result, ToolError};
pub use events::{EventSink, StreamEvent};
pub use rate_limiter::{Admission, RateLimiter};
pub use tools::{Tool, ToolContext, ToolOutcome, ToolOutput, ToolRegistry};
pub use triggers::{
    ProactiveTriggerEngine, QuickAction, SuggestionOutcome, Trigger, TriggerDecision, TriggerEvent,
};
