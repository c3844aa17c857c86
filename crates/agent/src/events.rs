//! Streaming events emitted while a conversation turn runs

use crate::agentic_loop::Termination;
use crate::triggers::SuggestionOutcome;
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::debug;
use wayfinder_core::{RouteAction, RouteState};

/// One event on a turn's stream, serialized as `{"type": ..., ...}`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    Thinking {
        iteration: usize,
    },
    Text {
        text: String,
    },
    ToolStart {
        id: String,
        name: String,
        input: serde_json::Value,
    },
    ToolComplete {
        id: String,
        name: String,
        output: serde_json::Value,
        is_error: bool,
    },
    RouteAction {
        change: RouteAction,
        route: RouteState,
    },
    Complete {
        answer: String,
        termination: Termination,
        #[serde(skip_serializing_if = "Option::is_none")]
        suggestion: Option<SuggestionOutcome>,
    },
    Error {
        message: String,
    },
}

impl StreamEvent {
    /// SSE event name
    pub fn name(&self) -> &'static str {
        match self {
            StreamEvent::Thinking { .. } => "thinking",
            StreamEvent::Text { .. } => "text",
            StreamEvent::ToolStart { .. } => "tool_start",
            StreamEvent::ToolComplete { .. } => "tool_complete",
            StreamEvent::RouteAction { .. } => "route_action",
            StreamEvent::Complete { .. } => "complete",
            StreamEvent::Error { .. } => "error",
        }
    }
}

/// Sending half of a turn's event stream
///
/// A closed or absent receiver is ignored so a client disconnect never
/// fails the turn.
#[derive(Debug, Clone, Default)]
pub struct EventSink {
    tx: Option<mpsc::Sender<StreamEvent>>,
}

impl EventSink {
    /// Bounded channel of `buffer` events
    pub fn channel(buffer: usize) -> (Self, mpsc::Receiver<StreamEvent>) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        (Self { tx: Some(tx) }, rx)
    }

    /// A sink that drops every event
    pub fn disabled() -> Self {
        Self::default()
    }

    pub async fn emit(&self, event: StreamEvent) {
        let Some(tx) = &self.tx else {
            return;
        };
        if tx.send(event).await.is_err() {
            debug!("Event receiver closed, dropping event");
        }
    }
}
