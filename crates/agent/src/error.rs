//! Error types for conversation and tool execution

use thiserror::Error;

/// Failures that end a conversation turn
///
/// Everything else (tool errors, exhausted iterations, model outages)
/// degrades to a fallback answer inside the loop.
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Too many messages for session {session_id}, retry in {retry_after_ms} ms")]
    AdmissionDenied {
        session_id: String,
        retry_after_ms: u64,
    },

    #[error("Conversation turn timed out after {timeout_secs}s")]
    LoopTimeout { timeout_secs: u64 },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Session(#[from] wayfinder_core::Error),
}

impl AgentError {
    /// Message shown to the user in the stream `error` event
    pub fn user_message(&self) -> &'static str {
        match self {
            AgentError::AdmissionDenied { .. } => {
                "You're sending messages faster than I can plan. Give me a moment and try again."
            }
            AgentError::LoopTimeout { .. } => {
                "That took longer than expected. Any route changes already made have been kept; please try again."
            }
            AgentError::InvalidInput(_) => "I didn't catch a message there.",
            AgentError::Session(_) => "I couldn't load your trip right now. Please try again.",
        }
    }
}

pub type Result<T> = std::result::Result<T, AgentError>;

/// Failures of a single tool call, returned to the model as `{"error": ...}`
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ToolError {
    #[error("Unknown tool: {0}")]
    Unknown(String),

    #[error("Invalid input for {tool}: {message}")]
    InvalidInput { tool: String, message: String },

    #[error("{tool} failed: {message}")]
    ExecutionFailed { tool: String, message: String },
}

impl ToolError {
    pub fn invalid_input(tool: &str, message: impl Into<String>) -> Self {
        Self::InvalidInput {
            tool: tool.to_string(),
            message: message.into(),
        }
    }

    pub fn execution_failed(tool: &str, message: impl Into<String>) -> Self {
        Self::ExecutionFailed {
            tool: tool.to_string(),
            message: message.into(),
        }
    }
}
