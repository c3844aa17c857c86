//! Error types for language model providers

use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while talking to a language model
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("Rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Duration },

    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Provider unavailable: {0}")]
    Unavailable(String),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl LlmError {
    /// Whether a retry at the transport level could succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            LlmError::RateLimited { .. } | LlmError::Network(_) => true,
            LlmError::Api { status, .. } => is_retryable_status(*status),
            LlmError::InvalidResponse(_)
            | LlmError::Config(_)
            | LlmError::Unavailable(_)
            | LlmError::Json(_) => false,
        }
    }
}

/// HTTP statuses worth retrying
pub(crate) fn is_retryable_status(status: u16) -> bool {
    matches!(status, 408 | 500 | 502 | 503 | 504 | 529)
}

/// Result alias for provider calls
pub type Result<T> = std::result::Result<T, LlmError>;

impl From<LlmError> for wayfinder_core::Error {
    fn from(err: LlmError) -> Self {
        wayfinder_core::Error::with_context("Language model call failed", err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_retryable() {
        assert!(LlmError::Api {
            status: 529,
            message: "overloaded".to_string()
        }
        .is_retryable());
        assert!(!LlmError::Api {
            status: 400,
            message: "bad request".to_string()
        }
        .is_retryable());
        assert!(!LlmError::InvalidResponse("empty".to_string()).is_retryable());
        assert!(LlmError::RateLimited {
            retry_after: Duration::from_secs(1)
        }
        .is_retryable());
    }

    #[test]
    fn test_converts_into_core_error() {
        let err: wayfinder_core::Error = LlmError::Unavailable("down".to_string()).into();
        assert!(err.to_string().contains("Provider unavailable: down"));
    }
}
