//! Error types for discovery operations

use serde::Serialize;
use thiserror::Error;

/// One source that failed during a search
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceFailure {
    pub source_name: String,
    pub message: String,
}

#[derive(Error, Debug)]
pub enum DiscoveryError {
    #[error("Invalid search request: {0}")]
    InvalidRequest(String),

    #[error("Dataset error: {0}")]
    Dataset(String),

    #[error("Source '{source_name}' unavailable: {message}")]
    SourceUnavailable {
        source_name: String,
        message: String,
    },

    #[error("All {} search sources failed", failures.len())]
    AllSourcesFailed { failures: Vec<SourceFailure> },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl DiscoveryError {
    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::InvalidRequest(msg.into())
    }

    pub fn dataset(msg: impl Into<String>) -> Self {
        Self::Dataset(msg.into())
    }

    pub fn source_unavailable(source_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SourceUnavailable {
            source_name: source_name.into(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, DiscoveryError>;

impl From<DiscoveryError> for wayfinder_core::Error {
    fn from(err: DiscoveryError) -> Self {
        wayfinder_core::Error::with_context("Discovery failed", err)
    }
}
