//! Orchestrator-specific error types
//!
//! Provider errors, timeouts and total exhaustion never show up here: they
//! are absorbed by racing and the fallback path. What remains is what a
//! caller has to handle.

use thiserror::Error;
use shared::{ContentId, SharedError};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum OrchestratorError {
    #[error("No image providers registered")]
    NoProvidersRegistered,

    #[error("Configuration error: {field}: {message}")]
    ConfigurationError { field: String, message: String },

    #[error("Fallback generation failed for {content_id}: {reason}")]
    FallbackFailed { content_id: ContentId, reason: String },

    #[error("Generation attempt for {fingerprint} ended without a result")]
    AttemptAborted { fingerprint: String },

    #[error("Shared component error: {0}")]
    SharedError(#[from] SharedError),

    #[error("I/O error: {message}")]
    IoError { message: String },
}

impl OrchestratorError {
    pub fn config(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigurationError {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for OrchestratorError {
    fn from(e: std::io::Error) -> Self {
        Self::IoError { message: e.to_string() }
    }
}

impl From<serde_json::Error> for OrchestratorError {
    fn from(e: serde_json::Error) -> Self {
        Self::SharedError(SharedError::DeserializationError { message: e.to_string() })
    }
}

pub type OrchestratorResult<T> = Result<T, OrchestratorError>;

/// Failure of the local fallback generator
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FallbackError {
    #[error("Nothing to render: {reason}")]
    EmptyContent { reason: String },

    #[error("Rendered payload of {size} bytes exceeds limit of {limit} bytes")]
    PayloadTooLarge { size: usize, limit: usize },
}
