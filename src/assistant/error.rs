//! Assistant provider error types

use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while talking to the planning assistant
#[derive(Debug, Error)]
pub enum AssistantError {
    #[error("Assistant misconfigured: {0}")]
    Configuration(String),

    #[error("API error {status}: {message}")]
    ApiError { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Run ended with status '{status}'")]
    RunFailed { status: String },

    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    #[error("Malformed assistant response: {0}")]
    Malformed(String),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AssistantError {
    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        match self {
            AssistantError::Configuration(_) => false,
            AssistantError::ApiError { status, .. } => *status >= 500,
            AssistantError::Network(_) => true,
            AssistantError::RunFailed { status } => status == "expired",
            AssistantError::Timeout(_) => true,
            AssistantError::Malformed(_) => false,
            AssistantError::Json(_) => false,
        }
    }
}
