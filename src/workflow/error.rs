//! Workflow error types
//!
//! Every failure a workflow action can produce, including the mapping
//! from assistant and storage errors. The HTTP layer renders all of
//! these as a 500 envelope; the variants exist so callers and logs can
//! tell operator mistakes from provider outages.

use std::time::Duration;
use thiserror::Error;

use super::PlanAction;
use crate::assistant::AssistantError;
use crate::domain::{PlanPhase, SessionKey};
use crate::store::StoreError;

/// Errors from workflow operations
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Planning service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Planning service timed out after {0:?}")]
    ServiceTimeout(Duration),

    #[error("Malformed assistant response: {0}")]
    MalformedResponse(String),

    #[error("Invalid revision: {0}")]
    InvalidRevision(String),

    #[error("Unknown action: '{0}'")]
    UnknownAction(String),

    #[error("Session {0} is closed")]
    SessionClosed(SessionKey),

    #[error("Action '{action}' is not allowed while the plan is {phase}")]
    IllegalPhaseTransition { phase: PlanPhase, action: PlanAction },

    #[error("Concurrent operation in progress: {0}")]
    ConcurrencyConflict(String),

    #[error("Storage error: {0}")]
    Storage(StoreError),
}

impl From<AssistantError> for WorkflowError {
    fn from(e: AssistantError) -> Self {
        match e {
            AssistantError::Configuration(message) => WorkflowError::Configuration(message),
            AssistantError::Timeout(duration) => WorkflowError::ServiceTimeout(duration),
            AssistantError::Malformed(message) => WorkflowError::MalformedResponse(message),
            AssistantError::Json(e) => WorkflowError::MalformedResponse(e.to_string()),
            other => WorkflowError::ServiceUnavailable(other.to_string()),
        }
    }
}

impl From<StoreError> for WorkflowError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::VersionConflict(message) => WorkflowError::ConcurrencyConflict(message),
            other => WorkflowError::Storage(other),
        }
    }
}
