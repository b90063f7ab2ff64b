//! Planning assistant module
//!
//! Provides the PlanningClient trait, the OpenAI Assistants adapter, and
//! the prompt templates behind the four workflow actions.

use std::sync::Arc;

use tracing::debug;

pub mod client;
mod error;
mod openai;
mod prompts;

pub use client::{PlanDraft, PlanningClient};
pub use error::AssistantError;
pub use openai::OpenAiPlanningClient;
pub use prompts::Prompts;

use crate::config::AssistantConfig;

/// Create a planning client for the provider named in config
///
/// Only "openai" is supported.
pub fn create_client(config: &AssistantConfig) -> Result<Arc<dyn PlanningClient>, AssistantError> {
    debug!(provider = %config.provider, assistant_id = %config.assistant_id, "create_client: called");
    match config.provider.as_str() {
        "openai" => {
            debug!("create_client: creating OpenAI assistants client");
            Ok(Arc::new(OpenAiPlanningClient::from_config(config)?))
        }
        other => Err(AssistantError::Configuration(format!(
            "Unknown assistant provider: '{}'. Supported: openai",
            other
        ))),
    }
}
