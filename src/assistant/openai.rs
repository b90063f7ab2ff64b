//! OpenAI Assistants API client implementation
//!
//! Implements the PlanningClient trait over the v2 Assistants API:
//! persistent threads carry the whole month's conversation, each action
//! posts a message and drives one run to completion, then reads the
//! newest assistant message off the thread.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use tokio::time::Instant;
use tracing::{debug, warn};

use super::{AssistantError, PlanDraft, PlanningClient, Prompts};
use crate::config::AssistantConfig;
use crate::domain::{
    DailyActuals, MonthlyActuals, MonthlyPlan, SessionKey, TerritoryContext, WeeklyActuals,
};

/// Run statuses that mean the run will never complete
const DEAD_RUN_STATUSES: [&str; 3] = ["failed", "cancelled", "expired"];

/// OpenAI Assistants API client
pub struct OpenAiPlanningClient {
    assistant_id: String,
    api_key: String,
    base_url: String,
    http: Client,
    prompts: Prompts,
    poll_interval: Duration,
    run_timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct ObjectId {
    id: String,
}

#[derive(Debug, Deserialize)]
struct RunStatus {
    status: String,
    #[serde(default)]
    last_error: Option<RunError>,
}

#[derive(Debug, Deserialize)]
struct RunError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct MessageList {
    data: Vec<ThreadMessage>,
}

#[derive(Debug, Deserialize)]
struct ThreadMessage {
    content: Vec<MessageContent>,
}

#[derive(Debug, Deserialize)]
struct MessageContent {
    #[serde(default)]
    text: Option<MessageText>,
}

#[derive(Debug, Deserialize)]
struct MessageText {
    value: String,
}

impl OpenAiPlanningClient {
    /// Create a new client from configuration
    ///
    /// Fails fast when the API key or assistant id is missing, so the
    /// problem surfaces as a configuration error before any thread exists.
    pub fn from_config(config: &AssistantConfig) -> Result<Self, AssistantError> {
        debug!(assistant_id = %config.assistant_id, "from_config: called");
        let api_key = config
            .get_api_key()
            .map_err(|e| AssistantError::Configuration(e.to_string()))?;

        if config.assistant_id.trim().is_empty() {
            return Err(AssistantError::Configuration(
                "assistant-id is not set".to_string(),
            ));
        }

        let http = Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()
            .map_err(AssistantError::Network)?;

        Ok(Self {
            assistant_id: config.assistant_id.clone(),
            api_key,
            base_url: config.base_url.clone(),
            http,
            prompts: Prompts::new(),
            poll_interval: Duration::from_millis(config.poll_interval_ms),
            run_timeout: Duration::from_millis(config.run_timeout_ms),
        })
    }

    async fn post(&self, path: &str, body: &Value) -> Result<Value, AssistantError> {
        let url = format!("{}{}", self.base_url, path);
        debug!(%url, "post: called");
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .header("OpenAI-Beta", "assistants=v2")
            .json(body)
            .send()
            .await?;
        Self::read_json(response).await
    }

    async fn get(&self, path: &str) -> Result<Value, AssistantError> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.api_key)
            .header("OpenAI-Beta", "assistants=v2")
            .send()
            .await?;
        Self::read_json(response).await
    }

    async fn read_json(response: reqwest::Response) -> Result<Value, AssistantError> {
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "read_json: API error");
            return Err(AssistantError::ApiError {
                status: status.as_u16(),
                message,
            });
        }
        Ok(response.json().await?)
    }

    /// Create a thread tagged with the session key, for provider-side audit
    async fn create_thread(&self, key: &SessionKey) -> Result<String, AssistantError> {
        debug!(key = %key, "create_thread: called");
        let body = serde_json::json!({
            "metadata": {
                "employee_id": key.employee_id,
                "month": key.month.to_string(),
                "year": key.year.to_string(),
                "purpose": "monthly_touring_plan",
            }
        });
        let value = self.post("/v1/threads", &body).await?;
        let thread: ObjectId = serde_json::from_value(value)?;
        Ok(thread.id)
    }

    async fn add_message(&self, thread_handle: &str, content: &str) -> Result<(), AssistantError> {
        debug!(%thread_handle, content_len = content.len(), "add_message: called");
        let body = serde_json::json!({ "role": "user", "content": content });
        self.post(&format!("/v1/threads/{thread_handle}/messages"), &body)
            .await?;
        Ok(())
    }

    /// Start a run and poll it to completion
    async fn run_to_completion(
        &self,
        thread_handle: &str,
        additional_instructions: Option<&str>,
    ) -> Result<(), AssistantError> {
        debug!(%thread_handle, "run_to_completion: called");
        let mut body = serde_json::json!({ "assistant_id": self.assistant_id });
        if let Some(instructions) = additional_instructions {
            body["additional_instructions"] = Value::String(instructions.to_string());
        }

        let value = self
            .post(&format!("/v1/threads/{thread_handle}/runs"), &body)
            .await?;
        let run: ObjectId = serde_json::from_value(value)?;

        let deadline = Instant::now() + self.run_timeout;
        loop {
            let value = self
                .get(&format!("/v1/threads/{thread_handle}/runs/{}", run.id))
                .await?;
            let status: RunStatus = serde_json::from_value(value)?;
            debug!(run_id = %run.id, status = %status.status, "run_to_completion: polled");

            if status.status == "completed" {
                return Ok(());
            }
            if DEAD_RUN_STATUSES.contains(&status.status.as_str()) {
                let detail = status
                    .last_error
                    .map(|e| format!("{}: {}", status.status, e.message))
                    .unwrap_or(status.status);
                return Err(AssistantError::RunFailed { status: detail });
            }
            if Instant::now() >= deadline {
                warn!(run_id = %run.id, "run_to_completion: timed out");
                return Err(AssistantError::Timeout(self.run_timeout));
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    /// The newest message on the thread, which after a completed run is
    /// the assistant's reply
    async fn latest_message(&self, thread_handle: &str) -> Result<String, AssistantError> {
        let value = self
            .get(&format!("/v1/threads/{thread_handle}/messages?limit=1"))
            .await?;
        let list: MessageList = serde_json::from_value(value)?;
        list.data
            .first()
            .and_then(|message| message.content.first())
            .and_then(|content| content.text.as_ref())
            .map(|text| text.value.clone())
            .ok_or_else(|| AssistantError::Malformed("thread has no text reply".to_string()))
    }

    /// Post a message, run the assistant, and return its reply text
    async fn converse(
        &self,
        thread_handle: &str,
        message: &str,
        additional_instructions: Option<&str>,
    ) -> Result<String, AssistantError> {
        self.add_message(thread_handle, message).await?;
        self.run_to_completion(thread_handle, additional_instructions)
            .await?;
        self.latest_message(thread_handle).await
    }
}

#[async_trait]
impl PlanningClient for OpenAiPlanningClient {
    async fn start_plan(
        &self,
        key: &SessionKey,
        territory: &TerritoryContext,
    ) -> Result<PlanDraft, AssistantError> {
        debug!(key = %key, customers = territory.customers.len(), "start_plan: called");
        let prompt = self
            .prompts
            .generate(key, territory)
            .map_err(|e| AssistantError::Configuration(e.to_string()))?;

        let thread_handle = self.create_thread(key).await?;
        let reply = self
            .converse(
                &thread_handle,
                &prompt,
                Some("Respond with the plan JSON only, no commentary."),
            )
            .await?;

        let framework = MonthlyPlan::from_assistant_text(&reply).ok_or_else(|| {
            AssistantError::Malformed("reply contains no plan JSON".to_string())
        })?;

        Ok(PlanDraft {
            thread_handle,
            framework,
        })
    }

    async fn revise_week(
        &self,
        thread_handle: &str,
        week_number: u32,
        actuals: &WeeklyActuals,
        reason: &str,
    ) -> Result<MonthlyPlan, AssistantError> {
        debug!(%thread_handle, week_number, "revise_week: called");
        let prompt = self
            .prompts
            .revise(week_number, actuals, reason)
            .map_err(|e| AssistantError::Configuration(e.to_string()))?;

        let reply = self.converse(thread_handle, &prompt, None).await?;
        MonthlyPlan::from_assistant_text(&reply).ok_or_else(|| {
            AssistantError::Malformed("revision reply contains no plan JSON".to_string())
        })
    }

    async fn update_daily(
        &self,
        thread_handle: &str,
        actuals: &DailyActuals,
    ) -> Result<String, AssistantError> {
        debug!(%thread_handle, date = %actuals.date, "update_daily: called");
        let prompt = self
            .prompts
            .daily(actuals)
            .map_err(|e| AssistantError::Configuration(e.to_string()))?;
        self.converse(thread_handle, &prompt, None).await
    }

    async fn monthly_review(
        &self,
        thread_handle: &str,
        actuals: &MonthlyActuals,
    ) -> Result<Value, AssistantError> {
        debug!(%thread_handle, "monthly_review: called");
        let prompt = self
            .prompts
            .review(actuals)
            .map_err(|e| AssistantError::Configuration(e.to_string()))?;

        let reply = self.converse(thread_handle, &prompt, None).await?;
        crate::domain::extract_json_object(&reply).ok_or_else(|| {
            AssistantError::Malformed("review reply contains no JSON summary".to_string())
        })
    }
}
