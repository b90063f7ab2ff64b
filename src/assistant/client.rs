//! Planning client trait
//!
//! The workflow engine talks to the assistant through this trait so tests
//! can substitute a scripted client.

use async_trait::async_trait;
use serde_json::Value;

use super::AssistantError;
use crate::domain::{DailyActuals, MonthlyActuals, MonthlyPlan, SessionKey, TerritoryContext, WeeklyActuals};

/// Result of opening a new planning conversation
#[derive(Debug, Clone)]
pub struct PlanDraft {
    /// Provider-side conversation handle, kept for follow-up actions
    pub thread_handle: String,
    /// The strategic framework parsed from the assistant's first reply
    pub framework: MonthlyPlan,
}

/// A conversational planning assistant
#[async_trait]
pub trait PlanningClient: Send + Sync {
    /// Open a new thread and produce the initial strategic framework
    async fn start_plan(
        &self,
        key: &SessionKey,
        territory: &TerritoryContext,
    ) -> Result<PlanDraft, AssistantError>;

    /// Revise one week of an existing plan against last week's actuals
    async fn revise_week(
        &self,
        thread_handle: &str,
        week_number: u32,
        actuals: &WeeklyActuals,
        reason: &str,
    ) -> Result<MonthlyPlan, AssistantError>;

    /// Log a day's actuals and get short advisory guidance back
    async fn update_daily(
        &self,
        thread_handle: &str,
        actuals: &DailyActuals,
    ) -> Result<String, AssistantError>;

    /// Produce the month-end review summary
    async fn monthly_review(
        &self,
        thread_handle: &str,
        actuals: &MonthlyActuals,
    ) -> Result<Value, AssistantError>;
}
