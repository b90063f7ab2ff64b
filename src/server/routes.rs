//! Plan and target endpoint handlers
//!
//! One POST endpoint per concern. The plan endpoint dispatches on the
//! `action` field; failures of any kind come back as a 500 envelope with
//! `success: false`, matching what the dashboard frontend expects.

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, warn};

use super::AppState;
use crate::domain::{
    DailyActuals, MonthlyActuals, SessionKey, TargetSubmission, TerritoryContext, WeeklyActuals,
    WeeklyTargetSet,
};
use crate::workflow::{PlanAction, WorkflowError};

/// POST /api/plan request body
#[derive(Debug, Deserialize)]
pub struct PlanRequest {
    pub action: String,
    pub employee_id: String,
    pub month: u32,
    pub year: i32,
    #[serde(default)]
    pub territory_context: Option<TerritoryContext>,
    #[serde(default)]
    pub week_number: Option<u32>,
    #[serde(default)]
    pub weekly_actuals: Option<WeeklyActuals>,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub daily_actuals: Option<DailyActuals>,
    #[serde(default)]
    pub monthly_actuals: Option<MonthlyActuals>,
}

/// POST /api/targets request body
#[derive(Debug, Deserialize)]
pub struct TargetsRequest {
    pub week_number: u32,
    pub year: i32,
    #[serde(default)]
    pub created_by: Option<String>,
    /// employee_id -> submission
    pub targets: std::collections::BTreeMap<String, TargetSubmission>,
}

/// CORS preflight; headers are attached by the response layer
pub async fn preflight() -> StatusCode {
    StatusCode::OK
}

/// POST /api/plan
pub async fn handle_plan(State(state): State<AppState>, Json(request): Json<PlanRequest>) -> Response {
    let action_name = request.action.clone();
    debug!(action = %action_name, employee_id = %request.employee_id, "handle_plan: called");

    match dispatch_plan(&state, request).await {
        Ok(result) => envelope_ok(&action_name, result),
        Err(e) => envelope_err(&action_name, e),
    }
}

async fn dispatch_plan(state: &AppState, request: PlanRequest) -> Result<Value, WorkflowError> {
    let action: PlanAction = request.action.parse()?;
    let key = SessionKey::new(request.employee_id, request.month, request.year);

    match action {
        PlanAction::Generate => {
            let territory = request.territory_context.unwrap_or_default();
            let session = state.engine.generate(key, territory).await?;
            Ok(json!({
                "plan": session.plan,
                "phase": session.phase,
                "thread_handle": session.thread_handle,
            }))
        }
        PlanAction::ReviseWeekly => {
            let week_number = request.week_number.ok_or_else(|| {
                WorkflowError::InvalidRequest("revise_weekly requires week_number".to_string())
            })?;
            let actuals = request.weekly_actuals.unwrap_or_default();
            let reason = request.reason.unwrap_or_else(|| "weekly revision".to_string());
            let session = state.engine.revise_weekly(key, week_number, actuals, reason).await?;
            Ok(json!({
                "plan": session.plan,
                "phase": session.phase,
                "revision_count": session.revision_history.len(),
            }))
        }
        PlanAction::UpdateDaily => {
            let actuals = request.daily_actuals.ok_or_else(|| {
                WorkflowError::InvalidRequest("update_daily requires daily_actuals".to_string())
            })?;
            let advisory = state.engine.update_daily(key, actuals).await?;
            Ok(json!({ "advisory": advisory }))
        }
        PlanAction::MonthlyReview => {
            let actuals = request.monthly_actuals.unwrap_or_default();
            let session = state.engine.monthly_review(key, actuals).await?;
            Ok(json!({
                "review": session.review_summary,
                "phase": session.phase,
            }))
        }
    }
}

/// POST /api/targets
pub async fn handle_targets(State(state): State<AppState>, Json(request): Json<TargetsRequest>) -> Response {
    debug!(week = request.week_number, reps = request.targets.len(), "handle_targets: called");

    match store_targets(&state, request).await {
        Ok(result) => envelope_ok("set_weekly_targets", result),
        Err(e) => envelope_err("set_weekly_targets", e),
    }
}

async fn store_targets(state: &AppState, request: TargetsRequest) -> Result<Value, WorkflowError> {
    if request.targets.is_empty() {
        return Err(WorkflowError::InvalidRequest("no targets supplied".to_string()));
    }
    let created_by = request.created_by.unwrap_or_else(|| "system".to_string());

    let mut rows_written = 0;
    let mut reps = 0;
    for (employee_id, submission) in &request.targets {
        let set = WeeklyTargetSet::from_submission(
            employee_id.clone(),
            submission,
            request.week_number,
            request.year,
            state.working_days,
            &created_by,
        )
        .ok_or_else(|| {
            WorkflowError::InvalidRequest(format!(
                "week {} of {} has no valid start date",
                request.week_number, request.year
            ))
        })?;

        rows_written += state.targets.submit_week(set).await.map_err(WorkflowError::from)?;
        reps += 1;
    }

    Ok(json!({
        "representatives": reps,
        "rows_written": rows_written,
        "week_number": request.week_number,
        "year": request.year,
    }))
}

/// Success envelope: result fields spread beside success/action/timestamp
fn envelope_ok(action: &str, result: Value) -> Response {
    let mut body = json!({
        "success": true,
        "action": action,
        "timestamp": Utc::now().to_rfc3339(),
    });
    if let (Some(target), Some(source)) = (body.as_object_mut(), result.as_object()) {
        for (k, v) in source {
            target.entry(k.clone()).or_insert_with(|| v.clone());
        }
    }
    (StatusCode::OK, Json(body)).into_response()
}

fn envelope_err(action: &str, error: WorkflowError) -> Response {
    warn!(action = %action, error = %error, "envelope_err: request failed");
    let body = json!({
        "success": false,
        "error": error.to_string(),
        "action": action,
        "timestamp": Utc::now().to_rfc3339(),
    });
    (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_request_minimal_generate() {
        let json = r#"{
            "action": "generate",
            "employee_id": "emp-42",
            "month": 6,
            "year": 2024,
            "territory_context": {"customers": []}
        }"#;
        let request: PlanRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.action, "generate");
        assert!(request.territory_context.is_some());
        assert!(request.week_number.is_none());
    }

    #[test]
    fn test_targets_request_shape() {
        let json = r#"{
            "week_number": 23,
            "year": 2024,
            "targets": {
                "emp-1": {"name": "A. Mehta", "total_visit_plan": 48, "total_revenue_target": 90000}
            }
        }"#;
        let request: TargetsRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.targets["emp-1"].total_visit_plan, 48);
        assert!(request.created_by.is_none());
    }

    #[test]
    fn test_envelope_merges_result() {
        let result = json!({"advisory": "keep pace", "success": "should not clobber"});
        let response = envelope_ok("update_daily", result);
        assert_eq!(response.status(), StatusCode::OK);
    }
}
