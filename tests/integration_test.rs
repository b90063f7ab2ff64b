//! Integration tests for the planning workflow
//!
//! These drive the WorkflowEngine end to end with a scripted assistant
//! and the in-memory session store, covering the full session lifecycle
//! and its failure paths.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};

use tourplan::assistant::{AssistantError, PlanDraft, PlanningClient};
use tourplan::domain::{
    Customer, DailyActuals, MonthlyActuals, MonthlyPlan, PlanPhase, SessionKey, TerritoryContext,
    Tier, WeeklyActuals, WeeklyPlan,
};
use tourplan::store::{Expected, MemorySessionStore, SessionStore};
use tourplan::workflow::{WorkflowEngine, WorkflowError};

// =============================================================================
// Scripted assistant
// =============================================================================

/// What the mock should do when asked to revise
#[derive(Clone, Copy)]
enum ReviseScript {
    /// Return the base plan with only the named week changed
    Clean,
    /// Return a plan that also tampers with week 1
    TamperHistory,
    /// Fail with a service error
    Fail,
}

struct MockPlanningClient {
    revise_script: ReviseScript,
    fail_start: bool,
    revise_delay: Duration,
    revise_calls: AtomicUsize,
}

impl MockPlanningClient {
    fn new() -> Self {
        Self {
            revise_script: ReviseScript::Clean,
            fail_start: false,
            revise_delay: Duration::ZERO,
            revise_calls: AtomicUsize::new(0),
        }
    }

    fn with_revise(script: ReviseScript) -> Self {
        Self {
            revise_script: script,
            ..Self::new()
        }
    }
}

/// Five-week June 2024 framework, deterministic for comparisons
fn base_plan() -> MonthlyPlan {
    MonthlyPlan {
        weekly_plans: (1..=5)
            .map(|week_number| WeeklyPlan {
                week_number,
                start_date: format!("2024-06-{:02}", week_number * 7 - 6),
                target_visits: 24,
                target_revenue: 90_000.0,
                ..Default::default()
            })
            .collect(),
        ..Default::default()
    }
}

#[async_trait]
impl PlanningClient for MockPlanningClient {
    async fn start_plan(
        &self,
        _key: &SessionKey,
        _territory: &TerritoryContext,
    ) -> Result<PlanDraft, AssistantError> {
        if self.fail_start {
            return Err(AssistantError::ApiError {
                status: 503,
                message: "assistant overloaded".to_string(),
            });
        }
        Ok(PlanDraft {
            thread_handle: "thread_test".to_string(),
            framework: base_plan(),
        })
    }

    async fn revise_week(
        &self,
        _thread_handle: &str,
        week_number: u32,
        _actuals: &WeeklyActuals,
        _reason: &str,
    ) -> Result<MonthlyPlan, AssistantError> {
        self.revise_calls.fetch_add(1, Ordering::SeqCst);
        if !self.revise_delay.is_zero() {
            tokio::time::sleep(self.revise_delay).await;
        }
        match self.revise_script {
            ReviseScript::Fail => Err(AssistantError::Timeout(Duration::from_secs(120))),
            ReviseScript::Clean => {
                let mut plan = base_plan();
                if let Some(week) = plan.weekly_plans.iter_mut().find(|w| w.week_number == week_number) {
                    week.target_visits = 40;
                }
                Ok(plan)
            }
            ReviseScript::TamperHistory => {
                let mut plan = base_plan();
                plan.weekly_plans[0].target_visits = 1;
                Ok(plan)
            }
        }
    }

    async fn update_daily(
        &self,
        _thread_handle: &str,
        actuals: &DailyActuals,
    ) -> Result<String, AssistantError> {
        Ok(format!("{} visits logged; hold the pace tomorrow", actuals.visits_completed))
    }

    async fn monthly_review(
        &self,
        _thread_handle: &str,
        _actuals: &MonthlyActuals,
    ) -> Result<Value, AssistantError> {
        Ok(json!({"overall_grade": "B+", "target_attainment_percent": 92}))
    }
}

// =============================================================================
// Fixtures
// =============================================================================

fn june() -> SessionKey {
    SessionKey::new("emp-42", 6, 2024)
}

fn territory() -> TerritoryContext {
    TerritoryContext {
        customers: vec![
            Customer {
                customer_name: "Apex Pharma".to_string(),
                area_name: "Andheri".to_string(),
                tier_level: Tier::Performer,
                days_since_last_visit: 35,
                total_sales_90d: 60_000.0,
                ..Default::default()
            },
            Customer {
                customer_name: "Citra Care".to_string(),
                area_name: "Bandra".to_string(),
                tier_level: Tier::Prospect,
                ..Default::default()
            },
        ],
        previous_performance: None,
    }
}

fn engine(client: MockPlanningClient) -> (Arc<WorkflowEngine>, Arc<MemorySessionStore>) {
    let store = Arc::new(MemorySessionStore::new());
    let engine = Arc::new(WorkflowEngine::new(
        Arc::new(client),
        store.clone() as Arc<dyn SessionStore>,
    ));
    (engine, store)
}

// =============================================================================
// Generate
// =============================================================================

#[tokio::test]
async fn test_generate_activates_session_with_merged_plan() {
    let (engine, _) = engine(MockPlanningClient::new());

    let session = engine.generate(june(), territory()).await.unwrap();
    assert_eq!(session.phase, PlanPhase::Active);
    assert_eq!(session.thread_handle.as_deref(), Some("thread_test"));
    assert_eq!(session.version, 1);

    let plan = session.plan.unwrap();
    assert_eq!(plan.weekly_plans.len(), 5);
    // Algorithmic distribution merged in beside the framework
    assert_eq!(plan.customer_visit_frequency["Apex Pharma"].planned_visits, 3);
    assert_eq!(plan.customer_visit_frequency["Citra Care"].planned_visits, 1);
    assert_eq!(plan.area_coverage_plan["Andheri"].total_customers, 1);
}

#[tokio::test]
async fn test_generate_failure_persists_nothing() {
    let mut client = MockPlanningClient::new();
    client.fail_start = true;
    let (engine, store) = engine(client);

    let err = engine.generate(june(), territory()).await.unwrap_err();
    assert!(matches!(err, WorkflowError::ServiceUnavailable(_)));
    assert!(store.get(&june()).await.unwrap().is_none());
}

#[tokio::test]
async fn test_generate_twice_is_illegal() {
    let (engine, _) = engine(MockPlanningClient::new());
    engine.generate(june(), territory()).await.unwrap();

    let err = engine.generate(june(), territory()).await.unwrap_err();
    match err {
        WorkflowError::IllegalPhaseTransition { phase, .. } => assert_eq!(phase, PlanPhase::Active),
        other => panic!("expected IllegalPhaseTransition, got {other:?}"),
    }
}

#[tokio::test]
async fn test_bad_month_rejected() {
    let (engine, _) = engine(MockPlanningClient::new());
    let err = engine
        .generate(SessionKey::new("emp-42", 13, 2024), territory())
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::InvalidRequest(_)));
}

// =============================================================================
// Revise
// =============================================================================

#[tokio::test]
async fn test_revise_commits_and_keeps_history() {
    let (engine, _) = engine(MockPlanningClient::new());
    let before = engine.generate(june(), territory()).await.unwrap();

    let actuals = WeeklyActuals {
        visits_completed: 19,
        revenue_achieved: 61_000.0,
        ..Default::default()
    };
    let session = engine
        .revise_weekly(june(), 2, actuals, "monsoon slowdown".to_string())
        .await
        .unwrap();

    assert_eq!(session.phase, PlanPhase::Active);
    assert_eq!(session.revision_history.len(), 1);
    assert_eq!(session.revision_history[0].week_number, 2);
    assert!(session.version > before.version);

    let plan = session.plan.unwrap();
    assert_eq!(plan.week(2).unwrap().target_visits, 40);
    // Completed week untouched, distribution maps carried over
    assert_eq!(plan.week(1).unwrap().target_visits, 24);
    assert!(!plan.customer_visit_frequency.is_empty());
}

#[tokio::test]
async fn test_revise_rejects_history_tampering() {
    let (engine, store) = engine(MockPlanningClient::with_revise(ReviseScript::TamperHistory));
    engine.generate(june(), territory()).await.unwrap();

    let err = engine
        .revise_weekly(june(), 3, WeeklyActuals::default(), "test".to_string())
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::InvalidRevision(_)));

    // Rolled back: Active again, plan unchanged, no revision recorded
    let session = store.get(&june()).await.unwrap().unwrap();
    assert_eq!(session.phase, PlanPhase::Active);
    assert!(session.revision_history.is_empty());
    assert_eq!(session.plan.unwrap().week(1).unwrap().target_visits, 24);
}

#[tokio::test]
async fn test_revise_rolls_back_on_assistant_failure() {
    let (engine, store) = engine(MockPlanningClient::with_revise(ReviseScript::Fail));
    engine.generate(june(), territory()).await.unwrap();

    let err = engine
        .revise_weekly(june(), 2, WeeklyActuals::default(), "test".to_string())
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::ServiceTimeout(_)));

    let session = store.get(&june()).await.unwrap().unwrap();
    assert_eq!(session.phase, PlanPhase::Active);
    assert!(session.revision_history.is_empty());
}

#[tokio::test]
async fn test_revise_unknown_week_rejected() {
    let (engine, _) = engine(MockPlanningClient::new());
    engine.generate(june(), territory()).await.unwrap();

    let err = engine
        .revise_weekly(june(), 9, WeeklyActuals::default(), "test".to_string())
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::InvalidRevision(_)));
}

#[tokio::test]
async fn test_revise_before_generate_is_illegal() {
    let (engine, _) = engine(MockPlanningClient::new());
    let err = engine
        .revise_weekly(june(), 2, WeeklyActuals::default(), "test".to_string())
        .await
        .unwrap_err();
    match err {
        WorkflowError::IllegalPhaseTransition { phase, .. } => {
            assert_eq!(phase, PlanPhase::Uninitialized);
        }
        other => panic!("expected IllegalPhaseTransition, got {other:?}"),
    }
}

#[tokio::test]
async fn test_revision_cap_enforced() {
    let (engine, _) = engine(MockPlanningClient::new());
    engine.generate(june(), territory()).await.unwrap();

    // June 2024 spans five weeks; the sixth revision must be refused
    for _ in 0..5 {
        engine
            .revise_weekly(june(), 1, WeeklyActuals::default(), "catch-up".to_string())
            .await
            .unwrap();
    }
    let err = engine
        .revise_weekly(june(), 1, WeeklyActuals::default(), "one too many".to_string())
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::InvalidRevision(_)));
}

#[tokio::test]
async fn test_concurrent_revisions_one_loses() {
    let mut client = MockPlanningClient::new();
    client.revise_delay = Duration::from_millis(200);
    let (engine, _) = engine(client);
    engine.generate(june(), territory()).await.unwrap();

    let first = {
        let engine = engine.clone();
        tokio::spawn(async move {
            engine
                .revise_weekly(june(), 2, WeeklyActuals::default(), "a".to_string())
                .await
        })
    };
    // Let the first task take the lease before the second starts
    tokio::time::sleep(Duration::from_millis(50)).await;
    let second = engine
        .revise_weekly(june(), 3, WeeklyActuals::default(), "b".to_string())
        .await;

    assert!(matches!(second, Err(WorkflowError::ConcurrencyConflict(_))));
    let first = first.await.unwrap().unwrap();
    assert_eq!(first.revision_history.len(), 1);
}

// =============================================================================
// Daily update
// =============================================================================

#[tokio::test]
async fn test_update_daily_is_non_mutating() {
    let (engine, store) = engine(MockPlanningClient::new());
    let session = engine.generate(june(), territory()).await.unwrap();

    let advisory = engine
        .update_daily(
            june(),
            DailyActuals {
                date: "2024-06-05".to_string(),
                visits_completed: 9,
                revenue_achieved: 28_000.0,
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert!(advisory.contains("9 visits"));

    // Nothing changed in the store
    let after = store.get(&june()).await.unwrap().unwrap();
    assert_eq!(after.version, session.version);
    assert_eq!(after.updated_at, session.updated_at);
}

#[tokio::test]
async fn test_update_daily_requires_session() {
    let (engine, _) = engine(MockPlanningClient::new());
    let err = engine.update_daily(june(), DailyActuals::default()).await.unwrap_err();
    assert!(matches!(err, WorkflowError::IllegalPhaseTransition { .. }));
}

// Daily logging takes no lease and mutates nothing, so it stays legal while
// a revision is in flight; only a closed (or missing) session refuses it.
#[tokio::test]
async fn test_update_daily_allowed_while_revising() {
    let (engine, store) = engine(MockPlanningClient::new());
    engine.generate(june(), territory()).await.unwrap();

    let mut session = store.get(&june()).await.unwrap().unwrap();
    let version = session.version;
    session.phase = PlanPhase::Revising;
    store.put(session, Expected::Version(version)).await.unwrap();

    let advisory = engine
        .update_daily(
            june(),
            DailyActuals {
                date: "2024-06-12".to_string(),
                visits_completed: 7,
                revenue_achieved: 21_000.0,
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert!(advisory.contains("7 visits"));

    let after = store.get(&june()).await.unwrap().unwrap();
    assert_eq!(after.phase, PlanPhase::Revising);
}

// =============================================================================
// Monthly review
// =============================================================================

#[tokio::test]
async fn test_review_closes_session_for_good() {
    let (engine, _) = engine(MockPlanningClient::new());
    engine.generate(june(), territory()).await.unwrap();

    let session = engine
        .monthly_review(june(), MonthlyActuals::default())
        .await
        .unwrap();
    assert_eq!(session.phase, PlanPhase::Closed);
    assert_eq!(session.review_summary.as_ref().unwrap()["overall_grade"], "B+");

    // Every subsequent action is refused
    let err = engine
        .revise_weekly(june(), 2, WeeklyActuals::default(), "late".to_string())
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::SessionClosed(_)));

    let err = engine.update_daily(june(), DailyActuals::default()).await.unwrap_err();
    assert!(matches!(err, WorkflowError::SessionClosed(_)));

    let err = engine.generate(june(), territory()).await.unwrap_err();
    assert!(matches!(err, WorkflowError::SessionClosed(_)));
}
