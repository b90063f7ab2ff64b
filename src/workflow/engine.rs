//! WorkflowEngine - drives the planning session state machine
//!
//! Mutating actions follow one shape: take the session lease, persist the
//! transient phase, call the assistant, then either commit the outcome or
//! roll the phase back. The store's versioned writes back up the lease,
//! so even a second process racing on the same session cannot interleave
//! commits.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info, warn};

use super::{Lease, LeaseRegistry, PlanAction, WorkflowError};
use crate::assistant::PlanningClient;
use crate::domain::{
    DailyActuals, MonthlyActuals, MonthlyPlan, PlanPhase, PlanningSession, RevisionRecord,
    SessionKey, TerritoryContext, WeeklyActuals, area_coverage_plan, distribute_customers,
};
use crate::store::{Expected, SessionStore, StoreError};

pub struct WorkflowEngine {
    client: Arc<dyn PlanningClient>,
    store: Arc<dyn SessionStore>,
    leases: LeaseRegistry,
}

impl WorkflowEngine {
    pub fn new(client: Arc<dyn PlanningClient>, store: Arc<dyn SessionStore>) -> Self {
        Self {
            client,
            store,
            leases: LeaseRegistry::new(),
        }
    }

    /// Open a new session: create the assistant thread, merge the
    /// strategic framework with the algorithmic distribution, and persist
    /// the activated session. Nothing is written until the assistant
    /// succeeds, so a failed generate leaves no trace.
    pub async fn generate(
        &self,
        key: SessionKey,
        territory: TerritoryContext,
    ) -> Result<PlanningSession, WorkflowError> {
        info!(key = %key, customers = territory.customers.len(), "generate: called");
        validate_key(&key)?;
        let _lease = self.lease(&key)?;

        if let Some(existing) = self.store.get(&key).await? {
            if existing.is_closed() {
                return Err(WorkflowError::SessionClosed(key));
            }
            return Err(WorkflowError::IllegalPhaseTransition {
                phase: existing.phase,
                action: PlanAction::Generate,
            });
        }

        let draft = self.client.start_plan(&key, &territory).await?;

        let mut plan = draft.framework;
        plan.customer_visit_frequency = distribute_customers(&territory, key.month, key.year);
        plan.area_coverage_plan = area_coverage_plan(&territory, key.month, key.year);

        let session = PlanningSession::activate(key.clone(), draft.thread_handle, plan);
        let stored = self.store.put(session, Expected::Absent).await?;
        info!(key = %key, version = stored.version, "generate: session activated");
        Ok(stored)
    }

    /// Revise one week against the prior week's actuals. Completed weeks
    /// must come back from the assistant untouched; any drift rejects the
    /// revision and restores the previous plan.
    pub async fn revise_weekly(
        &self,
        key: SessionKey,
        week_number: u32,
        actuals: WeeklyActuals,
        reason: String,
    ) -> Result<PlanningSession, WorkflowError> {
        info!(key = %key, week_number, "revise_weekly: called");
        validate_key(&key)?;
        let _lease = self.lease(&key)?;

        let mut session = self.require_active(&key, PlanAction::ReviseWeekly).await?;
        let old_plan = session
            .plan
            .clone()
            .ok_or_else(|| corrupt(format!("session {key} has no plan")))?;
        let thread = session
            .thread_handle
            .clone()
            .ok_or_else(|| corrupt(format!("session {key} has no thread handle")))?;

        if session.revision_history.len() >= session.revision_cap() {
            return Err(WorkflowError::InvalidRevision(format!(
                "revision limit of {} reached for {}",
                session.revision_cap(),
                key
            )));
        }
        if old_plan.week(week_number).is_none() {
            return Err(WorkflowError::InvalidRevision(format!(
                "plan for {} has no week {}",
                key, week_number
            )));
        }

        // Persist the transient phase before calling out, so a concurrent
        // writer sees the session as busy even across processes
        let base_version = session.version;
        session
            .begin_revision()
            .map_err(|e| phase_error(e.current, PlanAction::ReviseWeekly))?;
        let mut session = self.store.put(session, Expected::Version(base_version)).await?;

        let revised = match self.client.revise_week(&thread, week_number, &actuals, &reason).await {
            Ok(revised) => revised,
            Err(e) => {
                self.rollback_revision(session).await;
                return Err(e.into());
            }
        };

        if let Err(e) = check_revision(&old_plan, &revised, week_number) {
            self.rollback_revision(session).await;
            return Err(e);
        }

        // The assistant only returns the framework; the distribution maps
        // carry over unchanged
        let mut plan = revised;
        plan.customer_visit_frequency = old_plan.customer_visit_frequency;
        plan.area_coverage_plan = old_plan.area_coverage_plan;

        let snapshot = serde_json::to_value(&actuals).unwrap_or(Value::Null);
        let record = RevisionRecord::new(week_number, reason, snapshot);
        let in_flight_version = session.version;
        session
            .complete_revision(plan, record)
            .map_err(|e| phase_error(e.current, PlanAction::ReviseWeekly))?;

        let stored = self.store.put(session, Expected::Version(in_flight_version)).await?;
        info!(key = %key, week_number, version = stored.version, "revise_weekly: committed");
        Ok(stored)
    }

    /// Log a day's actuals on the thread and return the assistant's
    /// advisory. Takes no lease and writes nothing; the plan is unchanged.
    pub async fn update_daily(
        &self,
        key: SessionKey,
        actuals: DailyActuals,
    ) -> Result<String, WorkflowError> {
        info!(key = %key, date = %actuals.date, "update_daily: called");
        validate_key(&key)?;

        let session = match self.store.get(&key).await? {
            Some(session) => session,
            None => {
                return Err(phase_error(PlanPhase::Uninitialized, PlanAction::UpdateDaily));
            }
        };
        if session.is_closed() {
            return Err(WorkflowError::SessionClosed(key));
        }
        let thread = session
            .thread_handle
            .ok_or_else(|| corrupt(format!("session {key} has no thread handle")))?;

        let advisory = self.client.update_daily(&thread, &actuals).await?;
        Ok(advisory)
    }

    /// Close out the month: the assistant grades the plan against the
    /// actuals, and the session moves to its terminal phase.
    pub async fn monthly_review(
        &self,
        key: SessionKey,
        actuals: MonthlyActuals,
    ) -> Result<PlanningSession, WorkflowError> {
        info!(key = %key, "monthly_review: called");
        validate_key(&key)?;
        let _lease = self.lease(&key)?;

        let mut session = self.require_active(&key, PlanAction::MonthlyReview).await?;
        let thread = session
            .thread_handle
            .clone()
            .ok_or_else(|| corrupt(format!("session {key} has no thread handle")))?;

        let base_version = session.version;
        session
            .begin_review()
            .map_err(|e| phase_error(e.current, PlanAction::MonthlyReview))?;
        let mut session = self.store.put(session, Expected::Version(base_version)).await?;

        let summary = match self.client.monthly_review(&thread, &actuals).await {
            Ok(summary) => summary,
            Err(e) => {
                self.rollback_review(session).await;
                return Err(e.into());
            }
        };

        let in_flight_version = session.version;
        session
            .complete_review(summary)
            .map_err(|e| phase_error(e.current, PlanAction::MonthlyReview))?;

        let stored = self.store.put(session, Expected::Version(in_flight_version)).await?;
        info!(key = %key, "monthly_review: session closed");
        Ok(stored)
    }

    /// Read-only view of a session
    pub async fn session(&self, key: &SessionKey) -> Result<Option<PlanningSession>, WorkflowError> {
        Ok(self.store.get(key).await?)
    }

    fn lease(&self, key: &SessionKey) -> Result<Lease, WorkflowError> {
        self.leases.acquire(key).ok_or_else(|| {
            WorkflowError::ConcurrencyConflict(format!("another operation holds the lease for {key}"))
        })
    }

    /// Load the session and insist it is Active
    async fn require_active(
        &self,
        key: &SessionKey,
        action: PlanAction,
    ) -> Result<PlanningSession, WorkflowError> {
        let session = match self.store.get(key).await? {
            Some(session) => session,
            None => return Err(phase_error(PlanPhase::Uninitialized, action)),
        };
        if session.is_closed() {
            return Err(WorkflowError::SessionClosed(key.clone()));
        }
        if session.phase != PlanPhase::Active {
            return Err(phase_error(session.phase, action));
        }
        Ok(session)
    }

    /// Restore Active after a failed revision. Losing the rollback write
    /// is logged but not surfaced; the caller already has the real error.
    async fn rollback_revision(&self, mut session: PlanningSession) {
        let version = session.version;
        if session.abort_revision().is_ok()
            && let Err(e) = self.store.put(session, Expected::Version(version)).await
        {
            warn!(error = %e, "rollback_revision: failed to restore phase");
        }
    }

    async fn rollback_review(&self, mut session: PlanningSession) {
        let version = session.version;
        if session.abort_review().is_ok()
            && let Err(e) = self.store.put(session, Expected::Version(version)).await
        {
            warn!(error = %e, "rollback_review: failed to restore phase");
        }
    }
}

fn validate_key(key: &SessionKey) -> Result<(), WorkflowError> {
    if key.employee_id.trim().is_empty() {
        return Err(WorkflowError::InvalidRequest("employee_id is empty".to_string()));
    }
    if !(1..=12).contains(&key.month) {
        return Err(WorkflowError::InvalidRequest(format!(
            "month {} is out of range",
            key.month
        )));
    }
    Ok(())
}

fn phase_error(phase: PlanPhase, action: PlanAction) -> WorkflowError {
    WorkflowError::IllegalPhaseTransition { phase, action }
}

fn corrupt(message: String) -> WorkflowError {
    WorkflowError::Storage(StoreError::Database(message))
}

/// A revision may only change the named week and later ones; every
/// completed week must come back identical.
fn check_revision(old: &MonthlyPlan, revised: &MonthlyPlan, week_number: u32) -> Result<(), WorkflowError> {
    if revised.week(week_number).is_none() {
        return Err(WorkflowError::MalformedResponse(format!(
            "revised plan is missing week {week_number}"
        )));
    }
    for week in 1..week_number {
        if old.week(week) != revised.week(week) {
            debug!(week, "check_revision: completed week drifted");
            return Err(WorkflowError::InvalidRevision(format!(
                "revision of week {week_number} modified completed week {week}"
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::WeeklyPlan;

    fn plan_with_weeks(n: u32) -> MonthlyPlan {
        MonthlyPlan {
            weekly_plans: (1..=n)
                .map(|week_number| WeeklyPlan {
                    week_number,
                    target_visits: 10 * week_number,
                    ..Default::default()
                })
                .collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_check_revision_accepts_untouched_history() {
        let old = plan_with_weeks(4);
        let mut revised = plan_with_weeks(4);
        revised.weekly_plans[2].target_visits = 99;
        assert!(check_revision(&old, &revised, 3).is_ok());
    }

    #[test]
    fn test_check_revision_rejects_history_drift() {
        let old = plan_with_weeks(4);
        let mut revised = plan_with_weeks(4);
        revised.weekly_plans[0].target_visits = 1;
        let err = check_revision(&old, &revised, 3).unwrap_err();
        assert!(matches!(err, WorkflowError::InvalidRevision(_)));
    }

    #[test]
    fn test_check_revision_rejects_missing_week() {
        let old = plan_with_weeks(4);
        let revised = plan_with_weeks(2);
        let err = check_revision(&old, &revised, 3).unwrap_err();
        assert!(matches!(err, WorkflowError::MalformedResponse(_)));
    }

    #[test]
    fn test_validate_key() {
        assert!(validate_key(&SessionKey::new("emp-1", 6, 2024)).is_ok());
        assert!(validate_key(&SessionKey::new("", 6, 2024)).is_err());
        assert!(validate_key(&SessionKey::new("emp-1", 0, 2024)).is_err());
        assert!(validate_key(&SessionKey::new("emp-1", 13, 2024)).is_err());
    }
}
