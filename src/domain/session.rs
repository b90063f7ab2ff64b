//! Planning session lifecycle
//!
//! A session tracks one representative's plan for one calendar month. The
//! phase machine is strict: every mutation goes through a method that
//! checks the current phase, so illegal transitions surface as errors
//! instead of silently corrupting state.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use crate::domain::{MonthlyPlan, now_ms, weeks_in_month};

/// Lifecycle phase of a planning session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlanPhase {
    #[default]
    Uninitialized,
    Active,
    Revising,
    UnderReview,
    Closed,
}

impl std::fmt::Display for PlanPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            PlanPhase::Uninitialized => "UNINITIALIZED",
            PlanPhase::Active => "ACTIVE",
            PlanPhase::Revising => "REVISING",
            PlanPhase::UnderReview => "UNDER_REVIEW",
            PlanPhase::Closed => "CLOSED",
        };
        write!(f, "{name}")
    }
}

/// Identifies one representative's plan for one month
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionKey {
    pub employee_id: String,
    pub month: u32,
    pub year: i32,
}

impl SessionKey {
    pub fn new(employee_id: impl Into<String>, month: u32, year: i32) -> Self {
        Self {
            employee_id: employee_id.into(),
            month,
            year,
        }
    }
}

impl std::fmt::Display for SessionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}-{:02}", self.employee_id, self.year, self.month)
    }
}

/// One accepted weekly revision
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevisionRecord {
    pub id: Uuid,
    pub week_number: u32,
    pub reason: String,
    pub performance_snapshot: Value,
    pub revised_at: i64,
}

impl RevisionRecord {
    pub fn new(week_number: u32, reason: impl Into<String>, performance_snapshot: Value) -> Self {
        Self {
            id: Uuid::now_v7(),
            week_number,
            reason: reason.into(),
            performance_snapshot,
            revised_at: now_ms(),
        }
    }
}

/// A representative's monthly planning session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanningSession {
    pub key: SessionKey,
    pub phase: PlanPhase,
    /// Conversation thread at the assistant provider; present in every
    /// phase except `Uninitialized`
    pub thread_handle: Option<String>,
    pub plan: Option<MonthlyPlan>,
    pub revision_history: Vec<RevisionRecord>,
    pub review_summary: Option<Value>,
    /// Bumped by the store on every successful write
    pub version: u64,
    pub created_at: i64,
    pub updated_at: i64,
}

impl PlanningSession {
    /// A freshly activated session with its thread and initial plan
    pub fn activate(key: SessionKey, thread_handle: String, plan: MonthlyPlan) -> Self {
        debug!(key = %key, "PlanningSession::activate: called");
        let now = now_ms();
        Self {
            key,
            phase: PlanPhase::Active,
            thread_handle: Some(thread_handle),
            plan: Some(plan),
            revision_history: Vec::new(),
            review_summary: None,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Maximum revisions this session may accumulate, one per week
    pub fn revision_cap(&self) -> usize {
        weeks_in_month(self.key.month, self.key.year) as usize
    }

    pub fn is_closed(&self) -> bool {
        self.phase == PlanPhase::Closed
    }

    /// Move into the transient `Revising` phase
    pub fn begin_revision(&mut self) -> Result<(), PhaseViolation> {
        self.transition(PlanPhase::Active, PlanPhase::Revising)
    }

    /// Commit a revised plan and return to `Active`
    pub fn complete_revision(&mut self, plan: MonthlyPlan, record: RevisionRecord) -> Result<(), PhaseViolation> {
        self.transition(PlanPhase::Revising, PlanPhase::Active)?;
        self.plan = Some(plan);
        self.revision_history.push(record);
        Ok(())
    }

    /// Abandon an in-flight revision, restoring `Active`
    pub fn abort_revision(&mut self) -> Result<(), PhaseViolation> {
        self.transition(PlanPhase::Revising, PlanPhase::Active)
    }

    /// Move into the transient `UnderReview` phase
    pub fn begin_review(&mut self) -> Result<(), PhaseViolation> {
        self.transition(PlanPhase::Active, PlanPhase::UnderReview)
    }

    /// Commit the review summary and close the session for good
    pub fn complete_review(&mut self, summary: Value) -> Result<(), PhaseViolation> {
        self.transition(PlanPhase::UnderReview, PlanPhase::Closed)?;
        self.review_summary = Some(summary);
        Ok(())
    }

    /// Abandon an in-flight review, restoring `Active`
    pub fn abort_review(&mut self) -> Result<(), PhaseViolation> {
        self.transition(PlanPhase::UnderReview, PlanPhase::Active)
    }

    fn transition(&mut self, from: PlanPhase, to: PlanPhase) -> Result<(), PhaseViolation> {
        if self.phase != from {
            return Err(PhaseViolation {
                current: self.phase,
                attempted: to,
            });
        }
        debug!(key = %self.key, from = %from, to = %to, "PlanningSession::transition: called");
        self.phase = to;
        self.updated_at = now_ms();
        Ok(())
    }
}

/// An attempted phase transition from the wrong starting phase
#[derive(Debug, Clone, Copy)]
pub struct PhaseViolation {
    pub current: PlanPhase,
    pub attempted: PlanPhase,
}

impl std::fmt::Display for PhaseViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "cannot enter {} from {}", self.attempted, self.current)
    }
}

impl std::error::Error for PhaseViolation {}
