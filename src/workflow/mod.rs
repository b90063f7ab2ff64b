//! Monthly planning workflow
//!
//! The engine drives the session state machine: one lease per session,
//! transient phases persisted before the assistant call, rollback on
//! failure, and a single versioned write to commit the outcome.

mod engine;
mod error;
mod lease;

pub use engine::WorkflowEngine;
pub use error::WorkflowError;
pub use lease::{Lease, LeaseRegistry};

use serde::{Deserialize, Serialize};

/// The four workflow actions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanAction {
    Generate,
    ReviseWeekly,
    UpdateDaily,
    MonthlyReview,
}

impl PlanAction {
    /// Wire name, as it appears in requests and response envelopes
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanAction::Generate => "generate",
            PlanAction::ReviseWeekly => "revise_weekly",
            PlanAction::UpdateDaily => "update_daily",
            PlanAction::MonthlyReview => "monthly_review",
        }
    }
}

impl std::str::FromStr for PlanAction {
    type Err = WorkflowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "generate" => Ok(PlanAction::Generate),
            "revise_weekly" => Ok(PlanAction::ReviseWeekly),
            "update_daily" => Ok(PlanAction::UpdateDaily),
            "monthly_review" => Ok(PlanAction::MonthlyReview),
            other => Err(WorkflowError::UnknownAction(other.to_string())),
        }
    }
}

impl std::fmt::Display for PlanAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_action_wire_names_round_trip() {
        for action in [
            PlanAction::Generate,
            PlanAction::ReviseWeekly,
            PlanAction::UpdateDaily,
            PlanAction::MonthlyReview,
        ] {
            assert_eq!(PlanAction::from_str(action.as_str()).unwrap(), action);
        }
    }

    #[test]
    fn test_unknown_action() {
        let err = PlanAction::from_str("delete_everything").unwrap_err();
        assert!(matches!(err, WorkflowError::UnknownAction(_)));
    }
}
