//! Performance snapshots supplied by callers alongside workflow actions
//!
//! These arrive from upstream reporting systems and are passed through to
//! the assistant mostly as-is, so every field is optional-with-default and
//! unknown keys are preserved in `extra`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Actuals for a completed week, used when revising the following week
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WeeklyActuals {
    pub visits_completed: u32,
    pub revenue_achieved: f64,
    pub conversion_rate: f64,
    pub missed_customers: Vec<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// End-of-day actuals for the lightweight daily update
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DailyActuals {
    pub date: String,
    pub visits_completed: u32,
    pub revenue_achieved: f64,
    pub notes: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// One week's line in the month-end rollup
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WeekActuals {
    pub week_number: u32,
    pub visits_completed: u32,
    pub revenue_achieved: f64,
}

/// Full-month actuals for the closing review
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MonthlyActuals {
    pub total_visits: u32,
    pub total_revenue: f64,
    pub conversion_rate: f64,
    pub weekly_breakdown: Vec<WeekActuals>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_weekly_actuals_preserves_unknown_keys() {
        let json = r#"{
            "visits_completed": 28,
            "revenue_achieved": 98500.0,
            "doctor_feedback": "positive on new SKU"
        }"#;
        let actuals: WeeklyActuals = serde_json::from_str(json).unwrap();
        assert_eq!(actuals.visits_completed, 28);
        assert_eq!(actuals.extra["doctor_feedback"], "positive on new SKU");

        let back = serde_json::to_value(&actuals).unwrap();
        assert_eq!(back["doctor_feedback"], "positive on new SKU");
    }

    #[test]
    fn test_defaults_on_empty_object() {
        let actuals: MonthlyActuals = serde_json::from_str("{}").unwrap();
        assert_eq!(actuals.total_visits, 0);
        assert!(actuals.weekly_breakdown.is_empty());
    }
}
