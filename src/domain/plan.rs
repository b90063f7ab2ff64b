//! Monthly plan document and territory input types
//!
//! The assistant returns the strategic framework (overview + weekly plans)
//! as JSON, frequently wrapped in markdown fences and with formatted
//! numbers. Parsing is deliberately lenient: fences are stripped, the text
//! is trimmed to its outermost braces, and numeric fields tolerate
//! currency symbols and thousands separators.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

/// Customer tier classification, highest-touch first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub enum Tier {
    #[serde(rename = "TIER_2_PERFORMER")]
    Performer,
    #[serde(rename = "TIER_3_DEVELOPER")]
    Developer,
    #[default]
    #[serde(rename = "TIER_4_PROSPECT")]
    Prospect,
}

impl Tier {
    /// Planned visits per month for this tier
    pub fn monthly_visit_frequency(&self) -> u32 {
        match self {
            Tier::Performer => 3,
            Tier::Developer => 2,
            Tier::Prospect => 1,
        }
    }

    /// Base priority score contribution
    pub fn base_score(&self) -> f64 {
        match self {
            Tier::Performer => 100.0,
            Tier::Developer => 75.0,
            Tier::Prospect => 50.0,
        }
    }
}

/// One customer in the representative's territory
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Customer {
    pub customer_name: String,
    pub area_name: String,
    pub tier_level: Tier,
    pub tier_score: f64,
    pub days_since_last_visit: u32,
    pub total_sales_90d: f64,
}

/// Prior-month performance summary supplied with the territory
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PreviousPerformance {
    pub total_visits: u32,
    pub total_revenue: f64,
    pub conversion_rate: f64,
}

/// Read-only territory input supplied by the caller at generate time
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TerritoryContext {
    pub customers: Vec<Customer>,
    pub previous_performance: Option<PreviousPerformance>,
}

impl TerritoryContext {
    /// Distinct area names, preserving first-seen order
    pub fn area_names(&self) -> Vec<String> {
        let mut seen = Vec::new();
        for customer in &self.customers {
            if !seen.contains(&customer.area_name) {
                seen.push(customer.area_name.clone());
            }
        }
        seen
    }

    /// Customer count per tier
    pub fn tier_summary(&self) -> BTreeMap<Tier, usize> {
        let mut summary = BTreeMap::new();
        for customer in &self.customers {
            *summary.entry(customer.tier_level).or_insert(0) += 1;
        }
        summary
    }
}

/// Month-level targets from the strategic framework
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonthlyOverview {
    pub target_revenue: f64,
    pub total_planned_visits: u32,
    pub nbd_visits_target: u32,
    pub total_working_days: u32,
}

/// One week of the monthly plan
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeeklyPlan {
    pub week_number: u32,
    pub start_date: String,
    pub end_date: String,
    pub target_visits: u32,
    pub target_revenue: f64,
    pub focus_areas: Vec<String>,
    pub priority_customers: Vec<String>,
    pub daily_plans: Vec<Value>,
}

/// Per-customer visit schedule, computed algorithmically
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CustomerVisitPlan {
    pub tier: Tier,
    pub planned_visits: u32,
    pub recommended_dates: Vec<String>,
    pub priority_reason: String,
}

/// Per-area coverage summary, computed algorithmically
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AreaCoverage {
    pub total_customers: usize,
    pub planned_visits: u32,
    pub focus_weeks: Vec<u32>,
    pub efficiency_rating: String,
}

/// The complete monthly plan: assistant framework plus algorithmic
/// customer and area distribution.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonthlyPlan {
    pub monthly_overview: MonthlyOverview,
    pub weekly_plans: Vec<WeeklyPlan>,
    pub customer_visit_frequency: BTreeMap<String, CustomerVisitPlan>,
    pub area_coverage_plan: BTreeMap<String, AreaCoverage>,
}

impl MonthlyPlan {
    /// Parse an assistant reply into the framework portion of a plan.
    ///
    /// Returns `None` when no JSON object can be recovered from the text.
    pub fn from_assistant_text(text: &str) -> Option<Self> {
        debug!(text_len = text.len(), "MonthlyPlan::from_assistant_text: called");
        let value = extract_json_object(text)?;
        Some(Self::from_framework_value(&value))
    }

    /// Build a plan from a parsed framework value, coercing sloppy fields
    pub fn from_framework_value(value: &Value) -> Self {
        let overview = value.get("monthly_overview");
        let monthly_overview = MonthlyOverview {
            target_revenue: coerce_f64(overview.and_then(|o| o.get("target_revenue"))),
            total_planned_visits: coerce_u32(overview.and_then(|o| o.get("total_planned_visits"))),
            nbd_visits_target: coerce_u32(overview.and_then(|o| o.get("nbd_visits_target"))),
            total_working_days: coerce_u32(overview.and_then(|o| o.get("total_working_days"))),
        };

        let weekly_plans = value
            .get("weekly_plans")
            .and_then(Value::as_array)
            .map(|weeks| weeks.iter().map(parse_weekly_plan).collect())
            .unwrap_or_default();

        Self {
            monthly_overview,
            weekly_plans,
            customer_visit_frequency: BTreeMap::new(),
            area_coverage_plan: BTreeMap::new(),
        }
    }

    /// The plan entry for a given week number, if present
    pub fn week(&self, week_number: u32) -> Option<&WeeklyPlan> {
        self.weekly_plans.iter().find(|w| w.week_number == week_number)
    }
}

fn parse_weekly_plan(value: &Value) -> WeeklyPlan {
    WeeklyPlan {
        week_number: coerce_u32(value.get("week_number")),
        start_date: coerce_date(value.get("start_date")),
        end_date: coerce_date(value.get("end_date")),
        target_visits: coerce_u32(value.get("target_visits")),
        target_revenue: coerce_f64(value.get("target_revenue")),
        focus_areas: coerce_string_array(value.get("focus_areas")),
        priority_customers: coerce_string_array(value.get("priority_customers")),
        daily_plans: value
            .get("daily_plans")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default(),
    }
}

/// Strip markdown fences and trim to the outermost `{...}` before parsing
pub(crate) fn extract_json_object(text: &str) -> Option<Value> {
    let cleaned = text.replace("```json", "").replace("```", "");
    let cleaned = cleaned.trim();
    let start = cleaned.find('{')?;
    let end = cleaned.rfind('}')?;
    if end < start {
        return None;
    }
    serde_json::from_str(&cleaned[start..=end]).ok()
}

/// Numeric coercion tolerating strings with currency symbols and commas
fn coerce_f64(value: Option<&Value>) -> f64 {
    match value {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => {
            let digits: String = s
                .chars()
                .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
                .collect();
            digits.parse().unwrap_or(0.0)
        }
        _ => 0.0,
    }
}

fn coerce_u32(value: Option<&Value>) -> u32 {
    let parsed = coerce_f64(value);
    if parsed.is_finite() && parsed > 0.0 {
        parsed.round() as u32
    } else {
        0
    }
}

fn coerce_string_array(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|v| v.as_str().map(String::from))
                .collect()
        })
        .unwrap_or_default()
}

/// Accept only `YYYY-MM-DD` strings; anything else becomes empty
fn coerce_date(value: Option<&Value>) -> String {
    let Some(Value::String(s)) = value else {
        return String::new();
    };
    let bytes = s.as_bytes();
    let shape_ok = bytes.len() == 10
        && bytes[4] == b'-'
        && bytes[7] == b'-'
        && bytes
            .iter()
            .enumerate()
            .all(|(i, b)| matches!(i, 4 | 7) || b.is_ascii_digit());
    if shape_ok { s.clone() } else { String::new() }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_json_object_strips_fences() {
        let text = "Here is your plan:\n```json\n{\"monthly_overview\": {\"target_revenue\": 5000}}\n```\nGood luck!";
        let value = extract_json_object(text).unwrap();
        assert_eq!(value["monthly_overview"]["target_revenue"], 5000);
    }

    #[test]
    fn test_extract_json_object_no_braces() {
        assert!(extract_json_object("no json here").is_none());
    }

    #[test]
    fn test_coerce_formatted_numbers() {
        let value = serde_json::json!("₹1,25,000.50");
        assert_eq!(coerce_f64(Some(&value)), 125000.50);

        let value = serde_json::json!("48 visits");
        assert_eq!(coerce_u32(Some(&value)), 48);

        assert_eq!(coerce_f64(None), 0.0);
    }

    #[test]
    fn test_coerce_date_shape() {
        assert_eq!(
            coerce_date(Some(&serde_json::json!("2024-06-03"))),
            "2024-06-03"
        );
        assert_eq!(coerce_date(Some(&serde_json::json!("June 3rd"))), "");
        assert_eq!(coerce_date(None), "");
    }

    #[test]
    fn test_from_assistant_text_full_framework() {
        let reply = r#"```json
{
  "monthly_overview": {
    "target_revenue": "450,000",
    "total_planned_visits": 120,
    "nbd_visits_target": "40",
    "total_working_days": 26
  },
  "weekly_plans": [
    {
      "week_number": 1,
      "start_date": "2024-06-03",
      "end_date": "2024-06-08",
      "target_visits": 30,
      "target_revenue": 112500,
      "focus_areas": ["Andheri", "Bandra"],
      "priority_customers": ["Apex Pharma"],
      "daily_plans": []
    },
    {
      "week_number": "2",
      "start_date": "bad date",
      "end_date": "2024-06-15",
      "target_visits": "30 visits",
      "target_revenue": "₹112,500"
    }
  ]
}
```"#;

        let plan = MonthlyPlan::from_assistant_text(reply).unwrap();
        assert_eq!(plan.monthly_overview.target_revenue, 450_000.0);
        assert_eq!(plan.monthly_overview.nbd_visits_target, 40);
        assert_eq!(plan.weekly_plans.len(), 2);

        let week2 = plan.week(2).unwrap();
        assert_eq!(week2.start_date, "");
        assert_eq!(week2.target_visits, 30);
        assert_eq!(week2.target_revenue, 112_500.0);
        assert!(week2.focus_areas.is_empty());
    }

    #[test]
    fn test_tier_frequencies() {
        assert_eq!(Tier::Performer.monthly_visit_frequency(), 3);
        assert_eq!(Tier::Developer.monthly_visit_frequency(), 2);
        assert_eq!(Tier::Prospect.monthly_visit_frequency(), 1);
    }

    #[test]
    fn test_territory_summaries() {
        let territory = TerritoryContext {
            customers: vec![
                Customer {
                    customer_name: "Apex Pharma".to_string(),
                    area_name: "Andheri".to_string(),
                    tier_level: Tier::Performer,
                    ..Default::default()
                },
                Customer {
                    customer_name: "Nova Labs".to_string(),
                    area_name: "Andheri".to_string(),
                    tier_level: Tier::Prospect,
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
        };

        assert_eq!(territory.area_names(), vec!["Andheri", "Bandra"]);
        let summary = territory.tier_summary();
        assert_eq!(summary[&Tier::Performer], 1);
        assert_eq!(summary[&Tier::Prospect], 2);
    }
}
