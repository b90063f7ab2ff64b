//! Prompt templates for the planning assistant
//!
//! Templates are rendered with handlebars. Each workflow action has its
//! own template and context struct; the rendered text is sent as the
//! message body (or as additional run instructions) on the thread.

use eyre::{Result, eyre};
use handlebars::Handlebars;
use serde::Serialize;
use tracing::debug;

use crate::domain::{
    DailyActuals, MonthlyActuals, SessionKey, TerritoryContext, WeeklyActuals, month_name,
    weeks_in_month,
};

const GENERATE_TEMPLATE: &str = r#"Create a monthly touring plan for {{employee_id}} covering {{month_name}} {{year}}.

Territory snapshot:
{{territory_json}}

The month has {{weeks}} weeks. Respond with a single JSON object and nothing else:
{
  "monthly_overview": {
    "target_revenue": <number>,
    "total_planned_visits": <number>,
    "nbd_visits_target": <number>,
    "total_working_days": <number>
  },
  "weekly_plans": [
    {
      "week_number": <1..{{weeks}}>,
      "start_date": "YYYY-MM-DD",
      "end_date": "YYYY-MM-DD",
      "target_visits": <number>,
      "target_revenue": <number>,
      "focus_areas": ["..."],
      "priority_customers": ["..."],
      "daily_plans": []
    }
  ]
}

Balance weekly targets against customer tiers and prior performance. Sundays are rest days."#;

const REVISE_TEMPLATE: &str = r#"Revise week {{week_number}} of the plan in this thread.

Reason: {{reason}}

Last week's actuals:
{{actuals_json}}

Respond with the FULL updated plan JSON in the same shape as before. Only week {{week_number}} and later weeks may change; completed weeks must be returned exactly as they were."#;

const DAILY_TEMPLATE: &str = r#"Daily log for {{date}}: {{visits_completed}} visits, revenue {{revenue_achieved}}.
{{#if notes}}Notes: {{notes}}{{/if}}

Reply with two or three sentences of guidance for tomorrow. Do not emit JSON."#;

const REVIEW_TEMPLATE: &str = r#"The month is over. Full actuals:
{{actuals_json}}

Respond with a single JSON object:
{
  "overall_grade": "<letter grade>",
  "target_attainment_percent": <number>,
  "highlights": ["..."],
  "shortfalls": ["..."],
  "recommendations_next_month": ["..."]
}"#;

#[derive(Debug, Serialize)]
struct GenerateContext<'a> {
    employee_id: &'a str,
    month_name: &'static str,
    year: i32,
    weeks: u32,
    territory_json: String,
}

#[derive(Debug, Serialize)]
struct ReviseContext<'a> {
    week_number: u32,
    reason: &'a str,
    actuals_json: String,
}

#[derive(Debug, Serialize)]
struct DailyContext<'a> {
    date: &'a str,
    visits_completed: u32,
    revenue_achieved: f64,
    notes: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct ReviewContext {
    actuals_json: String,
}

/// Renders workflow-action prompts from embedded templates
pub struct Prompts {
    hbs: Handlebars<'static>,
}

impl Prompts {
    pub fn new() -> Self {
        let mut hbs = Handlebars::new();
        // Prompts are plain text, not HTML; escaping would corrupt the
        // embedded JSON payloads and any quoted free text.
        hbs.register_escape_fn(handlebars::no_escape);
        Self { hbs }
    }

    pub fn generate(&self, key: &SessionKey, territory: &TerritoryContext) -> Result<String> {
        debug!(key = %key, "Prompts::generate: called");
        let context = GenerateContext {
            employee_id: &key.employee_id,
            month_name: month_name(key.month),
            year: key.year,
            weeks: weeks_in_month(key.month, key.year),
            territory_json: serde_json::to_string_pretty(territory)?,
        };
        self.render("generate", GENERATE_TEMPLATE, &context)
    }

    pub fn revise(&self, week_number: u32, actuals: &WeeklyActuals, reason: &str) -> Result<String> {
        debug!(week_number, "Prompts::revise: called");
        let context = ReviseContext {
            week_number,
            reason,
            actuals_json: serde_json::to_string_pretty(actuals)?,
        };
        self.render("revise", REVISE_TEMPLATE, &context)
    }

    pub fn daily(&self, actuals: &DailyActuals) -> Result<String> {
        let context = DailyContext {
            date: &actuals.date,
            visits_completed: actuals.visits_completed,
            revenue_achieved: actuals.revenue_achieved,
            notes: actuals.notes.as_deref(),
        };
        self.render("daily", DAILY_TEMPLATE, &context)
    }

    pub fn review(&self, actuals: &MonthlyActuals) -> Result<String> {
        let context = ReviewContext {
            actuals_json: serde_json::to_string_pretty(actuals)?,
        };
        self.render("review", REVIEW_TEMPLATE, &context)
    }

    fn render<T: Serialize>(&self, name: &str, template: &str, context: &T) -> Result<String> {
        self.hbs
            .render_template(template, context)
            .map_err(|e| eyre!("Failed to render template {}: {}", name, e))
    }
}

impl Default for Prompts {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_prompt_mentions_month_and_weeks() {
        let prompts = Prompts::new();
        let key = SessionKey::new("emp-42", 6, 2024);
        let rendered = prompts.generate(&key, &TerritoryContext::default()).unwrap();
        assert!(rendered.contains("June 2024"));
        assert!(rendered.contains("5 weeks"));
        assert!(rendered.contains("emp-42"));
    }

    #[test]
    fn test_daily_prompt_optional_notes() {
        let prompts = Prompts::new();
        let mut actuals = DailyActuals {
            date: "2024-06-05".to_string(),
            visits_completed: 9,
            revenue_achieved: 31_000.0,
            ..Default::default()
        };
        let without = prompts.daily(&actuals).unwrap();
        assert!(!without.contains("Notes:"));

        actuals.notes = Some("stockist visit ran long".to_string());
        let with = prompts.daily(&actuals).unwrap();
        assert!(with.contains("Notes: stockist visit ran long"));
    }

    #[test]
    fn test_revise_prompt_includes_actuals() {
        let prompts = Prompts::new();
        let actuals = WeeklyActuals {
            visits_completed: 22,
            revenue_achieved: 80_000.0,
            ..Default::default()
        };
        let rendered = prompts.revise(3, &actuals, "missed revenue target").unwrap();
        assert!(rendered.contains("week 3"));
        assert!(rendered.contains("missed revenue target"));
        assert!(rendered.contains("\"visits_completed\": 22"));
    }

    #[test]
    fn test_rendered_text_is_not_html_escaped() {
        let prompts = Prompts::new();
        let actuals = WeeklyActuals::default();
        let rendered = prompts
            .revise(2, &actuals, "lost C&F distributor, territory \"North\" split")
            .unwrap();
        assert!(rendered.contains("lost C&F distributor, territory \"North\" split"));
        assert!(!rendered.contains("&quot;"));
        assert!(!rendered.contains("&amp;"));
    }
}
