//! Weekly target distribution
//!
//! Splits a period revenue target evenly across working days. Each of the
//! total/nbd/crr components is divided and rounded independently, so the sum
//! of the daily shares may drift from the period total by up to
//! `working_days * 0.005` per component. That drift is accepted; no
//! remainder is folded into the last day.

use chrono::{Datelike, Days, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// A revenue figure split into total, new-business, and recurring components
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TargetBundle {
    pub total: f64,
    pub nbd: f64,
    pub crr: f64,
}

impl TargetBundle {
    pub fn new(total: f64, nbd: f64, crr: f64) -> Self {
        Self { total, nbd, crr }
    }
}

/// Visit counts split into total, new-business, and recurring components
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisitPlan {
    pub total: u32,
    pub nbd: u32,
    pub crr: u32,
}

/// One day's proportional share of a period target
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DailyShare {
    pub total: f64,
    pub nbd: f64,
    pub crr: f64,
}

/// Round to 2 decimal places, half away from zero (half-up for the
/// non-negative revenue figures handled here).
fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Split a period target into `working_days` equal daily shares.
///
/// Each component is divided and rounded to 2 dp independently.
pub fn distribute(target: &TargetBundle, working_days: u32) -> Vec<DailyShare> {
    debug!(?target, working_days, "distribute: called");
    if working_days == 0 {
        return Vec::new();
    }
    let n = working_days as f64;
    let share = DailyShare {
        total: round2(target.total / n),
        nbd: round2(target.nbd / n),
        crr: round2(target.crr / n),
    };
    vec![share; working_days as usize]
}

/// Monday that starts the given week of the year.
///
/// Day 1 of the year plus `(week - 1) * 7` days, rolled back to the
/// preceding Monday (a Sunday rolls back 6 days). This is the convention the
/// target submission flow has always used; it is close to but not strictly
/// ISO-8601 for week 1 of years that do not begin on a Monday.
pub fn week_start_date(year: i32, week: u32) -> Option<NaiveDate> {
    let jan1 = NaiveDate::from_ymd_opt(year, 1, 1)?;
    let anchor = jan1.checked_add_days(Days::new((week.checked_sub(1)? as u64) * 7))?;
    let back = match anchor.weekday() {
        Weekday::Mon => 0,
        Weekday::Sun => 6,
        other => other.num_days_from_monday() as u64,
    };
    anchor.checked_sub_days(Days::new(back))
}

/// Per-representative submission for one week, as received from the caller
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetSubmission {
    pub name: String,
    pub total_visit_plan: u32,
    pub nbd_visit_plan: u32,
    pub crr_visit_plan: u32,
    pub total_conversion_percent_plan: f64,
    pub nbd_conversion_percent_plan: f64,
    pub crr_conversion_percent_plan: f64,
    pub total_revenue_target: f64,
    pub nbd_revenue_target: f64,
    pub crr_revenue_target: f64,
}

/// A week's targets for one representative, with per-day derived rows.
///
/// Created once when targets are submitted; a correction is a fresh
/// submission overwriting the same `(employee, week, year)` key, never a
/// patch of an existing row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeeklyTargetSet {
    pub employee_id: String,
    pub rep_name: String,
    pub week_number: u32,
    pub week_year: i32,
    pub week_start_date: NaiveDate,
    pub week_end_date: NaiveDate,
    pub visit_plan: VisitPlan,
    pub conversion_percent_plan: TargetBundle,
    pub revenue_target: TargetBundle,
    pub daily: Vec<DailyTargetRow>,
}

/// One working day's row of a weekly target set
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyTargetRow {
    pub employee_id: String,
    pub rep_name: String,
    pub week_number: u32,
    pub week_year: i32,
    pub week_start_date: NaiveDate,
    pub week_end_date: NaiveDate,
    pub target_date: NaiveDate,
    pub total_visit_plan: u32,
    pub nbd_visit_plan: u32,
    pub crr_visit_plan: u32,
    pub total_conversion_percent_plan: f64,
    pub nbd_conversion_percent_plan: f64,
    pub crr_conversion_percent_plan: f64,
    pub total_revenue_target: f64,
    pub nbd_revenue_target: f64,
    pub crr_revenue_target: f64,
    pub per_day_revenue_total: f64,
    pub per_day_nbd_revenue: f64,
    pub per_day_crr_revenue: f64,
    pub created_by: String,
}

impl WeeklyTargetSet {
    /// Build a weekly target set from a submission, deriving one row per
    /// working day (Mon-Sat).
    pub fn from_submission(
        employee_id: impl Into<String>,
        submission: &TargetSubmission,
        week: u32,
        year: i32,
        working_days: u32,
        created_by: &str,
    ) -> Option<Self> {
        let employee_id = employee_id.into();
        debug!(%employee_id, week, year, working_days, "WeeklyTargetSet::from_submission: called");

        let start = week_start_date(year, week)?;
        let end = start.checked_add_days(Days::new(6))?;

        let revenue = TargetBundle::new(
            submission.total_revenue_target,
            submission.nbd_revenue_target,
            submission.crr_revenue_target,
        );
        let shares = distribute(&revenue, working_days);

        let daily = shares
            .iter()
            .enumerate()
            .filter_map(|(i, share)| {
                let target_date = start.checked_add_days(Days::new(i as u64))?;
                Some(DailyTargetRow {
                    employee_id: employee_id.clone(),
                    rep_name: submission.name.clone(),
                    week_number: week,
                    week_year: year,
                    week_start_date: start,
                    week_end_date: end,
                    target_date,
                    total_visit_plan: submission.total_visit_plan,
                    nbd_visit_plan: submission.nbd_visit_plan,
                    crr_visit_plan: submission.crr_visit_plan,
                    total_conversion_percent_plan: submission.total_conversion_percent_plan,
                    nbd_conversion_percent_plan: submission.nbd_conversion_percent_plan,
                    crr_conversion_percent_plan: submission.crr_conversion_percent_plan,
                    total_revenue_target: submission.total_revenue_target,
                    nbd_revenue_target: submission.nbd_revenue_target,
                    crr_revenue_target: submission.crr_revenue_target,
                    per_day_revenue_total: share.total,
                    per_day_nbd_revenue: share.nbd,
                    per_day_crr_revenue: share.crr,
                    created_by: created_by.to_string(),
                })
            })
            .collect();

        Some(Self {
            employee_id,
            rep_name: submission.name.clone(),
            week_number: week,
            week_year: year,
            week_start_date: start,
            week_end_date: end,
            visit_plan: VisitPlan {
                total: submission.total_visit_plan,
                nbd: submission.nbd_visit_plan,
                crr: submission.crr_visit_plan,
            },
            conversion_percent_plan: TargetBundle::new(
                submission.total_conversion_percent_plan,
                submission.nbd_conversion_percent_plan,
                submission.crr_conversion_percent_plan,
            ),
            revenue_target: revenue,
            daily,
        })
    }
}
