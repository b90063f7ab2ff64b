//! Domain types for the touring-plan workflow
//!
//! Pure data and calculators: planning sessions, monthly plans, actual
//! performance snapshots, weekly target distribution, and the algorithmic
//! customer distribution that complements the assistant's strategic
//! framework.

use chrono::{Datelike, NaiveDate, Utc};

mod distribution;
mod performance;
mod plan;
mod session;
mod targets;

pub use distribution::{
    area_coverage_plan, distribute_customers, month_working_dates, priority_score,
};
pub use performance::{DailyActuals, MonthlyActuals, WeekActuals, WeeklyActuals};
pub(crate) use plan::extract_json_object;
pub use plan::{
    AreaCoverage, Customer, CustomerVisitPlan, MonthlyOverview, MonthlyPlan, TerritoryContext,
    Tier, WeeklyPlan,
};
pub use session::{PlanPhase, PlanningSession, RevisionRecord, SessionKey};
pub use targets::{
    DailyShare, DailyTargetRow, TargetBundle, TargetSubmission, VisitPlan, WeeklyTargetSet,
    distribute, week_start_date,
};

/// Current time as Unix milliseconds
pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// Number of days in a calendar month, or 0 for an invalid month
pub fn days_in_month(month: u32, year: i32) -> u32 {
    let Some(first) = NaiveDate::from_ymd_opt(year, month, 1) else {
        return 0;
    };
    let next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    };
    match next {
        Some(next) => next.signed_duration_since(first).num_days() as u32,
        None => 0,
    }
}

/// Number of (possibly partial) weeks covering a calendar month.
///
/// Caps the revision history: one revision per week, at most 5.
pub fn weeks_in_month(month: u32, year: i32) -> u32 {
    days_in_month(month, year).div_ceil(7)
}

/// Month number to English name (1-based)
pub fn month_name(month: u32) -> &'static str {
    const NAMES: [&str; 12] = [
        "January",
        "February",
        "March",
        "April",
        "May",
        "June",
        "July",
        "August",
        "September",
        "October",
        "November",
        "December",
    ];
    NAMES
        .get(month.saturating_sub(1) as usize)
        .copied()
        .unwrap_or("Unknown")
}

/// First day of a calendar month
pub fn first_of_month(month: u32, year: i32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month, 1)
}

/// True if the date falls on a Sunday (the non-working day)
pub fn is_rest_day(date: NaiveDate) -> bool {
    date.weekday() == chrono::Weekday::Sun
}
