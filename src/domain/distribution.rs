//! Algorithmic customer and area distribution
//!
//! The assistant supplies the strategic framework; visit scheduling is
//! deterministic and computed here. Every customer in the territory gets
//! tier-frequency visits on dates spread across the month's working days,
//! in descending priority order.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use tracing::debug;

use crate::domain::{
    AreaCoverage, Customer, CustomerVisitPlan, TerritoryContext, days_in_month, first_of_month,
    is_rest_day, weeks_in_month,
};

/// All working dates in a month (Sundays excluded), ascending
pub fn month_working_dates(month: u32, year: i32) -> Vec<NaiveDate> {
    let Some(first) = first_of_month(month, year) else {
        return Vec::new();
    };
    let days = days_in_month(month, year);
    (0..days)
        .filter_map(|offset| first.checked_add_days(chrono::Days::new(offset as u64)))
        .filter(|date| !is_rest_day(*date))
        .collect()
}

/// Priority score for visit ordering; higher visits sooner
pub fn priority_score(customer: &Customer) -> f64 {
    let mut score = customer.tier_level.base_score() + customer.tier_score;
    if customer.days_since_last_visit > 30 {
        score += 20.0;
    } else if customer.days_since_last_visit > 14 {
        score += 10.0;
    }
    score + customer.total_sales_90d / 1000.0
}

/// Plan tier-frequency visits for every customer across the month's
/// working dates, highest priority first.
pub fn distribute_customers(
    territory: &TerritoryContext,
    month: u32,
    year: i32,
) -> BTreeMap<String, CustomerVisitPlan> {
    debug!(
        customers = territory.customers.len(),
        month, year, "distribute_customers: called"
    );
    let working = month_working_dates(month, year);
    if working.is_empty() {
        return BTreeMap::new();
    }

    let mut ranked: Vec<&Customer> = territory.customers.iter().collect();
    ranked.sort_by(|a, b| {
        priority_score(b)
            .partial_cmp(&priority_score(a))
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut plans = BTreeMap::new();
    for (rank, customer) in ranked.iter().enumerate() {
        let visits = customer.tier_level.monthly_visit_frequency();
        let stride = (working.len() / visits as usize).max(1);
        let start = rank % stride;
        let recommended_dates: Vec<String> = (0..visits as usize)
            .map(|i| (start + i * stride).min(working.len() - 1))
            .map(|idx| working[idx].format("%Y-%m-%d").to_string())
            .collect();

        let recency = if customer.days_since_last_visit > 30 {
            ", overdue"
        } else {
            ""
        };
        plans.insert(
            customer.customer_name.clone(),
            CustomerVisitPlan {
                tier: customer.tier_level,
                planned_visits: visits,
                recommended_dates,
                priority_reason: format!(
                    "{:?} tier, score {:.1}{recency}",
                    customer.tier_level,
                    priority_score(customer)
                ),
            },
        );
    }
    plans
}

fn efficiency_rating(total_customers: usize) -> &'static str {
    if total_customers >= 15 {
        "HIGH"
    } else if total_customers >= 8 {
        "MEDIUM"
    } else {
        "LOW"
    }
}

/// Per-area rollup: customer count, planned visits, focus weeks, and a
/// routing-efficiency rating by customer density.
pub fn area_coverage_plan(
    territory: &TerritoryContext,
    month: u32,
    year: i32,
) -> BTreeMap<String, AreaCoverage> {
    let weeks = weeks_in_month(month, year).max(1);

    let mut grouped: BTreeMap<String, Vec<&Customer>> = BTreeMap::new();
    for customer in &territory.customers {
        grouped
            .entry(customer.area_name.clone())
            .or_default()
            .push(customer);
    }

    // Densest areas claim the earliest focus weeks
    let mut ordered: Vec<(&String, &Vec<&Customer>)> = grouped.iter().collect();
    ordered.sort_by(|a, b| b.1.len().cmp(&a.1.len()).then_with(|| a.0.cmp(b.0)));

    let mut coverage = BTreeMap::new();
    for (slot, (area, customers)) in ordered.iter().enumerate() {
        let planned_visits: u32 = customers
            .iter()
            .map(|c| c.tier_level.monthly_visit_frequency())
            .sum();
        let rating = efficiency_rating(customers.len());

        let mut focus_weeks = vec![(slot as u32 % weeks) + 1];
        if rating == "HIGH" {
            let second = ((slot as u32 + weeks / 2) % weeks) + 1;
            if !focus_weeks.contains(&second) {
                focus_weeks.push(second);
            }
        }
        focus_weeks.sort_unstable();

        coverage.insert(
            (*area).clone(),
            AreaCoverage {
                total_customers: customers.len(),
                planned_visits,
                focus_weeks,
                efficiency_rating: rating.to_string(),
            },
        );
    }
    coverage
}
