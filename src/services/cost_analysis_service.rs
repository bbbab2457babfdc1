use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde_json::{json, Value};

use crate::config::{BillingConfig, Payment};
use crate::models::CostReport;

const DAYS_PER_MONTH: f64 = 30.0;

pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// Sum of recorded payments, rounded to cents
pub fn total_paid(payments: &[Payment]) -> f64 {
    round_to(payments.iter().map(|payment| payment.amount).sum(), 2)
}

/// Thirty-day months since `start`, one decimal, never negative
pub fn months_active(start: NaiveDate, now: DateTime<Utc>) -> f64 {
    let started = start.and_time(NaiveTime::MIN).and_utc();
    let days = (now - started).num_seconds() as f64 / 86_400.0;
    round_to(days / DAYS_PER_MONTH, 1).max(0.0)
}

pub fn cost_per_session(total_cost: f64, sessions: u32) -> Option<f64> {
    if sessions == 0 {
        None
    } else {
        Some(round_to(total_cost / sessions as f64, 2))
    }
}

/// Cost figures for the membership, `None` when nothing about billing is configured
pub fn compute_cost_report(
    billing: &BillingConfig,
    fallback_start: NaiveDate,
    sessions_attended: u32,
    now: DateTime<Utc>,
) -> Option<CostReport> {
    if billing.monthly_cost.is_none() && billing.payments.is_empty() {
        return None;
    }

    let start_date = billing.start_date.unwrap_or(fallback_start);
    let months = months_active(start_date, now);
    let total_cost = billing
        .monthly_cost
        .map(|monthly| round_to(monthly * months, 2));

    Some(CostReport {
        total_paid: total_paid(&billing.payments),
        payments: billing.payments.clone(),
        monthly_cost: billing.monthly_cost,
        start_date,
        months_active: months,
        total_cost,
        sessions_attended,
        cost_per_session: total_cost.and_then(|total| cost_per_session(total, sessions_attended)),
    })
}

/// Summary published as the session metrics sensor state
pub fn session_metrics(report: Option<&CostReport>) -> Value {
    match report {
        Some(report) => json!({
            "sessions_attended": report.sessions_attended,
            "months_active": report.months_active,
            "total_cost": report.total_cost.unwrap_or(0.0),
            "actual_cost": report.cost_per_session.unwrap_or(0.0),
        }),
        None => json!({
            "sessions_attended": 0,
            "months_active": 0.0,
            "total_cost": 0.0,
            "actual_cost": 0.0,
        }),
    }
}
