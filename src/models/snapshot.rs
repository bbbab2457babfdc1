use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

use super::{CalendarSession, PrSummary, Workout};
use crate::config::Payment;

/// Collection phase, persisted between restarts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    #[default]
    Init,
    HistoricalLoad,
    Incremental,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Init => "init",
            Phase::HistoricalLoad => "historical_load",
            Phase::Incremental => "incremental",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshKind {
    Scheduled,
    Manual,
}

/// Bookkeeping about the data collection itself
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CollectionStats {
    pub run_id: Option<Uuid>,
    pub current_phase: Phase,
    pub refresh_in_progress: bool,
    pub refresh_type: Option<RefreshKind>,
    pub refresh_start_time: Option<DateTime<Utc>>,
    pub last_refresh_completed: Option<DateTime<Utc>>,
    pub refresh_duration_secs: f64,
    pub refresh_success: Option<bool>,
    pub last_error: Option<String>,
    pub new_sessions_today: u32,
    pub update_streak: u32,
    pub total_items_processed: u32,
    pub total_sessions: u32,
}

/// What happened while counting calendar sessions per trainer
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CollectionReport {
    pub total_processed: u32,
    pub duplicates_skipped: u32,
    pub invalid_events: u32,
    pub unmatched_trainers: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainerStats {
    /// Session count per roster trainer (lower-cased name)
    pub sessions: BTreeMap<String, u32>,
    pub report: CollectionReport,
}

/// Derived membership cost figures
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostReport {
    /// Sum of recorded one-off payments
    pub total_paid: f64,
    pub payments: Vec<Payment>,
    pub monthly_cost: Option<f64>,
    pub start_date: NaiveDate,
    pub months_active: f64,
    /// `monthly_cost * months_active`, when a monthly fee is configured
    pub total_cost: Option<f64>,
    pub sessions_attended: u32,
    /// `None` without a monthly fee or before the first session
    pub cost_per_session: Option<f64>,
}

/// Everything one refresh produces; the sensors read from this
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackerSnapshot {
    pub trainer_sessions: BTreeMap<String, u32>,
    /// Per-trainer counts for the incremental window only
    pub recent_trainer_sessions: BTreeMap<String, u32>,
    pub collection_report: Option<CollectionReport>,
    pub zenplanner_sessions: Option<u32>,
    pub calendar_sessions: Option<u32>,
    pub total_sessions: u32,
    pub monthly_sessions: Option<u32>,
    pub last_session: Option<NaiveDate>,
    pub training_streak_weeks: Option<u32>,
    pub next_session: Option<CalendarSession>,
    pub prs: Option<PrSummary>,
    pub tomorrow_workout: Option<Workout>,
    pub cost: Option<CostReport>,
    pub collection_stats: CollectionStats,
    pub updated_at: Option<DateTime<Utc>>,
}

impl TrackerSnapshot {
    /// Fill values this refresh did not recompute from the previous snapshot
    pub fn carry_forward(&mut self, previous: &TrackerSnapshot) {
        if self.trainer_sessions.is_empty() {
            self.trainer_sessions = previous.trainer_sessions.clone();
        }
        if self.collection_report.is_none() {
            self.collection_report = previous.collection_report.clone();
        }
        if self.zenplanner_sessions.is_none() {
            self.zenplanner_sessions = previous.zenplanner_sessions;
        }
        if self.calendar_sessions.is_none() {
            self.calendar_sessions = previous.calendar_sessions;
        }
        if self.monthly_sessions.is_none() {
            self.monthly_sessions = previous.monthly_sessions;
        }
        if self.last_session.is_none() {
            self.last_session = previous.last_session;
        }
        if self.training_streak_weeks.is_none() {
            self.training_streak_weeks = previous.training_streak_weeks;
        }
        if self.prs.is_none() {
            self.prs = previous.prs.clone();
        }
        if self.cost.is_none() {
            self.cost = previous.cost.clone();
        }
    }
}
