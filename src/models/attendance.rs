use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A day the member checked in at the gym, as reported by ZenPlanner
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttendedDay {
    pub date: NaiveDate,
    pub has_results: bool,
    /// Tagged as a personal record on the attendance calendar
    pub is_pr: bool,
    pub details: String,
    pub month_year: String,
}

impl AttendedDay {
    pub fn new(date: NaiveDate, has_results: bool, is_pr: bool, details: String) -> Self {
        Self {
            date,
            has_results,
            is_pr,
            details,
            month_year: date.format("%B %Y").to_string(),
        }
    }
}

/// Attendance history rolled up for the sensors
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AttendanceSummary {
    pub total_sessions: u32,
    pub monthly_sessions: u32,
    pub last_session: Option<NaiveDate>,
    pub sessions: Vec<AttendedDay>,
}

impl AttendanceSummary {
    pub fn pr_days(&self) -> usize {
        self.sessions.iter().filter(|day| day.is_pr).count()
    }
}
