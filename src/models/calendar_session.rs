use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

/// A training booking found on the member's Google Calendar
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarSession {
    pub date: String,
    pub time: String,
    pub subject: String,
    pub instructor: String,
    pub search_term: String,
    pub description: String,
    pub location: String,
    pub event_id: String,
}

impl CalendarSession {
    pub fn parsed_date(&self) -> Option<NaiveDate> {
        NaiveDate::parse_from_str(&self.date, "%Y-%m-%d").ok()
    }

    pub fn parsed_time(&self) -> Option<NaiveTime> {
        NaiveTime::parse_from_str(&self.time, "%H:%M").ok()
    }

    /// Key used to collapse the same booking found by several search terms
    pub fn slot_key(&self) -> String {
        format!("{}_{}", self.date, self.time)
    }

    pub fn display(&self) -> String {
        format!("{} {} with {}", self.date, self.time, self.instructor)
    }
}
