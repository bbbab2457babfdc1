use chrono::{DateTime, Days, Local, NaiveTime, TimeZone, Utc};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::TrackerError;
use crate::models::{CalendarSession, Workout};
use crate::services::google_calendar_client::{GoogleCalendarClient, GoogleEvent};

/// Reads tomorrow's programming from the gym's public workout calendar
pub struct WorkoutCalendarClient {
    calendar: Arc<GoogleCalendarClient>,
    calendar_id: String,
}

impl WorkoutCalendarClient {
    pub fn new(calendar: Arc<GoogleCalendarClient>, calendar_id: String) -> Self {
        Self {
            calendar,
            calendar_id,
        }
    }

    /// Tomorrow's workout, only looked up when the next booked session is tomorrow.
    /// Any failure is logged and reported as no workout.
    pub async fn get_tomorrow_workout(
        &self,
        next_session: Option<&CalendarSession>,
        now: DateTime<Local>,
    ) -> Option<Workout> {
        let tomorrow = now.date_naive().checked_add_days(Days::new(1))?;
        let session_date = next_session?.parsed_date()?;
        if session_date != tomorrow {
            debug!("Next session is {}, not tomorrow; skipping workout lookup", session_date);
            return None;
        }

        match self.fetch_workout_events(now).await {
            Ok(events) => events.iter().find_map(parse_workout),
            Err(err) => {
                warn!("Workout calendar lookup failed: {}", err);
                None
            }
        }
    }

    async fn fetch_workout_events(&self, now: DateTime<Local>) -> Result<Vec<GoogleEvent>, TrackerError> {
        let tomorrow = now
            .date_naive()
            .checked_add_days(Days::new(1))
            .ok_or_else(|| TrackerError::Parse("date out of range".to_string()))?;
        let day_after = tomorrow
            .checked_add_days(Days::new(1))
            .ok_or_else(|| TrackerError::Parse("date out of range".to_string()))?;

        let start = local_midnight_utc(tomorrow)?;
        let end = local_midnight_utc(day_after)?;

        let events = self
            .calendar
            .get_events_for_calendar(&self.calendar_id, start, end)
            .await?;
        debug!("Workout calendar returned {} events for {}", events.len(), tomorrow);
        Ok(events)
    }
}

fn local_midnight_utc(date: chrono::NaiveDate) -> Result<DateTime<Utc>, TrackerError> {
    Local
        .from_local_datetime(&date.and_time(NaiveTime::MIN))
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| TrackerError::Parse(format!("no local midnight on {}", date)))
}

pub fn is_workout_summary(summary: &str) -> bool {
    summary.contains('|') && summary.contains("MEPs")
}

/// `SGT - Strength | Back Squat, Bench | MEPs - 45` into its three parts
pub fn parse_workout(event: &GoogleEvent) -> Option<Workout> {
    let summary = event.summary.as_deref()?;
    if !is_workout_summary(summary) {
        return None;
    }

    let parts: Vec<&str> = summary.split('|').map(str::trim).collect();
    let [kind, lifts, meps] = parts.as_slice() else {
        debug!("Workout summary does not have three parts: {}", summary);
        return None;
    };

    Some(Workout {
        kind: kind.replace("SGT -", "").trim().to_string(),
        lifts: lifts.to_string(),
        meps: meps.replace("MEPs -", "").trim().to_string(),
        raw_summary: summary.to_string(),
        created_by: event
            .creator
            .as_ref()
            .and_then(|creator| creator.email.clone())
            .unwrap_or_default(),
        last_updated: event.updated.clone(),
    })
}
