use async_trait::async_trait;
use chrono::{DateTime, Local, NaiveDate, Utc};
use std::sync::Arc;

use crate::error::TrackerError;
use crate::models::{AttendanceSummary, AttendedDay, CalendarSession, PrSummary, Workout};
use crate::services::{
    GoogleCalendarClient, WorkoutCalendarClient, ZenPlannerAttendanceClient, ZenPlannerPrClient,
};

#[async_trait]
pub trait AttendanceSource: Send + Sync {
    /// Full history from the configured start date
    async fn attendance(&self, today: NaiveDate) -> Result<AttendanceSummary, TrackerError>;

    /// Only the month containing `today`
    async fn current_month(&self, today: NaiveDate) -> Result<Vec<AttendedDay>, TrackerError>;
}

#[async_trait]
pub trait RecordSource: Send + Sync {
    async fn personal_records(&self) -> Result<PrSummary, TrackerError>;
}

#[async_trait]
pub trait CalendarSource: Send + Sync {
    /// Every booked session up to `now`
    async fn session_history(&self, now: DateTime<Utc>) -> Result<Vec<CalendarSession>, TrackerError>;

    async fn sessions_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<CalendarSession>, TrackerError>;

    async fn next_session(&self, now: DateTime<Utc>) -> Result<Option<CalendarSession>, TrackerError>;

    fn clear_cache(&self);
}

#[async_trait]
pub trait WorkoutSource: Send + Sync {
    async fn tomorrow_workout(
        &self,
        next_session: Option<&CalendarSession>,
        now: DateTime<Local>,
    ) -> Option<Workout>;
}

/// Upstream data the refresh coordinator pulls from
#[derive(Clone)]
pub struct Sources {
    pub attendance: Arc<dyn AttendanceSource>,
    pub records: Arc<dyn RecordSource>,
    pub calendar: Arc<dyn CalendarSource>,
    pub workouts: Arc<dyn WorkoutSource>,
}

#[async_trait]
impl AttendanceSource for ZenPlannerAttendanceClient {
    async fn attendance(&self, today: NaiveDate) -> Result<AttendanceSummary, TrackerError> {
        self.get_attendance_data(today).await
    }

    async fn current_month(&self, today: NaiveDate) -> Result<Vec<AttendedDay>, TrackerError> {
        self.get_current_month(today).await
    }
}

#[async_trait]
impl RecordSource for ZenPlannerPrClient {
    async fn personal_records(&self) -> Result<PrSummary, TrackerError> {
        self.get_formatted_prs().await
    }
}

#[async_trait]
impl CalendarSource for GoogleCalendarClient {
    async fn session_history(&self, now: DateTime<Utc>) -> Result<Vec<CalendarSession>, TrackerError> {
        self.get_calendar_events(now).await
    }

    async fn sessions_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<CalendarSession>, TrackerError> {
        self.get_events_between(start, end).await
    }

    async fn next_session(&self, now: DateTime<Utc>) -> Result<Option<CalendarSession>, TrackerError> {
        self.get_next_session(now).await
    }

    fn clear_cache(&self) {
        GoogleCalendarClient::clear_cache(self)
    }
}

#[async_trait]
impl WorkoutSource for WorkoutCalendarClient {
    async fn tomorrow_workout(
        &self,
        next_session: Option<&CalendarSession>,
        now: DateTime<Local>,
    ) -> Option<Workout> {
        self.get_tomorrow_workout(next_session, now).await
    }
}
