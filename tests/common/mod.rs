// Shared fakes and fixtures for integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Datelike, Local, NaiveDate, Utc};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

use fulcrum_tracker::config::{BillingConfig, TrackerConfig};
use fulcrum_tracker::error::TrackerError;
use fulcrum_tracker::models::{AttendanceSummary, AttendedDay, CalendarSession, PrSummary, Workout};
use fulcrum_tracker::services::sources::{
    AttendanceSource, CalendarSource, RecordSource, Sources, WorkoutSource,
};
use fulcrum_tracker::services::{CoordinatorSettings, RefreshCoordinator};
use fulcrum_tracker::storage::TrackerStore;

pub fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

pub fn session(date: &str, time: &str, instructor: &str) -> CalendarSession {
    CalendarSession {
        date: date.to_string(),
        time: time.to_string(),
        subject: "Fulcrum SGT".to_string(),
        instructor: instructor.to_string(),
        search_term: "Fulcrum".to_string(),
        description: format!("Instructor: {}", instructor),
        location: "Fulcrum Fitness".to_string(),
        event_id: format!("{}-{}", date, time),
    }
}

pub fn attendance(days: &[&str]) -> AttendanceSummary {
    AttendanceSummary {
        total_sessions: days.len() as u32,
        monthly_sessions: 0,
        last_session: days.iter().map(|d| date(d)).max(),
        sessions: days
            .iter()
            .map(|d| AttendedDay::new(date(d), false, false, String::new()))
            .collect(),
    }
}

#[derive(Default)]
pub struct FakeAttendance {
    pub summary: Mutex<Option<AttendanceSummary>>,
    pub delay: Mutex<Duration>,
    pub calls: AtomicU32,
    pub month_calls: AtomicU32,
}

#[async_trait]
impl AttendanceSource for FakeAttendance {
    async fn attendance(&self, _today: NaiveDate) -> Result<AttendanceSummary, TrackerError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.summary
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| TrackerError::Network("attendance page unavailable".to_string()))
    }

    async fn current_month(&self, today: NaiveDate) -> Result<Vec<AttendedDay>, TrackerError> {
        self.month_calls.fetch_add(1, Ordering::SeqCst);
        let summary = self
            .summary
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| TrackerError::Network("attendance page unavailable".to_string()))?;
        Ok(summary
            .sessions
            .into_iter()
            .filter(|day| day.date.year() == today.year() && day.date.month() == today.month())
            .collect())
    }
}

pub struct FakeRecords {
    pub summary: Mutex<Option<PrSummary>>,
}

impl Default for FakeRecords {
    fn default() -> Self {
        Self {
            summary: Mutex::new(Some(PrSummary::empty(&["back_squat".to_string()]))),
        }
    }
}

#[async_trait]
impl RecordSource for FakeRecords {
    async fn personal_records(&self) -> Result<PrSummary, TrackerError> {
        self.summary
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| TrackerError::ServerError("PR page unavailable".to_string()))
    }
}

#[derive(Default)]
pub struct FakeCalendar {
    pub history: Mutex<Vec<CalendarSession>>,
    pub recent: Mutex<Vec<CalendarSession>>,
    pub next: Mutex<Option<CalendarSession>>,
    pub fail: AtomicBool,
    pub history_calls: AtomicU32,
    pub window_calls: AtomicU32,
    pub cache_clears: AtomicU32,
}

impl FakeCalendar {
    fn check(&self) -> Result<(), TrackerError> {
        if self.fail.load(Ordering::SeqCst) {
            Err(TrackerError::CalendarFetch("calendar unavailable".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl CalendarSource for FakeCalendar {
    async fn session_history(&self, _now: DateTime<Utc>) -> Result<Vec<CalendarSession>, TrackerError> {
        self.history_calls.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        Ok(self.history.lock().unwrap().clone())
    }

    async fn sessions_between(
        &self,
        _start: DateTime<Utc>,
        _end: DateTime<Utc>,
    ) -> Result<Vec<CalendarSession>, TrackerError> {
        self.window_calls.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        Ok(self.recent.lock().unwrap().clone())
    }

    async fn next_session(&self, _now: DateTime<Utc>) -> Result<Option<CalendarSession>, TrackerError> {
        self.check()?;
        Ok(self.next.lock().unwrap().clone())
    }

    fn clear_cache(&self) {
        self.cache_clears.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Default)]
pub struct FakeWorkouts {
    pub workout: Mutex<Option<Workout>>,
}

#[async_trait]
impl WorkoutSource for FakeWorkouts {
    async fn tomorrow_workout(
        &self,
        next_session: Option<&CalendarSession>,
        _now: DateTime<Local>,
    ) -> Option<Workout> {
        next_session?;
        self.workout.lock().unwrap().clone()
    }
}

/// Fakes plus a temporary state file
pub struct Harness {
    pub attendance: Arc<FakeAttendance>,
    pub records: Arc<FakeRecords>,
    pub calendar: Arc<FakeCalendar>,
    pub workouts: Arc<FakeWorkouts>,
    pub dir: TempDir,
}

impl Harness {
    pub fn new() -> Self {
        Self {
            attendance: Arc::new(FakeAttendance::default()),
            records: Arc::new(FakeRecords::default()),
            calendar: Arc::new(FakeCalendar::default()),
            workouts: Arc::new(FakeWorkouts::default()),
            dir: TempDir::new().unwrap(),
        }
    }

    /// Two months of attendance and matching calendar bookings
    pub fn with_history() -> Self {
        let harness = Self::new();
        *harness.attendance.summary.lock().unwrap() = Some(attendance(&[
            "2024-02-05", "2024-02-07", "2024-02-12", "2024-03-04", "2024-03-06",
        ]));
        *harness.calendar.history.lock().unwrap() = vec![
            session("2024-02-05", "06:00", "Ash"),
            session("2024-02-07", "06:00", "Walter"),
            session("2024-02-12", "17:30", "Ash"),
            session("2024-03-04", "06:00", "Ash"),
            session("2024-03-06", "06:00", "Zed"),
        ];
        harness
    }

    pub fn state_path(&self) -> std::path::PathBuf {
        self.dir.path().join("state.json")
    }

    pub fn sources(&self) -> Sources {
        Sources {
            attendance: self.attendance.clone(),
            records: self.records.clone(),
            calendar: self.calendar.clone(),
            workouts: self.workouts.clone(),
        }
    }

    pub fn settings(&self) -> CoordinatorSettings {
        let mut config = TrackerConfig::default();
        config.trainers = vec!["ash".to_string(), "walter".to_string()];
        config.billing = BillingConfig {
            monthly_cost: Some(300.0),
            start_date: Some(date("2024-01-01")),
            payments: Vec::new(),
        };
        CoordinatorSettings::from_config(&config)
    }

    pub async fn store(&self) -> Arc<TrackerStore> {
        Arc::new(TrackerStore::load(self.state_path()).await)
    }

    pub async fn coordinator(&self) -> RefreshCoordinator {
        RefreshCoordinator::new(self.sources(), self.store().await, self.settings()).await
    }
}
