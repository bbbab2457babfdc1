use chrono::{DateTime, Duration as ChronoDuration, Local, NaiveDate, Utc};
use serde_json::json;
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{Mutex, RwLock};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::{BillingConfig, TrackerConfig};
use crate::error::TrackerError;
use crate::models::{AttendanceSummary, AttendedDay, CollectionStats, Phase, RefreshKind, TrackerSnapshot};
use crate::services::aggregation_service::{reconcile_sessions, session_history, trainer_stats, training_streak_weeks};
use crate::services::cost_analysis_service::compute_cost_report;
use crate::services::sources::Sources;
use crate::services::zenplanner_attendance_client::summarize;
use crate::storage::{StoredState, TrackerStore};

/// Static inputs the coordinator needs besides its sources
#[derive(Debug, Clone)]
pub struct CoordinatorSettings {
    pub roster: Vec<String>,
    pub exercise_kinds: Vec<String>,
    pub billing: BillingConfig,
    pub history_start: NaiveDate,
    pub incremental_window: ChronoDuration,
}

impl CoordinatorSettings {
    pub fn from_config(config: &TrackerConfig) -> Self {
        Self {
            roster: config.trainer_roster(),
            exercise_kinds: config.exercise_kinds(),
            billing: config.billing.clone(),
            history_start: config.zenplanner.start_date,
            incremental_window: ChronoDuration::days(config.schedule.incremental_window_days),
        }
    }
}

struct RefreshOutcome {
    snapshot: TrackerSnapshot,
    items_processed: u32,
    new_sessions: u32,
}

/// Runs refreshes one at a time and publishes the latest snapshot
pub struct RefreshCoordinator {
    sources: Sources,
    store: Arc<TrackerStore>,
    settings: CoordinatorSettings,
    snapshot: RwLock<Option<TrackerSnapshot>>,
    stats: RwLock<CollectionStats>,
    refresh_lock: Mutex<()>,
}

impl RefreshCoordinator {
    /// Seeds the published snapshot from storage when history was already loaded
    pub async fn new(sources: Sources, store: Arc<TrackerStore>, settings: CoordinatorSettings) -> Self {
        let stored = store.state().await;
        let stats = CollectionStats {
            current_phase: stored.initialization_phase,
            total_sessions: stored.total_sessions,
            ..Default::default()
        };

        let snapshot = if stored.historical_load_done {
            info!(
                "Resuming with {} stored sessions in phase {}",
                stored.total_sessions, stored.initialization_phase
            );
            let today = Local::now().date_naive();
            let attendance = (!stored.attended_days.is_empty())
                .then(|| stored_attendance(&stored.attended_days, Vec::new(), today));
            Some(TrackerSnapshot {
                trainer_sessions: stored.trainer_sessions.clone(),
                total_sessions: stored.total_sessions,
                zenplanner_sessions: attendance.as_ref().map(|a| a.total_sessions),
                monthly_sessions: attendance.as_ref().map(|a| a.monthly_sessions),
                last_session: attendance.as_ref().and_then(|a| a.last_session),
                training_streak_weeks: attendance
                    .as_ref()
                    .map(|a| training_streak_weeks(&a.sessions, today)),
                cost: compute_cost_report(
                    &settings.billing,
                    settings.history_start,
                    stored.total_sessions,
                    Utc::now(),
                ),
                collection_stats: stats.clone(),
                updated_at: stored.last_update,
                ..Default::default()
            })
        } else {
            None
        };

        if let Err(err) = store.record_setup(Utc::now()).await {
            warn!("Failed to record setup time: {}", err);
        }

        Self {
            sources,
            store,
            settings,
            snapshot: RwLock::new(snapshot),
            stats: RwLock::new(stats),
            refresh_lock: Mutex::new(()),
        }
    }

    pub async fn snapshot(&self) -> Option<TrackerSnapshot> {
        self.snapshot.read().await.clone()
    }

    pub async fn collection_stats(&self) -> CollectionStats {
        self.stats.read().await.clone()
    }

    pub async fn storage_state(&self) -> StoredState {
        self.store.state().await
    }

    pub fn settings(&self) -> &CoordinatorSettings {
        &self.settings
    }

    /// Run one refresh. Fails with `RefreshInProgress` instead of queueing behind another.
    pub async fn refresh(&self, kind: RefreshKind) -> Result<CollectionStats, TrackerError> {
        let _guard = self.refresh_lock.try_lock().map_err(|_| {
            warn!("Skipping {:?} refresh, another refresh is running", kind);
            TrackerError::RefreshInProgress
        })?;

        if kind == RefreshKind::Manual {
            if let Err(err) = self
                .store
                .transition_phase(Phase::HistoricalLoad, json!({ "trigger": "manual_refresh" }))
                .await
            {
                warn!("Failed to record manual refresh: {}", err);
            }
            self.sources.calendar.clear_cache();
        }

        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let clock = Instant::now();
        {
            let mut stats = self.stats.write().await;
            stats.run_id = Some(run_id);
            stats.refresh_in_progress = true;
            stats.refresh_type = Some(kind);
            stats.refresh_start_time = Some(started_at);
        }
        info!("Starting {:?} refresh {}", kind, run_id);

        let result = self.run_refresh(kind, started_at).await;
        let phase = self.store.phase().await;

        let mut stats = self.stats.write().await;
        stats.refresh_in_progress = false;
        stats.refresh_duration_secs = clock.elapsed().as_secs_f64();
        stats.last_refresh_completed = Some(Utc::now());
        stats.current_phase = phase;

        match result {
            Ok(outcome) => {
                stats.refresh_success = Some(true);
                stats.last_error = None;
                stats.total_items_processed = outcome.items_processed;
                stats.total_sessions = outcome.snapshot.total_sessions;
                stats.new_sessions_today = outcome.new_sessions;
                if outcome.new_sessions > 0 {
                    stats.update_streak += 1;
                }

                let mut snapshot = outcome.snapshot;
                snapshot.collection_stats = stats.clone();
                *self.snapshot.write().await = Some(snapshot);

                info!(
                    "Refresh {} finished in {:.1}s: {} sessions, phase {}",
                    run_id, stats.refresh_duration_secs, stats.total_sessions, phase
                );
                Ok(stats.clone())
            }
            Err(err) => {
                stats.refresh_success = Some(false);
                stats.last_error = Some(err.to_string());
                stats.update_streak = 0;

                if let Some(snapshot) = self.snapshot.write().await.as_mut() {
                    snapshot.collection_stats = stats.clone();
                }

                error!("Refresh {} failed: {}", run_id, err);
                Err(err)
            }
        }
    }

    async fn run_refresh(
        &self,
        kind: RefreshKind,
        now: DateTime<Utc>,
    ) -> Result<RefreshOutcome, TrackerError> {
        let mut phase = self.store.phase().await;
        if phase == Phase::Init {
            self.store
                .transition_phase(
                    Phase::HistoricalLoad,
                    json!({ "trigger": "initial_setup", "start_time": now }),
                )
                .await?;
            phase = Phase::HistoricalLoad;
        }

        match phase {
            Phase::Incremental => self.incremental_update(now).await,
            _ => self.full_load(kind, now).await,
        }
    }

    async fn full_load(
        &self,
        kind: RefreshKind,
        now: DateTime<Utc>,
    ) -> Result<RefreshOutcome, TrackerError> {
        let local_now = now.with_timezone(&Local);
        let today = local_now.date_naive();
        info!("Loading full history since {}", self.settings.history_start);

        let (attendance, records, calendar_events, next_session) = tokio::join!(
            self.sources.attendance.attendance(today),
            self.sources.records.personal_records(),
            self.sources.calendar.session_history(now),
            self.sources.calendar.next_session(now),
        );
        let attendance = attendance?;
        let records = records?;
        let calendar_events = calendar_events?;
        let next_session = next_session.unwrap_or_else(|err| {
            warn!("Next session lookup failed: {}", err);
            None
        });

        if calendar_events.is_empty() {
            return Err(TrackerError::MissingData(format!(
                "no calendar sessions found ({} attended days)",
                attendance.total_sessions
            )));
        }

        let tomorrow_workout = self
            .sources
            .workouts
            .tomorrow_workout(next_session.as_ref(), local_now)
            .await;

        let trainers = trainer_stats(&calendar_events, &self.settings.roster);
        let calendar_count = calendar_events.len() as u32;
        let total_sessions = reconcile_sessions(attendance.total_sessions, calendar_count);

        self.store.update_session_count(total_sessions).await?;
        self.store
            .update_trainer_sessions(trainers.sessions.clone())
            .await?;
        self.store
            .update_attended_days(attendance.sessions.iter().map(|day| day.date).collect())
            .await?;
        self.store.record_update(now).await?;

        // Manual refreshes reload everything but leave the phase for the scheduler to finish
        if kind == RefreshKind::Scheduled {
            self.store
                .mark_historical_load_complete(
                    total_sessions,
                    json!({
                        "total_sessions": total_sessions,
                        "trainer_count": trainers.sessions.len(),
                        "completion_time": now,
                    }),
                )
                .await?;
        }

        let snapshot = TrackerSnapshot {
            trainer_sessions: trainers.sessions,
            collection_report: Some(trainers.report),
            zenplanner_sessions: Some(attendance.total_sessions),
            calendar_sessions: Some(calendar_count),
            total_sessions,
            monthly_sessions: Some(attendance.monthly_sessions),
            last_session: attendance.last_session,
            training_streak_weeks: Some(training_streak_weeks(&attendance.sessions, today)),
            next_session,
            prs: Some(records),
            tomorrow_workout,
            cost: compute_cost_report(
                &self.settings.billing,
                self.settings.history_start,
                total_sessions,
                now,
            ),
            updated_at: Some(now),
            ..Default::default()
        };

        Ok(RefreshOutcome {
            snapshot,
            items_processed: total_sessions,
            new_sessions: 0,
        })
    }

    async fn incremental_update(&self, now: DateTime<Utc>) -> Result<RefreshOutcome, TrackerError> {
        let local_now = now.with_timezone(&Local);
        let today = local_now.date_naive();
        let stored = self.store.state().await;
        let window_start = now - self.settings.incremental_window;

        let (this_month, records, recent, next_session) = tokio::join!(
            self.sources.attendance.current_month(today),
            self.sources.records.personal_records(),
            self.sources.calendar.sessions_between(window_start, now),
            self.sources.calendar.next_session(now),
        );
        let this_month = this_month?;
        let records = records?;
        let recent = recent?;
        let next_session = next_session.unwrap_or_else(|err| {
            warn!("Next session lookup failed: {}", err);
            None
        });

        let tomorrow_workout = self
            .sources
            .workouts
            .tomorrow_workout(next_session.as_ref(), local_now)
            .await;

        let known: HashSet<NaiveDate> = stored.attended_days.iter().copied().collect();
        let new_days = this_month
            .iter()
            .map(|day| day.date)
            .filter(|date| !known.contains(date))
            .collect::<BTreeSet<_>>()
            .len() as u32;
        let attendance = stored_attendance(&stored.attended_days, this_month, today);

        // State files written before attended days were kept only know the total
        let total_sessions = if known.is_empty() {
            stored.total_sessions.max(attendance.total_sessions)
        } else {
            stored.total_sessions + new_days
        };

        if new_days > 0 {
            info!("{} new attended days this month", new_days);
            self.store
                .update_attended_days(attendance.sessions.iter().map(|day| day.date).collect())
                .await?;
            self.store.update_session_count(total_sessions).await?;
        }

        let new_sessions = session_history(&recent).len() as u32;
        let recent_trainers = trainer_stats(&recent, &self.settings.roster);
        if new_sessions > 0 || new_days > 0 {
            info!("{} sessions in the last {} days", new_sessions, self.settings.incremental_window.num_days());
            self.store.record_update(now).await?;
        }

        let mut snapshot = TrackerSnapshot {
            trainer_sessions: stored.trainer_sessions.clone(),
            recent_trainer_sessions: recent_trainers.sessions,
            zenplanner_sessions: Some(attendance.total_sessions),
            total_sessions,
            monthly_sessions: Some(attendance.monthly_sessions),
            last_session: attendance.last_session,
            training_streak_weeks: Some(training_streak_weeks(&attendance.sessions, today)),
            next_session,
            prs: Some(records),
            tomorrow_workout,
            cost: compute_cost_report(
                &self.settings.billing,
                self.settings.history_start,
                total_sessions,
                now,
            ),
            updated_at: Some(now),
            ..Default::default()
        };
        if let Some(previous) = self.snapshot.read().await.as_ref() {
            snapshot.carry_forward(previous);
        }

        Ok(RefreshOutcome {
            snapshot,
            items_processed: new_sessions + new_days,
            new_sessions,
        })
    }
}

/// Attendance rebuilt from stored dates plus freshly fetched days
fn stored_attendance(
    stored: &[NaiveDate],
    fresh: Vec<AttendedDay>,
    today: NaiveDate,
) -> AttendanceSummary {
    let mut days = fresh;
    days.extend(
        stored
            .iter()
            .map(|date| AttendedDay::new(*date, false, false, String::new())),
    );
    summarize(days, today)
}
