use serde_json::{json, Map, Value};
use std::collections::HashSet;
use tracing::warn;

use crate::error::TrackerError;
use crate::models::{
    format_workout, CollectionStats, SensorDescription, SensorState, StateClass, TrackerSnapshot,
};
use crate::services::cost_analysis_service::session_metrics;
use crate::services::zenplanner_pr_client::display_kind;
use crate::storage::StoredState;

const LOADING: &str = "Loading...";
const NO_PR: &str = "No PR recorded";
const NO_WORKOUT: &str = "No Workout | Scheduled";

/// Every sensor the tracker publishes, trainer and PR sensors first
pub fn sensor_catalogue(roster: &[String], exercise_kinds: &[String]) -> Vec<SensorDescription> {
    let mut descriptions = Vec::new();

    for trainer in roster {
        descriptions.push(
            SensorDescription::new(
                format!("trainer_{}_sessions", trainer.to_lowercase()),
                format!("Sessions with {}", display_kind(trainer)),
                "mdi:account-tie",
            )
            .with_unit("sessions")
            .with_state_class(StateClass::TotalIncreasing),
        );
    }

    for kind in exercise_kinds {
        descriptions.push(SensorDescription::new(
            format!("pr_{}", kind),
            format!("{} PR", display_kind(kind)),
            "mdi:weight-lifter",
        ));
    }

    descriptions.extend([
        SensorDescription::new("zenplanner_fulcrum_sessions", "ZenPlanner Fulcrum Sessions", "mdi:dumbbell")
            .with_unit("sessions")
            .with_state_class(StateClass::TotalIncreasing),
        SensorDescription::new(
            "google_calendar_fulcrum_sessions",
            "Google Calendar Fulcrum Sessions",
            "mdi:calendar-check",
        )
        .with_unit("sessions")
        .with_state_class(StateClass::TotalIncreasing),
        SensorDescription::new("total_fulcrum_sessions", "Total Fulcrum Sessions", "mdi:dumbbell-variant")
            .with_unit("sessions")
            .with_state_class(StateClass::TotalIncreasing),
        SensorDescription::new("monthly_sessions", "Monthly Training Sessions", "mdi:calendar-month")
            .with_unit("sessions")
            .with_state_class(StateClass::Measurement),
        SensorDescription::new("training_streak", "Training Streak", "mdi:fire")
            .with_unit("weeks")
            .with_state_class(StateClass::Measurement),
        SensorDescription::new("last_session", "Last Training Session", "mdi:calendar-clock"),
        SensorDescription::new("next_session", "Next Training Session", "mdi:calendar-arrow-right"),
        SensorDescription::new("recent_prs", "Recent PRs", "mdi:trophy"),
        SensorDescription::new("total_prs", "Total PRs", "mdi:trophy-variant")
            .with_unit("PRs")
            .with_state_class(StateClass::Measurement),
        SensorDescription::new("tomorrow_workout", "Tomorrow's Workout", "mdi:dumbbell"),
        SensorDescription::new("training_tco", "Total Training Cost", "mdi:cash")
            .with_unit("$")
            .with_state_class(StateClass::Measurement),
        SensorDescription::new("training_cost_per_class", "Cost Per Class", "mdi:calculator")
            .with_unit("$/class")
            .with_state_class(StateClass::Measurement),
        SensorDescription::new(
            "training_session_metrics",
            "Training Session Metrics",
            "mdi:clipboard-text-clock",
        ),
    ]);

    let mut seen = HashSet::new();
    descriptions.retain(|description| {
        let fresh = seen.insert(description.key.clone());
        if !fresh {
            warn!("Dropping duplicate sensor {}", description.key);
        }
        fresh
    });
    descriptions
}

/// What the sensors are computed from
pub struct SensorContext<'a> {
    pub snapshot: Option<&'a TrackerSnapshot>,
    pub storage: &'a StoredState,
    pub stats: &'a CollectionStats,
}

pub fn build_sensor_states(catalogue: &[SensorDescription], ctx: &SensorContext<'_>) -> Vec<SensorState> {
    catalogue
        .iter()
        .map(|description| sensor_state(description, ctx))
        .collect()
}

pub fn find_sensor_state(
    catalogue: &[SensorDescription],
    key: &str,
    ctx: &SensorContext<'_>,
) -> Result<SensorState, TrackerError> {
    catalogue
        .iter()
        .find(|description| description.key == key)
        .map(|description| sensor_state(description, ctx))
        .ok_or_else(|| TrackerError::UnknownSensor(key.to_string()))
}

fn attributes(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

pub fn sensor_state(description: &SensorDescription, ctx: &SensorContext<'_>) -> SensorState {
    let (state, attrs) = match ctx.snapshot {
        Some(snapshot) => loaded_state(&description.key, snapshot, ctx),
        None => initial_state(description, ctx.storage),
    };
    SensorState::new(description, state, attributes(attrs))
}

fn initial_state(description: &SensorDescription, storage: &StoredState) -> (Value, Value) {
    let key = description.key.as_str();
    let state = if key == "total_fulcrum_sessions" {
        json!(storage.total_sessions)
    } else if key.starts_with("pr_") {
        json!(NO_PR)
    } else if key == "tomorrow_workout" {
        json!(NO_WORKOUT)
    } else if key == "training_session_metrics" {
        json!(session_metrics(None).to_string())
    } else if description.is_numeric() {
        json!(0)
    } else {
        json!(LOADING)
    };

    (state, json!({ "loading_status": "initializing" }))
}

fn loaded_state(key: &str, snapshot: &TrackerSnapshot, ctx: &SensorContext<'_>) -> (Value, Value) {
    if let Some(trainer) = key
        .strip_prefix("trainer_")
        .and_then(|rest| rest.strip_suffix("_sessions"))
    {
        let total = snapshot.trainer_sessions.get(trainer).copied().unwrap_or(0);
        let recent = snapshot.recent_trainer_sessions.get(trainer).copied().unwrap_or(0);
        return (
            json!(total),
            json!({
                "trainer": display_kind(trainer),
                "recent_sessions": recent,
                "loading_status": "complete",
            }),
        );
    }

    if let Some(kind) = key.strip_prefix("pr_") {
        return match snapshot.prs.as_ref().and_then(|prs| prs.record(kind)) {
            Some(record) => (
                json!(record.value),
                json!({
                    "exercise": display_kind(kind),
                    "last_attempt": record.last_result,
                    "days_since": record.days_since(),
                    "attempts": record.attempts,
                    "date_achieved": record.date,
                }),
            ),
            None => (json!(NO_PR), json!({ "exercise": display_kind(kind) })),
        };
    }

    let cost = snapshot.cost.as_ref();
    match key {
        "zenplanner_fulcrum_sessions" => (
            json!(snapshot.zenplanner_sessions.unwrap_or(0)),
            json!({ "source": "zenplanner" }),
        ),
        "google_calendar_fulcrum_sessions" => (
            json!(snapshot.calendar_sessions.unwrap_or(0)),
            json!({
                "source": "google_calendar",
                "collection_report": snapshot.collection_report,
            }),
        ),
        "total_fulcrum_sessions" => (
            json!(snapshot.total_sessions),
            json!({
                "sessions_this_month": snapshot.monthly_sessions,
                "last_session_date": snapshot.last_session,
                "zenplanner_total": snapshot.zenplanner_sessions,
                "calendar_total": snapshot.calendar_sessions,
                "current_phase": ctx.stats.current_phase,
                "new_sessions_today": ctx.stats.new_sessions_today,
                "update_streak": ctx.stats.update_streak,
                "last_refresh": ctx.stats.last_refresh_completed,
                "storage_state": {
                    "historical_load_done": ctx.storage.historical_load_done,
                    "initialization_phase": ctx.storage.initialization_phase,
                    "last_update": ctx.storage.last_update,
                },
                "loading_status": "complete",
            }),
        ),
        "monthly_sessions" => (json!(snapshot.monthly_sessions.unwrap_or(0)), json!({})),
        "training_streak" => (json!(snapshot.training_streak_weeks.unwrap_or(0)), json!({})),
        "last_session" => (
            json!(snapshot
                .last_session
                .map(|date| date.format("%Y-%m-%d").to_string())
                .unwrap_or_else(|| "No sessions recorded".to_string())),
            json!({}),
        ),
        "next_session" => match &snapshot.next_session {
            Some(session) => (
                json!(session.display()),
                json!({
                    "date": session.date,
                    "time": session.time,
                    "instructor": session.instructor,
                    "location": session.location,
                    "description": session.description,
                    "event_id": session.event_id,
                }),
            ),
            None => (json!("No upcoming session"), json!({})),
        },
        "recent_prs" => match &snapshot.prs {
            Some(prs) => (
                json!(prs.recent_prs),
                json!({ "recent_pr_count": prs.recent_pr_count }),
            ),
            None => (json!(LOADING), json!({})),
        },
        "total_prs" => match &snapshot.prs {
            Some(prs) => (
                json!(prs.total_prs),
                json!({
                    "recent_pr_count": prs.recent_pr_count,
                    "user_id_detected": prs.user_id_detected,
                    "detection_method": prs.detection_method,
                }),
            ),
            None => (json!(0), json!({})),
        },
        "tomorrow_workout" => match &snapshot.tomorrow_workout {
            Some(workout) => (
                json!(workout.display_format()),
                json!({
                    "workout_type": workout.kind,
                    "lifts": workout.lifts,
                    "meps_target": workout.meps,
                    "raw_summary": workout.raw_summary,
                    "summary": format_workout(Some(workout)),
                    "created_by": workout.created_by,
                    "last_updated": workout.last_updated,
                }),
            ),
            None => (
                json!(NO_WORKOUT),
                json!({ "summary": format_workout(None) }),
            ),
        },
        "training_tco" => (
            json!(cost.map_or(0.0, |c| c.total_paid)),
            json!({
                "payments": cost.map(|c| c.payments.clone()).unwrap_or_default(),
            }),
        ),
        "training_cost_per_class" => (
            json!(cost.and_then(|c| c.cost_per_session).unwrap_or(0.0)),
            match cost {
                Some(c) => json!({
                    "start_date": c.start_date,
                    "monthly_cost": c.monthly_cost,
                    "months_active": c.months_active,
                    "total_cost": c.total_cost,
                    "total_sessions": c.sessions_attended,
                }),
                None => json!({}),
            },
        ),
        "training_session_metrics" => {
            let metrics = session_metrics(cost);
            let mut attrs = metrics.clone();
            if let (Some(c), Some(map)) = (cost, attrs.as_object_mut()) {
                map.insert("monthly_cost".to_string(), json!(c.monthly_cost));
                map.insert("start_date".to_string(), json!(c.start_date));
            }
            (json!(metrics.to_string()), attrs)
        }
        _ => (json!(LOADING), json!({})),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CalendarSession, PersonalRecord, PrSummary, Workout};
    use pretty_assertions::assert_eq;

    fn catalogue() -> Vec<SensorDescription> {
        sensor_catalogue(
            &["ash".to_string(), "walter".to_string()],
            &["back_squat".to_string()],
        )
    }

    fn state_of(states: &[SensorState], key: &str) -> Value {
        states
            .iter()
            .find(|s| s.key == key)
            .map(|s| s.state.clone())
            .unwrap()
    }

    #[test]
    fn test_catalogue_keys_and_names() {
        let catalogue = catalogue();
        assert_eq!(catalogue[0].key, "trainer_ash_sessions");
        assert_eq!(catalogue[0].name, "Sessions with Ash");
        assert_eq!(catalogue[2].key, "pr_back_squat");
        assert_eq!(catalogue[2].name, "Back Squat PR");
        assert!(catalogue.iter().any(|d| d.key == "training_session_metrics"));
    }

    #[test]
    fn test_duplicate_keys_are_dropped() {
        let catalogue = sensor_catalogue(
            &["ash".to_string(), "Ash".to_string()],
            &["back_squat".to_string(), "back_squat".to_string()],
        );
        let trainers = catalogue.iter().filter(|d| d.key == "trainer_ash_sessions").count();
        let prs = catalogue.iter().filter(|d| d.key == "pr_back_squat").count();
        assert_eq!((trainers, prs), (1, 1));
    }

    #[test]
    fn test_states_before_first_refresh() {
        let storage = StoredState {
            total_sessions: 42,
            ..Default::default()
        };
        let stats = CollectionStats::default();
        let ctx = SensorContext {
            snapshot: None,
            storage: &storage,
            stats: &stats,
        };
        let states = build_sensor_states(&catalogue(), &ctx);

        assert_eq!(state_of(&states, "total_fulcrum_sessions"), json!(42));
        assert_eq!(state_of(&states, "trainer_ash_sessions"), json!(0));
        assert_eq!(state_of(&states, "pr_back_squat"), json!(NO_PR));
        assert_eq!(state_of(&states, "next_session"), json!(LOADING));
        assert_eq!(state_of(&states, "training_tco"), json!(0));
        assert_eq!(states[0].attributes["loading_status"], json!("initializing"));
    }

    #[test]
    fn test_states_from_snapshot() {
        let mut snapshot = TrackerSnapshot::default();
        snapshot.trainer_sessions.insert("ash".to_string(), 12);
        snapshot.total_sessions = 300;
        snapshot.next_session = Some(CalendarSession {
            date: "2024-03-21".to_string(),
            time: "06:00".to_string(),
            subject: "Fulcrum SGT".to_string(),
            instructor: "Walter".to_string(),
            search_term: "Fulcrum".to_string(),
            description: "Instructor: Walter".to_string(),
            location: "Fulcrum Fitness".to_string(),
            event_id: "evt-1".to_string(),
        });
        let mut prs = PrSummary::empty(&["back_squat".to_string()]);
        prs.prs_by_type.insert(
            "back_squat".to_string(),
            Some(PersonalRecord {
                value: "315 lb".to_string(),
                date: Some("2024-03-03".to_string()),
                last_result: Some("305 lb".to_string()),
                days_since: Some("3".to_string()),
                attempts: Some("12".to_string()),
            }),
        );
        snapshot.prs = Some(prs);
        snapshot.tomorrow_workout = Some(Workout {
            kind: "Strength".to_string(),
            lifts: "Back Squat".to_string(),
            meps: "45".to_string(),
            raw_summary: "SGT - Strength | Back Squat | MEPs - 45".to_string(),
            created_by: String::new(),
            last_updated: None,
        });

        let storage = StoredState::default();
        let stats = CollectionStats::default();
        let ctx = SensorContext {
            snapshot: Some(&snapshot),
            storage: &storage,
            stats: &stats,
        };
        let states = build_sensor_states(&catalogue(), &ctx);

        assert_eq!(state_of(&states, "trainer_ash_sessions"), json!(12));
        assert_eq!(state_of(&states, "trainer_walter_sessions"), json!(0));
        assert_eq!(state_of(&states, "total_fulcrum_sessions"), json!(300));
        assert_eq!(state_of(&states, "next_session"), json!("2024-03-21 06:00 with Walter"));
        assert_eq!(state_of(&states, "pr_back_squat"), json!("315 lb"));
        assert_eq!(state_of(&states, "tomorrow_workout"), json!("Strength | Back Squat"));
        assert_eq!(state_of(&states, "training_cost_per_class"), json!(0.0));

        let pr = states.iter().find(|s| s.key == "pr_back_squat").unwrap();
        assert_eq!(pr.attributes["days_since"], json!(3));
    }

    #[test]
    fn test_unknown_sensor() {
        let storage = StoredState::default();
        let stats = CollectionStats::default();
        let ctx = SensorContext {
            snapshot: None,
            storage: &storage,
            stats: &stats,
        };
        assert!(matches!(
            find_sensor_state(&catalogue(), "nope", &ctx),
            Err(TrackerError::UnknownSensor(_))
        ));
    }
}
