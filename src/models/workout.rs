use serde::{Deserialize, Serialize};

/// Programmed workout published on the gym's calendar
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workout {
    /// e.g. "HIIT + Core"
    pub kind: String,
    pub lifts: String,
    /// Heart-rate effort target, e.g. "140-150"
    pub meps: String,
    pub raw_summary: String,
    pub created_by: String,
    pub last_updated: Option<String>,
}

impl Workout {
    /// Compact form for the sensor state; always contains a pipe
    pub fn display_format(&self) -> String {
        let kind = if self.kind.is_empty() { "Unknown" } else { &self.kind };
        let lifts = if self.lifts.is_empty() { "Not specified" } else { &self.lifts };
        format!("{} | {}", kind, lifts)
    }
}

/// Human readable summary of an optional workout
pub fn format_workout(workout: Option<&Workout>) -> String {
    let Some(workout) = workout else {
        return "No workout scheduled".to_string();
    };

    let mut parts = Vec::new();
    if !workout.kind.is_empty() {
        parts.push(workout.kind.clone());
    }
    if !workout.lifts.is_empty() {
        parts.push(format!("Lifts: {}", workout.lifts));
    }
    if !workout.meps.is_empty() {
        parts.push(format!("MEPs: {}", workout.meps));
    }

    if parts.is_empty() {
        "Workout details not available".to_string()
    } else {
        parts.join(" | ")
    }
}
