use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A sensor as served by `/api/sensors`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorState {
    pub key: String,
    pub name: String,
    #[serde(default)]
    pub icon: String,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub state: Value,
    #[serde(default)]
    pub attributes: Map<String, Value>,
}

impl SensorState {
    /// State with its unit, strings shown without quotes
    pub fn display_state(&self) -> String {
        let state = match &self.state {
            Value::String(s) => s.clone(),
            Value::Null => "unknown".to_string(),
            other => other.to_string(),
        };
        match &self.unit {
            Some(unit) if !self.state.is_string() => format!("{} {}", state, unit),
            _ => state,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CollectionStats {
    #[serde(default)]
    pub current_phase: String,
    #[serde(default)]
    pub refresh_in_progress: bool,
    #[serde(default)]
    pub refresh_type: Option<String>,
    #[serde(default)]
    pub last_refresh_completed: Option<DateTime<Utc>>,
    #[serde(default)]
    pub refresh_duration_secs: f64,
    #[serde(default)]
    pub refresh_success: Option<bool>,
    #[serde(default)]
    pub last_error: Option<String>,
    #[serde(default)]
    pub new_sessions_today: u32,
    #[serde(default)]
    pub update_streak: u32,
    #[serde(default)]
    pub total_sessions: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageSummary {
    #[serde(default)]
    pub historical_load_done: bool,
    #[serde(default)]
    pub total_sessions: u32,
    #[serde(default)]
    pub last_update: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_setup_time: Option<DateTime<Utc>>,
}

/// Response of `/api/status`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatusResponse {
    pub collection_stats: CollectionStats,
    pub storage: StorageSummary,
    #[serde(default)]
    pub has_data: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    #[serde(default)]
    pub version: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sensor(state: Value, unit: Option<&str>) -> SensorState {
        SensorState {
            key: "k".to_string(),
            name: "K".to_string(),
            icon: String::new(),
            unit: unit.map(str::to_string),
            state,
            attributes: Map::new(),
        }
    }

    #[test]
    fn test_display_state() {
        assert_eq!(sensor(json!(42), Some("sessions")).display_state(), "42 sessions");
        assert_eq!(sensor(json!(23.65), Some("$/class")).display_state(), "23.65 $/class");
        assert_eq!(sensor(json!("Loading..."), Some("sessions")).display_state(), "Loading...");
        assert_eq!(sensor(json!("315 lb"), None).display_state(), "315 lb");
        assert_eq!(sensor(Value::Null, None).display_state(), "unknown");
    }

    #[test]
    fn test_status_tolerates_extra_fields() {
        let body = json!({
            "collection_stats": {
                "run_id": null,
                "current_phase": "incremental",
                "refresh_success": true,
                "total_sessions": 212,
                "total_items_processed": 3,
            },
            "storage": { "version": 1, "historical_load_done": true, "total_sessions": 212 },
            "has_data": true,
        });

        let status: StatusResponse = serde_json::from_value(body).unwrap();
        assert_eq!(status.collection_stats.current_phase, "incremental");
        assert!(status.storage.historical_load_done);
        assert!(status.has_data);
    }
}
