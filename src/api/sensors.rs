use axum::{
    extract::{Path, State},
    response::Json,
    routing::get,
    Router,
};

use super::routes::TrackerAppState;
use crate::error::TrackerError;
use crate::models::SensorState;
use crate::services::sensor_service::{build_sensor_states, find_sensor_state, SensorContext};

pub fn sensor_routes(state: TrackerAppState) -> Router {
    Router::new()
        .route("/", get(list_sensors))
        .route("/:key", get(get_sensor))
        .with_state(state)
}

/// Current state of every sensor
pub async fn list_sensors(State(state): State<TrackerAppState>) -> Json<Vec<SensorState>> {
    let snapshot = state.coordinator.snapshot().await;
    let storage = state.coordinator.storage_state().await;
    let stats = state.coordinator.collection_stats().await;

    let ctx = SensorContext {
        snapshot: snapshot.as_ref(),
        storage: &storage,
        stats: &stats,
    };
    Json(build_sensor_states(&state.catalogue, &ctx))
}

pub async fn get_sensor(
    State(state): State<TrackerAppState>,
    Path(key): Path<String>,
) -> Result<Json<SensorState>, TrackerError> {
    let snapshot = state.coordinator.snapshot().await;
    let storage = state.coordinator.storage_state().await;
    let stats = state.coordinator.collection_stats().await;

    let ctx = SensorContext {
        snapshot: snapshot.as_ref(),
        storage: &storage,
        stats: &stats,
    };
    find_sensor_state(&state.catalogue, &key, &ctx).map(Json)
}
