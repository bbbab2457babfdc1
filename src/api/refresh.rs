use axum::{
    extract::State,
    response::Json,
    routing::{get, post},
    Router,
};
use serde::Serialize;

use super::routes::TrackerAppState;
use crate::error::TrackerError;
use crate::models::{CollectionStats, RefreshKind};
use crate::storage::StoredState;

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub collection_stats: CollectionStats,
    pub storage: StoredState,
    /// Whether any data has been published yet
    pub has_data: bool,
}

pub fn refresh_routes(state: TrackerAppState) -> Router {
    Router::new()
        .route("/status", get(get_status))
        .route("/refresh", post(trigger_refresh))
        .with_state(state)
}

pub async fn get_status(State(state): State<TrackerAppState>) -> Json<StatusResponse> {
    let collection_stats = state.coordinator.collection_stats().await;
    let storage = state.coordinator.storage_state().await;
    let has_data = state.coordinator.snapshot().await.is_some();

    Json(StatusResponse {
        collection_stats,
        storage,
        has_data,
    })
}

/// Manual full reload. The refresh runs on its own task and finishes even if the client goes away.
pub async fn trigger_refresh(
    State(state): State<TrackerAppState>,
) -> Result<Json<CollectionStats>, TrackerError> {
    tracing::info!("Manual refresh requested");
    let coordinator = state.coordinator.clone();
    let stats = tokio::spawn(async move { coordinator.refresh(RefreshKind::Manual).await })
        .await
        .map_err(|e| TrackerError::RefreshTask(e.to_string()))??;
    Ok(Json(stats))
}
