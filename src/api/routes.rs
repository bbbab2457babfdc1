use axum::{routing::get, Router};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use super::health::health_check;
use super::refresh::refresh_routes;
use super::sensors::sensor_routes;
use crate::models::SensorDescription;
use crate::services::RefreshCoordinator;

/// Shared by every handler
#[derive(Clone)]
pub struct TrackerAppState {
    pub coordinator: Arc<RefreshCoordinator>,
    pub catalogue: Arc<Vec<SensorDescription>>,
}

impl TrackerAppState {
    pub fn new(coordinator: Arc<RefreshCoordinator>, catalogue: Vec<SensorDescription>) -> Self {
        Self {
            coordinator,
            catalogue: Arc::new(catalogue),
        }
    }
}

pub fn create_routes(state: TrackerAppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .nest("/api/sensors", sensor_routes(state.clone()))
        .nest("/api", refresh_routes(state))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
