mod common;

use axum::{
    body::{to_bytes, Body},
    http::{Method, Request, StatusCode},
    Router,
};
use pretty_assertions::assert_eq;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

use common::Harness;
use fulcrum_tracker::api::{create_routes, TrackerAppState};
use fulcrum_tracker::services::sensor_service::sensor_catalogue;

async fn create_test_app(harness: &Harness) -> Router {
    let coordinator = Arc::new(harness.coordinator().await);
    let catalogue = sensor_catalogue(
        &["ash".to_string(), "walter".to_string()],
        &["back_squat".to_string()],
    );
    create_routes(TrackerAppState::new(coordinator, catalogue))
}

async fn send(app: &Router, method: Method, uri: &str) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = serde_json::from_slice(&body).unwrap_or(Value::Null);
    (status, json)
}

#[tokio::test]
async fn test_health_check_endpoint() {
    let harness = Harness::new();
    let app = create_test_app(&harness).await;

    let (status, body) = send(&app, Method::GET, "/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["service"], "fulcrum-tracker");
}

#[tokio::test]
async fn test_sensors_before_first_refresh() {
    let harness = Harness::with_history();
    let app = create_test_app(&harness).await;

    let (status, body) = send(&app, Method::GET, "/api/sensors").await;
    assert_eq!(status, StatusCode::OK);

    let sensors = body.as_array().unwrap();
    let state_of = |key: &str| {
        sensors
            .iter()
            .find(|s| s["key"] == key)
            .map(|s| s["state"].clone())
            .unwrap()
    };

    assert_eq!(sensors[0]["key"], "trainer_ash_sessions");
    assert_eq!(state_of("total_fulcrum_sessions"), 0);
    assert_eq!(state_of("trainer_walter_sessions"), 0);
    assert_eq!(state_of("next_session"), "Loading...");
    assert_eq!(state_of("pr_back_squat"), "No PR recorded");
    assert_eq!(state_of("tomorrow_workout"), "No Workout | Scheduled");
    assert!(sensors
        .iter()
        .all(|s| s["attributes"]["loading_status"] == "initializing"));
}

#[tokio::test]
async fn test_unknown_sensor_is_not_found() {
    let harness = Harness::new();
    let app = create_test_app(&harness).await;

    let (status, body) = send(&app, Method::GET, "/api/sensors/trainer_bob_sessions").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Sensor not found");
}

#[tokio::test]
async fn test_manual_refresh_publishes_sensors() {
    let harness = Harness::with_history();
    let app = create_test_app(&harness).await;

    let (status, stats) = send(&app, Method::POST, "/api/refresh").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["refresh_type"], "manual");
    assert_eq!(stats["refresh_success"], true);
    assert_eq!(stats["total_sessions"], 5);

    let (status, sensor) = send(&app, Method::GET, "/api/sensors/trainer_ash_sessions").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(sensor["state"], 3);
    assert_eq!(sensor["unit"], "sessions");
    assert_eq!(sensor["attributes"]["trainer"], "Ash");

    let (_, total) = send(&app, Method::GET, "/api/sensors/total_fulcrum_sessions").await;
    assert_eq!(total["state"], 5);
    assert_eq!(total["attributes"]["loading_status"], "complete");

    let (_, status_body) = send(&app, Method::GET, "/api/status").await;
    assert_eq!(status_body["has_data"], true);
    assert_eq!(status_body["collection_stats"]["current_phase"], "historical_load");
    assert_eq!(status_body["storage"]["total_sessions"], 5);
}

#[tokio::test]
async fn test_failed_refresh_maps_to_bad_gateway() {
    let harness = Harness::new();
    let app = create_test_app(&harness).await;

    let (status, body) = send(&app, Method::POST, "/api/refresh").await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"], "Upstream network error");

    let (_, status_body) = send(&app, Method::GET, "/api/status").await;
    assert_eq!(status_body["has_data"], false);
    assert_eq!(status_body["collection_stats"]["refresh_success"], false);
}

#[tokio::test]
async fn test_refresh_finishes_after_client_disconnects() {
    let harness = Harness::with_history();
    *harness.attendance.delay.lock().unwrap() = Duration::from_millis(300);
    let app = create_test_app(&harness).await;

    let abandoned = tokio::time::timeout(
        Duration::from_millis(50),
        send(&app, Method::POST, "/api/refresh"),
    )
    .await;
    assert!(abandoned.is_err());

    tokio::time::sleep(Duration::from_millis(600)).await;

    let (_, status_body) = send(&app, Method::GET, "/api/status").await;
    assert_eq!(status_body["has_data"], true);
    assert_eq!(status_body["collection_stats"]["refresh_in_progress"], false);
    assert_eq!(status_body["collection_stats"]["refresh_success"], true);
    assert_eq!(status_body["storage"]["total_sessions"], 5);
}
