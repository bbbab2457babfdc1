use anyhow::Result;
use fulcrum_tracker_cli::api::{ApiClient, ApiError, RetryConfig};
use fulcrum_tracker_cli::config::Config;
use std::time::Duration;

fn config_for(server: &mockito::ServerGuard) -> Config {
    Config::default().with_base_url(Some(server.url()))
}

fn fast_retries() -> RetryConfig {
    RetryConfig {
        initial_delay: Duration::from_millis(1),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_status_is_parsed() -> Result<()> {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/api/status")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            r#"{
                "collection_stats": {"current_phase": "incremental", "refresh_success": true, "update_streak": 2},
                "storage": {"historical_load_done": true, "total_sessions": 212},
                "has_data": true
            }"#,
        )
        .create_async()
        .await;

    let client = ApiClient::new(&config_for(&server))?;
    let status = client.status().await?;

    assert_eq!(status.collection_stats.current_phase, "incremental");
    assert_eq!(status.storage.total_sessions, 212);
    assert!(status.has_data);
    mock.assert_async().await;
    Ok(())
}

#[tokio::test]
async fn test_server_errors_are_retried() -> Result<()> {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/api/sensors")
        .with_status(500)
        .expect(3)
        .create_async()
        .await;

    let client = ApiClient::with_retry_config(&config_for(&server), fast_retries())?;
    let err = client.sensors().await.unwrap_err();

    assert!(matches!(err.downcast_ref::<ApiError>(), Some(ApiError::ServerError(_))));
    mock.assert_async().await;
    Ok(())
}

#[tokio::test]
async fn test_missing_sensor_is_not_retried() -> Result<()> {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/api/sensors/pr_curl")
        .with_status(404)
        .with_body(r#"{"error":"Sensor not found","message":"Unknown sensor: pr_curl"}"#)
        .expect(1)
        .create_async()
        .await;

    let client = ApiClient::with_retry_config(&config_for(&server), fast_retries())?;
    let err = client.sensor("pr_curl").await.unwrap_err();

    assert_eq!(err.to_string(), "Not found: Unknown sensor: pr_curl");
    mock.assert_async().await;
    Ok(())
}

#[tokio::test]
async fn test_refresh_conflict() -> Result<()> {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/api/refresh")
        .with_status(409)
        .with_body(r#"{"error":"Refresh already in progress","message":"A refresh is already in progress"}"#)
        .expect(1)
        .create_async()
        .await;

    let client = ApiClient::new(&config_for(&server))?;
    let err = client.refresh().await.unwrap_err();

    assert!(matches!(err.downcast_ref::<ApiError>(), Some(ApiError::Conflict(_))));
    mock.assert_async().await;
    Ok(())
}

#[tokio::test]
async fn test_refresh_returns_stats() -> Result<()> {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/api/refresh")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"current_phase":"historical_load","refresh_success":true,"refresh_duration_secs":3.5,"total_sessions":212}"#)
        .create_async()
        .await;

    let client = ApiClient::new(&config_for(&server))?;
    let stats = client.refresh().await?;

    assert_eq!(stats.total_sessions, 212);
    assert_eq!(stats.refresh_success, Some(true));
    Ok(())
}

#[tokio::test]
async fn test_unreachable_tracker() {
    let config = Config::default().with_base_url(Some("http://127.0.0.1:1".to_string()));
    let client = ApiClient::with_retry_config(&config, RetryConfig::none()).unwrap();

    let err = client.health().await.unwrap_err();
    assert!(matches!(err.downcast_ref::<ApiError>(), Some(ApiError::NetworkError(_))));
}
