use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TrackerError {
    #[error("Invalid username or password")]
    InvalidCredentials,
    #[error("Rate limited: {0}")]
    RateLimited(String),
    #[error("ZenPlanner server error: {0}")]
    ServerError(String),
    #[error("Network error: {0}")]
    Network(String),
    #[error("Session expired")]
    SessionExpired,
    #[error("Calendar authentication failed: {0}")]
    CalendarAuth(String),
    #[error("Calendar request failed: {0}")]
    CalendarFetch(String),
    #[error("Failed to parse {0}")]
    Parse(String),
    #[error("Storage error: {0}")]
    Storage(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Missing data: {0}")]
    MissingData(String),
    #[error("A refresh is already in progress")]
    RefreshInProgress,
    #[error("Refresh task failed: {0}")]
    RefreshTask(String),
    #[error("Unknown sensor: {0}")]
    UnknownSensor(String),
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("JWT error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl TrackerError {
    /// Transient failures worth another attempt
    pub fn is_retryable(&self) -> bool {
        match self {
            TrackerError::Network(_) | TrackerError::ServerError(_) => true,
            TrackerError::Http(err) => err.is_timeout() || err.is_connect() || err.is_request(),
            _ => false,
        }
    }
}

impl IntoResponse for TrackerError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            TrackerError::InvalidCredentials => (StatusCode::BAD_GATEWAY, "Upstream authentication failed"),
            TrackerError::RateLimited(_) => (StatusCode::TOO_MANY_REQUESTS, "Rate limited by upstream"),
            TrackerError::ServerError(_) => (StatusCode::BAD_GATEWAY, "Upstream server error"),
            TrackerError::Network(_) => (StatusCode::BAD_GATEWAY, "Upstream network error"),
            TrackerError::SessionExpired => (StatusCode::BAD_GATEWAY, "Upstream session expired"),
            TrackerError::CalendarAuth(_) => (StatusCode::BAD_GATEWAY, "Calendar authentication failed"),
            TrackerError::CalendarFetch(_) => (StatusCode::BAD_GATEWAY, "Calendar request failed"),
            TrackerError::Parse(_) => (StatusCode::BAD_GATEWAY, "Unexpected upstream response"),
            TrackerError::MissingData(_) => (StatusCode::BAD_GATEWAY, "Missing upstream data"),
            TrackerError::Http(_) => (StatusCode::BAD_GATEWAY, "Upstream HTTP error"),
            TrackerError::Jwt(_) => (StatusCode::BAD_GATEWAY, "Calendar token error"),
            TrackerError::RefreshInProgress => (StatusCode::CONFLICT, "Refresh already in progress"),
            TrackerError::RefreshTask(_) => (StatusCode::INTERNAL_SERVER_ERROR, "Refresh task failed"),
            TrackerError::UnknownSensor(_) => (StatusCode::NOT_FOUND, "Sensor not found"),
            TrackerError::Storage(_) => (StatusCode::INTERNAL_SERVER_ERROR, "Storage error"),
            TrackerError::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "Configuration error"),
            TrackerError::Io(_) => (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error"),
            TrackerError::Json(_) => (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error"),
        };

        let body = Json(json!({
            "error": error_message,
            "message": self.to_string(),
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_errors() {
        assert!(TrackerError::Network("timeout".to_string()).is_retryable());
        assert!(TrackerError::ServerError("502".to_string()).is_retryable());
        assert!(!TrackerError::InvalidCredentials.is_retryable());
        assert!(!TrackerError::RateLimited("429".to_string()).is_retryable());
    }

    #[test]
    fn test_status_codes() {
        let response = TrackerError::UnknownSensor("nope".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = TrackerError::RefreshInProgress.into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let response = TrackerError::RateLimited("slow down".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    }
}
