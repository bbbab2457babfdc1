use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;

/// Errors reported by the tracker API
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Refresh already running: {0}")]
    Conflict(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Upstream failure: {0}")]
    Upstream(String),

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Unknown error: {0}")]
    Unknown(String),
}

/// Error body written by the tracker
#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

impl ApiError {
    pub fn from_status(status: StatusCode, body: String) -> Self {
        let parsed = serde_json::from_str::<ErrorBody>(&body).ok();
        let msg = parsed
            .and_then(|b| b.message.or(b.error))
            .filter(|m| !m.is_empty())
            .or_else(|| (!body.is_empty()).then_some(body))
            .unwrap_or_else(|| status.canonical_reason().unwrap_or("Unknown error").to_string());

        match status {
            StatusCode::NOT_FOUND => ApiError::NotFound(msg),
            StatusCode::CONFLICT => ApiError::Conflict(msg),
            StatusCode::BAD_GATEWAY | StatusCode::TOO_MANY_REQUESTS => ApiError::Upstream(msg),
            status if status.is_server_error() => ApiError::ServerError(msg),
            status if status.is_client_error() => ApiError::BadRequest(msg),
            _ => ApiError::Unknown(msg),
        }
    }

    /// Only transport failures and plain server errors are worth another attempt
    pub fn is_retryable(&self) -> bool {
        matches!(self, ApiError::NetworkError(_) | ApiError::ServerError(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_status_reads_tracker_body() {
        let err = ApiError::from_status(
            StatusCode::NOT_FOUND,
            r#"{"error":"Sensor not found","message":"Unknown sensor: pr_curl"}"#.to_string(),
        );
        assert!(matches!(err, ApiError::NotFound(ref m) if m == "Unknown sensor: pr_curl"));
    }

    #[test]
    fn test_from_status_mapping() {
        assert!(matches!(
            ApiError::from_status(StatusCode::CONFLICT, String::new()),
            ApiError::Conflict(ref m) if m == "Conflict"
        ));
        assert!(matches!(
            ApiError::from_status(StatusCode::BAD_GATEWAY, "down".to_string()),
            ApiError::Upstream(_)
        ));
        assert!(matches!(
            ApiError::from_status(StatusCode::SERVICE_UNAVAILABLE, String::new()),
            ApiError::ServerError(_)
        ));
        assert!(matches!(
            ApiError::from_status(StatusCode::UNPROCESSABLE_ENTITY, String::new()),
            ApiError::BadRequest(_)
        ));
    }

    #[test]
    fn test_retryable() {
        assert!(ApiError::ServerError("500".to_string()).is_retryable());
        assert!(ApiError::NetworkError("refused".to_string()).is_retryable());
        assert!(!ApiError::Upstream("zenplanner".to_string()).is_retryable());
        assert!(!ApiError::NotFound("x".to_string()).is_retryable());
    }
}
