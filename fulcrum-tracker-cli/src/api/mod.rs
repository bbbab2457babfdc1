use anyhow::{Context, Result};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use std::time::Duration;

use crate::config::Config;
use crate::models::{CollectionStats, HealthResponse, SensorState, StatusResponse};

mod error;
mod retry;

pub use error::ApiError;
pub use retry::RetryConfig;

/// API client for a running Fulcrum Tracker
pub struct ApiClient {
    client: Client,
    base_url: String,
    retry_config: RetryConfig,
}

impl ApiClient {
    pub fn new(config: &Config) -> Result<Self> {
        Self::with_retry_config(config, RetryConfig::default())
    }

    pub fn with_retry_config(config: &Config, retry_config: RetryConfig) -> Result<Self> {
        let timeout = Duration::from_secs(config.api.timeout_seconds);

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: config.api.base_url.trim_end_matches('/').to_string(),
            retry_config,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn parse<T: DeserializeOwned>(response: Response) -> Result<T> {
        let status = response.status();
        if status.is_success() {
            response.json().await.context("Failed to parse tracker response")
        } else {
            let error_text = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, error_text).into())
        }
    }

    /// GET with retries on transport and server errors
    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        tracing::debug!("GET {}", url);

        self.retry_config
            .execute(|| async {
                let response = self
                    .client
                    .get(&url)
                    .send()
                    .await
                    .map_err(|e| ApiError::NetworkError(e.to_string()))?;
                Self::parse(response).await
            })
            .await
    }

    pub async fn health(&self) -> Result<HealthResponse> {
        self.get_json("/health").await
    }

    pub async fn status(&self) -> Result<StatusResponse> {
        self.get_json("/api/status").await
    }

    pub async fn sensors(&self) -> Result<Vec<SensorState>> {
        self.get_json("/api/sensors").await
    }

    pub async fn sensor(&self, key: &str) -> Result<SensorState> {
        self.get_json(&format!("/api/sensors/{}", key)).await
    }

    /// Trigger a full reload; never retried since the tracker rejects overlapping refreshes
    pub async fn refresh(&self) -> Result<CollectionStats> {
        let url = format!("{}/api/refresh", self.base_url);
        tracing::debug!("POST {}", url);

        let response = self
            .client
            .post(&url)
            .send()
            .await
            .map_err(|e| ApiError::NetworkError(e.to_string()))?;
        Self::parse(response).await
    }
}
