use anyhow::Result;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

use super::ApiError;

/// Attempt budget and exponential backoff for idempotent tracker calls
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total attempts, including the first
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub backoff_factor: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(5),
            backoff_factor: 2,
        }
    }
}

impl RetryConfig {
    /// A single attempt
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Default::default()
        }
    }

    /// Wait before retry number `retry` (starting at 0)
    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = self.backoff_factor.saturating_pow(retry);
        self.initial_delay.saturating_mul(factor).min(self.max_delay)
    }

    /// Errors that are not an [`ApiError`] come from the transport and are retried
    fn should_retry(error: &anyhow::Error) -> bool {
        error
            .downcast_ref::<ApiError>()
            .map_or(true, ApiError::is_retryable)
    }

    pub async fn execute<F, Fut, T>(&self, mut operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut retry = 0;
        loop {
            let error = match operation().await {
                Ok(value) => return Ok(value),
                Err(error) => error,
            };

            if !Self::should_retry(&error) {
                return Err(error);
            }
            if retry + 1 >= self.max_attempts {
                tracing::warn!("Giving up after {} attempts: {}", self.max_attempts, error);
                return Err(error);
            }

            let delay = self.delay_for(retry);
            tracing::debug!("Attempt {} failed ({}), retrying in {:?}", retry + 1, error, delay);
            sleep(delay).await;
            retry += 1;
        }
    }
}
