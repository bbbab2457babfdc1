use chrono::{DateTime, Utc};
use reqwest::{header, Client, StatusCode};
use serde::Serialize;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::config::ZenPlannerConfig;
use crate::error::TrackerError;
use crate::services::html_scrape::find_tags;

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthStatus {
    NotAuthenticated,
    Authenticating,
    Authenticated,
    Failed,
    Expired,
}

#[derive(Debug)]
struct AuthState {
    status: AuthStatus,
    rate_limited_until: Option<Instant>,
    last_login: Option<DateTime<Utc>>,
}

/// Holds the ZenPlanner session cookie jar shared by the attendance and PR clients
pub struct ZenPlannerAuth {
    client: Client,
    base_url: String,
    username: String,
    password: String,
    max_retries: u32,
    retry_base_delay: Duration,
    rate_limit_cooldown: Duration,
    state: Mutex<AuthState>,
}

impl ZenPlannerAuth {
    pub fn new(config: &ZenPlannerConfig) -> Result<Self, TrackerError> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::ACCEPT,
            header::HeaderValue::from_static(
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
            ),
        );
        headers.insert(
            header::ACCEPT_LANGUAGE,
            header::HeaderValue::from_static("en-US,en;q=0.9"),
        );

        let client = Client::builder()
            .cookie_store(true)
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            username: config.username.clone(),
            password: config.password.clone(),
            max_retries: config.max_login_retries,
            retry_base_delay: Duration::from_millis(config.retry_base_delay_ms),
            rate_limit_cooldown: Duration::from_secs(config.rate_limit_cooldown_seconds),
            state: Mutex::new(AuthState {
                status: AuthStatus::NotAuthenticated,
                rate_limited_until: None,
                last_login: None,
            }),
        })
    }

    /// HTTP client carrying the session cookies
    pub fn http(&self) -> &Client {
        &self.client
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn status(&self) -> AuthStatus {
        self.with_state(|state| state.status)
    }

    pub fn last_login(&self) -> Option<DateTime<Utc>> {
        self.with_state(|state| state.last_login)
    }

    pub fn is_rate_limited(&self) -> bool {
        self.with_state(|state| {
            state
                .rate_limited_until
                .map_or(false, |until| Instant::now() < until)
        })
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut AuthState) -> T) -> T {
        let mut state = self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut state)
    }

    fn set_status(&self, status: AuthStatus) {
        self.with_state(|state| state.status = status);
    }

    /// Backoff before retry number `attempt` (zero based)
    pub fn retry_delay(&self, attempt: u32) -> Duration {
        self.retry_base_delay * 2u32.saturating_pow(attempt)
    }

    /// Log in, retrying transient failures with exponential backoff
    pub async fn login(&self) -> Result<(), TrackerError> {
        if self.is_rate_limited() {
            return Err(TrackerError::RateLimited(
                "Rate limit exceeded. Please wait before retrying.".to_string(),
            ));
        }

        let mut attempt = 0;
        loop {
            self.set_status(AuthStatus::Authenticating);

            match self.attempt_login().await {
                Ok(()) => {
                    self.with_state(|state| {
                        state.status = AuthStatus::Authenticated;
                        state.last_login = Some(Utc::now());
                    });
                    info!("Logged in to ZenPlanner as {}", self.username);
                    return Ok(());
                }
                Err(err) if err.is_retryable() && attempt < self.max_retries => {
                    let delay = self.retry_delay(attempt);
                    warn!(
                        "ZenPlanner login attempt {} failed, retrying in {:?}: {}",
                        attempt + 1,
                        delay,
                        err
                    );
                    sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => {
                    let cooldown = self.rate_limit_cooldown;
                    self.with_state(|state| {
                        state.status = AuthStatus::Failed;
                        if matches!(err, TrackerError::RateLimited(_)) {
                            state.rate_limited_until = Some(Instant::now() + cooldown);
                        }
                    });
                    error!("ZenPlanner login failed: {}", err);
                    return Err(err);
                }
            }
        }
    }

    async fn attempt_login(&self) -> Result<(), TrackerError> {
        let token = self.fetch_login_token().await?;
        self.submit_credentials(&token).await
    }

    async fn fetch_login_token(&self) -> Result<String, TrackerError> {
        let url = format!("{}/login.cfm", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[("VIEW", "login"), ("LOGOUT", "false"), ("message", "multiProfile")])
            .send()
            .await
            .map_err(|e| TrackerError::Network(format!("Failed to load login page: {}", e)))?;

        check_status(response.status(), "login page")?;

        let html = response
            .text()
            .await
            .map_err(|e| TrackerError::Network(format!("Failed to read login page: {}", e)))?;

        extract_login_token(&html)
    }

    async fn submit_credentials(&self, token: &str) -> Result<(), TrackerError> {
        let url = format!("{}/login.cfm", self.base_url);
        let form = [
            ("username", self.username.as_str()),
            ("password", self.password.as_str()),
            ("__xsToken", token),
            ("NOVALIDATE", "true"),
        ];

        let response = self
            .client
            .post(&url)
            .query(&[("VIEW", "login"), ("LOGOUT", "false"), ("message", "multiProfile")])
            .header(header::REFERER, url.as_str())
            .form(&form)
            .send()
            .await
            .map_err(|e| TrackerError::Network(format!("Login request failed: {}", e)))?;

        check_status(response.status(), "login")?;

        let landed_on = response.url().to_string();
        if landed_on.contains("person.cfm") {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default().to_lowercase();
        if body.contains("invalid") || body.contains("error") {
            Err(TrackerError::InvalidCredentials)
        } else {
            Err(TrackerError::ServerError(format!(
                "Unexpected login response, ended on {}",
                landed_on
            )))
        }
    }

    /// Probe the member page to see whether the session cookie is still good
    pub async fn is_logged_in(&self) -> bool {
        if self.status() != AuthStatus::Authenticated {
            return false;
        }

        let url = format!("{}/person.cfm", self.base_url);
        match self.client.get(&url).send().await {
            Ok(response) => {
                let status = response.status();
                if status == StatusCode::UNAUTHORIZED || response.url().as_str().contains("login.cfm") {
                    debug!("ZenPlanner session expired");
                    self.set_status(AuthStatus::Expired);
                    false
                } else if status == StatusCode::TOO_MANY_REQUESTS {
                    // Throttled, but the session itself is fine
                    true
                } else {
                    status.is_success()
                }
            }
            Err(err) => {
                warn!("ZenPlanner session check failed: {}", err);
                false
            }
        }
    }

    pub async fn ensure_authenticated(&self) -> Result<(), TrackerError> {
        if self.is_logged_in().await {
            return Ok(());
        }
        self.login().await
    }

    pub fn close(&self) {
        self.set_status(AuthStatus::NotAuthenticated);
        debug!("ZenPlanner session closed");
    }
}

/// Map a ZenPlanner HTTP status onto the tracker's error kinds
pub fn check_status(status: StatusCode, context: &str) -> Result<(), TrackerError> {
    if status == StatusCode::TOO_MANY_REQUESTS {
        Err(TrackerError::RateLimited(format!("{} returned 429", context)))
    } else if status.is_server_error() {
        Err(TrackerError::ServerError(format!("{} returned {}", context, status)))
    } else if status.is_client_error() {
        Err(TrackerError::Network(format!("{} returned {}", context, status)))
    } else {
        Ok(())
    }
}

/// Pull the anti-forgery token out of the login form
pub fn extract_login_token(html: &str) -> Result<String, TrackerError> {
    find_tags(html, "input")
        .into_iter()
        .find(|tag| tag.attr("name") == Some("__xsToken"))
        .and_then(|tag| tag.attr("value").map(str::to_string))
        .filter(|token| !token.is_empty())
        .ok_or_else(|| TrackerError::Parse("login page: __xsToken not found".to_string()))
}
