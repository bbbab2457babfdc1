use chrono::{DateTime, Duration as ChronoDuration, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::config::GoogleConfig;
use crate::error::TrackerError;

pub const CALENDAR_READONLY_SCOPE: &str = "https://www.googleapis.com/auth/calendar.readonly";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const DEFAULT_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

/// Tokens are refreshed this long before Google says they expire
const EXPIRY_MARGIN_SECONDS: i64 = 300;

/// The fields of a Google service account key file we need
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default)]
    pub token_uri: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ServiceAccountClaims {
    pub iss: String,
    pub scope: String,
    pub aud: String,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: i64,
}

fn default_expires_in() -> i64 {
    3600
}

#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    refresh_at: DateTime<Utc>,
}

/// Exchanges a signed service account assertion for calendar access tokens
pub struct GoogleServiceAccountAuth {
    client: Client,
    key_path: PathBuf,
    token_url_override: Option<String>,
    token: Mutex<Option<CachedToken>>,
}

impl GoogleServiceAccountAuth {
    pub fn new(config: &GoogleConfig) -> Result<Self, TrackerError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        Ok(Self {
            client,
            key_path: config.service_account_path.clone(),
            token_url_override: config.token_url.clone(),
            token: Mutex::new(None),
        })
    }

    pub async fn load_key(&self) -> Result<ServiceAccountKey, TrackerError> {
        let contents = tokio::fs::read_to_string(&self.key_path).await.map_err(|e| {
            TrackerError::CalendarAuth(format!(
                "Cannot read service account file {}: {}",
                self.key_path.display(),
                e
            ))
        })?;

        serde_json::from_str(&contents)
            .map_err(|e| TrackerError::CalendarAuth(format!("Invalid service account file: {}", e)))
    }

    fn token_url(&self, key: &ServiceAccountKey) -> String {
        self.token_url_override
            .clone()
            .or_else(|| key.token_uri.clone())
            .unwrap_or_else(|| DEFAULT_TOKEN_URL.to_string())
    }

    /// Current access token, exchanging a new assertion when the cached one is due
    pub async fn access_token(&self) -> Result<String, TrackerError> {
        let mut cached = self.token.lock().await;
        let now = Utc::now();

        if let Some(token) = cached.as_ref() {
            if now < token.refresh_at {
                return Ok(token.access_token.clone());
            }
        }

        let key = self.load_key().await?;
        let token_url = self.token_url(&key);
        let assertion = sign_assertion(&key, &token_url, now)?;

        debug!("Requesting Google access token for {}", key.client_email);
        let response = self
            .client
            .post(&token_url)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await
            .map_err(|e| TrackerError::CalendarAuth(format!("Token request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(TrackerError::CalendarAuth(format!(
                "Token endpoint returned {}: {}",
                status, body
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| TrackerError::CalendarAuth(format!("Invalid token response: {}", e)))?;

        let lifetime = (token.expires_in - EXPIRY_MARGIN_SECONDS).max(0);
        info!("Obtained Google access token valid for {}s", token.expires_in);

        *cached = Some(CachedToken {
            access_token: token.access_token.clone(),
            refresh_at: now + ChronoDuration::seconds(lifetime),
        });
        Ok(token.access_token)
    }

    /// Drop the cached token, e.g. after the API rejected it
    pub async fn invalidate(&self) {
        *self.token.lock().await = None;
    }
}

/// RS256 assertion for the calendar read-only scope, valid for one hour
pub fn sign_assertion(
    key: &ServiceAccountKey,
    token_url: &str,
    now: DateTime<Utc>,
) -> Result<String, TrackerError> {
    let claims = ServiceAccountClaims {
        iss: key.client_email.clone(),
        scope: CALENDAR_READONLY_SCOPE.to_string(),
        aud: token_url.to_string(),
        iat: now.timestamp(),
        exp: (now + ChronoDuration::hours(1)).timestamp(),
    };

    let encoding_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())?;
    Ok(encode(&Header::new(Algorithm::RS256), &claims, &encoding_key)?)
}
