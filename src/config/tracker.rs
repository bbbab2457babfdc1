use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::TrackerError;

/// Tracker configuration, loaded from `~/.fulcrum-tracker/config.toml`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackerConfig {
    #[serde(default)]
    pub zenplanner: ZenPlannerConfig,

    #[serde(default)]
    pub google: GoogleConfig,

    #[serde(default)]
    pub billing: BillingConfig,

    #[serde(default)]
    pub schedule: ScheduleConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default = "default_trainers")]
    pub trainers: Vec<String>,

    #[serde(default = "default_exercises")]
    pub exercises: Vec<ExerciseMapping>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZenPlannerConfig {
    #[serde(default = "default_zenplanner_url")]
    pub base_url: String,

    #[serde(default)]
    pub username: String,

    #[serde(default)]
    pub password: String,

    /// Member GUID; detected from the PR page when unset
    #[serde(default)]
    pub user_id: Option<String>,

    #[serde(default = "default_start_date")]
    pub start_date: NaiveDate,

    #[serde(default = "default_request_delay_ms")]
    pub request_delay_ms: u64,

    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    #[serde(default = "default_max_login_retries")]
    pub max_login_retries: u32,

    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,

    #[serde(default = "default_rate_limit_cooldown")]
    pub rate_limit_cooldown_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoogleConfig {
    #[serde(default)]
    pub service_account_path: PathBuf,

    #[serde(default)]
    pub calendar_id: String,

    /// Calendar the gym publishes its daily programming on
    #[serde(default = "default_workout_calendar_id")]
    pub workout_calendar_id: String,

    #[serde(default = "default_search_terms")]
    pub search_terms: Vec<String>,

    #[serde(default = "default_calendar_api_url")]
    pub api_base_url: String,

    /// Overrides the `token_uri` from the service account file
    #[serde(default)]
    pub token_url: Option<String>,

    #[serde(default = "default_cache_ttl")]
    pub cache_ttl_seconds: u64,

    #[serde(default = "default_lookahead_days")]
    pub lookahead_days: i64,

    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BillingConfig {
    /// Membership fee per month; cost sensors stay at zero without it
    #[serde(default)]
    pub monthly_cost: Option<f64>,

    /// First billed day of the current membership
    #[serde(default)]
    pub start_date: Option<NaiveDate>,

    #[serde(default)]
    pub payments: Vec<Payment>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub amount: f64,
    pub date: NaiveDate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    #[serde(default = "default_update_interval")]
    pub update_interval_minutes: u64,

    /// Delay before the first refresh on a fresh install
    #[serde(default = "default_initial_delay")]
    pub initial_delay_seconds: u64,

    /// Delay before the first refresh when history is already stored
    #[serde(default = "default_resume_delay")]
    pub resume_delay_seconds: u64,

    #[serde(default = "default_incremental_window")]
    pub incremental_window_days: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_state_path")]
    pub path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExerciseMapping {
    pub kind: String,
    pub patterns: Vec<String>,
}

// Default value functions
fn default_zenplanner_url() -> String {
    "https://fulcrum.sites.zenplanner.com".to_string()
}

fn default_start_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2021, 11, 1).unwrap_or_default()
}

fn default_request_delay_ms() -> u64 {
    1000
}

fn default_timeout() -> u64 {
    30
}

fn default_max_login_retries() -> u32 {
    3
}

fn default_retry_base_delay_ms() -> u64 {
    1000
}

fn default_rate_limit_cooldown() -> u64 {
    60
}

fn default_workout_calendar_id() -> String {
    "eoe8p4iqvtneb7iffpdps3ddpc@group.calendar.google.com".to_string()
}

fn default_search_terms() -> Vec<String> {
    vec!["Fulcrum".to_string()]
}

fn default_calendar_api_url() -> String {
    "https://www.googleapis.com/calendar/v3".to_string()
}

fn default_cache_ttl() -> u64 {
    15 * 60
}

fn default_lookahead_days() -> i64 {
    30
}

fn default_update_interval() -> u64 {
    30
}

fn default_initial_delay() -> u64 {
    30
}

fn default_resume_delay() -> u64 {
    5 * 60
}

fn default_incremental_window() -> i64 {
    2
}

fn default_state_path() -> PathBuf {
    TrackerConfig::config_dir()
        .map(|dir| dir.join("state.json"))
        .unwrap_or_else(|_| PathBuf::from("fulcrum-tracker-state.json"))
}

fn default_trainers() -> Vec<String> {
    [
        "ash", "cate", "charlotte", "cheryl", "curtis", "dakayla", "devon", "ellis", "emma",
        "eric", "genevieve", "reggie", "shane", "shelby", "sonia", "sydney", "walter", "zei",
    ]
    .iter()
    .map(|name| name.to_string())
    .collect()
}

fn default_exercises() -> Vec<ExerciseMapping> {
    let mapping = |kind: &str, patterns: &[&str]| ExerciseMapping {
        kind: kind.to_string(),
        patterns: patterns.iter().map(|p| p.to_string()).collect(),
    };

    vec![
        mapping("back_squat", &["back squat"]),
        mapping("front_squat", &["front squat"]),
        mapping("deadlift", &["deadlift"]),
        mapping("bench_press", &["bench press", "bench"]),
        mapping("strict_press", &["strict press", "shoulder press", "overhead press"]),
        mapping("push_press", &["push press"]),
        mapping("clean_and_jerk", &["clean and jerk", "clean & jerk"]),
        mapping("power_clean", &["power clean"]),
        mapping("snatch", &["snatch"]),
        mapping("pull_ups", &["pull-up", "pull up", "pullup"]),
        mapping("row_500m", &["500m row", "500 m row", "row 500"]),
        mapping("mile_run", &["mile run", "1 mile"]),
    ]
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            zenplanner: ZenPlannerConfig::default(),
            google: GoogleConfig::default(),
            billing: BillingConfig::default(),
            schedule: ScheduleConfig::default(),
            storage: StorageConfig::default(),
            trainers: default_trainers(),
            exercises: default_exercises(),
        }
    }
}

impl Default for ZenPlannerConfig {
    fn default() -> Self {
        Self {
            base_url: default_zenplanner_url(),
            username: String::new(),
            password: String::new(),
            user_id: None,
            start_date: default_start_date(),
            request_delay_ms: default_request_delay_ms(),
            timeout_seconds: default_timeout(),
            max_login_retries: default_max_login_retries(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            rate_limit_cooldown_seconds: default_rate_limit_cooldown(),
        }
    }
}

impl Default for GoogleConfig {
    fn default() -> Self {
        Self {
            service_account_path: PathBuf::new(),
            calendar_id: String::new(),
            workout_calendar_id: default_workout_calendar_id(),
            search_terms: default_search_terms(),
            api_base_url: default_calendar_api_url(),
            token_url: None,
            cache_ttl_seconds: default_cache_ttl(),
            lookahead_days: default_lookahead_days(),
            timeout_seconds: default_timeout(),
        }
    }
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            update_interval_minutes: default_update_interval(),
            initial_delay_seconds: default_initial_delay(),
            resume_delay_seconds: default_resume_delay(),
            incremental_window_days: default_incremental_window(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: default_state_path(),
        }
    }
}

impl ScheduleConfig {
    pub fn update_interval(&self) -> Duration {
        Duration::from_secs(self.update_interval_minutes * 60)
    }

    /// First-refresh delay, shorter when no history has been collected yet
    pub fn startup_delay(&self, history_loaded: bool) -> Duration {
        if history_loaded {
            Duration::from_secs(self.resume_delay_seconds)
        } else {
            Duration::from_secs(self.initial_delay_seconds)
        }
    }
}

impl TrackerConfig {
    /// Get config directory path (~/.fulcrum-tracker/)
    pub fn config_dir() -> Result<PathBuf, TrackerError> {
        let home = dirs::home_dir()
            .ok_or_else(|| TrackerError::Config("Could not find home directory".to_string()))?;
        Ok(home.join(".fulcrum-tracker"))
    }

    /// Get config file path (~/.fulcrum-tracker/config.toml)
    pub fn config_file() -> Result<PathBuf, TrackerError> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Load configuration from a file (or the default location), apply
    /// environment overrides and validate the result
    pub fn load(path: Option<&Path>) -> Result<Self, TrackerError> {
        let config_file = match path {
            Some(path) => path.to_path_buf(),
            None => Self::config_file()?,
        };

        let mut config = if config_file.exists() {
            let contents = fs::read_to_string(&config_file)?;
            Self::from_toml(&contents)?
        } else {
            tracing::info!(
                "Config file {} not found, using defaults",
                config_file.display()
            );
            Self::default()
        };

        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(contents: &str) -> Result<Self, TrackerError> {
        toml::from_str(contents)
            .map_err(|e| TrackerError::Config(format!("Failed to parse config file: {}", e)))
    }

    /// Secrets and deployment-specific values may come from the environment
    pub fn apply_env_overrides(&mut self) -> Result<(), TrackerError> {
        if let Ok(username) = env::var("FULCRUM_ZENPLANNER_USERNAME") {
            self.zenplanner.username = username;
        }
        if let Ok(password) = env::var("FULCRUM_ZENPLANNER_PASSWORD") {
            self.zenplanner.password = password;
        }
        if let Ok(path) = env::var("FULCRUM_GOOGLE_SERVICE_ACCOUNT") {
            self.google.service_account_path = PathBuf::from(path);
        }
        if let Ok(calendar_id) = env::var("FULCRUM_GOOGLE_CALENDAR_ID") {
            self.google.calendar_id = calendar_id;
        }
        if let Ok(path) = env::var("FULCRUM_STATE_PATH") {
            self.storage.path = PathBuf::from(path);
        }
        if let Ok(cost) = env::var("FULCRUM_MONTHLY_COST") {
            let cost = cost.parse::<f64>().map_err(|_| {
                TrackerError::Config(format!("FULCRUM_MONTHLY_COST is not a number: {}", cost))
            })?;
            self.billing.monthly_cost = Some(cost);
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), TrackerError> {
        if self.zenplanner.username.trim().is_empty() || self.zenplanner.password.is_empty() {
            return Err(TrackerError::Config(
                "ZenPlanner username and password are required".to_string(),
            ));
        }
        if self.google.calendar_id.trim().is_empty() {
            return Err(TrackerError::Config(
                "Google calendar_id is required".to_string(),
            ));
        }
        if self.google.search_terms.is_empty() {
            return Err(TrackerError::Config(
                "At least one calendar search term is required".to_string(),
            ));
        }
        if self.schedule.update_interval_minutes == 0 {
            return Err(TrackerError::Config(
                "update_interval_minutes must be greater than zero".to_string(),
            ));
        }
        if let Some(cost) = self.billing.monthly_cost {
            if !cost.is_finite() || cost < 0.0 {
                return Err(TrackerError::Config(format!(
                    "monthly_cost must be a non-negative number, got {}",
                    cost
                )));
            }
        }
        Ok(())
    }

    /// Trainer roster, lower-cased with duplicates removed
    pub fn trainer_roster(&self) -> Vec<String> {
        let mut roster: Vec<String> = Vec::new();
        for trainer in &self.trainers {
            let name = trainer.trim().to_lowercase();
            if !name.is_empty() && !roster.contains(&name) {
                roster.push(name);
            }
        }
        roster
    }

    pub fn exercise_kinds(&self) -> Vec<String> {
        self.exercises.iter().map(|e| e.kind.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn valid_config() -> TrackerConfig {
        let mut config = TrackerConfig::default();
        config.zenplanner.username = "member@example.com".to_string();
        config.zenplanner.password = "hunter2".to_string();
        config.google.calendar_id = "member@gmail.com".to_string();
        config
    }

    #[test]
    fn test_default_config() {
        let config = TrackerConfig::default();
        assert_eq!(config.zenplanner.base_url, "https://fulcrum.sites.zenplanner.com");
        assert_eq!(config.zenplanner.start_date.to_string(), "2021-11-01");
        assert_eq!(config.schedule.update_interval_minutes, 30);
        assert_eq!(config.google.cache_ttl_seconds, 900);
        assert!(config.billing.monthly_cost.is_none());
        assert!(config.trainers.contains(&"walter".to_string()));
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config = TrackerConfig::from_toml(
            r#"
            trainers = ["Ash", "ash", " Zei "]

            [zenplanner]
            username = "member@example.com"
            password = "secret"

            [google]
            calendar_id = "member@gmail.com"

            [billing]
            monthly_cost = 315.35
            start_date = "2023-09-15"
            payments = [{ amount = 96.0, date = "2021-11-08" }]
            "#,
        )
        .unwrap();

        assert_eq!(config.zenplanner.request_delay_ms, 1000);
        assert_eq!(config.google.search_terms, vec!["Fulcrum".to_string()]);
        assert_eq!(config.billing.monthly_cost, Some(315.35));
        assert_eq!(config.billing.payments.len(), 1);
        assert_eq!(config.trainer_roster(), vec!["ash".to_string(), "zei".to_string()]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_requires_credentials() {
        let mut config = valid_config();
        config.zenplanner.password.clear();
        assert!(matches!(config.validate(), Err(TrackerError::Config(_))));
    }

    #[test]
    fn test_validation_rejects_negative_cost() {
        let mut config = valid_config();
        config.billing.monthly_cost = Some(-1.0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_startup_delay_depends_on_history() {
        let schedule = ScheduleConfig::default();
        assert_eq!(schedule.startup_delay(false), Duration::from_secs(30));
        assert_eq!(schedule.startup_delay(true), Duration::from_secs(300));
    }

    #[test]
    #[serial]
    fn test_env_overrides() {
        env::set_var("FULCRUM_ZENPLANNER_USERNAME", "env-user");
        env::set_var("FULCRUM_MONTHLY_COST", "120.5");

        let mut config = TrackerConfig::default();
        let result = config.apply_env_overrides();

        env::remove_var("FULCRUM_ZENPLANNER_USERNAME");
        env::remove_var("FULCRUM_MONTHLY_COST");

        assert!(result.is_ok());
        assert_eq!(config.zenplanner.username, "env-user");
        assert_eq!(config.billing.monthly_cost, Some(120.5));
    }

    #[test]
    #[serial]
    fn test_env_override_rejects_bad_cost() {
        env::set_var("FULCRUM_MONTHLY_COST", "lots");
        let mut config = TrackerConfig::default();
        let result = config.apply_env_overrides();
        env::remove_var("FULCRUM_MONTHLY_COST");

        assert!(result.is_err());
    }
}
