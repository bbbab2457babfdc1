use anyhow::Result;
use std::env;

/// Process-level settings for the daemon, read from the environment.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub config_path: Option<String>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let host = env::var("FULCRUM_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port = env::var("FULCRUM_PORT")
            .unwrap_or_else(|_| "8787".to_string())
            .parse()?;
        let log_level = env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
        let config_path = env::var("FULCRUM_TRACKER_CONFIG").ok();

        Ok(AppConfig {
            host,
            port,
            log_level,
            config_path,
        })
    }

    pub fn server_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_defaults_when_env_is_empty() {
        env::remove_var("FULCRUM_HOST");
        env::remove_var("FULCRUM_PORT");

        let config = AppConfig::from_env().unwrap();
        assert_eq!(config.server_address(), "0.0.0.0:8787");
    }

    #[test]
    #[serial]
    fn test_invalid_port_is_rejected() {
        env::set_var("FULCRUM_PORT", "not-a-port");
        let result = AppConfig::from_env();
        env::remove_var("FULCRUM_PORT");

        assert!(result.is_err());
    }
}
