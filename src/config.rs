//! Configuration management for the sync engine

use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Base URL of the uptime monitor API, including the `/api` prefix
    pub api_url: String,

    /// Timeout applied to every gateway request
    pub http_timeout: Duration,

    /// Period of the background refresh
    pub refresh_interval: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:8080/api".to_string(),
            http_timeout: Duration::from_secs(10),
            refresh_interval: Duration::from_secs(30),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Defaults overridden by whatever `lookup` returns. Unparseable numbers
    /// keep the default.
    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Config::default();

        if let Some(api_url) = lookup("UPTIME_API_URL") {
            config.api_url = api_url.trim().to_string();
        }

        if let Some(timeout) = lookup("HTTP_TIMEOUT_SECONDS") {
            if let Ok(seconds) = timeout.parse::<u64>() {
                config.http_timeout = Duration::from_secs(seconds);
            }
        }

        if let Some(refresh) = lookup("REFRESH_INTERVAL_SECONDS") {
            if let Ok(seconds) = refresh.parse::<u64>() {
                config.refresh_interval = Duration::from_secs(seconds);
            }
        }

        config
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.api_url.is_empty() {
            return Err("api_url cannot be empty".to_string());
        }

        match url::Url::parse(&self.api_url) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {}
            Ok(url) => {
                return Err(format!("api_url scheme '{}' is not supported", url.scheme()));
            }
            Err(e) => return Err(format!("api_url is not a valid URL: {}", e)),
        }

        if self.http_timeout.is_zero() {
            return Err("http_timeout must be greater than 0".to_string());
        }

        if self.refresh_interval.is_zero() {
            return Err("refresh_interval must be greater than 0".to_string());
        }

        Ok(())
    }
}
