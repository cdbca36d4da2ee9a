//! Configuration management for the client.

use crate::{CoreError, CoreResult, Paths};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use url::Url;

/// Default API base URL (can be overridden at compile time via SAURON_API_URL env var).
pub const DEFAULT_API_BASE_URL: &str = match option_env!("SAURON_API_URL") {
    Some(url) => url,
    None => "https://api.sauron.digital",
};

/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// How often the background scheduler checks the access token.
pub const DEFAULT_REFRESH_CHECK_INTERVAL_SECS: u64 = 60;

/// How close to expiry an access token must be before it is refreshed.
pub const DEFAULT_EXPIRY_HORIZON_SECS: u64 = 300;

/// Main client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Base URL of the REST API, without a trailing slash.
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    /// Seconds between background token checks.
    #[serde(default = "default_refresh_check_interval_secs")]
    pub refresh_check_interval_secs: u64,
    /// Refresh once the access token expires within this many seconds.
    #[serde(default = "default_expiry_horizon_secs")]
    pub expiry_horizon_secs: u64,
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_api_base_url() -> String {
    DEFAULT_API_BASE_URL.to_string()
}

fn default_refresh_check_interval_secs() -> u64 {
    DEFAULT_REFRESH_CHECK_INTERVAL_SECS
}

fn default_expiry_horizon_secs() -> u64 {
    DEFAULT_EXPIRY_HORIZON_SECS
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            api_base_url: default_api_base_url(),
            refresh_check_interval_secs: DEFAULT_REFRESH_CHECK_INTERVAL_SECS,
            expiry_horizon_secs: DEFAULT_EXPIRY_HORIZON_SECS,
        }
    }
}

impl Config {
    /// Load configuration from the config file, falling back to defaults.
    /// Environment variables take precedence over the file.
    pub fn load(paths: &Paths) -> CoreResult<Self> {
        let config_path = paths.config_file();

        let mut config = if config_path.exists() {
            Self::load_from_file(&config_path)?
        } else {
            Self::default()
        };

        config.load_from_env();
        config.validate()?;

        Ok(config)
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: &Path) -> CoreResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    fn load_from_env(&mut self) {
        if let Some(level) = non_empty_env("SAURON_LOG_LEVEL") {
            self.log_level = level;
        }
        if let Some(url) = non_empty_env("SAURON_API_URL") {
            self.api_base_url = url;
        }
    }

    /// Check that the values are usable.
    pub fn validate(&self) -> CoreResult<()> {
        self.api_base_url()?;
        if self.refresh_check_interval_secs == 0 {
            return Err(CoreError::Config(
                "refresh_check_interval_secs must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Get the API base URL as a parsed URL.
    pub fn api_base_url(&self) -> CoreResult<Url> {
        Url::parse(&self.api_base_url).map_err(CoreError::from)
    }

    /// API base URL with any trailing slash removed, ready for path joins.
    pub fn api_base(&self) -> &str {
        self.api_base_url.trim_end_matches('/')
    }

    pub fn refresh_check_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_check_interval_secs)
    }

    pub fn expiry_horizon(&self) -> Duration {
        Duration::from_secs(self.expiry_horizon_secs)
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|raw| raw.trim().to_string())
        .filter(|value| !value.is_empty())
}
