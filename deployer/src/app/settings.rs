//! Settings file management

use std::path::Path;
use std::time::Duration;

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::app::options::{
    ClientOptions, DeployOptions, PollOptions, RateLimitOptions, DEFAULT_BASE_URL,
};
use crate::errors::DeployError;
use crate::filesys::file::File;
use crate::logs::LogLevel;
use crate::utils::BackoffOptions;

/// Deployer settings, read from an optional JSON file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,

    /// Remote API configuration
    #[serde(default)]
    pub api: ApiSettings,

    /// Rate-limit retry configuration
    #[serde(default)]
    pub rate_limit: RateLimitSettings,

    /// Status polling configuration
    #[serde(default)]
    pub polling: PollingSettings,
}

impl Settings {
    /// Load settings from a JSON file
    pub async fn load(path: &Path) -> Result<Self, DeployError> {
        File::new(path).read_json::<Settings>().await
    }

    /// Build deployment options, attaching the API key
    pub fn to_options(&self, api_key: Option<SecretString>) -> Result<DeployOptions, DeployError> {
        let base_url = Url::parse(&self.api.base_url).map_err(|e| {
            DeployError::ConfigError(format!("Invalid API base URL {}: {}", self.api.base_url, e))
        })?;
        if !matches!(base_url.scheme(), "http" | "https") {
            return Err(DeployError::ConfigError(format!(
                "Unsupported API base URL scheme: {}",
                base_url.scheme()
            )));
        }
        if self.rate_limit.max_attempts == 0 {
            return Err(DeployError::ConfigError(
                "rate_limit.max_attempts must be at least 1".to_string(),
            ));
        }
        require_nonzero("api.request_timeout_secs", self.api.request_timeout_secs)?;
        require_nonzero("rate_limit.initial_backoff_ms", self.rate_limit.initial_backoff_ms)?;
        require_nonzero("polling.interval_secs", self.polling.interval_secs)?;

        Ok(DeployOptions {
            client: ClientOptions {
                base_url: self.api.base_url.clone(),
                request_timeout: Duration::from_secs(self.api.request_timeout_secs),
                api_key,
            },
            rate_limit: RateLimitOptions {
                max_attempts: self.rate_limit.max_attempts,
                backoff: BackoffOptions {
                    base_delay: Duration::from_millis(self.rate_limit.initial_backoff_ms),
                    ..Default::default()
                },
            },
            polling: PollOptions {
                interval: Duration::from_secs(self.polling.interval_secs),
                deadline: self.polling.deadline_secs.map(Duration::from_secs),
            },
        })
    }
}

/// Durations configured in whole units must be positive
fn require_nonzero(field: &str, value: u64) -> Result<(), DeployError> {
    if value == 0 {
        return Err(DeployError::ConfigError(format!(
            "{} must be greater than zero",
            field
        )));
    }
    Ok(())
}

/// Remote API settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiSettings {
    /// Base URL for the RunPod API
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Per-request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_request_timeout() -> u64 {
    30
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

/// Rate-limit retry settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitSettings {
    /// Total submission attempts
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// First backoff delay in milliseconds, doubled on each retry
    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_ms: u64,
}

fn default_max_attempts() -> u32 {
    5
}

fn default_initial_backoff() -> u64 {
    1000
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff(),
        }
    }
}

/// Polling settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollingSettings {
    /// Seconds between status checks
    #[serde(default = "default_poll_interval")]
    pub interval_secs: u64,

    /// Optional overall deadline in seconds
    #[serde(default)]
    pub deadline_secs: Option<u64>,
}

fn default_poll_interval() -> u64 {
    2
}

impl Default for PollingSettings {
    fn default() -> Self {
        Self {
            interval_secs: default_poll_interval(),
            deadline_secs: None,
        }
    }
}
