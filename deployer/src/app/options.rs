//! Deployment configuration options

use std::time::Duration;

use secrecy::SecretString;

use crate::utils::BackoffOptions;

/// Default RunPod API base URL
pub const DEFAULT_BASE_URL: &str = "https://api.runpod.ai";

/// Main deployment options
#[derive(Debug, Clone, Default)]
pub struct DeployOptions {
    /// HTTP client configuration
    pub client: ClientOptions,

    /// Retry policy for rate-limited submissions
    pub rate_limit: RateLimitOptions,

    /// Status polling configuration
    pub polling: PollOptions,
}

/// HTTP client options
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// API base URL
    pub base_url: String,

    /// Per-request timeout
    pub request_timeout: Duration,

    /// Bearer token; requests fail without one
    pub api_key: Option<SecretString>,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout: Duration::from_secs(30),
            api_key: None,
        }
    }
}

/// Rate-limit retry options
#[derive(Debug, Clone)]
pub struct RateLimitOptions {
    /// Total submission attempts, including the first
    pub max_attempts: u32,

    /// Delay growth between attempts
    pub backoff: BackoffOptions,
}

impl Default for RateLimitOptions {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            backoff: BackoffOptions::default(),
        }
    }
}

/// Status polling options
#[derive(Debug, Clone)]
pub struct PollOptions {
    /// Fixed wait between non-terminal polls
    pub interval: Duration,

    /// Give up once this much time has passed since submission
    pub deadline: Option<Duration>,
}

impl Default for PollOptions {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(2),
            deadline: None,
        }
    }
}
