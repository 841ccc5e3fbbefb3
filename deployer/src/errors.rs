//! Error types for rundeploy

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for the deployment pipeline
#[derive(Error, Debug)]
pub enum DeployError {
    #[error("No API key configured (set RUNPOD_API_KEY)")]
    MissingCredential,

    #[error("Failed to read {}: {source}", .path.display())]
    PathRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Payload too large: {actual_mb:.1}MiB exceeds {limit_mb:.1}MiB limit for {mode} mode")]
    PayloadTooLarge {
        actual_mb: f64,
        limit_mb: f64,
        mode: &'static str,
    },

    #[error("Rate limited by the endpoint: gave up after {attempts} attempts")]
    RateLimitExhausted { attempts: u32 },

    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Request to endpoint {endpoint_id} timed out")]
    Timeout { endpoint_id: String },

    #[error("Status check failed: HTTP {status}: {body}")]
    PollFailed { status: u16, body: String },

    #[error("Deployment cancelled")]
    Cancelled,

    #[error("Job {job_id} did not finish before the deadline")]
    DeadlineExceeded { job_id: String },

    #[error("Invalid response from endpoint: {0}")]
    InvalidResponse(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Archive error: {0}")]
    ArchiveError(#[from] zip::result::ZipError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl DeployError {
    /// Wrap an I/O error with the path that produced it
    pub fn path_read(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        DeployError::PathRead {
            path: path.into(),
            source,
        }
    }
}

impl From<anyhow::Error> for DeployError {
    fn from(err: anyhow::Error) -> Self {
        DeployError::Internal(err.to_string())
    }
}
