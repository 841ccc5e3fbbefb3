//! Serverless job API

use reqwest::{Response, StatusCode};
use serde::Serialize;
use tracing::{debug, error};

use crate::errors::DeployError;
use crate::http::client::HttpClient;
use crate::models::job::RemoteJob;
use crate::models::request::ExecutionMode;
use crate::package::artifact::Payload;

/// Request body for `run` and `runsync`
#[derive(Debug, Serialize)]
struct SubmitBody<'a> {
    input: &'a Payload,
}

/// Result of a single submission attempt
#[derive(Debug, Clone)]
pub enum SubmitOutcome {
    /// The endpoint took the job
    Accepted(RemoteJob),

    /// HTTP 429; the caller decides whether to retry
    RateLimited,
}

/// Path of the submission route for a mode
pub fn submit_path(endpoint_id: &str, mode: ExecutionMode) -> String {
    match mode {
        ExecutionMode::Sync => format!("/v2/{}/runsync", endpoint_id),
        ExecutionMode::Async => format!("/v2/{}/run", endpoint_id),
    }
}

/// Path of the status route for a job
pub fn status_path(endpoint_id: &str, job_id: &str) -> String {
    format!("/v2/{}/status/{}", endpoint_id, job_id)
}

/// Replace reqwest timeouts with an error naming the endpoint
fn rewrite_timeout(err: DeployError, endpoint_id: &str) -> DeployError {
    match err {
        DeployError::NetworkError(e) if e.is_timeout() => DeployError::Timeout {
            endpoint_id: endpoint_id.to_string(),
        },
        other => other,
    }
}

async fn read_job(response: Response, endpoint_id: &str) -> Result<RemoteJob, DeployError> {
    let body = response
        .text()
        .await
        .map_err(|e| rewrite_timeout(e.into(), endpoint_id))?;
    serde_json::from_str(&body)
        .map_err(|e| DeployError::InvalidResponse(format!("{}: {}", e, body)))
}

impl HttpClient {
    /// Submit a payload once
    pub async fn submit_job(
        &self,
        endpoint_id: &str,
        mode: ExecutionMode,
        payload: &Payload,
    ) -> Result<SubmitOutcome, DeployError> {
        let path = submit_path(endpoint_id, mode);
        let response = self
            .post(&path, &SubmitBody { input: payload })
            .await
            .map_err(|e| rewrite_timeout(e, endpoint_id))?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Ok(SubmitOutcome::RateLimited);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("Job submission failed: {} - {}", status, body);
            return Err(DeployError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let job = read_job(response, endpoint_id).await?;
        debug!("Submitted job {:?} to {} ({})", job.id, endpoint_id, mode);
        Ok(SubmitOutcome::Accepted(job))
    }

    /// Fetch the current state of a job
    pub async fn job_status(&self, endpoint_id: &str, job_id: &str) -> Result<RemoteJob, DeployError> {
        let path = status_path(endpoint_id, job_id);
        let response = self
            .get(&path)
            .await
            .map_err(|e| rewrite_timeout(e, endpoint_id))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("Status check for job {} failed: {} - {}", job_id, status, body);
            return Err(DeployError::PollFailed {
                status: status.as_u16(),
                body,
            });
        }

        read_job(response, endpoint_id).await
    }
}
