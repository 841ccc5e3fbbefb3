//! Job submission with rate-limit backoff

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::app::options::RateLimitOptions;
use crate::errors::DeployError;
use crate::http::client::HttpClient;
use crate::http::jobs::SubmitOutcome;
use crate::models::job::{JobSnapshot, JobStatus, RemoteJob, SYNC_JOB_ID};
use crate::models::request::ExecutionMode;
use crate::package::artifact::Payload;
use crate::utils::{calc_exp_backoff, run_or_cancel, sleep_or_cancel, Sleeper};

/// Submit a payload, retrying only on HTTP 429
///
/// Every retry re-sends the full payload. Other failures return at once.
pub async fn submit_with_retry(
    client: &HttpClient,
    sleeper: &dyn Sleeper,
    options: &RateLimitOptions,
    endpoint_id: &str,
    mode: ExecutionMode,
    payload: &Payload,
    cancel: &CancellationToken,
) -> Result<JobSnapshot, DeployError> {
    let max_attempts = options.max_attempts.max(1);

    for attempt in 0..max_attempts {
        let outcome =
            run_or_cancel(cancel, client.submit_job(endpoint_id, mode, payload)).await?;

        match outcome {
            SubmitOutcome::Accepted(job) => {
                if attempt > 0 {
                    info!("Submission to {} accepted after {} attempts", endpoint_id, attempt + 1);
                }
                return normalize_submission(mode, job);
            }
            SubmitOutcome::RateLimited if attempt + 1 < max_attempts => {
                let delay = calc_exp_backoff(&options.backoff, attempt);
                warn!(
                    "Rate limited by {} (attempt {}/{}), retrying in {:?}",
                    endpoint_id,
                    attempt + 1,
                    max_attempts,
                    delay
                );
                sleep_or_cancel(sleeper, delay, cancel).await?;
            }
            SubmitOutcome::RateLimited => {
                warn!("Rate limited by {} on final attempt {}", endpoint_id, attempt + 1);
            }
        }
    }

    Err(DeployError::RateLimitExhausted {
        attempts: max_attempts,
    })
}

/// Shape a submission response according to the mode
///
/// `runsync` results pass through with defaults filled in. `run` only
/// acknowledges the job, so the result is queued and carries no output.
pub fn normalize_submission(mode: ExecutionMode, job: RemoteJob) -> Result<JobSnapshot, DeployError> {
    match mode {
        ExecutionMode::Sync => {
            let error = job.error_message();
            Ok(JobSnapshot {
                job_id: job.id.unwrap_or_else(|| SYNC_JOB_ID.to_string()),
                status: job
                    .status
                    .as_deref()
                    .map(JobStatus::from_remote)
                    .unwrap_or(JobStatus::Completed),
                output: job.output,
                error,
            })
        }
        ExecutionMode::Async => {
            let job_id = job.id.ok_or_else(|| {
                DeployError::InvalidResponse("asynchronous submission returned no job id".to_string())
            })?;
            Ok(JobSnapshot {
                job_id,
                status: JobStatus::Queued,
                output: None,
                error: None,
            })
        }
    }
}
