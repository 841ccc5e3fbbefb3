//! Status polling for asynchronous jobs

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::app::options::PollOptions;
use crate::errors::DeployError;
use crate::http::client::HttpClient;
use crate::models::job::{JobSnapshot, JobStatus};
use crate::utils::{run_or_cancel, sleep_or_cancel, Sleeper};

/// Poll a job until it completes or fails
///
/// Waits a fixed interval between polls. Without a deadline the loop only
/// ends on a terminal status, an HTTP failure, or cancellation.
pub async fn wait_for_completion(
    client: &HttpClient,
    sleeper: &dyn Sleeper,
    options: &PollOptions,
    endpoint_id: &str,
    job_id: &str,
    deadline: Option<Instant>,
    cancel: &CancellationToken,
) -> Result<JobSnapshot, DeployError> {
    let mut polls: u32 = 0;

    loop {
        let job = run_or_cancel(cancel, client.job_status(endpoint_id, job_id)).await?;
        polls += 1;

        let status = job
            .status
            .as_deref()
            .map(JobStatus::from_remote)
            .unwrap_or(JobStatus::Running);

        if status.is_terminal() {
            info!("Job {} finished as {} after {} polls", job_id, status.as_str(), polls);
            let error = job.error_message();
            return Ok(JobSnapshot {
                job_id: job.id.unwrap_or_else(|| job_id.to_string()),
                status,
                output: job.output,
                error,
            });
        }

        debug!("Job {} is {}, checking again in {:?}", job_id, status.as_str(), options.interval);

        match deadline {
            Some(deadline) => {
                if Instant::now() >= deadline {
                    return Err(deadline_exceeded(job_id));
                }
                // The wait itself must not carry the poll past the deadline.
                tokio::select! {
                    biased;
                    slept = sleep_or_cancel(sleeper, options.interval, cancel) => slept?,
                    _ = tokio::time::sleep_until(deadline) => {
                        return Err(deadline_exceeded(job_id));
                    }
                }
            }
            None => sleep_or_cancel(sleeper, options.interval, cancel).await?,
        }
    }
}

fn deadline_exceeded(job_id: &str) -> DeployError {
    info!("Job {} still running at the deadline", job_id);
    DeployError::DeadlineExceeded {
        job_id: job_id.to_string(),
    }
}
