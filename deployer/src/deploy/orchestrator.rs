//! Deployment orchestrator
//!
//! Runs one deployment end to end: pack, validate, submit, and for
//! asynchronous jobs poll until the job reaches a terminal status.

use std::sync::Arc;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument};

use crate::app::options::DeployOptions;
use crate::deploy::poller::wait_for_completion;
use crate::deploy::submit::submit_with_retry;
use crate::errors::DeployError;
use crate::http::client::HttpClient;
use crate::models::job::JobResult;
use crate::models::request::{DeployArgs, DeployRequest, ExecutionMode};
use crate::package::artifact::Payload;
use crate::package::packager;
use crate::package::validate::check_payload_size;
use crate::utils::{Sleeper, TokioSleeper};

/// Deploys local code to serverless endpoints
///
/// Holds no per-deployment state, so one instance can serve concurrent
/// `deploy` calls.
#[derive(Clone)]
pub struct Deployer {
    client: HttpClient,
    options: DeployOptions,
    sleeper: Arc<dyn Sleeper>,
}

impl Deployer {
    /// Create a deployer from options
    pub fn new(options: DeployOptions) -> Result<Self, DeployError> {
        let client = HttpClient::new(&options.client)?;
        Ok(Self {
            client,
            options,
            sleeper: Arc::new(TokioSleeper),
        })
    }

    /// Replace the sleeper used for backoff and poll waits
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Deploy from caller-facing arguments
    pub async fn deploy_args(
        &self,
        args: DeployArgs,
        cancel: &CancellationToken,
    ) -> Result<JobResult, DeployError> {
        self.deploy(&DeployRequest::from(args), cancel).await
    }

    /// Deploy and wait for the final result
    ///
    /// Asynchronous requests still block until the job completes or fails;
    /// `cancel` and the configured poll deadline bound that wait.
    #[instrument(skip_all, fields(endpoint = %request.endpoint_id(), mode = %request.mode()))]
    pub async fn deploy(
        &self,
        request: &DeployRequest,
        cancel: &CancellationToken,
    ) -> Result<JobResult, DeployError> {
        let source = request.source_path();
        let metadata = tokio::fs::metadata(source)
            .await
            .map_err(|e| DeployError::path_read(source, e))?;

        info!("Packaging {}", source.display());
        let artifact = packager::pack(source, metadata.is_dir()).await?;
        let payload = Payload::new(
            artifact,
            request.entrypoint().map(str::to_string),
            request.env().clone(),
        );

        let size = check_payload_size(&payload, request.mode())?;
        info!("Submitting {} byte payload", size);

        let started = Instant::now();
        let submitted = submit_with_retry(
            &self.client,
            self.sleeper.as_ref(),
            &self.options.rate_limit,
            request.endpoint_id(),
            request.mode(),
            &payload,
            cancel,
        )
        .await?;

        let finished = match request.mode() {
            ExecutionMode::Sync => submitted,
            ExecutionMode::Async => {
                info!("Job {} queued, polling for completion", submitted.job_id);
                let deadline = self.options.polling.deadline.map(|d| started + d);
                wait_for_completion(
                    &self.client,
                    self.sleeper.as_ref(),
                    &self.options.polling,
                    request.endpoint_id(),
                    &submitted.job_id,
                    deadline,
                    cancel,
                )
                .await?
            }
        };

        let duration = started.elapsed();
        info!(
            "Job {} {} in {:?}",
            finished.job_id,
            finished.status.as_str(),
            duration
        );

        Ok(JobResult {
            endpoint_id: request.endpoint_id().to_string(),
            job_id: finished.job_id,
            status: finished.status,
            duration,
            output: finished.output,
            error: finished.error,
            sync: request.mode().is_sync(),
        })
    }
}
