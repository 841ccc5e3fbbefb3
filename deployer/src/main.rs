//! rundeploy - Entry Point
//!
//! Deploys a file or directory to a RunPod serverless endpoint and prints
//! the job result as JSON.

use std::collections::HashMap;
use std::env;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{anyhow, bail, Context};
use chrono::Local;
use colored::Colorize;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use rundeploy::app::settings::Settings;
use rundeploy::authn::credentials::api_key_from_env;
use rundeploy::logs::{init_logging, LogLevel, LogOptions};
use rundeploy::utils::version_info;
use rundeploy::{DeployArgs, Deployer, JobResult, JobStatus};

const USAGE: &str = "\
Usage: rundeploy --endpoint=<id> --path=<file|dir> [options]

Options:
  --entrypoint=<spec>     File or file:function the worker runs
  --env=KEY=VALUE         Environment variable for the job (repeatable)
  --sync                  Use runsync instead of run + polling
  --config=<file>         JSON settings file
  --log-level=<level>     trace, debug, info, warn or error
  --json-logs             Emit logs as JSON
  --version               Print version information

The API key is read from RUNPOD_API_KEY.";

#[tokio::main]
async fn main() -> ExitCode {
    // Parse command line arguments
    let mut cli_args: HashMap<String, String> = HashMap::new();
    let mut job_env: HashMap<String, String> = HashMap::new();

    for arg in env::args().skip(1) {
        if let Some((key, value)) = arg.split_once('=') {
            // Handle --key=value format
            let clean_key = key.trim_start_matches('-');
            if clean_key == "env" {
                match value.split_once('=') {
                    Some((name, val)) if !name.is_empty() => {
                        job_env.insert(name.to_string(), val.to_string());
                    }
                    _ => {
                        eprintln!("Invalid --env value (expected KEY=VALUE): {}", value);
                        return ExitCode::FAILURE;
                    }
                }
            } else {
                cli_args.insert(clean_key.to_string(), value.to_string());
            }
        } else if arg.starts_with("--") {
            // Handle standalone flags like --sync
            let clean_key = arg.trim_start_matches('-');
            cli_args.insert(clean_key.to_string(), "true".to_string());
        }
    }

    if cli_args.contains_key("version") {
        match serde_json::to_string_pretty(&version_info()) {
            Ok(json) => println!("{}", json),
            Err(e) => eprintln!("{}", e),
        }
        return ExitCode::SUCCESS;
    }

    if cli_args.contains_key("help") || cli_args.is_empty() {
        println!("{}", USAGE);
        return ExitCode::SUCCESS;
    }

    match run(cli_args, job_env).await {
        Ok(result) => {
            print_result(&result);
            if result.status == JobStatus::Failed {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            }
        }
        Err(e) => {
            error!("Deployment failed: {:#}", e);
            eprintln!("{} {:#}", "error:".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

async fn run(
    cli_args: HashMap<String, String>,
    job_env: HashMap<String, String>,
) -> anyhow::Result<JobResult> {
    // Retrieve the settings file
    let settings = match cli_args.get("config") {
        Some(path) => Settings::load(&PathBuf::from(path))
            .await
            .with_context(|| format!("Unable to read settings file {}", path))?,
        None => Settings::default(),
    };

    // Initialize logging
    let log_level = match cli_args.get("log-level") {
        Some(level) => level.parse::<LogLevel>().map_err(|e| anyhow!(e))?,
        None => settings.log_level.clone(),
    };
    let log_options = LogOptions {
        log_level,
        json_format: cli_args.contains_key("json-logs"),
    };
    if let Err(e) = init_logging(log_options) {
        eprintln!("Failed to initialize logging: {e}");
    }

    let Some(endpoint_id) = cli_args.get("endpoint") else {
        bail!("--endpoint is required\n\n{}", USAGE);
    };
    let Some(path) = cli_args.get("path") else {
        bail!("--path is required\n\n{}", USAGE);
    };

    let args = DeployArgs {
        endpoint_id: endpoint_id.clone(),
        workdir_or_file: path.clone(),
        entrypoint: cli_args.get("entrypoint").cloned(),
        env: job_env,
        sync: cli_args.contains_key("sync"),
    };

    let options = settings.to_options(api_key_from_env())?;
    let deployer = Deployer::new(options)?;

    let cancel = CancellationToken::new();
    tokio::spawn(cancel_on_shutdown_signal(cancel.clone()));

    info!("Deploying {} to endpoint {}", args.workdir_or_file, args.endpoint_id);
    let result = deployer.deploy_args(args, &cancel).await?;
    Ok(result)
}

fn print_result(result: &JobResult) {
    let status = match result.status {
        JobStatus::Completed => result.status.as_str().green().bold(),
        JobStatus::Failed => result.status.as_str().red().bold(),
        _ => result.status.as_str().yellow().bold(),
    };
    eprintln!(
        "[{}] job {} on {} {} in {:.1}s",
        Local::now().format("%H:%M:%S"),
        result.job_id,
        result.endpoint_id,
        status,
        result.duration.as_secs_f64()
    );

    match serde_json::to_string_pretty(result) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Failed to serialize result: {}", e),
    }
}

async fn cancel_on_shutdown_signal(cancel: CancellationToken) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = match signal(SignalKind::terminate()) {
            Ok(s) => s,
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                return;
            }
        };

        tokio::select! {
            _ = sigterm.recv() => {
                info!("SIGTERM received, cancelling deployment...");
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Ctrl+C received, cancelling deployment...");
            }
        }
    }

    #[cfg(not(unix))]
    {
        if tokio::signal::ctrl_c().await.is_err() {
            return;
        }
        info!("Ctrl+C received, cancelling deployment...");
    }

    cancel.cancel();
}
