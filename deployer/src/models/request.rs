//! Deployment request models

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// How the job is submitted to the endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    /// `runsync`: the call blocks until the job finishes
    Sync,

    /// `run`: the job is queued and polled until it finishes
    Async,
}

impl ExecutionMode {
    pub fn from_sync_flag(sync: bool) -> Self {
        if sync {
            ExecutionMode::Sync
        } else {
            ExecutionMode::Async
        }
    }

    pub fn is_sync(&self) -> bool {
        matches!(self, ExecutionMode::Sync)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionMode::Sync => "sync",
            ExecutionMode::Async => "async",
        }
    }
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Arguments accepted from callers (CLI, tool integrations)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployArgs {
    /// Target serverless endpoint
    pub endpoint_id: String,

    /// File or directory to deploy
    pub workdir_or_file: String,

    /// What the worker should execute, e.g. `main.py` or `main.py:handler`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entrypoint: Option<String>,

    /// Environment variables set on the worker
    #[serde(default)]
    pub env: HashMap<String, String>,

    /// Use the blocking `runsync` route
    #[serde(default)]
    pub sync: bool,
}

/// A fully resolved deployment request
#[derive(Debug, Clone)]
pub struct DeployRequest {
    endpoint_id: String,
    source_path: PathBuf,
    entrypoint: Option<String>,
    env: HashMap<String, String>,
    mode: ExecutionMode,
}

impl DeployRequest {
    pub fn new(
        endpoint_id: impl Into<String>,
        source_path: impl Into<PathBuf>,
        mode: ExecutionMode,
    ) -> Self {
        Self {
            endpoint_id: endpoint_id.into(),
            source_path: source_path.into(),
            entrypoint: None,
            env: HashMap::new(),
            mode,
        }
    }

    pub fn with_entrypoint(mut self, entrypoint: impl Into<String>) -> Self {
        self.entrypoint = Some(entrypoint.into());
        self
    }

    pub fn with_env(mut self, env: HashMap<String, String>) -> Self {
        self.env = env;
        self
    }

    pub fn endpoint_id(&self) -> &str {
        &self.endpoint_id
    }

    pub fn source_path(&self) -> &Path {
        &self.source_path
    }

    pub fn entrypoint(&self) -> Option<&str> {
        self.entrypoint.as_deref()
    }

    pub fn env(&self) -> &HashMap<String, String> {
        &self.env
    }

    pub fn mode(&self) -> ExecutionMode {
        self.mode
    }
}

impl From<DeployArgs> for DeployRequest {
    fn from(args: DeployArgs) -> Self {
        Self {
            endpoint_id: args.endpoint_id,
            source_path: PathBuf::from(args.workdir_or_file),
            entrypoint: args.entrypoint,
            env: args.env,
            mode: ExecutionMode::from_sync_flag(args.sync),
        }
    }
}
