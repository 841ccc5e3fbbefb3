//! rundeploy Library
//!
//! Packages a local file or directory and runs it as a job on a RunPod
//! serverless endpoint.

pub mod app;
pub mod authn;
pub mod deploy;
pub mod errors;
pub mod filesys;
pub mod http;
pub mod logs;
pub mod models;
pub mod package;
pub mod utils;

pub use deploy::Deployer;
pub use errors::DeployError;
pub use models::job::{JobResult, JobStatus};
pub use models::request::{DeployArgs, DeployRequest, ExecutionMode};
