//! Deployment pipeline

pub mod orchestrator;
pub mod poller;
pub mod submit;

pub use orchestrator::Deployer;
