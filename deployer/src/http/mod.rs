//! HTTP access to the serverless API

pub mod client;
pub mod jobs;
