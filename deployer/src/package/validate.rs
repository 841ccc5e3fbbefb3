//! Payload size limits

use crate::errors::DeployError;
use crate::models::request::ExecutionMode;
use crate::package::artifact::Payload;

const MIB: usize = 1024 * 1024;

/// Largest payload accepted by `run`
pub const ASYNC_PAYLOAD_LIMIT: usize = 10 * MIB;

/// Largest payload accepted by `runsync`
pub const SYNC_PAYLOAD_LIMIT: usize = 20 * MIB;

/// Size ceiling for a submission mode, in bytes
pub fn payload_limit(mode: ExecutionMode) -> usize {
    match mode {
        ExecutionMode::Sync => SYNC_PAYLOAD_LIMIT,
        ExecutionMode::Async => ASYNC_PAYLOAD_LIMIT,
    }
}

/// Reject payloads the endpoint would refuse; returns the serialized size
pub fn check_payload_size(payload: &Payload, mode: ExecutionMode) -> Result<usize, DeployError> {
    let size = serde_json::to_vec(payload)?.len();
    let limit = payload_limit(mode);

    if size > limit {
        return Err(DeployError::PayloadTooLarge {
            actual_mb: size as f64 / MIB as f64,
            limit_mb: limit as f64 / MIB as f64,
            mode: mode.as_str(),
        });
    }
    Ok(size)
}
