//! JSON encoding for task snapshots and lease records.
//!
//! Every transition and every host-side parser goes through these functions
//! so the wire bytes stay consistent with what the store-side scripts decode.

use thiserror::Error;

use crate::task::{LeaseRecord, Task};

/// Error type for codec operations
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub fn encode_task(task: &Task) -> Result<String, CodecError> {
    Ok(serde_json::to_string(task)?)
}

pub fn decode_task(raw: &str) -> Result<Task, CodecError> {
    Ok(serde_json::from_str(raw)?)
}

pub fn encode_lease(record: &LeaseRecord) -> Result<String, CodecError> {
    Ok(serde_json::to_string(record)?)
}

pub fn decode_lease(raw: &str) -> Result<LeaseRecord, CodecError> {
    Ok(serde_json::from_str(raw)?)
}
