//! Task snapshot and lease record types.
//!
//! The snapshot is the unit of persistence: every transition serializes the
//! whole task atomically, and retry state is advanced by removing one
//! serialized snapshot and writing another, never by mutating in place.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// Retry budget applied when a submission does not specify one.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// A task is a unit of deferred work. Serialized as UTF-8 JSON with exactly
/// these field names; the encoding is part of the external store contract and
/// must stay readable by out-of-band tooling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    /// Globally unique id; primary key across Pending, Running, and Dead.
    pub id: String,
    /// Logical category. All topics currently share one pending stream, but
    /// the snapshot carries the topic so partitioning needs no migration.
    pub topic: String,
    /// Opaque payload interpreted only by the worker.
    pub payload: String,
    /// Epoch seconds at which the task becomes eligible for dispatch.
    pub execute_time: u64,
    /// Failed attempts observed so far. Incremented on each nack or reclaim.
    #[serde(default)]
    pub retry_count: u32,
    /// Threshold at which the next failure buries the task. Zero is treated
    /// as "not set": reclaim substitutes its configured fallback.
    #[serde(default)]
    pub max_retries: u32,
    /// Epoch seconds of submission. Informational.
    pub created_at: u64,
}

impl Task {
    /// True when one more recorded failure would move this task to Dead.
    pub fn exhausted(&self) -> bool {
        self.retry_count >= self.max_retries
    }
}

/// Stored representation of a lease. Value in the running hash under the
/// task's id. The snapshot is embedded by copy so reclaim can rebuild the
/// pending entry without reading any other collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaseRecord {
    /// Epoch seconds at which the lease began.
    pub start: u64,
    pub task: Task,
}

/// Current wall-clock time in epoch seconds.
pub fn now_epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
