//! Store abstraction over the three task collections.
//!
//! The core talks to an abstract store offering five atomic primitives; the
//! production binding executes them as server-side scripts against Redis and
//! tests substitute the in-memory implementation. Both provide the same
//! guarantee: each primitive commits entirely or not at all, and two
//! concurrent calls never interleave mid-transition.

pub mod memory;
pub mod redis;

use async_trait::async_trait;
use thiserror::Error;

use crate::codec::CodecError;
use crate::task::Task;

pub use self::memory::MemoryTaskStore;
pub use self::redis::RedisTaskStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("redis error: {0}")]
    Redis(#[from] bb8_redis::redis::RedisError),
    #[error("connection pool error: {0}")]
    Pool(String),
    #[error(transparent)]
    Codec(#[from] CodecError),
}

/// The five task lifecycle transitions. Callers may race freely: atomicity
/// is the implementation's problem, and a transition whose future is dropped
/// before dispatch has no effect.
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Insert a snapshot into the pending index with score = `execute_time`.
    async fn add(&self, task: &Task) -> Result<(), StoreError>;

    /// Atomically move up to `limit` due tasks from pending to running and
    /// return them in ascending `execute_time` order. Concurrent callers
    /// observe disjoint sets. The topic is carried for future partitioning;
    /// all topics currently share one pending stream.
    async fn fetch_and_hold(&self, topic: &str, limit: i64) -> Result<Vec<Task>, StoreError>;

    /// Release the lease for `id`. Idempotent: acking a task the watchdog
    /// already reclaimed is a no-op, not an error.
    async fn ack(&self, id: &str) -> Result<(), StoreError>;

    /// Record a failed attempt: drop the lease, increment the retry count,
    /// and either reschedule the task for immediate retry or bury it once
    /// the budget is exhausted.
    async fn nack(&self, task: &Task) -> Result<(), StoreError>;

    /// Sweep running for leases older than `visibility_timeout_secs` and
    /// move each back to pending or to the dead list. `fallback_max_retries`
    /// applies to snapshots that carry no budget of their own. Returns the
    /// number of leases moved.
    async fn reclaim(
        &self,
        visibility_timeout_secs: u64,
        fallback_max_retries: u32,
    ) -> Result<u64, StoreError>;
}
