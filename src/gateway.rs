//! Submission gateway.
//!
//! Validates submissions, mints ids, stamps timestamps, and hands the
//! finished snapshot to the store's Add. This is the only place snapshots
//! are born; every later transition just moves them.

use std::sync::Arc;

use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use crate::store::{StoreError, TaskStore};
use crate::task::{now_epoch_secs, Task};

/// A submission as received from the RPC surface, before validation.
#[derive(Debug, Clone)]
pub struct SubmitRequest {
    /// Client-supplied id for idempotent resubmission; `None` mints one.
    pub id: Option<String>,
    pub topic: String,
    pub payload: String,
    pub delay_seconds: i64,
    /// Zero means "use the gateway default".
    pub max_retries: u32,
}

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("{0}")]
    InvalidArgument(&'static str),
    #[error(transparent)]
    Store(#[from] StoreError),
}

pub struct Gateway {
    store: Arc<dyn TaskStore>,
    default_max_retries: u32,
}

impl Gateway {
    pub fn new(store: Arc<dyn TaskStore>, default_max_retries: u32) -> Self {
        Self {
            store,
            default_max_retries: default_max_retries.max(1),
        }
    }

    /// Validate, stamp, and insert a submission. Returns the task id.
    ///
    /// Insertion is best-effort: a client retry carrying the same id that
    /// races an accepted insert can leave two pending entries with that id,
    /// and FetchAndHold drains both like any other members.
    pub async fn submit(&self, req: SubmitRequest) -> Result<String, GatewayError> {
        if req.topic.is_empty() {
            return Err(GatewayError::InvalidArgument("topic must not be empty"));
        }
        if req.payload.is_empty() {
            return Err(GatewayError::InvalidArgument("payload must not be empty"));
        }
        if req.delay_seconds < 0 {
            return Err(GatewayError::InvalidArgument("delay_seconds must be >= 0"));
        }

        let id = match req.id {
            Some(id) if !id.is_empty() => id,
            _ => Uuid::new_v4().to_string(),
        };
        let max_retries = if req.max_retries == 0 {
            self.default_max_retries
        } else {
            req.max_retries
        };

        let now = now_epoch_secs();
        let task = Task {
            id: id.clone(),
            topic: req.topic,
            payload: req.payload,
            execute_time: now + req.delay_seconds as u64,
            retry_count: 0,
            max_retries,
            created_at: now,
        };

        self.store.add(&task).await?;
        debug!(id = %task.id, topic = %task.topic, execute_time = task.execute_time, "task enqueued");
        Ok(id)
    }
}
