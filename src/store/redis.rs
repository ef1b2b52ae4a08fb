//! Redis task store.
//!
//! Production binding: a bb8 connection pool plus the Lua scripts in
//! `crate::scripts`, sent via EVAL. Each transition is one round-trip and
//! one script execution; Redis serializes scripts, which is the only
//! serialization point the broker relies on.

use async_trait::async_trait;
use bb8_redis::bb8::{Pool, PooledConnection};
use bb8_redis::redis::{cmd, AsyncCommands};
use bb8_redis::RedisConnectionManager;
use tracing::warn;

use crate::codec::{decode_task, encode_task};
use crate::keys::{DLQ_KEY, PENDING_KEY, RUNNING_KEY};
use crate::scripts;
use crate::store::{StoreError, TaskStore};
use crate::task::{now_epoch_secs, Task};

pub struct RedisTaskStore {
    pool: Pool<RedisConnectionManager>,
}

impl RedisTaskStore {
    /// Connect to Redis at `addr` ("host:port").
    pub async fn connect(addr: &str) -> Result<Self, StoreError> {
        let manager = RedisConnectionManager::new(format!("redis://{addr}"))?;
        let pool = Pool::builder().build(manager).await?;
        Ok(Self { pool })
    }

    /// The underlying pool. For out-of-band tooling and integration tests
    /// that need to inspect the raw keys; broker code goes through the
    /// `TaskStore` methods.
    pub fn pool(&self) -> &Pool<RedisConnectionManager> {
        &self.pool
    }

    async fn conn(&self) -> Result<PooledConnection<'_, RedisConnectionManager>, StoreError> {
        self.pool
            .get()
            .await
            .map_err(|err| StoreError::Pool(err.to_string()))
    }
}

#[async_trait]
impl TaskStore for RedisTaskStore {
    async fn add(&self, task: &Task) -> Result<(), StoreError> {
        let member = encode_task(task)?;
        let mut conn = self.conn().await?;
        let _: () = conn.zadd(PENDING_KEY, member, task.execute_time).await?;
        Ok(())
    }

    async fn fetch_and_hold(&self, _topic: &str, limit: i64) -> Result<Vec<Task>, StoreError> {
        if limit <= 0 {
            return Ok(Vec::new());
        }
        let now = now_epoch_secs();
        let mut conn = self.conn().await?;

        let raw_tasks: Vec<String> = cmd("EVAL")
            .arg(scripts::FETCH_AND_HOLD)
            .arg(2)
            .arg(PENDING_KEY)
            .arg(RUNNING_KEY)
            .arg(now)
            .arg(limit)
            .arg(now)
            .query_async(&mut *conn)
            .await?;

        let mut tasks = Vec::with_capacity(raw_tasks.len());
        for raw in raw_tasks {
            match decode_task(&raw) {
                Ok(task) => tasks.push(task),
                Err(err) => {
                    // The script already removed the member; dropping it from
                    // the batch keeps the rest deliverable.
                    warn!(error = %err, "skipping undecodable pending entry");
                }
            }
        }
        Ok(tasks)
    }

    async fn ack(&self, id: &str) -> Result<(), StoreError> {
        let mut conn = self.conn().await?;
        let _: i64 = cmd("EVAL")
            .arg(scripts::ACK)
            .arg(1)
            .arg(RUNNING_KEY)
            .arg(id)
            .query_async(&mut *conn)
            .await?;
        Ok(())
    }

    async fn nack(&self, task: &Task) -> Result<(), StoreError> {
        let mut failed = task.clone();
        failed.retry_count += 1;
        let is_dead = failed.exhausted();
        let member = encode_task(&failed)?;
        let score = now_epoch_secs();

        let mut conn = self.conn().await?;
        let _: i64 = cmd("EVAL")
            .arg(scripts::NACK)
            .arg(3)
            .arg(RUNNING_KEY)
            .arg(PENDING_KEY)
            .arg(DLQ_KEY)
            .arg(&failed.id)
            .arg(member)
            .arg(score)
            .arg(i64::from(is_dead))
            .query_async(&mut *conn)
            .await?;
        Ok(())
    }

    async fn reclaim(
        &self,
        visibility_timeout_secs: u64,
        fallback_max_retries: u32,
    ) -> Result<u64, StoreError> {
        let now = now_epoch_secs();
        let mut conn = self.conn().await?;
        let moved: u64 = cmd("EVAL")
            .arg(scripts::RECLAIM)
            .arg(3)
            .arg(RUNNING_KEY)
            .arg(PENDING_KEY)
            .arg(DLQ_KEY)
            .arg(now)
            .arg(visibility_timeout_secs)
            .arg(fallback_max_retries)
            .query_async(&mut *conn)
            .await?;
        Ok(moved)
    }
}
