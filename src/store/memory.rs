//! In-memory task store.
//!
//! Test substitute for the Redis binding. One mutex over the three
//! collections plays the role of the store's script serialization: every
//! transition runs to completion under the lock, so callers get the same
//! disjointness and no-interleaving guarantees the Lua scripts provide.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use crate::codec::{decode_lease, decode_task, encode_lease, encode_task};
use crate::store::{StoreError, TaskStore};
use crate::task::{now_epoch_secs, LeaseRecord, Task};

/// Tasks resident in each collection at one observation point.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueCounts {
    pub pending: usize,
    pub running: usize,
    pub dead: usize,
}

#[derive(Default)]
struct Collections {
    /// (score, member) pairs. Members are unique; reads sort by
    /// (score, member) to mirror ZSET iteration order.
    pending: Vec<(u64, String)>,
    /// Task id -> lease record JSON.
    running: HashMap<String, String>,
    /// Snapshot JSON, most recent burial at index 0.
    dead: Vec<String>,
}

#[derive(Default)]
pub struct MemoryTaskStore {
    collections: Mutex<Collections>,
}

impl MemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Collections> {
        self.collections
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// ZADD semantics: re-adding an existing member replaces its score.
    fn zadd(pending: &mut Vec<(u64, String)>, score: u64, member: String) {
        pending.retain(|(_, m)| *m != member);
        pending.push((score, member));
    }

    pub fn counts(&self) -> QueueCounts {
        let cols = self.lock();
        QueueCounts {
            pending: cols.pending.len(),
            running: cols.running.len(),
            dead: cols.dead.len(),
        }
    }

    /// Pending members in (score, member) order, raw.
    pub fn pending_members(&self) -> Vec<(u64, String)> {
        let cols = self.lock();
        let mut members = cols.pending.clone();
        members.sort();
        members
    }

    /// Decoded pending snapshots in score order; undecodable members skipped.
    pub fn pending_tasks(&self) -> Vec<Task> {
        self.pending_members()
            .iter()
            .filter_map(|(_, raw)| decode_task(raw).ok())
            .collect()
    }

    pub fn running_lease(&self, id: &str) -> Option<LeaseRecord> {
        let cols = self.lock();
        cols.running.get(id).and_then(|raw| decode_lease(raw).ok())
    }

    /// Buried snapshots, most recent first; undecodable entries skipped.
    pub fn dead_tasks(&self) -> Vec<Task> {
        let cols = self.lock();
        cols.dead
            .iter()
            .filter_map(|raw| decode_task(raw).ok())
            .collect()
    }

    /// Place a raw member directly into pending, bypassing the codec. Test
    /// hook for corrupted-entry scenarios, the moral equivalent of writing
    /// to the live store with out-of-band tooling.
    pub fn inject_pending_raw(&self, score: u64, member: &str) {
        let mut cols = self.lock();
        Self::zadd(&mut cols.pending, score, member.to_string());
    }

    /// Place a raw value directly into running under `id`.
    pub fn inject_running_raw(&self, id: &str, value: &str) {
        let mut cols = self.lock();
        cols.running.insert(id.to_string(), value.to_string());
    }

    /// Rewrite a lease's start stamp so tests can age it without sleeping.
    /// Returns false when no lease exists for `id`.
    pub fn rewrite_lease_start(&self, id: &str, start: u64) -> bool {
        let mut cols = self.lock();
        let Some(raw) = cols.running.get(id) else {
            return false;
        };
        let Ok(mut record) = decode_lease(raw) else {
            return false;
        };
        record.start = start;
        match encode_lease(&record) {
            Ok(updated) => {
                cols.running.insert(id.to_string(), updated);
                true
            }
            Err(_) => false,
        }
    }
}

#[async_trait]
impl TaskStore for MemoryTaskStore {
    async fn add(&self, task: &Task) -> Result<(), StoreError> {
        let member = encode_task(task)?;
        let mut cols = self.lock();
        Self::zadd(&mut cols.pending, task.execute_time, member);
        Ok(())
    }

    async fn fetch_and_hold(&self, _topic: &str, limit: i64) -> Result<Vec<Task>, StoreError> {
        if limit <= 0 {
            return Ok(Vec::new());
        }
        let now = now_epoch_secs();
        let mut cols = self.lock();

        let mut due: Vec<(u64, String)> = cols
            .pending
            .iter()
            .filter(|(score, _)| *score <= now)
            .cloned()
            .collect();
        due.sort();
        due.truncate(limit as usize);

        let mut leased = Vec::with_capacity(due.len());
        for (_, member) in due {
            cols.pending.retain(|(_, m)| *m != member);
            let Ok(task) = decode_task(&member) else {
                // poison pill: removed above, never delivered
                continue;
            };
            let record = LeaseRecord {
                start: now,
                task: task.clone(),
            };
            let raw = encode_lease(&record)?;
            cols.running.insert(task.id.clone(), raw);
            leased.push(task);
        }
        Ok(leased)
    }

    async fn ack(&self, id: &str) -> Result<(), StoreError> {
        let mut cols = self.lock();
        cols.running.remove(id);
        Ok(())
    }

    async fn nack(&self, task: &Task) -> Result<(), StoreError> {
        let mut failed = task.clone();
        failed.retry_count += 1;
        let raw = encode_task(&failed)?;
        let now = now_epoch_secs();

        let mut cols = self.lock();
        cols.running.remove(&failed.id);
        if failed.exhausted() {
            cols.dead.insert(0, raw);
        } else {
            Self::zadd(&mut cols.pending, now, raw);
        }
        Ok(())
    }

    async fn reclaim(
        &self,
        visibility_timeout_secs: u64,
        fallback_max_retries: u32,
    ) -> Result<u64, StoreError> {
        enum Disposition {
            Drop,
            Requeue(String),
            Bury(String),
        }

        let now = now_epoch_secs();
        let mut cols = self.lock();

        // Decide every expired lease before touching the collections so the
        // sweep applies as a single unit.
        let mut sweep: Vec<(String, Disposition)> = Vec::new();
        for (id, raw) in cols.running.iter() {
            let Ok(lease) = decode_lease(raw) else {
                sweep.push((id.clone(), Disposition::Drop));
                continue;
            };
            if now.saturating_sub(lease.start) < visibility_timeout_secs {
                continue;
            }
            let mut task = lease.task;
            task.retry_count += 1;
            let max_retries = if task.max_retries > 0 {
                task.max_retries
            } else {
                fallback_max_retries
            };
            let json = encode_task(&task)?;
            if task.retry_count >= max_retries {
                sweep.push((id.clone(), Disposition::Bury(json)));
            } else {
                sweep.push((id.clone(), Disposition::Requeue(json)));
            }
        }

        let mut moved = 0;
        for (id, disposition) in sweep {
            cols.running.remove(&id);
            match disposition {
                Disposition::Drop => {}
                Disposition::Requeue(json) => {
                    Self::zadd(&mut cols.pending, now, json);
                    moved += 1;
                }
                Disposition::Bury(json) => {
                    cols.dead.insert(0, json);
                    moved += 1;
                }
            }
        }
        Ok(moved)
    }
}
