//! Lease watchdog.
//!
//! A single background task that invokes the store's Reclaim on a fixed
//! interval, returning expired leases to pending or burying them. Sweep
//! errors are logged and swallowed: the next tick will see the same leases,
//! so a lost sweep costs latency, not tasks.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::store::TaskStore;

/// Upper bound on a single sweep, so a slow store cannot pile up ticks.
const SWEEP_DEADLINE: Duration = Duration::from_secs(5);

pub struct Watchdog {
    store: Arc<dyn TaskStore>,
    interval: Duration,
    visibility_timeout_secs: u64,
    max_retries: u32,
}

impl Watchdog {
    pub fn new(
        store: Arc<dyn TaskStore>,
        interval: Duration,
        visibility_timeout_secs: u64,
        max_retries: u32,
    ) -> Self {
        Self {
            store,
            interval,
            visibility_timeout_secs,
            max_retries,
        }
    }

    /// Spawn the sweep loop. It runs until a message arrives on `shutdown`;
    /// the returned handle completes once the loop has exited.
    pub fn spawn(self, mut shutdown: broadcast::Receiver<()>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            info!(
                interval_secs = self.interval.as_secs_f64(),
                visibility_timeout_secs = self.visibility_timeout_secs,
                max_retries = self.max_retries,
                "watchdog started"
            );
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        self.sweep().await;
                    }
                    _ = shutdown.recv() => {
                        info!("watchdog stopped");
                        break;
                    }
                }
            }
        })
    }

    async fn sweep(&self) {
        let reclaim = self
            .store
            .reclaim(self.visibility_timeout_secs, self.max_retries);
        match tokio::time::timeout(SWEEP_DEADLINE, reclaim).await {
            Ok(Ok(0)) => {}
            Ok(Ok(moved)) => info!(moved, "reclaimed expired leases"),
            Ok(Err(err)) => warn!(error = %err, "reclaim sweep failed"),
            Err(_) => warn!(deadline_secs = SWEEP_DEADLINE.as_secs(), "reclaim sweep timed out"),
        }
    }
}
