//! Polling worker.
//!
//! Fetches due tasks on a fixed interval, "executes" them (this binary just
//! logs the payload), and acks each one. A task that is fetched but never
//! acked stays leased until the broker's watchdog reclaims it, so a crashed
//! worker loses no work.

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use ddq::settings::AppConfig;
use ddq::store::{RedisTaskStore, TaskStore};
use ddq::task::now_epoch_secs;

#[derive(Parser, Debug)]
#[clap(version, about)]
/// Delay queue polling worker
struct Args {
    /// path to a TOML config file
    #[arg(short = 'c', long = "config")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    ddq::trace::init();

    let cfg = AppConfig::load(args.config.as_deref())?;
    let store = Arc::new(RedisTaskStore::connect(&cfg.redis.addr).await?);

    info!(
        topic = %cfg.worker.topic,
        poll_interval_secs = cfg.worker.poll_interval_secs,
        "worker started, polling for tasks"
    );

    let mut poll = tokio::time::interval(Duration::from_secs(cfg.worker.poll_interval_secs));
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("worker shutting down");
                break;
            }
            _ = poll.tick() => {
                poll_once(store.as_ref(), &cfg).await;
            }
        }
    }
    Ok(())
}

async fn poll_once(store: &RedisTaskStore, cfg: &AppConfig) {
    let tasks = match store
        .fetch_and_hold(&cfg.worker.topic, cfg.worker.batch_size)
        .await
    {
        Ok(tasks) => tasks,
        Err(err) => {
            warn!(error = %err, "poll failed");
            return;
        }
    };

    for task in tasks {
        info!(
            id = %task.id,
            payload = %task.payload,
            lag_secs = now_epoch_secs().saturating_sub(task.execute_time),
            "executing task"
        );
        // Without the ack the lease would outlive us and the watchdog would
        // re-deliver the task to another worker.
        if let Err(err) = store.ack(&task.id).await {
            warn!(id = %task.id, error = %err, "ack failed, watchdog will recover the lease");
        }
    }
}
