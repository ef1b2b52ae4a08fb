use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::error;

use ddq::server::run_grpc_with_watchdog;
use ddq::settings::AppConfig;
use ddq::store::RedisTaskStore;
use tokio::net::TcpListener;

#[derive(Parser, Debug)]
#[clap(version, about)]
/// Delay queue broker server
struct Args {
    /// whether to be verbose
    #[arg(short = 'v')]
    verbose: bool,

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

    let addr: SocketAddr = cfg.server.grpc_addr.parse()?;
    let (shutdown_tx, shutdown_rx) = tokio::sync::broadcast::channel::<()>(1);

    // Bind first so we can fail fast if the port is unavailable
    let listener = match TcpListener::bind(addr).await {
        Ok(l) => l,
        Err(err) => {
            error!(addr = %addr, error = %err, "failed to bind gRPC listener");
            return Err(anyhow::anyhow!(err));
        }
    };

    // Spawn server task with pre-bound listener
    let server = tokio::spawn(run_grpc_with_watchdog(listener, store, cfg, shutdown_rx));

    // Wait for Ctrl+C, then signal shutdown and wait for server
    tokio::signal::ctrl_c().await?;
    let _ = shutdown_tx.send(());
    if let Err(err) = server.await? {
        return Err(anyhow::anyhow!(err.to_string()));
    }
    Ok(())
}
