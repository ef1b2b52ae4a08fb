use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::{Request, Response, Status};
use tracing::info;

use crate::gateway::{Gateway, GatewayError, SubmitRequest};
use crate::pb::delay_queue_server::{DelayQueue, DelayQueueServer};
use crate::pb::*;
use crate::settings::AppConfig;
use crate::store::TaskStore;
use crate::watchdog::Watchdog;

fn map_err(e: GatewayError) -> Status {
    match e {
        GatewayError::InvalidArgument(msg) => Status::invalid_argument(msg),
        GatewayError::Store(err) => Status::internal(err.to_string()),
    }
}

/// gRPC service implementation backed by a `TaskStore`.
#[derive(Clone)]
pub struct DelayQueueService {
    gateway: Arc<Gateway>,
}

impl DelayQueueService {
    pub fn new(store: Arc<dyn TaskStore>, default_max_retries: u32) -> Self {
        Self {
            gateway: Arc::new(Gateway::new(store, default_max_retries)),
        }
    }
}

#[tonic::async_trait]
impl DelayQueue for DelayQueueService {
    async fn enqueue(
        &self,
        req: Request<EnqueueRequest>,
    ) -> Result<Response<EnqueueResponse>, Status> {
        let r = req.into_inner();
        let id = self
            .gateway
            .submit(SubmitRequest {
                id: if r.id.is_empty() { None } else { Some(r.id) },
                topic: r.topic,
                payload: r.payload,
                delay_seconds: r.delay_seconds,
                max_retries: r.max_retries,
            })
            .await
            .map_err(map_err)?;
        Ok(Response::new(EnqueueResponse {
            id,
            success: true,
            error_message: String::new(),
        }))
    }

    async fn retrieve(
        &self,
        _req: Request<RetrieveRequest>,
    ) -> Result<Response<RetrieveResponse>, Status> {
        Err(Status::unimplemented("Retrieve is not implemented"))
    }

    async fn delete(
        &self,
        _req: Request<DeleteRequest>,
    ) -> Result<Response<DeleteResponse>, Status> {
        Err(Status::unimplemented("Delete is not implemented"))
    }
}

/// Run the gRPC server and the lease watchdog together until shutdown.
pub async fn run_grpc_with_watchdog(
    listener: TcpListener,
    store: Arc<dyn TaskStore>,
    cfg: AppConfig,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let svc = DelayQueueService::new(store.clone(), cfg.queue.max_retries);
    let server = DelayQueueServer::new(svc);

    let (tick_tx, tick_rx) = broadcast::channel::<()>(1);
    let watchdog = Watchdog::new(
        store,
        Duration::from_secs(cfg.queue.watchdog_interval_secs),
        cfg.queue.visibility_timeout_secs,
        cfg.queue.max_retries,
    )
    .spawn(tick_rx);

    let local_addr = listener.local_addr()?;
    // Log after successful bind (listener provided by the caller)
    info!(addr = %local_addr, "server started and listening");

    let incoming = TcpListenerStream::new(listener);

    // Serve with graceful shutdown
    let serve = tonic::transport::Server::builder()
        .add_service(server)
        .serve_with_incoming_shutdown(incoming, async move {
            let _ = shutdown.recv().await;
            info!("graceful shutdown signal received");
            let _ = tick_tx.send(());
        });

    serve.await?;
    info!("all connections drained, shutting down");
    watchdog.await.ok();
    Ok(())
}
