//! Worker gRPC server: configuration, identity, lifecycle, and the `Worker`
//! service implementation.
//!
//! ## Structure
//!
//! - [`config`] - CLI/environment configuration.
//! - [`identity`] - [`WorkerIdentity`](identity::WorkerIdentity) resolution.
//! - [`lifecycle`] - `Starting → Ready → Serving → Draining → Stopped`.
//! - [`handler`] - [`WorkerService`], the `Worker::Work` implementation.
//! - [`metrics`] - Worker instruments (no-ops without the `metrics` feature).

pub mod config;
pub mod handler;
pub mod identity;
pub mod lifecycle;
pub mod metrics;

use core::future::Future;
use core::time::Duration;
use handler::{WorkerService, build_worker_service};
use jobpool_core::proto::{FILE_DESCRIPTOR_SET, worker_server::WorkerServer};
use lifecycle::WorkerState;
use tokio::net::TcpListener;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::transport::Server;
use tonic_reflection::server::Builder;
use tonic_web::GrpcWebLayer;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};

/// Serves `service` on `listener` until `signal` resolves, then drains.
///
/// Health is reported as `SERVING` once the server starts. When `signal`
/// fires, health flips to `NOT_SERVING`, the lifecycle enters `Draining` so
/// new jobs are refused, and in-flight jobs get up to `drain_timeout` to
/// finish. Jobs still running after that are aborted so the server stops
/// promptly.
///
/// # Errors
///
/// Returns an error if reflection cannot be built or the transport fails.
pub async fn run_server<F>(
    listener: TcpListener,
    service: WorkerService,
    signal: F,
    drain_timeout: Duration,
) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let (health_reporter, health_service) = tonic_health::server::health_reporter();
    health_reporter
        .set_serving::<WorkerServer<WorkerService>>()
        .await;

    let reflection = Builder::configure()
        .register_encoded_file_descriptor_set(FILE_DESCRIPTOR_SET)
        .build_v1()?;

    let lifecycle = service.lifecycle().clone();
    lifecycle.transition(WorkerState::Serving);

    let shutdown = {
        let lifecycle = lifecycle.clone();
        async move {
            signal.await;

            // 1. Publish the status
            health_reporter
                .set_not_serving::<WorkerServer<WorkerService>>()
                .await;

            // 2. Refuse new jobs and let in-flight ones finish, aborting
            //    whatever is left after the timeout
            lifecycle.drain(drain_timeout).await;
        }
    };

    Server::builder()
        .accept_http1(true)
        .layer(
            ServiceBuilder::new()
                .layer(
                    CorsLayer::new()
                        .allow_origin(Any)
                        .allow_methods(Any)
                        .allow_headers(Any),
                )
                .layer(GrpcWebLayer::new()),
        )
        .add_service(health_service)
        .add_service(reflection)
        .add_service(build_worker_service(service))
        .serve_with_incoming_shutdown(TcpListenerStream::new(listener), shutdown)
        .await?;

    lifecycle.transition(WorkerState::Stopped);
    tracing::info!("Worker shut down successfully");
    Ok(())
}
