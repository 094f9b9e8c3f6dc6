#![doc = include_str!("../README.md")]

use clap::Parser;
use jobpool_core::telemetry::init_telemetry;
use jobpool_worker::server::{
    config::{CliArgs, WorkerConfig},
    handler::WorkerService,
    identity::WorkerIdentity,
    lifecycle::{Lifecycle, WorkerState},
    run_server,
};
use tokio::net::TcpListener;
use tokio::signal;

// Using mimalloc for better performance under contention, especially in musl
// environments.
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load from .env
    let _ = dotenvy::dotenv();
    let args = CliArgs::parse();
    let config = WorkerConfig::try_from(args)?;

    let providers = init_telemetry("jobpool-worker")?;
    #[cfg(feature = "metrics")]
    jobpool_worker::server::metrics::init(&providers.meter());

    let lifecycle = Lifecycle::new();
    let identity = WorkerIdentity::resolve(config.worker_id.as_deref())?;
    let listener = TcpListener::bind(config.addr).await?;
    lifecycle.transition(WorkerState::Ready);
    log_startup_info(&identity, &config);

    let service = WorkerService::new(identity, config.work_delay, lifecycle);
    let res = run_server(listener, service, shutdown_signal(), config.shutdown_timeout).await;

    providers.shutdown();
    res
}

fn log_startup_info(identity: &WorkerIdentity, config: &WorkerConfig) {
    if cfg!(debug_assertions) {
        tracing::info!(
            "Starting worker {} on {} with full config: {:#?}",
            identity,
            config.addr,
            config
        );
    } else {
        tracing::info!(
            "Starting worker {} on {} ({:?} per job)",
            identity,
            config.addr,
            config.work_delay
        );
    }
}

async fn shutdown_signal() {
    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    tokio::select! {
        () = ctrl_c => tracing::info!("Received Ctrl+C signal"),
        () = terminate => tracing::info!("Received SIGTERM signal"),
    }

    tracing::info!("Shutdown signal received, draining in-flight jobs...");
}
