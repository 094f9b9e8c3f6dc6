#![doc = include_str!("../README.md")]

use anyhow::Context;
use clap::Parser;
use jobpool_core::{pool::Pool, telemetry::init_telemetry};
use jobpool_dispatcher::{
    connection::GrpcConnectionManager,
    dispatcher::Dispatcher,
    server::{
        config::{CliArgs, DispatcherConfig},
        run_server,
    },
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
    let config = DispatcherConfig::try_from(args)?;

    let providers = init_telemetry("jobpool-dispatcher")?;
    #[cfg(feature = "metrics")]
    jobpool_dispatcher::metrics::init(&providers.meter());

    let manager = GrpcConnectionManager::new(&config.worker_addr, config.connect_timeout)?;
    let pool = Pool::new(manager, config.pool.clone())
        .await
        .with_context(|| format!("failed to connect to worker at {}", config.worker_addr))?;
    let dispatcher = Dispatcher::new(pool, config.request_timeout);

    let listener = TcpListener::bind(config.addr).await?;
    log_startup_info(&config);

    let res = run_server(listener, dispatcher, shutdown_signal()).await;

    providers.shutdown();
    res
}

fn log_startup_info(config: &DispatcherConfig) {
    if cfg!(debug_assertions) {
        tracing::info!(
            "Starting dispatcher on {} with full config: {:#?}",
            config.addr,
            config
        );
    } else {
        tracing::info!(
            "Starting dispatcher on {} -> {} with {} pooled connections",
            config.addr,
            config.worker_addr,
            config.pool.max_size
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

    tracing::info!("Shutdown signal received, terminating gracefully...");
}
