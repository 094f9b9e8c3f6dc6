//! Dispatcher HTTP server: configuration, routes, and the serve loop.
//!
//! ## Structure
//!
//! - [`config`] - CLI/environment configuration.
//! - [`routes`] - axum routes and the HTTP error mapping.

pub mod config;
pub mod routes;

use crate::{connection::ComputeConnection, dispatcher::Dispatcher};
use core::future::Future;
use jobpool_core::pool::ManageConnection;
use tokio::net::TcpListener;

/// Serves the dispatcher on `listener` until `signal` resolves.
///
/// In-flight requests are allowed to finish; the pool is closed once the
/// server has stopped.
///
/// # Errors
///
/// Returns an error if the HTTP server fails.
pub async fn run_server<M, F>(
    listener: TcpListener,
    dispatcher: Dispatcher<M>,
    signal: F,
) -> anyhow::Result<()>
where
    M: ManageConnection,
    M::Connection: ComputeConnection,
    F: Future<Output = ()> + Send + 'static,
{
    let pool = dispatcher.pool().clone();

    axum::serve(listener, routes::router(dispatcher))
        .with_graceful_shutdown(signal)
        .await?;

    pool.close();
    tracing::info!("Dispatcher shut down successfully");
    Ok(())
}
