use anyhow::{Context, bail};
use clap::Parser;
use core::time::Duration;
use jobpool_core::pool::PoolConfig;
use std::net::SocketAddr;

/// Runtime configuration for the `jobpool-dispatcher` binary.
///
/// All values are parsed from CLI arguments or environment variables (a
/// `.env` file is loaded first when present).
#[derive(Parser, Debug, Clone)]
#[command(
    name = "jobpool-dispatcher",
    version,
    about = "An HTTP front end that dispatches power jobs to gRPC workers"
)]
pub struct CliArgs {
    /// Address the HTTP server listens on.
    ///
    /// Environment variable: `ADDR`
    #[arg(long, env = "ADDR", default_value_t = String::from("0.0.0.0:8080"))]
    pub addr: String,

    /// Worker endpoint, as a URI or a bare `host:port`.
    ///
    /// Environment variable: `EMPLOYEE_ADDR`
    #[arg(long, env = "EMPLOYEE_ADDR", default_value_t = String::from("http://127.0.0.1:50051"))]
    pub employee_addr: String,

    /// Connections opened at startup. The dispatcher refuses to start if any
    /// of them fails.
    ///
    /// Environment variable: `POOL_MIN_SIZE`
    #[arg(long, env = "POOL_MIN_SIZE", default_value_t = 5)]
    pub pool_min_size: usize,

    /// Maximum number of connections, and therefore of jobs in flight.
    ///
    /// Environment variable: `POOL_MAX_SIZE`
    #[arg(long, env = "POOL_MAX_SIZE", default_value_t = 5)]
    pub pool_max_size: usize,

    /// How long a request waits for a free connection, in milliseconds.
    ///
    /// Environment variable: `POOL_ACQUIRE_TIMEOUT_MS`
    #[arg(long, env = "POOL_ACQUIRE_TIMEOUT_MS", default_value_t = 1_000)]
    pub pool_acquire_timeout_ms: u64,

    /// Idle connections older than this many milliseconds are replaced
    /// before reuse. `0` disables the check.
    ///
    /// Environment variable: `POOL_IDLE_TIMEOUT_MS`
    #[arg(long, env = "POOL_IDLE_TIMEOUT_MS", default_value_t = 0)]
    pub pool_idle_timeout_ms: u64,

    /// Upper bound on a single remote call, in milliseconds.
    ///
    /// Environment variable: `REQUEST_TIMEOUT_MS`
    #[arg(long, env = "REQUEST_TIMEOUT_MS", default_value_t = 30_000)]
    pub request_timeout_ms: u64,

    /// Upper bound on dialing the worker, in milliseconds.
    ///
    /// Environment variable: `CONNECT_TIMEOUT_MS`
    #[arg(long, env = "CONNECT_TIMEOUT_MS", default_value_t = 5_000)]
    pub connect_timeout_ms: u64,
}

#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    pub addr: SocketAddr,
    pub worker_addr: String,
    pub pool: PoolConfig,
    pub request_timeout: Duration,
    pub connect_timeout: Duration,
}

impl TryFrom<CliArgs> for DispatcherConfig {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        let addr = args
            .addr
            .parse()
            .with_context(|| format!("ADDR `{}` is not a valid socket address", args.addr))?;

        if args.employee_addr.trim().is_empty() {
            bail!("EMPLOYEE_ADDR must not be empty");
        }

        if args.request_timeout_ms == 0 {
            bail!("REQUEST_TIMEOUT_MS must be greater than 0");
        }

        let idle_timeout =
            (args.pool_idle_timeout_ms > 0).then(|| Duration::from_millis(args.pool_idle_timeout_ms));

        let pool = PoolConfig::default()
            .with_min_size(args.pool_min_size)
            .with_max_size(args.pool_max_size)
            .with_acquire_timeout(Duration::from_millis(args.pool_acquire_timeout_ms))
            .with_idle_timeout(idle_timeout);
        pool.validate()?;

        Ok(Self {
            addr,
            worker_addr: args.employee_addr.trim().to_string(),
            pool,
            request_timeout: Duration::from_millis(args.request_timeout_ms),
            connect_timeout: Duration::from_millis(args.connect_timeout_ms),
        })
    }
}
