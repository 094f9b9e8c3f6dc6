use anyhow::{Context, bail};
use clap::Parser;
use core::time::Duration;
use std::net::SocketAddr;

/// Runtime configuration for the `jobpool-worker` binary.
///
/// All values are parsed from CLI arguments or environment variables (a
/// `.env` file is loaded first when present).
#[derive(Parser, Debug, Clone)]
#[command(
    name = "jobpool-worker",
    version,
    about = "A gRPC worker that computes power jobs"
)]
pub struct CliArgs {
    /// Address to listen on.
    ///
    /// Environment variable: `ADDR`
    #[arg(long, env = "ADDR", default_value_t = String::from("0.0.0.0:50051"))]
    pub addr: String,

    /// Identity reported with every result. Defaults to the host name.
    ///
    /// Environment variable: `WORKER_ID`
    #[arg(long, env = "WORKER_ID")]
    pub worker_id: Option<String>,

    /// Processing delay applied to every job, in milliseconds.
    ///
    /// Fixed for the lifetime of the process; models a slow backend so
    /// callers exercise their pooling and timeout behaviour.
    ///
    /// Environment variable: `WORK_DELAY_MS`
    #[arg(long, env = "WORK_DELAY_MS", default_value_t = 10_000)]
    pub work_delay_ms: u64,

    /// Seconds to wait for in-flight jobs after a shutdown signal.
    ///
    /// Environment variable: `SHUTDOWN_TIMEOUT`
    #[arg(long, env = "SHUTDOWN_TIMEOUT", default_value_t = 30)]
    pub shutdown_timeout: u64,
}

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub addr: SocketAddr,
    pub worker_id: Option<String>,
    pub work_delay: Duration,
    pub shutdown_timeout: Duration,
}

impl TryFrom<CliArgs> for WorkerConfig {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        let addr = args
            .addr
            .parse()
            .with_context(|| format!("ADDR `{}` is not a valid socket address", args.addr))?;

        if args.worker_id.as_deref().is_some_and(|id| id.trim().is_empty()) {
            bail!("WORKER_ID must not be blank");
        }

        Ok(Self {
            addr,
            worker_id: args.worker_id,
            work_delay: Duration::from_millis(args.work_delay_ms),
            shutdown_timeout: Duration::from_secs(args.shutdown_timeout),
        })
    }
}
