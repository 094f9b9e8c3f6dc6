//! Job dispatch over pooled worker connections.
//!
//! A [`Dispatcher`] turns a pair of raw operands into a [`JobResult`]:
//!
//! 1. Both operands are parsed as `f32`. Malformed input is rejected before
//!    the pool is touched.
//! 2. A fresh job id is generated and a connection is checked out of the
//!    pool, waiting at most the pool's acquire timeout.
//! 3. One `Work` call is made under the request timeout.
//! 4. The connection goes back to the pool, or is discarded after a crashed
//!    call or a transport failure, and the reply is checked against the job id.
//!
//! Calls are never retried. The remote call runs on its own task that owns
//! the checked-out connection, so a caller that goes away mid-call does not
//! return a connection that still has a reply in flight.

use crate::{
    connection::ComputeConnection,
    metrics::{increment_job_errors, increment_jobs, record_job_duration, record_pool_wait},
};
use core::time::Duration;
use jobpool_core::{
    Error, Job, JobResult, Result,
    pool::{ManageConnection, Pool},
};
use tokio::time::{Instant, timeout};
use tonic::{Code, Status};

pub struct Dispatcher<M: ManageConnection> {
    pool: Pool<M>,
    request_timeout: Duration,
}

impl<M: ManageConnection> Clone for Dispatcher<M> {
    fn clone(&self) -> Self {
        Self {
            pool: self.pool.clone(),
            request_timeout: self.request_timeout,
        }
    }
}

impl<M> Dispatcher<M>
where
    M: ManageConnection,
    M::Connection: ComputeConnection,
{
    pub const fn new(pool: Pool<M>, request_timeout: Duration) -> Self {
        Self {
            pool,
            request_timeout,
        }
    }

    pub const fn pool(&self) -> &Pool<M> {
        &self.pool
    }

    /// Runs one job for the raw `base` and `exponent` operands.
    ///
    /// Latency is recorded for every call, successful or not, and also when
    /// the caller drops the returned future before it completes.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidInput`] if an operand is not a valid `f32`.
    /// - [`Error::ServiceUnavailable`] wrapping the pool failure if no
    ///   connection could be checked out.
    /// - [`Error::Remote`] if the worker failed or the request timed out
    ///   (`DEADLINE_EXCEEDED`).
    /// - [`Error::Protocol`] if the reply answers a different job.
    /// - [`Error::Connection`] if the remote call task died.
    pub async fn handle(&self, base: &str, exponent: &str) -> Result<JobResult> {
        self.timed(base, exponent, record_outcome).await
    }

    async fn timed(
        &self,
        base: &str,
        exponent: &str,
        record: fn(Outcome, f64),
    ) -> Result<JobResult> {
        let timer = JobTimer::start(record);
        let res = self.dispatch(base, exponent).await;

        match &res {
            Ok(result) => {
                let elapsed_ms = timer.finish(Outcome::Completed);
                tracing::info!(
                    job_id = %result.id,
                    worker_id = %result.worker_id,
                    elapsed_ms,
                    "job completed"
                );
            }
            Err(e) => {
                let elapsed_ms = timer.finish(Outcome::Failed);
                tracing::warn!(error = %e, elapsed_ms, "job failed");
            }
        }

        res
    }

    async fn dispatch(&self, base: &str, exponent: &str) -> Result<JobResult> {
        let base = parse_operand(base, "base")?;
        let exponent = parse_operand(exponent, "exponent")?;
        let job = Job::new(base, exponent);

        let waiting = Instant::now();
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| Error::ServiceUnavailable(Box::new(e)))?;
        record_pool_wait(waiting.elapsed().as_secs_f64() * 1000.0);
        tracing::debug!(job_id = %job.id(), conn_id = conn.id(), "dispatching job");

        let request = job.to_request();
        let request_timeout = self.request_timeout;
        let call = tokio::spawn(async move {
            // Discarded if this task unwinds with a reply half read.
            conn.mark_broken();
            let res = match timeout(request_timeout, conn.compute(request)).await {
                Ok(res) => res,
                Err(_) => Err(Status::deadline_exceeded(format!(
                    "no reply from worker within {request_timeout:?}"
                ))),
            };

            conn.set_broken(matches!(&res, Err(status) if is_transport_failure(status)));

            // `conn` goes back to the pool here, before the reply is handed on.
            res
        });

        let response = call.await.map_err(|e| Error::Connection {
            context: format!("remote call task failed: {e}"),
        })??;

        JobResult::from_response(&job, response)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Outcome {
    Completed,
    Failed,
    /// The caller went away before the job finished.
    Abandoned,
}

fn record_outcome(outcome: Outcome, elapsed_ms: f64) {
    record_job_duration(elapsed_ms);
    match outcome {
        Outcome::Completed => increment_jobs(),
        Outcome::Failed => increment_job_errors(),
        Outcome::Abandoned => {
            increment_job_errors();
            tracing::warn!(elapsed_ms, "job abandoned by caller");
        }
    }
}

/// Reports a job's latency exactly once, as abandoned if dropped unfinished.
struct JobTimer {
    start: Instant,
    record: fn(Outcome, f64),
    finished: bool,
}

impl JobTimer {
    fn start(record: fn(Outcome, f64)) -> Self {
        Self {
            start: Instant::now(),
            record,
            finished: false,
        }
    }

    fn elapsed_ms(&self) -> f64 {
        self.start.elapsed().as_secs_f64() * 1000.0
    }

    /// Records `outcome` and returns the elapsed time in milliseconds.
    fn finish(mut self, outcome: Outcome) -> f64 {
        self.finished = true;
        let elapsed_ms = self.elapsed_ms();
        (self.record)(outcome, elapsed_ms);
        elapsed_ms
    }
}

impl Drop for JobTimer {
    fn drop(&mut self) {
        if !self.finished {
            (self.record)(Outcome::Abandoned, self.elapsed_ms());
        }
    }
}

/// A failure of the channel itself rather than an answer from the worker.
fn is_transport_failure(status: &Status) -> bool {
    matches!(status.code(), Code::Unavailable | Code::Unknown)
}

/// Parses a request operand as an `f32`.
///
/// Accepts anything `f32::from_str` does, including `inf` and `NaN`, plus
/// hexadecimal literals with a binary exponent such as `0x1.8p3`. Finite
/// literals that overflow the `f32` range are rejected.
pub fn parse_operand(raw: &str, name: &str) -> Result<f32> {
    let invalid = || Error::InvalidInput {
        reason: format!("invalid {name} value"),
    };

    let value = match raw.parse::<f32>() {
        Ok(value) => value,
        Err(_) => parse_hex_float(raw).ok_or_else(invalid)? as f32,
    };
    if value.is_infinite() && !raw.to_ascii_lowercase().contains("inf") {
        return Err(invalid());
    }

    Ok(value)
}

/// Parses `[+-]0x<hex digits>[.<hex digits>]p[+-]<decimal exponent>`.
///
/// The exponent is mandatory and scales by powers of two.
fn parse_hex_float(raw: &str) -> Option<f64> {
    let (negative, rest) = match raw.as_bytes().first()? {
        b'-' => (true, &raw[1..]),
        b'+' => (false, &raw[1..]),
        _ => (false, raw),
    };
    let rest = rest
        .strip_prefix("0x")
        .or_else(|| rest.strip_prefix("0X"))?;
    let (mantissa, exponent) = rest.split_once(['p', 'P'])?;

    let exponent: i32 = exponent.parse().ok()?;

    let (whole, fraction) = mantissa.split_once('.').unwrap_or((mantissa, ""));
    if whole.is_empty() && fraction.is_empty() {
        return None;
    }

    let mut value = 0.0_f64;
    for digit in whole.chars().chain(fraction.chars()) {
        value = value.mul_add(16.0, f64::from(digit.to_digit(16)?));
    }

    let shift = i32::try_from(fraction.len()).ok()?.checked_mul(4)?;
    let value = value * 2.0_f64.powi(exponent.checked_sub(shift)?);
    Some(if negative { -value } else { value })
}
