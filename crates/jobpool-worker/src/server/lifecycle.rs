//! Worker process lifecycle.
//!
//! A worker moves through `Starting → Ready → Serving → Draining → Stopped`.
//! It is `Ready` once its identity is resolved and its listener is bound,
//! `Serving` while the gRPC server accepts jobs, and `Draining` after a
//! shutdown signal: new jobs are refused while in-flight ones finish. Jobs
//! still running when the drain limit expires are aborted. No state is kept
//! between jobs, so the only bookkeeping is the in-flight count.

use crate::server::metrics::{decrement_jobs_inflight, increment_jobs_inflight};
use core::{
    fmt,
    sync::atomic::{AtomicU8, AtomicUsize, Ordering},
    time::Duration,
};
use std::sync::Arc;
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum WorkerState {
    Starting = 0,
    Ready = 1,
    Serving = 2,
    Draining = 3,
    Stopped = 4,
}

impl WorkerState {
    const fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Self::Starting,
            1 => Self::Ready,
            2 => Self::Serving,
            3 => Self::Draining,
            _ => Self::Stopped,
        }
    }

    /// Whether the lifecycle may move from `self` to `next`.
    pub const fn can_become(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Starting, Self::Ready)
                | (Self::Ready, Self::Serving)
                | (Self::Ready | Self::Serving, Self::Draining)
                | (Self::Starting | Self::Ready | Self::Serving | Self::Draining, Self::Stopped)
        )
    }
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Starting => "starting",
            Self::Ready => "ready",
            Self::Serving => "serving",
            Self::Draining => "draining",
            Self::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// Shared handle to the worker's lifecycle state and in-flight job count.
#[derive(Clone, Debug)]
pub struct Lifecycle {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    state: AtomicU8,
    in_flight: AtomicUsize,
    abort: CancellationToken,
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl Lifecycle {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                state: AtomicU8::new(WorkerState::Starting as u8),
                in_flight: AtomicUsize::new(0),
                abort: CancellationToken::new(),
            }),
        }
    }

    pub fn state(&self) -> WorkerState {
        WorkerState::from_u8(self.inner.state.load(Ordering::Acquire))
    }

    pub fn in_flight(&self) -> usize {
        self.inner.in_flight.load(Ordering::Acquire)
    }

    /// Resolves once a drain has timed out and in-flight jobs must stop.
    pub async fn aborted(&self) {
        self.inner.abort.cancelled().await;
    }

    pub fn is_aborted(&self) -> bool {
        self.inner.abort.is_cancelled()
    }

    /// Moves to `next` if that is a legal transition from the current state.
    ///
    /// Returns `false` and leaves the state untouched otherwise.
    pub fn transition(&self, next: WorkerState) -> bool {
        let mut current = self.state();
        loop {
            if !current.can_become(next) {
                tracing::debug!(%current, %next, "ignoring lifecycle transition");
                return false;
            }

            match self.inner.state.compare_exchange(
                current as u8,
                next as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => {
                    tracing::info!(from = %current, to = %next, "worker lifecycle changed");
                    return true;
                }
                Err(actual) => current = WorkerState::from_u8(actual),
            }
        }
    }

    /// Registers a new job if the worker is serving.
    ///
    /// The returned guard keeps the job counted as in flight until dropped.
    pub fn begin_job(&self) -> Option<InFlightJob> {
        if self.state() != WorkerState::Serving {
            return None;
        }

        self.inner.in_flight.fetch_add(1, Ordering::AcqRel);
        increment_jobs_inflight();
        let job = InFlightJob {
            inner: Arc::clone(&self.inner),
        };

        // A drain may have started between the check and the increment.
        if self.state() != WorkerState::Serving {
            return None;
        }

        Some(job)
    }

    /// Enters `Draining` and waits up to `limit` for in-flight jobs to finish.
    ///
    /// Returns `true` if every job finished in time. Otherwise the jobs still
    /// running are told to abort through [`Lifecycle::aborted`].
    pub async fn drain(&self, limit: Duration) -> bool {
        self.transition(WorkerState::Draining);
        tracing::info!("Draining in-flight jobs ({} active)", self.in_flight());

        let drained = timeout(limit, async {
            while self.in_flight() > 0 {
                sleep(Duration::from_millis(50)).await;
            }
        })
        .await;

        match drained {
            Ok(()) => {
                tracing::debug!("All in-flight jobs drained");
                true
            }
            Err(_) => {
                tracing::warn!(
                    "Graceful drain timed out ({} jobs still active)",
                    self.in_flight()
                );
                tracing::debug!("Aborting remaining jobs");
                self.inner.abort.cancel();
                false
            }
        }
    }
}

/// A job counted as in flight until dropped.
#[derive(Debug)]
pub struct InFlightJob {
    inner: Arc<Inner>,
}

impl Drop for InFlightJob {
    fn drop(&mut self) {
        self.inner.in_flight.fetch_sub(1, Ordering::AcqRel);
        decrement_jobs_inflight();
    }
}
