//! In-memory workers for exercising the dispatcher without a network.

use crate::connection::ComputeConnection;
use core::{
    sync::atomic::{AtomicUsize, Ordering},
    time::Duration,
};
use jobpool_core::{
    Result,
    pool::ManageConnection,
    proto::{JobRequest, JobResponse},
};
use std::sync::Arc;
use tonic::{Code, Status};

/// How a fake worker answers.
#[derive(Clone, Copy, Debug)]
pub enum Reply {
    /// Computes the job and echoes its id.
    Echo,
    /// Computes the job but answers with another job's id.
    WrongId,
    /// Fails with the given status code.
    Fail(Code),
    /// Panics mid-call.
    Panic,
}

#[derive(Debug)]
pub struct FakeWorker {
    delay: Duration,
    reply: Reply,
}

impl ComputeConnection for FakeWorker {
    async fn compute(
        &mut self,
        request: JobRequest,
    ) -> core::result::Result<JobResponse, Status> {
        tokio::time::sleep(self.delay).await;

        let id = match self.reply {
            Reply::Echo => request.id,
            Reply::WrongId => format!("not-{}", request.id),
            Reply::Fail(code) => return Err(Status::new(code, "fake worker failure")),
            Reply::Panic => panic!("fake worker crashed mid-call"),
        };

        Ok(JobResponse {
            id,
            worker_id: "fake-worker".to_string(),
            result: f64::from(request.base).powf(f64::from(request.exponent)) as f32,
        })
    }
}

/// Hands out [`FakeWorker`]s and counts how often it was asked to.
#[derive(Clone, Debug)]
pub struct FakeManager {
    delay: Duration,
    reply: Reply,
    dials: Arc<AtomicUsize>,
}

impl FakeManager {
    pub fn new(delay: Duration, reply: Reply) -> Self {
        Self {
            delay,
            reply,
            dials: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn dials(&self) -> usize {
        self.dials.load(Ordering::SeqCst)
    }
}

impl ManageConnection for FakeManager {
    type Connection = FakeWorker;

    async fn connect(&self) -> Result<Self::Connection> {
        self.dials.fetch_add(1, Ordering::SeqCst);
        Ok(FakeWorker {
            delay: self.delay,
            reply: self.reply,
        })
    }
}
