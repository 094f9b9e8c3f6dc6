//! Job and result types shared by the dispatcher and the worker.
//!
//! A [`Job`] is created by the dispatcher for every inbound request and is
//! immutable afterwards. Its [`JobId`] is a fresh random UUID that travels
//! to the worker and back, so the dispatcher can check that the
//! [`JobResult`] it receives answers the job it sent.

use crate::{
    Error, Result,
    proto::{JobRequest, JobResponse},
};
use core::fmt;

/// Opaque, unique job identifier.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct JobId(String);

impl JobId {
    /// Generates a new random identifier. Identifiers are never reused.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().hyphenated().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for JobId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// A single unit of requested computation: `base ^ exponent`.
#[derive(Clone, Debug, PartialEq)]
pub struct Job {
    id: JobId,
    base: f32,
    exponent: f32,
}

impl Job {
    /// Creates a job for already validated operands with a fresh id.
    pub fn new(base: f32, exponent: f32) -> Self {
        Self::with_id(JobId::generate(), base, exponent)
    }

    pub const fn with_id(id: JobId, base: f32, exponent: f32) -> Self {
        Self { id, base, exponent }
    }

    pub const fn id(&self) -> &JobId {
        &self.id
    }

    pub const fn base(&self) -> f32 {
        self.base
    }

    pub const fn exponent(&self) -> f32 {
        self.exponent
    }

    /// Builds the wire request for this job.
    pub fn to_request(&self) -> JobRequest {
        JobRequest {
            id: self.id.to_string(),
            base: self.base,
            exponent: self.exponent,
        }
    }
}

/// The outcome of a completed [`Job`], tagged with the worker that computed
/// it.
///
/// Displays as `(base)^(exponent) = value` with six decimal places.
#[derive(Clone, Debug, PartialEq)]
pub struct JobResult {
    pub id: JobId,
    pub worker_id: String,
    pub base: f32,
    pub exponent: f32,
    pub value: f32,
}

impl JobResult {
    /// Converts a worker response into the result of `job`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Protocol`] if the response carries a different job id
    /// than the one that was sent, or no worker identity at all.
    pub fn from_response(job: &Job, response: JobResponse) -> Result<Self> {
        if response.id != job.id.as_str() {
            return Err(Error::Protocol {
                reason: format!(
                    "response for job `{}` does not match outstanding job `{}`",
                    response.id, job.id
                ),
            });
        }

        if response.worker_id.is_empty() {
            return Err(Error::Protocol {
                reason: format!("response for job `{}` has no worker id", job.id),
            });
        }

        Ok(Self {
            id: job.id.clone(),
            worker_id: response.worker_id,
            base: job.base,
            exponent: job.exponent,
            value: response.result,
        })
    }
}

impl fmt::Display for JobResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({:.6})^({:.6}) = {:.6}",
            self.base, self.exponent, self.value
        )
    }
}
