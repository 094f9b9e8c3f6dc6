//! gRPC `Worker` service implementation.
//!
//! [`WorkerService`] evaluates one job per call. It keeps no state between
//! jobs: every call computes, sleeps the configured processing delay, and
//! answers with the job id it was given and the worker's identity. A job still
//! sleeping when a shutdown drain times out is aborted with `UNAVAILABLE`.

use crate::server::{
    identity::WorkerIdentity,
    lifecycle::Lifecycle,
    metrics::{increment_jobs, record_job_duration},
};
use core::time::Duration;
use jobpool_core::{
    Error,
    proto::{
        JobRequest, JobResponse,
        worker_server::{Worker, WorkerServer},
    },
};
use tonic::{Request, Response, Status, codec::CompressionEncoding};

/// Computes `base ^ exponent` with IEEE-754 `pow` semantics.
///
/// The operands are widened to `f64`, raised, and narrowed back. Notable
/// cases follow the platform `pow`: `0 ^ 0 == 1`, anything `^ 0 == 1`, and a
/// negative base with a non-integer exponent is NaN. Results outside the
/// `f32` range become infinite.
pub fn compute_power(base: f32, exponent: f32) -> f32 {
    f64::from(base).powf(f64::from(exponent)) as f32
}

#[derive(Clone, Debug)]
pub struct WorkerService {
    identity: WorkerIdentity,
    work_delay: Duration,
    lifecycle: Lifecycle,
}

impl WorkerService {
    pub fn new(identity: WorkerIdentity, work_delay: Duration, lifecycle: Lifecycle) -> Self {
        Self {
            identity,
            work_delay,
            lifecycle,
        }
    }

    pub const fn identity(&self) -> &WorkerIdentity {
        &self.identity
    }

    pub const fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }
}

#[tonic::async_trait]
impl Worker for WorkerService {
    /// Computes a single job.
    ///
    /// Refused with `UNAVAILABLE` unless the worker is serving. Operands are
    /// not validated here; malformed values simply produce NaN.
    #[tracing::instrument(skip_all, fields(job_id = %req.get_ref().id))]
    async fn work(&self, req: Request<JobRequest>) -> Result<Response<JobResponse>, Status> {
        let Some(_in_flight) = self.lifecycle.begin_job() else {
            tracing::warn!(state = %self.lifecycle.state(), "refusing job");
            return Err(Error::ServiceShutdown.into());
        };

        let start = std::time::Instant::now();
        let JobRequest { id, base, exponent } = req.into_inner();
        let result = compute_power(base, exponent);

        tokio::select! {
            () = tokio::time::sleep(self.work_delay) => {}
            () = self.lifecycle.aborted() => {
                tracing::warn!("job aborted by shutdown");
                return Err(Error::ServiceShutdown.into());
            }
        }

        increment_jobs();
        record_job_duration(start.elapsed().as_secs_f64() * 1000.0);
        tracing::info!(base, exponent, result, "job computed");

        Ok(Response::new(JobResponse {
            id,
            worker_id: self.identity.to_string(),
            result,
        }))
    }
}

/// Wraps `service` in a gRPC server with compression negotiated both ways.
pub fn build_worker_service(service: WorkerService) -> WorkerServer<WorkerService> {
    WorkerServer::new(service)
        .send_compressed(CompressionEncoding::Zstd)
        .send_compressed(CompressionEncoding::Gzip)
        .send_compressed(CompressionEncoding::Deflate)
        .accept_compressed(CompressionEncoding::Zstd)
        .accept_compressed(CompressionEncoding::Gzip)
        .accept_compressed(CompressionEncoding::Deflate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::lifecycle::WorkerState;
    use tonic::Code;

    fn service(delay: Duration) -> WorkerService {
        let lifecycle = Lifecycle::new();
        lifecycle.transition(WorkerState::Ready);
        lifecycle.transition(WorkerState::Serving);
        WorkerService::new(WorkerIdentity::new("worker-test"), delay, lifecycle)
    }

    fn request(id: &str, base: f32, exponent: f32) -> Request<JobRequest> {
        Request::new(JobRequest {
            id: id.to_string(),
            base,
            exponent,
        })
    }

    #[test]
    fn power_follows_ieee_semantics() {
        assert_eq!(compute_power(2.0, 10.0), 1024.0);
        assert_eq!(compute_power(0.0, 0.0), 1.0);
        assert_eq!(compute_power(f32::NAN, 0.0), 1.0);
        assert_eq!(compute_power(-2.0, 3.0), -8.0);
        assert!(compute_power(-8.0, 1.0 / 3.0).is_nan());
        assert!(compute_power(10.0, 40.0).is_infinite());
    }

    #[tokio::test(start_paused = true)]
    async fn echoes_the_job_id_and_reports_identity() {
        let service = service(Duration::from_secs(10));

        let started = tokio::time::Instant::now();
        let response = service
            .work(request("job-1", 2.0, 10.0))
            .await
            .unwrap()
            .into_inner();

        assert!(started.elapsed() >= Duration::from_secs(10));
        assert_eq!(response.id, "job-1");
        assert_eq!(response.worker_id, "worker-test");
        assert_eq!(response.result, 1024.0);
        assert_eq!(service.lifecycle().in_flight(), 0);
    }

    #[tokio::test]
    async fn refuses_jobs_while_draining() {
        let service = service(Duration::ZERO);
        service.lifecycle().transition(WorkerState::Draining);

        let status = service.work(request("job-2", 1.0, 1.0)).await.unwrap_err();
        assert_eq!(status.code(), Code::Unavailable);
    }

    #[tokio::test(start_paused = true)]
    async fn drain_timeout_aborts_running_jobs() {
        let service = service(Duration::from_secs(3600));

        let job = tokio::spawn({
            let service = service.clone();
            async move { service.work(request("job-3", 2.0, 2.0)).await }
        });
        while service.lifecycle().in_flight() == 0 {
            tokio::task::yield_now().await;
        }

        let started = tokio::time::Instant::now();
        assert!(!service.lifecycle().drain(Duration::from_millis(200)).await);

        let status = job.await.unwrap().unwrap_err();
        assert_eq!(status.code(), Code::Unavailable);
        assert!(started.elapsed() < Duration::from_secs(1));
        assert_eq!(service.lifecycle().in_flight(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_jobs_are_independent() {
        let service = service(Duration::from_secs(1));

        let (a, b) = tokio::join!(
            service.work(request("a", 3.0, 2.0)),
            service.work(request("b", 2.0, 3.0)),
        );

        let a = a.unwrap().into_inner();
        let b = b.unwrap().into_inner();
        assert_eq!((a.id.as_str(), a.result), ("a", 9.0));
        assert_eq!((b.id.as_str(), b.result), ("b", 8.0));
    }
}
