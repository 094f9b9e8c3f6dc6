//! gRPC connections to the worker.
//!
//! [`GrpcConnectionManager`] teaches the pool how to dial the worker, and
//! [`ComputeConnection`] is the one call the dispatcher makes over a pooled
//! connection. Keeping the call behind a trait lets the dispatcher run
//! against in-memory connections in tests.

use core::{future::Future, time::Duration};
use jobpool_core::{
    Error, Result,
    pool::ManageConnection,
    proto::{JobRequest, JobResponse, worker_client::WorkerClient},
};
use tonic::{
    Status,
    codec::CompressionEncoding,
    transport::{Channel, Endpoint},
};

/// A connection that can carry `Work` calls to a worker.
pub trait ComputeConnection: Send + 'static {
    /// Sends one job and waits for the worker's reply.
    fn compute(
        &mut self,
        request: JobRequest,
    ) -> impl Future<Output = core::result::Result<JobResponse, Status>> + Send;
}

impl ComputeConnection for WorkerClient<Channel> {
    async fn compute(
        &mut self,
        request: JobRequest,
    ) -> core::result::Result<JobResponse, Status> {
        self.work(request).await.map(tonic::Response::into_inner)
    }
}

/// Dials dedicated HTTP/2 channels to a single worker endpoint.
#[derive(Clone, Debug)]
pub struct GrpcConnectionManager {
    endpoint: Endpoint,
}

impl GrpcConnectionManager {
    /// Builds a manager for `uri`. A bare `host:port` is treated as
    /// `http://host:port`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if `uri` is not a valid URI.
    pub fn new(uri: &str, connect_timeout: Duration) -> Result<Self> {
        let uri = if uri.contains("://") {
            uri.to_string()
        } else {
            format!("http://{uri}")
        };

        let endpoint = Endpoint::from_shared(uri.clone())
            .map_err(|e| Error::InvalidInput {
                reason: format!("invalid worker address `{uri}`: {e}"),
            })?
            .connect_timeout(connect_timeout)
            .tcp_keepalive(Some(Duration::from_secs(30)))
            .tcp_nodelay(true);

        Ok(Self { endpoint })
    }

    pub fn uri(&self) -> String {
        self.endpoint.uri().to_string()
    }
}

impl ManageConnection for GrpcConnectionManager {
    type Connection = WorkerClient<Channel>;

    async fn connect(&self) -> Result<Self::Connection> {
        let channel = self
            .endpoint
            .connect()
            .await
            .map_err(|e| Error::Connection {
                context: format!("failed to connect to worker at {}: {e}", self.endpoint.uri()),
            })?;

        Ok(WorkerClient::new(channel)
            .send_compressed(CompressionEncoding::Gzip)
            .accept_compressed(CompressionEncoding::Zstd)
            .accept_compressed(CompressionEncoding::Gzip))
    }
}
