//! Shared protocol bindings, types, and error definitions used by both the
//! dispatcher and the worker.
//!
//! ## Submodules
//!
//! - [`error`] - Unified error type and its gRPC status mapping.
//! - [`types`] - Job, result, and worker identity types.
//! - [`proto`] - Generated `Worker` service and message definitions.

pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::{Job, JobId, JobResult};

/// gRPC service and message definitions generated from
/// `proto/jobpool.proto`.
///
/// ## Service
///
/// - `Worker::Work` - evaluates a single [`JobRequest`] and replies with a
///   [`JobResponse`] carrying the same id and the worker's identity.
///
/// [`JobRequest`]: crate::proto::JobRequest
/// [`JobResponse`]: crate::proto::JobResponse
pub mod proto {
    tonic::include_proto!("jobpool");

    /// Encoded file descriptor set, registered with gRPC reflection.
    pub const FILE_DESCRIPTOR_SET: &[u8] =
        tonic::include_file_descriptor_set!("jobpool_descriptor");
}
