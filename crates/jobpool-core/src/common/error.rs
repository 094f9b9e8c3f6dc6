//! Error types for the job dispatch system.
//!
//! This module defines the central `Error` enum shared by the connection
//! pool, the dispatcher, and the worker. It implements `From<Error>` for
//! `tonic::Status` so errors raised on the gRPC side propagate to callers
//! with an appropriate status code.
//!
//! ## Error Cases
//! - `InvalidInput`: Malformed request parameters or configuration. Caused by
//!   the client and never retried.
//! - `PoolTimeout`: No connection became available before the deadline.
//! - `PoolClosed`: The pool was closed while or before acquiring.
//! - `AcquireCancelled`: The caller gave up while waiting for a connection.
//! - `Connection`: The backend is unreachable or a connection broke mid-use.
//! - `Protocol`: A response did not match the outstanding request.
//! - `Remote`: The worker answered with a gRPC error status.
//! - `ServiceUnavailable`: The dispatcher could not obtain a connection; wraps
//!   the pool failure that caused it.
//! - `ServiceShutdown`: A request arrived while the service was draining.

use core::time::Duration;
use tonic::{Code, Status};

pub type Result<T> = core::result::Result<T, Error>;

/// Unified error type for the job dispatch system.
#[derive(Clone, thiserror::Error, Debug)]
pub enum Error {
    /// The request or configuration was malformed.
    #[error("Invalid input: {reason}")]
    InvalidInput { reason: String },

    /// The pool stayed saturated until the acquisition deadline.
    #[error("Timed out after {waited:?} waiting for a pooled connection")]
    PoolTimeout { waited: Duration },

    /// The pool has been closed.
    #[error("Connection pool is closed")]
    PoolClosed,

    /// The caller cancelled while waiting for a pooled connection.
    #[error("Connection acquisition was cancelled")]
    AcquireCancelled,

    /// The backend could not be reached, or a connection broke during use.
    #[error("Connection error: {context}")]
    Connection { context: String },

    /// The backend replied with something that does not answer the request.
    #[error("Protocol error: {reason}")]
    Protocol { reason: String },

    /// The worker returned a gRPC error.
    #[error("Remote call failed ({code:?}): {message}")]
    Remote { code: Code, message: String },

    /// No pooled connection could be obtained for the request.
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(#[source] Box<Error>),

    /// The service is in the process of shutting down.
    #[error("Service is shutting down")]
    ServiceShutdown,
}

impl Error {
    /// Returns `true` when the failure was caused by the client and should be
    /// reported as a client error.
    pub const fn is_client_error(&self) -> bool {
        matches!(self, Self::InvalidInput { .. })
    }
}

impl From<Status> for Error {
    fn from(status: Status) -> Self {
        Self::Remote {
            code: status.code(),
            message: status.message().to_string(),
        }
    }
}

impl From<Error> for Status {
    fn from(err: Error) -> Self {
        match err {
            Error::InvalidInput { reason } => Status::invalid_argument(reason),
            Error::PoolTimeout { waited } => Status::resource_exhausted(format!(
                "No pooled connection available after {waited:?}"
            )),
            Error::PoolClosed => Status::unavailable("Connection pool is closed"),
            Error::AcquireCancelled => Status::cancelled("Connection acquisition was cancelled"),
            Error::Connection { context } => {
                Status::unavailable(format!("Connection error: {context}"))
            }
            Error::Protocol { reason } => Status::internal(format!("Protocol error: {reason}")),
            Error::Remote { code, message } => Status::new(code, message),
            Error::ServiceUnavailable(inner) => {
                Status::unavailable(format!("Service unavailable: {inner}"))
            }
            Error::ServiceShutdown => Status::unavailable("Service is shutting down"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_invalid_input_is_a_client_error() {
        let invalid = Error::InvalidInput {
            reason: "invalid base value".to_string(),
        };
        assert!(invalid.is_client_error());
        assert!(!Error::PoolClosed.is_client_error());
        assert!(!Error::ServiceUnavailable(Box::new(invalid)).is_client_error());
    }

    #[test]
    fn maps_errors_onto_grpc_codes() {
        let status: Status = Error::PoolTimeout {
            waited: Duration::from_secs(1),
        }
        .into();
        assert_eq!(status.code(), Code::ResourceExhausted);

        let status: Status = Error::Protocol {
            reason: "job id mismatch".to_string(),
        }
        .into();
        assert_eq!(status.code(), Code::Internal);

        let status: Status = Error::ServiceUnavailable(Box::new(Error::PoolClosed)).into();
        assert_eq!(status.code(), Code::Unavailable);
    }

    #[test]
    fn remote_status_round_trips_its_code() {
        let err = Error::from(Status::unavailable("worker is draining"));
        assert!(matches!(
            &err,
            Error::Remote { code: Code::Unavailable, message } if message == "worker is draining"
        ));
        let status: Status = err.into();
        assert_eq!(status.code(), Code::Unavailable);
        assert_eq!(status.message(), "worker is draining");
    }
}
