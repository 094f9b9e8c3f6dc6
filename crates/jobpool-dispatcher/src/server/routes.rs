//! HTTP routes.
//!
//! - `GET /power?base=<float>&exponent=<float>` dispatches one job and
//!   answers with `(base)^(exponent) = value` plus an `x-worker-id` header.
//! - `GET /healthz` always answers `200`.
//!
//! Failures are plain text: `400` with the validation message for bad
//! operands, `500` otherwise.

use crate::{connection::ComputeConnection, dispatcher::Dispatcher};
use axum::{
    Router,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use jobpool_core::{Error, pool::ManageConnection};
use serde::Deserialize;
use tower_http::trace::TraceLayer;

pub const WORKER_ID_HEADER: &str = "x-worker-id";

/// Query string of `/power`. Missing operands are validated like malformed
/// ones instead of being rejected by the extractor.
#[derive(Debug, Default, Deserialize)]
pub struct PowerParams {
    pub base: Option<String>,
    pub exponent: Option<String>,
}

/// Maps dispatch failures onto plain-text HTTP responses.
#[derive(Debug)]
pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self.0 {
            Error::InvalidInput { reason } => (StatusCode::BAD_REQUEST, reason.as_str()),
            Error::ServiceUnavailable(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "failed to connect to worker",
            ),
            _ => (StatusCode::INTERNAL_SERVER_ERROR, "failed to compute result"),
        };

        (status, format!("{message}\n")).into_response()
    }
}

pub fn router<M>(dispatcher: Dispatcher<M>) -> Router
where
    M: ManageConnection,
    M::Connection: ComputeConnection,
{
    Router::new()
        .route("/power", get(power::<M>))
        .route("/healthz", get(healthz))
        .layer(TraceLayer::new_for_http())
        .with_state(dispatcher)
}

async fn power<M>(
    State(dispatcher): State<Dispatcher<M>>,
    Query(params): Query<PowerParams>,
) -> Result<impl IntoResponse, ApiError>
where
    M: ManageConnection,
    M::Connection: ComputeConnection,
{
    let base = params.base.as_deref().unwrap_or_default();
    let exponent = params.exponent.as_deref().unwrap_or_default();

    let result = dispatcher.handle(base, exponent).await?;

    Ok((
        [(WORKER_ID_HEADER, result.worker_id.clone())],
        format!("{result}\n"),
    ))
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}
