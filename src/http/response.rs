//! Fixed responses produced by the orchestrator itself.

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};

/// Body returned to every request that arrives after a gate closes.
pub const UNAVAILABLE_BODY: &str = "service is shutting down";

/// The response a closed gate answers with.
///
/// `Connection: close` asks keep-alive clients to go away before the
/// listener itself is stopped.
pub fn service_unavailable() -> Response {
    (
        StatusCode::SERVICE_UNAVAILABLE,
        [(header::CONNECTION, "close")],
        UNAVAILABLE_BODY,
    )
        .into_response()
}
