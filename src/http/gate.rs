//! Request gate: rejects new requests once shutdown begins.
//!
//! # Responsibilities
//! - Hold the per-listener "reject" flag
//! - Wrap any request-routing service and short-circuit it once closed
//! - Track admitted requests so draining can wait for them
//!
//! # Design Decisions
//! - Composition: `GateLayer` wraps any `Service<Request>`; the routing table is untouched
//! - One-directional: a closed gate is never reopened
//! - Release store on close, Acquire load per request

use std::convert::Infallible;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::http::Request;
use axum::response::Response;
use futures_util::future::{self, BoxFuture, FutureExt};
use tower::{Layer, Service};

use crate::http::in_flight::InFlightTracker;
use crate::http::response::service_unavailable;
use crate::observability::metrics;

#[derive(Debug)]
struct GateState {
    listener: String,
    reject: AtomicBool,
    in_flight: InFlightTracker,
}

/// Shared handle to a listener's reject flag.
///
/// Cloning is cheap; all clones observe the same flag.
#[derive(Debug, Clone)]
pub struct RequestGate {
    state: Arc<GateState>,
}

impl RequestGate {
    /// Create an open gate for the named listener.
    pub fn new(listener: impl Into<String>) -> Self {
        Self {
            state: Arc::new(GateState {
                listener: listener.into(),
                reject: AtomicBool::new(false),
                in_flight: InFlightTracker::new(),
            }),
        }
    }

    /// Start rejecting requests. Idempotent.
    pub fn close(&self) {
        if !self.state.reject.swap(true, Ordering::AcqRel) {
            tracing::info!(listener = %self.state.listener, "Gate closed, rejecting new requests");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.state.reject.load(Ordering::Acquire)
    }

    /// Requests admitted before the gate closed that are still running.
    pub fn in_flight(&self) -> usize {
        self.state.in_flight.count()
    }

    /// Wait for every admitted request to complete.
    pub async fn wait_idle(&self) {
        self.state.in_flight.wait_idle().await
    }

    pub fn layer(&self) -> GateLayer {
        GateLayer { gate: self.clone() }
    }
}

/// Layer that puts a [`RequestGate`] in front of a service.
#[derive(Debug, Clone)]
pub struct GateLayer {
    gate: RequestGate,
}

impl<S> Layer<S> for GateLayer {
    type Service = Gate<S>;

    fn layer(&self, inner: S) -> Self::Service {
        Gate {
            inner,
            gate: self.gate.clone(),
        }
    }
}

/// Service produced by [`GateLayer`].
#[derive(Debug, Clone)]
pub struct Gate<S> {
    inner: S,
    gate: RequestGate,
}

impl<S, B> Service<Request<B>> for Gate<S>
where
    S: Service<Request<B>, Response = Response, Error = Infallible> + Clone + Send + 'static,
    S::Future: Send + 'static,
    B: Send + 'static,
{
    type Response = Response;
    type Error = Infallible;
    type Future = BoxFuture<'static, Result<Response, Infallible>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<B>) -> Self::Future {
        if self.gate.is_closed() {
            tracing::debug!(
                listener = %self.gate.state.listener,
                path = %req.uri().path(),
                "Rejecting request, listener is shutting down"
            );
            metrics::record_rejected(&self.gate.state.listener);
            return future::ready(Ok(service_unavailable())).boxed();
        }

        let guard = self.gate.state.in_flight.track();
        // The clone is not guaranteed to be ready; keep the one poll_ready was called on.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        async move {
            let response = inner.call(req).await;
            drop(guard);
            response
        }
        .boxed()
    }
}
