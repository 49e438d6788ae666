//! Managed TCP listener with a request gate and graceful stop.
//!
//! # Responsibilities
//! - Bind to the configured address and serve an axum router
//! - Put the listener's [`RequestGate`] in front of the router
//! - Stop on request: stop accepting, finish dispatched requests, release the port
//! - Report orchestrator-initiated closure distinctly from bind/serve failures
//!
//! # Design Decisions
//! - Routes are registered before start; the router is fixed afterwards
//! - `stop` is bounded by a caller-supplied budget; a listener that overruns
//!   it is still treated as stopped
//! - State is published on a watch channel so `stop` can wait for the serve
//!   loop to actually exit

use std::net::SocketAddr;
use std::time::Duration;

use axum::extract::Request;
use axum::routing::MethodRouter;
use axum::{Router, ServiceExt};
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tower::Layer;
use tower_http::trace::TraceLayer;

use crate::config::ListenerConfig;
use crate::http::RequestGate;

/// Error type for listener operations.
#[derive(Debug, Error)]
pub enum ListenerError {
    /// Failed to bind to address.
    #[error("listener `{name}` failed to bind {address}: {source}")]
    Bind {
        name: String,
        address: String,
        #[source]
        source: std::io::Error,
    },

    /// The serve loop failed after binding.
    #[error("listener `{name}` failed while serving: {source}")]
    Serve {
        name: String,
        #[source]
        source: std::io::Error,
    },

    /// The serve loop did not exit within the stop budget.
    #[error("listener `{name}` did not stop within {budget:?}")]
    StopTimeout { name: String, budget: Duration },
}

/// Observable lifecycle of a [`ManagedListener`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerState {
    /// Created, `start` not called yet.
    Idle,
    /// `start` called, bind in progress.
    Starting,
    /// Bound and accepting connections.
    Listening(SocketAddr),
    /// Serve loop has exited (or never ran).
    Stopped,
}

/// One network listener owned by the orchestrator.
pub struct ManagedListener {
    name: String,
    address: String,
    router: Router,
    gate: RequestGate,
    cancel: CancellationToken,
    state: watch::Sender<ListenerState>,
}

impl ManagedListener {
    pub fn new(name: impl Into<String>, address: impl Into<String>) -> Self {
        let name = name.into();
        let (state, _) = watch::channel(ListenerState::Idle);
        Self {
            gate: RequestGate::new(name.clone()),
            name,
            address: address.into(),
            router: Router::new(),
            cancel: CancellationToken::new(),
            state,
        }
    }

    pub fn from_config(config: &ListenerConfig) -> Self {
        Self::new(config.name.clone(), config.bind_address.clone())
    }

    /// Register a handler for `path`.
    ///
    /// Panics on an invalid or duplicate path, as [`Router::route`] does.
    pub fn route(mut self, path: &str, method_router: MethodRouter) -> Self {
        self.router = self.router.route(path, method_router);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn gate(&self) -> &RequestGate {
        &self.gate
    }

    pub fn state(&self) -> ListenerState {
        *self.state.borrow()
    }

    /// Wait until the listener is bound, returning its local address.
    ///
    /// Returns `None` if the listener stopped without ever binding.
    pub async fn wait_listening(&self) -> Option<SocketAddr> {
        let mut state = self.state.subscribe();
        let current = state
            .wait_for(|s| matches!(s, ListenerState::Listening(_) | ListenerState::Stopped))
            .await
            .ok()
            .map(|s| *s);
        match current {
            Some(ListenerState::Listening(addr)) => Some(addr),
            _ => None,
        }
    }

    /// Bind and serve until stopped.
    ///
    /// Returns `Ok(())` when the serve loop ended because of [`stop`](Self::stop),
    /// including a stop that arrived before binding.
    pub async fn start(&self) -> Result<(), ListenerError> {
        self.state.send_replace(ListenerState::Starting);
        // Also runs if the serve task is aborted after a stop timeout.
        let _stopped = MarkStopped(&self.state);
        self.serve().await
    }

    async fn serve(&self) -> Result<(), ListenerError> {
        if self.cancel.is_cancelled() {
            tracing::debug!(listener = %self.name, "Listener stopped before it started");
            return Ok(());
        }

        let listener = TcpListener::bind(&self.address)
            .await
            .map_err(|source| ListenerError::Bind {
                name: self.name.clone(),
                address: self.address.clone(),
                source,
            })?;
        let local_addr = listener.local_addr().map_err(|source| ListenerError::Bind {
            name: self.name.clone(),
            address: self.address.clone(),
            source,
        })?;

        // A stop that arrived during the bind must not see the port published.
        if self.cancel.is_cancelled() {
            tracing::debug!(listener = %self.name, address = %local_addr, "Listener stopped while binding");
            drop(listener);
            return Ok(());
        }

        self.state.send_replace(ListenerState::Listening(local_addr));
        tracing::info!(listener = %self.name, address = %local_addr, "Listener started");

        let app = self
            .gate
            .layer()
            .layer(self.router.clone().layer(TraceLayer::new_for_http()));
        let cancel = self.cancel.clone();

        axum::serve(listener, ServiceExt::<Request>::into_make_service(app))
            .with_graceful_shutdown(async move { cancel.cancelled_owned().await })
            .await
            .map_err(|source| ListenerError::Serve {
                name: self.name.clone(),
                source,
            })
    }

    /// Close the request gate; new requests get the fixed 503 response.
    pub fn reject_requests(&self) {
        self.gate.close();
    }

    /// Stop accepting, let dispatched requests finish, release the port.
    ///
    /// Waits at most `budget` for the serve loop to exit, including a start
    /// that is still binding. A listener that was never started stops
    /// immediately.
    pub async fn stop(&self, budget: Duration) -> Result<(), ListenerError> {
        tracing::info!(listener = %self.name, budget_ms = budget.as_millis() as u64, "Stopping listener");
        self.cancel.cancel();

        let mut state = self.state.subscribe();
        if *state.borrow_and_update() == ListenerState::Idle {
            return Ok(());
        }

        let stopped = tokio::time::timeout(budget, state.wait_for(|s| *s == ListenerState::Stopped))
            .await
            .is_ok();
        if !stopped {
            return Err(ListenerError::StopTimeout {
                name: self.name.clone(),
                budget,
            });
        }

        tracing::info!(listener = %self.name, "Listener stopped");
        Ok(())
    }
}

struct MarkStopped<'a>(&'a watch::Sender<ListenerState>);

impl Drop for MarkStopped<'_> {
    fn drop(&mut self) {
        self.0.send_replace(ListenerState::Stopped);
    }
}

impl std::fmt::Debug for ManagedListener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManagedListener")
            .field("name", &self.name)
            .field("address", &self.address)
            .field("state", &self.state())
            .field("rejecting", &self.gate.is_closed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::routing::get;
    use std::sync::Arc;

    fn listener(name: &str) -> Arc<ManagedListener> {
        Arc::new(ManagedListener::new(name, "127.0.0.1:0").route("/ping", get(|| async { "pong" })))
    }

    #[tokio::test]
    async fn start_and_stop_releases_the_port() {
        let managed = listener("business");
        let task = tokio::spawn({
            let managed = managed.clone();
            async move { managed.start().await }
        });

        let addr = managed.wait_listening().await.expect("listener should bind");
        assert_eq!(managed.state(), ListenerState::Listening(addr));

        managed.stop(Duration::from_secs(1)).await.unwrap();
        assert_eq!(managed.state(), ListenerState::Stopped);
        assert!(task.await.unwrap().is_ok(), "orchestrated stop is not an error");

        // Port is free again.
        TcpListener::bind(addr).await.unwrap();
    }

    #[tokio::test]
    async fn stop_before_start_skips_binding() {
        let managed = listener("admin");
        managed.stop(Duration::from_millis(10)).await.unwrap();

        assert!(managed.start().await.is_ok());
        assert_eq!(managed.state(), ListenerState::Stopped);
        assert_eq!(managed.wait_listening().await, None);
    }

    #[tokio::test]
    async fn stop_during_bind_waits_and_never_listens() {
        let managed = Arc::new(ManagedListener::new("business", "localhost:0"));
        let task = tokio::spawn({
            let managed = managed.clone();
            async move { managed.start().await }
        });

        // Let the start task reach the (resolving) bind.
        tokio::task::yield_now().await;
        assert_eq!(managed.state(), ListenerState::Starting);

        managed.stop(Duration::from_secs(1)).await.unwrap();
        assert_eq!(managed.state(), ListenerState::Stopped);
        assert!(task.await.unwrap().is_ok());
        assert_eq!(managed.wait_listening().await, None);
    }

    #[tokio::test]
    async fn bind_failure_is_reported() {
        let occupied = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = occupied.local_addr().unwrap();

        let managed = ManagedListener::new("business", addr.to_string());
        let err = managed.start().await.unwrap_err();

        assert!(matches!(err, ListenerError::Bind { ref name, .. } if name == "business"));
        assert_eq!(managed.state(), ListenerState::Stopped);
    }

    #[test]
    fn reject_requests_closes_gate() {
        let managed = listener("business");
        assert_eq!(managed.address(), "127.0.0.1:0");
        managed.reject_requests();
        assert!(managed.gate().is_closed());
    }
}
