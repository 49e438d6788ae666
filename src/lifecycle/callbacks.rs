//! Cleanup callbacks run after every listener has stopped.
//!
//! # Responsibilities
//! - Keep named callbacks in registration order
//! - Run them concurrently, each with its own deadline-bound [`CallbackContext`]
//! - Wait for every callback to return, including ones that overrun
//!
//! # Design Decisions
//! - Cancellation is cooperative: at the deadline the context is cancelled and
//!   the overrun is logged, but the callback is never aborted
//! - Each deadline counts from the moment that callback starts
//! - A panicking callback is logged and does not affect the others

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::{join_all, BoxFuture, FutureExt};
use thiserror::Error;
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;

use crate::observability::metrics;

/// Why a [`CallbackContext`] is done.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum ContextError {
    #[error("callback deadline exceeded")]
    DeadlineExceeded,
    #[error("callback cancelled")]
    Cancelled,
}

/// Cancellation signal handed to a cleanup callback.
///
/// Fires when the deadline passes or the orchestrator cancels it, whichever
/// comes first.
#[derive(Debug, Clone)]
pub struct CallbackContext {
    token: CancellationToken,
    deadline: Instant,
}

impl CallbackContext {
    /// A context whose deadline is `timeout` from now.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            token: CancellationToken::new(),
            deadline: Instant::now() + timeout,
        }
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Time left until the deadline, zero once it has passed.
    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    /// Resolves once the context is done.
    pub async fn cancelled(&self) {
        tokio::select! {
            () = self.token.cancelled() => {}
            () = sleep_until(self.deadline) => {}
        }
    }

    pub fn is_done(&self) -> bool {
        self.error().is_some()
    }

    /// `None` while the callback may keep working.
    pub fn error(&self) -> Option<ContextError> {
        if Instant::now() >= self.deadline {
            Some(ContextError::DeadlineExceeded)
        } else if self.token.is_cancelled() {
            Some(ContextError::Cancelled)
        } else {
            None
        }
    }

    /// Token for sub-tasks; cancelled when the orchestrator cancels this
    /// context at its deadline.
    pub fn child_token(&self) -> CancellationToken {
        self.token.child_token()
    }

    fn cancel(&self) {
        self.token.cancel();
    }
}

type CallbackFn = dyn Fn(CallbackContext) -> BoxFuture<'static, ()> + Send + Sync;

/// A named cleanup callback.
#[derive(Clone)]
struct ShutdownCallback {
    name: String,
    run: Arc<CallbackFn>,
}

impl ShutdownCallback {
    fn new<F, Fut>(name: impl Into<String>, callback: F) -> Self
    where
        F: Fn(CallbackContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        Self {
            name: name.into(),
            run: Arc::new(move |ctx: CallbackContext| callback(ctx).boxed()),
        }
    }

}

impl fmt::Debug for ShutdownCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShutdownCallback").field("name", &self.name).finish()
    }
}

/// How a single callback run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackOutcome {
    pub name: String,
    pub elapsed: Duration,
    /// Still running when its deadline passed.
    pub overran: bool,
    pub panicked: bool,
}

/// Ordered collection of cleanup callbacks.
#[derive(Debug, Clone, Default)]
pub struct CallbackRegistry {
    callbacks: Vec<ShutdownCallback>,
}

impl CallbackRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F, Fut>(mut self, name: impl Into<String>, callback: F) -> Self
    where
        F: Fn(CallbackContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.callbacks.push(ShutdownCallback::new(name, callback));
        self
    }

    pub fn len(&self) -> usize {
        self.callbacks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.callbacks.is_empty()
    }

    /// Run every callback concurrently and wait for all of them.
    ///
    /// Outcomes are returned in registration order.
    pub async fn run_all(&self, timeout: Duration) -> Vec<CallbackOutcome> {
        let handles: Vec<_> = self
            .callbacks
            .iter()
            .map(|cb| (cb.name.clone(), tokio::spawn(run_one(cb.clone(), timeout))))
            .collect();

        let names: Vec<_> = handles.iter().map(|(name, _)| name.clone()).collect();
        let results = join_all(handles.into_iter().map(|(_, handle)| handle)).await;

        names
            .into_iter()
            .zip(results)
            .map(|(name, result)| match result {
                Ok(outcome) => outcome,
                Err(e) => {
                    tracing::error!(callback = %name, error = %e, "Callback panicked");
                    CallbackOutcome {
                        name,
                        elapsed: Duration::ZERO,
                        overran: false,
                        panicked: true,
                    }
                }
            })
            .collect()
    }
}

async fn run_one(callback: ShutdownCallback, timeout: Duration) -> CallbackOutcome {
    let started = Instant::now();
    let ctx = CallbackContext::with_timeout(timeout);
    let deadline = ctx.deadline();
    let cancel = ctx.clone();

    tracing::info!(callback = %callback.name, timeout_ms = timeout.as_millis() as u64, "Running shutdown callback");
    let mut work = (callback.run)(ctx);

    let overran = tokio::select! {
        biased;
        () = &mut work => false,
        () = sleep_until(deadline) => {
            cancel.cancel();
            metrics::record_callback_overrun(&callback.name);
            tracing::warn!(
                callback = %callback.name,
                timeout_ms = timeout.as_millis() as u64,
                "Callback deadline exceeded, waiting for it to return"
            );
            work.await;
            true
        }
    };

    let elapsed = started.elapsed();
    if overran {
        tracing::warn!(callback = %callback.name, elapsed_ms = elapsed.as_millis() as u64, "Callback returned after its deadline");
    } else {
        tracing::info!(callback = %callback.name, elapsed_ms = elapsed.as_millis() as u64, "Callback finished");
    }

    CallbackOutcome {
        name: callback.name,
        elapsed,
        overran,
        panicked: false,
    }
}
