//! In-flight request tracking for draining.
//!
//! # Responsibilities
//! - Count requests admitted through a gate that have not completed yet
//! - Let the draining phase wait for that count to reach zero
//!
//! # Design Decisions
//! - Guard-based: the count drops even if the handler future is cancelled
//! - Waiters are woken only on the 1 → 0 transition

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::Notify;

#[derive(Debug, Default)]
struct Counter {
    active: AtomicUsize,
    idle: Notify,
}

/// Tracks requests currently being handled.
#[derive(Debug, Clone, Default)]
pub struct InFlightTracker {
    inner: Arc<Counter>,
}

impl InFlightTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a new request. The returned guard decrements on drop.
    pub fn track(&self) -> InFlightGuard {
        self.inner.active.fetch_add(1, Ordering::SeqCst);
        InFlightGuard {
            inner: Arc::clone(&self.inner),
        }
    }

    /// Number of requests currently in flight.
    pub fn count(&self) -> usize {
        self.inner.active.load(Ordering::SeqCst)
    }

    /// Wait until no request is in flight.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.inner.idle.notified();
            tokio::pin!(notified);
            // Register before checking so a concurrent 1 → 0 cannot be missed.
            notified.as_mut().enable();

            if self.count() == 0 {
                return;
            }
            notified.await;
        }
    }
}

/// Guard for a single in-flight request.
#[derive(Debug)]
pub struct InFlightGuard {
    inner: Arc<Counter>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        if self.inner.active.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.inner.idle.notify_waiters();
        }
    }
}
