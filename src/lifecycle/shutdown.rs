//! Shutdown trigger shared by every trigger source.

use std::fmt;
use std::sync::Arc;

use tokio::sync::watch;

/// What started the shutdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// An OS signal, by name.
    Signal(&'static str),
    /// The startup grace period elapsed.
    GraceElapsed,
    /// Requested through [`Shutdown::trigger`] by the embedding program.
    Manual,
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Trigger::Signal(name) => write!(f, "signal {name}"),
            Trigger::GraceElapsed => f.write_str("startup grace elapsed"),
            Trigger::Manual => f.write_str("manual"),
        }
    }
}

/// Coordinator for the shutdown trigger.
///
/// The first trigger wins and is kept; waiters that subscribe late still see it.
#[derive(Debug, Clone)]
pub struct Shutdown {
    tx: Arc<watch::Sender<Option<Trigger>>>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(None);
        Self { tx: Arc::new(tx) }
    }

    /// Fire the trigger. Returns `false` if shutdown was already triggered.
    pub fn trigger(&self, trigger: Trigger) -> bool {
        self.tx.send_if_modified(|current| {
            if current.is_some() {
                return false;
            }
            *current = Some(trigger);
            true
        })
    }

    /// The winning trigger, if any.
    pub fn triggered(&self) -> Option<Trigger> {
        *self.tx.borrow()
    }

    /// Wait for the first trigger.
    pub async fn wait(&self) -> Trigger {
        let mut rx = self.tx.subscribe();
        loop {
            if let Some(trigger) = *rx.borrow_and_update() {
                return trigger;
            }
            // `self` keeps the sender alive, so this only errors if that changes.
            if rx.changed().await.is_err() {
                return std::future::pending().await;
            }
        }
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}
