//! OS signal handling.
//!
//! # Responsibilities
//! - Register signal handlers (SIGINT, SIGTERM, SIGHUP, SIGQUIT on unix; Ctrl-C elsewhere)
//! - Translate the first signal into a [`Trigger`]
//! - Log later signals; shutdown is not interruptible once started
//!
//! # Design Decisions
//! - Uses Tokio's signal handling (async-safe)
//! - A handler that fails to register is logged and skipped, the rest still work

use tokio::task::JoinHandle;

use crate::lifecycle::shutdown::{Shutdown, Trigger};

/// Spawn a task that feeds OS signals into `shutdown`.
pub fn spawn_signal_listener(shutdown: Shutdown) -> JoinHandle<()> {
    tokio::spawn(listen(shutdown))
}

fn deliver(shutdown: &Shutdown, name: &'static str) {
    if shutdown.trigger(Trigger::Signal(name)) {
        tracing::info!(signal = name, "Termination signal received");
    } else {
        tracing::warn!(signal = name, "Shutdown already in progress, ignoring signal");
    }
}

#[cfg(unix)]
async fn listen(shutdown: Shutdown) {
    use tokio::signal::unix::{signal, Signal, SignalKind};

    fn register(kind: SignalKind, name: &'static str) -> Option<Signal> {
        match signal(kind) {
            Ok(sig) => Some(sig),
            Err(e) => {
                tracing::error!(signal = name, error = %e, "Failed to install signal handler");
                None
            }
        }
    }

    async fn recv(sig: &mut Option<Signal>) -> Option<()> {
        match sig {
            Some(sig) => sig.recv().await,
            None => std::future::pending().await,
        }
    }

    let mut sigint = register(SignalKind::interrupt(), "SIGINT");
    let mut sigterm = register(SignalKind::terminate(), "SIGTERM");
    let mut sighup = register(SignalKind::hangup(), "SIGHUP");
    let mut sigquit = register(SignalKind::quit(), "SIGQUIT");

    loop {
        let name = tokio::select! {
            Some(()) = recv(&mut sigint) => "SIGINT",
            Some(()) = recv(&mut sigterm) => "SIGTERM",
            Some(()) = recv(&mut sighup) => "SIGHUP",
            Some(()) = recv(&mut sigquit) => "SIGQUIT",
            else => return,
        };
        deliver(&shutdown, name);
    }
}

#[cfg(not(unix))]
async fn listen(shutdown: Shutdown) {
    loop {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            return;
        }
        deliver(&shutdown, "CTRL_C");
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn listener_waits_for_a_signal() {
        let shutdown = Shutdown::new();
        let handle = spawn_signal_listener(shutdown.clone());

        let result = tokio::time::timeout(Duration::from_millis(20), shutdown.wait()).await;
        assert!(result.is_err(), "no signal was sent");
        assert!(!handle.is_finished());

        handle.abort();
    }
}
