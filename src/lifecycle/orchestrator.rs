//! Orchestrator: runs the listeners and drives the shutdown sequence.
//!
//! # Shutdown phases
//! ```text
//! Running ──trigger──▶ Draining ──▶ StoppingListeners ──▶ RunningCallbacks
//!                                                             │
//!                          Terminated ◀── ReleasingResources ◀┘
//! ```
//!
//! # Design Decisions
//! - Phases are strictly sequential; fan-out inside a phase is joined before the next
//! - Every failure is logged and swallowed, the sequence always reaches Terminated
//! - The shutdown budget bounds listener stops (counted from the trigger); callbacks
//!   are never preempted, so an overrun past the budget is only reported

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use thiserror::Error;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::config::validation::{check_listener_names, validate_shutdown, ValidationError};
use crate::config::{DrainMode, ShutdownConfig};
use crate::lifecycle::callbacks::CallbackRegistry;
use crate::lifecycle::shutdown::{Shutdown, Trigger};
use crate::lifecycle::signals::spawn_signal_listener;
use crate::net::ManagedListener;
use crate::observability::metrics;

/// How long a listener task may take to exit after its stop returned.
const TASK_JOIN_GRACE: Duration = Duration::from_millis(100);

/// Lifecycle phase of an orchestrated process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Running,
    Draining,
    StoppingListeners,
    RunningCallbacks,
    ReleasingResources,
    Terminated,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Running => "running",
            Phase::Draining => "draining",
            Phase::StoppingListeners => "stopping_listeners",
            Phase::RunningCallbacks => "running_callbacks",
            Phase::ReleasingResources => "releasing_resources",
            Phase::Terminated => "terminated",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("invalid orchestrator setup: {}", .0.iter().map(ToString::to_string).collect::<Vec<_>>().join(", "))]
    Invalid(Vec<ValidationError>),
}

/// Owns the listeners and callbacks of a process and shuts them down in order.
pub struct Orchestrator {
    listeners: Vec<Arc<ManagedListener>>,
    callbacks: CallbackRegistry,
    config: ShutdownConfig,
    shutdown: Shutdown,
    phases: broadcast::Sender<Phase>,
    phase: Phase,
    phase_entered: Instant,
}

impl Orchestrator {
    /// Validate the setup and build an orchestrator.
    pub fn new(
        listeners: Vec<ManagedListener>,
        callbacks: CallbackRegistry,
        config: ShutdownConfig,
    ) -> Result<Self, OrchestratorError> {
        let mut errors = check_listener_names(listeners.iter().map(ManagedListener::name));
        if let Err(shutdown_errors) = validate_shutdown(&config) {
            errors.extend(shutdown_errors);
        }
        if !errors.is_empty() {
            return Err(OrchestratorError::Invalid(errors));
        }

        let (phases, _) = broadcast::channel(16);
        Ok(Self {
            listeners: listeners.into_iter().map(Arc::new).collect(),
            callbacks,
            config,
            shutdown: Shutdown::new(),
            phases,
            phase: Phase::Running,
            phase_entered: Instant::now(),
        })
    }

    /// Handle for triggering shutdown from code.
    pub fn shutdown_handle(&self) -> Shutdown {
        self.shutdown.clone()
    }

    /// Look up a listener by name.
    pub fn listener(&self, name: &str) -> Option<Arc<ManagedListener>> {
        self.listeners.iter().find(|l| l.name() == name).cloned()
    }

    /// Receive every phase transition from here on.
    pub fn subscribe_phases(&self) -> broadcast::Receiver<Phase> {
        self.phases.subscribe()
    }

    /// Install OS signal handlers, then [`serve`](Self::serve).
    pub async fn run(self) {
        let signals = spawn_signal_listener(self.shutdown.clone());
        self.serve().await;
        signals.abort();
    }

    /// Start every listener, wait for a trigger, shut down, return.
    ///
    /// Triggers come from [`shutdown_handle`](Self::shutdown_handle) or the
    /// startup grace timer; no OS signal handlers are installed.
    pub async fn serve(mut self) {
        self.phase_entered = Instant::now();
        let tasks = self.start_listeners();

        let trigger = self.wait_for_trigger().await;
        tracing::info!(trigger = %trigger, "Shutdown triggered");

        self.shutdown_sequence(trigger, tasks).await;
    }

    fn start_listeners(&self) -> Vec<(String, JoinHandle<()>)> {
        tracing::info!(listeners = self.listeners.len(), "Starting listeners");
        self.listeners
            .iter()
            .map(|listener| {
                let name = listener.name().to_string();
                let listener = Arc::clone(listener);
                tracing::debug!(listener = %name, address = %listener.address(), "Spawning listener task");
                let handle = tokio::spawn(async move {
                    match listener.start().await {
                        Ok(()) => tracing::info!(listener = %listener.name(), "Listener closed"),
                        Err(e) => tracing::error!(listener = %listener.name(), error = %e, "Listener failed"),
                    }
                });
                (name, handle)
            })
            .collect()
    }

    async fn wait_for_trigger(&self) -> Trigger {
        let Some(grace) = self.config.startup_grace() else {
            return self.shutdown.wait().await;
        };

        tokio::select! {
            trigger = self.shutdown.wait() => trigger,
            () = tokio::time::sleep(grace) => {
                self.shutdown.trigger(Trigger::GraceElapsed);
                // A signal may have won the race; report whichever was first.
                self.shutdown.wait().await
            }
        }
    }

    async fn shutdown_sequence(mut self, trigger: Trigger, tasks: Vec<(String, JoinHandle<()>)>) {
        let started = Instant::now();
        let budget = self.config.shutdown_budget();

        self.enter(Phase::Draining);
        tracing::info!("Rejecting new requests");
        for listener in &self.listeners {
            listener.reject_requests();
        }
        self.drain().await;

        self.enter(Phase::StoppingListeners);
        let stop_budget = budget.saturating_sub(started.elapsed());
        let stop_failures = self.stop_listeners(stop_budget).await;

        self.enter(Phase::RunningCallbacks);
        tracing::info!(callbacks = self.callbacks.len(), "Running shutdown callbacks");
        let outcomes = self.callbacks.run_all(self.config.callback_timeout()).await;
        let overruns = outcomes.iter().filter(|o| o.overran).count();
        let panics = outcomes.iter().filter(|o| o.panicked).count();

        self.enter(Phase::ReleasingResources);
        self.release(tasks).await;

        self.enter(Phase::Terminated);
        let elapsed = started.elapsed();
        tracing::info!(
            trigger = %trigger,
            elapsed_ms = elapsed.as_millis() as u64,
            stop_failures,
            callback_overruns = overruns,
            callback_panics = panics,
            "Application closed"
        );
        if elapsed > budget {
            tracing::warn!(
                elapsed_ms = elapsed.as_millis() as u64,
                budget_ms = budget.as_millis() as u64,
                "Shutdown exceeded its budget"
            );
        }
    }

    fn enter(&mut self, next: Phase) {
        let elapsed = self.phase_entered.elapsed();
        metrics::record_phase(self.phase.as_str(), elapsed);
        tracing::info!(
            from = %self.phase,
            to = %next,
            elapsed_ms = elapsed.as_millis() as u64,
            "Shutdown phase transition"
        );

        self.phase = next;
        self.phase_entered = Instant::now();
        // No subscribers is fine.
        let _ = self.phases.send(next);
    }

    async fn drain(&self) {
        let wait = self.config.drain_wait();
        tracing::info!(
            drain_wait_ms = wait.as_millis() as u64,
            mode = ?self.config.drain_mode,
            "Waiting for in-flight requests"
        );

        match self.config.drain_mode {
            DrainMode::Fixed => tokio::time::sleep(wait).await,
            DrainMode::InFlight => {
                let idle = join_all(self.listeners.iter().map(|l| l.gate().wait_idle()));
                if tokio::time::timeout(wait, idle).await.is_ok() {
                    tracing::info!("All in-flight requests finished");
                    return;
                }
            }
        }

        let in_flight: usize = self.listeners.iter().map(|l| l.gate().in_flight()).sum();
        if in_flight > 0 {
            tracing::warn!(in_flight, "Drain wait elapsed with requests still in flight");
        }
    }

    /// Stop every listener concurrently. Returns the number that failed.
    async fn stop_listeners(&self, budget: Duration) -> usize {
        tracing::info!(budget_ms = budget.as_millis() as u64, "Stopping all listeners");

        let stops = self.listeners.iter().map(|listener| {
            let listener = Arc::clone(listener);
            let name = listener.name().to_string();
            let handle = tokio::spawn(async move { listener.stop(budget).await });
            async move { (name, handle.await) }
        });

        let mut failures = 0;
        for (name, result) in join_all(stops).await {
            match result {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    failures += 1;
                    metrics::record_stop_failure(&name);
                    tracing::error!(listener = %name, error = %e, "Failed to stop listener");
                }
                Err(e) => {
                    failures += 1;
                    metrics::record_stop_failure(&name);
                    tracing::error!(listener = %name, error = %e, "Listener stop task failed");
                }
            }
        }
        failures
    }

    async fn release(&mut self, tasks: Vec<(String, JoinHandle<()>)>) {
        tracing::info!("Releasing resources");

        for (name, mut handle) in tasks {
            match tokio::time::timeout(TASK_JOIN_GRACE, &mut handle).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::error!(listener = %name, error = %e, "Listener task failed"),
                Err(_) => {
                    tracing::warn!(listener = %name, "Listener still serving after stop, aborting");
                    handle.abort();
                    let _ = handle.await;
                }
            }
        }

        self.listeners.clear();
    }
}

impl fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Orchestrator")
            .field("listeners", &self.listeners)
            .field("callbacks", &self.callbacks)
            .field("config", &self.config)
            .field("phase", &self.phase)
            .finish()
    }
}
