//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (orchestrator.rs):
//!     Validate setup → Start every listener on its own task
//!
//! Trigger (shutdown.rs, signals.rs):
//!     SIGINT/SIGTERM/SIGHUP/SIGQUIT, startup grace timer, or Shutdown::trigger
//!     → first trigger wins
//!
//! Shutdown (orchestrator.rs, callbacks.rs):
//!     Close gates → Drain → Stop listeners → Run callbacks → Release → Terminated
//! ```
//!
//! # Design Decisions
//! - Ordered shutdown: no phase starts before the previous one is joined
//! - Listener stops are bounded by the shutdown budget
//! - Callback deadlines are cooperative, never preemptive

pub mod callbacks;
pub mod orchestrator;
pub mod shutdown;
pub mod signals;

pub use callbacks::{CallbackContext, CallbackOutcome, CallbackRegistry, ContextError};
pub use orchestrator::{Orchestrator, OrchestratorError, Phase};
pub use shutdown::{Shutdown, Trigger};
