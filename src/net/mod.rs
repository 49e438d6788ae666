//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! ManagedListener::start
//!     → bind (Idle → Listening)
//!     → axum::serve(gate → router) until cancelled
//!     → graceful drain of open connections
//!     → Stopped
//! ```
//!
//! # Design Decisions
//! - Each listener owns its gate and its cancellation token
//! - Stop is best effort within a budget; overrun is reported, never blocks shutdown

pub mod listener;

pub use listener::{ListenerError, ListenerState, ManagedListener};
