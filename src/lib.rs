//! Graceful shutdown orchestration for processes hosting several HTTP listeners.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;

pub use config::{AppConfig, ShutdownConfig};
pub use http::RequestGate;
pub use lifecycle::{CallbackContext, CallbackRegistry, Orchestrator, Shutdown, Trigger};
pub use net::ManagedListener;
