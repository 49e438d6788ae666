//! HTTP request handling subsystem.
//!
//! # Data Flow
//! ```text
//! Accepted connection (net::listener)
//!     → TraceLayer (per-request span)
//!     → gate.rs (reject once closed, count admitted requests)
//!     → in_flight.rs (guard held until the response future completes)
//!     → user-registered axum Router
//!     → response.rs (fixed 503 when rejected)
//! ```

pub mod gate;
pub mod in_flight;
pub mod response;

pub use gate::{Gate, GateLayer, RequestGate};
pub use in_flight::{InFlightGuard, InFlightTracker};
pub use response::{service_unavailable, UNAVAILABLE_BODY};
