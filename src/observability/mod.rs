//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Gates, listeners, orchestrator produce:
//!     → logging.rs (structured log events, one per phase transition)
//!     → metrics.rs (rejections, phase durations, overruns)
//!
//! Consumers:
//!     → Log stream (stdout, pretty or JSON)
//!     → Metrics endpoint (optional Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - The log stream is the primary operator interface during shutdown
//! - Metrics are cheap (facade no-ops without a recorder)

pub mod logging;
pub mod metrics;
