//! Metrics collection and exposition.
//!
//! # Metrics
//! - `shutdown_requests_rejected_total` (counter): requests answered by a closed gate, by listener
//! - `shutdown_phase_duration_seconds` (histogram): time spent in each shutdown phase
//! - `shutdown_listener_stop_failures_total` (counter): listeners that failed to stop in budget
//! - `shutdown_callback_overruns_total` (counter): callbacks still running at their deadline
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; without an installed
//!   recorder every call is a no-op
//! - The Prometheus exporter is opt-in via `observability.metrics_address`

use std::net::SocketAddr;
use std::time::Duration;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder and its scrape endpoint.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

pub fn record_rejected(listener: &str) {
    metrics::counter!("shutdown_requests_rejected_total", "listener" => listener.to_string())
        .increment(1);
}

pub fn record_phase(phase: &'static str, elapsed: Duration) {
    metrics::histogram!("shutdown_phase_duration_seconds", "phase" => phase)
        .record(elapsed.as_secs_f64());
}

pub fn record_stop_failure(listener: &str) {
    metrics::counter!("shutdown_listener_stop_failures_total", "listener" => listener.to_string())
        .increment(1);
}

pub fn record_callback_overrun(callback: &str) {
    metrics::counter!("shutdown_callback_overruns_total", "callback" => callback.to_string())
        .increment(1);
}
