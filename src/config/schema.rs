//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the orchestrator.
//! All types derive Serde traits for deserialization from config files.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for an orchestrated process.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    /// Listeners to host, in start/stop order.
    pub listeners: Vec<ListenerConfig>,

    /// Shutdown timing.
    pub shutdown: ShutdownConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            listeners: vec![
                ListenerConfig::new("business", "127.0.0.1:8080"),
                ListenerConfig::new("admin", "127.0.0.1:8081"),
            ],
            shutdown: ShutdownConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

/// A single managed listener.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct ListenerConfig {
    /// Unique listener name, used in logs and error attribution.
    pub name: String,

    /// Bind address (e.g., "127.0.0.1:8080" or "localhost:8080").
    pub bind_address: String,
}

impl ListenerConfig {
    pub fn new(name: impl Into<String>, bind_address: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            bind_address: bind_address.into(),
        }
    }
}

/// How the draining phase decides that in-flight work is done.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum DrainMode {
    /// Sleep for the whole drain wait.
    #[default]
    Fixed,
    /// Wait until no listener has a request in flight, bounded by the drain wait.
    InFlight,
}

/// Shutdown timing configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct ShutdownConfig {
    /// Total time budget from trigger to the end of the listener stop phase.
    pub shutdown_budget_ms: u64,

    /// Time given to in-flight requests after the gates close.
    pub drain_wait_ms: u64,

    /// Deadline handed to each cleanup callback, counted from its own start.
    pub callback_timeout_ms: u64,

    /// Trigger shutdown on its own this long after start.
    pub startup_grace_ms: Option<u64>,

    /// Draining strategy.
    pub drain_mode: DrainMode,
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            shutdown_budget_ms: 30_000,
            drain_wait_ms: 10_000,
            callback_timeout_ms: 3_000,
            startup_grace_ms: None,
            drain_mode: DrainMode::Fixed,
        }
    }
}

impl ShutdownConfig {
    pub fn shutdown_budget(&self) -> Duration {
        Duration::from_millis(self.shutdown_budget_ms)
    }

    pub fn drain_wait(&self) -> Duration {
        Duration::from_millis(self.drain_wait_ms)
    }

    pub fn callback_timeout(&self) -> Duration {
        Duration::from_millis(self.callback_timeout_ms)
    }

    pub fn startup_grace(&self) -> Option<Duration> {
        self.startup_grace_ms.map(Duration::from_millis)
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error). `RUST_LOG` takes precedence.
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Prometheus scrape address; the exporter is off when unset.
    pub metrics_address: Option<String>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_address: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_demo_setup() {
        let config = AppConfig::default();
        assert_eq!(config.listeners.len(), 2);
        assert_eq!(config.shutdown.shutdown_budget(), Duration::from_secs(30));
        assert_eq!(config.shutdown.drain_wait(), Duration::from_secs(10));
        assert_eq!(config.shutdown.callback_timeout(), Duration::from_secs(3));
        assert_eq!(config.shutdown.startup_grace(), None);
        assert_eq!(config.shutdown.drain_mode, DrainMode::Fixed);
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config: AppConfig = toml::from_str(
            r#"
            [shutdown]
            drain_wait_ms = 250
            drain_mode = "in_flight"
            "#,
        )
        .unwrap();

        assert_eq!(config.shutdown.drain_wait(), Duration::from_millis(250));
        assert_eq!(config.shutdown.drain_mode, DrainMode::InFlight);
        assert_eq!(config.shutdown.callback_timeout_ms, 3_000);
        assert_eq!(config.observability.log_format, LogFormat::Pretty);
    }
}
