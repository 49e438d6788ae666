//! Graceful shutdown demo
//!
//! Hosts a `business` and an `admin` listener and flushes a (simulated) cache
//! to the database on the way out.
//!
//! # Shutdown Overview
//!
//! ```text
//!   SIGINT/SIGTERM/SIGHUP/SIGQUIT ──┐
//!   startup grace timer ────────────┼──▶ first trigger wins
//!                                   ▼
//!   ┌────────────┐   ┌──────────┐   ┌────────────────┐   ┌────────────┐   ┌─────────┐
//!   │ close gates│──▶│  drain   │──▶│ stop listeners │──▶│ callbacks  │──▶│ release │
//!   │  (503s)    │   │  wait    │   │  (parallel)    │   │ (parallel) │   │         │
//!   └────────────┘   └──────────┘   └────────────────┘   └────────────┘   └─────────┘
//! ```

use std::path::PathBuf;
use std::time::Duration;

use axum::routing::{any, get};
use axum::Json;
use clap::Parser;
use serde_json::{json, Value};

use shutdown_orchestrator::config::{load_config, AppConfig};
use shutdown_orchestrator::lifecycle::{CallbackContext, CallbackRegistry, Orchestrator};
use shutdown_orchestrator::net::ManagedListener;
use shutdown_orchestrator::observability::{logging, metrics};

const DEMO_STARTUP_GRACE_MS: u64 = 2_000;

#[derive(Parser)]
#[command(name = "shutdown-orchestrator")]
#[command(about = "Multi-listener service demonstrating ordered graceful shutdown", long_about = None)]
struct Cli {
    /// TOML configuration file; built-in demo settings (exit after 2s) when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Shut down on its own this many milliseconds after start.
    #[arg(long)]
    startup_grace_ms: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => demo_config(),
    };
    if let Some(grace) = cli.startup_grace_ms {
        config.shutdown.startup_grace_ms = Some(grace);
    }

    logging::init_logging(&config.observability)?;
    tracing::info!("shutdown-orchestrator v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        listeners = config.listeners.len(),
        shutdown_budget_ms = config.shutdown.shutdown_budget_ms,
        drain_wait_ms = config.shutdown.drain_wait_ms,
        callback_timeout_ms = config.shutdown.callback_timeout_ms,
        startup_grace_ms = ?config.shutdown.startup_grace_ms,
        "Configuration loaded"
    );

    if let Some(address) = &config.observability.metrics_address {
        match address.parse() {
            Ok(addr) => {
                if let Err(e) = metrics::init_metrics(addr) {
                    tracing::error!(error = %e, "Failed to start metrics exporter");
                }
            }
            Err(e) => tracing::error!(metrics_address = %address, error = %e, "Failed to parse metrics address"),
        }
    }

    let listeners = config
        .listeners
        .iter()
        .map(|c| with_demo_routes(ManagedListener::from_config(c)))
        .collect();
    let callbacks = CallbackRegistry::new().register("store_cache_to_db", store_cache_to_db);

    let orchestrator = Orchestrator::new(listeners, callbacks, config.shutdown.clone())?;
    orchestrator.run().await;

    Ok(())
}

/// Default settings with the demo's self-shutdown after two seconds.
fn demo_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.shutdown.startup_grace_ms = Some(DEMO_STARTUP_GRACE_MS);
    config
}

fn with_demo_routes(listener: ManagedListener) -> ManagedListener {
    let name = listener.name().to_string();
    match name.as_str() {
        "business" => listener.route("/business/shutdown", any(|| async { "hello world!" })),
        "admin" => listener.route("/admin/status", get(admin_status)),
        _ => listener,
    }
}

async fn admin_status() -> Json<Value> {
    Json(json!({
        "version": env!("CARGO_PKG_VERSION"),
        "status": "operational",
    }))
}

/// Flush the in-memory cache to the database, or give up at the deadline.
async fn store_cache_to_db(ctx: CallbackContext) {
    tracing::info!("Flushing cache to database");
    tokio::select! {
        () = tokio::time::sleep(Duration::from_secs(2)) => tracing::info!("Cache flushed"),
        () = ctx.cancelled() => tracing::warn!(error = ?ctx.error(), "Cache flush abandoned"),
    }
}
