//! Shared utilities for integration tests.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::routing::get;
use shutdown_orchestrator::net::ManagedListener;
use shutdown_orchestrator::RequestGate;

/// A listener on an ephemeral port with a fast and a slow route.
pub fn listener(name: &'static str, slow: Duration) -> ManagedListener {
    ManagedListener::new(name, "127.0.0.1:0")
        .route("/hello", get(move || async move { format!("hello from {name}") }))
        .route(
            "/slow",
            get(move || async move {
                tokio::time::sleep(slow).await;
                "done"
            }),
        )
}

/// Client without connection pooling so every request opens a fresh connection.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}

pub async fn get_text(addr: SocketAddr, path: &str) -> Result<(u16, String), reqwest::Error> {
    let response = client().get(format!("http://{addr}{path}")).send().await?;
    let status = response.status().as_u16();
    Ok((status, response.text().await?))
}

pub async fn bound(listener: &Arc<ManagedListener>) -> SocketAddr {
    tokio::time::timeout(Duration::from_secs(5), listener.wait_listening())
        .await
        .expect("listener did not bind in time")
        .expect("listener failed to bind")
}

/// Wait until `gate` has exactly `count` requests in flight.
pub async fn wait_in_flight(gate: &RequestGate, count: usize) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while gate.in_flight() != count {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("in-flight count not reached");
}
