//! End-to-end shutdown tests over real sockets.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use shutdown_orchestrator::config::{DrainMode, ShutdownConfig};
use shutdown_orchestrator::http::UNAVAILABLE_BODY;
use shutdown_orchestrator::lifecycle::{CallbackContext, CallbackRegistry, Orchestrator, Phase, Trigger};
use shutdown_orchestrator::net::ListenerState;

mod common;

#[tokio::test]
async fn every_listener_rejects_once_draining() {
    let config = ShutdownConfig {
        shutdown_budget_ms: 5_000,
        drain_wait_ms: 1_500,
        callback_timeout_ms: 500,
        ..ShutdownConfig::default()
    };
    let orchestrator = Orchestrator::new(
        vec![
            common::listener("business", Duration::from_millis(10)),
            common::listener("admin", Duration::from_millis(10)),
        ],
        CallbackRegistry::new(),
        config,
    )
    .unwrap();

    let business = orchestrator.listener("business").unwrap();
    let admin = orchestrator.listener("admin").unwrap();
    let mut phases = orchestrator.subscribe_phases();
    let shutdown = orchestrator.shutdown_handle();
    let run = tokio::spawn(orchestrator.serve());

    let business_addr = common::bound(&business).await;
    let admin_addr = common::bound(&admin).await;

    let (status, body) = common::get_text(business_addr, "/hello").await.unwrap();
    assert_eq!((status, body.as_str()), (200, "hello from business"));
    let (status, _) = common::get_text(admin_addr, "/hello").await.unwrap();
    assert_eq!(status, 200);

    shutdown.trigger(Trigger::Signal("SIGTERM"));
    assert_eq!(phases.recv().await.unwrap(), Phase::Draining);

    for addr in [business_addr, admin_addr] {
        for path in ["/hello", "/slow", "/not-registered"] {
            let (status, body) = common::get_text(addr, path).await.unwrap();
            assert_eq!(status, 503, "{addr}{path}");
            assert_eq!(body, UNAVAILABLE_BODY);
        }
    }

    run.await.unwrap();
    assert_eq!(business.state(), ListenerState::Stopped);
    assert_eq!(admin.state(), ListenerState::Stopped);
    assert!(common::get_text(business_addr, "/hello").await.is_err(), "port should be closed");
}

#[tokio::test]
async fn stuck_listener_does_not_block_the_others() {
    let config = ShutdownConfig {
        shutdown_budget_ms: 800,
        drain_wait_ms: 100,
        callback_timeout_ms: 1_000,
        ..ShutdownConfig::default()
    };
    let callback_started = Arc::new(Mutex::new(None));
    let callbacks = {
        let callback_started = callback_started.clone();
        CallbackRegistry::new().register("record", move |_ctx: CallbackContext| {
            let callback_started = callback_started.clone();
            async move {
                *callback_started.lock().unwrap() = Some(Instant::now());
            }
        })
    };
    let orchestrator = Orchestrator::new(
        vec![
            common::listener("stuck", Duration::from_secs(10)),
            common::listener("fast", Duration::from_millis(10)),
        ],
        callbacks,
        config,
    )
    .unwrap();

    let stuck = orchestrator.listener("stuck").unwrap();
    let fast = orchestrator.listener("fast").unwrap();
    let shutdown = orchestrator.shutdown_handle();
    let run = tokio::spawn(orchestrator.serve());

    let stuck_addr = common::bound(&stuck).await;
    let fast_addr = common::bound(&fast).await;

    // Holds the stuck listener's graceful stop open well past the budget.
    let in_flight = tokio::spawn(common::get_text(stuck_addr, "/slow"));
    common::wait_in_flight(stuck.gate(), 1).await;

    let triggered = Instant::now();
    shutdown.trigger(Trigger::Manual);
    run.await.unwrap();
    let total = triggered.elapsed();

    let started = callback_started.lock().unwrap().expect("callback ran");
    assert!(
        started.duration_since(triggered) >= Duration::from_millis(700),
        "callback must wait for the stop budget"
    );
    assert!(total < Duration::from_secs(5), "shutdown took {total:?}");
    assert_eq!(fast.state(), ListenerState::Stopped);
    assert_eq!(stuck.state(), ListenerState::Stopped);
    assert!(common::get_text(fast_addr, "/hello").await.is_err());

    in_flight.abort();
}

#[tokio::test]
async fn in_flight_drain_waits_for_requests_only() {
    let config = ShutdownConfig {
        shutdown_budget_ms: 10_000,
        drain_wait_ms: 5_000,
        callback_timeout_ms: 500,
        drain_mode: DrainMode::InFlight,
        ..ShutdownConfig::default()
    };
    let orchestrator = Orchestrator::new(
        vec![common::listener("business", Duration::from_millis(400))],
        CallbackRegistry::new(),
        config,
    )
    .unwrap();

    let business = orchestrator.listener("business").unwrap();
    let shutdown = orchestrator.shutdown_handle();
    let run = tokio::spawn(orchestrator.serve());
    let addr = common::bound(&business).await;

    let in_flight = tokio::spawn(common::get_text(addr, "/slow"));
    common::wait_in_flight(business.gate(), 1).await;

    let triggered = Instant::now();
    shutdown.trigger(Trigger::Manual);
    run.await.unwrap();

    let (status, body) = in_flight.await.unwrap().unwrap();
    assert_eq!((status, body.as_str()), (200, "done"));
    assert!(triggered.elapsed() < Duration::from_secs(3), "drain should end with the last request");
}
