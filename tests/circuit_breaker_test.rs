//! Circuit breaker behaviour end to end: direct result feeding, and the same lifecycle
//! driven through coordinator health rounds.

mod common;

use bulwark_core::clock::{Clock, ManualClock};
use bulwark_core::models::{InstanceRole, ProbeResult, RequestClass, ServiceInstance};
use bulwark_core::orchestration::{ControlPlaneCoordinator, StaticLoadSource, SystemStatus};
use bulwark_core::resilience::{CircuitBreaker, CircuitBreakerConfig, CircuitStatus, Transition};
use common::{standard_config, MockOutcome, MockProbe};
use std::sync::Arc;
use std::time::Duration;
use tokio_test::{assert_err, assert_ok};

fn db_primary_breaker(clock: &ManualClock) -> CircuitBreaker {
    CircuitBreaker::new(
        "db-primary",
        CircuitBreakerConfig::new(5, Duration::from_secs(60)),
        Duration::from_secs(10),
        Arc::new(clock.clone()),
    )
}

#[test]
fn test_db_primary_opens_after_five_failures_and_recovers() {
    let clock = ManualClock::starting_now();
    let breaker = db_primary_breaker(&clock);

    for attempt in 1..=5 {
        let transition = breaker.record_result(&ProbeResult::failure(
            "db-primary",
            clock.now(),
            12,
            bulwark_core::models::ProbeErrorKind::Connection,
            "connection refused",
        ));
        if attempt < 5 {
            assert_eq!(transition, Transition::Unchanged);
        } else {
            assert_eq!(transition, Transition::Opened);
        }
    }
    assert_eq!(breaker.status(), CircuitStatus::Open);
    assert!(!breaker.is_available());
    assert!(breaker.snapshot().next_attempt_at.is_some());

    clock.advance(Duration::from_millis(60_001));
    assert!(breaker.try_acquire_probe());
    assert_eq!(
        breaker.record_result(&ProbeResult::success("db-primary", clock.now(), 8)),
        Transition::Closed
    );

    let state = breaker.snapshot();
    assert_eq!(state.status, CircuitStatus::Closed);
    assert_eq!(state.consecutive_failures, 0);
    assert!(state.next_attempt_at.is_none());
    assert!(breaker.is_available());
}

#[test]
fn test_success_resets_failure_streak_below_threshold() {
    let clock = ManualClock::starting_now();
    let breaker = db_primary_breaker(&clock);
    let failure = || {
        ProbeResult::failure(
            "db-primary",
            clock.now(),
            5,
            bulwark_core::models::ProbeErrorKind::Timeout,
            "timed out",
        )
    };

    for _ in 0..4 {
        breaker.record_result(&failure());
    }
    breaker.record_result(&ProbeResult::success("db-primary", clock.now(), 5));
    for _ in 0..4 {
        breaker.record_result(&failure());
    }

    assert_eq!(breaker.status(), CircuitStatus::Closed);
    assert_eq!(breaker.snapshot().consecutive_failures, 4);
}

#[tokio::test]
async fn test_coordinator_drives_breaker_lifecycle() {
    let clock = ManualClock::starting_now();
    let primary = MockProbe::refusing();
    let mut builder = ControlPlaneCoordinator::builder(standard_config())
        .with_clock(Arc::new(clock.clone()))
        .with_load_source(Arc::new(StaticLoadSource::default()))
        .with_probe("database_primary", primary.clone());
    for id in [
        "database_read_replica",
        "redis_primary",
        "redis_cache",
        "redis_session",
        "external_api",
    ] {
        builder = builder.with_probe(id, MockProbe::healthy());
    }
    let coordinator = assert_ok!(builder.build());

    for _ in 0..5 {
        coordinator.run_health_round().await;
    }
    assert!(!coordinator.is_available("database_primary"));
    assert!(coordinator.is_available("redis_cache"));
    assert_eq!(
        coordinator.snapshot().unavailable_dependencies(),
        vec!["database_primary"]
    );
    assert_eq!(coordinator.health_monitor().system_status().label(), "degraded");

    // Open circuits are not probed while cooling down
    coordinator.run_health_round().await;
    assert_eq!(primary.calls(), 5);

    // A failed trial re-opens for another full cooldown
    clock.advance(Duration::from_secs(60));
    let reopened = coordinator.run_health_round().await;
    assert!(reopened
        .transitions
        .contains(&("database_primary".to_string(), Transition::Reopened)));
    assert_eq!(primary.calls(), 6);

    clock.advance(Duration::from_secs(60));
    primary.set_default(MockOutcome::Healthy);
    let recovered = coordinator.run_health_round().await;
    assert!(recovered
        .transitions
        .contains(&("database_primary".to_string(), Transition::Closed)));
    assert_eq!(recovered.system_status, SystemStatus::Healthy);

    let circuit = coordinator
        .snapshot()
        .circuit("database_primary")
        .cloned()
        .unwrap();
    assert_eq!(circuit.status, CircuitStatus::Closed);
    assert_eq!(circuit.consecutive_failures, 0);
}

#[tokio::test]
async fn test_unknown_dependency_result_is_rejected() {
    let coordinator = assert_ok!(ControlPlaneCoordinator::builder(standard_config())
        .with_load_source(Arc::new(StaticLoadSource::default()))
        .with_probe("database_primary", MockProbe::healthy())
        .with_probe("database_read_replica", MockProbe::healthy())
        .with_probe("redis_primary", MockProbe::healthy())
        .with_probe("redis_cache", MockProbe::healthy())
        .with_probe("redis_session", MockProbe::healthy())
        .with_probe("external_api", MockProbe::healthy())
        .build());

    let breakers = coordinator.circuit_breakers();
    assert_err!(breakers.record_result(&ProbeResult::success("nope", chrono::Utc::now(), 1)));
    assert!(coordinator.is_available("nope"));
    assert_eq!(breakers.len(), 6);
}

#[tokio::test]
async fn test_open_database_circuit_removes_backends_it_serves() {
    let clock = ManualClock::starting_now();
    let primary = MockProbe::refusing();
    let replica = MockProbe::healthy();
    let mut builder = ControlPlaneCoordinator::builder(standard_config())
        .with_clock(Arc::new(clock.clone()))
        .with_load_source(Arc::new(StaticLoadSource::default()))
        .with_probe("database_primary", primary.clone())
        .with_probe("database_read_replica", replica.clone());
    for id in ["redis_primary", "redis_cache", "redis_session", "external_api"] {
        builder = builder.with_probe(id, MockProbe::healthy());
    }
    let coordinator = assert_ok!(builder.build());

    coordinator.register(ServiceInstance::new("pg-master", InstanceRole::Master, "10.0.0.1", 5432));
    coordinator.register(ServiceInstance::new("pg-replica", InstanceRole::Worker, "10.0.0.2", 5432));
    assert_eq!(
        assert_ok!(coordinator.pick_backend(RequestClass::Write, None)).instance_id,
        "pg-master"
    );

    for _ in 0..5 {
        coordinator.run_health_round().await;
    }
    assert!(!coordinator.is_available("database_primary"));

    assert!(matches!(
        coordinator.pick_backend(RequestClass::Write, None),
        Err(bulwark_core::ControlPlaneError::NoAvailableBackend {
            request_class: RequestClass::Write,
            ..
        })
    ));
    for _ in 0..3 {
        assert_eq!(
            assert_ok!(coordinator.pick_backend(RequestClass::Read, None)).instance_id,
            "pg-replica"
        );
    }

    // Closing the circuit brings the master back
    clock.advance(Duration::from_secs(60));
    primary.set_default(MockOutcome::Healthy);
    coordinator.run_health_round().await;
    assert_eq!(
        assert_ok!(coordinator.pick_backend(RequestClass::Write, None)).instance_id,
        "pg-master"
    );
}
