//! # Circuit Breaker Implementation
//!
//! Per-dependency fault isolation driven by probe outcomes. The classic three states:
//! Closed (calls flow), Open (fail fast), and Half-Open (one trial probe decides).
//!
//! The transition rules live on [`CircuitState`] as plain functions of `(state, input, now)`
//! so they can be exercised without a clock or a lock. [`CircuitBreaker`] wraps one state
//! behind a mutex, making it the single writer for its dependency.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::clock::{to_chrono, Clock};
use crate::logging::log_circuit_transition;
use crate::models::ProbeResult;
use crate::resilience::{CircuitBreakerConfig, CircuitBreakerMetrics};

/// Circuit breaker states representing the current operational mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitStatus {
    /// Normal operation - all calls are allowed through
    Closed,
    /// Failure mode - all calls fail fast without executing
    Open,
    /// Testing recovery - a single trial probe decides the next state
    HalfOpen,
}

impl fmt::Display for CircuitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CircuitStatus::Closed => write!(f, "closed"),
            CircuitStatus::Open => write!(f, "open"),
            CircuitStatus::HalfOpen => write!(f, "half_open"),
        }
    }
}

/// What a state update did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// State unchanged (counters may have moved)
    Unchanged,
    /// Result arrived while open and before the cooldown elapsed; not applied
    Ignored,
    /// closed -> open
    Opened,
    /// open -> half_open
    HalfOpened,
    /// half_open -> closed
    Closed,
    /// half_open -> open
    Reopened,
}

/// Breaker state for one dependency.
///
/// `next_attempt_at` is `Some` exactly when `status` is `Open`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CircuitState {
    pub dependency_id: String,
    pub status: CircuitStatus,
    pub consecutive_failures: u32,
    pub last_failure_at: Option<DateTime<Utc>>,
    pub next_attempt_at: Option<DateTime<Utc>>,
    pub threshold: u32,
    pub cooldown_ms: u64,
}

impl CircuitState {
    pub fn new(dependency_id: impl Into<String>, config: &CircuitBreakerConfig) -> Self {
        Self {
            dependency_id: dependency_id.into(),
            status: CircuitStatus::Closed,
            consecutive_failures: 0,
            last_failure_at: None,
            next_attempt_at: None,
            threshold: config.failure_threshold,
            cooldown_ms: config.cooldown_ms,
        }
    }

    fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }

    fn open_at(&mut self, now: DateTime<Utc>) {
        self.status = CircuitStatus::Open;
        self.next_attempt_at = Some(now + to_chrono(self.cooldown()));
    }

    /// Move open -> half_open once `now >= next_attempt_at`
    pub fn poll_cooldown(&mut self, now: DateTime<Utc>) -> Transition {
        match (self.status, self.next_attempt_at) {
            (CircuitStatus::Open, Some(next_attempt_at)) if now >= next_attempt_at => {
                self.status = CircuitStatus::HalfOpen;
                self.next_attempt_at = None;
                Transition::HalfOpened
            }
            _ => Transition::Unchanged,
        }
    }

    /// Apply a probe outcome observed at `now`
    pub fn apply_result(&mut self, success: bool, now: DateTime<Utc>) -> Transition {
        // An elapsed cooldown always passes through half_open first
        self.poll_cooldown(now);

        match (self.status, success) {
            (CircuitStatus::Closed, true) => {
                self.consecutive_failures = 0;
                Transition::Unchanged
            }
            (CircuitStatus::Closed, false) => {
                self.consecutive_failures = self.consecutive_failures.saturating_add(1);
                self.last_failure_at = Some(now);
                if self.consecutive_failures >= self.threshold {
                    self.open_at(now);
                    Transition::Opened
                } else {
                    Transition::Unchanged
                }
            }
            (CircuitStatus::HalfOpen, true) => {
                self.status = CircuitStatus::Closed;
                self.consecutive_failures = 0;
                self.next_attempt_at = None;
                Transition::Closed
            }
            (CircuitStatus::HalfOpen, false) => {
                self.consecutive_failures = self.consecutive_failures.saturating_add(1);
                self.last_failure_at = Some(now);
                self.open_at(now);
                Transition::Reopened
            }
            (CircuitStatus::Open, _) => Transition::Ignored,
        }
    }
}

#[derive(Debug)]
struct BreakerInner {
    state: CircuitState,
    /// Set while the half-open trial probe is in flight
    trial_started_at: Option<DateTime<Utc>>,
    metrics: CircuitBreakerMetrics,
}

/// Circuit breaker guarding one dependency
#[derive(Debug)]
pub struct CircuitBreaker {
    dependency_id: String,
    config: CircuitBreakerConfig,
    /// How long a claimed trial permit stays exclusive
    trial_lease: Duration,
    clock: Arc<dyn Clock>,
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    /// Create a new circuit breaker for a dependency
    pub fn new(
        dependency_id: impl Into<String>,
        config: CircuitBreakerConfig,
        trial_lease: Duration,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let dependency_id = dependency_id.into();
        debug!(
            dependency_id = %dependency_id,
            failure_threshold = config.failure_threshold,
            cooldown_ms = config.cooldown_ms,
            "🛡️ Circuit breaker initialized"
        );

        Self {
            inner: Mutex::new(BreakerInner {
                state: CircuitState::new(dependency_id.clone(), &config),
                trial_started_at: None,
                metrics: CircuitBreakerMetrics::new(),
            }),
            dependency_id,
            config,
            trial_lease,
            clock,
        }
    }

    pub fn dependency_id(&self) -> &str {
        &self.dependency_id
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Current status, applying an elapsed cooldown first
    pub fn status(&self) -> CircuitStatus {
        let now = self.clock.now();
        let mut inner = self.inner.lock();
        self.poll(&mut inner, now);
        inner.state.status
    }

    /// Whether request traffic may flow to the dependency.
    ///
    /// Only a closed circuit admits traffic. An open circuit whose cooldown has elapsed
    /// moves to half-open here; traffic stays blocked until the trial probe succeeds.
    pub fn is_available(&self) -> bool {
        let now = self.clock.now();
        let mut inner = self.inner.lock();
        self.poll(&mut inner, now);

        if inner.state.status == CircuitStatus::Closed {
            true
        } else {
            inner.metrics.rejected_checks += 1;
            false
        }
    }

    /// Claim permission to dispatch a health probe.
    ///
    /// Closed circuits are always probed, open ones never. Half-open hands out a single
    /// trial permit; it is released when a result is recorded or when the lease expires.
    pub fn try_acquire_probe(&self) -> bool {
        let now = self.clock.now();
        let mut inner = self.inner.lock();
        self.poll(&mut inner, now);

        match inner.state.status {
            CircuitStatus::Closed => true,
            CircuitStatus::Open => {
                inner.metrics.suppressed_probes += 1;
                false
            }
            CircuitStatus::HalfOpen => {
                let lease_free = match inner.trial_started_at {
                    None => true,
                    Some(started) => now - started >= to_chrono(self.trial_lease),
                };
                if lease_free {
                    if inner.trial_started_at.is_some() {
                        warn!(
                            dependency_id = %self.dependency_id,
                            "⏳ Trial probe lease expired without a result, re-issuing"
                        );
                    }
                    inner.trial_started_at = Some(now);
                    inner.metrics.trial_probes += 1;
                    true
                } else {
                    inner.metrics.suppressed_probes += 1;
                    false
                }
            }
        }
    }

    /// Feed a probe outcome into the state machine
    pub fn record_result(&self, result: &ProbeResult) -> Transition {
        let now = self.clock.now();
        let mut inner = self.inner.lock();
        let from = inner.state.status;
        let transition = inner.state.apply_result(result.success, now);

        inner.metrics.record(result.success, result.latency_ms);
        match transition {
            Transition::Ignored => inner.metrics.ignored_results += 1,
            Transition::Opened | Transition::Reopened => {
                inner.metrics.times_opened += 1;
                inner.trial_started_at = None;
            }
            Transition::Closed => {
                inner.metrics.times_closed += 1;
                inner.trial_started_at = None;
            }
            Transition::Unchanged | Transition::HalfOpened => {}
        }

        if from != inner.state.status {
            log_circuit_transition(
                &self.dependency_id,
                from,
                inner.state.status,
                inner.state.consecutive_failures,
                inner.state.next_attempt_at,
            );
        }

        transition
    }

    /// Read-only copy of the current state
    pub fn snapshot(&self) -> CircuitState {
        let now = self.clock.now();
        let mut inner = self.inner.lock();
        self.poll(&mut inner, now);
        inner.state.clone()
    }

    /// Get current metrics snapshot
    pub fn metrics(&self) -> CircuitBreakerMetrics {
        let inner = self.inner.lock();
        inner.metrics.snapshot(inner.state.status)
    }

    /// Force circuit to open state (operator override)
    pub fn force_open(&self) {
        let now = self.clock.now();
        let mut inner = self.inner.lock();
        warn!(dependency_id = %self.dependency_id, "🚨 Circuit breaker forced open");
        let from = inner.state.status;
        inner.state.open_at(now);
        inner.trial_started_at = None;
        if from != CircuitStatus::Open {
            inner.metrics.times_opened += 1;
        }
    }

    /// Force circuit to closed state (operator override)
    pub fn force_closed(&self) {
        let mut inner = self.inner.lock();
        warn!(dependency_id = %self.dependency_id, "🚨 Circuit breaker forced closed");
        let from = inner.state.status;
        inner.state.status = CircuitStatus::Closed;
        inner.state.consecutive_failures = 0;
        inner.state.next_attempt_at = None;
        inner.trial_started_at = None;
        if from != CircuitStatus::Closed {
            inner.metrics.times_closed += 1;
        }
    }

    fn poll(&self, inner: &mut BreakerInner, now: DateTime<Utc>) {
        if inner.state.poll_cooldown(now) == Transition::HalfOpened {
            inner.trial_started_at = None;
            log_circuit_transition(
                &self.dependency_id,
                CircuitStatus::Open,
                CircuitStatus::HalfOpen,
                inner.state.consecutive_failures,
                None,
            );
        }
    }
}
