//! # Probe Contract and Runner
//!
//! [`HealthProbe`] is the pluggable liveness check for one kind of dependency.
//! [`ProbeRunner`] applies the timeout, measures latency, contains panics, and turns the
//! outcome into a [`ProbeResult`]. A probe failure is data, never an error.

use async_trait::async_trait;
use futures::FutureExt;
use std::fmt::Debug;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use crate::clock::Clock;
use crate::logging::log_probe_result;
use crate::models::{Dependency, ProbeErrorKind, ProbeResult};

/// Why a single check failed
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProbeFailure {
    #[error("probe timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("connection failed: {0}")]
    Connection(String),

    #[error("dependency reported unhealthy: {0}")]
    Unhealthy(String),

    #[error("probe internal error: {0}")]
    Internal(String),
}

impl ProbeFailure {
    pub fn kind(&self) -> ProbeErrorKind {
        match self {
            ProbeFailure::Timeout { .. } => ProbeErrorKind::Timeout,
            ProbeFailure::Connection(_) => ProbeErrorKind::Connection,
            ProbeFailure::Unhealthy(_) => ProbeErrorKind::Unhealthy,
            ProbeFailure::Internal(_) => ProbeErrorKind::Internal,
        }
    }
}

/// Liveness check for a dependency.
///
/// Implementations should keep the check cheap and idempotent (`SELECT 1`, `PING`, a
/// GET on a health endpoint). Timeouts are enforced by [`ProbeRunner`], so a probe does
/// not need its own.
#[async_trait]
pub trait HealthProbe: Send + Sync + Debug {
    /// Short label used in logs
    fn name(&self) -> &'static str;

    async fn check(&self, dependency: &Dependency) -> Result<(), ProbeFailure>;
}

/// Executes probes under a timeout and records results with the injected clock
#[derive(Debug, Clone)]
pub struct ProbeRunner {
    clock: Arc<dyn Clock>,
}

impl ProbeRunner {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }

    /// Run one check. Always yields a result; an expired timeout maps to `Timeout` and a
    /// panicking probe maps to `Internal`.
    pub async fn run(
        &self,
        probe: &dyn HealthProbe,
        dependency: &Dependency,
        timeout: Duration,
    ) -> ProbeResult {
        let started = Instant::now();
        let outcome = tokio::time::timeout(
            timeout,
            AssertUnwindSafe(probe.check(dependency)).catch_unwind(),
        )
        .await;
        let latency_ms = started.elapsed().as_millis() as u64;

        let failure = match outcome {
            Ok(Ok(Ok(()))) => None,
            Ok(Ok(Err(failure))) => Some(failure),
            Ok(Err(panic)) => Some(ProbeFailure::Internal(panic_message(panic.as_ref()))),
            Err(_) => Some(ProbeFailure::Timeout {
                timeout_ms: timeout.as_millis() as u64,
            }),
        };

        let result = match failure {
            None => ProbeResult::success(&dependency.id, self.clock.now(), latency_ms),
            Some(failure) => ProbeResult::failure(
                &dependency.id,
                self.clock.now(),
                latency_ms,
                failure.kind(),
                failure.to_string(),
            ),
        };

        log_probe_result(&result, probe.name(), dependency.expected_latency_budget_ms);
        result
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("probe panicked: {message}")
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("probe panicked: {message}")
    } else {
        "probe panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::models::DependencyKind;

    #[derive(Debug)]
    enum Behaviour {
        Healthy,
        Refused,
        Hang,
        Panic,
    }

    #[derive(Debug)]
    struct ScriptedProbe(Behaviour);

    #[async_trait]
    impl HealthProbe for ScriptedProbe {
        fn name(&self) -> &'static str {
            "scripted"
        }

        async fn check(&self, _dependency: &Dependency) -> Result<(), ProbeFailure> {
            match self.0 {
                Behaviour::Healthy => Ok(()),
                Behaviour::Refused => Err(ProbeFailure::Connection("refused".into())),
                Behaviour::Hang => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Ok(())
                }
                Behaviour::Panic => panic!("probe exploded"),
            }
        }
    }

    fn dependency() -> Dependency {
        Dependency::new("redis_cache", DependencyKind::Cache, "redis://cache:6379", 100)
    }

    fn runner() -> ProbeRunner {
        ProbeRunner::new(Arc::new(ManualClock::starting_now()))
    }

    #[tokio::test]
    async fn test_healthy_probe_succeeds() {
        let result = runner()
            .run(&ScriptedProbe(Behaviour::Healthy), &dependency(), Duration::from_secs(1))
            .await;
        assert!(result.success);
        assert_eq!(result.dependency_id, "redis_cache");
        assert!(result.error_kind.is_none());
    }

    #[tokio::test]
    async fn test_connection_failure_is_data() {
        let result = runner()
            .run(&ScriptedProbe(Behaviour::Refused), &dependency(), Duration::from_secs(1))
            .await;
        assert!(!result.success);
        assert_eq!(result.error_kind, Some(ProbeErrorKind::Connection));
        assert_eq!(result.error_message.as_deref(), Some("connection failed: refused"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_hanging_probe_times_out() {
        let result = runner()
            .run(&ScriptedProbe(Behaviour::Hang), &dependency(), Duration::from_secs(2))
            .await;
        assert!(!result.success);
        assert_eq!(result.error_kind, Some(ProbeErrorKind::Timeout));
        assert!(result.latency_ms >= 2_000);
    }

    #[tokio::test]
    async fn test_panicking_probe_is_contained() {
        let result = runner()
            .run(&ScriptedProbe(Behaviour::Panic), &dependency(), Duration::from_secs(1))
            .await;
        assert!(!result.success);
        assert_eq!(result.error_kind, Some(ProbeErrorKind::Internal));
        assert!(result
            .error_message
            .unwrap()
            .contains("probe exploded"));
    }

    #[test]
    fn test_failure_kinds() {
        assert_eq!(
            ProbeFailure::Timeout { timeout_ms: 5 }.kind(),
            ProbeErrorKind::Timeout
        );
        assert_eq!(
            ProbeFailure::Unhealthy("503".into()).kind(),
            ProbeErrorKind::Unhealthy
        );
    }
}
