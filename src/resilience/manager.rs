//! # Circuit Breaker Manager
//!
//! Owns one breaker per configured dependency (and optionally per service instance).
//! Breakers are created up front; the set only changes through [`register`](CircuitBreakerManager::register).

use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::clock::Clock;
use crate::config::ControlPlaneConfig;
use crate::constants::coordinator::TICK_CEILING_MULTIPLIER;
use crate::error::{ControlPlaneError, Result};
use crate::models::ProbeResult;
use crate::resilience::{
    CircuitBreaker, CircuitBreakerConfig, CircuitState, SystemCircuitBreakerMetrics, Transition,
};

/// Manager for the circuit breakers of every watched dependency
#[derive(Debug)]
pub struct CircuitBreakerManager {
    circuit_breakers: DashMap<String, Arc<CircuitBreaker>>,
    clock: Arc<dyn Clock>,
}

impl CircuitBreakerManager {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            circuit_breakers: DashMap::new(),
            clock,
        }
    }

    /// One breaker per configured dependency, trial lease at twice its probe timeout
    pub fn from_config(config: &ControlPlaneConfig, clock: Arc<dyn Clock>) -> Self {
        let manager = Self::new(clock);
        for dependency in &config.dependencies {
            manager.register(
                &dependency.id,
                dependency.breaker_config(&config.circuit_breaker),
                dependency.probe_timeout() * TICK_CEILING_MULTIPLIER,
            );
        }

        info!(
            circuit_breakers = manager.circuit_breakers.len(),
            "🛡️ Circuit breaker manager initialized"
        );
        manager
    }

    /// Add a breaker, keeping an existing one for the same id
    pub fn register(
        &self,
        dependency_id: &str,
        config: CircuitBreakerConfig,
        trial_lease: Duration,
    ) -> Arc<CircuitBreaker> {
        let clock = Arc::clone(&self.clock);
        self.circuit_breakers
            .entry(dependency_id.to_string())
            .or_insert_with(|| {
                Arc::new(CircuitBreaker::new(
                    dependency_id,
                    config,
                    trial_lease,
                    clock,
                ))
            })
            .clone()
    }

    pub fn get(&self, dependency_id: &str) -> Option<Arc<CircuitBreaker>> {
        self.circuit_breakers
            .get(dependency_id)
            .map(|entry| Arc::clone(entry.value()))
    }

    /// Request-path availability check.
    ///
    /// An id without a breaker is reported available: nothing has ever been observed
    /// failing for it, so it is not gated.
    pub fn is_available(&self, dependency_id: &str) -> bool {
        match self.get(dependency_id) {
            Some(breaker) => breaker.is_available(),
            None => {
                warn!(
                    dependency_id = dependency_id,
                    "Availability checked for unknown dependency, treating as available"
                );
                true
            }
        }
    }

    /// Breaker check without the warning, for ids that legitimately may have no breaker
    pub(crate) fn is_available_quiet(&self, id: &str) -> bool {
        self.get(id).map_or(true, |breaker| breaker.is_available())
    }

    /// Route a probe result to its breaker
    pub fn record_result(&self, result: &ProbeResult) -> Result<Transition> {
        let breaker =
            self.get(&result.dependency_id)
                .ok_or_else(|| ControlPlaneError::UnknownDependency {
                    dependency_id: result.dependency_id.clone(),
                })?;
        Ok(breaker.record_result(result))
    }

    /// Sorted dependency ids
    pub fn dependency_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .circuit_breakers
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        ids.sort();
        ids
    }

    /// Read-only copy of one circuit
    pub fn snapshot(&self, dependency_id: &str) -> Option<CircuitState> {
        self.get(dependency_id).map(|breaker| breaker.snapshot())
    }

    /// Every circuit's state, ordered by dependency id
    pub fn snapshot_all(&self) -> Vec<CircuitState> {
        let mut states: Vec<CircuitState> = self
            .circuit_breakers
            .iter()
            .map(|entry| entry.value().snapshot())
            .collect();
        states.sort_by(|a, b| a.dependency_id.cmp(&b.dependency_id));
        states
    }

    pub fn system_metrics(&self) -> SystemCircuitBreakerMetrics {
        let mut system_metrics = SystemCircuitBreakerMetrics::new(self.clock.now());
        for entry in self.circuit_breakers.iter() {
            system_metrics.add_circuit_breaker(entry.key().clone(), entry.value().metrics());
        }
        system_metrics
    }

    /// Force open all circuit breakers (emergency stop)
    pub fn force_open_all(&self) {
        warn!("🚨 Forcing all circuit breakers open (emergency stop)");
        for entry in self.circuit_breakers.iter() {
            entry.value().force_open();
        }
    }

    /// Force close all circuit breakers (emergency recovery)
    pub fn force_close_all(&self) {
        warn!("🚨 Forcing all circuit breakers closed (emergency recovery)");
        for entry in self.circuit_breakers.iter() {
            entry.value().force_closed();
        }
    }

    pub fn len(&self) -> usize {
        self.circuit_breakers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.circuit_breakers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::config::DependencyConfig;
    use crate::models::{DependencyKind, ProbeErrorKind};
    use crate::resilience::CircuitStatus;
    use chrono::Utc;

    fn manager() -> CircuitBreakerManager {
        let mut config = ControlPlaneConfig::default();
        config.circuit_breaker = CircuitBreakerConfig::new(2, Duration::from_secs(30));
        config.dependencies = vec![
            DependencyConfig::new("redis_cache", DependencyKind::Cache, "redis://cache:6379"),
            DependencyConfig::new("database_primary", DependencyKind::Database, "postgres://db/app"),
        ];
        CircuitBreakerManager::from_config(&config, Arc::new(ManualClock::starting_now()))
    }

    #[test]
    fn test_breakers_created_from_config() {
        let manager = manager();
        assert_eq!(manager.len(), 2);
        assert_eq!(
            manager.dependency_ids(),
            vec!["database_primary".to_string(), "redis_cache".to_string()]
        );
        assert_eq!(manager.snapshot_all()[0].threshold, 2);
    }

    #[test]
    fn test_unknown_dependency_fails_open() {
        let manager = manager();
        assert!(manager.is_available("not_configured"));

        let result = ProbeResult::success("not_configured", Utc::now(), 1);
        assert!(matches!(
            manager.record_result(&result),
            Err(ControlPlaneError::UnknownDependency { .. })
        ));
    }

    #[test]
    fn test_force_all_and_health_score() {
        let manager = manager();
        let failure = ProbeResult::failure(
            "redis_cache",
            Utc::now(),
            3,
            ProbeErrorKind::Timeout,
            "timed out",
        );
        manager.record_result(&failure).unwrap();
        manager.record_result(&failure).unwrap();
        assert!(!manager.is_available("redis_cache"));
        assert!((manager.system_metrics().health_score() - 0.5).abs() < f64::EPSILON);

        manager.force_open_all();
        assert!(manager
            .snapshot_all()
            .iter()
            .all(|state| state.status == CircuitStatus::Open));

        manager.force_close_all();
        assert!(manager.is_available("redis_cache"));
        assert_eq!(manager.system_metrics().health_score(), 1.0);
    }
}
