//! # Circuit Breaker Metrics
//!
//! Per-breaker counters plus a system-wide aggregate used by health reporting.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::resilience::CircuitStatus;

/// Metrics for a single circuit breaker instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CircuitBreakerMetrics {
    /// Probe results recorded (including ignored ones)
    pub total_results: u64,

    pub success_count: u64,

    pub failure_count: u64,

    /// Results that arrived while open and were not applied
    pub ignored_results: u64,

    /// Availability checks answered `false`
    pub rejected_checks: u64,

    /// Probe dispatches refused (open, or trial already in flight)
    pub suppressed_probes: u64,

    /// Half-open trial permits handed out
    pub trial_probes: u64,

    pub times_opened: u64,

    pub times_closed: u64,

    /// Sum of recorded probe latencies
    pub total_latency_ms: u64,

    /// Circuit status at the time of the snapshot
    pub current_status: CircuitStatus,

    /// Calculated failure rate (0.0 to 1.0)
    pub failure_rate: f64,

    /// Calculated success rate (0.0 to 1.0)
    pub success_rate: f64,

    pub average_latency_ms: f64,
}

impl CircuitBreakerMetrics {
    /// Create new metrics instance with zero values
    pub fn new() -> Self {
        Self {
            total_results: 0,
            success_count: 0,
            failure_count: 0,
            ignored_results: 0,
            rejected_checks: 0,
            suppressed_probes: 0,
            trial_probes: 0,
            times_opened: 0,
            times_closed: 0,
            total_latency_ms: 0,
            current_status: CircuitStatus::Closed,
            failure_rate: 0.0,
            success_rate: 0.0,
            average_latency_ms: 0.0,
        }
    }

    pub(crate) fn record(&mut self, success: bool, latency_ms: u64) {
        self.total_results += 1;
        self.total_latency_ms = self.total_latency_ms.saturating_add(latency_ms);
        if success {
            self.success_count += 1;
        } else {
            self.failure_count += 1;
        }
    }

    /// Copy with derived rates filled in
    pub(crate) fn snapshot(&self, status: CircuitStatus) -> Self {
        let mut metrics = self.clone();
        metrics.current_status = status;
        if metrics.total_results > 0 {
            let total = metrics.total_results as f64;
            metrics.failure_rate = metrics.failure_count as f64 / total;
            metrics.success_rate = metrics.success_count as f64 / total;
            metrics.average_latency_ms = metrics.total_latency_ms as f64 / total;
        }
        metrics
    }

    /// Only a closed circuit counts as healthy
    pub fn is_healthy(&self) -> bool {
        self.current_status == CircuitStatus::Closed
    }

    /// Get human-readable state description
    pub fn state_description(&self) -> &'static str {
        match self.current_status {
            CircuitStatus::Closed => "Healthy - Normal operation",
            CircuitStatus::Open => "Failing - Rejecting all calls",
            CircuitStatus::HalfOpen => "Recovering - Awaiting trial probe",
        }
    }

    /// Format metrics for logging
    pub fn format_summary(&self) -> String {
        format!(
            "State: {} | Results: {} | Success: {:.1}% | Failures: {} | Avg Latency: {:.2}ms",
            self.state_description(),
            self.total_results,
            self.success_rate * 100.0,
            self.failure_count,
            self.average_latency_ms
        )
    }
}

impl Default for CircuitBreakerMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// System-wide circuit breaker metrics aggregator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemCircuitBreakerMetrics {
    /// Metrics for individual circuit breakers by dependency id
    pub circuit_breakers: HashMap<String, CircuitBreakerMetrics>,

    pub collected_at: DateTime<Utc>,
}

impl SystemCircuitBreakerMetrics {
    pub fn new(collected_at: DateTime<Utc>) -> Self {
        Self {
            circuit_breakers: HashMap::new(),
            collected_at,
        }
    }

    pub fn add_circuit_breaker(&mut self, dependency_id: String, metrics: CircuitBreakerMetrics) {
        self.circuit_breakers.insert(dependency_id, metrics);
    }

    /// Get count of circuit breakers by state
    pub fn count_by_state(&self) -> HashMap<CircuitStatus, usize> {
        let mut counts = HashMap::new();
        for metrics in self.circuit_breakers.values() {
            *counts.entry(metrics.current_status).or_insert(0) += 1;
        }
        counts
    }

    /// Dependency ids whose circuit is not closed, sorted
    pub fn unhealthy_circuits(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self
            .circuit_breakers
            .iter()
            .filter(|(_, metrics)| !metrics.is_healthy())
            .map(|(id, _)| id.as_str())
            .collect();
        ids.sort_unstable();
        ids
    }

    /// Fraction of circuits that are closed (0.0 to 1.0)
    pub fn health_score(&self) -> f64 {
        if self.circuit_breakers.is_empty() {
            return 1.0;
        }

        let healthy_count = self
            .circuit_breakers
            .values()
            .filter(|metrics| metrics.is_healthy())
            .count();

        healthy_count as f64 / self.circuit_breakers.len() as f64
    }

    pub fn total_results(&self) -> u64 {
        self.circuit_breakers.values().map(|m| m.total_results).sum()
    }

    pub fn total_failures(&self) -> u64 {
        self.circuit_breakers.values().map(|m| m.failure_count).sum()
    }

    pub fn system_failure_rate(&self) -> f64 {
        let total = self.total_results();
        if total == 0 {
            return 0.0;
        }
        self.total_failures() as f64 / total as f64
    }

    pub fn format_summary(&self) -> String {
        let counts = self.count_by_state();
        format!(
            "Circuits: {} | Closed: {} | Open: {} | Half-open: {} | Health: {:.1}% | Failure rate: {:.1}%",
            self.circuit_breakers.len(),
            counts.get(&CircuitStatus::Closed).unwrap_or(&0),
            counts.get(&CircuitStatus::Open).unwrap_or(&0),
            counts.get(&CircuitStatus::HalfOpen).unwrap_or(&0),
            self.health_score() * 100.0,
            self.system_failure_rate() * 100.0
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_derives_rates() {
        let mut metrics = CircuitBreakerMetrics::new();
        metrics.record(true, 10);
        metrics.record(true, 20);
        metrics.record(false, 30);
        metrics.record(true, 40);

        let snapshot = metrics.snapshot(CircuitStatus::Closed);
        assert_eq!(snapshot.total_results, 4);
        assert!((snapshot.failure_rate - 0.25).abs() < f64::EPSILON);
        assert!((snapshot.success_rate - 0.75).abs() < f64::EPSILON);
        assert!((snapshot.average_latency_ms - 25.0).abs() < f64::EPSILON);
        assert!(snapshot.is_healthy());
    }

    #[test]
    fn test_system_health_score_counts_closed() {
        let mut system = SystemCircuitBreakerMetrics::new(Utc::now());
        assert_eq!(system.health_score(), 1.0);

        let closed = CircuitBreakerMetrics::new();
        let open = CircuitBreakerMetrics::new().snapshot(CircuitStatus::Open);
        let half_open = CircuitBreakerMetrics::new().snapshot(CircuitStatus::HalfOpen);

        system.add_circuit_breaker("a".into(), closed.clone());
        system.add_circuit_breaker("b".into(), closed);
        system.add_circuit_breaker("c".into(), open);
        system.add_circuit_breaker("d".into(), half_open);

        assert!((system.health_score() - 0.5).abs() < f64::EPSILON);
        assert_eq!(system.unhealthy_circuits(), vec!["c", "d"]);
        assert_eq!(system.count_by_state().get(&CircuitStatus::Closed), Some(&2));
        assert!(system.format_summary().contains("Open: 1"));
    }
}
