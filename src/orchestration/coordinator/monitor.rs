//! # Health Monitoring
//!
//! Aggregates probe results and circuit states into an overall system status and keeps a
//! bounded probe history for reporting.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use tracing::{info, warn};

use crate::clock::Clock;
use crate::models::ProbeResult;
use crate::resilience::{CircuitState, CircuitStatus};

/// Overall health of the watched dependencies
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SystemStatus {
    /// No health round has completed yet
    Starting,
    /// Every circuit closed and every probe within its latency budget
    Healthy,
    /// Some circuit not closed, or a dependency answering slowly
    Degraded {
        reason: String,
        degraded_since: DateTime<Utc>,
    },
    /// Fewer than half of the circuits closed
    Unhealthy {
        reason: String,
        unhealthy_since: DateTime<Utc>,
    },
}

impl SystemStatus {
    pub fn label(&self) -> &'static str {
        match self {
            SystemStatus::Starting => "starting",
            SystemStatus::Healthy => "healthy",
            SystemStatus::Degraded { .. } => "degraded",
            SystemStatus::Unhealthy { .. } => "unhealthy",
        }
    }
}

/// Load-shedding hint derived from host utilisation
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DegradationLevel {
    Normal,
    Medium,
    High,
    Critical,
}

impl DegradationLevel {
    pub fn from_load(cpu_percent: f64, memory_percent: f64) -> Self {
        if cpu_percent > 90.0 || memory_percent > 95.0 {
            DegradationLevel::Critical
        } else if cpu_percent > 80.0 || memory_percent > 85.0 {
            DegradationLevel::High
        } else if cpu_percent > 60.0 || memory_percent > 70.0 {
            DegradationLevel::Medium
        } else {
            DegradationLevel::Normal
        }
    }
}

#[derive(Debug, Default)]
struct MonitorState {
    history: VecDeque<ProbeResult>,
    /// Most recent result per dependency
    latest: BTreeMap<String, ProbeResult>,
    /// Dependencies whose latest successful probe exceeded its budget
    slow: BTreeMap<String, u64>,
    status: Option<SystemStatus>,
}

#[derive(Debug)]
pub struct HealthMonitor {
    history_limit: usize,
    clock: Arc<dyn Clock>,
    state: Mutex<MonitorState>,
}

impl HealthMonitor {
    pub fn new(history_limit: usize, clock: Arc<dyn Clock>) -> Self {
        Self {
            history_limit,
            clock,
            state: Mutex::new(MonitorState::default()),
        }
    }

    /// Keep a result for reporting; `budget_ms` is the dependency's latency budget
    pub fn record_probe(&self, result: &ProbeResult, budget_ms: u64) {
        let mut state = self.state.lock();
        if result.is_slow(budget_ms) {
            state.slow.insert(result.dependency_id.clone(), result.latency_ms);
        } else {
            state.slow.remove(&result.dependency_id);
        }
        state
            .latest
            .insert(result.dependency_id.clone(), result.clone());
        state.history.push_back(result.clone());
        while state.history.len() > self.history_limit {
            state.history.pop_front();
        }
    }

    /// Recompute the system status from the current circuits
    pub fn evaluate(&self, circuits: &[CircuitState]) -> SystemStatus {
        let now = self.clock.now();
        let mut state = self.state.lock();
        let previous = state.status.clone();

        let total = circuits.len();
        let closed = circuits
            .iter()
            .filter(|c| c.status == CircuitStatus::Closed)
            .count();
        let closed_percentage = if total == 0 {
            100.0
        } else {
            closed as f64 / total as f64 * 100.0
        };

        let status = if closed_percentage < 50.0 {
            let unhealthy_since = match &previous {
                Some(SystemStatus::Unhealthy { unhealthy_since, .. }) => *unhealthy_since,
                _ => now,
            };
            SystemStatus::Unhealthy {
                reason: format!("Only {closed_percentage:.1}% of circuits are closed"),
                unhealthy_since,
            }
        } else if closed < total || !state.slow.is_empty() {
            let degraded_since = match &previous {
                Some(SystemStatus::Degraded { degraded_since, .. }) => *degraded_since,
                _ => now,
            };
            let not_closed: Vec<&str> = circuits
                .iter()
                .filter(|c| c.status != CircuitStatus::Closed)
                .map(|c| c.dependency_id.as_str())
                .collect();
            let slow: Vec<&str> = state.slow.keys().map(String::as_str).collect();
            SystemStatus::Degraded {
                reason: format!(
                    "circuits not closed: {:?}; slow dependencies: {:?}",
                    not_closed, slow
                ),
                degraded_since,
            }
        } else {
            SystemStatus::Healthy
        };

        if previous.as_ref().map(SystemStatus::label) != Some(status.label()) {
            match &status {
                SystemStatus::Unhealthy { reason, .. } => {
                    warn!("🚨 HEALTH: System becoming unhealthy - {}", reason)
                }
                SystemStatus::Degraded { reason, .. } => {
                    warn!("⚠️ HEALTH: System becoming degraded - {}", reason)
                }
                _ => info!("🏥 HEALTH: System status {}", status.label()),
            }
        }

        state.status = Some(status.clone());
        status
    }

    pub fn system_status(&self) -> SystemStatus {
        self.state
            .lock()
            .status
            .clone()
            .unwrap_or(SystemStatus::Starting)
    }

    /// Latest result per dependency, ordered by dependency id
    pub fn latest_results(&self) -> Vec<ProbeResult> {
        self.state.lock().latest.values().cloned().collect()
    }

    /// Retained results, oldest first
    pub fn probe_history(&self) -> Vec<ProbeResult> {
        self.state.lock().history.iter().cloned().collect()
    }

    /// Dependencies answering over budget, with their last latency
    pub fn slow_dependencies(&self) -> Vec<(String, u64)> {
        self.state
            .lock()
            .slow
            .iter()
            .map(|(id, latency)| (id.clone(), *latency))
            .collect()
    }
}
