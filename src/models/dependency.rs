use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::constants::probe;

/// Category of outbound dependency
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyKind {
    Database,
    Cache,
    External,
}

impl DependencyKind {
    /// Probe timeout used when the dependency does not configure one
    pub fn default_probe_timeout(&self) -> Duration {
        match self {
            DependencyKind::Database => Duration::from_millis(probe::DATABASE_TIMEOUT_MS),
            DependencyKind::Cache => Duration::from_millis(probe::CACHE_TIMEOUT_MS),
            DependencyKind::External => Duration::from_millis(probe::EXTERNAL_TIMEOUT_MS),
        }
    }
}

impl fmt::Display for DependencyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DependencyKind::Database => write!(f, "database"),
            DependencyKind::Cache => write!(f, "cache"),
            DependencyKind::External => write!(f, "external"),
        }
    }
}

/// An outbound dependency watched by the control plane.
///
/// Built once from configuration when the coordinator starts and never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependency {
    pub id: String,
    pub kind: DependencyKind,
    pub endpoint: String,
    pub expected_latency_budget_ms: u64,
}

impl Dependency {
    pub fn new(
        id: impl Into<String>,
        kind: DependencyKind,
        endpoint: impl Into<String>,
        expected_latency_budget_ms: u64,
    ) -> Self {
        Self {
            id: id.into(),
            kind,
            endpoint: endpoint.into(),
            expected_latency_budget_ms,
        }
    }

    pub fn latency_budget(&self) -> Duration {
        Duration::from_millis(self.expected_latency_budget_ms)
    }
}
