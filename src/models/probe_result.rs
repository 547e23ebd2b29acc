use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Why a probe failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeErrorKind {
    /// The probe did not finish within its timeout
    Timeout,
    /// The dependency could not be reached
    Connection,
    /// The dependency answered but reported itself unhealthy
    Unhealthy,
    /// The probe itself misbehaved (panicked)
    Internal,
}

impl fmt::Display for ProbeErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ProbeErrorKind::Timeout => "timeout",
            ProbeErrorKind::Connection => "connection",
            ProbeErrorKind::Unhealthy => "unhealthy",
            ProbeErrorKind::Internal => "internal",
        };
        f.write_str(label)
    }
}

/// Outcome of a single liveness check.
///
/// Consumed once by the circuit breaker; kept afterwards only for reporting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeResult {
    pub dependency_id: String,
    pub timestamp: DateTime<Utc>,
    pub success: bool,
    pub latency_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ProbeErrorKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl ProbeResult {
    pub fn success(dependency_id: impl Into<String>, timestamp: DateTime<Utc>, latency_ms: u64) -> Self {
        Self {
            dependency_id: dependency_id.into(),
            timestamp,
            success: true,
            latency_ms,
            error_kind: None,
            error_message: None,
        }
    }

    pub fn failure(
        dependency_id: impl Into<String>,
        timestamp: DateTime<Utc>,
        latency_ms: u64,
        error_kind: ProbeErrorKind,
        error_message: impl Into<String>,
    ) -> Self {
        Self {
            dependency_id: dependency_id.into(),
            timestamp,
            success: false,
            latency_ms,
            error_kind: Some(error_kind),
            error_message: Some(error_message.into()),
        }
    }

    /// Successful, but slower than the dependency's declared budget
    pub fn is_slow(&self, budget_ms: u64) -> bool {
        self.success && self.latency_ms > budget_ms
    }
}
