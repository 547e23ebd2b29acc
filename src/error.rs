//! # Control Plane Errors
//!
//! Only a few conditions ever leave the control plane as errors. Probe failures are
//! data (see [`crate::health::ProbeFailure`]) and are folded into circuit state, and
//! unknown heartbeats are reported through [`crate::registry::HeartbeatOutcome`].

use crate::config::ConfigurationError;
use crate::models::RequestClass;

/// Errors surfaced by the control plane
#[derive(Debug, thiserror::Error)]
pub enum ControlPlaneError {
    /// Every candidate backend was filtered out; callers should fail fast (HTTP 503)
    #[error("No available backend for {request_class} requests ({considered} candidates considered)")]
    NoAvailableBackend {
        request_class: RequestClass,
        considered: usize,
    },

    /// Operation referenced an instance that is not registered
    #[error("Unknown service instance: {instance_id}")]
    UnknownInstance { instance_id: String },

    /// Operation referenced a dependency that was never configured
    #[error("Unknown dependency: {dependency_id}")]
    UnknownDependency { dependency_id: String },

    /// Invalid configuration, only produced while constructing the control plane
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    /// A probe could not be built for a dependency
    #[error("Probe setup failed for {dependency_id}: {reason}")]
    ProbeSetup {
        dependency_id: String,
        reason: String,
    },

    /// Lifecycle misuse (starting twice, etc.)
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Snapshot sink failed to persist
    #[error("Persistence error: {0}")]
    Persistence(String),
}

impl ControlPlaneError {
    /// Whether the caller may retry the same operation later
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ControlPlaneError::NoAvailableBackend { .. } | ControlPlaneError::Persistence(_)
        )
    }
}

impl From<sqlx::Error> for ControlPlaneError {
    fn from(error: sqlx::Error) -> Self {
        ControlPlaneError::Persistence(error.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ControlPlaneError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_available_backend_is_retryable() {
        let err = ControlPlaneError::NoAvailableBackend {
            request_class: RequestClass::Write,
            considered: 3,
        };
        assert!(err.is_retryable());
        assert_eq!(
            err.to_string(),
            "No available backend for write requests (3 candidates considered)"
        );
    }

    #[test]
    fn test_configuration_error_is_fatal() {
        let err: ControlPlaneError = ConfigurationError::invalid_value(
            "circuit_breaker.failure_threshold",
            "0",
            "must be greater than 0",
        )
        .into();
        assert!(!err.is_retryable());
        assert!(err.to_string().contains("failure_threshold"));
    }
}
