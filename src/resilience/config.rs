//! # Circuit Breaker Configuration
//!
//! Thresholds for a single dependency's breaker. The control-plane configuration holds
//! a default instance plus optional per-dependency overrides.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::ConfigurationError;
use crate::constants::circuit;

/// Configuration for a single circuit breaker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Number of consecutive failures before opening circuit
    pub failure_threshold: u32,

    /// Time to wait in open state before attempting recovery (fixed, no backoff)
    pub cooldown_ms: u64,
}

impl CircuitBreakerConfig {
    pub fn new(failure_threshold: u32, cooldown: Duration) -> Self {
        Self {
            failure_threshold,
            cooldown_ms: cooldown.as_millis() as u64,
        }
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }

    /// Validate configuration parameters; `field` prefixes error messages
    pub fn validate(&self, field: &str) -> Result<(), ConfigurationError> {
        if self.failure_threshold == 0 {
            return Err(ConfigurationError::invalid_value(
                format!("{field}.failure_threshold"),
                "0",
                "failure_threshold must be greater than 0",
            ));
        }

        if self.failure_threshold > circuit::MAX_FAILURE_THRESHOLD {
            return Err(ConfigurationError::invalid_value(
                format!("{field}.failure_threshold"),
                self.failure_threshold.to_string(),
                format!(
                    "failure_threshold should not exceed {}",
                    circuit::MAX_FAILURE_THRESHOLD
                ),
            ));
        }

        if self.cooldown_ms == 0 {
            return Err(ConfigurationError::invalid_value(
                format!("{field}.cooldown_ms"),
                "0",
                "cooldown must be greater than 0",
            ));
        }

        if self.cooldown_ms > circuit::MAX_COOLDOWN_MS {
            return Err(ConfigurationError::invalid_value(
                format!("{field}.cooldown_ms"),
                self.cooldown_ms.to_string(),
                "cooldown should not exceed one hour",
            ));
        }

        Ok(())
    }
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: circuit::DEFAULT_FAILURE_THRESHOLD,
            cooldown_ms: circuit::DEFAULT_COOLDOWN_MS,
        }
    }
}
