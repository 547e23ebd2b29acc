//! # Control Plane Configuration
//!
//! A single immutable [`ControlPlaneConfig`] is handed to the coordinator at
//! construction. It is loaded by [`ConfigLoader`] (YAML files layered with environment
//! overrides) or built in code, and must pass [`ControlPlaneConfig::validate`] before use:
//! invalid configuration is fatal at startup and never surfaces at runtime.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use bulwark_core::config::ConfigLoader;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ConfigLoader::load()?;
//! println!("watching {} dependencies", config.dependencies.len());
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod loader;

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::time::Duration;

pub use error::{ConfigResult, ConfigurationError};
pub use loader::ConfigLoader;

use crate::constants::{coordinator, probe, registry, scaling};
use crate::models::{Dependency, DependencyKind, InstanceRole};
use crate::resilience::CircuitBreakerConfig;
use crate::services::LoadBalancingAlgorithm;

/// Root configuration structure mirroring bulwark.yaml
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlPlaneConfig {
    /// Outbound dependencies to probe and gate
    pub dependencies: Vec<DependencyConfig>,

    /// Breaker thresholds used unless a dependency overrides them
    pub circuit_breaker: CircuitBreakerConfig,

    /// Heartbeat and staleness settings
    pub registry: RegistryConfig,

    /// Backend selection settings
    pub load_selector: LoadSelectorConfig,

    /// Scaling advisor policy
    pub scaling: ScalingConfig,

    /// Tick intervals and fan-out limits
    pub coordinator: CoordinatorConfig,
}

/// One watched dependency
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DependencyConfig {
    pub id: String,
    pub kind: DependencyKind,
    pub endpoint: String,
    #[serde(default = "default_latency_budget_ms")]
    pub expected_latency_budget_ms: u64,
    /// Overrides the per-kind default probe timeout
    #[serde(default)]
    pub probe_timeout_ms: Option<u64>,
    /// Overrides the global breaker thresholds
    #[serde(default)]
    pub circuit_breaker: Option<CircuitBreakerConfig>,
}

fn default_latency_budget_ms() -> u64 {
    probe::DEFAULT_LATENCY_BUDGET_MS
}

impl DependencyConfig {
    pub fn new(id: impl Into<String>, kind: DependencyKind, endpoint: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind,
            endpoint: endpoint.into(),
            expected_latency_budget_ms: probe::DEFAULT_LATENCY_BUDGET_MS,
            probe_timeout_ms: None,
            circuit_breaker: None,
        }
    }

    pub fn to_dependency(&self) -> Dependency {
        Dependency::new(
            self.id.clone(),
            self.kind,
            self.endpoint.clone(),
            self.expected_latency_budget_ms,
        )
    }

    pub fn probe_timeout(&self) -> Duration {
        self.probe_timeout_ms
            .map(Duration::from_millis)
            .unwrap_or_else(|| self.kind.default_probe_timeout())
    }

    /// Breaker thresholds for this dependency
    pub fn breaker_config(&self, default: &CircuitBreakerConfig) -> CircuitBreakerConfig {
        self.circuit_breaker.clone().unwrap_or_else(|| default.clone())
    }
}

/// Service registry configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    pub heartbeat_interval_ms: u64,
    /// Defaults to twice the heartbeat interval
    pub stale_threshold_ms: Option<u64>,
}

impl RegistryConfig {
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }

    pub fn stale_threshold(&self) -> Duration {
        Duration::from_millis(self.stale_threshold_ms.unwrap_or(
            self.heartbeat_interval_ms * registry::STALE_THRESHOLD_MULTIPLIER,
        ))
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval_ms: registry::DEFAULT_HEARTBEAT_INTERVAL_MS,
            stale_threshold_ms: None,
        }
    }
}

/// Load selector configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadSelectorConfig {
    pub algorithm: LoadBalancingAlgorithm,
    /// Relative weights by instance id, used by the weighted algorithm
    pub weights: HashMap<String, u32>,
    /// Dependency whose circuit gates master instances, e.g. `database_primary`
    pub master_dependency: Option<String>,
    /// Dependency whose circuit gates worker instances, e.g. `database_read_replica`
    pub worker_dependency: Option<String>,
}

impl LoadSelectorConfig {
    /// The dependency an instance of `role` is served by, if one is configured
    pub fn gating_dependency(&self, role: InstanceRole) -> Option<&str> {
        match role {
            InstanceRole::Master => self.master_dependency.as_deref(),
            InstanceRole::Worker => self.worker_dependency.as_deref(),
        }
    }
}

/// Scaling advisor configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScalingConfig {
    pub enabled: bool,
    /// Name of the scaled group; cooldowns are tracked per target
    pub target: String,
    /// Number of most recent samples averaged per evaluation
    pub window_size: usize,
    pub cpu_scale_up_percent: f64,
    pub memory_scale_up_percent: f64,
    pub cpu_scale_down_percent: f64,
    pub memory_scale_down_percent: f64,
    /// Optional mean active-connection ceiling that also triggers scale-up
    pub connections_scale_up: Option<u64>,
    pub cooldown_ms: u64,
    /// Events retained in the advisor's log
    pub history_limit: usize,
}

impl ScalingConfig {
    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }
}

impl Default for ScalingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            target: scaling::DEFAULT_TARGET.to_string(),
            window_size: scaling::DEFAULT_WINDOW_SIZE,
            cpu_scale_up_percent: scaling::DEFAULT_CPU_SCALE_UP_PERCENT,
            memory_scale_up_percent: scaling::DEFAULT_MEMORY_SCALE_UP_PERCENT,
            cpu_scale_down_percent: scaling::DEFAULT_CPU_SCALE_DOWN_PERCENT,
            memory_scale_down_percent: scaling::DEFAULT_MEMORY_SCALE_DOWN_PERCENT,
            connections_scale_up: None,
            cooldown_ms: scaling::DEFAULT_COOLDOWN_MS,
            history_limit: scaling::DEFAULT_HISTORY_LIMIT,
        }
    }
}

/// Coordinator tick configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    pub health_check_interval_ms: u64,
    pub eviction_interval_ms: u64,
    pub scaling_interval_ms: u64,
    pub sample_interval_ms: u64,
    /// Load samples retained in the ring buffer
    pub sample_capacity: usize,
    /// Upper bound on probes in flight during one health round
    pub max_concurrent_probes: usize,
    /// Probe results retained for reporting
    pub probe_history_limit: usize,
    /// Snapshot export interval; export is disabled when unset
    pub snapshot_interval_ms: Option<u64>,
}

impl CoordinatorConfig {
    pub fn health_check_interval(&self) -> Duration {
        Duration::from_millis(self.health_check_interval_ms)
    }

    pub fn eviction_interval(&self) -> Duration {
        Duration::from_millis(self.eviction_interval_ms)
    }

    pub fn scaling_interval(&self) -> Duration {
        Duration::from_millis(self.scaling_interval_ms)
    }

    pub fn sample_interval(&self) -> Duration {
        Duration::from_millis(self.sample_interval_ms)
    }

    pub fn snapshot_interval(&self) -> Option<Duration> {
        self.snapshot_interval_ms.map(Duration::from_millis)
    }
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            health_check_interval_ms: coordinator::DEFAULT_HEALTH_CHECK_INTERVAL_MS,
            eviction_interval_ms: coordinator::DEFAULT_EVICTION_INTERVAL_MS,
            scaling_interval_ms: coordinator::DEFAULT_SCALING_INTERVAL_MS,
            sample_interval_ms: coordinator::DEFAULT_SAMPLE_INTERVAL_MS,
            sample_capacity: coordinator::DEFAULT_SAMPLE_CAPACITY,
            max_concurrent_probes: coordinator::DEFAULT_MAX_CONCURRENT_PROBES,
            probe_history_limit: coordinator::DEFAULT_PROBE_HISTORY_LIMIT,
            snapshot_interval_ms: None,
        }
    }
}

impl ControlPlaneConfig {
    /// Dependencies as immutable models
    pub fn dependency_models(&self) -> Vec<Dependency> {
        self.dependencies.iter().map(DependencyConfig::to_dependency).collect()
    }

    /// Longest probe timeout across all dependencies (zero when none are configured)
    pub fn longest_probe_timeout(&self) -> Duration {
        self.dependencies
            .iter()
            .map(DependencyConfig::probe_timeout)
            .max()
            .unwrap_or(Duration::ZERO)
    }

    /// Validate the whole configuration
    pub fn validate(&self) -> ConfigResult<()> {
        self.circuit_breaker.validate("circuit_breaker")?;

        let mut seen = HashSet::new();
        for dependency in &self.dependencies {
            if dependency.id.trim().is_empty() {
                return Err(ConfigurationError::invalid_value(
                    "dependencies.id",
                    dependency.id.clone(),
                    "dependency id must not be empty",
                ));
            }
            if !seen.insert(dependency.id.as_str()) {
                return Err(ConfigurationError::DuplicateDependency {
                    dependency_id: dependency.id.clone(),
                });
            }
            if dependency.endpoint.trim().is_empty() {
                return Err(ConfigurationError::invalid_value(
                    format!("dependencies.{}.endpoint", dependency.id),
                    dependency.endpoint.clone(),
                    "endpoint must not be empty",
                ));
            }
            if dependency.probe_timeout_ms == Some(0) {
                return Err(ConfigurationError::invalid_value(
                    format!("dependencies.{}.probe_timeout_ms", dependency.id),
                    "0",
                    "probe timeout must be greater than 0",
                ));
            }
            if let Some(breaker) = &dependency.circuit_breaker {
                breaker.validate(&format!("dependencies.{}.circuit_breaker", dependency.id))?;
            }
        }

        self.validate_registry()?;
        self.validate_load_selector()?;
        self.validate_scaling()?;
        self.validate_coordinator()?;

        Ok(())
    }

    fn validate_registry(&self) -> ConfigResult<()> {
        if self.registry.heartbeat_interval_ms == 0 {
            return Err(ConfigurationError::invalid_value(
                "registry.heartbeat_interval_ms",
                "0",
                "heartbeat interval must be greater than 0",
            ));
        }
        if self.registry.stale_threshold() < self.registry.heartbeat_interval() {
            return Err(ConfigurationError::invalid_value(
                "registry.stale_threshold_ms",
                self.registry.stale_threshold().as_millis().to_string(),
                "stale threshold must be at least one heartbeat interval",
            ));
        }
        Ok(())
    }

    fn validate_load_selector(&self) -> ConfigResult<()> {
        if let Some((instance_id, _)) = self.load_selector.weights.iter().find(|(_, w)| **w == 0) {
            return Err(ConfigurationError::invalid_value(
                format!("load_selector.weights.{instance_id}"),
                "0",
                "weights must be greater than 0",
            ));
        }
        for role in [InstanceRole::Master, InstanceRole::Worker] {
            if let Some(dependency_id) = self.load_selector.gating_dependency(role) {
                if !self.dependencies.iter().any(|d| d.id == dependency_id) {
                    return Err(ConfigurationError::UnknownDependency {
                        dependency_id: dependency_id.to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    fn validate_scaling(&self) -> ConfigResult<()> {
        let s = &self.scaling;
        if s.window_size == 0 {
            return Err(ConfigurationError::invalid_value(
                "scaling.window_size",
                "0",
                "window size must be greater than 0",
            ));
        }
        for (field, value) in [
            ("scaling.cpu_scale_up_percent", s.cpu_scale_up_percent),
            ("scaling.memory_scale_up_percent", s.memory_scale_up_percent),
            ("scaling.cpu_scale_down_percent", s.cpu_scale_down_percent),
            ("scaling.memory_scale_down_percent", s.memory_scale_down_percent),
        ] {
            if !(0.0..=100.0).contains(&value) {
                return Err(ConfigurationError::invalid_value(
                    field,
                    value.to_string(),
                    "percent thresholds must be between 0 and 100",
                ));
            }
        }
        if s.cpu_scale_down_percent >= s.cpu_scale_up_percent {
            return Err(ConfigurationError::invalid_value(
                "scaling.cpu_scale_down_percent",
                s.cpu_scale_down_percent.to_string(),
                "scale-down threshold must be below the scale-up threshold",
            ));
        }
        if s.memory_scale_down_percent >= s.memory_scale_up_percent {
            return Err(ConfigurationError::invalid_value(
                "scaling.memory_scale_down_percent",
                s.memory_scale_down_percent.to_string(),
                "scale-down threshold must be below the scale-up threshold",
            ));
        }
        if s.cooldown_ms == 0 {
            return Err(ConfigurationError::invalid_value(
                "scaling.cooldown_ms",
                "0",
                "scaling cooldown must be greater than 0",
            ));
        }
        if s.target.trim().is_empty() {
            return Err(ConfigurationError::invalid_value(
                "scaling.target",
                s.target.clone(),
                "scaling target must not be empty",
            ));
        }
        Ok(())
    }

    fn validate_coordinator(&self) -> ConfigResult<()> {
        let c = &self.coordinator;
        for (field, value) in [
            ("coordinator.health_check_interval_ms", c.health_check_interval_ms),
            ("coordinator.eviction_interval_ms", c.eviction_interval_ms),
            ("coordinator.scaling_interval_ms", c.scaling_interval_ms),
            ("coordinator.sample_interval_ms", c.sample_interval_ms),
        ] {
            if value == 0 {
                return Err(ConfigurationError::invalid_value(
                    field,
                    "0",
                    "tick intervals must be greater than 0",
                ));
            }
        }
        if c.max_concurrent_probes == 0 {
            return Err(ConfigurationError::invalid_value(
                "coordinator.max_concurrent_probes",
                "0",
                "at least one probe must be allowed in flight",
            ));
        }
        if c.sample_capacity < self.scaling.window_size {
            return Err(ConfigurationError::invalid_value(
                "coordinator.sample_capacity",
                c.sample_capacity.to_string(),
                "sample capacity must hold at least one scaling window",
            ));
        }
        if c.snapshot_interval_ms == Some(0) {
            return Err(ConfigurationError::invalid_value(
                "coordinator.snapshot_interval_ms",
                "0",
                "snapshot interval must be greater than 0 when set",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_config() -> ControlPlaneConfig {
        ControlPlaneConfig {
            dependencies: vec![
                DependencyConfig::new("db-primary", DependencyKind::Database, "postgres://localhost/app"),
                DependencyConfig::new("redis_cache", DependencyKind::Cache, "redis://localhost:6379/1"),
            ],
            ..Default::default()
        }
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(ControlPlaneConfig::default().validate().is_ok());
        assert!(sample_config().validate().is_ok());
    }

    #[test]
    fn test_stale_threshold_defaults_to_twice_heartbeat() {
        let registry = RegistryConfig::default();
        assert_eq!(registry.heartbeat_interval(), Duration::from_secs(10));
        assert_eq!(registry.stale_threshold(), Duration::from_secs(20));
    }

    #[test]
    fn test_duplicate_dependency_rejected() {
        let mut config = sample_config();
        config.dependencies.push(DependencyConfig::new(
            "db-primary",
            DependencyKind::Database,
            "postgres://replica/app",
        ));
        assert!(matches!(
            config.validate(),
            Err(ConfigurationError::DuplicateDependency { .. })
        ));
    }

    #[test]
    fn test_per_dependency_breaker_override_validated() {
        let mut config = sample_config();
        config.dependencies[0].circuit_breaker = Some(CircuitBreakerConfig {
            failure_threshold: 0,
            cooldown_ms: 1000,
        });
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("dependencies.db-primary.circuit_breaker"));
    }

    #[test]
    fn test_inverted_scaling_thresholds_rejected() {
        let mut config = sample_config();
        config.scaling.cpu_scale_down_percent = 90.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_weight_rejected() {
        let mut config = sample_config();
        config.load_selector.weights.insert("worker-a".to_string(), 0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_role_gate_must_name_configured_dependency() {
        let mut config = sample_config();
        config.load_selector.master_dependency = Some("db-primary".to_string());
        assert!(config.validate().is_ok());
        assert_eq!(
            config.load_selector.gating_dependency(InstanceRole::Master),
            Some("db-primary")
        );
        assert_eq!(config.load_selector.gating_dependency(InstanceRole::Worker), None);

        config.load_selector.worker_dependency = Some("db-replica".to_string());
        assert!(matches!(
            config.validate(),
            Err(ConfigurationError::UnknownDependency { dependency_id }) if dependency_id == "db-replica"
        ));
    }

    #[test]
    fn test_probe_timeout_falls_back_to_kind_default() {
        let config = sample_config();
        assert_eq!(config.dependencies[0].probe_timeout(), Duration::from_secs(5));
        assert_eq!(config.dependencies[1].probe_timeout(), Duration::from_secs(2));
        assert_eq!(config.longest_probe_timeout(), Duration::from_secs(5));
    }
}
