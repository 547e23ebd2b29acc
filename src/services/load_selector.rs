//! # Load Selector
//!
//! Picks one backend instance for a request class from a candidate list.
//!
//! Candidates are first narrowed by role (writes go to the master only) and by circuit
//! availability, then ordered by `instance_id` so every algorithm sees a stable list.
//! An instance is available when the dependency gating its role (for example
//! `database_read_replica` for workers) has a closed circuit, and when a breaker kept
//! under its own `instance_id`, if any, is closed too.
//! Round-robin indexes into that filtered list, so an instance dropping out never makes
//! the others skip a turn and a shrinking list can never index out of bounds.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::config::LoadSelectorConfig;
use crate::error::{ControlPlaneError, Result};
use crate::models::{InstanceRole, RequestClass, ServiceInstance};
use crate::resilience::CircuitBreakerManager;

/// Backend selection strategy
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadBalancingAlgorithm {
    #[default]
    RoundRobin,
    LeastConnections,
    Weighted,
}

impl fmt::Display for LoadBalancingAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadBalancingAlgorithm::RoundRobin => write!(f, "round_robin"),
            LoadBalancingAlgorithm::LeastConnections => write!(f, "least_connections"),
            LoadBalancingAlgorithm::Weighted => write!(f, "weighted"),
        }
    }
}

/// Rotation state for one request class
#[derive(Debug, Default)]
struct ClassState {
    next_index: AtomicUsize,
    /// Smooth weighted round-robin running weights
    current_weights: Mutex<HashMap<String, i64>>,
}

#[derive(Debug)]
pub struct LoadSelector {
    algorithm: LoadBalancingAlgorithm,
    weights: HashMap<String, u32>,
    master_dependency: Option<String>,
    worker_dependency: Option<String>,
    breakers: Arc<CircuitBreakerManager>,
    read: ClassState,
    write: ClassState,
}

impl LoadSelector {
    pub fn new(config: &LoadSelectorConfig, breakers: Arc<CircuitBreakerManager>) -> Self {
        Self {
            algorithm: config.algorithm,
            weights: config.weights.clone(),
            master_dependency: config.master_dependency.clone(),
            worker_dependency: config.worker_dependency.clone(),
            breakers,
            read: ClassState::default(),
            write: ClassState::default(),
        }
    }

    pub fn algorithm(&self) -> LoadBalancingAlgorithm {
        self.algorithm
    }

    fn is_routable(&self, instance: &ServiceInstance) -> bool {
        let gate = match instance.role {
            InstanceRole::Master => self.master_dependency.as_deref(),
            InstanceRole::Worker => self.worker_dependency.as_deref(),
        };
        let gate_closed = gate.map_or(true, |dependency_id| {
            self.breakers.is_available_quiet(dependency_id)
        });
        if !gate_closed {
            debug!(
                instance_id = %instance.instance_id,
                dependency_id = gate.unwrap_or_default(),
                "Instance skipped, its dependency circuit is not closed"
            );
            return false;
        }
        self.breakers.is_available_quiet(&instance.instance_id)
    }

    fn class_state(&self, request_class: RequestClass) -> &ClassState {
        match request_class {
            RequestClass::Read => &self.read,
            RequestClass::Write => &self.write,
        }
    }

    /// Choose a backend for `request_class`.
    ///
    /// Fails with [`ControlPlaneError::NoAvailableBackend`] when nothing survives
    /// filtering; callers should fail fast rather than wait.
    pub fn select(
        &self,
        request_class: RequestClass,
        candidates: &[ServiceInstance],
    ) -> Result<ServiceInstance> {
        let mut eligible: Vec<&ServiceInstance> = candidates
            .iter()
            .filter(|instance| request_class.accepts(instance.role))
            .filter(|instance| self.is_routable(instance))
            .collect();
        eligible.sort_by(|a, b| a.instance_id.cmp(&b.instance_id));

        if eligible.is_empty() {
            warn!(
                request_class = %request_class,
                considered = candidates.len(),
                "🚫 No available backend"
            );
            return Err(ControlPlaneError::NoAvailableBackend {
                request_class,
                considered: candidates.len(),
            });
        }

        let chosen = match self.algorithm {
            LoadBalancingAlgorithm::RoundRobin => self.round_robin(request_class, &eligible),
            LoadBalancingAlgorithm::LeastConnections => least_connections(&eligible),
            LoadBalancingAlgorithm::Weighted => self.weighted(request_class, &eligible),
        };

        debug!(
            request_class = %request_class,
            algorithm = %self.algorithm,
            instance_id = %chosen.instance_id,
            eligible = eligible.len(),
            "Backend selected"
        );
        Ok(chosen.clone())
    }

    fn round_robin<'a>(
        &self,
        request_class: RequestClass,
        eligible: &[&'a ServiceInstance],
    ) -> &'a ServiceInstance {
        let index = self
            .class_state(request_class)
            .next_index
            .fetch_add(1, Ordering::Relaxed);
        eligible[index % eligible.len()]
    }

    /// Smooth weighted round-robin; any unweighted candidate sends the whole pick to
    /// plain round-robin.
    fn weighted<'a>(
        &self,
        request_class: RequestClass,
        eligible: &[&'a ServiceInstance],
    ) -> &'a ServiceInstance {
        let weights: Option<Vec<i64>> = eligible
            .iter()
            .map(|instance| self.weights.get(&instance.instance_id).map(|w| i64::from(*w)))
            .collect();

        let Some(weights) = weights else {
            debug!(
                request_class = %request_class,
                "Candidate without declared weight, using round-robin"
            );
            return self.round_robin(request_class, eligible);
        };

        let total: i64 = weights.iter().sum();
        let mut current = self.class_state(request_class).current_weights.lock();
        current.retain(|id, _| eligible.iter().any(|i| &i.instance_id == id));

        let mut best = 0;
        let mut best_weight = i64::MIN;
        for (index, (instance, weight)) in eligible.iter().zip(&weights).enumerate() {
            let entry = current.entry(instance.instance_id.clone()).or_insert(0);
            *entry += weight;
            if *entry > best_weight {
                best_weight = *entry;
                best = index;
            }
        }

        if let Some(entry) = current.get_mut(&eligible[best].instance_id) {
            *entry -= total;
        }
        eligible[best]
    }
}

/// Fewest active connections, ties to the lowest `instance_id`
fn least_connections<'a>(eligible: &[&'a ServiceInstance]) -> &'a ServiceInstance {
    eligible
        .iter()
        .copied()
        .min_by(|a, b| {
            a.current_load
                .active_connections
                .cmp(&b.current_load.active_connections)
                .then_with(|| a.instance_id.cmp(&b.instance_id))
        })
        .unwrap_or(eligible[0])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::models::{InstanceLoad, InstanceRole};
    use crate::resilience::CircuitBreakerConfig;
    use std::time::Duration;

    fn selector(algorithm: LoadBalancingAlgorithm, weights: &[(&str, u32)]) -> LoadSelector {
        let config = LoadSelectorConfig {
            algorithm,
            weights: weights
                .iter()
                .map(|(id, w)| (id.to_string(), *w))
                .collect(),
            ..LoadSelectorConfig::default()
        };
        let breakers = Arc::new(CircuitBreakerManager::new(Arc::new(
            ManualClock::starting_now(),
        )));
        LoadSelector::new(&config, breakers)
    }

    fn worker(id: &str, connections: u32) -> ServiceInstance {
        ServiceInstance::new(id, InstanceRole::Worker, "10.0.0.1", 8080)
            .with_load(InstanceLoad::with_connections(connections))
    }

    fn pick(selector: &LoadSelector, class: RequestClass, candidates: &[ServiceInstance]) -> String {
        selector.select(class, candidates).unwrap().instance_id
    }

    #[test]
    fn test_round_robin_wraps_in_id_order() {
        let selector = selector(LoadBalancingAlgorithm::RoundRobin, &[]);
        let candidates = vec![worker("c", 0), worker("a", 0), worker("b", 0)];

        let picks: Vec<String> = (0..4)
            .map(|_| pick(&selector, RequestClass::Read, &candidates))
            .collect();
        assert_eq!(picks, vec!["a", "b", "c", "a"]);
    }

    #[test]
    fn test_round_robin_survives_shrinking_list() {
        let selector = selector(LoadBalancingAlgorithm::RoundRobin, &[]);
        let three = vec![worker("a", 0), worker("b", 0), worker("c", 0)];
        pick(&selector, RequestClass::Read, &three);
        pick(&selector, RequestClass::Read, &three);

        let one = vec![worker("b", 0)];
        assert_eq!(pick(&selector, RequestClass::Read, &one), "b");
    }

    #[test]
    fn test_writes_route_to_master_only() {
        let selector = selector(LoadBalancingAlgorithm::RoundRobin, &[]);
        let master = ServiceInstance::new("primary", InstanceRole::Master, "10.0.0.2", 5432);
        let candidates = vec![worker("a", 0), master, worker("b", 0)];

        for _ in 0..3 {
            assert_eq!(pick(&selector, RequestClass::Write, &candidates), "primary");
        }

        let err = selector
            .select(RequestClass::Write, &[worker("a", 0)])
            .unwrap_err();
        assert!(matches!(
            err,
            ControlPlaneError::NoAvailableBackend {
                request_class: RequestClass::Write,
                considered: 1
            }
        ));
    }

    #[test]
    fn test_least_connections_breaks_ties_by_id() {
        let selector = selector(LoadBalancingAlgorithm::LeastConnections, &[]);
        let candidates = vec![worker("c", 2), worker("b", 2), worker("a", 9)];
        assert_eq!(pick(&selector, RequestClass::Read, &candidates), "b");
    }

    #[test]
    fn test_weighted_is_proportional() {
        let selector = selector(LoadBalancingAlgorithm::Weighted, &[("a", 3), ("b", 1)]);
        let candidates = vec![worker("a", 0), worker("b", 0)];

        let picks: Vec<String> = (0..8)
            .map(|_| pick(&selector, RequestClass::Read, &candidates))
            .collect();
        assert_eq!(picks.iter().filter(|id| *id == "a").count(), 6);
        assert_eq!(picks.iter().filter(|id| *id == "b").count(), 2);
        // smooth: never more than three of the heavy instance in a row
        assert_eq!(&picks[..4], &["a", "a", "b", "a"]);
    }

    #[test]
    fn test_weighted_falls_back_without_weights() {
        let selector = selector(LoadBalancingAlgorithm::Weighted, &[("a", 5)]);
        let candidates = vec![worker("a", 0), worker("b", 0)];
        let picks: Vec<String> = (0..2)
            .map(|_| pick(&selector, RequestClass::Read, &candidates))
            .collect();
        assert_eq!(picks, vec!["a", "b"]);
    }

    #[test]
    fn test_open_instance_circuit_filtered() {
        let selector = selector(LoadBalancingAlgorithm::RoundRobin, &[]);
        let breaker = selector.breakers.register(
            "a",
            CircuitBreakerConfig::new(1, Duration::from_secs(60)),
            Duration::from_secs(10),
        );
        breaker.force_open();

        let candidates = vec![worker("a", 0), worker("b", 0)];
        for _ in 0..3 {
            assert_eq!(pick(&selector, RequestClass::Read, &candidates), "b");
        }

        let err = selector
            .select(RequestClass::Read, &[worker("a", 0)])
            .unwrap_err();
        assert!(err.is_retryable());
    }

    #[test]
    fn test_open_role_dependency_excludes_its_instances() {
        let config = LoadSelectorConfig {
            master_dependency: Some("database_primary".to_string()),
            worker_dependency: Some("database_read_replica".to_string()),
            ..LoadSelectorConfig::default()
        };
        let breakers = Arc::new(CircuitBreakerManager::new(Arc::new(
            ManualClock::starting_now(),
        )));
        let replica = breakers.register(
            "database_read_replica",
            CircuitBreakerConfig::new(1, Duration::from_secs(60)),
            Duration::from_secs(10),
        );
        let selector = LoadSelector::new(&config, Arc::clone(&breakers));
        let master = ServiceInstance::new("primary", InstanceRole::Master, "10.0.0.2", 5432);
        let candidates = vec![worker("a", 0), master, worker("b", 0)];

        assert_eq!(pick(&selector, RequestClass::Read, &candidates), "a");

        // replica down: reads fall back to the master
        replica.force_open();
        for _ in 0..3 {
            assert_eq!(pick(&selector, RequestClass::Read, &candidates), "primary");
        }
        assert!(selector
            .select(RequestClass::Read, &[worker("a", 0), worker("b", 0)])
            .is_err());
    }
}
