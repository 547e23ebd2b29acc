//! # Service Registry
//!
//! In-memory registry of master and worker instances keyed by `instance_id`.
//!
//! Each entry is guarded by its own map shard, so a heartbeat never waits on an
//! unrelated instance. Reads copy entries out; no caller holds a guard across an await.
//! Stale entries are hidden from [`ServiceRegistry::list_active`] immediately and removed
//! by [`ServiceRegistry::evict_stale`], which is the only removal path.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::clock::{to_chrono, Clock};
use crate::config::RegistryConfig;
use crate::logging::log_registry_operation;
use crate::models::{InstanceLoad, InstanceRole, ServiceInstance};

/// Result of a heartbeat
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeartbeatOutcome {
    Accepted,
    /// No such instance; the caller should register again
    UnknownInstance,
}

#[derive(Debug)]
pub struct ServiceRegistry {
    instances: DashMap<String, ServiceInstance>,
    stale_threshold: Duration,
    clock: Arc<dyn Clock>,
}

impl ServiceRegistry {
    pub fn new(config: &RegistryConfig, clock: Arc<dyn Clock>) -> Self {
        Self::with_stale_threshold(config.stale_threshold(), clock)
    }

    pub fn with_stale_threshold(stale_threshold: Duration, clock: Arc<dyn Clock>) -> Self {
        debug!(
            stale_threshold_ms = stale_threshold.as_millis() as u64,
            "Service registry initialized"
        );
        Self {
            instances: DashMap::new(),
            stale_threshold,
            clock,
        }
    }

    pub fn stale_threshold(&self) -> Duration {
        self.stale_threshold
    }

    fn is_fresh(&self, instance: &ServiceInstance, now: DateTime<Utc>) -> bool {
        now - instance.last_heartbeat_at <= to_chrono(self.stale_threshold)
    }

    /// Insert or refresh an instance. Returns `true` when the id was new.
    ///
    /// Re-registering replaces every field and counts as a heartbeat.
    pub fn register(&self, mut instance: ServiceInstance) -> bool {
        instance.last_heartbeat_at = self.clock.now();
        let instance_id = instance.instance_id.clone();
        let role = instance.role;
        let previous = self.instances.insert(instance_id.clone(), instance);

        let created = previous.is_none();
        log_registry_operation(
            if created { "register" } else { "re-register" },
            &instance_id,
            Some(role),
            self.instances.len(),
        );
        created
    }

    /// Refresh liveness and optionally the reported load
    pub fn heartbeat(&self, instance_id: &str, load: Option<InstanceLoad>) -> HeartbeatOutcome {
        let now = self.clock.now();
        match self.instances.get_mut(instance_id) {
            Some(mut entry) => {
                entry.last_heartbeat_at = now;
                if let Some(load) = load {
                    entry.current_load = load;
                }
                HeartbeatOutcome::Accepted
            }
            None => {
                warn!(
                    instance_id = instance_id,
                    "💔 Heartbeat from unknown instance ignored, re-registration required"
                );
                HeartbeatOutcome::UnknownInstance
            }
        }
    }

    /// Fresh instances matching the optional filters, ordered by `instance_id`
    pub fn list_active(
        &self,
        role: Option<InstanceRole>,
        capability: Option<&str>,
    ) -> Vec<ServiceInstance> {
        let now = self.clock.now();
        let mut active: Vec<ServiceInstance> = self
            .instances
            .iter()
            .filter(|entry| self.is_fresh(entry.value(), now))
            .filter(|entry| role.map_or(true, |r| entry.role == r))
            .filter(|entry| capability.map_or(true, |c| entry.has_capability(c)))
            .map(|entry| entry.value().clone())
            .collect();
        active.sort_by(|a, b| a.instance_id.cmp(&b.instance_id));
        active
    }

    /// Remove every instance past the stale threshold; returns the evicted ids, sorted
    pub fn evict_stale(&self) -> Vec<String> {
        let now = self.clock.now();
        let mut evicted = Vec::new();

        self.instances.retain(|instance_id, instance| {
            let keep = self.is_fresh(instance, now);
            if !keep {
                evicted.push(instance_id.clone());
            }
            keep
        });

        evicted.sort();
        if !evicted.is_empty() {
            info!(
                evicted = ?evicted,
                remaining = self.instances.len(),
                "🧹 Evicted stale service instances"
            );
        }
        evicted
    }

    /// Copy of one entry, fresh or not
    pub fn get(&self, instance_id: &str) -> Option<ServiceInstance> {
        self.instances.get(instance_id).map(|entry| entry.value().clone())
    }

    /// Entries currently held, including stale ones awaiting eviction
    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }
}
