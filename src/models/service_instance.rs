use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Role a service instance plays in the deployment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstanceRole {
    /// Primary; the only role that accepts writes
    Master,
    /// Replica / worker; serves reads only
    Worker,
}

impl fmt::Display for InstanceRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InstanceRole::Master => write!(f, "master"),
            InstanceRole::Worker => write!(f, "worker"),
        }
    }
}

/// Class of request being routed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestClass {
    Read,
    Write,
}

impl RequestClass {
    /// Writes always go to the master; reads may use any role
    pub fn accepts(&self, role: InstanceRole) -> bool {
        match self {
            RequestClass::Write => role == InstanceRole::Master,
            RequestClass::Read => true,
        }
    }
}

impl fmt::Display for RequestClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestClass::Read => write!(f, "read"),
            RequestClass::Write => write!(f, "write"),
        }
    }
}

/// Load an instance reports with each heartbeat
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct InstanceLoad {
    pub active_connections: u32,
    pub cpu_percent: f64,
    pub memory_percent: f64,
}

impl InstanceLoad {
    pub fn with_connections(active_connections: u32) -> Self {
        Self {
            active_connections,
            ..Default::default()
        }
    }
}

/// A registered master or worker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceInstance {
    pub instance_id: String,
    pub role: InstanceRole,
    pub host: String,
    pub port: u16,
    pub capabilities: BTreeSet<String>,
    pub last_heartbeat_at: DateTime<Utc>,
    pub current_load: InstanceLoad,
}

impl ServiceInstance {
    /// New instance; `last_heartbeat_at` is overwritten by the registry on registration
    pub fn new(instance_id: impl Into<String>, role: InstanceRole, host: impl Into<String>, port: u16) -> Self {
        Self {
            instance_id: instance_id.into(),
            role,
            host: host.into(),
            port,
            capabilities: BTreeSet::new(),
            last_heartbeat_at: Utc::now(),
            current_load: InstanceLoad::default(),
        }
    }

    pub fn with_capability(mut self, capability: impl Into<String>) -> Self {
        self.capabilities.insert(capability.into());
        self
    }

    pub fn with_load(mut self, load: InstanceLoad) -> Self {
        self.current_load = load;
        self
    }

    pub fn has_capability(&self, capability: &str) -> bool {
        self.capabilities.contains(capability)
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_writes_only_accept_master() {
        assert!(RequestClass::Write.accepts(InstanceRole::Master));
        assert!(!RequestClass::Write.accepts(InstanceRole::Worker));
        assert!(RequestClass::Read.accepts(InstanceRole::Worker));
        assert!(RequestClass::Read.accepts(InstanceRole::Master));
    }

    #[test]
    fn test_capabilities_are_a_set() {
        let instance = ServiceInstance::new("w-1", InstanceRole::Worker, "10.0.0.5", 8080)
            .with_capability("reports")
            .with_capability("reports");
        assert_eq!(instance.capabilities.len(), 1);
        assert!(instance.has_capability("reports"));
        assert_eq!(instance.address(), "10.0.0.5:8080");
    }
}
