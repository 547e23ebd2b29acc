//! # Registry Infrastructure
//!
//! Tracks the service instances (masters and workers) that backends are selected from.
//!
//! ## Usage
//!
//! ```rust
//! use bulwark_core::clock::system_clock;
//! use bulwark_core::config::RegistryConfig;
//! use bulwark_core::models::{InstanceRole, ServiceInstance};
//! use bulwark_core::registry::{HeartbeatOutcome, ServiceRegistry};
//!
//! let registry = ServiceRegistry::new(&RegistryConfig::default(), system_clock());
//! registry.register(ServiceInstance::new("worker-a", InstanceRole::Worker, "10.0.0.7", 8080));
//!
//! assert_eq!(registry.heartbeat("worker-a", None), HeartbeatOutcome::Accepted);
//! assert_eq!(registry.list_active(Some(InstanceRole::Worker), None).len(), 1);
//! ```

pub mod service_registry;

pub use service_registry::{HeartbeatOutcome, ServiceRegistry};
