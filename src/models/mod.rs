//! # Control Plane Models
//!
//! Plain data shared between the probes, the circuit breakers, the registry and the
//! coordinator snapshot. Everything here is `Serialize` so snapshots can be exported
//! as-is by reporting collaborators.

pub mod dependency;
pub mod load_sample;
pub mod probe_result;
pub mod scaling_event;
pub mod service_instance;

pub use dependency::{Dependency, DependencyKind};
pub use load_sample::LoadSample;
pub use probe_result::{ProbeErrorKind, ProbeResult};
pub use scaling_event::{ScalingAction, ScalingEvent, TriggerType};
pub use service_instance::{InstanceLoad, InstanceRole, RequestClass, ServiceInstance};
