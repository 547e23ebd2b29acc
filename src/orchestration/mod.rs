//! # Control Plane Orchestration
//!
//! Ties the individual components into one running control plane.
//!
//! ## Core Components
//!
//! - **ControlPlaneCoordinator**: owns the breakers, registry, selector, advisor and
//!   health monitor, and drives them from independent periodic ticks
//! - **HealthMonitor**: folds probe results and circuit states into a [`SystemStatus`]
//! - **ScalingAdvisor**: cooldown-aware scale-up / scale-down recommendations
//! - **LoadSource / SampleBuffer**: host utilisation sampling for the advisor
//! - **ControlPlaneSnapshot / SnapshotSink**: the read model and its optional export
//!
//! Nothing in this module sits on the request path except the read methods of the
//! coordinator, which never perform I/O.

pub mod coordinator;
pub mod snapshot;

pub use coordinator::collector::{HostLoad, LoadSource, SampleBuffer, StaticLoadSource, SystemLoadSource};
pub use coordinator::monitor::{DegradationLevel, HealthMonitor, SystemStatus};
pub use coordinator::scaling::{propose, Proposal, ScalingAdvisor};
pub use coordinator::{ControlPlaneCoordinator, ControlPlaneCoordinatorBuilder, HealthRoundReport};
pub use snapshot::{
    ControlPlaneSnapshot, InMemorySnapshotSink, LoggingSnapshotSink, PgSnapshotSink, SnapshotSink,
};
