#![allow(clippy::doc_markdown)] // Allow technical terms like PostgreSQL, SQLx in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Bulwark Core
//!
//! Scalability and resilience control plane for a web application that depends on a
//! primary database, read replicas, several Redis instances and external HTTP APIs.
//!
//! ## Overview
//!
//! Bulwark sits beside the application, not in front of it. It periodically probes each
//! outbound dependency, keeps a circuit breaker per dependency so callers can fail fast,
//! tracks the master and worker instances serving traffic, picks a backend for each
//! request, and recommends scale-up / scale-down actions from recent load. Request
//! middleware only ever reads from it.
//!
//! ## Module Organization
//!
//! - [`health`] - Pluggable liveness probes (TCP, HTTP, PostgreSQL, Redis)
//! - [`resilience`] - Per-dependency circuit breakers and their metrics
//! - [`registry`] - Heartbeat-driven service instance registry
//! - [`services`] - Backend selection (round robin, least connections, weighted)
//! - [`orchestration`] - Coordinator tick loops, health status, scaling advisor, snapshots
//! - [`config`] - Layered YAML + environment configuration
//! - [`models`] - Plain data shared by every component
//! - [`clock`] - Injectable wall clock
//! - [`error`] - Structured error handling
//! - [`logging`] - Structured logging setup and event helpers
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use bulwark_core::config::ConfigLoader;
//! use bulwark_core::models::RequestClass;
//! use bulwark_core::orchestration::ControlPlaneCoordinator;
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let coordinator = ControlPlaneCoordinator::new(ConfigLoader::load()?)?;
//! coordinator.start()?;
//!
//! if coordinator.is_available("database_primary") {
//!     let backend = coordinator.pick_backend(RequestClass::Write, None)?;
//!     println!("routing write to {}", backend.address());
//! }
//!
//! coordinator.stop(Duration::from_secs(5)).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Testing
//!
//! ```bash
//! cargo test --lib    # Unit tests
//! cargo test          # Unit, integration and property tests
//! ```

pub mod clock;
pub mod config;
pub mod constants;
pub mod error;
pub mod health;
pub mod logging;
pub mod models;
pub mod orchestration;
pub mod registry;
pub mod resilience;
pub mod services;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{ConfigLoader, ConfigurationError, ControlPlaneConfig, DependencyConfig};
pub use error::{ControlPlaneError, Result};
pub use health::{HealthProbe, ProbeFailure, ProbeFactory, ProbeRunner};
pub use models::{
    Dependency, DependencyKind, InstanceLoad, InstanceRole, LoadSample, ProbeResult,
    RequestClass, ScalingAction, ScalingEvent, ServiceInstance, TriggerType,
};
pub use orchestration::{
    ControlPlaneCoordinator, ControlPlaneSnapshot, HealthRoundReport, SnapshotSink, SystemStatus,
};
pub use registry::{HeartbeatOutcome, ServiceRegistry};
pub use resilience::{CircuitBreaker, CircuitBreakerManager, CircuitState, CircuitStatus};
pub use services::{LoadBalancingAlgorithm, LoadSelector};
