//! # Resilience Module
//!
//! Circuit breakers that isolate failing dependencies. Breakers are driven by health
//! probe results rather than by wrapping calls: the coordinator feeds outcomes in, and
//! request paths only ask [`CircuitBreakerManager::is_available`].
//!
//! ## Usage
//!
//! ```rust
//! use bulwark_core::clock::system_clock;
//! use bulwark_core::models::{ProbeErrorKind, ProbeResult};
//! use bulwark_core::resilience::{CircuitBreaker, CircuitBreakerConfig, CircuitStatus};
//! use std::time::Duration;
//!
//! let clock = system_clock();
//! let breaker = CircuitBreaker::new(
//!     "database_primary",
//!     CircuitBreakerConfig::new(1, Duration::from_secs(60)),
//!     Duration::from_secs(10),
//!     clock.clone(),
//! );
//!
//! breaker.record_result(&ProbeResult::failure(
//!     "database_primary",
//!     clock.now(),
//!     12,
//!     ProbeErrorKind::Connection,
//!     "connection refused",
//! ));
//! assert_eq!(breaker.status(), CircuitStatus::Open);
//! assert!(!breaker.is_available());
//! ```

pub mod circuit_breaker;
pub mod config;
pub mod manager;
pub mod metrics;

pub use circuit_breaker::{CircuitBreaker, CircuitState, CircuitStatus, Transition};
pub use config::CircuitBreakerConfig;
pub use manager::CircuitBreakerManager;
pub use metrics::{CircuitBreakerMetrics, SystemCircuitBreakerMetrics};
