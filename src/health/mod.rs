//! # Health Probes
//!
//! Liveness checks for outbound dependencies. The coordinator owns a probe per
//! dependency and runs them through [`ProbeRunner`], which enforces timeouts and
//! converts every outcome into a [`ProbeResult`](crate::models::ProbeResult).

pub mod factory;
pub mod http;
pub mod postgres;
pub mod probe;
#[cfg(feature = "cache-redis")]
pub mod redis;
pub mod tcp;

pub use factory::ProbeFactory;
pub use http::HttpProbe;
pub use postgres::PostgresProbe;
pub use probe::{HealthProbe, ProbeFailure, ProbeRunner};
#[cfg(feature = "cache-redis")]
pub use redis::RedisProbe;
pub use tcp::TcpProbe;
