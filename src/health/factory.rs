//! Chooses a concrete probe from a dependency's kind and endpoint scheme.

use std::sync::Arc;
use tracing::debug;

use super::http::HttpProbe;
use super::postgres::PostgresProbe;
use super::probe::HealthProbe;
use super::tcp::{socket_address, TcpProbe};
use crate::config::DependencyConfig;
use crate::error::{ControlPlaneError, Result};
use crate::models::DependencyKind;

#[derive(Debug)]
pub struct ProbeFactory;

impl ProbeFactory {
    /// | kind     | scheme                | probe                       |
    /// |----------|-----------------------|-----------------------------|
    /// | database | `postgres(ql)://`     | [`PostgresProbe`]           |
    /// | cache    | `redis(s)://`         | `RedisProbe` (`cache-redis`) |
    /// | external | `http(s)://`          | [`HttpProbe`]               |
    /// | any      | other with host:port  | [`TcpProbe`]                |
    pub fn for_dependency(dependency: &DependencyConfig) -> Result<Arc<dyn HealthProbe>> {
        let scheme = dependency
            .endpoint
            .split_once("://")
            .map(|(scheme, _)| scheme.to_ascii_lowercase());

        let probe: Arc<dyn HealthProbe> = match (dependency.kind, scheme.as_deref()) {
            (DependencyKind::Database, Some("postgres" | "postgresql")) => Arc::new(
                PostgresProbe::connect_lazy(&dependency.endpoint, dependency.probe_timeout())
                    .map_err(|e| setup_error(dependency, e))?,
            ),
            #[cfg(feature = "cache-redis")]
            (DependencyKind::Cache, Some("redis" | "rediss")) => Arc::new(
                super::redis::RedisProbe::new(&dependency.endpoint)
                    .map_err(|e| setup_error(dependency, e))?,
            ),
            (_, Some("http" | "https")) => {
                Arc::new(HttpProbe::new().map_err(|e| setup_error(dependency, e))?)
            }
            _ => {
                if socket_address(&dependency.endpoint).is_none() {
                    return Err(ControlPlaneError::ProbeSetup {
                        dependency_id: dependency.id.clone(),
                        reason: format!(
                            "no probe for {} endpoint '{}'",
                            dependency.kind,
                            crate::config::loader::redact_endpoint(&dependency.endpoint)
                        ),
                    });
                }
                Arc::new(TcpProbe::new())
            }
        };

        debug!(
            dependency_id = %dependency.id,
            probe = probe.name(),
            "Health probe selected"
        );
        Ok(probe)
    }
}

fn setup_error(dependency: &DependencyConfig, error: impl std::fmt::Display) -> ControlPlaneError {
    ControlPlaneError::ProbeSetup {
        dependency_id: dependency.id.clone(),
        reason: error.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_probe_selection_by_scheme() {
        let database = DependencyConfig::new(
            "database_primary",
            DependencyKind::Database,
            "postgresql://app@db:5432/app",
        );
        assert_eq!(ProbeFactory::for_dependency(&database).unwrap().name(), "postgres");

        let external = DependencyConfig::new(
            "external_api",
            DependencyKind::External,
            "https://api.example.com/health",
        );
        assert_eq!(ProbeFactory::for_dependency(&external).unwrap().name(), "http");

        let raw = DependencyConfig::new("queue", DependencyKind::External, "mq.internal:5672");
        assert_eq!(ProbeFactory::for_dependency(&raw).unwrap().name(), "tcp");
    }

    #[cfg(feature = "cache-redis")]
    #[test]
    fn test_redis_scheme_uses_ping() {
        let cache = DependencyConfig::new("redis_cache", DependencyKind::Cache, "redis://cache:6379");
        assert_eq!(ProbeFactory::for_dependency(&cache).unwrap().name(), "redis");
    }

    #[test]
    fn test_unprobeable_endpoint_rejected() {
        let bad = DependencyConfig::new("mystery", DependencyKind::Cache, "just-a-name");
        let err = ProbeFactory::for_dependency(&bad).unwrap_err();
        assert!(matches!(err, ControlPlaneError::ProbeSetup { .. }));
    }
}
