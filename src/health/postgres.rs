//! PostgreSQL liveness probe (`SELECT 1` over a lazily connected pool).

use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::time::Duration;

use super::probe::{HealthProbe, ProbeFailure};
use crate::models::Dependency;

#[derive(Debug, Clone)]
pub struct PostgresProbe {
    pool: PgPool,
}

impl PostgresProbe {
    /// Build without connecting; the first check opens the connection
    pub fn connect_lazy(endpoint: &str, acquire_timeout: Duration) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(1)
            .min_connections(0)
            .acquire_timeout(acquire_timeout)
            .connect_lazy(endpoint)?;
        Ok(Self { pool })
    }

    /// Probe through an existing application pool
    pub fn with_pool(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn classify(error: sqlx::Error) -> ProbeFailure {
    match error {
        sqlx::Error::PoolTimedOut => ProbeFailure::Timeout { timeout_ms: 0 },
        sqlx::Error::Io(e) => ProbeFailure::Connection(e.to_string()),
        sqlx::Error::Tls(e) => ProbeFailure::Connection(e.to_string()),
        sqlx::Error::PoolClosed => ProbeFailure::Connection("pool closed".to_string()),
        other => ProbeFailure::Unhealthy(other.to_string()),
    }
}

#[async_trait]
impl HealthProbe for PostgresProbe {
    fn name(&self) -> &'static str {
        "postgres"
    }

    async fn check(&self, _dependency: &Dependency) -> Result<(), ProbeFailure> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map(|_| ())
            .map_err(classify)
    }
}
