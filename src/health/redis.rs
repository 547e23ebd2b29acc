//! Redis `PING` probe.
//!
//! Requires the `cache-redis` feature flag.

use async_trait::async_trait;

use super::probe::{HealthProbe, ProbeFailure};
use crate::models::Dependency;

#[derive(Clone)]
pub struct RedisProbe {
    client: redis::Client,
}

impl std::fmt::Debug for RedisProbe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisProbe")
            .field("client", &"redis::Client")
            .finish()
    }
}

impl RedisProbe {
    /// Parse the URL only; connections are opened per check
    pub fn new(endpoint: &str) -> Result<Self, redis::RedisError> {
        Ok(Self {
            client: redis::Client::open(endpoint)?,
        })
    }
}

#[async_trait]
impl HealthProbe for RedisProbe {
    fn name(&self) -> &'static str {
        "redis"
    }

    async fn check(&self, _dependency: &Dependency) -> Result<(), ProbeFailure> {
        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| ProbeFailure::Connection(format!("Redis connect failed: {e}")))?;

        let pong: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| ProbeFailure::Unhealthy(format!("Redis PING failed: {e}")))?;

        if pong == "PONG" {
            Ok(())
        } else {
            Err(ProbeFailure::Unhealthy(format!("unexpected PING reply: {pong}")))
        }
    }
}
