//! HTTP health endpoint probe for external APIs.

use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use super::probe::{HealthProbe, ProbeFailure};
use crate::models::Dependency;

/// Issues a GET against the endpoint. 2xx and 3xx count as healthy; redirects are not
/// followed.
#[derive(Debug, Clone)]
pub struct HttpProbe {
    client: Client,
}

impl HttpProbe {
    pub fn new() -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .user_agent(concat!("bulwark-health-probe/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }

    /// Reuse an existing client (shared connection pool)
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

fn classify(error: reqwest::Error) -> ProbeFailure {
    if error.is_timeout() {
        ProbeFailure::Timeout { timeout_ms: 0 }
    } else if error.is_builder() {
        ProbeFailure::Internal(error.to_string())
    } else {
        ProbeFailure::Connection(error.to_string())
    }
}

#[async_trait]
impl HealthProbe for HttpProbe {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn check(&self, dependency: &Dependency) -> Result<(), ProbeFailure> {
        let response = self
            .client
            .get(&dependency.endpoint)
            .send()
            .await
            .map_err(classify)?;

        let status = response.status();
        debug!(
            dependency_id = %dependency.id,
            status = status.as_u16(),
            "HTTP health endpoint responded"
        );

        if status.is_success() || status.is_redirection() {
            Ok(())
        } else {
            Err(ProbeFailure::Unhealthy(format!("HTTP {}", status.as_u16())))
        }
    }
}
