//! Plain TCP reachability probe.

use async_trait::async_trait;
use tokio::net::TcpStream;
use tracing::debug;

use super::probe::{HealthProbe, ProbeFailure};
use crate::models::Dependency;

/// Healthy when a TCP connection to the endpoint's `host:port` can be opened
#[derive(Debug, Default, Clone)]
pub struct TcpProbe;

impl TcpProbe {
    pub fn new() -> Self {
        Self
    }
}

/// `scheme://user@host:port/path` or `host:port` reduced to `host:port`
pub fn socket_address(endpoint: &str) -> Option<String> {
    let without_scheme = endpoint
        .find("://")
        .map_or(endpoint, |index| &endpoint[index + 3..]);
    let authority = without_scheme
        .split(['/', '?'])
        .next()
        .unwrap_or(without_scheme);
    let host_port = authority.rsplit('@').next().unwrap_or(authority);

    let (host, port) = host_port.rsplit_once(':')?;
    if host.is_empty() || port.parse::<u16>().is_err() {
        return None;
    }
    Some(host_port.to_string())
}

#[async_trait]
impl HealthProbe for TcpProbe {
    fn name(&self) -> &'static str {
        "tcp"
    }

    async fn check(&self, dependency: &Dependency) -> Result<(), ProbeFailure> {
        let address = socket_address(&dependency.endpoint).ok_or_else(|| {
            ProbeFailure::Internal(format!(
                "endpoint '{}' has no host:port",
                dependency.endpoint
            ))
        })?;

        debug!("Testing TCP connection to {}", address);

        TcpStream::connect(&address)
            .await
            .map(|_stream| ())
            .map_err(|e| ProbeFailure::Connection(format!("{address}: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DependencyKind;
    use tokio::net::TcpListener;

    #[test]
    fn test_socket_address_parsing() {
        assert_eq!(
            socket_address("redis://:secret@cache.internal:6379/0").as_deref(),
            Some("cache.internal:6379")
        );
        assert_eq!(socket_address("10.0.0.5:5432").as_deref(), Some("10.0.0.5:5432"));
        assert_eq!(socket_address("https://api.example.com/health"), None);
        assert_eq!(socket_address("tcp://host:notaport"), None);
    }

    #[tokio::test]
    async fn test_connects_to_listening_socket() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        let dependency = Dependency::new(
            "cache",
            DependencyKind::Cache,
            format!("tcp://{address}"),
            100,
        );

        assert!(TcpProbe::new().check(&dependency).await.is_ok());
    }

    #[tokio::test]
    async fn test_closed_port_is_connection_failure() {
        // Bind then drop to get a port nobody listens on
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        drop(listener);

        let dependency = Dependency::new("cache", DependencyKind::Cache, address.to_string(), 100);
        let failure = TcpProbe::new().check(&dependency).await.unwrap_err();
        assert!(matches!(failure, ProbeFailure::Connection(_)));
    }
}
