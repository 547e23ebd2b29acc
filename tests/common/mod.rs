pub mod mock_probe;
pub mod strategies;

#[allow(unused_imports)]
pub use mock_probe::*;

use bulwark_core::config::{ControlPlaneConfig, DependencyConfig, LoadSelectorConfig};
use bulwark_core::models::DependencyKind;

/// The six dependencies of a typical deployment, with default thresholds; masters are
/// gated by the primary database and workers by the read replica
#[allow(dead_code)]
pub fn standard_config() -> ControlPlaneConfig {
    ControlPlaneConfig {
        load_selector: LoadSelectorConfig {
            master_dependency: Some("database_primary".to_string()),
            worker_dependency: Some("database_read_replica".to_string()),
            ..LoadSelectorConfig::default()
        },
        dependencies: vec![
            DependencyConfig::new("database_primary", DependencyKind::Database, "postgres://db-primary:5432/app"),
            DependencyConfig::new("database_read_replica", DependencyKind::Database, "postgres://db-replica:5432/app"),
            DependencyConfig::new("redis_primary", DependencyKind::Cache, "redis://redis:6379/0"),
            DependencyConfig::new("redis_cache", DependencyKind::Cache, "redis://redis:6379/1"),
            DependencyConfig::new("redis_session", DependencyKind::Cache, "redis://redis:6379/2"),
            DependencyConfig::new("external_api", DependencyKind::External, "https://api.example.com/health"),
        ],
        ..ControlPlaneConfig::default()
    }
}
