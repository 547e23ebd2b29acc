//! # Control Plane Constants
//!
//! Default thresholds, intervals and well-known dependency identifiers shared by the
//! configuration layer and the components that fall back to them.

/// Circuit breaker defaults
pub mod circuit {
    /// Consecutive failures before a closed circuit opens
    pub const DEFAULT_FAILURE_THRESHOLD: u32 = 5;
    /// Time an open circuit waits before allowing a trial probe
    pub const DEFAULT_COOLDOWN_MS: u64 = 60_000;
    /// Upper bound accepted by validation
    pub const MAX_COOLDOWN_MS: u64 = 3_600_000;
    /// Upper bound accepted by validation
    pub const MAX_FAILURE_THRESHOLD: u32 = 100;
}

/// Probe timeouts per dependency kind
pub mod probe {
    pub const EXTERNAL_TIMEOUT_MS: u64 = 10_000;
    pub const DATABASE_TIMEOUT_MS: u64 = 5_000;
    pub const CACHE_TIMEOUT_MS: u64 = 2_000;
    /// Default latency budget when a dependency declares none
    pub const DEFAULT_LATENCY_BUDGET_MS: u64 = 1_000;
}

/// Service registry defaults
pub mod registry {
    pub const DEFAULT_HEARTBEAT_INTERVAL_MS: u64 = 10_000;
    /// Stale threshold is this multiple of the heartbeat interval unless configured
    pub const STALE_THRESHOLD_MULTIPLIER: u64 = 2;
}

/// Scaling advisor defaults
pub mod scaling {
    pub const DEFAULT_TARGET: &str = "application";
    pub const DEFAULT_WINDOW_SIZE: usize = 5;
    pub const DEFAULT_CPU_SCALE_UP_PERCENT: f64 = 80.0;
    pub const DEFAULT_MEMORY_SCALE_UP_PERCENT: f64 = 85.0;
    pub const DEFAULT_CPU_SCALE_DOWN_PERCENT: f64 = 30.0;
    pub const DEFAULT_MEMORY_SCALE_DOWN_PERCENT: f64 = 40.0;
    pub const DEFAULT_COOLDOWN_MS: u64 = 600_000;
    pub const DEFAULT_HISTORY_LIMIT: usize = 100;
}

/// Coordinator tick defaults
pub mod coordinator {
    pub const DEFAULT_HEALTH_CHECK_INTERVAL_MS: u64 = 30_000;
    pub const DEFAULT_EVICTION_INTERVAL_MS: u64 = 30_000;
    pub const DEFAULT_SCALING_INTERVAL_MS: u64 = 60_000;
    pub const DEFAULT_SAMPLE_INTERVAL_MS: u64 = 30_000;
    pub const DEFAULT_SAMPLE_CAPACITY: usize = 120;
    pub const DEFAULT_MAX_CONCURRENT_PROBES: usize = 8;
    pub const DEFAULT_PROBE_HISTORY_LIMIT: usize = 500;
    /// Tick work ceiling as a multiple of the longest probe timeout
    pub const TICK_CEILING_MULTIPLIER: u32 = 2;
}

/// Dependency identifiers the original deployment monitors
pub mod dependencies {
    pub const DATABASE_PRIMARY: &str = "database_primary";
    pub const DATABASE_READ_REPLICA: &str = "database_read_replica";
    pub const REDIS_PRIMARY: &str = "redis_primary";
    pub const REDIS_CACHE: &str = "redis_cache";
    pub const REDIS_SESSION: &str = "redis_session";
    pub const EXTERNAL_API: &str = "external_api";
}
