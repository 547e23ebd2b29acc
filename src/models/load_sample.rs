use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Aggregate load observed by the periodic collector
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LoadSample {
    pub timestamp: DateTime<Utc>,
    pub cpu_percent: f64,
    pub memory_percent: f64,
    pub active_connections: u64,
}

impl LoadSample {
    pub fn new(timestamp: DateTime<Utc>, cpu_percent: f64, memory_percent: f64, active_connections: u64) -> Self {
        Self {
            timestamp,
            cpu_percent,
            memory_percent,
            active_connections,
        }
    }
}
