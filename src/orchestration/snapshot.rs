//! # Control Plane Snapshots
//!
//! [`ControlPlaneSnapshot`] is the single read model handed to request middleware and
//! reporting collaborators. It is plain data: building one never touches storage.
//!
//! Persistence is an injected [`SnapshotSink`]; the coordinator only calls it from the
//! export tick.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::collections::VecDeque;
use tracing::info;
use uuid::Uuid;

use crate::error::Result;
use crate::models::{LoadSample, ScalingEvent, ServiceInstance};
use crate::orchestration::coordinator::monitor::{DegradationLevel, SystemStatus};
use crate::resilience::{CircuitState, CircuitStatus};

/// Point-in-time copy of the control plane state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlPlaneSnapshot {
    pub coordinator_id: Uuid,
    pub generated_at: DateTime<Utc>,
    /// Ordered by dependency id
    pub circuits: Vec<CircuitState>,
    /// Active (non-stale) instances ordered by instance id
    pub instances: Vec<ServiceInstance>,
    pub last_scaling_event: Option<ScalingEvent>,
    pub system_status: SystemStatus,
    /// Fraction of circuits closed
    pub health_score: f64,
    pub degradation_level: DegradationLevel,
    pub latest_sample: Option<LoadSample>,
}

impl ControlPlaneSnapshot {
    pub fn circuit(&self, dependency_id: &str) -> Option<&CircuitState> {
        self.circuits
            .iter()
            .find(|circuit| circuit.dependency_id == dependency_id)
    }

    /// Dependencies whose circuit is open or half-open
    pub fn unavailable_dependencies(&self) -> Vec<&str> {
        self.circuits
            .iter()
            .filter(|circuit| circuit.status != CircuitStatus::Closed)
            .map(|circuit| circuit.dependency_id.as_str())
            .collect()
    }
}

/// Destination for exported snapshots
#[async_trait]
pub trait SnapshotSink: Send + Sync + std::fmt::Debug {
    async fn export(&self, snapshot: &ControlPlaneSnapshot) -> Result<()>;
}

/// Emits a one-line summary per snapshot through `tracing`
#[derive(Debug, Default)]
pub struct LoggingSnapshotSink;

#[async_trait]
impl SnapshotSink for LoggingSnapshotSink {
    async fn export(&self, snapshot: &ControlPlaneSnapshot) -> Result<()> {
        info!(
            coordinator_id = %snapshot.coordinator_id,
            system_status = snapshot.system_status.label(),
            health_score = snapshot.health_score,
            degradation_level = ?snapshot.degradation_level,
            circuits = snapshot.circuits.len(),
            unavailable = ?snapshot.unavailable_dependencies(),
            instances = snapshot.instances.len(),
            "📊 Control plane snapshot"
        );
        Ok(())
    }
}

/// Keeps the most recent snapshots in memory
#[derive(Debug)]
pub struct InMemorySnapshotSink {
    capacity: usize,
    snapshots: Mutex<VecDeque<ControlPlaneSnapshot>>,
}

impl InMemorySnapshotSink {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            snapshots: Mutex::new(VecDeque::new()),
        }
    }

    pub fn snapshots(&self) -> Vec<ControlPlaneSnapshot> {
        self.snapshots.lock().iter().cloned().collect()
    }

    pub fn latest(&self) -> Option<ControlPlaneSnapshot> {
        self.snapshots.lock().back().cloned()
    }
}

#[async_trait]
impl SnapshotSink for InMemorySnapshotSink {
    async fn export(&self, snapshot: &ControlPlaneSnapshot) -> Result<()> {
        let mut snapshots = self.snapshots.lock();
        if snapshots.len() == self.capacity {
            snapshots.pop_front();
        }
        snapshots.push_back(snapshot.clone());
        Ok(())
    }
}

/// Appends snapshots to a PostgreSQL table as JSONB
#[derive(Debug, Clone)]
pub struct PgSnapshotSink {
    pool: PgPool,
}

impl PgSnapshotSink {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create the history table when missing
    pub async fn ensure_table(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS control_plane_snapshots (
                id BIGSERIAL PRIMARY KEY,
                coordinator_id UUID NOT NULL,
                generated_at TIMESTAMPTZ NOT NULL,
                system_status TEXT NOT NULL,
                health_score DOUBLE PRECISION NOT NULL,
                payload JSONB NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl SnapshotSink for PgSnapshotSink {
    async fn export(&self, snapshot: &ControlPlaneSnapshot) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO control_plane_snapshots
                (coordinator_id, generated_at, system_status, health_score, payload)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(snapshot.coordinator_id)
        .bind(snapshot.generated_at)
        .bind(snapshot.system_status.label())
        .bind(snapshot.health_score)
        .bind(sqlx::types::Json(snapshot))
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
