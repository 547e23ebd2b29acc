//! # Control Plane Coordinator
//!
//! [`ControlPlaneCoordinator`] owns every control-plane component and drives them from
//! independent periodic ticks:
//!
//! | tick      | default | work                                              |
//! |-----------|---------|---------------------------------------------------|
//! | health    | 30s     | probe dependencies, feed breakers, update status   |
//! | eviction  | 30s     | drop stale service instances                       |
//! | sample    | 30s     | record host load plus reported connections         |
//! | scaling   | 60s     | evaluate the scaling advisor                       |
//! | export    | off     | hand a snapshot to the configured sink             |
//!
//! Each tick runs as its own task under a time ceiling. A tick that panics or overruns
//! is logged and abandoned; the loop carries on with the next interval and the other
//! loops never notice. Shutdown cancels an in-flight tick and waits for it, so nothing
//! touches breaker or registry state once [`stop`](ControlPlaneCoordinator::stop) returns.
//!
//! The coordinator is constructed once and shared by handle (`Clone` is cheap). Request
//! paths use [`is_available`](ControlPlaneCoordinator::is_available),
//! [`pick_backend`](ControlPlaneCoordinator::pick_backend) and
//! [`snapshot`](ControlPlaneCoordinator::snapshot).

pub mod collector;
pub mod monitor;
pub mod scaling;


use futures::stream::{FuturesUnordered, StreamExt};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Semaphore};
use tokio::task::{AbortHandle, JoinHandle};
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::clock::{system_clock, Clock};
use crate::config::{ConfigurationError, ControlPlaneConfig};
use crate::constants::coordinator::TICK_CEILING_MULTIPLIER;
use crate::error::{ControlPlaneError, Result};
use crate::health::{HealthProbe, ProbeFactory, ProbeRunner};
use crate::logging::log_error;
use crate::models::{
    Dependency, InstanceLoad, LoadSample, RequestClass, ScalingEvent, ServiceInstance,
};
use crate::orchestration::snapshot::{ControlPlaneSnapshot, SnapshotSink};
use crate::registry::{HeartbeatOutcome, ServiceRegistry};
use crate::resilience::{CircuitBreakerManager, Transition};
use crate::services::LoadSelector;

use self::collector::{LoadSource, SampleBuffer, SystemLoadSource};
use self::monitor::{DegradationLevel, HealthMonitor, SystemStatus};
use self::scaling::ScalingAdvisor;

/// A configured dependency and the probe that checks it
#[derive(Debug)]
struct WatchedDependency {
    dependency: Dependency,
    probe: Arc<dyn HealthProbe>,
    timeout: Duration,
}

/// Outcome of one health round
#[derive(Debug, Clone, PartialEq)]
pub struct HealthRoundReport {
    /// Probes dispatched this round, sorted by id
    pub probed: Vec<String>,
    /// Dependencies skipped because their circuit refused a probe, sorted by id
    pub suppressed: Vec<String>,
    pub failures: usize,
    /// Circuit state changes caused by this round's results
    pub transitions: Vec<(String, Transition)>,
    pub system_status: SystemStatus,
}

#[derive(Debug)]
struct CoordinatorInner {
    id: Uuid,
    config: ControlPlaneConfig,
    clock: Arc<dyn Clock>,
    dependencies: Vec<WatchedDependency>,
    runner: ProbeRunner,
    probe_permits: Arc<Semaphore>,
    breakers: Arc<CircuitBreakerManager>,
    registry: Arc<ServiceRegistry>,
    selector: LoadSelector,
    advisor: ScalingAdvisor,
    monitor: HealthMonitor,
    samples: SampleBuffer,
    load_source: Arc<dyn LoadSource>,
    sink: Option<Arc<dyn SnapshotSink>>,
}

#[derive(Debug, Default)]
struct Lifecycle {
    shutdown: Option<watch::Sender<bool>>,
    handles: Vec<JoinHandle<()>>,
}

/// Scheduling loop and read path of the control plane
#[derive(Debug, Clone)]
pub struct ControlPlaneCoordinator {
    inner: Arc<CoordinatorInner>,
    running: Arc<AtomicBool>,
    lifecycle: Arc<Mutex<Lifecycle>>,
}

/// Builder for [`ControlPlaneCoordinator`]; unset collaborators get production defaults
#[derive(Debug)]
pub struct ControlPlaneCoordinatorBuilder {
    config: ControlPlaneConfig,
    clock: Option<Arc<dyn Clock>>,
    probes: HashMap<String, Arc<dyn HealthProbe>>,
    load_source: Option<Arc<dyn LoadSource>>,
    sink: Option<Arc<dyn SnapshotSink>>,
}

impl ControlPlaneCoordinatorBuilder {
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Use `probe` for `dependency_id` instead of the one chosen from its endpoint
    pub fn with_probe(mut self, dependency_id: impl Into<String>, probe: Arc<dyn HealthProbe>) -> Self {
        self.probes.insert(dependency_id.into(), probe);
        self
    }

    pub fn with_load_source(mut self, load_source: Arc<dyn LoadSource>) -> Self {
        self.load_source = Some(load_source);
        self
    }

    pub fn with_snapshot_sink(mut self, sink: Arc<dyn SnapshotSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Validate the configuration and assemble the coordinator.
    ///
    /// Endpoint-derived probes may open lazy connection pools, so this must run inside a
    /// Tokio runtime.
    pub fn build(mut self) -> Result<ControlPlaneCoordinator> {
        self.config.validate()?;

        if let Some(unknown) = self
            .probes
            .keys()
            .find(|id| !self.config.dependencies.iter().any(|d| &d.id == *id))
        {
            return Err(ConfigurationError::UnknownDependency {
                dependency_id: unknown.clone(),
            }
            .into());
        }

        let id = Uuid::new_v4();
        let clock = self.clock.unwrap_or_else(system_clock);

        let mut dependencies = Vec::with_capacity(self.config.dependencies.len());
        for dependency in &self.config.dependencies {
            let probe = match self.probes.remove(&dependency.id) {
                Some(probe) => probe,
                None => ProbeFactory::for_dependency(dependency)?,
            };
            dependencies.push(WatchedDependency {
                dependency: dependency.to_dependency(),
                probe,
                timeout: dependency.probe_timeout(),
            });
        }

        let breakers = Arc::new(CircuitBreakerManager::from_config(
            &self.config,
            Arc::clone(&clock),
        ));
        let registry = Arc::new(ServiceRegistry::new(
            &self.config.registry,
            Arc::clone(&clock),
        ));
        let selector = LoadSelector::new(&self.config.load_selector, Arc::clone(&breakers));
        let advisor = ScalingAdvisor::new(self.config.scaling.clone(), Arc::clone(&clock));
        let monitor = HealthMonitor::new(
            self.config.coordinator.probe_history_limit,
            Arc::clone(&clock),
        );
        let load_source = self
            .load_source
            .unwrap_or_else(|| Arc::new(SystemLoadSource::new()));

        info!(
            coordinator_id = %id,
            dependencies = dependencies.len(),
            algorithm = %self.config.load_selector.algorithm,
            scaling_enabled = self.config.scaling.enabled,
            "🏗️ COORDINATOR: Control plane coordinator created"
        );

        Ok(ControlPlaneCoordinator {
            inner: Arc::new(CoordinatorInner {
                id,
                runner: ProbeRunner::new(Arc::clone(&clock)),
                probe_permits: Arc::new(Semaphore::new(
                    self.config.coordinator.max_concurrent_probes,
                )),
                samples: SampleBuffer::new(self.config.coordinator.sample_capacity),
                clock,
                dependencies,
                breakers,
                registry,
                selector,
                advisor,
                monitor,
                load_source,
                sink: self.sink,
                config: self.config,
            }),
            running: Arc::new(AtomicBool::new(false)),
            lifecycle: Arc::new(Mutex::new(Lifecycle::default())),
        })
    }
}

impl ControlPlaneCoordinator {
    pub fn builder(config: ControlPlaneConfig) -> ControlPlaneCoordinatorBuilder {
        ControlPlaneCoordinatorBuilder {
            config,
            clock: None,
            probes: HashMap::new(),
            load_source: None,
            sink: None,
        }
    }

    /// Coordinator with endpoint-derived probes, host load sampling and the system clock
    pub fn new(config: ControlPlaneConfig) -> Result<Self> {
        Self::builder(config).build()
    }

    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    pub fn config(&self) -> &ControlPlaneConfig {
        &self.inner.config
    }

    pub fn circuit_breakers(&self) -> &Arc<CircuitBreakerManager> {
        &self.inner.breakers
    }

    pub fn registry(&self) -> &Arc<ServiceRegistry> {
        &self.inner.registry
    }

    pub fn scaling_advisor(&self) -> &ScalingAdvisor {
        &self.inner.advisor
    }

    pub fn health_monitor(&self) -> &HealthMonitor {
        &self.inner.monitor
    }

    // ----- request path -------------------------------------------------------------

    /// Whether calls to `dependency_id` may be attempted right now
    pub fn is_available(&self, dependency_id: &str) -> bool {
        self.inner.breakers.is_available(dependency_id)
    }

    /// Choose an active instance for `request_class`, optionally requiring a capability
    pub fn pick_backend(
        &self,
        request_class: RequestClass,
        capability: Option<&str>,
    ) -> Result<ServiceInstance> {
        let candidates = self.inner.registry.list_active(None, capability);
        self.inner.selector.select(request_class, &candidates)
    }

    pub fn register(&self, instance: ServiceInstance) -> bool {
        self.inner.registry.register(instance)
    }

    pub fn heartbeat(&self, instance_id: &str, load: Option<InstanceLoad>) -> HeartbeatOutcome {
        self.inner.registry.heartbeat(instance_id, load)
    }

    /// Read-only copy of circuits, active instances and the latest scaling decision
    pub fn snapshot(&self) -> ControlPlaneSnapshot {
        self.inner.snapshot()
    }

    // ----- ticks --------------------------------------------------------------------

    /// Probe every dependency whose circuit admits a probe, concurrently and bounded
    pub async fn run_health_round(&self) -> HealthRoundReport {
        self.inner.health_round().await
    }

    /// Remove stale instances; returns the evicted ids
    pub fn run_eviction_round(&self) -> Vec<String> {
        self.inner.registry.evict_stale()
    }

    /// Record one load sample into the ring buffer
    pub fn collect_load_sample(&self) -> LoadSample {
        self.inner.collect_sample()
    }

    /// Evaluate the scaling advisor over the retained samples
    pub fn run_scaling_round(&self) -> ScalingEvent {
        self.inner.scaling_round()
    }

    /// Hand the current snapshot to the sink, if one is configured
    pub async fn export_snapshot(&self) -> Result<bool> {
        self.inner.export_snapshot().await
    }

    // ----- lifecycle ----------------------------------------------------------------

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Spawn the tick loops
    #[instrument(skip(self), fields(coordinator_id = %self.inner.id))]
    pub fn start(&self) -> Result<()> {
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(ControlPlaneError::InvalidState(
                "Coordinator is already running".to_string(),
            ));
        }

        info!("🚀 COORDINATOR: Starting control plane tick loops");

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let coordinator = &self.inner.config.coordinator;
        let health_ceiling = self.inner.health_ceiling();

        let mut handles = vec![
            self.spawn_tick_loop(
                "health",
                coordinator.health_check_interval(),
                health_ceiling,
                shutdown_rx.clone(),
                |inner| async move {
                    inner.health_round().await;
                },
            ),
            self.spawn_tick_loop(
                "eviction",
                coordinator.eviction_interval(),
                coordinator.eviction_interval(),
                shutdown_rx.clone(),
                |inner| async move {
                    inner.registry.evict_stale();
                },
            ),
            self.spawn_tick_loop(
                "sample",
                coordinator.sample_interval(),
                coordinator.sample_interval(),
                shutdown_rx.clone(),
                |inner| async move {
                    inner.collect_sample();
                },
            ),
            self.spawn_tick_loop(
                "scaling",
                coordinator.scaling_interval(),
                coordinator.scaling_interval(),
                shutdown_rx.clone(),
                |inner| async move {
                    inner.scaling_round();
                },
            ),
        ];

        if let (Some(interval), true) = (coordinator.snapshot_interval(), self.inner.sink.is_some()) {
            handles.push(self.spawn_tick_loop(
                "export",
                interval,
                interval,
                shutdown_rx,
                |inner| async move {
                    if let Err(e) = inner.export_snapshot().await {
                        log_error(&e, "snapshot export");
                    }
                },
            ));
        }

        let mut lifecycle = self.lifecycle.lock();
        lifecycle.shutdown = Some(shutdown_tx);
        lifecycle.handles = handles;

        info!(
            health_ceiling_ms = health_ceiling.as_millis() as u64,
            "✅ COORDINATOR: Tick loops started"
        );
        Ok(())
    }

    /// Signal the loops to stop and wait up to `timeout` for them to finish
    #[instrument(skip(self), fields(coordinator_id = %self.inner.id))]
    pub async fn stop(&self, timeout: Duration) -> Result<()> {
        if !self.running.swap(false, Ordering::SeqCst) {
            info!("COORDINATOR: Already stopped");
            return Ok(());
        }

        info!("🛑 COORDINATOR: Stopping control plane tick loops");

        let handles = {
            let mut lifecycle = self.lifecycle.lock();
            if let Some(shutdown) = lifecycle.shutdown.take() {
                let _ = shutdown.send(true);
            }
            std::mem::take(&mut lifecycle.handles)
        };

        for mut handle in handles {
            if tokio::time::timeout(timeout, &mut handle).await.is_err() {
                warn!("COORDINATOR: Tick loop did not stop in time, aborting");
                handle.abort();
                // Dropping the loop aborts its in-flight tick as well
                let _ = handle.await;
            }
        }

        info!("✅ COORDINATOR: Control plane stopped");
        Ok(())
    }

    fn spawn_tick_loop<F, Fut>(
        &self,
        tick: &'static str,
        interval: Duration,
        ceiling: Duration,
        mut shutdown: watch::Receiver<bool>,
        work: F,
    ) -> JoinHandle<()>
    where
        F: Fn(Arc<CoordinatorInner>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let inner = Arc::clone(&self.inner);

        tokio::spawn(async move {
            loop {
                let tick_due = tokio::select! {
                    _ = tokio::time::sleep(interval) => true,
                    _ = shutdown.changed() => false,
                };
                if !tick_due {
                    info!("{} tick loop shutting down", tick);
                    break;
                }

                let outcome =
                    run_isolated(tick, ceiling, &mut shutdown, work(Arc::clone(&inner))).await;
                if outcome == TickOutcome::Cancelled {
                    info!("{} tick loop shutting down mid-tick", tick);
                    break;
                }
            }
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TickOutcome {
    Completed,
    Failed,
    /// Shutdown arrived while the tick was running
    Cancelled,
}

/// Aborts a tick task when the loop driving it is dropped
struct AbortOnDrop(AbortHandle);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Run one tick's work as its own task so a panic or overrun stays contained.
///
/// The task is aborted and awaited on overrun or shutdown; it has stopped by the time
/// this returns.
async fn run_isolated<Fut>(
    tick: &'static str,
    ceiling: Duration,
    shutdown: &mut watch::Receiver<bool>,
    work: Fut,
) -> TickOutcome
where
    Fut: Future<Output = ()> + Send + 'static,
{
    let mut handle = tokio::spawn(work);
    let guard = AbortOnDrop(handle.abort_handle());

    let finished = {
        let bounded = tokio::time::timeout(ceiling, &mut handle);
        tokio::select! {
            joined = bounded => Some(joined),
            _ = shutdown.changed() => None,
        }
    };

    match finished {
        Some(Ok(Ok(()))) => TickOutcome::Completed,
        Some(Ok(Err(join_error))) => {
            if join_error.is_panic() {
                error!(tick = tick, "💥 Tick panicked, continuing with next interval");
            } else {
                warn!(tick = tick, error = %join_error, "Tick task cancelled");
            }
            TickOutcome::Failed
        }
        Some(Err(_)) => {
            guard.0.abort();
            let _ = handle.await;
            warn!(
                tick = tick,
                ceiling_ms = ceiling.as_millis() as u64,
                "⏱️ Tick exceeded its ceiling and was abandoned"
            );
            TickOutcome::Failed
        }
        None => {
            guard.0.abort();
            let _ = handle.await;
            debug!(tick = tick, "Tick cancelled by shutdown");
            TickOutcome::Cancelled
        }
    }
}

impl CoordinatorInner {
    /// Twice the longest probe timeout per wave of concurrent probes
    fn health_ceiling(&self) -> Duration {
        let longest = self
            .dependencies
            .iter()
            .map(|d| d.timeout)
            .max()
            .unwrap_or(Duration::from_secs(1));
        let permits = self.config.coordinator.max_concurrent_probes.max(1);
        let waves = self.dependencies.len().div_ceil(permits).max(1) as u32;
        longest * TICK_CEILING_MULTIPLIER * waves
    }

    async fn health_round(&self) -> HealthRoundReport {
        let mut in_flight = FuturesUnordered::new();

        for watched in &self.dependencies {
            let permits = Arc::clone(&self.probe_permits);
            in_flight.push(async move {
                // Semaphore is never closed, so a failed acquire only means no limit
                let _permit = permits.acquire_owned().await.ok();

                // Claimed once a slot is held so a half-open trial lease never runs out
                // while the probe is still queued
                let permitted = self
                    .breakers
                    .get(&watched.dependency.id)
                    .map_or(true, |breaker| breaker.try_acquire_probe());
                if !permitted {
                    return (watched, None);
                }

                let result = self
                    .runner
                    .run(watched.probe.as_ref(), &watched.dependency, watched.timeout)
                    .await;
                (watched, Some(result))
            });
        }

        let mut probed = Vec::new();
        let mut suppressed = Vec::new();
        let mut failures = 0;
        let mut transitions = Vec::new();
        while let Some((watched, outcome)) = in_flight.next().await {
            let id = &watched.dependency.id;
            let Some(result) = outcome else {
                debug!(dependency_id = %id, "Probe suppressed by circuit state");
                suppressed.push(id.clone());
                continue;
            };

            probed.push(id.clone());
            if !result.success {
                failures += 1;
            }
            self.monitor
                .record_probe(&result, watched.dependency.expected_latency_budget_ms);
            match self.breakers.record_result(&result) {
                Ok(Transition::Unchanged) => {}
                Ok(transition) => transitions.push((result.dependency_id.clone(), transition)),
                Err(e) => log_error(&e, "health round"),
            }
        }
        probed.sort();
        suppressed.sort();

        let system_status = self.monitor.evaluate(&self.breakers.snapshot_all());
        debug!(
            probed = probed.len(),
            suppressed = suppressed.len(),
            failures = failures,
            system_status = system_status.label(),
            "Health round complete"
        );

        HealthRoundReport {
            probed,
            suppressed,
            failures,
            transitions,
            system_status,
        }
    }

    fn collect_sample(&self) -> LoadSample {
        let host = self.load_source.read();
        let active_connections: u64 = self
            .registry
            .list_active(None, None)
            .iter()
            .map(|instance| u64::from(instance.current_load.active_connections))
            .sum();

        let sample = LoadSample::new(
            self.clock.now(),
            host.cpu_percent,
            host.memory_percent,
            active_connections,
        );
        self.samples.push(sample);
        sample
    }

    fn scaling_round(&self) -> ScalingEvent {
        self.advisor.evaluate(&self.samples.to_vec())
    }

    fn snapshot(&self) -> ControlPlaneSnapshot {
        let latest_sample = self.samples.latest();
        ControlPlaneSnapshot {
            coordinator_id: self.id,
            generated_at: self.clock.now(),
            circuits: self.breakers.snapshot_all(),
            instances: self.registry.list_active(None, None),
            last_scaling_event: self.advisor.last_event(),
            system_status: self.monitor.system_status(),
            health_score: self.breakers.system_metrics().health_score(),
            degradation_level: latest_sample
                .map(|s| DegradationLevel::from_load(s.cpu_percent, s.memory_percent))
                .unwrap_or(DegradationLevel::Normal),
            latest_sample,
        }
    }

    async fn export_snapshot(&self) -> Result<bool> {
        match &self.sink {
            Some(sink) => {
                sink.export(&self.snapshot()).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
