//! One supervised chain instance: client + adapter + pipeline + metrics +
//! health, behind a small state machine.

use crate::{
    errors::NodeError,
    health::{HealthSample, UNHEALTHY_LAG},
    metrics::{InstanceMetrics, MetricsSnapshot},
};
use quarry_adapters::ChainAdapter;
use quarry_bus::{EventBus, EventFilter, EventKind};
use quarry_fetcher::{Fetcher, FetcherConfig, GapRecovery};
use quarry_primitives::BlockSource;
use quarry_storage::ChainStore;
use serde::Serialize;
use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex,
    },
    time::{Duration, Instant},
};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// The lifecycle states of a chain instance.
///
/// `Registered → Starting → Syncing ↔ Active → Stopping → Stopped`, with
/// `Error` reachable from any state and restartable back through
/// `Starting`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum InstanceStatus {
    /// Known to the manager, never started.
    Registered,
    /// Initialization in progress.
    Starting,
    /// Indexing, still behind the tip.
    Syncing,
    /// Caught up with the tip.
    Active,
    /// Shutdown in progress.
    Stopping,
    /// Cleanly stopped.
    Stopped,
    /// Failed; eligible for auto-restart.
    Error,
}

impl core::fmt::Display for InstanceStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let name = match self {
            Self::Registered => "registered",
            Self::Starting => "starting",
            Self::Syncing => "syncing",
            Self::Active => "active",
            Self::Stopping => "stopping",
            Self::Stopped => "stopped",
            Self::Error => "error",
        };
        write!(f, "{name}")
    }
}

/// Construction parameters for a chain instance.
#[derive(Debug, Clone)]
pub struct InstanceConfig {
    /// The instance id: a human-readable string distinct from the numeric
    /// chain id.
    pub id: String,
    /// Pipeline tuning.
    pub fetcher: FetcherConfig,
    /// Bounded wait for background tasks at stop.
    pub shutdown_timeout: Duration,
    /// Sync lag below which the instance promotes to `Active`.
    pub activation_lag: u64,
    /// How often the status monitor samples health.
    pub monitor_interval: Duration,
    /// Run one gap recovery pass right after start.
    pub gap_recovery_on_start: bool,
    /// Re-scan for gaps on this interval, if set.
    pub gap_recovery_interval: Option<Duration>,
}

impl InstanceConfig {
    /// Defaults for the given instance id.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            fetcher: FetcherConfig::default(),
            shutdown_timeout: Duration::from_secs(30),
            activation_lag: 10,
            monitor_interval: Duration::from_secs(5),
            gap_recovery_on_start: false,
            gap_recovery_interval: None,
        }
    }
}

struct Runtime {
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
    started_at: Instant,
}

/// One supervised unit: adapter, pipeline, metrics, health.
pub struct ChainInstance {
    config: InstanceConfig,
    adapter: Arc<dyn ChainAdapter>,
    source: Arc<dyn BlockSource>,
    store: ChainStore,
    bus: Arc<EventBus>,
    status: Mutex<InstanceStatus>,
    last_error: Mutex<Option<(String, Instant)>>,
    metrics: Arc<InstanceMetrics>,
    restarts: AtomicU64,
    runtime: Mutex<Option<Runtime>>,
}

impl core::fmt::Debug for ChainInstance {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ChainInstance")
            .field("id", &self.config.id)
            .field("chain_id", &self.store.chain_id())
            .field("status", &self.status())
            .finish()
    }
}

impl ChainInstance {
    /// Creates an instance in the `Registered` state.
    pub fn new(
        config: InstanceConfig,
        adapter: Arc<dyn ChainAdapter>,
        store: ChainStore,
        bus: Arc<EventBus>,
    ) -> Arc<Self> {
        let source = adapter.block_fetcher();
        Arc::new(Self {
            config,
            adapter,
            source,
            store,
            bus,
            status: Mutex::new(InstanceStatus::Registered),
            last_error: Mutex::new(None),
            metrics: Arc::new(InstanceMetrics::default()),
            restarts: AtomicU64::new(0),
            runtime: Mutex::new(None),
        })
    }

    /// The instance id.
    pub fn id(&self) -> &str {
        &self.config.id
    }

    /// The numeric chain id.
    pub const fn chain_id(&self) -> u64 {
        self.store.chain_id()
    }

    /// The current lifecycle state.
    pub fn status(&self) -> InstanceStatus {
        *self.status.lock().unwrap()
    }

    /// The most recent error message, if any.
    pub fn last_error(&self) -> Option<String> {
        self.last_error.lock().unwrap().as_ref().map(|(message, _)| message.clone())
    }

    /// Time since the most recent error.
    pub fn last_error_age(&self) -> Option<Duration> {
        self.last_error.lock().unwrap().as_ref().map(|(_, at)| at.elapsed())
    }

    /// How many times the instance was restarted out of `Error`.
    pub fn restart_count(&self) -> u64 {
        self.restarts.load(Ordering::Relaxed)
    }

    /// Counter snapshot; RPC numbers come from the source.
    pub fn metrics(&self) -> MetricsSnapshot {
        let stats = self.source.stats();
        self.metrics.snapshot(stats.calls, stats.errors)
    }

    fn set_status(&self, next: InstanceStatus) {
        let mut status = self.status.lock().unwrap();
        if *status != next {
            debug!(
                target: "instance",
                id = %self.config.id, from = %*status, to = %next,
                "status transition"
            );
            *status = next;
        }
    }

    fn record_error(&self, message: String) {
        warn!(target: "instance", id = %self.config.id, error = %message, "instance error");
        *self.last_error.lock().unwrap() = Some((message, Instant::now()));
    }

    /// Starts the pipeline and its companion tasks.
    ///
    /// Valid from `Registered`, `Stopped`, and `Error`; restarting out of
    /// `Error` increments the restart counter.
    pub async fn start(
        self: &Arc<Self>,
        parent: &CancellationToken,
    ) -> Result<(), NodeError> {
        {
            let mut status = self.status.lock().unwrap();
            match *status {
                InstanceStatus::Registered | InstanceStatus::Stopped | InstanceStatus::Error => {
                    if *status == InstanceStatus::Error {
                        self.restarts.fetch_add(1, Ordering::Relaxed);
                    }
                    *status = InstanceStatus::Starting;
                }
                _ => return Err(NodeError::AlreadyRunning(self.config.id.clone())),
            }
        }
        info!(target: "instance", id = %self.config.id, chain_id = self.chain_id(), "starting");

        // Precondition: storage must be readable before anything spawns.
        if let Err(err) = self.store.watermark() {
            self.record_error(err.to_string());
            self.set_status(InstanceStatus::Error);
            return Err(NodeError::Precondition {
                id: self.config.id.clone(),
                reason: err.to_string(),
            });
        }

        let cancel = parent.child_token();
        let fetcher = Arc::new(Fetcher::new(
            self.config.fetcher.clone(),
            Arc::clone(&self.source),
            self.store.clone(),
            Arc::clone(&self.bus),
            self.adapter.consensus_parser(),
            self.adapter.system_contracts(),
            cancel.child_token(),
        ));

        let mut tasks = Vec::with_capacity(4);

        // The pipeline itself; a failed run escalates the instance.
        {
            let instance = Arc::clone(self);
            let fetcher = Arc::clone(&fetcher);
            tasks.push(tokio::spawn(async move {
                if let Err(err) = fetcher.run().await {
                    instance.record_error(err.to_string());
                    instance.set_status(InstanceStatus::Error);
                }
            }));
        }

        // Counters follow the instance's own events on the bus.
        {
            let filter = EventFilter::kinds(&[
                EventKind::Block,
                EventKind::Transaction,
                EventKind::Log,
            ])
            .for_chain(self.chain_id());
            let mut subscription =
                self.bus.subscribe(format!("instance-{}", self.config.id), filter, None);
            let metrics = Arc::clone(&self.metrics);
            let cancel = cancel.clone();
            tasks.push(tokio::spawn(async move {
                loop {
                    tokio::select! {
                        _ = cancel.cancelled() => return,
                        event = subscription.recv() => {
                            let Some(event) = event else { return };
                            match event.kind {
                                EventKind::Block => metrics.record_block(),
                                EventKind::Transaction => metrics.record_transaction(),
                                EventKind::Log => metrics.record_log(),
                                _ => {}
                            }
                        }
                    }
                }
            }));
        }

        // Status monitor: promote and demote on observed lag.
        tasks.push(tokio::spawn(monitor_loop(Arc::clone(self), cancel.clone())));

        // Gap recovery shares the pipeline's queue.
        if self.config.gap_recovery_on_start || self.config.gap_recovery_interval.is_some() {
            let recovery = GapRecovery::new(self.store.clone(), fetcher.handle());
            let on_start = self.config.gap_recovery_on_start;
            let interval = self.config.gap_recovery_interval;
            let id = self.config.id.clone();
            tasks.push(tokio::spawn(async move {
                if on_start {
                    if let Err(err) = recovery.recover_once().await {
                        warn!(target: "instance", id = %id, %err, "startup gap recovery failed");
                    }
                }
                if let Some(interval) = interval {
                    recovery.run(interval).await;
                }
            }));
        }

        *self.runtime.lock().unwrap() =
            Some(Runtime { cancel, tasks, started_at: Instant::now() });
        self.set_status(InstanceStatus::Syncing);
        Ok(())
    }

    /// Stop (idempotent) followed by start; the auto-restart path.
    pub async fn restart(
        self: &Arc<Self>,
        parent: &CancellationToken,
    ) -> Result<(), NodeError> {
        self.restarts.fetch_add(1, Ordering::Relaxed);
        self.stop().await?;
        self.start(parent).await
    }

    /// Stops the instance, waiting up to the configured shutdown timeout
    /// for its tasks. Idempotent.
    pub async fn stop(&self) -> Result<(), NodeError> {
        {
            let mut status = self.status.lock().unwrap();
            match *status {
                InstanceStatus::Registered | InstanceStatus::Stopped => return Ok(()),
                _ => *status = InstanceStatus::Stopping,
            }
        }
        info!(target: "instance", id = %self.config.id, "stopping");

        let runtime = self.runtime.lock().unwrap().take();
        if let Some(mut runtime) = runtime {
            runtime.cancel.cancel();
            let joined = tokio::time::timeout(
                self.config.shutdown_timeout,
                futures::future::join_all(runtime.tasks.iter_mut()),
            )
            .await;
            if joined.is_err() {
                warn!(
                    target: "instance",
                    id = %self.config.id,
                    timeout = ?self.config.shutdown_timeout,
                    "tasks did not stop in time, aborting"
                );
                for task in &runtime.tasks {
                    task.abort();
                }
            }
        }
        self.set_status(InstanceStatus::Stopped);
        Ok(())
    }

    /// Takes one health sample.
    pub async fn health(&self) -> HealthSample {
        let started = Instant::now();
        let tip = self.source.block_number().await.ok();
        let latency = started.elapsed();
        let watermark = self.store.watermark().ok().flatten();
        let sync_lag = match (tip, watermark) {
            (Some(tip), Some(watermark)) => Some(tip.saturating_sub(watermark)),
            _ => None,
        };
        let uptime =
            self.runtime.lock().unwrap().as_ref().map(|runtime| runtime.started_at.elapsed());
        HealthSample {
            status: self.status(),
            latency,
            tip,
            watermark,
            sync_lag,
            uptime,
            last_error: self.last_error(),
        }
    }
}

async fn monitor_loop(instance: Arc<ChainInstance>, cancel: CancellationToken) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = tokio::time::sleep(instance.config.monitor_interval) => {}
        }
        let status = instance.status();
        if !matches!(status, InstanceStatus::Syncing | InstanceStatus::Active) {
            continue;
        }
        let sample = instance.health().await;
        match (status, sample.sync_lag) {
            (InstanceStatus::Syncing, Some(lag)) if lag < instance.config.activation_lag => {
                instance.set_status(InstanceStatus::Active);
            }
            (InstanceStatus::Active, Some(lag)) if lag >= UNHEALTHY_LAG => {
                instance.set_status(InstanceStatus::Syncing);
            }
            _ => {}
        }
    }
}
