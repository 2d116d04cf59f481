//! The multi-chain manager: registry, lifecycle, health monitoring, and
//! auto-restart.

use crate::{
    errors::NodeError, health::HealthSample, instance::ChainInstance, instance::InstanceStatus,
    metrics::MetricsSnapshot,
};
use std::{
    collections::HashMap,
    sync::{Arc, Mutex, RwLock, Weak},
    time::Duration,
};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Manager configuration.
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    /// How often the health monitor walks the registry.
    pub health_check_interval: Duration,
    /// Whether errored instances are restarted automatically.
    pub auto_restart: bool,
    /// Minimum age of an error before its instance is restarted.
    pub auto_restart_delay: Duration,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            health_check_interval: Duration::from_secs(15),
            auto_restart: true,
            auto_restart_delay: Duration::from_secs(30),
        }
    }
}

/// Owns one [ChainInstance] per configured chain.
///
/// The registry is keyed by the human instance id, not the numeric chain
/// id; two instances may even index the same chain under different ids.
pub struct ChainManager {
    cfg: ManagerConfig,
    instances: RwLock<HashMap<String, Arc<ChainInstance>>>,
    root: CancellationToken,
    monitor: Mutex<Option<JoinHandle<()>>>,
}

impl core::fmt::Debug for ChainManager {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ChainManager").field("instances", &self.count()).finish()
    }
}

impl ChainManager {
    /// Creates a manager with its own root cancellation token.
    pub fn new(cfg: ManagerConfig) -> Arc<Self> {
        Arc::new(Self {
            cfg,
            instances: RwLock::new(HashMap::new()),
            root: CancellationToken::new(),
            monitor: Mutex::new(None),
        })
    }

    /// The root token instances are started under.
    pub const fn root_token(&self) -> &CancellationToken {
        &self.root
    }

    /// Adds an instance to the registry.
    pub fn register(&self, instance: Arc<ChainInstance>) -> Result<(), NodeError> {
        let mut instances = self.instances.write().unwrap();
        let id = instance.id().to_string();
        if instances.contains_key(&id) {
            return Err(NodeError::AlreadyRegistered(id));
        }
        info!(target: "manager", id = %id, chain_id = instance.chain_id(), "registered");
        instances.insert(id, instance);
        Ok(())
    }

    /// Removes an instance, stopping it first if needed.
    pub async fn unregister(&self, id: &str) -> Result<(), NodeError> {
        let instance = self.get(id).ok_or_else(|| NodeError::UnknownInstance(id.to_string()))?;
        instance.stop().await?;
        self.instances.write().unwrap().remove(id);
        info!(target: "manager", id, "unregistered");
        Ok(())
    }

    /// Starts one instance by id.
    pub async fn start(&self, id: &str) -> Result<(), NodeError> {
        let instance = self.get(id).ok_or_else(|| NodeError::UnknownInstance(id.to_string()))?;
        instance.start(&self.root).await
    }

    /// Stops one instance by id.
    pub async fn stop(&self, id: &str) -> Result<(), NodeError> {
        let instance = self.get(id).ok_or_else(|| NodeError::UnknownInstance(id.to_string()))?;
        instance.stop().await
    }

    /// Starts every registered instance. Fails on the first startup error;
    /// already-started instances keep running.
    pub async fn start_all(&self) -> Result<(), NodeError> {
        for instance in self.list() {
            instance.start(&self.root).await?;
        }
        Ok(())
    }

    /// Stops every registered instance.
    pub async fn stop_all(&self) {
        for instance in self.list() {
            if let Err(err) = instance.stop().await {
                warn!(target: "manager", id = %instance.id(), %err, "stop failed");
            }
        }
    }

    /// Returns the instance registered under an id.
    pub fn get(&self, id: &str) -> Option<Arc<ChainInstance>> {
        self.instances.read().unwrap().get(id).cloned()
    }

    /// All registered instances.
    pub fn list(&self) -> Vec<Arc<ChainInstance>> {
        self.instances.read().unwrap().values().cloned().collect()
    }

    /// Number of registered instances.
    pub fn count(&self) -> usize {
        self.instances.read().unwrap().len()
    }

    /// Number of instances currently `Active`.
    pub fn active_count(&self) -> usize {
        self.list().iter().filter(|i| i.status() == InstanceStatus::Active).count()
    }

    /// Samples every instance's health.
    pub async fn health_check_all(&self) -> HashMap<String, HealthSample> {
        let mut samples = HashMap::new();
        for instance in self.list() {
            samples.insert(instance.id().to_string(), instance.health().await);
        }
        samples
    }

    /// Snapshots every instance's counters.
    pub fn metrics_all(&self) -> HashMap<String, MetricsSnapshot> {
        self.list()
            .into_iter()
            .map(|instance| (instance.id().to_string(), instance.metrics()))
            .collect()
    }

    /// Spawns the periodic health monitor (and auto-restart, when enabled).
    pub fn spawn_monitor(self: &Arc<Self>) {
        let weak = Arc::downgrade(self);
        let root = self.root.clone();
        let interval = self.cfg.health_check_interval;
        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = root.cancelled() => return,
                    _ = tokio::time::sleep(interval) => {}
                }
                let Some(manager) = Weak::upgrade(&weak) else { return };
                manager.health_tick().await;
            }
        });
        *self.monitor.lock().unwrap() = Some(handle);
    }

    async fn health_tick(&self) {
        for instance in self.list() {
            let sample = instance.health().await;
            debug!(
                target: "manager",
                id = %instance.id(),
                status = %sample.status,
                tip = ?sample.tip,
                watermark = ?sample.watermark,
                lag = ?sample.sync_lag,
                healthy = sample.healthy(),
                "health sample"
            );

            if self.cfg.auto_restart
                && instance.status() == InstanceStatus::Error
                && instance
                    .last_error_age()
                    .map_or(true, |age| age >= self.cfg.auto_restart_delay)
            {
                info!(target: "manager", id = %instance.id(), "auto-restarting errored instance");
                if let Err(err) = instance.restart(&self.root).await {
                    // Remains in Error; the next tick retries.
                    warn!(target: "manager", id = %instance.id(), %err, "restart failed");
                }
            }
        }
    }

    /// Ordered shutdown: health monitor first, then the root token, then
    /// every instance. Shared resources (the store) are closed by the
    /// caller afterwards.
    pub async fn shutdown(&self) {
        info!(target: "manager", "shutting down");
        self.root.cancel();
        let monitor = self.monitor.lock().unwrap().take();
        if let Some(monitor) = monitor {
            let _ = monitor.await;
        }
        self.stop_all().await;
    }
}
