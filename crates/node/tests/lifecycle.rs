//! Instance and manager lifecycle scenarios over mock sources.

use async_trait::async_trait;
use quarry_adapters::{ChainAdapter, TransactionParser};
use quarry_bus::{BusConfig, EventBus};
use quarry_fetcher::FetcherConfig;
use quarry_node::{ChainInstance, ChainManager, InstanceConfig, InstanceStatus, ManagerConfig};
use quarry_primitives::{
    BlockSource, ChainFamily, ChainInfo, FailingSource, MockChain,
};
use quarry_storage::{ChainStore, MemoryStore};
use std::{sync::Arc, time::Duration};

const CHAIN_ID: u64 = 1;

/// A minimal adapter over any [BlockSource], for lifecycle tests.
#[derive(Debug)]
struct TestAdapter {
    info: ChainInfo,
    source: Arc<dyn BlockSource>,
    parser: Arc<TransactionParser>,
}

impl TestAdapter {
    fn new(source: Arc<dyn BlockSource>) -> Arc<Self> {
        Arc::new(Self {
            info: ChainInfo::new(CHAIN_ID, ChainFamily::Evm, "test"),
            source,
            parser: Arc::new(TransactionParser::new(CHAIN_ID)),
        })
    }
}

#[async_trait]
impl ChainAdapter for TestAdapter {
    fn info(&self) -> &ChainInfo {
        &self.info
    }

    fn block_fetcher(&self) -> Arc<dyn BlockSource> {
        Arc::clone(&self.source)
    }

    fn transaction_parser(&self) -> Arc<TransactionParser> {
        Arc::clone(&self.parser)
    }
}

fn fast_instance_config(id: &str) -> InstanceConfig {
    InstanceConfig {
        fetcher: FetcherConfig {
            batch_size: 4,
            workers: 2,
            max_retries: 2,
            retry_delay: Duration::from_millis(10),
            poll_interval: Duration::from_millis(20),
            ..Default::default()
        },
        shutdown_timeout: Duration::from_secs(5),
        monitor_interval: Duration::from_millis(25),
        ..InstanceConfig::new(id)
    }
}

fn chain_store() -> ChainStore {
    ChainStore::new(CHAIN_ID, Arc::new(MemoryStore::new()))
}

async fn wait_until(mut condition: impl FnMut() -> bool, timeout: Duration) {
    tokio::time::timeout(timeout, async {
        loop {
            if condition() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

#[tokio::test]
async fn instance_walks_the_state_machine() {
    let adapter = TestAdapter::new(Arc::new(MockChain::with_empty_blocks(10)));
    let store = chain_store();
    let bus = EventBus::new(BusConfig::default());
    let instance =
        ChainInstance::new(fast_instance_config("walk"), adapter, store.clone(), bus);
    assert_eq!(instance.status(), InstanceStatus::Registered);

    let manager = ChainManager::new(ManagerConfig::default());
    manager.register(Arc::clone(&instance)).unwrap();
    manager.start("walk").await.unwrap();
    assert!(matches!(
        instance.status(),
        InstanceStatus::Starting | InstanceStatus::Syncing | InstanceStatus::Active
    ));

    // The pipeline catches up and the monitor promotes to Active.
    wait_until(
        || instance.status() == InstanceStatus::Active,
        Duration::from_secs(5),
    )
    .await;
    assert_eq!(store.watermark().unwrap(), Some(10));
    assert_eq!(manager.active_count(), 1);

    // Counters followed the bus.
    wait_until(|| instance.metrics().blocks == 11, Duration::from_secs(5)).await;
    let metrics = instance.metrics();
    assert_eq!(metrics.transactions, 0);
    assert_eq!(metrics.logs, 0);
    assert!(metrics.rpc_calls > 0);

    manager.stop("walk").await.unwrap();
    assert_eq!(instance.status(), InstanceStatus::Stopped);

    // Stop is idempotent.
    manager.stop("walk").await.unwrap();
    assert_eq!(instance.status(), InstanceStatus::Stopped);
}

#[tokio::test]
async fn failing_source_escalates_to_error_and_auto_restarts() {
    let adapter = TestAdapter::new(Arc::new(FailingSource::new("connection refused")));
    let store = chain_store();
    let bus = EventBus::new(BusConfig::default());
    let instance =
        ChainInstance::new(fast_instance_config("flaky"), adapter, store, bus);

    let manager = ChainManager::new(ManagerConfig {
        health_check_interval: Duration::from_millis(40),
        auto_restart: true,
        auto_restart_delay: Duration::from_millis(10),
    });
    manager.register(Arc::clone(&instance)).unwrap();
    manager.start("flaky").await.unwrap();
    manager.spawn_monitor();

    // Tip discovery exhausts its retries and the instance lands in Error.
    wait_until(
        || instance.status() == InstanceStatus::Error,
        Duration::from_secs(5),
    )
    .await;
    assert!(instance.last_error().is_some());

    // Within two health-check intervals the manager has stop+started it at
    // least once; the endpoint still fails, so it keeps cycling.
    wait_until(|| instance.restart_count() >= 1, Duration::from_secs(5)).await;

    manager.shutdown().await;
    assert_eq!(instance.status(), InstanceStatus::Stopped);
}

#[tokio::test]
async fn registry_operations() {
    let manager = ChainManager::new(ManagerConfig::default());
    let bus = EventBus::new(BusConfig::default());

    let first = ChainInstance::new(
        fast_instance_config("one"),
        TestAdapter::new(Arc::new(MockChain::with_empty_blocks(0))),
        chain_store(),
        Arc::clone(&bus),
    );
    let duplicate = ChainInstance::new(
        fast_instance_config("one"),
        TestAdapter::new(Arc::new(MockChain::with_empty_blocks(0))),
        chain_store(),
        Arc::clone(&bus),
    );

    manager.register(first).unwrap();
    assert!(manager.register(duplicate).is_err());
    assert_eq!(manager.count(), 1);
    assert!(manager.get("one").is_some());
    assert!(manager.get("two").is_none());
    assert!(manager.start("two").await.is_err());

    // Unregister stops the instance first.
    manager.start("one").await.unwrap();
    manager.unregister("one").await.unwrap();
    assert_eq!(manager.count(), 0);

    let health = manager.health_check_all().await;
    assert!(health.is_empty());
}

#[tokio::test]
async fn health_sample_reports_lag_and_uptime() {
    let chain = Arc::new(MockChain::with_empty_blocks(5));
    let adapter = TestAdapter::new(chain);
    let store = chain_store();
    let bus = EventBus::new(BusConfig::default());
    let instance =
        ChainInstance::new(fast_instance_config("health"), adapter, store.clone(), bus);

    let manager = ChainManager::new(ManagerConfig::default());
    manager.register(Arc::clone(&instance)).unwrap();
    manager.start("health").await.unwrap();
    wait_until(|| store.watermark().unwrap() == Some(5), Duration::from_secs(5)).await;

    let sample = instance.health().await;
    assert_eq!(sample.tip, Some(5));
    assert_eq!(sample.watermark, Some(5));
    assert_eq!(sample.sync_lag, Some(0));
    assert!(sample.uptime.is_some());
    assert!(sample.healthy());

    manager.shutdown().await;
}
