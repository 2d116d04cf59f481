//! Application lifecycle: wiring, startup ordering, signal handling, and
//! ordered shutdown.

use crate::{cli::Cli, config::Config, metrics, telemetry};
use anyhow::{bail, Context, Result};
use quarry_adapters::{build_adapter, register_builtins, AdapterConfig};
use quarry_bus::{BusConfig, EventBus, EventFilter, OverflowPolicy};
use quarry_fetcher::FetcherConfig;
use quarry_node::{ChainInstance, ChainManager, InstanceConfig, ManagerConfig};
use quarry_primitives::ChainFamily;
use quarry_storage::{ensure_genesis, ChainStore, DiskStore, KeyValueStore};
use std::{path::PathBuf, sync::Arc};
use tracing::{error, info, warn};

/// Runs the indexer until a shutdown signal arrives.
pub async fn run(cli: Cli) -> Result<()> {
    let config = Config::load(&cli)?;
    telemetry::init(&config.log)?;
    info!(
        target: "quarry",
        node = %config.node.id, role = %config.node.role,
        "starting indexer"
    );

    if config.eventbus.bus_type != "local" {
        bail!(
            "eventbus type `{}` is not wired in this build; only `local` is supported",
            config.eventbus.bus_type
        );
    }

    let db_path = PathBuf::from(&config.database.path);
    if cli.clear_data {
        info!(target: "quarry", path = %db_path.display(), "clearing data directory");
        DiskStore::destroy(&db_path).context("clearing data directory")?;
    }
    let store: Arc<dyn KeyValueStore> = if config.database.readonly {
        Arc::new(DiskStore::open_read_only(&db_path).context("opening store read-only")?)
    } else {
        Arc::new(DiskStore::open(&db_path).context("opening store")?)
    };

    let bus = EventBus::new(BusConfig {
        queue_depth: config.eventbus.queue_depth,
        history: config.eventbus.history,
        default_buffer: config.eventbus.buffer,
        overflow: OverflowPolicy::Drop,
    });

    // Consensus registration completes before any instance starts;
    // a failure here is fatal.
    register_builtins().context("registering consensus parsers")?;

    let manager = ChainManager::new(ManagerConfig {
        health_check_interval: config.health_check_interval()?,
        auto_restart: config.multichain.auto_restart,
        auto_restart_delay: config.auto_restart_delay()?,
    });

    let rpc_timeout = config.rpc_timeout()?;
    for entry in config.chain_entries() {
        let forced = cli
            .adapter
            .as_deref()
            .or(entry.adapter.as_deref())
            .map(|tag| {
                ChainFamily::parse(tag)
                    .with_context(|| format!("chain `{}`: unknown adapter `{tag}`", entry.id))
            })
            .transpose()?;
        let endpoint = entry
            .rpc_endpoint
            .parse()
            .with_context(|| format!("chain `{}`: bad rpc endpoint", entry.id))?;
        let adapter_cfg =
            AdapterConfig { forced, rpc_timeout, epoch_length: entry.epoch_length };
        let adapter = build_adapter(endpoint, &adapter_cfg)
            .await
            .with_context(|| format!("connecting chain `{}`", entry.id))?;
        let chain_id = adapter.info().chain_id;
        let chain_store = ChainStore::new(chain_id, Arc::clone(&store));

        let start_height = entry.start_height.unwrap_or(config.indexer.start_height);
        if start_height == 0 && !config.database.readonly {
            let fetcher = adapter.block_fetcher();
            if let Err(err) = ensure_genesis(&chain_store, fetcher.as_ref()).await {
                warn!(target: "quarry", id = %entry.id, %err, "genesis bootstrap failed");
            }
        }

        let fetcher_cfg = FetcherConfig {
            start_height,
            batch_size: entry.batch_size.unwrap_or(config.indexer.batch_size),
            workers: entry.workers.unwrap_or(config.indexer.workers),
            max_retries: config.indexer.max_retries,
            retry_delay: config.retry_delay()?,
            confirmations: entry.confirmations.unwrap_or(config.indexer.confirmations),
            poll_interval: config.poll_interval()?,
            ..Default::default()
        };
        let instance_cfg = InstanceConfig {
            fetcher: fetcher_cfg,
            gap_recovery_on_start: config.indexer.gap_recovery,
            gap_recovery_interval: config.gap_recovery_interval()?,
            ..InstanceConfig::new(entry.id.clone())
        };
        info!(
            target: "quarry",
            id = %entry.id, chain_id, family = %adapter.info().family,
            "chain configured"
        );
        manager.register(ChainInstance::new(instance_cfg, adapter, chain_store, bus.clone()))?;
    }

    manager.start_all().await.context("starting chain instances")?;
    manager.spawn_monitor();

    let bridge =
        tokio::spawn(metrics::bridge(bus.subscribe("prometheus", EventFilter::all(), Some(1024))));
    if cli.metrics {
        let host = cli.metrics_host.clone().unwrap_or_else(|| "127.0.0.1".to_string());
        let port = cli.metrics_port.unwrap_or(9090);
        let bind = format!("{host}:{port}");
        info!(target: "quarry", %bind, "serving metrics");
        std::thread::spawn(move || {
            if let Err(err) = actix_web::rt::System::new().block_on(metrics::serve_metrics(bind))
            {
                error!(target: "quarry", %err, "metrics server failed");
            }
        });
    }

    wait_for_shutdown().await?;
    info!(target: "quarry", "shutdown signal received");

    // Ordered shutdown: manager (monitor, instances) first, bus next, the
    // shared store last.
    manager.shutdown().await;
    bridge.abort();
    drop(bus);
    drop(store);
    info!(target: "quarry", "shutdown complete");
    Ok(())
}

#[cfg(unix)]
async fn wait_for_shutdown() -> Result<()> {
    use tokio::signal::unix::{signal, SignalKind};
    let mut sigterm = signal(SignalKind::terminate()).context("installing SIGTERM handler")?;
    tokio::select! {
        res = tokio::signal::ctrl_c() => res.context("waiting for ctrl-c")?,
        _ = sigterm.recv() => {}
    }
    Ok(())
}

#[cfg(not(unix))]
async fn wait_for_shutdown() -> Result<()> {
    tokio::signal::ctrl_c().await.context("waiting for ctrl-c")?;
    Ok(())
}
