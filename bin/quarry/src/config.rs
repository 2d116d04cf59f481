//! Configuration loading: defaults, then the YAML file, then environment
//! variables, then CLI flags.

use crate::cli::Cli;
use anyhow::{anyhow, bail, Context, Result};
use serde::Deserialize;
use std::{env, path::Path, time::Duration};

/// The allowed log levels.
pub const LOG_LEVELS: [&str; 4] = ["debug", "info", "warn", "error"];

/// The allowed event-bus backends. Only `local` is wired; the others are
/// validated and rejected at startup as unsupported.
pub const EVENTBUS_TYPES: [&str; 4] = ["local", "redis", "kafka", "hybrid"];

/// The allowed node roles.
pub const NODE_ROLES: [&str; 3] = ["writer", "reader", "all"];

/// The full indexer configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Default RPC settings for single-chain operation.
    pub rpc: RpcConfig,
    /// Key-value store settings.
    pub database: DatabaseConfig,
    /// Logging settings.
    pub log: LogConfig,
    /// Pipeline defaults.
    pub indexer: IndexerConfig,
    /// Per-chain overrides and manager settings.
    pub multichain: MultichainConfig,
    /// Event-bus settings.
    pub eventbus: EventBusConfig,
    /// Identity of this indexer node.
    pub node: NodeConfig,
}

/// RPC settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RpcConfig {
    /// The JSON-RPC endpoint.
    pub endpoint: String,
    /// Per-call deadline, as a duration string.
    pub timeout: String,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self { endpoint: "http://localhost:8545".to_string(), timeout: "30s".to_string() }
    }
}

/// Key-value store settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Data directory.
    pub path: String,
    /// Open the store read-only.
    pub readonly: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self { path: "./data".to_string(), readonly: false }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Log level.
    pub level: String,
    /// Output format: `console` or `json`.
    pub format: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), format: "console".to_string() }
    }
}

/// Pipeline defaults, overridable per chain.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IndexerConfig {
    /// First height to index on a fresh store.
    pub start_height: u64,
    /// Concurrent height workers.
    pub workers: usize,
    /// Heights per work item.
    pub batch_size: u64,
    /// Confirmation depth subtracted from the tip.
    pub confirmations: u64,
    /// Tip poll interval once caught up.
    pub poll_interval: String,
    /// Attempts per height.
    pub max_retries: u32,
    /// Base retry delay.
    pub retry_delay: String,
    /// Run a gap-recovery pass at startup.
    pub gap_recovery: bool,
    /// Periodic gap-recovery interval, if any.
    pub gap_recovery_interval: Option<String>,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            start_height: 0,
            workers: 4,
            batch_size: 32,
            confirmations: 0,
            poll_interval: "3s".to_string(),
            max_retries: 3,
            retry_delay: "1s".to_string(),
            gap_recovery: false,
            gap_recovery_interval: None,
        }
    }
}

/// Manager settings and the chain list.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MultichainConfig {
    /// The chains to index. Empty means single-chain mode over [RpcConfig].
    pub chains: Vec<ChainEntry>,
    /// Health monitor interval.
    pub health_check_interval: String,
    /// Restart errored instances automatically.
    pub auto_restart: bool,
    /// Minimum error age before a restart.
    pub auto_restart_delay: String,
}

impl Default for MultichainConfig {
    fn default() -> Self {
        Self {
            chains: Vec::new(),
            health_check_interval: "15s".to_string(),
            auto_restart: true,
            auto_restart_delay: "30s".to_string(),
        }
    }
}

/// One configured chain.
#[derive(Debug, Clone, Deserialize)]
pub struct ChainEntry {
    /// The instance id.
    pub id: String,
    /// The chain's JSON-RPC endpoint.
    pub rpc_endpoint: String,
    /// Forced adapter family; detected when absent.
    #[serde(default)]
    pub adapter: Option<String>,
    /// Per-chain start height override.
    #[serde(default)]
    pub start_height: Option<u64>,
    /// Per-chain worker override.
    #[serde(default)]
    pub workers: Option<usize>,
    /// Per-chain batch-size override.
    #[serde(default)]
    pub batch_size: Option<u64>,
    /// Per-chain confirmation depth override.
    #[serde(default)]
    pub confirmations: Option<u64>,
    /// Consensus epoch length override.
    #[serde(default)]
    pub epoch_length: Option<u64>,
}

/// Event-bus settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EventBusConfig {
    /// Backend type; see [EVENTBUS_TYPES].
    #[serde(rename = "type")]
    pub bus_type: String,
    /// Publish queue depth.
    pub queue_depth: usize,
    /// Replay ring size.
    pub history: usize,
    /// Default subscriber buffer.
    pub buffer: usize,
}

impl Default for EventBusConfig {
    fn default() -> Self {
        Self { bus_type: "local".to_string(), queue_depth: 1024, history: 256, buffer: 256 }
    }
}

/// Identity of this indexer node.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Node id.
    pub id: String,
    /// Node role; see [NODE_ROLES].
    pub role: String,
    /// Scheduling priority among nodes. Informational.
    pub priority: u32,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self { id: "quarry-0".to_string(), role: "all".to_string(), priority: 0 }
    }
}

impl Config {
    /// Loads the configuration with the full precedence chain applied:
    /// defaults < YAML < environment < CLI flags.
    pub fn load(cli: &Cli) -> Result<Self> {
        let mut config = match &cli.config {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env()?;
        config.apply_cli(cli);
        config.validate()?;
        Ok(config)
    }

    /// Parses the YAML config file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        serde_yaml::from_str(&raw)
            .with_context(|| format!("parsing config file {}", path.display()))
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(value) = env::var("INDEXER_RPC_TIMEOUT") {
            self.rpc.timeout = value;
        }
        if let Ok(value) = env::var("INDEXER_DB_READONLY") {
            self.database.readonly = parse_bool("INDEXER_DB_READONLY", &value)?;
        }
        if let Ok(value) = env::var("INDEXER_EVENTBUS_TYPE") {
            self.eventbus.bus_type = value;
        }
        if let Ok(value) = env::var("INDEXER_EVENTBUS_QUEUE_DEPTH") {
            self.eventbus.queue_depth =
                value.parse().map_err(|e| anyhow!("INDEXER_EVENTBUS_QUEUE_DEPTH: {e}"))?;
        }
        if let Ok(value) = env::var("INDEXER_EVENTBUS_HISTORY") {
            self.eventbus.history =
                value.parse().map_err(|e| anyhow!("INDEXER_EVENTBUS_HISTORY: {e}"))?;
        }
        if let Ok(value) = env::var("INDEXER_EVENTBUS_BUFFER") {
            self.eventbus.buffer =
                value.parse().map_err(|e| anyhow!("INDEXER_EVENTBUS_BUFFER: {e}"))?;
        }
        if let Ok(value) = env::var("INDEXER_NODE_ID") {
            self.node.id = value;
        }
        if let Ok(value) = env::var("INDEXER_NODE_ROLE") {
            self.node.role = value;
        }
        if let Ok(value) = env::var("INDEXER_NODE_PRIORITY") {
            self.node.priority =
                value.parse().map_err(|e| anyhow!("INDEXER_NODE_PRIORITY: {e}"))?;
        }
        Ok(())
    }

    // Flag-shaped settings arrive through clap, which already folds their
    // environment variables in with the right precedence.
    fn apply_cli(&mut self, cli: &Cli) {
        if let Some(rpc) = &cli.rpc {
            self.rpc.endpoint = rpc.clone();
        }
        if let Some(db) = &cli.db {
            self.database.path = db.display().to_string();
        }
        if let Some(start_height) = cli.start_height {
            self.indexer.start_height = start_height;
        }
        if let Some(workers) = cli.workers {
            self.indexer.workers = workers;
        }
        if let Some(batch_size) = cli.batch_size {
            self.indexer.batch_size = batch_size;
        }
        if let Some(level) = &cli.log_level {
            self.log.level = level.clone();
        }
        if let Some(format) = &cli.log_format {
            self.log.format = format.clone();
        }
        if cli.gap_recovery {
            self.indexer.gap_recovery = true;
        }
    }

    /// Applies the validation rules.
    pub fn validate(&self) -> Result<()> {
        if self.rpc.endpoint.trim().is_empty() {
            bail!("rpc.endpoint must not be empty");
        }
        if self.database.path.trim().is_empty() {
            bail!("database.path must not be empty");
        }
        if self.indexer.workers == 0 {
            bail!("indexer.workers must be greater than zero");
        }
        if self.indexer.batch_size == 0 {
            bail!("indexer.batch_size must be greater than zero");
        }
        if !LOG_LEVELS.contains(&self.log.level.as_str()) {
            bail!("log.level must be one of {LOG_LEVELS:?}");
        }
        if !["console", "json"].contains(&self.log.format.as_str()) {
            bail!("log.format must be `console` or `json`");
        }
        if !EVENTBUS_TYPES.contains(&self.eventbus.bus_type.as_str()) {
            bail!("eventbus.type must be one of {EVENTBUS_TYPES:?}");
        }
        if !NODE_ROLES.contains(&self.node.role.as_str()) {
            bail!("node.role must be one of {NODE_ROLES:?}");
        }
        self.rpc_timeout()?;
        self.poll_interval()?;
        self.retry_delay()?;
        self.health_check_interval()?;
        self.auto_restart_delay()?;
        self.gap_recovery_interval()?;
        for entry in &self.multichain.chains {
            if entry.id.trim().is_empty() {
                bail!("multichain chain entries need a non-empty id");
            }
            if entry.rpc_endpoint.trim().is_empty() {
                bail!("chain `{}` has an empty rpc_endpoint", entry.id);
            }
            if let Some(adapter) = &entry.adapter {
                if !["anvil", "stableone", "evm"].contains(&adapter.as_str()) {
                    bail!("chain `{}` has unknown adapter `{adapter}`", entry.id);
                }
            }
        }
        Ok(())
    }

    /// The chains to run: the configured list, or a synthesized single
    /// `default` chain over the top-level RPC settings.
    pub fn chain_entries(&self) -> Vec<ChainEntry> {
        if self.multichain.chains.is_empty() {
            vec![ChainEntry {
                id: "default".to_string(),
                rpc_endpoint: self.rpc.endpoint.clone(),
                adapter: None,
                start_height: None,
                workers: None,
                batch_size: None,
                confirmations: None,
                epoch_length: None,
            }]
        } else {
            self.multichain.chains.clone()
        }
    }

    /// The parsed RPC deadline.
    pub fn rpc_timeout(&self) -> Result<Duration> {
        parse_duration("rpc.timeout", &self.rpc.timeout)
    }

    /// The parsed tip poll interval.
    pub fn poll_interval(&self) -> Result<Duration> {
        parse_duration("indexer.poll_interval", &self.indexer.poll_interval)
    }

    /// The parsed base retry delay.
    pub fn retry_delay(&self) -> Result<Duration> {
        parse_duration("indexer.retry_delay", &self.indexer.retry_delay)
    }

    /// The parsed health monitor interval.
    pub fn health_check_interval(&self) -> Result<Duration> {
        parse_duration(
            "multichain.health_check_interval",
            &self.multichain.health_check_interval,
        )
    }

    /// The parsed auto-restart delay.
    pub fn auto_restart_delay(&self) -> Result<Duration> {
        parse_duration("multichain.auto_restart_delay", &self.multichain.auto_restart_delay)
    }

    /// The parsed periodic gap-recovery interval, if configured.
    pub fn gap_recovery_interval(&self) -> Result<Option<Duration>> {
        self.indexer
            .gap_recovery_interval
            .as_ref()
            .map(|raw| parse_duration("indexer.gap_recovery_interval", raw))
            .transpose()
    }
}

fn parse_duration(field: &str, raw: &str) -> Result<Duration> {
    humantime::parse_duration(raw).map_err(|e| anyhow!("{field}: {e}"))
}

fn parse_bool(field: &str, raw: &str) -> Result<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => Ok(true),
        "0" | "false" | "no" => Ok(false),
        other => bail!("{field}: expected a boolean, got {other:?}"),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn defaults_validate() {
        Config::default().validate().unwrap();
    }

    #[test]
    fn yaml_sections_parse() {
        let yaml = r#"
rpc:
  endpoint: "http://10.0.0.1:8545"
  timeout: "10s"
database:
  path: "/var/lib/quarry"
log:
  level: "debug"
  format: "json"
indexer:
  workers: 8
  batch_size: 64
  gap_recovery: true
multichain:
  auto_restart_delay: "5s"
  chains:
    - id: "mainnet"
      rpc_endpoint: "http://10.0.0.1:8545"
    - id: "stable"
      rpc_endpoint: "http://10.0.0.2:8545"
      adapter: "stableone"
      epoch_length: 20
eventbus:
  type: "local"
  history: 64
node:
  role: "writer"
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        config.validate().unwrap();
        assert_eq!(config.indexer.workers, 8);
        assert_eq!(config.rpc_timeout().unwrap(), Duration::from_secs(10));
        assert_eq!(config.chain_entries().len(), 2);
        assert_eq!(config.chain_entries()[1].adapter.as_deref(), Some("stableone"));
        assert_eq!(config.eventbus.history, 64);
        assert_eq!(config.node.role, "writer");
    }

    #[test]
    fn single_chain_mode_synthesizes_a_default_entry() {
        let config = Config::default();
        let chains = config.chain_entries();
        assert_eq!(chains.len(), 1);
        assert_eq!(chains[0].id, "default");
        assert_eq!(chains[0].rpc_endpoint, config.rpc.endpoint);
    }

    #[test]
    fn validation_rejects_bad_values() {
        let mut config = Config::default();
        config.indexer.workers = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.log.level = "noisy".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.eventbus.bus_type = "carrier-pigeon".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.node.role = "spectator".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.rpc.timeout = "soon".to_string();
        assert!(config.validate().is_err());
    }
}
