//! This module contains all CLI-specific code for the indexer binary.

use clap::Parser;
use std::path::PathBuf;

/// The indexer binary CLI application arguments.
///
/// Flags override environment variables, which override the config file.
#[derive(Debug, Parser)]
#[command(name = "quarry", version, about = "EVM blockchain indexer")]
pub struct Cli {
    /// Path to the YAML config file.
    #[arg(long, short = 'c')]
    pub config: Option<PathBuf>,
    /// JSON-RPC endpoint of the chain to index.
    #[arg(long, env = "INDEXER_RPC_ENDPOINT")]
    pub rpc: Option<String>,
    /// Data directory for the key-value store.
    #[arg(long, env = "INDEXER_DB_PATH")]
    pub db: Option<PathBuf>,
    /// First height to index on a fresh store.
    #[arg(long, env = "INDEXER_START_HEIGHT")]
    pub start_height: Option<u64>,
    /// Concurrent height workers per chain.
    #[arg(long, env = "INDEXER_WORKERS")]
    pub workers: Option<usize>,
    /// Heights per dispatched work item.
    #[arg(long, env = "INDEXER_CHUNK_SIZE")]
    pub batch_size: Option<u64>,
    /// Log level.
    #[arg(long, env = "INDEXER_LOG_LEVEL", value_parser = ["debug", "info", "warn", "error"])]
    pub log_level: Option<String>,
    /// Log output format.
    #[arg(long, env = "INDEXER_LOG_FORMAT", value_parser = ["json", "console"])]
    pub log_format: Option<String>,
    /// Run a gap-recovery pass at startup.
    #[arg(long)]
    pub gap_recovery: bool,
    /// Destroy the data directory before starting.
    #[arg(long)]
    pub clear_data: bool,
    /// Serve prometheus metrics.
    #[arg(long)]
    pub metrics: bool,
    /// Metrics bind host.
    #[arg(long)]
    pub metrics_host: Option<String>,
    /// Metrics bind port.
    #[arg(long)]
    pub metrics_port: Option<u16>,
    /// Force the adapter family instead of detecting it.
    #[arg(long, value_parser = ["anvil", "stableone", "evm"])]
    pub adapter: Option<String>,
}

#[cfg(test)]
mod test {
    use super::Cli;
    use clap::Parser;

    #[test]
    fn test_flags() {
        let cases: &[(&[&str], bool)] = &[
            (&["quarry"], true),
            (&["quarry", "--rpc", "http://localhost:8545", "--db", "./data"], true),
            (&["quarry", "--gap-recovery", "--clear-data"], true),
            (&["quarry", "--adapter", "stableone"], true),
            (&["quarry", "--adapter", "bitcoin"], false),
            (&["quarry", "--log-level", "noisy"], false),
            (&["quarry", "--log-format", "xml"], false),
            (&["quarry", "--workers", "eight"], false),
        ];
        for (args, valid) in cases {
            let parsed = Cli::try_parse_from(args.iter());
            assert_eq!(parsed.is_ok(), *valid, "args {args:?}");
        }
    }
}
