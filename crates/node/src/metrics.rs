//! Per-instance atomic counters.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counters one instance keeps about itself. Incremented lock-free; reads
/// are independent loads, not a consistent snapshot.
#[derive(Debug, Default)]
pub struct InstanceMetrics {
    blocks: AtomicU64,
    transactions: AtomicU64,
    logs: AtomicU64,
}

impl InstanceMetrics {
    /// Counts one indexed block.
    pub fn record_block(&self) {
        self.blocks.fetch_add(1, Ordering::Relaxed);
    }

    /// Counts one indexed transaction.
    pub fn record_transaction(&self) {
        self.transactions.fetch_add(1, Ordering::Relaxed);
    }

    /// Counts one indexed log.
    pub fn record_log(&self) {
        self.logs.fetch_add(1, Ordering::Relaxed);
    }

    /// Reads the counters, combining them with the RPC stats the source
    /// keeps about itself.
    pub fn snapshot(&self, rpc_calls: u64, rpc_errors: u64) -> MetricsSnapshot {
        MetricsSnapshot {
            blocks: self.blocks.load(Ordering::Relaxed),
            transactions: self.transactions.load(Ordering::Relaxed),
            logs: self.logs.load(Ordering::Relaxed),
            rpc_calls,
            rpc_errors,
        }
    }
}

/// A point-in-time read of an instance's counters.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    /// Blocks indexed.
    pub blocks: u64,
    /// Transactions indexed.
    pub transactions: u64,
    /// Logs indexed.
    pub logs: u64,
    /// RPC calls issued.
    pub rpc_calls: u64,
    /// RPC calls that failed.
    pub rpc_errors: u64,
}
