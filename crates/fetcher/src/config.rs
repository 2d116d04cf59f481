//! Fetch pipeline configuration.

use std::time::Duration;

/// Gas-used threshold above which a block's receipts are fetched with the
/// inner per-transaction fan-out.
pub const DEFAULT_HEAVY_GAS_THRESHOLD: u64 = 50_000_000;

/// Default cap on the inner receipt fan-out.
pub const DEFAULT_RECEIPT_WORKERS: usize = 10;

/// Tuning knobs for one chain's pipeline.
#[derive(Debug, Clone)]
pub struct FetcherConfig {
    /// First height to index when the store is empty.
    pub start_height: u64,
    /// Heights per dispatched work item. A batch size of 1 selects
    /// real-time tailing behavior.
    pub batch_size: u64,
    /// Concurrent height workers.
    pub workers: usize,
    /// Attempts per height before the failure is reported and the worker
    /// moves on.
    pub max_retries: u32,
    /// Base retry delay; scales linearly with the attempt number.
    pub retry_delay: Duration,
    /// Confirmation depth subtracted from the observed tip.
    pub confirmations: u64,
    /// Sleep between tip polls once caught up.
    pub poll_interval: Duration,
    /// See [DEFAULT_HEAVY_GAS_THRESHOLD].
    pub heavy_gas_threshold: u64,
    /// See [DEFAULT_RECEIPT_WORKERS].
    pub receipt_workers: usize,
    /// Bounded depth of the dispatch queue; dispatch blocks when workers
    /// fall behind.
    pub queue_depth: usize,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            start_height: 0,
            batch_size: 32,
            workers: 4,
            max_retries: 3,
            retry_delay: Duration::from_secs(1),
            confirmations: 0,
            poll_interval: Duration::from_secs(3),
            heavy_gas_threshold: DEFAULT_HEAVY_GAS_THRESHOLD,
            receipt_workers: DEFAULT_RECEIPT_WORKERS,
            queue_depth: 16,
        }
    }
}

impl FetcherConfig {
    /// The delay before retry `attempt` (1-based). Linear in the attempt
    /// number; real-time tailing (batch size 1) uses a ~200 ms base so a
    /// block that is merely late at the peer is re-checked promptly.
    pub fn retry_delay_for(&self, attempt: u32) -> Duration {
        let base = if self.batch_size == 1 {
            Duration::from_millis(200)
        } else {
            self.retry_delay
        };
        base.saturating_mul(attempt.max(1))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn retry_delay_scales_linearly() {
        let cfg = FetcherConfig { retry_delay: Duration::from_millis(100), ..Default::default() };
        assert_eq!(cfg.retry_delay_for(1), Duration::from_millis(100));
        assert_eq!(cfg.retry_delay_for(3), Duration::from_millis(300));
    }

    #[test]
    fn realtime_tailing_uses_short_delays() {
        let cfg = FetcherConfig {
            batch_size: 1,
            retry_delay: Duration::from_secs(5),
            ..Default::default()
        };
        assert_eq!(cfg.retry_delay_for(1), Duration::from_millis(200));
    }
}
