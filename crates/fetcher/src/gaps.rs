//! Gap recovery: find missing heights among the persisted blocks and
//! re-enqueue them into the running pipeline.

use crate::fetcher::{FetcherHandle, HeightRange};
use crate::FetchError;
use quarry_storage::ChainStore;
use std::time::Duration;
use tracing::{debug, info};

/// What one recovery scan found and re-enqueued.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct GapReport {
    /// The missing ranges, ascending.
    pub ranges: Vec<HeightRange>,
    /// Total number of missing heights.
    pub missing: u64,
}

/// Scans the persisted block keys of a chain and re-enqueues holes.
///
/// Recovery shares the pipeline's worker pool and never touches the
/// watermark itself; contiguity still governs advancement once the holes
/// are filled.
#[derive(Debug)]
pub struct GapRecovery {
    store: ChainStore,
    handle: FetcherHandle,
}

impl GapRecovery {
    /// Creates a recovery routine over a chain's store and pipeline handle.
    pub const fn new(store: ChainStore, handle: FetcherHandle) -> Self {
        Self { store, handle }
    }

    /// Computes the missing ranges below the highest persisted height.
    pub fn scan(&self) -> Result<GapReport, FetchError> {
        let heights = self.store.block_heights_from(0)?;
        let Some(&highest) = heights.last() else {
            return Ok(GapReport::default());
        };

        let mut ranges = Vec::new();
        let mut missing = 0u64;
        let mut expected = 0u64;
        for &height in &heights {
            if height > expected {
                let range = HeightRange { lo: expected, hi: height - 1 };
                missing += range.len();
                ranges.push(range);
            }
            expected = height + 1;
        }
        debug!(
            target: "gaps",
            chain_id = self.store.chain_id(), highest, missing,
            "gap scan complete"
        );
        Ok(GapReport { ranges, missing })
    }

    /// Runs one scan-and-enqueue pass.
    pub async fn recover_once(&self) -> Result<GapReport, FetchError> {
        let report = self.scan()?;
        if report.missing > 0 {
            info!(
                target: "gaps",
                chain_id = self.store.chain_id(),
                missing = report.missing,
                ranges = report.ranges.len(),
                "re-enqueueing missing heights"
            );
            for range in &report.ranges {
                self.handle.enqueue(*range).await?;
            }
        }
        Ok(report)
    }

    /// Runs recovery periodically until the pipeline shuts down.
    pub async fn run(&self, interval: Duration) {
        loop {
            tokio::select! {
                _ = self.handle.closed() => return,
                _ = tokio::time::sleep(interval) => {}
            }
            match self.recover_once().await {
                Ok(_) => {}
                Err(FetchError::Cancelled) => return,
                Err(err) => {
                    tracing::warn!(
                        target: "gaps",
                        chain_id = self.store.chain_id(), %err,
                        "gap recovery pass failed"
                    );
                }
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use quarry_primitives::MockChain;
    use quarry_storage::MemoryStore;
    use std::sync::Arc;

    fn seeded_store(heights: &[u64]) -> ChainStore {
        let store = ChainStore::new(1, Arc::new(MemoryStore::new()));
        for &height in heights {
            store.commit_block(&MockChain::empty_block(height), &[]).unwrap();
        }
        store
    }

    fn dummy_recovery(store: ChainStore) -> GapRecovery {
        use quarry_bus::{BusConfig, EventBus};
        use tokio_util::sync::CancellationToken;

        let fetcher = crate::Fetcher::new(
            crate::FetcherConfig::default(),
            Arc::new(MockChain::new()),
            store.clone(),
            EventBus::new(BusConfig::default()),
            None,
            None,
            CancellationToken::new(),
        );
        GapRecovery::new(store, fetcher.handle())
    }

    #[tokio::test]
    async fn scan_finds_interior_and_leading_holes() {
        let store = seeded_store(&[0, 1, 2, 5, 6, 9]);
        let recovery = dummy_recovery(store);

        let report = recovery.scan().unwrap();
        assert_eq!(
            report.ranges,
            vec![HeightRange { lo: 3, hi: 4 }, HeightRange { lo: 7, hi: 8 }]
        );
        assert_eq!(report.missing, 4);
    }

    #[tokio::test]
    async fn scan_of_a_leading_gap_starts_at_zero() {
        let store = seeded_store(&[3, 4]);
        let recovery = dummy_recovery(store);
        let report = recovery.scan().unwrap();
        assert_eq!(report.ranges, vec![HeightRange { lo: 0, hi: 2 }]);
    }

    #[tokio::test]
    async fn empty_store_has_no_gaps() {
        let store = seeded_store(&[]);
        let recovery = dummy_recovery(store);
        assert_eq!(recovery.scan().unwrap(), GapReport::default());
    }
}
