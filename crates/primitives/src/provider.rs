//! The [BlockSource] trait: the seam between the fetch pipeline and whatever
//! supplies chain data, be it a live JSON-RPC client or a test fixture.

use crate::{block::FetchedBlock, receipt::ReceiptRecord, BlockRecord};
use alloy_primitives::B256;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Errors a [BlockSource] can surface, pre-classified for retry policy.
///
/// Transient errors are retried by the fetch pipeline; decode errors are not.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SourceError {
    /// A transport-level failure: timeout, reset, 5xx. Retryable.
    #[error("transient source error: {0}")]
    Transient(String),
    /// The peer returned data the parser rejects. Not retryable.
    #[error("decode error: {0}")]
    Decode(String),
    /// The requested record does not exist at the peer.
    #[error("not found: {0}")]
    NotFound(String),
}

impl SourceError {
    /// Returns `true` if retrying the call may succeed.
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

/// Cumulative call counters a source keeps about itself.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceStats {
    /// Total calls issued.
    pub calls: u64,
    /// Calls that returned an error.
    pub errors: u64,
}

/// Describes a data source that can provide blocks and receipts for one
/// chain.
///
/// Implementations must be cheap to share behind an [`Arc`](std::sync::Arc);
/// all methods take `&self` and the fetch pipeline calls them from many
/// workers concurrently.
#[async_trait]
pub trait BlockSource: Send + Sync + core::fmt::Debug {
    /// Returns the highest block number the peer reports as canonical.
    async fn block_number(&self) -> Result<u64, SourceError>;

    /// Returns the block at the given height with full transactions, or
    /// `None` if the peer does not have it.
    async fn block_by_number(&self, number: u64) -> Result<Option<FetchedBlock>, SourceError>;

    /// Returns all receipts for the given block, in transaction order.
    async fn block_receipts(&self, block: &BlockRecord) -> Result<Vec<ReceiptRecord>, SourceError>;

    /// Returns the receipt for a single transaction, or `None` if the peer
    /// does not know the hash.
    async fn transaction_receipt(&self, hash: B256)
        -> Result<Option<ReceiptRecord>, SourceError>;

    /// Returns the source's cumulative call counters.
    fn stats(&self) -> SourceStats {
        SourceStats::default()
    }
}
