//! Fetch pipeline error types and their retry classification.

use quarry_bus::PublishError;
use quarry_primitives::SourceError;
use quarry_storage::StorageError;

/// Errors surfaced by the fetch pipeline.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// A height-scoped source failure.
    #[error("source error at height {height}: {source}")]
    Source {
        /// The height being processed.
        height: u64,
        /// The underlying source error.
        source: SourceError,
    },
    /// Tip discovery kept failing; the endpoint is unusable.
    #[error("tip discovery failed after {attempts} attempts: {last}")]
    TipUnavailable {
        /// How many attempts were made.
        attempts: u32,
        /// The last error observed.
        last: SourceError,
    },
    /// The peer returned a receipt set that disagrees with the block.
    #[error(
        "receipt count mismatch at height {height}: block has {expected} transactions, \
         peer returned {actual} receipts"
    )]
    ReceiptMismatch {
        /// The height being processed.
        height: u64,
        /// The block's transaction count.
        expected: usize,
        /// The receipt count returned.
        actual: usize,
    },
    /// The storage layer failed.
    #[error(transparent)]
    Storage(#[from] StorageError),
    /// The event bus refused a publish.
    #[error("event bus error: {0}")]
    Bus(#[from] PublishError),
    /// The pipeline was cancelled. A clean exit, not a failure.
    #[error("fetch cancelled")]
    Cancelled,
    /// `run` was called while the pipeline is already running.
    #[error("fetcher is already running")]
    AlreadyRunning,
}

impl FetchError {
    /// Errors that poison the instance: the store no longer upholds its
    /// invariants.
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::Storage(err) if err.is_consistency())
    }

    /// Whether retrying the height may succeed.
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Source { source, .. } => {
                source.is_transient() || matches!(source, SourceError::NotFound(_))
            }
            Self::Storage(err) => !err.is_consistency(),
            Self::ReceiptMismatch { .. } => true,
            _ => false,
        }
    }
}
