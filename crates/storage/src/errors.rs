//! Storage error types.

/// Errors surfaced by the storage layer.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The requested record does not exist. Benign for reads above the
    /// watermark.
    #[error("record not found: {0}")]
    NotFound(String),
    /// A record below the watermark is missing: the store no longer upholds
    /// the contiguity invariant and operator intervention is implied.
    #[error(
        "consistency violation: chain {chain_id} has no block at height {height} \
         below watermark {watermark}"
    )]
    Consistency {
        /// The chain the violation was observed on.
        chain_id: u64,
        /// The missing height.
        height: u64,
        /// The watermark the store claimed.
        watermark: u64,
    },
    /// The underlying key-value backend failed.
    #[error("storage backend error: {0}")]
    Backend(String),
    /// A stored value failed to decode.
    #[error("record codec error: {0}")]
    Codec(#[from] serde_json::Error),
}

impl StorageError {
    /// Returns `true` for the consistency violation class.
    pub const fn is_consistency(&self) -> bool {
        matches!(self, Self::Consistency { .. })
    }
}

impl From<rocksdb::Error> for StorageError {
    fn from(err: rocksdb::Error) -> Self {
        Self::Backend(err.to_string())
    }
}
