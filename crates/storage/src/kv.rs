//! The [KeyValueStore] trait.

use crate::errors::StorageError;

/// One operation in an atomic write batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOp {
    /// Set a key to a value.
    Put(Vec<u8>, Vec<u8>),
    /// Remove a key.
    Delete(Vec<u8>),
}

impl BatchOp {
    /// Builds a put operation.
    pub fn put(key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> Self {
        Self::Put(key.into(), value.into())
    }
}

/// Describes the interface of an ordered key-value store with atomic batched
/// writes.
///
/// Implementations are shared across chains and across worker tasks; all
/// methods take `&self` and must be safe for concurrent use. Writers for
/// different heights touch disjoint key sets, so the store's own internal
/// synchronization is the only locking required.
pub trait KeyValueStore: Send + Sync + core::fmt::Debug {
    /// Get the value associated with the given key.
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StorageError>;

    /// Set the value associated with the given key.
    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), StorageError>;

    /// Remove a key. Removing an absent key is not an error.
    fn delete(&self, key: &[u8]) -> Result<(), StorageError>;

    /// Apply a batch of operations atomically: either every operation
    /// becomes visible or none does.
    fn write_batch(&self, batch: Vec<BatchOp>) -> Result<(), StorageError>;

    /// Returns all keys beginning with `prefix`, in lexicographic order.
    fn keys_with_prefix(&self, prefix: &[u8]) -> Result<Vec<Vec<u8>>, StorageError>;

    /// Returns all entries beginning with `prefix`, in lexicographic key
    /// order.
    fn iter_prefix(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StorageError>;
}
