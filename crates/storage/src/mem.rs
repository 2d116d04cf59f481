//! Contains a concrete implementation of the [KeyValueStore] trait that
//! stores data in memory. Useful for testing and development purposes.

use crate::{
    errors::StorageError,
    kv::{BatchOp, KeyValueStore},
};
use std::{collections::BTreeMap, sync::RwLock};

/// A simple in-memory [KeyValueStore] over an ordered map.
#[derive(Debug, Default)]
pub struct MemoryStore {
    store: RwLock<BTreeMap<Vec<u8>, Vec<u8>>>,
}

impl MemoryStore {
    /// Create a new [MemoryStore] with an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// The number of entries held.
    pub fn len(&self) -> usize {
        self.store.read().unwrap().len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(self.store.read().unwrap().get(key).cloned())
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), StorageError> {
        self.store.write().unwrap().insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn delete(&self, key: &[u8]) -> Result<(), StorageError> {
        self.store.write().unwrap().remove(key);
        Ok(())
    }

    fn write_batch(&self, batch: Vec<BatchOp>) -> Result<(), StorageError> {
        // One write-lock scope makes the batch atomic to readers.
        let mut store = self.store.write().unwrap();
        for op in batch {
            match op {
                BatchOp::Put(key, value) => {
                    store.insert(key, value);
                }
                BatchOp::Delete(key) => {
                    store.remove(&key);
                }
            }
        }
        Ok(())
    }

    fn keys_with_prefix(&self, prefix: &[u8]) -> Result<Vec<Vec<u8>>, StorageError> {
        let store = self.store.read().unwrap();
        Ok(store
            .range(prefix.to_vec()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, _)| k.clone())
            .collect())
    }

    fn iter_prefix(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StorageError> {
        let store = self.store.read().unwrap();
        Ok(store
            .range(prefix.to_vec()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn prefix_scan_respects_boundaries() {
        let store = MemoryStore::new();
        store.put(b"chain:1:block:1", b"a").unwrap();
        store.put(b"chain:1:block:2", b"b").unwrap();
        store.put(b"chain:10:block:1", b"c").unwrap();

        let keys = store.keys_with_prefix(b"chain:1:block:").unwrap();
        assert_eq!(keys.len(), 2);
    }

    #[test]
    fn delete_in_batch_applies() {
        let store = MemoryStore::new();
        store.put(b"k", b"v").unwrap();
        store
            .write_batch(vec![BatchOp::put(b"k2".to_vec(), b"v2".to_vec()), BatchOp::Delete(b"k".to_vec())])
            .unwrap();
        assert_eq!(store.get(b"k").unwrap(), None);
        assert_eq!(store.get(b"k2").unwrap(), Some(b"v2".to_vec()));
    }
}
