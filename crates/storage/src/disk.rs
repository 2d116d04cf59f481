//! Contains a concrete implementation of the [KeyValueStore] trait that
//! stores data on disk using [rocksdb].

use crate::{
    errors::StorageError,
    kv::{BatchOp, KeyValueStore},
};
use rocksdb::{Direction, IteratorMode, Options, WriteBatch, DB};
use std::path::{Path, PathBuf};

/// A [KeyValueStore] backed by RocksDB.
#[derive(Debug)]
pub struct DiskStore {
    db: DB,
}

impl DiskStore {
    /// Opens (or creates) a store at the given data directory.
    pub fn open(data_directory: &Path) -> Result<Self, StorageError> {
        let db = DB::open(&Self::db_options(), data_directory)?;
        Ok(Self { db })
    }

    /// Opens a store read-only; writes will fail at the backend.
    pub fn open_read_only(data_directory: &Path) -> Result<Self, StorageError> {
        let db = DB::open_for_read_only(&Self::db_options(), data_directory, false)?;
        Ok(Self { db })
    }

    /// Destroys the database at the given directory. Used by `--clear-data`.
    pub fn destroy(data_directory: &PathBuf) -> Result<(), StorageError> {
        DB::destroy(&Self::db_options(), data_directory)?;
        Ok(())
    }

    /// Gets the [Options] for the underlying RocksDB instance.
    fn db_options() -> Options {
        let mut options = Options::default();
        options.set_compression_type(rocksdb::DBCompressionType::Snappy);
        options.create_if_missing(true);
        options
    }
}

impl KeyValueStore for DiskStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(self.db.get(key)?)
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), StorageError> {
        Ok(self.db.put(key, value)?)
    }

    fn delete(&self, key: &[u8]) -> Result<(), StorageError> {
        Ok(self.db.delete(key)?)
    }

    fn write_batch(&self, batch: Vec<BatchOp>) -> Result<(), StorageError> {
        let mut write = WriteBatch::default();
        for op in batch {
            match op {
                BatchOp::Put(key, value) => write.put(key, value),
                BatchOp::Delete(key) => write.delete(key),
            }
        }
        Ok(self.db.write(write)?)
    }

    fn keys_with_prefix(&self, prefix: &[u8]) -> Result<Vec<Vec<u8>>, StorageError> {
        let mut keys = Vec::new();
        for entry in self.db.iterator(IteratorMode::From(prefix, Direction::Forward)) {
            let (key, _) = entry?;
            if !key.starts_with(prefix) {
                break;
            }
            keys.push(key.to_vec());
        }
        Ok(keys)
    }

    fn iter_prefix(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StorageError> {
        let mut entries = Vec::new();
        for entry in self.db.iterator(IteratorMode::From(prefix, Direction::Forward)) {
            let (key, value) = entry?;
            if !key.starts_with(prefix) {
                break;
            }
            entries.push((key.to_vec(), value.to_vec()));
        }
        Ok(entries)
    }
}

#[cfg(test)]
mod test {
    use super::DiskStore;
    use crate::kv::{BatchOp, KeyValueStore};
    use proptest::{
        arbitrary::any,
        collection::{hash_map, vec},
        proptest,
    };

    proptest! {
        /// Writes applied through a batch read back unchanged.
        #[test]
        fn batched_writes_round_trip(
            k_v in hash_map(vec(any::<u8>(), 1..64), vec(any::<u8>(), 0..128), 1..64)
        ) {
            let dir = tempfile::tempdir().unwrap();
            let store = DiskStore::open(dir.path()).unwrap();
            let batch = k_v
                .iter()
                .map(|(k, v)| BatchOp::put(k.clone(), v.clone()))
                .collect::<Vec<_>>();
            store.write_batch(batch).unwrap();

            for (k, v) in k_v {
                assert_eq!(store.get(&k).unwrap(), Some(v));
            }
        }
    }

    #[test]
    fn prefix_iteration_is_ordered_and_bounded() {
        let dir = tempfile::tempdir().unwrap();
        let store = DiskStore::open(dir.path()).unwrap();
        store.put(b"a:2", b"two").unwrap();
        store.put(b"a:1", b"one").unwrap();
        store.put(b"b:1", b"other").unwrap();

        let keys = store.keys_with_prefix(b"a:").unwrap();
        assert_eq!(keys, vec![b"a:1".to_vec(), b"a:2".to_vec()]);
    }
}
