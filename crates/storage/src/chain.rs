//! The [ChainStore]: a chain-scoped facade over the shared key-value store.

use crate::{
    errors::StorageError,
    keys,
    kv::{BatchOp, KeyValueStore},
};
use alloy_primitives::B256;
use quarry_primitives::{
    BlockRecord, FeeDelegationMeta, FetchedBlock, LogRecord, ReceiptRecord, TransactionRecord,
};
use std::sync::Arc;

/// Read/write access to one chain's records inside a shared store.
///
/// Cloning is cheap; all clones talk to the same backing store.
#[derive(Debug, Clone)]
pub struct ChainStore {
    chain_id: u64,
    store: Arc<dyn KeyValueStore>,
}

impl ChainStore {
    /// Creates a chain-scoped view over the given store.
    pub fn new(chain_id: u64, store: Arc<dyn KeyValueStore>) -> Self {
        Self { chain_id, store }
    }

    /// The chain this view is scoped to.
    pub const fn chain_id(&self) -> u64 {
        self.chain_id
    }

    /// Commits a block with its transactions, fee-delegation metas,
    /// receipts, and logs in one atomic batch.
    ///
    /// The watermark is not part of the batch; only the contiguity tracker
    /// advances it, via [Self::advance_watermark].
    pub fn commit_block(
        &self,
        fetched: &FetchedBlock,
        receipts: &[ReceiptRecord],
    ) -> Result<(), StorageError> {
        let block = &fetched.block;
        let mut batch = Vec::with_capacity(
            2 + block.transactions.len() + fetched.fee_metas.len() + receipts.len() * 2,
        );

        batch.push(BatchOp::put(
            keys::block(self.chain_id, block.number),
            serde_json::to_vec(block)?,
        ));
        batch.push(BatchOp::put(
            keys::block_hash(self.chain_id, &block.hash),
            serde_json::to_vec(&block.number)?,
        ));

        for tx in &block.transactions {
            batch.push(BatchOp::put(
                keys::transaction(self.chain_id, &tx.hash),
                serde_json::to_vec(tx)?,
            ));
        }
        for meta in &fetched.fee_metas {
            batch.push(BatchOp::put(
                keys::fee_meta(self.chain_id, &meta.transaction_hash),
                serde_json::to_vec(meta)?,
            ));
        }
        for receipt in receipts {
            batch.push(BatchOp::put(
                keys::receipt(self.chain_id, &receipt.transaction_hash),
                serde_json::to_vec(receipt)?,
            ));
            for log in &receipt.logs {
                batch.push(BatchOp::put(
                    keys::log(self.chain_id, log.block_number, log.log_index),
                    serde_json::to_vec(log)?,
                ));
            }
        }

        self.store.write_batch(batch)
    }

    /// Reads the block at a height.
    ///
    /// A missing block below the watermark is a [StorageError::Consistency]
    /// violation, not a plain not-found.
    pub fn block_by_number(&self, height: u64) -> Result<BlockRecord, StorageError> {
        match self.store.get(&keys::block(self.chain_id, height))? {
            Some(raw) => Ok(serde_json::from_slice(&raw)?),
            None => match self.watermark()? {
                Some(watermark) if height <= watermark => Err(StorageError::Consistency {
                    chain_id: self.chain_id,
                    height,
                    watermark,
                }),
                _ => Err(StorageError::NotFound(format!(
                    "chain {} block {height}",
                    self.chain_id
                ))),
            },
        }
    }

    /// Reads a block through the block-hash index.
    pub fn block_by_hash(&self, hash: &B256) -> Result<BlockRecord, StorageError> {
        match self.store.get(&keys::block_hash(self.chain_id, hash))? {
            Some(raw) => {
                let height: u64 = serde_json::from_slice(&raw)?;
                self.block_by_number(height)
            }
            None => {
                Err(StorageError::NotFound(format!("chain {} block {hash}", self.chain_id)))
            }
        }
    }

    /// Reads a transaction by hash.
    pub fn transaction(&self, hash: &B256) -> Result<TransactionRecord, StorageError> {
        match self.store.get(&keys::transaction(self.chain_id, hash))? {
            Some(raw) => Ok(serde_json::from_slice(&raw)?),
            None => Err(StorageError::NotFound(format!("chain {} tx {hash}", self.chain_id))),
        }
    }

    /// Reads the fee-delegation meta for a transaction, if one was stored.
    pub fn fee_meta(&self, hash: &B256) -> Result<Option<FeeDelegationMeta>, StorageError> {
        match self.store.get(&keys::fee_meta(self.chain_id, hash))? {
            Some(raw) => Ok(Some(serde_json::from_slice(&raw)?)),
            None => Ok(None),
        }
    }

    /// Reads a receipt by transaction hash.
    pub fn receipt(&self, hash: &B256) -> Result<ReceiptRecord, StorageError> {
        match self.store.get(&keys::receipt(self.chain_id, hash))? {
            Some(raw) => Ok(serde_json::from_slice(&raw)?),
            None => {
                Err(StorageError::NotFound(format!("chain {} receipt {hash}", self.chain_id)))
            }
        }
    }

    /// Reads all logs emitted in a block, ordered by log index.
    pub fn logs_in_block(&self, height: u64) -> Result<Vec<LogRecord>, StorageError> {
        self.store
            .iter_prefix(&keys::log_prefix(self.chain_id, height))?
            .into_iter()
            .map(|(_, raw)| serde_json::from_slice(&raw).map_err(StorageError::from))
            .collect()
    }

    /// Returns `true` if a block record exists at the height.
    pub fn has_block(&self, height: u64) -> Result<bool, StorageError> {
        Ok(self.store.get(&keys::block(self.chain_id, height))?.is_some())
    }

    /// The current watermark, or `None` if nothing was ever committed.
    pub fn watermark(&self) -> Result<Option<u64>, StorageError> {
        match self.store.get(&keys::latest(self.chain_id))? {
            Some(raw) => Ok(Some(serde_json::from_slice(&raw)?)),
            None => Ok(None),
        }
    }

    /// Advances the watermark. Regressions are ignored: the watermark is
    /// monotone.
    pub fn advance_watermark(&self, height: u64) -> Result<(), StorageError> {
        if let Some(current) = self.watermark()? {
            if height <= current {
                return Ok(());
            }
        }
        self.store.put(&keys::latest(self.chain_id), &serde_json::to_vec(&height)?)
    }

    /// Returns all persisted block heights at or above `from`, ascending.
    pub fn block_heights_from(&self, from: u64) -> Result<Vec<u64>, StorageError> {
        let prefix = keys::block_prefix(self.chain_id);
        let mut heights = Vec::new();
        for key in self.store.keys_with_prefix(&prefix)? {
            if let Some(height) = keys::parse_block_height(&key, self.chain_id) {
                if height >= from {
                    heights.push(height);
                }
            }
        }
        Ok(heights)
    }

    /// The underlying shared store.
    pub fn backing(&self) -> Arc<dyn KeyValueStore> {
        Arc::clone(&self.store)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::mem::MemoryStore;
    use quarry_primitives::MockChain;

    fn chain_store() -> ChainStore {
        ChainStore::new(1, Arc::new(MemoryStore::new()))
    }

    #[test]
    fn commit_then_read_back() {
        let store = chain_store();
        let fetched = MockChain::empty_block(3);
        store.commit_block(&fetched, &[]).unwrap();

        let block = store.block_by_number(3).unwrap();
        assert_eq!(block, fetched.block);
        let by_hash = store.block_by_hash(&fetched.block.hash).unwrap();
        assert_eq!(by_hash.number, 3);
        assert!(store.has_block(3).unwrap());
        assert!(!store.has_block(4).unwrap());
    }

    #[test]
    fn missing_block_below_watermark_is_a_consistency_error() {
        let store = chain_store();
        store.commit_block(&MockChain::empty_block(0), &[]).unwrap();
        store.advance_watermark(5).unwrap();

        let err = store.block_by_number(3).unwrap_err();
        assert!(err.is_consistency(), "expected consistency error, got {err}");

        // Above the watermark, the same miss is a plain not-found.
        let err = store.block_by_number(9).unwrap_err();
        assert!(matches!(err, StorageError::NotFound(_)));
    }

    #[test]
    fn watermark_is_monotone() {
        let store = chain_store();
        store.advance_watermark(5).unwrap();
        store.advance_watermark(3).unwrap();
        assert_eq!(store.watermark().unwrap(), Some(5));
        store.advance_watermark(6).unwrap();
        assert_eq!(store.watermark().unwrap(), Some(6));
    }

    #[test]
    fn every_key_is_chain_scoped() {
        let backing = Arc::new(MemoryStore::new());
        let store = ChainStore::new(42, backing.clone());
        store.commit_block(&MockChain::empty_block(1), &[]).unwrap();
        store.advance_watermark(1).unwrap();

        for key in backing.keys_with_prefix(b"").unwrap() {
            assert!(
                key.starts_with(b"chain:42:"),
                "unscoped key: {}",
                String::from_utf8_lossy(&key)
            );
        }
    }

    #[test]
    fn two_chains_do_not_collide() {
        let backing: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let one = ChainStore::new(1, Arc::clone(&backing));
        let two = ChainStore::new(2, Arc::clone(&backing));

        one.commit_block(&MockChain::empty_block(0), &[]).unwrap();
        one.advance_watermark(0).unwrap();

        assert_eq!(two.watermark().unwrap(), None);
        assert!(!two.has_block(0).unwrap());
    }

    #[test]
    fn block_heights_scan_is_ascending() {
        let store = chain_store();
        for height in [5u64, 1, 3] {
            store.commit_block(&MockChain::empty_block(height), &[]).unwrap();
        }
        assert_eq!(store.block_heights_from(0).unwrap(), vec![1, 3, 5]);
        assert_eq!(store.block_heights_from(2).unwrap(), vec![3, 5]);
    }
}
