//! Test fixtures for the [BlockSource] trait.

use crate::{
    block::{BlockRecord, FetchedBlock},
    provider::{BlockSource, SourceError, SourceStats},
    receipt::ReceiptRecord,
};
use alloy_primitives::{keccak256, B256};
use async_trait::async_trait;
use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Mutex,
    },
    time::Duration,
};

/// An in-memory chain for exercising the fetch pipeline.
#[derive(Debug, Default)]
pub struct MockChain {
    inner: Mutex<MockChainInner>,
    calls: AtomicU64,
    errors: AtomicU64,
    /// Artificial latency applied to every call, for cancellation tests.
    latency: Mutex<Option<Duration>>,
}

#[derive(Debug, Default)]
struct MockChainInner {
    tip: u64,
    blocks: HashMap<u64, FetchedBlock>,
    receipts: HashMap<B256, Vec<ReceiptRecord>>,
}

impl MockChain {
    /// Creates an empty mock chain.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a mock chain holding empty blocks for heights `0..=tip`.
    pub fn with_empty_blocks(tip: u64) -> Self {
        let chain = Self::new();
        for number in 0..=tip {
            chain.insert_block(Self::empty_block(number));
        }
        chain
    }

    /// Builds an empty block with a deterministic hash chain.
    pub fn empty_block(number: u64) -> FetchedBlock {
        let parent_hash =
            if number == 0 { B256::ZERO } else { Self::block_hash(number - 1) };
        FetchedBlock::without_meta(BlockRecord {
            hash: Self::block_hash(number),
            parent_hash,
            number,
            gas_limit: 30_000_000,
            timestamp: 1_700_000_000 + number * 12,
            ..Default::default()
        })
    }

    /// The deterministic hash the mock assigns to a height.
    pub fn block_hash(number: u64) -> B256 {
        keccak256(number.to_be_bytes())
    }

    /// Inserts a block; the tip follows the highest inserted height.
    pub fn insert_block(&self, fetched: FetchedBlock) {
        let mut inner = self.inner.lock().unwrap();
        inner.tip = inner.tip.max(fetched.block.number);
        for tx in &fetched.block.transactions {
            inner.receipts.entry(tx.hash).or_default();
        }
        inner.blocks.insert(fetched.block.number, fetched);
    }

    /// Registers the receipts for a transaction hash.
    pub fn insert_receipts(&self, hash: B256, receipts: Vec<ReceiptRecord>) {
        self.inner.lock().unwrap().receipts.insert(hash, receipts);
    }

    /// Overrides the reported tip.
    pub fn set_tip(&self, tip: u64) {
        self.inner.lock().unwrap().tip = tip;
    }

    /// Applies an artificial delay to every subsequent call.
    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock().unwrap() = Some(latency);
    }

    async fn observe(&self) {
        self.calls.fetch_add(1, Ordering::Relaxed);
        let latency = *self.latency.lock().unwrap();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
    }
}

#[async_trait]
impl BlockSource for MockChain {
    async fn block_number(&self) -> Result<u64, SourceError> {
        self.observe().await;
        Ok(self.inner.lock().unwrap().tip)
    }

    async fn block_by_number(&self, number: u64) -> Result<Option<FetchedBlock>, SourceError> {
        self.observe().await;
        Ok(self.inner.lock().unwrap().blocks.get(&number).cloned())
    }

    async fn block_receipts(
        &self,
        block: &BlockRecord,
    ) -> Result<Vec<ReceiptRecord>, SourceError> {
        self.observe().await;
        let inner = self.inner.lock().unwrap();
        let mut receipts = Vec::with_capacity(block.transactions.len());
        for tx in &block.transactions {
            match inner.receipts.get(&tx.hash) {
                Some(found) => receipts.extend(found.iter().cloned()),
                None => {
                    self.errors.fetch_add(1, Ordering::Relaxed);
                    return Err(SourceError::NotFound(format!("receipt {}", tx.hash)));
                }
            }
        }
        Ok(receipts)
    }

    async fn transaction_receipt(
        &self,
        hash: B256,
    ) -> Result<Option<ReceiptRecord>, SourceError> {
        self.observe().await;
        let inner = self.inner.lock().unwrap();
        Ok(inner.receipts.get(&hash).and_then(|r| r.first().cloned()))
    }

    fn stats(&self) -> SourceStats {
        SourceStats {
            calls: self.calls.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }
}

/// A source that fails every call, for exercising error escalation.
#[derive(Debug)]
pub struct FailingSource {
    reason: String,
    calls: AtomicU64,
}

impl FailingSource {
    /// Creates a failing source with the given error message.
    pub fn new(reason: impl Into<String>) -> Self {
        Self { reason: reason.into(), calls: AtomicU64::new(0) }
    }

    fn fail<T>(&self) -> Result<T, SourceError> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        Err(SourceError::Transient(self.reason.clone()))
    }
}

#[async_trait]
impl BlockSource for FailingSource {
    async fn block_number(&self) -> Result<u64, SourceError> {
        self.fail()
    }

    async fn block_by_number(&self, _number: u64) -> Result<Option<FetchedBlock>, SourceError> {
        self.fail()
    }

    async fn block_receipts(
        &self,
        _block: &BlockRecord,
    ) -> Result<Vec<ReceiptRecord>, SourceError> {
        self.fail()
    }

    async fn transaction_receipt(
        &self,
        _hash: B256,
    ) -> Result<Option<ReceiptRecord>, SourceError> {
        self.fail()
    }

    fn stats(&self) -> SourceStats {
        let calls = self.calls.load(Ordering::Relaxed);
        SourceStats { calls, errors: calls }
    }
}
