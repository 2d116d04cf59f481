//! The [ChainAdapter] capability trait and the delegating block fetcher.

use crate::{
    consensus::ConsensusParser, errors::AdapterError, system::SystemContractsHandler,
    tx_parser::TransactionParser,
};
use alloy_primitives::B256;
use async_trait::async_trait;
use quarry_primitives::{
    BlockRecord, BlockSource, ChainInfo, FetchedBlock, ReceiptRecord, SourceError, SourceStats,
};
use quarry_rpc::RpcClient;
use std::sync::Arc;

/// The capability set any chain-family adapter exposes.
///
/// Optional capabilities are probed through their `Option` returns; call
/// sites never see a null handler.
#[async_trait]
pub trait ChainAdapter: Send + Sync + core::fmt::Debug {
    /// Static chain description.
    fn info(&self) -> &ChainInfo;

    /// The block fetcher the pipeline pulls from.
    fn block_fetcher(&self) -> Arc<dyn BlockSource>;

    /// The transaction parser.
    fn transaction_parser(&self) -> Arc<TransactionParser>;

    /// Per-block consensus extraction, for families that have one.
    fn consensus_parser(&self) -> Option<Arc<dyn ConsensusParser>> {
        None
    }

    /// Well-known system-contract decoding, for families that have one.
    fn system_contracts(&self) -> Option<Arc<SystemContractsHandler>> {
        None
    }

    /// Releases any resources the adapter holds.
    async fn close(&self) -> Result<(), AdapterError> {
        Ok(())
    }
}

/// A delegating [BlockSource] over the shared [RpcClient].
#[derive(Debug)]
pub struct BlockFetcher {
    client: Arc<RpcClient>,
}

impl BlockFetcher {
    /// Wraps the given client.
    pub const fn new(client: Arc<RpcClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl BlockSource for BlockFetcher {
    async fn block_number(&self) -> Result<u64, SourceError> {
        self.client.block_number().await.map_err(Into::into)
    }

    async fn block_by_number(&self, number: u64) -> Result<Option<FetchedBlock>, SourceError> {
        self.client.block_by_number(number).await.map_err(Into::into)
    }

    async fn block_receipts(
        &self,
        block: &BlockRecord,
    ) -> Result<Vec<ReceiptRecord>, SourceError> {
        self.client.block_receipts(block).await.map_err(Into::into)
    }

    async fn transaction_receipt(
        &self,
        hash: B256,
    ) -> Result<Option<ReceiptRecord>, SourceError> {
        self.client.transaction_receipt(hash).await.map_err(Into::into)
    }

    fn stats(&self) -> SourceStats {
        self.client.call_stats()
    }
}
