//! The generic EVM adapter: block fetching and transaction parsing, no
//! family-specific capabilities.

use crate::{
    traits::{BlockFetcher, ChainAdapter},
    tx_parser::TransactionParser,
};
use async_trait::async_trait;
use quarry_primitives::{BlockSource, ChainInfo};
use quarry_rpc::RpcClient;
use std::sync::Arc;

/// The adapter every plain EVM chain gets, and the core the family-specific
/// adapters compose.
#[derive(Debug)]
pub struct EvmAdapter {
    info: ChainInfo,
    client: Arc<RpcClient>,
    fetcher: Arc<BlockFetcher>,
    parser: Arc<TransactionParser>,
}

impl EvmAdapter {
    /// Creates an adapter over the given client.
    pub fn new(info: ChainInfo, client: Arc<RpcClient>) -> Self {
        let fetcher = Arc::new(BlockFetcher::new(Arc::clone(&client)));
        let parser = Arc::new(TransactionParser::new(info.chain_id));
        Self { info, client, fetcher, parser }
    }

    /// The shared RPC client, for composing adapters.
    pub fn client(&self) -> Arc<RpcClient> {
        Arc::clone(&self.client)
    }
}

#[async_trait]
impl ChainAdapter for EvmAdapter {
    fn info(&self) -> &ChainInfo {
        &self.info
    }

    fn block_fetcher(&self) -> Arc<dyn BlockSource> {
        Arc::clone(&self.fetcher) as Arc<dyn BlockSource>
    }

    fn transaction_parser(&self) -> Arc<TransactionParser> {
        Arc::clone(&self.parser)
    }
}
