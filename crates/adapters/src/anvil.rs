//! The Anvil adapter: generic EVM plus a PoA consensus hook and direct
//! access to Anvil's own RPC surface.

use crate::{
    consensus::{CliqueParser, ConsensusParser},
    errors::AdapterError,
    evm::EvmAdapter,
    traits::ChainAdapter,
    tx_parser::TransactionParser,
};
use alloy_primitives::{Address, Bytes, U256};
use async_trait::async_trait;
use quarry_primitives::{BlockSource, ChainInfo};
use quarry_rpc::RpcClient;
use serde_json::json;
use std::sync::Arc;

/// Adapter for local Anvil (and compatible) development nodes.
#[derive(Debug)]
pub struct AnvilAdapter {
    evm: EvmAdapter,
    consensus: Arc<dyn ConsensusParser>,
}

impl AnvilAdapter {
    /// Creates an adapter over the given client.
    pub fn new(info: ChainInfo, client: Arc<RpcClient>) -> Self {
        Self {
            evm: EvmAdapter::new(info, client),
            consensus: Arc::new(CliqueParser::new(0)),
        }
    }

    fn client(&self) -> Arc<RpcClient> {
        self.evm.client()
    }

    /// Mines `blocks` blocks immediately.
    pub async fn mine(&self, blocks: u64) -> Result<(), AdapterError> {
        self.client().raw("anvil_mine", json!([format!("0x{blocks:x}")])).await?;
        Ok(())
    }

    /// Sets an account balance.
    pub async fn set_balance(&self, address: Address, balance: U256) -> Result<(), AdapterError> {
        self.client().raw("anvil_setBalance", json!([address, balance])).await?;
        Ok(())
    }

    /// Replaces an account's code.
    pub async fn set_code(&self, address: Address, code: Bytes) -> Result<(), AdapterError> {
        self.client().raw("anvil_setCode", json!([address, code])).await?;
        Ok(())
    }

    /// Takes a state snapshot and returns its id.
    pub async fn snapshot(&self) -> Result<U256, AdapterError> {
        let id = self.client().raw("evm_snapshot", json!([])).await?;
        serde_json::from_value(id).map_err(|e| AdapterError::Consensus(e.to_string()))
    }

    /// Reverts to a snapshot; returns whether the node accepted it.
    pub async fn revert(&self, snapshot: U256) -> Result<bool, AdapterError> {
        let accepted = self.client().raw("evm_revert", json!([snapshot])).await?;
        Ok(accepted.as_bool().unwrap_or(false))
    }

    /// Sets the timestamp of the next mined block.
    pub async fn set_next_block_timestamp(&self, timestamp: u64) -> Result<(), AdapterError> {
        self.client().raw("evm_setNextBlockTimestamp", json!([timestamp])).await?;
        Ok(())
    }

    /// Advances the node clock.
    pub async fn increase_time(&self, seconds: u64) -> Result<(), AdapterError> {
        self.client().raw("evm_increaseTime", json!([seconds])).await?;
        Ok(())
    }

    /// Starts impersonating an account.
    pub async fn impersonate(&self, address: Address) -> Result<(), AdapterError> {
        self.client().raw("anvil_impersonateAccount", json!([address])).await?;
        Ok(())
    }

    /// Resets the node to a clean state.
    pub async fn reset(&self) -> Result<(), AdapterError> {
        self.client().raw("anvil_reset", json!([])).await?;
        Ok(())
    }

    /// Returns the node's own configuration report.
    pub async fn node_info(&self) -> Result<serde_json::Value, AdapterError> {
        Ok(self.client().raw("anvil_nodeInfo", json!([])).await?)
    }
}

#[async_trait]
impl ChainAdapter for AnvilAdapter {
    fn info(&self) -> &ChainInfo {
        self.evm.info()
    }

    fn block_fetcher(&self) -> Arc<dyn BlockSource> {
        self.evm.block_fetcher()
    }

    fn transaction_parser(&self) -> Arc<TransactionParser> {
        self.evm.transaction_parser()
    }

    fn consensus_parser(&self) -> Option<Arc<dyn ConsensusParser>> {
        Some(Arc::clone(&self.consensus))
    }
}
