//! Receipt and log record types.

use crate::annotations::DecodedEvent;
use alloy_primitives::{Address, Bloom, Bytes, B256};
use serde::{Deserialize, Serialize};

/// An indexed transaction receipt.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiptRecord {
    /// Hash of the transaction the receipt belongs to.
    pub transaction_hash: B256,
    /// Position of the transaction within its block.
    pub transaction_index: u64,
    /// Number of the block the transaction was included in.
    pub block_number: u64,
    /// Hash of the block the transaction was included in.
    pub block_hash: B256,
    /// Execution status: `true` for success.
    pub status: bool,
    /// Cumulative gas used in the block up to and including this transaction.
    pub cumulative_gas_used: u64,
    /// Gas used by this transaction alone.
    pub gas_used: u64,
    /// Address of the created contract, for creation transactions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contract_address: Option<Address>,
    /// The bloom filter over the receipt's logs.
    pub logs_bloom: Bloom,
    /// The logs emitted by the transaction, in emission order.
    pub logs: Vec<LogRecord>,
}

/// An indexed event log.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogRecord {
    /// The emitting contract.
    pub address: Address,
    /// The log topics; at most four.
    pub topics: Vec<B256>,
    /// The unindexed log data.
    pub data: Bytes,
    /// Number of the block the log was emitted in.
    pub block_number: u64,
    /// Hash of the emitting transaction.
    pub transaction_hash: B256,
    /// Position of the emitting transaction within its block.
    pub transaction_index: u64,
    /// Position of the log within its block.
    pub log_index: u64,
    /// Whether the upstream node reported the log as removed by a reorg.
    #[serde(default)]
    pub removed: bool,
    /// System-contract decoding attached by the chain adapter, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decoded: Option<DecodedEvent>,
}

impl LogRecord {
    /// Returns the event signature topic, if the log has topics at all.
    pub fn topic0(&self) -> Option<&B256> {
        self.topics.first()
    }
}
