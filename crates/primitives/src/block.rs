//! Block record types.

use crate::{
    annotations::ConsensusData,
    transaction::{FeeDelegationMeta, TransactionRecord},
};
use alloy_primitives::{Address, Bloom, Bytes, B256, B64, U256};
use serde::{Deserialize, Serialize};

/// A fully indexed block: canonical header fields plus the ordered list of
/// transactions the block contains. Immutable once committed.
///
/// Optional header fields cover post-Merge and post-Cancun upgrades; a block
/// from an older chain simply leaves them unset.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockRecord {
    /// The block hash.
    pub hash: B256,
    /// Hash of the parent block.
    pub parent_hash: B256,
    /// The beneficiary (miner or proposer) address.
    pub miner: Address,
    /// The state root.
    pub state_root: B256,
    /// The transactions trie root.
    pub transactions_root: B256,
    /// The receipts trie root.
    pub receipts_root: B256,
    /// The bloom filter over the block's logs.
    pub logs_bloom: Bloom,
    /// The block difficulty (zero post-Merge).
    pub difficulty: U256,
    /// The block number.
    pub number: u64,
    /// The gas limit.
    pub gas_limit: u64,
    /// The total gas used by all transactions in the block.
    pub gas_used: u64,
    /// The block timestamp, in seconds since the unix epoch.
    pub timestamp: u64,
    /// Arbitrary extra data carried by the header.
    pub extra_data: Bytes,
    /// The mix digest (prevrandao post-Merge).
    pub mix_hash: B256,
    /// The proof-of-work nonce.
    pub nonce: B64,
    /// EIP-1559 base fee per gas.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_fee_per_gas: Option<u64>,
    /// EIP-4895 withdrawals root.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub withdrawals_root: Option<B256>,
    /// EIP-4844 blob gas used.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blob_gas_used: Option<u64>,
    /// EIP-4844 excess blob gas.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub excess_blob_gas: Option<u64>,
    /// EIP-4788 parent beacon block root.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_beacon_block_root: Option<B256>,
    /// Size of the encoded block, in bytes, as reported by the peer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    /// The transactions in the block, in execution order.
    pub transactions: Vec<TransactionRecord>,
    /// EIP-4895 withdrawals, if the chain has them.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub withdrawals: Option<Vec<Withdrawal>>,
    /// Consensus annotation attached by the chain adapter, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub consensus: Option<ConsensusData>,
}

impl BlockRecord {
    /// Returns the number of transactions in the block.
    pub fn transaction_count(&self) -> usize {
        self.transactions.len()
    }
}

/// A validator withdrawal (EIP-4895).
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Withdrawal {
    /// Monotonically increasing withdrawal index.
    pub index: u64,
    /// Index of the validator the withdrawal belongs to.
    pub validator_index: u64,
    /// The withdrawal recipient.
    pub address: Address,
    /// The withdrawn amount, in gwei.
    pub amount: u64,
}

/// A block as produced by the wire parser: the canonical [BlockRecord] plus
/// the fee-delegation sidecars for any type `0x16` transactions it carried.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FetchedBlock {
    /// The parsed block.
    pub block: BlockRecord,
    /// Fee-delegation meta records, one per fee-delegated transaction.
    pub fee_metas: Vec<FeeDelegationMeta>,
}

impl FetchedBlock {
    /// Wraps a block that carries no fee-delegated transactions.
    pub fn without_meta(block: BlockRecord) -> Self {
        Self { block, fee_metas: Vec::new() }
    }
}
