//! Transaction record types and the fee-delegation sidecar.

use alloy_eips::eip2930::AccessList;
use alloy_primitives::{Address, Bytes, B256, U256};
use serde::{Deserialize, Serialize};

/// The raw type byte of a fee-delegated transaction.
pub const FEE_DELEGATED_TX_TYPE: u8 = 0x16;

/// The canonical type byte a fee-delegated transaction is re-expressed as.
pub const DYNAMIC_FEE_TX_TYPE: u8 = 0x02;

/// An indexed transaction.
///
/// Fee-delegated transactions (raw type `0x16`) are stored with
/// `tx_type == 0x02`; the original type byte lives in the accompanying
/// [FeeDelegationMeta] record.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRecord {
    /// The transaction hash.
    pub hash: B256,
    /// Number of the block the transaction was included in.
    pub block_number: u64,
    /// Hash of the block the transaction was included in.
    pub block_hash: B256,
    /// Position of the transaction within its block.
    pub transaction_index: u64,
    /// The sender.
    pub from: Address,
    /// The recipient; `None` for contract creation.
    #[serde(default)]
    pub to: Option<Address>,
    /// The transferred value, in wei.
    pub value: U256,
    /// The gas limit.
    pub gas_limit: u64,
    /// Legacy gas price, if the transaction carries one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gas_price: Option<u128>,
    /// EIP-1559 max fee per gas.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_fee_per_gas: Option<u128>,
    /// EIP-1559 max priority fee per gas.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_priority_fee_per_gas: Option<u128>,
    /// The sender nonce.
    pub nonce: u64,
    /// The calldata.
    pub input: Bytes,
    /// EIP-2930 access list, if the transaction carries one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_list: Option<AccessList>,
    /// The transaction signature.
    pub signature: SignatureParts,
    /// The canonical transaction type byte.
    pub tx_type: u8,
    /// The chain id the transaction was signed for, when recoverable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chain_id: Option<u64>,
}

impl TransactionRecord {
    /// Returns `true` if the transaction creates a contract.
    pub const fn is_contract_creation(&self) -> bool {
        self.to.is_none()
    }
}

/// The `(v, r, s)` components of a secp256k1 signature.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureParts {
    /// The recovery id / parity value.
    pub v: U256,
    /// The `r` component.
    pub r: U256,
    /// The `s` component.
    pub s: U256,
}

/// Sidecar record for a fee-delegated transaction.
///
/// Exists only for transactions whose raw type byte was
/// [FEE_DELEGATED_TX_TYPE]; the canonical transaction record is re-expressed
/// as a dynamic-fee transaction and this record preserves what that mapping
/// discards.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeeDelegationMeta {
    /// Hash of the transaction the meta belongs to.
    pub transaction_hash: B256,
    /// Number of the block the transaction was included in.
    pub block_number: u64,
    /// The raw type byte observed on the wire.
    pub original_type: u8,
    /// The account that pays the gas.
    pub fee_payer: Address,
    /// The fee payer's signature over the transaction.
    pub fee_payer_signature: SignatureParts,
}
