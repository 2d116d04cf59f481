//! Wire shapes for the JSON-RPC methods the indexer consumes, and their
//! conversions into record types.
//!
//! Quantities go through the flexible decoders: hex strings and bare numbers
//! are both accepted. Unknown fields are ignored.

use crate::errors::WireError;
use alloy_eips::eip2930::AccessList;
use alloy_primitives::{Address, Bloom, Bytes, B256, B64, U256};
use quarry_primitives::{
    flex::{flex_u128_opt, flex_u64, flex_u64_opt},
    BlockRecord, FeeDelegationMeta, FetchedBlock, LogRecord, ReceiptRecord, SignatureParts,
    TransactionRecord, Withdrawal, DYNAMIC_FEE_TX_TYPE, FEE_DELEGATED_TX_TYPE,
};
use serde::Deserialize;

/// A block as returned by `eth_getBlockByNumber` / `eth_getBlockByHash` with
/// full transaction objects.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawBlock {
    /// The block hash.
    pub hash: B256,
    /// The parent hash.
    pub parent_hash: B256,
    /// The beneficiary address.
    #[serde(default)]
    pub miner: Address,
    /// The state root.
    #[serde(default)]
    pub state_root: B256,
    /// The transactions root.
    #[serde(default)]
    pub transactions_root: B256,
    /// The receipts root.
    #[serde(default)]
    pub receipts_root: B256,
    /// The logs bloom.
    #[serde(default)]
    pub logs_bloom: Bloom,
    /// The difficulty.
    #[serde(default)]
    pub difficulty: U256,
    /// The block number.
    #[serde(with = "flex_u64")]
    pub number: u64,
    /// The gas limit.
    #[serde(with = "flex_u64")]
    pub gas_limit: u64,
    /// The gas used.
    #[serde(with = "flex_u64")]
    pub gas_used: u64,
    /// The timestamp.
    #[serde(with = "flex_u64")]
    pub timestamp: u64,
    /// The extra data.
    #[serde(default)]
    pub extra_data: Bytes,
    /// The mix digest.
    #[serde(default)]
    pub mix_hash: B256,
    /// The proof-of-work nonce.
    #[serde(default)]
    pub nonce: B64,
    /// EIP-1559 base fee.
    #[serde(default, with = "flex_u64_opt")]
    pub base_fee_per_gas: Option<u64>,
    /// EIP-4895 withdrawals root.
    #[serde(default)]
    pub withdrawals_root: Option<B256>,
    /// EIP-4844 blob gas used; hex string or number, both observed.
    #[serde(default, with = "flex_u64_opt")]
    pub blob_gas_used: Option<u64>,
    /// EIP-4844 excess blob gas; hex string or number, both observed.
    #[serde(default, with = "flex_u64_opt")]
    pub excess_blob_gas: Option<u64>,
    /// EIP-4788 parent beacon block root.
    #[serde(default)]
    pub parent_beacon_block_root: Option<B256>,
    /// Encoded block size.
    #[serde(default, with = "flex_u64_opt")]
    pub size: Option<u64>,
    /// Full transaction objects.
    #[serde(default)]
    pub transactions: Vec<RawTransaction>,
    /// EIP-4895 withdrawals.
    #[serde(default)]
    pub withdrawals: Option<Vec<RawWithdrawal>>,
}

/// A transaction as embedded in a raw block.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawTransaction {
    /// The transaction hash.
    pub hash: B256,
    /// The sender, as reported by the peer.
    #[serde(default)]
    pub from: Option<Address>,
    /// The recipient; absent for contract creation.
    #[serde(default)]
    pub to: Option<Address>,
    /// The transferred value.
    #[serde(default)]
    pub value: U256,
    /// The gas limit.
    #[serde(with = "flex_u64")]
    pub gas: u64,
    /// Legacy gas price.
    #[serde(default, with = "flex_u128_opt")]
    pub gas_price: Option<u128>,
    /// EIP-1559 fee cap.
    #[serde(default, with = "flex_u128_opt")]
    pub max_fee_per_gas: Option<u128>,
    /// EIP-1559 priority fee cap.
    #[serde(default, with = "flex_u128_opt")]
    pub max_priority_fee_per_gas: Option<u128>,
    /// The sender nonce.
    #[serde(with = "flex_u64")]
    pub nonce: u64,
    /// The calldata.
    #[serde(default)]
    pub input: Bytes,
    /// EIP-2930 access list.
    #[serde(default)]
    pub access_list: Option<AccessList>,
    /// The raw transaction type byte.
    #[serde(rename = "type", default, with = "flex_u64_opt")]
    pub tx_type: Option<u64>,
    /// The chain id the transaction was signed for.
    #[serde(default, with = "flex_u64_opt")]
    pub chain_id: Option<u64>,
    /// Number of the containing block.
    #[serde(default, with = "flex_u64_opt")]
    pub block_number: Option<u64>,
    /// Hash of the containing block.
    #[serde(default)]
    pub block_hash: Option<B256>,
    /// Position within the containing block.
    #[serde(default, with = "flex_u64_opt")]
    pub transaction_index: Option<u64>,
    /// Signature `v`.
    #[serde(default)]
    pub v: Option<U256>,
    /// Signature `r`.
    #[serde(default)]
    pub r: Option<U256>,
    /// Signature `s`.
    #[serde(default)]
    pub s: Option<U256>,
    /// Fee-delegation: the fee payer. Present only on type `0x16`.
    #[serde(default)]
    pub fee_payer: Option<Address>,
    /// Fee-delegation: the fee payer's signatures.
    #[serde(default)]
    pub fee_payer_signatures: Option<Vec<RawSignature>>,
}

/// A `(v, r, s)` signature object as it appears on the wire.
#[derive(Debug, Clone, Deserialize)]
pub struct RawSignature {
    /// The recovery value.
    #[serde(default)]
    pub v: U256,
    /// The `r` component.
    #[serde(default)]
    pub r: U256,
    /// The `s` component.
    #[serde(default)]
    pub s: U256,
}

/// A withdrawal object as it appears on the wire.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawWithdrawal {
    /// The withdrawal index.
    #[serde(with = "flex_u64")]
    pub index: u64,
    /// The validator index.
    #[serde(with = "flex_u64")]
    pub validator_index: u64,
    /// The recipient.
    pub address: Address,
    /// The amount, in gwei.
    #[serde(with = "flex_u64")]
    pub amount: u64,
}

/// A receipt as returned by `eth_getBlockReceipts` /
/// `eth_getTransactionReceipt`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawReceipt {
    /// The transaction hash.
    pub transaction_hash: B256,
    /// Position within the block.
    #[serde(default, with = "flex_u64_opt")]
    pub transaction_index: Option<u64>,
    /// The containing block number.
    #[serde(default, with = "flex_u64_opt")]
    pub block_number: Option<u64>,
    /// The containing block hash.
    #[serde(default)]
    pub block_hash: Option<B256>,
    /// Execution status; absent on pre-Byzantium receipts.
    #[serde(default, with = "flex_u64_opt")]
    pub status: Option<u64>,
    /// Cumulative gas used.
    #[serde(with = "flex_u64")]
    pub cumulative_gas_used: u64,
    /// Gas used by the transaction.
    #[serde(with = "flex_u64")]
    pub gas_used: u64,
    /// The created contract address, for creation transactions.
    #[serde(default)]
    pub contract_address: Option<Address>,
    /// The logs bloom.
    #[serde(default)]
    pub logs_bloom: Bloom,
    /// The emitted logs.
    #[serde(default)]
    pub logs: Vec<RawLog>,
}

/// A log as embedded in a raw receipt.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawLog {
    /// The emitting contract.
    pub address: Address,
    /// The topics.
    #[serde(default)]
    pub topics: Vec<B256>,
    /// The unindexed data.
    #[serde(default)]
    pub data: Bytes,
    /// The containing block number.
    #[serde(default, with = "flex_u64_opt")]
    pub block_number: Option<u64>,
    /// The emitting transaction hash.
    #[serde(default)]
    pub transaction_hash: Option<B256>,
    /// Position of the emitting transaction.
    #[serde(default, with = "flex_u64_opt")]
    pub transaction_index: Option<u64>,
    /// Position of the log within the block.
    #[serde(default, with = "flex_u64_opt")]
    pub log_index: Option<u64>,
    /// Reorg removal flag.
    #[serde(default)]
    pub removed: bool,
}

impl RawBlock {
    /// Converts the wire block into a [FetchedBlock], re-expressing any
    /// fee-delegated transactions and collecting their sidecars.
    pub fn into_fetched(self) -> Result<FetchedBlock, WireError> {
        let number = self.number;
        let hash = self.hash;
        let mut transactions = Vec::with_capacity(self.transactions.len());
        let mut fee_metas = Vec::new();
        for (index, raw_tx) in self.transactions.into_iter().enumerate() {
            let (record, meta) = raw_tx.into_record(number, hash, index as u64)?;
            transactions.push(record);
            if let Some(meta) = meta {
                fee_metas.push(meta);
            }
        }

        let withdrawals = self.withdrawals.map(|list| {
            list.into_iter()
                .map(|w| Withdrawal {
                    index: w.index,
                    validator_index: w.validator_index,
                    address: w.address,
                    amount: w.amount,
                })
                .collect()
        });

        Ok(FetchedBlock {
            block: BlockRecord {
                hash,
                parent_hash: self.parent_hash,
                miner: self.miner,
                state_root: self.state_root,
                transactions_root: self.transactions_root,
                receipts_root: self.receipts_root,
                logs_bloom: self.logs_bloom,
                difficulty: self.difficulty,
                number,
                gas_limit: self.gas_limit,
                gas_used: self.gas_used,
                timestamp: self.timestamp,
                extra_data: self.extra_data,
                mix_hash: self.mix_hash,
                nonce: self.nonce,
                base_fee_per_gas: self.base_fee_per_gas,
                withdrawals_root: self.withdrawals_root,
                blob_gas_used: self.blob_gas_used,
                excess_blob_gas: self.excess_blob_gas,
                parent_beacon_block_root: self.parent_beacon_block_root,
                size: self.size,
                transactions,
                withdrawals,
                consensus: None,
            },
            fee_metas,
        })
    }
}

impl RawTransaction {
    /// Converts a wire transaction into its record, plus the fee-delegation
    /// sidecar when the raw type byte is `0x16`.
    pub fn into_record(
        self,
        block_number: u64,
        block_hash: B256,
        index: u64,
    ) -> Result<(TransactionRecord, Option<FeeDelegationMeta>), WireError> {
        let raw_type = self.tx_type.unwrap_or(0);
        let raw_type = u8::try_from(raw_type)
            .map_err(|_| WireError::Value(format!("transaction type {raw_type:#x}")))?;

        let (tx_type, meta) = if raw_type == FEE_DELEGATED_TX_TYPE {
            let fee_payer = self.fee_payer.ok_or(WireError::MissingField("feePayer"))?;
            let signature = self
                .fee_payer_signatures
                .as_deref()
                .and_then(<[RawSignature]>::first)
                .ok_or(WireError::MissingField("feePayerSignatures"))?;
            let meta = FeeDelegationMeta {
                transaction_hash: self.hash,
                block_number: self.block_number.unwrap_or(block_number),
                original_type: raw_type,
                fee_payer,
                fee_payer_signature: SignatureParts {
                    v: signature.v,
                    r: signature.r,
                    s: signature.s,
                },
            };
            (DYNAMIC_FEE_TX_TYPE, Some(meta))
        } else {
            (raw_type, None)
        };

        let record = TransactionRecord {
            hash: self.hash,
            block_number: self.block_number.unwrap_or(block_number),
            block_hash: self.block_hash.unwrap_or(block_hash),
            transaction_index: self.transaction_index.unwrap_or(index),
            from: self.from.unwrap_or_default(),
            to: self.to,
            value: self.value,
            gas_limit: self.gas,
            gas_price: self.gas_price,
            max_fee_per_gas: self.max_fee_per_gas,
            max_priority_fee_per_gas: self.max_priority_fee_per_gas,
            nonce: self.nonce,
            input: self.input,
            access_list: self.access_list,
            signature: SignatureParts {
                v: self.v.unwrap_or_default(),
                r: self.r.unwrap_or_default(),
                s: self.s.unwrap_or_default(),
            },
            tx_type,
            chain_id: self.chain_id,
        };
        Ok((record, meta))
    }
}

impl RawReceipt {
    /// Converts a wire receipt into its record.
    pub fn into_record(self) -> Result<ReceiptRecord, WireError> {
        let block_number = self.block_number.unwrap_or_default();
        let block_hash = self.block_hash.unwrap_or_default();
        let transaction_index = self.transaction_index.unwrap_or_default();

        let logs = self
            .logs
            .into_iter()
            .map(|log| {
                Ok(LogRecord {
                    address: log.address,
                    topics: log.topics,
                    data: log.data,
                    block_number: log.block_number.unwrap_or(block_number),
                    transaction_hash: log.transaction_hash.unwrap_or(self.transaction_hash),
                    transaction_index: log.transaction_index.unwrap_or(transaction_index),
                    log_index: log.log_index.ok_or(WireError::MissingField("logIndex"))?,
                    removed: log.removed,
                    decoded: None,
                })
            })
            .collect::<Result<Vec<_>, WireError>>()?;

        Ok(ReceiptRecord {
            transaction_hash: self.transaction_hash,
            transaction_index,
            block_number,
            block_hash,
            // Pre-Byzantium receipts carry no status; absence reads as
            // success.
            status: self.status.map_or(true, |s| s == 1),
            cumulative_gas_used: self.cumulative_gas_used,
            gas_used: self.gas_used,
            contract_address: self.contract_address,
            logs_bloom: self.logs_bloom,
            logs,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use serde_json::json;

    fn raw_block_json() -> serde_json::Value {
        json!({
            "hash": "0x00000000000000000000000000000000000000000000000000000000000000aa",
            "parentHash": "0x0000000000000000000000000000000000000000000000000000000000000000",
            "miner": "0x1111111111111111111111111111111111111111",
            "number": "0x10",
            "gasLimit": "0x1c9c380",
            "gasUsed": "0x5208",
            "timestamp": "0x65000000",
            "baseFeePerGas": "0x3b9aca00",
            "blobGasUsed": 131072,
            "excessBlobGas": "0x20000",
            "unknownField": "ignored",
            "transactions": [
                {
                    "hash": "0x00000000000000000000000000000000000000000000000000000000000000b1",
                    "from": "0x2222222222222222222222222222222222222222",
                    "to": "0x3333333333333333333333333333333333333333",
                    "value": "0xde0b6b3a7640000",
                    "gas": "0x5208",
                    "maxFeePerGas": "0x77359400",
                    "maxPriorityFeePerGas": "0x3b9aca00",
                    "nonce": "0x1",
                    "input": "0x",
                    "type": "0x2",
                    "chainId": "0x1",
                    "v": "0x0",
                    "r": "0x1",
                    "s": "0x2"
                },
                {
                    "hash": "0x00000000000000000000000000000000000000000000000000000000000000b2",
                    "from": "0x4444444444444444444444444444444444444444",
                    "to": "0x5555555555555555555555555555555555555555",
                    "value": "0x0",
                    "gas": "0x30d40",
                    "maxFeePerGas": "0x77359400",
                    "maxPriorityFeePerGas": "0x3b9aca00",
                    "nonce": "0x7",
                    "input": "0xdeadbeef",
                    "type": "0x16",
                    "v": "0x1",
                    "r": "0x3",
                    "s": "0x4",
                    "feePayer": "0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa",
                    "feePayerSignatures": [
                        { "v": "0x1", "r": "0x5", "s": "0x6" }
                    ]
                }
            ]
        })
    }

    #[test]
    fn parses_post_cancun_header_fields_in_both_shapes() {
        let raw: RawBlock = serde_json::from_value(raw_block_json()).unwrap();
        assert_eq!(raw.blob_gas_used, Some(131072));
        assert_eq!(raw.excess_blob_gas, Some(131072));
        assert_eq!(raw.base_fee_per_gas, Some(1_000_000_000));
        assert_eq!(raw.number, 16);
    }

    #[test]
    fn fee_delegated_transaction_produces_meta_and_dynamic_fee_record() {
        let raw: RawBlock = serde_json::from_value(raw_block_json()).unwrap();
        let fetched = raw.into_fetched().unwrap();

        assert_eq!(fetched.block.transactions.len(), 2);
        assert_eq!(fetched.fee_metas.len(), 1);

        let plain = &fetched.block.transactions[0];
        assert_eq!(plain.tx_type, 0x02);
        assert_eq!(plain.transaction_index, 0);

        let delegated = &fetched.block.transactions[1];
        assert_eq!(delegated.tx_type, DYNAMIC_FEE_TX_TYPE);

        let meta = &fetched.fee_metas[0];
        assert_eq!(meta.transaction_hash, delegated.hash);
        assert_eq!(meta.original_type, FEE_DELEGATED_TX_TYPE);
        assert_eq!(
            meta.fee_payer,
            "0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa".parse::<Address>().unwrap()
        );
        assert_eq!(meta.fee_payer_signature.r, U256::from(5));
    }

    #[test]
    fn fee_delegated_without_payer_is_a_decode_error() {
        let tx = json!({
            "hash": "0x00000000000000000000000000000000000000000000000000000000000000b3",
            "gas": "0x5208",
            "nonce": "0x0",
            "type": "0x16"
        });
        let raw: RawTransaction = serde_json::from_value(tx).unwrap();
        let err = raw.into_record(1, B256::ZERO, 0).unwrap_err();
        assert_eq!(err, WireError::MissingField("feePayer"));
    }

    #[test]
    fn receipt_parse_carries_logs_through() {
        let receipt = json!({
            "transactionHash": "0x00000000000000000000000000000000000000000000000000000000000000c1",
            "transactionIndex": "0x0",
            "blockNumber": "0x10",
            "blockHash": "0x00000000000000000000000000000000000000000000000000000000000000aa",
            "status": "0x1",
            "cumulativeGasUsed": "0x5208",
            "gasUsed": "0x5208",
            "logs": [
                {
                    "address": "0x0000000000000000000000000000000000001000",
                    "topics": [
                        "0xddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef"
                    ],
                    "data": "0x0000000000000000000000000000000000000000000000000de0b6b3a7640000",
                    "logIndex": "0x0",
                    "removed": false
                }
            ]
        });
        let raw: RawReceipt = serde_json::from_value(receipt).unwrap();
        let record = raw.into_record().unwrap();
        assert!(record.status);
        assert_eq!(record.logs.len(), 1);
        assert_eq!(record.logs[0].block_number, 16);
        assert_eq!(record.logs[0].log_index, 0);
    }

    #[test]
    fn missing_status_reads_as_success() {
        let receipt = json!({
            "transactionHash": "0x00000000000000000000000000000000000000000000000000000000000000c2",
            "cumulativeGasUsed": 21000,
            "gasUsed": 21000
        });
        let raw: RawReceipt = serde_json::from_value(receipt).unwrap();
        assert!(raw.into_record().unwrap().status);
    }
}
