//! Transaction parsing: sender recovery and contract-address derivation.

use crate::errors::AdapterError;
use alloy_consensus::{SignableTransaction, TxEip1559, TxEip2930, TxLegacy};
use alloy_primitives::{Address, Parity, Signature, TxKind};
use quarry_primitives::{ReceiptRecord, TransactionRecord};

/// Recovers senders and derives created contract addresses for one chain.
#[derive(Debug, Clone, Copy)]
pub struct TransactionParser {
    chain_id: u64,
}

impl TransactionParser {
    /// Creates a parser bound to a chain id, used when the transaction
    /// itself does not carry one.
    pub const fn new(chain_id: u64) -> Self {
        Self { chain_id }
    }

    /// Returns the transaction sender.
    ///
    /// The wire `from` field is authoritative when present; otherwise the
    /// sender is recovered from the signature over the typed signing hash.
    pub fn sender(&self, tx: &TransactionRecord) -> Result<Address, AdapterError> {
        if tx.from != Address::ZERO {
            return Ok(tx.from);
        }
        self.recover_sender(tx)
    }

    /// Recovers the sender from the transaction signature.
    pub fn recover_sender(&self, tx: &TransactionRecord) -> Result<Address, AdapterError> {
        let v = u64::try_from(tx.signature.v)
            .map_err(|_| AdapterError::Signature("oversized v value".to_string()))?;
        let signature = Signature::from_rs_and_parity(tx.signature.r, tx.signature.s, parity(v))
            .map_err(|e| AdapterError::Signature(e.to_string()))?;

        let to = tx.to.map_or(TxKind::Create, TxKind::Call);
        let chain_id = tx.chain_id.unwrap_or(self.chain_id);
        let signing_hash = match tx.tx_type {
            0x00 => TxLegacy {
                chain_id: tx.chain_id,
                nonce: tx.nonce,
                gas_price: tx.gas_price.unwrap_or_default(),
                gas_limit: tx.gas_limit,
                to,
                value: tx.value,
                input: tx.input.clone(),
            }
            .signature_hash(),
            0x01 => TxEip2930 {
                chain_id,
                nonce: tx.nonce,
                gas_price: tx.gas_price.unwrap_or_default(),
                gas_limit: tx.gas_limit,
                to,
                value: tx.value,
                access_list: tx.access_list.clone().unwrap_or_default(),
                input: tx.input.clone(),
            }
            .signature_hash(),
            0x02 => TxEip1559 {
                chain_id,
                nonce: tx.nonce,
                gas_limit: tx.gas_limit,
                max_fee_per_gas: tx.max_fee_per_gas.unwrap_or_default(),
                max_priority_fee_per_gas: tx.max_priority_fee_per_gas.unwrap_or_default(),
                to,
                value: tx.value,
                access_list: tx.access_list.clone().unwrap_or_default(),
                input: tx.input.clone(),
            }
            .signature_hash(),
            other => {
                return Err(AdapterError::Signature(format!(
                    "cannot recover sender for transaction type {other:#04x}"
                )))
            }
        };

        signature
            .recover_address_from_prehash(&signing_hash)
            .map_err(|e| AdapterError::Signature(e.to_string()))
    }

    /// Returns the address a creation transaction deployed to.
    ///
    /// The receipt's `contractAddress` is authoritative; without a receipt
    /// the address is computed from sender and nonce.
    pub fn created_contract_address(
        &self,
        tx: &TransactionRecord,
        receipt: Option<&ReceiptRecord>,
    ) -> Option<Address> {
        if !tx.is_contract_creation() {
            return None;
        }
        receipt
            .and_then(|r| r.contract_address)
            .or_else(|| Some(tx.from.create(tx.nonce)))
    }
}

/// Maps a wire `v` value to a signature parity.
fn parity(v: u64) -> Parity {
    match v {
        0 | 1 => Parity::Parity(v == 1),
        27 | 28 => Parity::NonEip155(v == 28),
        _ => Parity::Eip155(v),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use alloy_primitives::U256;
    use quarry_primitives::SignatureParts;

    #[test]
    fn wire_from_is_authoritative() {
        let parser = TransactionParser::new(1);
        let from = Address::repeat_byte(0x42);
        let tx = TransactionRecord { from, ..Default::default() };
        assert_eq!(parser.sender(&tx).unwrap(), from);
    }

    #[test]
    fn created_address_prefers_receipt() {
        let parser = TransactionParser::new(1);
        let from = Address::repeat_byte(0x42);
        let tx = TransactionRecord { from, nonce: 3, to: None, ..Default::default() };

        let deployed = Address::repeat_byte(0x77);
        let receipt = ReceiptRecord { contract_address: Some(deployed), ..Default::default() };
        assert_eq!(parser.created_contract_address(&tx, Some(&receipt)), Some(deployed));

        // Without a receipt, the address is derived from sender and nonce.
        assert_eq!(parser.created_contract_address(&tx, None), Some(from.create(3)));

        // Calls never create.
        let call = TransactionRecord { to: Some(Address::ZERO), ..Default::default() };
        assert_eq!(parser.created_contract_address(&call, None), None);
    }

    #[test]
    fn unsupported_type_is_an_error() {
        let parser = TransactionParser::new(1);
        let tx = TransactionRecord {
            tx_type: 0x03,
            signature: SignatureParts { v: U256::from(1), ..Default::default() },
            ..Default::default()
        };
        assert!(parser.recover_sender(&tx).is_err());
    }
}
