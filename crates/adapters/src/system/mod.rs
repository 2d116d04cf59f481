//! System-contract recognition and event decoding.

use alloy_primitives::{address, hex, Address, U256};
use quarry_primitives::{DecodedEvent, EventParam, LogRecord};
use std::collections::HashMap;

mod catalog;
pub use catalog::{EventSpec, ParamSpec, ParamType, EVENTS, EVENT_CATALOG};

/// Recognizes well-known contract addresses and decodes their events
/// through the built-in catalog.
#[derive(Debug, Clone)]
pub struct SystemContractsHandler {
    contracts: HashMap<Address, &'static str>,
}

impl SystemContractsHandler {
    /// The StableOne system contract table: fixed low addresses
    /// `0x1000`–`0x1004`.
    pub fn stableone() -> Self {
        let contracts = HashMap::from([
            (address!("0000000000000000000000000000000000001000"), "StableToken"),
            (address!("0000000000000000000000000000000000001001"), "Governance"),
            (address!("0000000000000000000000000000000000001002"), "MinterManager"),
            (address!("0000000000000000000000000000000000001003"), "MemberRegistry"),
            (address!("0000000000000000000000000000000000001004"), "EmergencyGuard"),
        ]);
        Self { contracts }
    }

    /// Returns `true` if the address is a known system contract.
    pub fn is_system(&self, address: &Address) -> bool {
        self.contracts.contains_key(address)
    }

    /// The well-known name of a system contract.
    pub fn contract_name(&self, address: &Address) -> Option<&'static str> {
        self.contracts.get(address).copied()
    }

    /// Decodes a log emitted by a system contract.
    ///
    /// Returns `None` for logs from other addresses. A system-address log
    /// whose signature is not in the catalog (or whose shape disagrees with
    /// its catalog entry) still yields an event, with the raw data
    /// preserved.
    pub fn decode(&self, log: &LogRecord) -> Option<DecodedEvent> {
        let contract_name = self.contract_name(&log.address)?;
        let spec = log.topic0().and_then(|topic| EVENT_CATALOG.get(topic));
        match spec {
            Some(spec) => decode_with_spec(spec, log, contract_name)
                .or_else(|| Some(unknown_event(log, contract_name))),
            None => Some(unknown_event(log, contract_name)),
        }
    }
}

fn decode_with_spec(
    spec: &EventSpec,
    log: &LogRecord,
    contract_name: &str,
) -> Option<DecodedEvent> {
    // ERC-721 emits the same Transfer signature with the token id as a third
    // indexed parameter; four topics selects that shape.
    if spec.name == "Transfer" && log.topics.len() == 4 {
        let params = vec![
            EventParam {
                name: "from".to_string(),
                value: address_from_word(&log.topics[1].0).to_checksum(None),
                indexed: true,
            },
            EventParam {
                name: "to".to_string(),
                value: address_from_word(&log.topics[2].0).to_checksum(None),
                indexed: true,
            },
            EventParam {
                name: "tokenId".to_string(),
                value: U256::from_be_bytes(log.topics[3].0).to_string(),
                indexed: true,
            },
        ];
        return Some(DecodedEvent {
            name: spec.name.to_string(),
            contract_name: contract_name.to_string(),
            params,
            raw_data: None,
        });
    }

    let indexed_count = spec.params.iter().filter(|p| p.indexed).count();
    let unindexed_count = spec.params.len() - indexed_count;
    if log.topics.len() != indexed_count + 1 || log.data.len() < unindexed_count * 32 {
        return None;
    }

    let mut params = Vec::with_capacity(spec.params.len());
    let mut topics = log.topics[1..].iter();
    let mut offset = 0usize;
    for param in spec.params {
        let word: [u8; 32] = if param.indexed {
            topics.next()?.0
        } else {
            let end = offset + 32;
            let word = log.data.get(offset..end)?.try_into().ok()?;
            offset = end;
            word
        };
        params.push(EventParam {
            name: param.name.to_string(),
            value: render(param.ty, &word),
            indexed: param.indexed,
        });
    }

    Some(DecodedEvent {
        name: spec.name.to_string(),
        contract_name: contract_name.to_string(),
        params,
        raw_data: None,
    })
}

fn unknown_event(log: &LogRecord, contract_name: &str) -> DecodedEvent {
    let name = log
        .topic0()
        .map_or_else(|| "Unknown".to_string(), |topic| format!("0x{}", hex::encode(topic)));
    DecodedEvent {
        name,
        contract_name: contract_name.to_string(),
        params: Vec::new(),
        raw_data: Some(log.data.clone()),
    }
}

fn render(ty: ParamType, word: &[u8; 32]) -> String {
    match ty {
        ParamType::Address => address_from_word(word).to_checksum(None),
        ParamType::Uint256 => U256::from_be_bytes(*word).to_string(),
        ParamType::Bool => (word[31] != 0).to_string(),
        ParamType::Bytes32 => format!("0x{}", hex::encode(word)),
    }
}

fn address_from_word(word: &[u8; 32]) -> Address {
    Address::from_slice(&word[12..])
}

#[cfg(test)]
mod test {
    use super::*;
    use alloy_primitives::{keccak256, Bytes, B256};

    const TOKEN: Address = address!("0000000000000000000000000000000000001000");

    fn topic_for(signature: &str) -> B256 {
        keccak256(signature.as_bytes())
    }

    fn pad_address(address: Address) -> B256 {
        let mut word = [0u8; 32];
        word[12..].copy_from_slice(address.as_slice());
        B256::from(word)
    }

    fn pad_uint(value: U256) -> B256 {
        B256::from(value.to_be_bytes::<32>())
    }

    fn system_log(topics: Vec<B256>, data: Bytes) -> LogRecord {
        LogRecord { address: TOKEN, topics, data, ..Default::default() }
    }

    #[test]
    fn erc20_transfer_decodes_from_to_value() {
        let handler = SystemContractsHandler::stableone();
        let from = Address::repeat_byte(0x11);
        let to = Address::repeat_byte(0x22);
        let log = system_log(
            vec![
                topic_for("Transfer(address,address,uint256)"),
                pad_address(from),
                pad_address(to),
            ],
            Bytes::from(U256::from(10).pow(U256::from(18)).to_be_bytes::<32>().to_vec()),
        );

        let event = handler.decode(&log).unwrap();
        assert_eq!(event.name, "Transfer");
        assert_eq!(event.contract_name, "StableToken");
        assert_eq!(event.params.len(), 3);
        assert_eq!(event.params[0].name, "from");
        assert_eq!(event.params[0].value, from.to_checksum(None));
        assert!(event.params[0].indexed);
        assert_eq!(event.params[1].value, to.to_checksum(None));
        assert_eq!(event.params[2].name, "value");
        assert_eq!(event.params[2].value, "1000000000000000000");
        assert!(!event.params[2].indexed);
        assert!(event.raw_data.is_none());
    }

    #[test]
    fn erc721_transfer_decodes_token_id() {
        let handler = SystemContractsHandler::stableone();
        let log = system_log(
            vec![
                topic_for("Transfer(address,address,uint256)"),
                pad_address(Address::repeat_byte(0x11)),
                pad_address(Address::repeat_byte(0x22)),
                pad_uint(U256::from(12345)),
            ],
            Bytes::new(),
        );

        let event = handler.decode(&log).unwrap();
        assert_eq!(event.name, "Transfer");
        assert_eq!(event.params[2].name, "tokenId");
        assert_eq!(event.params[2].value, "12345");
        assert!(event.params[2].indexed);
    }

    #[test]
    fn proposal_voted_decodes_mixed_params() {
        let handler = SystemContractsHandler::stableone();
        let voter = Address::repeat_byte(0x33);
        let mut data = [0u8; 32];
        data[31] = 1;
        let log = system_log(
            vec![
                topic_for("ProposalVoted(uint256,address,bool)"),
                pad_uint(U256::from(9)),
                pad_address(voter),
            ],
            Bytes::from(data.to_vec()),
        );

        let event = handler.decode(&log).unwrap();
        assert_eq!(event.name, "ProposalVoted");
        assert_eq!(event.params[0].value, "9");
        assert_eq!(event.params[1].value, voter.to_checksum(None));
        assert_eq!(event.params[2].value, "true");
    }

    #[test]
    fn unknown_signature_preserves_raw_data() {
        let handler = SystemContractsHandler::stableone();
        let payload = Bytes::from(vec![0xde, 0xad, 0xbe, 0xef]);
        let log = system_log(vec![topic_for("Mystery(uint256)")], payload.clone());

        let event = handler.decode(&log).unwrap();
        assert!(event.name.starts_with("0x"));
        assert_eq!(event.raw_data, Some(payload));
        assert!(event.params.is_empty());
    }

    #[test]
    fn non_system_addresses_are_ignored() {
        let handler = SystemContractsHandler::stableone();
        let log = LogRecord {
            address: Address::repeat_byte(0x99),
            topics: vec![topic_for("Transfer(address,address,uint256)")],
            ..Default::default()
        };
        assert!(handler.decode(&log).is_none());
    }

    #[test]
    fn malformed_known_event_falls_back_to_raw() {
        let handler = SystemContractsHandler::stableone();
        // Transfer with only one indexed topic: shape disagrees with the
        // catalog entry.
        let log = system_log(
            vec![
                topic_for("Transfer(address,address,uint256)"),
                pad_address(Address::repeat_byte(0x11)),
            ],
            Bytes::new(),
        );
        let event = handler.decode(&log).unwrap();
        assert!(event.raw_data.is_some());
    }
}
