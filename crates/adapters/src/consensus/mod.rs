//! Pluggable consensus parsers and the process-wide registry keyed by
//! consensus tag.

use crate::errors::AdapterError;
use alloy_primitives::Address;
use lazy_static::lazy_static;
use quarry_primitives::{BlockRecord, ConsensusData};
use std::{
    collections::HashMap,
    sync::{Arc, RwLock},
};

mod clique;
pub use clique::{CliqueParser, DEFAULT_CLIQUE_EPOCH};

mod wbft;
pub use wbft::{WbftParser, DEFAULT_WBFT_EPOCH};

/// Per-block validator and proposer extraction for one consensus family.
pub trait ConsensusParser: Send + Sync + core::fmt::Debug {
    /// The consensus tag, e.g. `"clique"`.
    fn consensus_type(&self) -> &'static str;

    /// Extracts the consensus data carried by a block.
    fn parse(&self, block: &BlockRecord) -> Result<ConsensusData, AdapterError>;

    /// The validator set observable at the block, when recoverable.
    fn validators(&self, block: &BlockRecord) -> Result<Vec<Address>, AdapterError>;

    /// Whether the block sits on an epoch boundary, where the validator set
    /// may change.
    fn is_epoch_boundary(&self, block: &BlockRecord) -> bool;
}

/// Builds a parser; `epoch_length == 0` selects the family default.
pub type ConsensusFactory = fn(epoch_length: u64) -> Arc<dyn ConsensusParser>;

lazy_static! {
    static ref REGISTRY: RwLock<HashMap<String, ConsensusFactory>> = RwLock::new(HashMap::new());
}

/// Registers a consensus factory under a tag. Duplicate registration is an
/// error; the registration phase completes before any chain instance starts.
pub fn register(tag: &str, factory: ConsensusFactory) -> Result<(), AdapterError> {
    let mut registry = REGISTRY.write().unwrap();
    if registry.contains_key(tag) {
        return Err(AdapterError::DuplicateConsensus(tag.to_string()));
    }
    registry.insert(tag.to_string(), factory);
    Ok(())
}

/// Instantiates the parser registered under a tag.
pub fn resolve(tag: &str, epoch_length: u64) -> Result<Arc<dyn ConsensusParser>, AdapterError> {
    let registry = REGISTRY.read().unwrap();
    registry
        .get(tag)
        .map(|factory| factory(epoch_length))
        .ok_or_else(|| AdapterError::UnknownConsensus(tag.to_string()))
}

/// The tags currently registered.
pub fn registered_tags() -> Vec<String> {
    let mut tags = REGISTRY.read().unwrap().keys().cloned().collect::<Vec<_>>();
    tags.sort();
    tags
}

/// Registers the built-in parsers. Idempotent; later duplicate registrations
/// of the same tags still fail.
pub fn register_builtins() -> Result<(), AdapterError> {
    let builtins: [(&str, ConsensusFactory); 2] = [
        ("clique", |epoch| Arc::new(CliqueParser::new(epoch))),
        ("wbft", |epoch| Arc::new(WbftParser::new(epoch))),
    ];
    let mut registry = REGISTRY.write().unwrap();
    for (tag, factory) in builtins {
        registry.entry(tag.to_string()).or_insert(factory);
    }
    Ok(())
}

/// Splits a clique-style extra-data validator section into addresses.
///
/// The layout is 32 bytes of vanity, `N * 20` bytes of validator addresses,
/// and a 65-byte seal.
pub(crate) fn validators_from_extra_data(extra_data: &[u8]) -> Vec<Address> {
    const VANITY: usize = 32;
    const SEAL: usize = 65;
    if extra_data.len() <= VANITY + SEAL {
        return Vec::new();
    }
    let section = &extra_data[VANITY..extra_data.len() - SEAL];
    if section.len() % Address::len_bytes() != 0 {
        return Vec::new();
    }
    section.chunks_exact(Address::len_bytes()).map(Address::from_slice).collect()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn duplicate_registration_is_an_error() {
        register_builtins().unwrap();
        let err = register("clique", |epoch| Arc::new(CliqueParser::new(epoch))).unwrap_err();
        assert!(matches!(err, AdapterError::DuplicateConsensus(_)));
        // A second builtin registration pass stays fine.
        register_builtins().unwrap();
    }

    #[test]
    fn resolve_builds_the_registered_family() {
        register_builtins().unwrap();
        let parser = resolve("wbft", 0).unwrap();
        assert_eq!(parser.consensus_type(), "wbft");
        assert!(resolve("tendermint", 0).is_err());
    }

    #[test]
    fn extra_data_validator_section_parses() {
        let mut extra = vec![0u8; 32];
        let one = Address::repeat_byte(0x01);
        let two = Address::repeat_byte(0x02);
        extra.extend_from_slice(one.as_slice());
        extra.extend_from_slice(two.as_slice());
        extra.extend_from_slice(&[0u8; 65]);

        assert_eq!(validators_from_extra_data(&extra), vec![one, two]);
        assert!(validators_from_extra_data(&[0u8; 40]).is_empty());
    }
}
