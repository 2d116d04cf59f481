//! Clique-style proof-of-authority parsing: the validator list lives in the
//! header extra-data at epoch boundaries.

use super::{validators_from_extra_data, ConsensusParser};
use crate::errors::AdapterError;
use alloy_primitives::Address;
use quarry_primitives::{BlockRecord, ConsensusData};

/// The epoch length Clique chains conventionally use.
pub const DEFAULT_CLIQUE_EPOCH: u64 = 30_000;

/// Parser for Clique-style PoA headers.
#[derive(Debug, Clone, Copy)]
pub struct CliqueParser {
    epoch_length: u64,
}

impl CliqueParser {
    /// Creates a parser; `epoch_length == 0` selects the default.
    pub const fn new(epoch_length: u64) -> Self {
        Self {
            epoch_length: if epoch_length == 0 { DEFAULT_CLIQUE_EPOCH } else { epoch_length },
        }
    }
}

impl ConsensusParser for CliqueParser {
    fn consensus_type(&self) -> &'static str {
        "clique"
    }

    fn parse(&self, block: &BlockRecord) -> Result<ConsensusData, AdapterError> {
        Ok(ConsensusData {
            consensus_type: self.consensus_type().to_string(),
            proposer: block.miner,
            round: None,
            validators: self.validators(block)?,
            epoch_boundary: self.is_epoch_boundary(block),
        })
    }

    fn validators(&self, block: &BlockRecord) -> Result<Vec<Address>, AdapterError> {
        if !self.is_epoch_boundary(block) {
            return Ok(Vec::new());
        }
        Ok(validators_from_extra_data(&block.extra_data))
    }

    fn is_epoch_boundary(&self, block: &BlockRecord) -> bool {
        block.number % self.epoch_length == 0
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use alloy_primitives::Bytes;

    #[test]
    fn validators_only_surface_at_epoch_boundaries() {
        let parser = CliqueParser::new(10);
        let validator = Address::repeat_byte(0xaa);
        let mut extra = vec![0u8; 32];
        extra.extend_from_slice(validator.as_slice());
        extra.extend_from_slice(&[0u8; 65]);

        let boundary = BlockRecord {
            number: 20,
            extra_data: Bytes::from(extra.clone()),
            ..Default::default()
        };
        let data = parser.parse(&boundary).unwrap();
        assert!(data.epoch_boundary);
        assert_eq!(data.validators, vec![validator]);

        let mid_epoch =
            BlockRecord { number: 21, extra_data: Bytes::from(extra), ..Default::default() };
        let data = parser.parse(&mid_epoch).unwrap();
        assert!(!data.epoch_boundary);
        assert!(data.validators.is_empty());
    }
}
