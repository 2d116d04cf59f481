//! WBFT consensus parsing for StableOne networks.

use super::{validators_from_extra_data, ConsensusParser};
use crate::errors::AdapterError;
use alloy_primitives::Address;
use quarry_primitives::{BlockRecord, ConsensusData};

/// The default WBFT epoch length.
pub const DEFAULT_WBFT_EPOCH: u64 = 10;

/// Parser for WBFT headers.
///
/// WBFT reuses the clique extra-data layout for the validator section and
/// carries the round number in the otherwise-unused nonce field.
#[derive(Debug, Clone, Copy)]
pub struct WbftParser {
    epoch_length: u64,
}

impl WbftParser {
    /// Creates a parser; `epoch_length == 0` selects the default.
    pub const fn new(epoch_length: u64) -> Self {
        Self { epoch_length: if epoch_length == 0 { DEFAULT_WBFT_EPOCH } else { epoch_length } }
    }
}

impl ConsensusParser for WbftParser {
    fn consensus_type(&self) -> &'static str {
        "wbft"
    }

    fn parse(&self, block: &BlockRecord) -> Result<ConsensusData, AdapterError> {
        let round = u64::from_be_bytes(block.nonce.0);
        Ok(ConsensusData {
            consensus_type: self.consensus_type().to_string(),
            proposer: block.miner,
            round: Some(round),
            validators: self.validators(block)?,
            epoch_boundary: self.is_epoch_boundary(block),
        })
    }

    fn validators(&self, block: &BlockRecord) -> Result<Vec<Address>, AdapterError> {
        Ok(validators_from_extra_data(&block.extra_data))
    }

    fn is_epoch_boundary(&self, block: &BlockRecord) -> bool {
        block.number % self.epoch_length == 0
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use alloy_primitives::B64;

    #[test]
    fn default_epoch_is_ten() {
        let parser = WbftParser::new(0);
        for (number, boundary) in [(0u64, true), (9, false), (10, true), (25, false), (30, true)] {
            let block = BlockRecord { number, ..Default::default() };
            assert_eq!(parser.is_epoch_boundary(&block), boundary, "height {number}");
        }
    }

    #[test]
    fn round_comes_from_the_nonce() {
        let parser = WbftParser::new(0);
        let block = BlockRecord {
            number: 3,
            miner: Address::repeat_byte(0x11),
            nonce: B64::from(7u64.to_be_bytes()),
            ..Default::default()
        };
        let data = parser.parse(&block).unwrap();
        assert_eq!(data.round, Some(7));
        assert_eq!(data.proposer, Address::repeat_byte(0x11));
        assert!(!data.epoch_boundary);
    }
}
