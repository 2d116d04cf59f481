//! Annotation types attached to records by chain adapters.

use alloy_primitives::{Address, Bytes};
use serde::{Deserialize, Serialize};

/// Per-block consensus data extracted by a consensus parser.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsensusData {
    /// The consensus tag the data was parsed under.
    pub consensus_type: String,
    /// The block proposer.
    pub proposer: Address,
    /// The consensus round, when the family exposes one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub round: Option<u64>,
    /// The validator set in effect at the block, when recoverable.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub validators: Vec<Address>,
    /// Whether the block sits on an epoch boundary.
    pub epoch_boundary: bool,
}

/// A system-contract event decoded through the built-in catalog.
///
/// Unknown signatures emitted by a system address still produce a decoded
/// event; `name` falls back to the hex signature and `raw_data` preserves the
/// undecoded payload.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecodedEvent {
    /// The event name, e.g. `"Transfer"`.
    pub name: String,
    /// The well-known name of the emitting system contract.
    pub contract_name: String,
    /// Decoded parameters, indexed parameters first, in declaration order.
    pub params: Vec<EventParam>,
    /// The raw data payload, preserved when the signature is not in the
    /// catalog.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_data: Option<Bytes>,
}

/// One decoded event parameter.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventParam {
    /// The parameter name.
    pub name: String,
    /// The rendered value: checksummed hex for addresses, decimal for
    /// integers, `true`/`false` for booleans, 0x-hex otherwise.
    pub value: String,
    /// Whether the parameter was indexed (came from a topic).
    pub indexed: bool,
}
