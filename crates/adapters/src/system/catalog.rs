//! The curated event catalog for system contracts, keyed by signature hash.

use alloy_primitives::{keccak256, B256};
use lazy_static::lazy_static;
use std::collections::HashMap;

/// The ABI type of one catalog parameter. Only static 32-byte-word types
/// appear in the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    /// A 20-byte address, right-aligned in its word.
    Address,
    /// An unsigned 256-bit integer.
    Uint256,
    /// A boolean.
    Bool,
    /// An opaque 32-byte word.
    Bytes32,
}

/// One declared event parameter.
#[derive(Debug, Clone, Copy)]
pub struct ParamSpec {
    /// The parameter name.
    pub name: &'static str,
    /// The parameter type.
    pub ty: ParamType,
    /// Whether the parameter is indexed (delivered as a topic).
    pub indexed: bool,
}

/// One catalog entry: a known event and its decode rule.
#[derive(Debug, Clone, Copy)]
pub struct EventSpec {
    /// The event name.
    pub name: &'static str,
    /// The canonical signature string hashed into topic zero.
    pub signature: &'static str,
    /// The declared parameters, in declaration order.
    pub params: &'static [ParamSpec],
}

const fn addr(name: &'static str, indexed: bool) -> ParamSpec {
    ParamSpec { name, ty: ParamType::Address, indexed }
}

const fn uint(name: &'static str, indexed: bool) -> ParamSpec {
    ParamSpec { name, ty: ParamType::Uint256, indexed }
}

const fn boolean(name: &'static str, indexed: bool) -> ParamSpec {
    ParamSpec { name, ty: ParamType::Bool, indexed }
}

const fn word(name: &'static str, indexed: bool) -> ParamSpec {
    ParamSpec { name, ty: ParamType::Bytes32, indexed }
}

/// Every event the system contracts are known to emit.
pub static EVENTS: &[EventSpec] = &[
    EventSpec {
        name: "Transfer",
        signature: "Transfer(address,address,uint256)",
        params: &[addr("from", true), addr("to", true), uint("value", false)],
    },
    EventSpec {
        name: "Approval",
        signature: "Approval(address,address,uint256)",
        params: &[addr("owner", true), addr("spender", true), uint("value", false)],
    },
    EventSpec {
        name: "Mint",
        signature: "Mint(address,uint256)",
        params: &[addr("to", true), uint("amount", false)],
    },
    EventSpec {
        name: "Burn",
        signature: "Burn(address,uint256)",
        params: &[addr("from", true), uint("amount", false)],
    },
    EventSpec {
        name: "MinterConfigured",
        signature: "MinterConfigured(address,uint256)",
        params: &[addr("minter", true), uint("allowance", false)],
    },
    EventSpec {
        name: "MinterRemoved",
        signature: "MinterRemoved(address)",
        params: &[addr("minter", true)],
    },
    EventSpec {
        name: "ProposalCreated",
        signature: "ProposalCreated(uint256,address,bytes32)",
        params: &[uint("proposalId", true), addr("proposer", true), word("dataHash", false)],
    },
    EventSpec {
        name: "ProposalVoted",
        signature: "ProposalVoted(uint256,address,bool)",
        params: &[uint("proposalId", true), addr("voter", true), boolean("support", false)],
    },
    EventSpec {
        name: "ProposalApproved",
        signature: "ProposalApproved(uint256)",
        params: &[uint("proposalId", true)],
    },
    EventSpec {
        name: "ProposalRejected",
        signature: "ProposalRejected(uint256)",
        params: &[uint("proposalId", true)],
    },
    EventSpec {
        name: "ProposalExecuted",
        signature: "ProposalExecuted(uint256)",
        params: &[uint("proposalId", true)],
    },
    EventSpec {
        name: "ProposalFailed",
        signature: "ProposalFailed(uint256)",
        params: &[uint("proposalId", true)],
    },
    EventSpec {
        name: "ProposalExpired",
        signature: "ProposalExpired(uint256)",
        params: &[uint("proposalId", true)],
    },
    EventSpec {
        name: "ProposalCancelled",
        signature: "ProposalCancelled(uint256)",
        params: &[uint("proposalId", true)],
    },
    EventSpec {
        name: "ProposalExecutionSkipped",
        signature: "ProposalExecutionSkipped(uint256)",
        params: &[uint("proposalId", true)],
    },
    EventSpec {
        name: "MemberAdded",
        signature: "MemberAdded(address)",
        params: &[addr("member", true)],
    },
    EventSpec {
        name: "MemberRemoved",
        signature: "MemberRemoved(address)",
        params: &[addr("member", true)],
    },
    EventSpec {
        name: "MemberChanged",
        signature: "MemberChanged(address,address)",
        params: &[addr("previousMember", true), addr("newMember", true)],
    },
    EventSpec {
        name: "QuorumUpdated",
        signature: "QuorumUpdated(uint256)",
        params: &[uint("quorum", false)],
    },
    EventSpec {
        name: "GasTipUpdated",
        signature: "GasTipUpdated(uint256)",
        params: &[uint("gasTip", false)],
    },
    EventSpec {
        name: "MaxMinterAllowanceUpdated",
        signature: "MaxMinterAllowanceUpdated(uint256)",
        params: &[uint("allowance", false)],
    },
    EventSpec {
        name: "EmergencyPaused",
        signature: "EmergencyPaused(address)",
        params: &[addr("account", true)],
    },
    EventSpec {
        name: "EmergencyUnpaused",
        signature: "EmergencyUnpaused(address)",
        params: &[addr("account", true)],
    },
    EventSpec {
        name: "DepositMintProposed",
        signature: "DepositMintProposed(uint256,address,uint256)",
        params: &[uint("proposalId", true), addr("recipient", true), uint("amount", false)],
    },
    EventSpec {
        name: "BurnPrepaid",
        signature: "BurnPrepaid(address,uint256)",
        params: &[addr("account", true), uint("amount", false)],
    },
    EventSpec {
        name: "BurnExecuted",
        signature: "BurnExecuted(address,uint256)",
        params: &[addr("account", true), uint("amount", false)],
    },
    EventSpec {
        name: "AddressBlacklisted",
        signature: "AddressBlacklisted(address)",
        params: &[addr("account", true)],
    },
    EventSpec {
        name: "AddressUnblacklisted",
        signature: "AddressUnblacklisted(address)",
        params: &[addr("account", true)],
    },
    EventSpec {
        name: "AuthorizedAccountAdded",
        signature: "AuthorizedAccountAdded(address)",
        params: &[addr("account", true)],
    },
    EventSpec {
        name: "AuthorizedAccountRemoved",
        signature: "AuthorizedAccountRemoved(address)",
        params: &[addr("account", true)],
    },
];

lazy_static! {
    /// Catalog lookup by `topic[0]` signature hash.
    pub static ref EVENT_CATALOG: HashMap<B256, &'static EventSpec> =
        EVENTS.iter().map(|spec| (keccak256(spec.signature.as_bytes()), spec)).collect();
}

#[cfg(test)]
mod test {
    use super::*;
    use alloy_primitives::b256;

    #[test]
    fn catalog_has_no_signature_collisions() {
        assert_eq!(EVENT_CATALOG.len(), EVENTS.len());
    }

    #[test]
    fn transfer_hash_matches_the_canonical_signature() {
        let transfer = b256!("ddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef");
        assert_eq!(EVENT_CATALOG.get(&transfer).unwrap().name, "Transfer");
    }
}
