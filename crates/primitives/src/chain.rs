//! Chain and node metadata.

use serde::{Deserialize, Serialize};

/// The adapter family a chain is served by.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChainFamily {
    /// A plain EVM chain with no family-specific behavior.
    #[default]
    Evm,
    /// A local Anvil (or compatible) development node.
    Anvil,
    /// A StableOne network.
    StableOne,
}

impl ChainFamily {
    /// Parses a family tag as used in config files and CLI flags.
    pub fn parse(tag: &str) -> Option<Self> {
        match tag.to_ascii_lowercase().as_str() {
            "evm" => Some(Self::Evm),
            "anvil" => Some(Self::Anvil),
            "stableone" => Some(Self::StableOne),
            _ => None,
        }
    }
}

impl core::fmt::Display for ChainFamily {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Evm => write!(f, "evm"),
            Self::Anvil => write!(f, "anvil"),
            Self::StableOne => write!(f, "stableone"),
        }
    }
}

/// Static description of an indexed chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainInfo {
    /// The numeric chain id.
    pub chain_id: u64,
    /// The adapter family serving the chain.
    pub family: ChainFamily,
    /// The consensus tag, resolved through the consensus registry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub consensus: Option<String>,
    /// Human-readable chain name.
    pub name: String,
    /// Native currency symbol.
    pub currency_symbol: String,
    /// Native currency decimals.
    pub currency_decimals: u8,
}

impl ChainInfo {
    /// Creates a chain info with the conventional 18-decimal ether currency.
    pub fn new(chain_id: u64, family: ChainFamily, name: impl Into<String>) -> Self {
        Self {
            chain_id,
            family,
            consensus: None,
            name: name.into(),
            currency_symbol: "ETH".to_string(),
            currency_decimals: 18,
        }
    }
}

/// The node implementation family observed behind an RPC endpoint.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeFamily {
    /// go-ethereum.
    Geth,
    /// Foundry's Anvil.
    Anvil,
    /// Hardhat Network.
    Hardhat,
    /// Ganache / EthereumJS TestRPC.
    Ganache,
    /// A StableOne node.
    StableOne,
    /// Anything else.
    #[default]
    Unknown,
}

/// What a probe of an RPC endpoint observed.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeInfo {
    /// The classified node family.
    pub family: NodeFamily,
    /// The raw `web3_clientVersion` banner.
    pub client_version: String,
    /// The chain id reported by `eth_chainId`.
    pub chain_id: u64,
    /// Whether the chain id is a well-known local-development id.
    pub is_local: bool,
    /// Whether the node answers pending-transaction subscriptions.
    pub supports_pending_tx: bool,
    /// Whether the `debug` namespace is available.
    pub supports_debug: bool,
    /// Whether Anvil-specific methods are available.
    pub supports_anvil: bool,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn family_tags_round_trip() {
        for (tag, family) in [
            ("evm", ChainFamily::Evm),
            ("anvil", ChainFamily::Anvil),
            ("stableone", ChainFamily::StableOne),
        ] {
            assert_eq!(ChainFamily::parse(tag), Some(family));
            assert_eq!(family.to_string(), tag);
        }
        assert_eq!(ChainFamily::parse("solana"), None);
    }
}
