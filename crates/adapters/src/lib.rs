//! Chain-family adapters.
//!
//! An adapter is the capability bundle for one chain family: a block fetcher
//! over the RPC client, a transaction parser, and optionally a consensus
//! parser and a system-contracts handler. Family-specific adapters compose
//! the generic EVM adapter rather than replacing it.

#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]

pub mod errors;
pub use errors::AdapterError;

pub mod traits;
pub use traits::{BlockFetcher, ChainAdapter};

pub mod tx_parser;
pub use tx_parser::TransactionParser;

pub mod consensus;
pub use consensus::{
    register, register_builtins, resolve, CliqueParser, ConsensusParser, WbftParser,
    DEFAULT_WBFT_EPOCH,
};

pub mod system;
pub use system::{SystemContractsHandler, EVENT_CATALOG};

pub mod evm;
pub use evm::EvmAdapter;

pub mod anvil;
pub use anvil::AnvilAdapter;

pub mod stableone;
pub use stableone::StableOneAdapter;

pub mod factory;
pub use factory::{build_adapter, build_adapter_with_client, AdapterConfig};
