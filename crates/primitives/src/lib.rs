//! Core data model for the quarry indexer: persisted record types, chain and
//! node metadata, annotation types, and the [BlockSource] seam that the fetch
//! pipeline consumes.

#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]

pub mod block;
pub use block::{BlockRecord, FetchedBlock, Withdrawal};

pub mod transaction;
pub use transaction::{
    FeeDelegationMeta, SignatureParts, TransactionRecord, DYNAMIC_FEE_TX_TYPE,
    FEE_DELEGATED_TX_TYPE,
};

pub mod receipt;
pub use receipt::{LogRecord, ReceiptRecord};

pub mod chain;
pub use chain::{ChainFamily, ChainInfo, NodeFamily, NodeInfo};

pub mod annotations;
pub use annotations::{ConsensusData, DecodedEvent, EventParam};

pub mod flex;

pub mod provider;
pub use provider::{BlockSource, SourceError, SourceStats};

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
#[cfg(any(test, feature = "test-utils"))]
pub use test_utils::{FailingSource, MockChain};
