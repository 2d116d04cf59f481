//! JSON-RPC client for EVM chains.
//!
//! The client parses every wire shape itself instead of relying on typed RPC
//! bindings: post-Cancun header fields arrive as either hex strings or bare
//! numbers, and the fee-delegated transaction type `0x16` carries fields no
//! standard binding knows about.

#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]

pub mod errors;
pub use errors::{RpcClientError, WireError};

pub mod types;
pub use types::{RawBlock, RawLog, RawReceipt, RawSignature, RawTransaction};

pub mod client;
pub use client::RpcClient;

pub mod batch;
pub use batch::{BatchFailure, BatchResult};

pub mod detector;
pub use detector::NodeDetector;

pub mod watch;
pub use watch::{HeadEvent, WatchHandle};
