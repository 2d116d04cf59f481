//! Chain-scoped key-value storage for indexed records.
//!
//! One store holds any number of chains; isolation comes from key prefixing,
//! and every record key begins with its chain segment. Heights are committed
//! atomically in a single batch, and the per-chain watermark only advances
//! over a contiguous prefix.

#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]

pub mod errors;
pub use errors::StorageError;

pub mod kv;
pub use kv::{BatchOp, KeyValueStore};

pub mod disk;
pub use disk::DiskStore;

pub mod mem;
pub use mem::MemoryStore;

pub mod keys;

pub mod chain;
pub use chain::ChainStore;

pub mod genesis;
pub use genesis::ensure_genesis;
