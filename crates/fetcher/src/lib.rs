//! The ingest pipeline: ordered parallel fetch of block ranges with retry,
//! backpressure, atomic commits, and contiguity-gated watermark advancement.

#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]

pub mod errors;
pub use errors::FetchError;

pub mod config;
pub use config::FetcherConfig;

pub mod watermark;
pub use watermark::WatermarkTracker;

pub mod fetcher;
pub use fetcher::{Fetcher, FetcherHandle, HeightRange};

pub mod gaps;
pub use gaps::{GapRecovery, GapReport};
