//! Bounded in-process pub/sub for indexer events.
//!
//! Publishers enqueue into one bounded bus queue; a pump task fans events out
//! to per-subscriber bounded channels. A slow subscriber never stalls a
//! publisher: delivery to a full subscriber channel drops the event for that
//! subscriber and increments its drop counter.

#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]

pub mod event;
pub use event::{Event, EventKind, EventPayload};

pub mod bus;
pub use bus::{BusConfig, EventBus, EventFilter, OverflowPolicy, PublishError, Subscription};
