//! The event envelope published for every persisted record.

use quarry_primitives::{BlockRecord, LogRecord, TransactionRecord};
use std::{sync::Arc, time::SystemTime};

/// The kind of an indexer event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// A block was committed.
    Block,
    /// A transaction was committed.
    Transaction,
    /// A log was committed.
    Log,
    /// The contiguous watermark advanced.
    Progress,
    /// A height failed permanently or a pipeline error occurred.
    Error,
}

/// The payload carried by an [Event].
///
/// Record payloads are [Arc]-shared references to data that is already
/// durable in storage by the time the event is published.
#[derive(Debug, Clone)]
pub enum EventPayload {
    /// A committed block.
    Block(Arc<BlockRecord>),
    /// A committed transaction.
    Transaction(Arc<TransactionRecord>),
    /// A committed log.
    Log(Arc<LogRecord>),
    /// A watermark advance.
    Progress {
        /// The new contiguous watermark.
        watermark: u64,
        /// The tip observed when the watermark advanced.
        tip: u64,
    },
    /// A pipeline failure report.
    Error {
        /// The height the failure is attributed to, when height-scoped.
        height: Option<u64>,
        /// Human-readable cause.
        message: String,
    },
}

/// An event envelope: kind, origin chain, wall-clock timestamp, payload.
#[derive(Debug, Clone)]
pub struct Event {
    /// The event kind.
    pub kind: EventKind,
    /// The chain the event originates from.
    pub chain_id: u64,
    /// When the event was published.
    pub timestamp: SystemTime,
    /// The payload.
    pub payload: EventPayload,
}

impl Event {
    fn new(kind: EventKind, chain_id: u64, payload: EventPayload) -> Self {
        Self { kind, chain_id, timestamp: SystemTime::now(), payload }
    }

    /// A block event.
    pub fn block(chain_id: u64, block: Arc<BlockRecord>) -> Self {
        Self::new(EventKind::Block, chain_id, EventPayload::Block(block))
    }

    /// A transaction event.
    pub fn transaction(chain_id: u64, tx: Arc<TransactionRecord>) -> Self {
        Self::new(EventKind::Transaction, chain_id, EventPayload::Transaction(tx))
    }

    /// A log event.
    pub fn log(chain_id: u64, log: Arc<LogRecord>) -> Self {
        Self::new(EventKind::Log, chain_id, EventPayload::Log(log))
    }

    /// A progress event.
    pub fn progress(chain_id: u64, watermark: u64, tip: u64) -> Self {
        Self::new(EventKind::Progress, chain_id, EventPayload::Progress { watermark, tip })
    }

    /// An error event.
    pub fn error(chain_id: u64, height: Option<u64>, message: impl Into<String>) -> Self {
        Self::new(
            EventKind::Error,
            chain_id,
            EventPayload::Error { height, message: message.into() },
        )
    }

    /// The block height the event refers to, when the payload has one.
    pub fn height(&self) -> Option<u64> {
        match &self.payload {
            EventPayload::Block(block) => Some(block.number),
            EventPayload::Transaction(tx) => Some(tx.block_number),
            EventPayload::Log(log) => Some(log.block_number),
            EventPayload::Progress { watermark, .. } => Some(*watermark),
            EventPayload::Error { height, .. } => *height,
        }
    }
}
