//! RPC client error types.

use alloy_transport::{RpcError, TransportErrorKind};
use quarry_primitives::SourceError;
use std::time::Duration;

/// Errors produced while parsing wire shapes into records.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WireError {
    /// A field the shape requires was absent.
    #[error("missing required field `{0}`")]
    MissingField(&'static str),
    /// A field held a value outside its domain.
    #[error("invalid value: {0}")]
    Value(String),
}

/// Errors surfaced by the [RpcClient](crate::client::RpcClient).
///
/// Transport and timeout errors are transient; the fetch pipeline owns retry
/// policy, the client never retries on its own.
#[derive(Debug, thiserror::Error)]
pub enum RpcClientError {
    /// The transport failed; the upstream error is passed through verbatim.
    #[error("transport error: {0}")]
    Transport(#[from] RpcError<TransportErrorKind>),
    /// The call exceeded the configured deadline.
    #[error("rpc call timed out after {0:?}")]
    Timeout(Duration),
    /// The peer's response failed to parse into a record.
    #[error("wire decode error: {0}")]
    Decode(#[from] WireError),
    /// The peer reports no block at a height it previously advertised.
    #[error("block {0} not found at peer")]
    BlockNotFound(u64),
    /// The peer reports no receipt for a transaction in a canonical block.
    #[error("receipt for {0} not found at peer")]
    ReceiptNotFound(alloy_primitives::B256),
}

impl RpcClientError {
    /// Returns `true` if retrying the call may succeed.
    pub const fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Transport(_) | Self::Timeout(_) | Self::BlockNotFound(_) |
                Self::ReceiptNotFound(_)
        )
    }
}

impl From<RpcClientError> for SourceError {
    fn from(err: RpcClientError) -> Self {
        match err {
            RpcClientError::Decode(e) => Self::Decode(e.to_string()),
            RpcClientError::BlockNotFound(n) => Self::NotFound(format!("block {n}")),
            other => Self::Transient(other.to_string()),
        }
    }
}

/// Returns `true` when an error response means the server lacks the method,
/// as opposed to the method failing.
pub(crate) fn is_method_not_found(err: &RpcError<TransportErrorKind>) -> bool {
    match err {
        RpcError::ErrorResp(payload) => {
            if payload.code == -32601 {
                return true;
            }
            let message = payload.message.to_lowercase();
            message.contains("method not found")
                || message.contains("not supported")
                || message.contains("does not exist")
                || message.contains("not available")
        }
        _ => false,
    }
}
