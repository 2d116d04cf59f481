//! Adapter error types.

use quarry_rpc::RpcClientError;

/// Errors surfaced by adapters and their capabilities.
#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    /// A consensus tag was registered twice.
    #[error("consensus parser `{0}` is already registered")]
    DuplicateConsensus(String),
    /// A consensus tag has no registered factory.
    #[error("no consensus parser registered for `{0}`")]
    UnknownConsensus(String),
    /// Consensus data could not be extracted from a block.
    #[error("consensus parse error: {0}")]
    Consensus(String),
    /// Sender recovery failed.
    #[error("signature recovery error: {0}")]
    Signature(String),
    /// The underlying RPC call failed.
    #[error(transparent)]
    Rpc(#[from] RpcClientError),
}
