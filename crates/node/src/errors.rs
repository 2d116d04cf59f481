//! Node-level error types.

use quarry_storage::StorageError;

/// Errors surfaced by instances and the manager.
#[derive(Debug, thiserror::Error)]
pub enum NodeError {
    /// An instance id was registered twice.
    #[error("instance `{0}` is already registered")]
    AlreadyRegistered(String),
    /// No instance with the given id exists.
    #[error("no instance `{0}` registered")]
    UnknownInstance(String),
    /// `start` was called while the instance is running.
    #[error("instance `{0}` is already running")]
    AlreadyRunning(String),
    /// A startup precondition failed.
    #[error("instance `{id}` failed precondition: {reason}")]
    Precondition {
        /// The instance id.
        id: String,
        /// Why startup was refused.
        reason: String,
    },
    /// The storage layer failed.
    #[error(transparent)]
    Storage(#[from] StorageError),
}
