//! Error types for update operations.

use nxdb_tree::TreeError;
use nxdb_types::NodeId;

/// Errors that can occur while queuing or flushing tree mutations.
#[derive(Debug, thiserror::Error)]
pub enum UpdateError {
    /// The target (or a source) node was deleted before the command was
    /// queued.
    #[error("stale node: {0}")]
    StaleNode(NodeId),

    /// The scope already holds the configured maximum of pending commands.
    #[error("mutation queue full ({limit} pending commands)")]
    QueueFull { limit: usize },

    /// Another update scope is open.
    #[error("an update scope is already open")]
    ScopeBusy,

    /// The engine rejected the flushed batch; none of its commands were
    /// applied.
    #[error("flush of {commands} commands failed: {source}")]
    Flush {
        commands: usize,
        #[source]
        source: TreeError,
    },

    /// Tree engine failure outside of a flush.
    #[error("tree error: {0}")]
    Tree(#[from] TreeError),
}

/// Result alias for update operations.
pub type UpdateResult<T> = Result<T, UpdateError>;
