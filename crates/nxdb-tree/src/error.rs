use nxdb_types::{NodeId, NodeKind};

/// Errors from tree engine operations.
#[derive(Debug, thiserror::Error)]
pub enum TreeError {
    /// The node does not exist (never did, or was deleted).
    #[error("node not found: {0}")]
    NodeNotFound(NodeId),

    /// The node exists but has the wrong kind for the operation.
    #[error("node {node} is a {actual}, expected {expected}")]
    WrongKind {
        node: NodeId,
        expected: &'static str,
        actual: NodeKind,
    },

    /// The edit is structurally impossible (e.g. inserting before the root).
    #[error("invalid edit on {node}: {reason}")]
    InvalidEdit { node: NodeId, reason: String },

    /// An injected fault aborted the batch.
    #[error("injected fault at edit {index}")]
    Fault { index: usize },
}

/// Result alias for tree operations.
pub type TreeResult<T> = Result<T, TreeError>;
