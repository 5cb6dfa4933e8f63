use nxdb_types::{NodeId, NodeKind};

use crate::content::Edit;
use crate::error::TreeResult;

/// A tree-structured document engine.
///
/// All implementations must satisfy these invariants:
/// - Node identities are stable and never reused while the engine is alive.
/// - `apply` is all-or-nothing: on error no edit of the batch is visible.
/// - Edits inside a batch are applied in slice order.
/// - Concurrent reads are always safe; reads never observe a partial batch.
pub trait TreeEngine: Send + Sync {
    /// The document node.
    fn document(&self) -> NodeId;

    /// Whether the node currently exists in the document.
    fn is_live(&self, node: NodeId) -> bool;

    fn kind(&self, node: NodeId) -> TreeResult<NodeKind>;

    /// Element name or processing-instruction target; `None` for other kinds.
    fn name(&self, node: NodeId) -> TreeResult<Option<String>>;

    fn parent(&self, node: NodeId) -> TreeResult<Option<NodeId>>;

    /// Child nodes in document order.
    fn children(&self, node: NodeId) -> TreeResult<Vec<NodeId>>;

    fn attribute(&self, node: NodeId, name: &str) -> TreeResult<Option<String>>;

    /// All attributes in insertion order.
    fn attributes(&self, node: NodeId) -> TreeResult<Vec<(String, String)>>;

    /// Concatenated descendant text for containers, the value for leaves.
    fn string_value(&self, node: NodeId) -> TreeResult<String>;

    /// Apply a batch of edits atomically.
    ///
    /// Returns the identities of the top-level nodes created by `Insert`
    /// edits, in the order they were created.
    fn apply(&self, edits: &[Edit]) -> TreeResult<Vec<NodeId>>;

    /// Child elements with the given name, in document order.
    ///
    /// Default implementation filters `children()`. Backends may override.
    fn child_elements(&self, node: NodeId, name: &str) -> TreeResult<Vec<NodeId>> {
        let mut out = Vec::new();
        for child in self.children(node)? {
            if self.kind(child)? == NodeKind::Element
                && self.name(child)?.as_deref() == Some(name)
            {
                out.push(child);
            }
        }
        Ok(out)
    }
}
