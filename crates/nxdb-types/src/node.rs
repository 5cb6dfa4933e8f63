use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Identity of a node inside a tree document.
///
/// A `NodeId` is assigned by the tree engine when the node is created and is
/// never reused for another node while the engine is alive. Two handles with
/// the same `NodeId` refer to the same storage location, which is what the
/// identity cache keys on.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(u64);

impl NodeId {
    /// Create a `NodeId` from its raw numeric value.
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// The raw numeric value.
    pub const fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({})", self.0)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl FromStr for NodeId {
    type Err = TypeError;

    /// Parses either `#42` or `42`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s.strip_prefix('#').unwrap_or(s);
        digits
            .parse::<u64>()
            .map(Self)
            .map_err(|_| TypeError::InvalidNodeId(s.to_string()))
    }
}

/// Structural kind of a tree node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    Document,
    Element,
    Attribute,
    Text,
    Comment,
    ProcessingInstruction,
}

impl NodeKind {
    /// Whether nodes of this kind take part in sibling order.
    ///
    /// Attributes hang off their owner element and cannot be targets of
    /// insert-before/insert-after.
    pub fn is_tree_node(&self) -> bool {
        !matches!(self, Self::Attribute)
    }

    /// Whether nodes of this kind may own child nodes.
    pub fn is_container(&self) -> bool {
        matches!(self, Self::Document | Self::Element)
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Document => "document",
            Self::Element => "element",
            Self::Attribute => "attribute",
            Self::Text => "text",
            Self::Comment => "comment",
            Self::ProcessingInstruction => "processing-instruction",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_id_display_and_parse() {
        let id = NodeId::from_raw(42);
        assert_eq!(id.to_string(), "#42");
        assert_eq!("#42".parse::<NodeId>().unwrap(), id);
        assert_eq!("42".parse::<NodeId>().unwrap(), id);
    }

    #[test]
    fn node_id_parse_rejects_garbage() {
        let err = "#x1".parse::<NodeId>().unwrap_err();
        assert_eq!(err, TypeError::InvalidNodeId("#x1".into()));
    }

    #[test]
    fn node_id_serde_is_transparent_number() {
        let json = serde_json::to_string(&NodeId::from_raw(7)).unwrap();
        assert_eq!(json, "7");
    }

    #[test]
    fn attribute_is_not_a_tree_node() {
        assert!(!NodeKind::Attribute.is_tree_node());
        assert!(NodeKind::Comment.is_tree_node());
        assert!(NodeKind::Element.is_container());
        assert!(!NodeKind::Text.is_container());
    }
}
