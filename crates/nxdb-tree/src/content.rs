//! Raw structural-edit vocabulary understood by the tree engine.

use serde::{Deserialize, Serialize};

use nxdb_types::NodeId;

/// A fragment of content to be inserted into the tree.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Content {
    /// A new element with attributes and child content.
    Element {
        name: String,
        attributes: Vec<(String, String)>,
        children: Vec<Content>,
    },
    /// A text node.
    Text(String),
    /// A comment node.
    Comment(String),
    /// A processing instruction.
    ProcessingInstruction { target: String, data: String },
    /// A deep copy of an existing node, resolved when the edit is applied.
    Copy(NodeId),
}

impl Content {
    /// An empty element.
    pub fn element(name: impl Into<String>) -> Self {
        Self::Element {
            name: name.into(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    pub fn comment(text: impl Into<String>) -> Self {
        Self::Comment(text.into())
    }

    pub fn processing_instruction(target: impl Into<String>, data: impl Into<String>) -> Self {
        Self::ProcessingInstruction {
            target: target.into(),
            data: data.into(),
        }
    }

    pub fn copy_of(node: NodeId) -> Self {
        Self::Copy(node)
    }

    /// Add an attribute. No-op on non-element content.
    pub fn attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        if let Self::Element { attributes, .. } = &mut self {
            let name = name.into();
            let value = value.into();
            match attributes.iter_mut().find(|(n, _)| *n == name) {
                Some(existing) => existing.1 = value,
                None => attributes.push((name, value)),
            }
        }
        self
    }

    /// Append a child. No-op on non-element content.
    pub fn child(mut self, child: Content) -> Self {
        if let Self::Element { children, .. } = &mut self {
            children.push(child);
        }
        self
    }
}

/// Where inserted content lands relative to the target node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Position {
    /// Immediately before the target, as its preceding siblings.
    Before,
    /// Immediately after the target, as its following siblings.
    After,
    /// As the last children of the target.
    LastChild,
}

/// A single raw structural edit.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Edit {
    Insert {
        target: NodeId,
        position: Position,
        content: Vec<Content>,
    },
    SetAttribute {
        node: NodeId,
        name: String,
        value: String,
    },
    RemoveAttribute {
        node: NodeId,
        name: String,
    },
    /// Replace the value of a leaf node, or the children of a container
    /// with a single text node (no text node when `text` is empty).
    SetText {
        node: NodeId,
        text: String,
    },
    Delete {
        node: NodeId,
    },
}

impl Edit {
    /// The node the edit is addressed to.
    pub fn target(&self) -> NodeId {
        match self {
            Self::Insert { target, .. } => *target,
            Self::SetAttribute { node, .. }
            | Self::RemoveAttribute { node, .. }
            | Self::SetText { node, .. }
            | Self::Delete { node } => *node,
        }
    }
}
