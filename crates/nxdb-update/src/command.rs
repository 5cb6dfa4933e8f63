use nxdb_tree::{Content, Edit, Position};
use nxdb_types::NodeId;

/// Where an inserted sequence lands relative to its target.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Placement {
    Before,
    After,
}

impl From<Placement> for Position {
    fn from(placement: Placement) -> Self {
        match placement {
            Placement::Before => Position::Before,
            Placement::After => Position::After,
        }
    }
}

/// Content to insert: existing nodes (deep-copied when the queue is
/// flushed) or new fragments.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InsertContent {
    Nodes(Vec<NodeId>),
    Fragments(Vec<Content>),
}

impl InsertContent {
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Nodes(nodes) => nodes.is_empty(),
            Self::Fragments(fragments) => fragments.is_empty(),
        }
    }

    /// Existing nodes this content copies from.
    pub fn sources(&self) -> &[NodeId] {
        match self {
            Self::Nodes(nodes) => nodes,
            Self::Fragments(_) => &[],
        }
    }

    pub(crate) fn into_contents(self) -> Vec<Content> {
        match self {
            Self::Nodes(nodes) => nodes.into_iter().map(Content::copy_of).collect(),
            Self::Fragments(fragments) => fragments,
        }
    }
}

impl From<NodeId> for InsertContent {
    fn from(node: NodeId) -> Self {
        Self::Nodes(vec![node])
    }
}

impl From<Vec<NodeId>> for InsertContent {
    fn from(nodes: Vec<NodeId>) -> Self {
        Self::Nodes(nodes)
    }
}

impl From<&[NodeId]> for InsertContent {
    fn from(nodes: &[NodeId]) -> Self {
        Self::Nodes(nodes.to_vec())
    }
}

impl From<Content> for InsertContent {
    fn from(fragment: Content) -> Self {
        Self::Fragments(vec![fragment])
    }
}

impl From<Vec<Content>> for InsertContent {
    fn from(fragments: Vec<Content>) -> Self {
        Self::Fragments(fragments)
    }
}

/// A deferred structural edit, consumed exactly once when its scope
/// flushes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MutationCommand {
    target: NodeId,
    placement: Placement,
    content: Vec<Content>,
}

impl MutationCommand {
    pub fn insert_before(target: NodeId, content: impl Into<InsertContent>) -> Self {
        Self::new(target, Placement::Before, content.into())
    }

    pub fn insert_after(target: NodeId, content: impl Into<InsertContent>) -> Self {
        Self::new(target, Placement::After, content.into())
    }

    pub fn new(target: NodeId, placement: Placement, content: InsertContent) -> Self {
        Self {
            target,
            placement,
            content: content.into_contents(),
        }
    }

    pub fn target(&self) -> NodeId {
        self.target
    }

    pub fn placement(&self) -> Placement {
        self.placement
    }

    pub fn content(&self) -> &[Content] {
        &self.content
    }

    /// Nodes this command deep-copies at flush time.
    pub fn sources(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.content.iter().filter_map(|c| match c {
            Content::Copy(id) => Some(*id),
            _ => None,
        })
    }

    pub fn into_edit(self) -> Edit {
        Edit::Insert {
            target: self.target,
            position: self.placement.into(),
            content: self.content,
        }
    }
}
