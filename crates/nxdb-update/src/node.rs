use std::fmt;

use nxdb_tree::{Content, Element, TreeEngine, TreeError};
use nxdb_types::{NodeId, NodeKind};

use crate::command::{InsertContent, MutationCommand, Placement};
use crate::error::{UpdateError, UpdateResult};
use crate::scope::UpdateScope;

/// A node that can receive sibling insertions through an update scope.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct TreeNode {
    id: NodeId,
}

impl TreeNode {
    pub fn new(id: NodeId) -> Self {
        Self { id }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Queue `content` for insertion directly before this node.
    pub fn insert_before(&self, scope: &mut UpdateScope<'_>, content: impl Into<InsertContent>) -> UpdateResult<()> {
        self.insert(scope, Placement::Before, content.into())
    }

    /// Queue `content` for insertion directly after this node.
    pub fn insert_after(&self, scope: &mut UpdateScope<'_>, content: impl Into<InsertContent>) -> UpdateResult<()> {
        self.insert(scope, Placement::After, content.into())
    }

    /// Queue a single new element before this node.
    pub fn insert_element_before(&self, scope: &mut UpdateScope<'_>, name: &str) -> UpdateResult<()> {
        self.insert_before(scope, Content::element(name))
    }

    /// Queue a single new element after this node.
    pub fn insert_element_after(&self, scope: &mut UpdateScope<'_>, name: &str) -> UpdateResult<()> {
        self.insert_after(scope, Content::element(name))
    }

    fn insert(&self, scope: &mut UpdateScope<'_>, placement: Placement, content: InsertContent) -> UpdateResult<()> {
        scope.check(self.id)?;
        require_sibling_target(scope.tree(), self.id)?;
        if content.is_empty() {
            return Ok(());
        }
        scope.enqueue(MutationCommand::new(self.id, placement, content))
    }
}

/// Sibling insertion needs a node with a parent: not the document, not an
/// attribute.
fn require_sibling_target(tree: &dyn TreeEngine, id: NodeId) -> UpdateResult<()> {
    let kind = tree.kind(id)?;
    if matches!(kind, NodeKind::Document | NodeKind::Attribute) {
        return Err(UpdateError::Tree(TreeError::WrongKind {
            node: id,
            expected: "child node",
            actual: kind,
        }));
    }
    Ok(())
}

impl From<NodeId> for TreeNode {
    fn from(id: NodeId) -> Self {
        Self::new(id)
    }
}

impl From<&Element> for TreeNode {
    fn from(element: &Element) -> Self {
        Self::new(element.id())
    }
}

impl fmt::Debug for TreeNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TreeNode({})", self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use nxdb_tree::{Edit, InMemoryTree, Position};

    use crate::config::UpdateConfig;
    use crate::scope::Updater;

    fn setup() -> (Arc<InMemoryTree>, Updater, NodeId, NodeId) {
        let tree = Arc::new(InMemoryTree::with_root("list"));
        let root = tree.root_element().unwrap();
        let ids = tree
            .apply(&[Edit::Insert {
                target: root,
                position: Position::LastChild,
                content: vec![Content::element("item").attr("n", "1")],
            }])
            .unwrap();
        let updater = Updater::new(tree.clone(), UpdateConfig::default());
        (tree, updater, root, ids[0])
    }

    #[test]
    fn insert_before_and_after() {
        let (tree, updater, root, item) = setup();
        let node = TreeNode::new(item);
        let mut scope = updater.begin();
        node.insert_element_before(&mut scope, "first").unwrap();
        node.insert_after(&mut scope, vec![Content::element("last"), Content::comment("end")])
            .unwrap();
        assert_eq!(tree.child_names(root).unwrap(), vec!["item"]);
        scope.commit().unwrap();
        assert_eq!(
            tree.child_names(root).unwrap(),
            vec!["first", "item", "last", "#comment"]
        );
    }

    #[test]
    fn insert_copies_of_existing_nodes() {
        let (tree, updater, root, item) = setup();
        let mut scope = updater.begin();
        TreeNode::new(item).insert_after(&mut scope, vec![item, item]).unwrap();
        scope.commit().unwrap();
        let children = tree.children(root).unwrap();
        assert_eq!(children.len(), 3);
        for child in &children[1..] {
            assert_eq!(tree.attribute(*child, "n").unwrap().as_deref(), Some("1"));
        }
    }

    #[test]
    fn document_is_not_a_sibling_target() {
        let (tree, updater, _, _) = setup();
        let mut scope = updater.begin();
        let err = TreeNode::new(tree.document())
            .insert_before(&mut scope, Content::element("x"))
            .unwrap_err();
        assert!(matches!(err, UpdateError::Tree(_)));
        assert!(scope.is_empty());
    }

    #[test]
    fn deleted_node_is_stale() {
        let (tree, updater, _, item) = setup();
        tree.apply(&[Edit::Delete { node: item }]).unwrap();
        let mut scope = updater.begin();
        let err = TreeNode::new(item)
            .insert_after(&mut scope, Content::element("x"))
            .unwrap_err();
        assert!(matches!(err, UpdateError::StaleNode(_)));
    }
}
