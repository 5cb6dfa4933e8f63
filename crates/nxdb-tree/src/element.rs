//! Element handles: the storage locations persistent members map onto.

use std::fmt;
use std::sync::Arc;

use nxdb_types::NodeId;

use crate::content::{Content, Edit, Position};
use crate::error::{TreeError, TreeResult};
use crate::traits::TreeEngine;

/// A handle to an element node.
///
/// The handle is cheap to clone and does not pin the node: if the node is
/// deleted, subsequent calls fail with [`TreeError::NodeNotFound`]. Writes
/// through the handle are applied immediately as single-edit batches.
#[derive(Clone)]
pub struct Element {
    tree: Arc<dyn TreeEngine>,
    id: NodeId,
}

impl Element {
    /// Wrap an existing element (or the document node).
    pub fn new(tree: Arc<dyn TreeEngine>, id: NodeId) -> TreeResult<Self> {
        let kind = tree.kind(id)?;
        if !kind.is_container() {
            return Err(TreeError::WrongKind {
                node: id,
                expected: "element",
                actual: kind,
            });
        }
        Ok(Self { tree, id })
    }

    /// The element's identity. Identity caches key on this.
    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn tree(&self) -> &Arc<dyn TreeEngine> {
        &self.tree
    }

    pub fn is_live(&self) -> bool {
        self.tree.is_live(self.id)
    }

    pub fn name(&self) -> TreeResult<Option<String>> {
        self.tree.name(self.id)
    }

    pub fn attribute(&self, name: &str) -> TreeResult<Option<String>> {
        self.tree.attribute(self.id, name)
    }

    pub fn set_attribute(&self, name: &str, value: &str) -> TreeResult<()> {
        self.tree
            .apply(&[Edit::SetAttribute {
                node: self.id,
                name: name.to_string(),
                value: value.to_string(),
            }])
            .map(|_| ())
    }

    pub fn remove_attribute(&self, name: &str) -> TreeResult<()> {
        self.tree
            .apply(&[Edit::RemoveAttribute {
                node: self.id,
                name: name.to_string(),
            }])
            .map(|_| ())
    }

    /// Concatenated descendant text.
    pub fn text(&self) -> TreeResult<String> {
        self.tree.string_value(self.id)
    }

    /// Replace all children with a single text node.
    pub fn set_text(&self, text: &str) -> TreeResult<()> {
        self.tree
            .apply(&[Edit::SetText {
                node: self.id,
                text: text.to_string(),
            }])
            .map(|_| ())
    }

    /// The first child element named `name`.
    pub fn child(&self, name: &str) -> TreeResult<Option<Element>> {
        Ok(self
            .tree
            .child_elements(self.id, name)?
            .into_iter()
            .next()
            .map(|id| self.handle(id)))
    }

    /// All child elements named `name`, in document order.
    pub fn children(&self, name: &str) -> TreeResult<Vec<Element>> {
        Ok(self
            .tree
            .child_elements(self.id, name)?
            .into_iter()
            .map(|id| self.handle(id))
            .collect())
    }

    /// Append a new, empty child element.
    pub fn append_child(&self, name: &str) -> TreeResult<Element> {
        let created = self.tree.apply(&[Edit::Insert {
            target: self.id,
            position: Position::LastChild,
            content: vec![Content::element(name)],
        }])?;
        let id = created.first().copied().ok_or_else(|| TreeError::InvalidEdit {
            node: self.id,
            reason: "engine created no node".into(),
        })?;
        Ok(self.handle(id))
    }

    /// The first child element named `name`, appending one if absent.
    pub fn ensure_child(&self, name: &str) -> TreeResult<Element> {
        match self.child(name)? {
            Some(existing) => Ok(existing),
            None => self.append_child(name),
        }
    }

    /// Delete every child element named `name` in one batch.
    pub fn remove_children(&self, name: &str) -> TreeResult<usize> {
        let edits: Vec<Edit> = self
            .tree
            .child_elements(self.id, name)?
            .into_iter()
            .map(|node| Edit::Delete { node })
            .collect();
        if !edits.is_empty() {
            self.tree.apply(&edits)?;
        }
        Ok(edits.len())
    }

    /// Replace every child element named `name` with one element per text
    /// value, in a single batch.
    pub fn replace_children(&self, name: &str, texts: &[String]) -> TreeResult<()> {
        let mut edits: Vec<Edit> = self
            .tree
            .child_elements(self.id, name)?
            .into_iter()
            .map(|node| Edit::Delete { node })
            .collect();
        if !texts.is_empty() {
            edits.push(Edit::Insert {
                target: self.id,
                position: Position::LastChild,
                content: texts
                    .iter()
                    .map(|t| Content::element(name).child(Content::text(t.clone())))
                    .collect(),
            });
        }
        if !edits.is_empty() {
            self.tree.apply(&edits)?;
        }
        Ok(())
    }

    fn handle(&self, id: NodeId) -> Element {
        Element {
            tree: Arc::clone(&self.tree),
            id,
        }
    }
}

impl PartialEq for Element {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && Arc::ptr_eq(&self.tree, &other.tree)
    }
}

impl fmt::Debug for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Element").field("id", &self.id).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryTree;

    fn root_element() -> Element {
        let tree = Arc::new(InMemoryTree::with_root("root"));
        let id = tree.root_element().unwrap();
        Element::new(tree, id).unwrap()
    }

    #[test]
    fn new_rejects_text_node() {
        let tree = Arc::new(InMemoryTree::with_root("root"));
        let root = tree.root_element().unwrap();
        let ids = tree
            .apply(&[Edit::Insert {
                target: root,
                position: Position::LastChild,
                content: vec![Content::text("t")],
            }])
            .unwrap();
        let err = Element::new(tree, ids[0]).unwrap_err();
        assert!(matches!(err, TreeError::WrongKind { .. }));
    }

    #[test]
    fn attribute_round_trip() {
        let e = root_element();
        assert!(e.attribute("x").unwrap().is_none());
        e.set_attribute("x", "3").unwrap();
        assert_eq!(e.attribute("x").unwrap().as_deref(), Some("3"));
        e.remove_attribute("x").unwrap();
        assert!(e.attribute("x").unwrap().is_none());
    }

    #[test]
    fn ensure_child_is_idempotent() {
        let e = root_element();
        let a = e.ensure_child("a").unwrap();
        let b = e.ensure_child("a").unwrap();
        assert_eq!(a, b);
        assert_eq!(e.children("a").unwrap().len(), 1);
    }

    #[test]
    fn replace_children_rewrites_list() {
        let e = root_element();
        e.replace_children("i", &["1".into(), "2".into()]).unwrap();
        e.replace_children("i", &["3".into()]).unwrap();
        let texts: Vec<String> = e
            .children("i")
            .unwrap()
            .iter()
            .map(|c| c.text().unwrap())
            .collect();
        assert_eq!(texts, vec!["3"]);
    }

    #[test]
    fn remove_children_counts() {
        let e = root_element();
        e.append_child("x").unwrap();
        e.append_child("x").unwrap();
        e.append_child("y").unwrap();
        assert_eq!(e.remove_children("x").unwrap(), 2);
        assert!(e.child("x").unwrap().is_none());
        assert!(e.child("y").unwrap().is_some());
    }
}
