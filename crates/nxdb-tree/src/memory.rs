use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, RwLock};

use tracing::debug;

use nxdb_types::{NodeId, NodeKind};

use crate::content::{Content, Edit, Position};
use crate::error::{TreeError, TreeResult};
use crate::traits::TreeEngine;

#[derive(Clone, Debug)]
struct NodeData {
    kind: NodeKind,
    name: Option<String>,
    value: String,
    attributes: Vec<(String, String)>,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

impl NodeData {
    fn new(kind: NodeKind, name: Option<String>, value: String) -> Self {
        Self {
            kind,
            name,
            value,
            attributes: Vec::new(),
            parent: None,
            children: Vec::new(),
        }
    }
}

#[derive(Clone, Debug)]
struct TreeState {
    nodes: HashMap<NodeId, NodeData>,
    next_id: u64,
}

impl TreeState {
    fn node(&self, id: NodeId) -> TreeResult<&NodeData> {
        self.nodes.get(&id).ok_or(TreeError::NodeNotFound(id))
    }

    fn node_mut(&mut self, id: NodeId) -> TreeResult<&mut NodeData> {
        self.nodes.get_mut(&id).ok_or(TreeError::NodeNotFound(id))
    }

    fn alloc(&mut self, data: NodeData) -> NodeId {
        let id = NodeId::from_raw(self.next_id);
        self.next_id += 1;
        self.nodes.insert(id, data);
        id
    }

    /// Materialize a content fragment as a detached subtree.
    fn build(&mut self, content: &Content) -> TreeResult<NodeId> {
        match content {
            Content::Element {
                name,
                attributes,
                children,
            } => {
                let mut data = NodeData::new(NodeKind::Element, Some(name.clone()), String::new());
                data.attributes = attributes.clone();
                let id = self.alloc(data);
                for child in children {
                    let child_id = self.build(child)?;
                    self.attach(id, child_id);
                }
                Ok(id)
            }
            Content::Text(text) => Ok(self.alloc(NodeData::new(NodeKind::Text, None, text.clone()))),
            Content::Comment(text) => {
                Ok(self.alloc(NodeData::new(NodeKind::Comment, None, text.clone())))
            }
            Content::ProcessingInstruction { target, data } => Ok(self.alloc(NodeData::new(
                NodeKind::ProcessingInstruction,
                Some(target.clone()),
                data.clone(),
            ))),
            Content::Copy(source) => self.deep_copy(*source),
        }
    }

    fn deep_copy(&mut self, source: NodeId) -> TreeResult<NodeId> {
        let original = self.node(source)?.clone();
        if original.kind == NodeKind::Document {
            return Err(TreeError::InvalidEdit {
                node: source,
                reason: "cannot copy the document node".into(),
            });
        }
        let mut data = original.clone();
        data.parent = None;
        data.children = Vec::new();
        let id = self.alloc(data);
        for child in original.children {
            let child_id = self.deep_copy(child)?;
            self.attach(id, child_id);
        }
        Ok(id)
    }

    fn attach(&mut self, parent: NodeId, child: NodeId) {
        if let Some(c) = self.nodes.get_mut(&child) {
            c.parent = Some(parent);
        }
        if let Some(p) = self.nodes.get_mut(&parent) {
            p.children.push(child);
        }
    }

    fn remove_subtree(&mut self, id: NodeId) {
        if let Some(data) = self.nodes.remove(&id) {
            for child in data.children {
                self.remove_subtree(child);
            }
        }
    }

    fn insert(
        &mut self,
        target: NodeId,
        position: Position,
        content: &[Content],
        created: &mut Vec<NodeId>,
    ) -> TreeResult<()> {
        let target_data = self.node(target)?;
        let (parent, mut index) = match position {
            Position::LastChild => {
                if !target_data.kind.is_container() {
                    return Err(TreeError::InvalidEdit {
                        node: target,
                        reason: format!("a {} cannot have children", target_data.kind),
                    });
                }
                (target, target_data.children.len())
            }
            Position::Before | Position::After => {
                let parent = target_data.parent.ok_or_else(|| TreeError::InvalidEdit {
                    node: target,
                    reason: "node has no parent".into(),
                })?;
                let siblings = &self.node(parent)?.children;
                let at = siblings
                    .iter()
                    .position(|c| *c == target)
                    .ok_or(TreeError::NodeNotFound(target))?;
                let at = if position == Position::After { at + 1 } else { at };
                (parent, at)
            }
        };

        for fragment in content {
            let id = self.build(fragment)?;
            self.node_mut(id)?.parent = Some(parent);
            self.node_mut(parent)?.children.insert(index, id);
            index += 1;
            created.push(id);
        }
        Ok(())
    }

    fn apply_one(&mut self, edit: &Edit, created: &mut Vec<NodeId>) -> TreeResult<()> {
        match edit {
            Edit::Insert {
                target,
                position,
                content,
            } => self.insert(*target, *position, content, created),
            Edit::SetAttribute { node, name, value } => {
                let data = self.node_mut(*node)?;
                if data.kind != NodeKind::Element {
                    return Err(TreeError::WrongKind {
                        node: *node,
                        expected: "element",
                        actual: data.kind,
                    });
                }
                match data.attributes.iter_mut().find(|(n, _)| n == name) {
                    Some(existing) => existing.1 = value.clone(),
                    None => data.attributes.push((name.clone(), value.clone())),
                }
                Ok(())
            }
            Edit::RemoveAttribute { node, name } => {
                let data = self.node_mut(*node)?;
                data.attributes.retain(|(n, _)| n != name);
                Ok(())
            }
            Edit::SetText { node, text } => {
                let kind = self.node(*node)?.kind;
                if kind.is_container() {
                    let old = std::mem::take(&mut self.node_mut(*node)?.children);
                    for child in old {
                        self.remove_subtree(child);
                    }
                    if !text.is_empty() {
                        let id = self.alloc(NodeData::new(NodeKind::Text, None, text.clone()));
                        self.attach(*node, id);
                    }
                } else {
                    self.node_mut(*node)?.value = text.clone();
                }
                Ok(())
            }
            Edit::Delete { node } => {
                let parent = self.node(*node)?.parent.ok_or_else(|| TreeError::InvalidEdit {
                    node: *node,
                    reason: "cannot delete a node without parent".into(),
                })?;
                self.node_mut(parent)?.children.retain(|c| c != node);
                self.remove_subtree(*node);
                Ok(())
            }
        }
    }

    fn collect_text(&self, id: NodeId, out: &mut String) {
        if let Some(data) = self.nodes.get(&id) {
            match data.kind {
                NodeKind::Text => out.push_str(&data.value),
                NodeKind::Document | NodeKind::Element => {
                    for child in &data.children {
                        self.collect_text(*child, out);
                    }
                }
                _ => {}
            }
        }
    }
}

/// In-memory, arena-backed tree document.
///
/// Intended for tests and embedding. The whole document lives behind a
/// `RwLock`; `apply` stages a batch on a copy of the document and publishes
/// the copy only when every edit succeeded, which gives all-or-nothing batch
/// semantics.
///
/// Staging copies every node, so each non-empty batch costs time and memory
/// proportional to the whole document, not to the batch. Large documents
/// with frequent small batches want an engine with an undo log instead.
pub struct InMemoryTree {
    state: RwLock<TreeState>,
    document: NodeId,
    /// One-shot injected failure: the next batch fails at this edit index.
    fault: Mutex<Option<usize>>,
    batches: AtomicU64,
}

impl InMemoryTree {
    /// Create an empty document.
    pub fn new() -> Self {
        let mut nodes = HashMap::new();
        let document = NodeId::from_raw(0);
        nodes.insert(document, NodeData::new(NodeKind::Document, None, String::new()));
        Self {
            state: RwLock::new(TreeState { nodes, next_id: 1 }),
            document,
            fault: Mutex::new(None),
            batches: AtomicU64::new(0),
        }
    }

    /// Create a document with a single root element.
    pub fn with_root(name: &str) -> Self {
        let tree = Self::new();
        {
            let mut state = tree.state.write().expect("lock poisoned");
            let root = state.alloc(NodeData::new(NodeKind::Element, Some(name.to_string()), String::new()));
            state.attach(tree.document, root);
        }
        tree
    }

    /// The first element child of the document, if any.
    pub fn root_element(&self) -> Option<NodeId> {
        let state = self.state.read().expect("lock poisoned");
        state.nodes.get(&self.document).and_then(|doc| {
            doc.children
                .iter()
                .copied()
                .find(|c| state.nodes.get(c).map(|n| n.kind) == Some(NodeKind::Element))
        })
    }

    /// Number of live nodes, including the document node.
    pub fn len(&self) -> usize {
        self.state.read().expect("lock poisoned").nodes.len()
    }

    /// Returns `true` if the document has no children.
    pub fn is_empty(&self) -> bool {
        let state = self.state.read().expect("lock poisoned");
        state
            .nodes
            .get(&self.document)
            .map(|d| d.children.is_empty())
            .unwrap_or(true)
    }

    /// Number of non-empty batches successfully applied.
    pub fn batches_applied(&self) -> u64 {
        self.batches.load(Ordering::Acquire)
    }

    /// Make the next batch fail when it reaches the edit at `index`.
    ///
    /// Edits before `index` are applied to the staged copy first, so this
    /// exercises the partial-failure path of a batch.
    pub fn inject_fault(&self, index: usize) {
        *self.fault.lock().expect("lock poisoned") = Some(index);
    }

    /// Names of the element children of `node`, in document order.
    pub fn child_names(&self, node: NodeId) -> TreeResult<Vec<String>> {
        let state = self.state.read().expect("lock poisoned");
        let data = state.node(node)?;
        Ok(data
            .children
            .iter()
            .filter_map(|c| state.nodes.get(c))
            .map(|c| match c.kind {
                NodeKind::Element | NodeKind::ProcessingInstruction => {
                    c.name.clone().unwrap_or_default()
                }
                NodeKind::Text => "#text".to_string(),
                NodeKind::Comment => "#comment".to_string(),
                other => format!("#{other}"),
            })
            .collect())
    }
}

impl Default for InMemoryTree {
    fn default() -> Self {
        Self::new()
    }
}

impl TreeEngine for InMemoryTree {
    fn document(&self) -> NodeId {
        self.document
    }

    fn is_live(&self, node: NodeId) -> bool {
        self.state.read().expect("lock poisoned").nodes.contains_key(&node)
    }

    fn kind(&self, node: NodeId) -> TreeResult<NodeKind> {
        Ok(self.state.read().expect("lock poisoned").node(node)?.kind)
    }

    fn name(&self, node: NodeId) -> TreeResult<Option<String>> {
        Ok(self.state.read().expect("lock poisoned").node(node)?.name.clone())
    }

    fn parent(&self, node: NodeId) -> TreeResult<Option<NodeId>> {
        Ok(self.state.read().expect("lock poisoned").node(node)?.parent)
    }

    fn children(&self, node: NodeId) -> TreeResult<Vec<NodeId>> {
        Ok(self.state.read().expect("lock poisoned").node(node)?.children.clone())
    }

    fn attribute(&self, node: NodeId, name: &str) -> TreeResult<Option<String>> {
        let state = self.state.read().expect("lock poisoned");
        Ok(state
            .node(node)?
            .attributes
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.clone()))
    }

    fn attributes(&self, node: NodeId) -> TreeResult<Vec<(String, String)>> {
        Ok(self.state.read().expect("lock poisoned").node(node)?.attributes.clone())
    }

    fn string_value(&self, node: NodeId) -> TreeResult<String> {
        let state = self.state.read().expect("lock poisoned");
        let data = state.node(node)?;
        if data.kind.is_container() {
            let mut out = String::new();
            state.collect_text(node, &mut out);
            Ok(out)
        } else {
            Ok(data.value.clone())
        }
    }

    fn apply(&self, edits: &[Edit]) -> TreeResult<Vec<NodeId>> {
        if edits.is_empty() {
            return Ok(Vec::new());
        }
        let fault = self.fault.lock().expect("lock poisoned").take();
        let mut state = self.state.write().expect("lock poisoned");
        let mut staged = state.clone();
        let mut created = Vec::new();

        for (index, edit) in edits.iter().enumerate() {
            if fault == Some(index) {
                debug!(index, batch = edits.len(), "injected fault, discarding batch");
                return Err(TreeError::Fault { index });
            }
            staged.apply_one(edit, &mut created)?;
        }

        *state = staged;
        self.batches.fetch_add(1, Ordering::AcqRel);
        debug!(edits = edits.len(), created = created.len(), "applied edit batch");
        Ok(created)
    }
}

impl std::fmt::Debug for InMemoryTree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryTree")
            .field("node_count", &self.len())
            .field("batches_applied", &self.batches_applied())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn root(tree: &InMemoryTree) -> NodeId {
        tree.root_element().expect("root element")
    }

    fn append(tree: &InMemoryTree, parent: NodeId, content: Vec<Content>) -> Vec<NodeId> {
        tree.apply(&[Edit::Insert {
            target: parent,
            position: Position::LastChild,
            content,
        }])
        .unwrap()
    }

    // -----------------------------------------------------------------------
    // Construction
    // -----------------------------------------------------------------------

    #[test]
    fn new_tree_has_only_document() {
        let tree = InMemoryTree::new();
        assert_eq!(tree.len(), 1);
        assert!(tree.is_empty());
        assert_eq!(tree.kind(tree.document()).unwrap(), NodeKind::Document);
        assert!(tree.root_element().is_none());
    }

    #[test]
    fn with_root_creates_element() {
        let tree = InMemoryTree::with_root("db");
        let r = root(&tree);
        assert_eq!(tree.name(r).unwrap().as_deref(), Some("db"));
        assert_eq!(tree.parent(r).unwrap(), Some(tree.document()));
    }

    // -----------------------------------------------------------------------
    // Insert
    // -----------------------------------------------------------------------

    #[test]
    fn insert_before_and_after_keep_sibling_order() {
        let tree = InMemoryTree::with_root("r");
        let r = root(&tree);
        let ids = append(&tree, r, vec![Content::element("b")]);
        let b = ids[0];

        tree.apply(&[
            Edit::Insert {
                target: b,
                position: Position::Before,
                content: vec![Content::element("a")],
            },
            Edit::Insert {
                target: b,
                position: Position::After,
                content: vec![Content::element("c"), Content::element("d")],
            },
        ])
        .unwrap();

        assert_eq!(tree.child_names(r).unwrap(), vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn insert_returns_created_ids_in_order() {
        let tree = InMemoryTree::with_root("r");
        let r = root(&tree);
        let ids = append(
            &tree,
            r,
            vec![Content::element("x"), Content::text("t"), Content::comment("c")],
        );
        assert_eq!(ids.len(), 3);
        assert_eq!(tree.children(r).unwrap(), ids);
        assert_eq!(tree.kind(ids[2]).unwrap(), NodeKind::Comment);
    }

    #[test]
    fn insert_before_document_child_of_nothing_fails() {
        let tree = InMemoryTree::new();
        let err = tree
            .apply(&[Edit::Insert {
                target: tree.document(),
                position: Position::Before,
                content: vec![Content::element("x")],
            }])
            .unwrap_err();
        assert!(matches!(err, TreeError::InvalidEdit { .. }));
    }

    #[test]
    fn copy_content_duplicates_subtree() {
        let tree = InMemoryTree::with_root("r");
        let r = root(&tree);
        let ids = append(
            &tree,
            r,
            vec![Content::element("p").attr("k", "v").child(Content::text("hello"))],
        );
        let copies = append(&tree, r, vec![Content::copy_of(ids[0])]);

        assert_ne!(copies[0], ids[0]);
        assert_eq!(tree.attribute(copies[0], "k").unwrap().as_deref(), Some("v"));
        assert_eq!(tree.string_value(copies[0]).unwrap(), "hello");
    }

    // -----------------------------------------------------------------------
    // Attributes / text / delete
    // -----------------------------------------------------------------------

    #[test]
    fn set_and_remove_attribute() {
        let tree = InMemoryTree::with_root("r");
        let r = root(&tree);
        tree.apply(&[Edit::SetAttribute {
            node: r,
            name: "a".into(),
            value: "1".into(),
        }])
        .unwrap();
        assert_eq!(tree.attribute(r, "a").unwrap().as_deref(), Some("1"));

        tree.apply(&[Edit::RemoveAttribute {
            node: r,
            name: "a".into(),
        }])
        .unwrap();
        assert!(tree.attribute(r, "a").unwrap().is_none());
    }

    #[test]
    fn set_text_replaces_children() {
        let tree = InMemoryTree::with_root("r");
        let r = root(&tree);
        let ids = append(&tree, r, vec![Content::element("old")]);
        tree.apply(&[Edit::SetText {
            node: r,
            text: "new".into(),
        }])
        .unwrap();
        assert!(!tree.is_live(ids[0]));
        assert_eq!(tree.string_value(r).unwrap(), "new");
    }

    #[test]
    fn delete_removes_descendants() {
        let tree = InMemoryTree::with_root("r");
        let r = root(&tree);
        let ids = append(&tree, r, vec![Content::element("a").child(Content::text("x"))]);
        let text = tree.children(ids[0]).unwrap()[0];
        tree.apply(&[Edit::Delete { node: ids[0] }]).unwrap();
        assert!(!tree.is_live(ids[0]));
        assert!(!tree.is_live(text));
        assert!(tree.children(r).unwrap().is_empty());
    }

    // -----------------------------------------------------------------------
    // Atomic batches
    // -----------------------------------------------------------------------

    #[test]
    fn failing_edit_discards_whole_batch() {
        let tree = InMemoryTree::with_root("r");
        let r = root(&tree);
        let before = tree.len();
        let err = tree
            .apply(&[
                Edit::Insert {
                    target: r,
                    position: Position::LastChild,
                    content: vec![Content::element("kept?")],
                },
                Edit::Delete {
                    node: NodeId::from_raw(999),
                },
            ])
            .unwrap_err();
        assert!(matches!(err, TreeError::NodeNotFound(_)));
        assert_eq!(tree.len(), before);
        assert!(tree.children(r).unwrap().is_empty());
    }

    #[test]
    fn injected_fault_is_one_shot() {
        let tree = InMemoryTree::with_root("r");
        let r = root(&tree);
        let edit = Edit::Insert {
            target: r,
            position: Position::LastChild,
            content: vec![Content::element("x")],
        };
        tree.inject_fault(1);
        let err = tree.apply(&[edit.clone(), edit.clone()]).unwrap_err();
        assert!(matches!(err, TreeError::Fault { index: 1 }));
        assert_eq!(tree.batches_applied(), 0);
        assert!(tree.children(r).unwrap().is_empty());

        tree.apply(&[edit.clone(), edit]).unwrap();
        assert_eq!(tree.children(r).unwrap().len(), 2);
        assert_eq!(tree.batches_applied(), 1);
    }

    #[test]
    fn empty_batch_is_not_staged() {
        let tree = InMemoryTree::with_root("r");
        let before = tree.len();
        assert!(tree.apply(&[]).unwrap().is_empty());
        assert_eq!(tree.batches_applied(), 0);
        assert_eq!(tree.len(), before);
    }

    #[test]
    fn child_elements_filters_by_name() {
        let tree = InMemoryTree::with_root("r");
        let r = root(&tree);
        let ids = append(
            &tree,
            r,
            vec![Content::element("a"), Content::element("b"), Content::element("a")],
        );
        assert_eq!(tree.child_elements(r, "a").unwrap(), vec![ids[0], ids[2]]);
    }
}
