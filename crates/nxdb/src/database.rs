use std::fmt;
use std::sync::Arc;

use nxdb_persist::{Persistence, Persistent, Session, Shared};
use nxdb_query::{Query, QueryEngine, Results, SimpleEngine};
use nxdb_tree::{Element, InMemoryTree, TreeEngine};
use nxdb_types::{FromItem, NodeId, NodeKind, Sequence};
use nxdb_update::{ReadView, UpdateError, UpdateScope, Updater};
use tracing::{debug, info};

use crate::config::NxdbConfig;
use crate::error::DatabaseResult;

/// The context every engine-facing call goes through.
///
/// A `Database` owns the tree (behind the update lock), the query engine and
/// the persistence layer, each configured from one [`NxdbConfig`]. There is
/// no process-wide instance: create one and pass it where it is needed.
pub struct Database {
    updater: Updater,
    engine: Arc<dyn QueryEngine>,
    persistence: Persistence,
    config: NxdbConfig,
}

impl Database {
    /// Open over `tree` with the built-in query engine.
    pub fn new(tree: Arc<dyn TreeEngine>, config: NxdbConfig) -> Self {
        let engine = Arc::new(SimpleEngine::new(config.query.clone()));
        Self::with_engine(tree, engine, config)
    }

    pub fn with_engine(tree: Arc<dyn TreeEngine>, engine: Arc<dyn QueryEngine>, config: NxdbConfig) -> Self {
        info!(
            engine = engine.name(),
            max_pending_commands = config.update.max_pending_commands,
            strict_forms = config.persist.strict_forms,
            "database opened"
        );
        Self {
            updater: Updater::new(tree, config.update.clone()),
            engine,
            persistence: Persistence::new(config.persist.clone()),
            config,
        }
    }

    /// A database over a fresh in-memory document whose root element is
    /// named `root`.
    pub fn in_memory(root: &str, config: NxdbConfig) -> Self {
        Self::new(Arc::new(InMemoryTree::with_root(root)), config)
    }

    pub fn config(&self) -> &NxdbConfig {
        &self.config
    }

    /// The underlying engine. Edits applied through it directly do not take
    /// the update lock.
    pub fn tree(&self) -> &Arc<dyn TreeEngine> {
        self.updater.tree()
    }

    pub fn updater(&self) -> &Updater {
        &self.updater
    }

    pub fn engine(&self) -> &dyn QueryEngine {
        self.engine.as_ref()
    }

    pub fn persistence(&self) -> &Persistence {
        &self.persistence
    }

    /// A persistence session: fetches within it share object identity.
    pub fn session(&self) -> Session {
        self.persistence.session()
    }

    // ---- Tree ----

    fn element(&self, id: NodeId) -> DatabaseResult<Element> {
        Ok(Element::new(Arc::clone(self.tree()), id)?)
    }

    /// The document's root element, if it has one.
    pub fn root_element(&self) -> DatabaseResult<Option<NodeId>> {
        let _view = self.read();
        let tree = self.tree();
        for child in tree.children(tree.document())? {
            if tree.kind(child)? == NodeKind::Element {
                return Ok(Some(child));
            }
        }
        Ok(None)
    }

    /// Run `f` on element `id` under a read lock.
    pub fn inspect<R>(&self, id: NodeId, f: impl FnOnce(&Element) -> DatabaseResult<R>) -> DatabaseResult<R> {
        let _view = self.read();
        f(&self.element(id)?)
    }

    /// Run `f` on element `id` with exclusive access to the tree, so its
    /// edits cannot interleave with an update scope or a reader. Waits for
    /// any open scope to close, so it must not be called while the caller
    /// holds one.
    pub fn modify<R>(&self, id: NodeId, f: impl FnOnce(&Element) -> DatabaseResult<R>) -> DatabaseResult<R> {
        let _exclusive = self.updater.lock().upgradeable().upgrade();
        f(&self.element(id)?)
    }

    /// Like [`modify`](Self::modify), but fails with
    /// [`UpdateError::ScopeBusy`] instead of waiting when a scope is open.
    pub fn try_modify<R>(&self, id: NodeId, f: impl FnOnce(&Element) -> DatabaseResult<R>) -> DatabaseResult<R> {
        let Some(upgradeable) = self.updater.lock().try_upgradeable() else {
            return Err(UpdateError::ScopeBusy.into());
        };
        let _exclusive = upgradeable.upgrade();
        f(&self.element(id)?)
    }

    /// Open an update scope, waiting for any open scope to close.
    pub fn begin_update(&self) -> UpdateScope<'_> {
        self.updater.begin()
    }

    pub fn try_begin_update(&self) -> DatabaseResult<UpdateScope<'_>> {
        Ok(self.updater.try_begin()?)
    }

    pub fn read(&self) -> ReadView<'_> {
        self.updater.read()
    }

    // ---- Queries ----

    pub fn query(&self, expression: &str) -> DatabaseResult<Query> {
        Ok(Query::new(expression)?)
    }

    /// Start evaluating `query`. The results are lazy and hold no lock.
    pub fn evaluate(&self, query: &Query) -> DatabaseResult<Results> {
        Ok(query.evaluate(self.engine.as_ref())?)
    }

    /// Evaluate `query` to completion under a read lock.
    pub fn get_list(&self, query: &Query) -> DatabaseResult<Sequence> {
        let _view = self.read();
        Ok(query.get_list(self.engine.as_ref())?)
    }

    pub fn get_list_of<T: FromItem>(&self, query: &Query) -> DatabaseResult<Vec<T>> {
        let _view = self.read();
        Ok(query.get_list_of(self.engine.as_ref())?)
    }

    // ---- Objects ----

    /// Load `target` from element `id` under a read lock.
    pub fn fetch<T: Persistent>(&self, id: NodeId, target: &mut T) -> DatabaseResult<()> {
        let _view = self.read();
        let element = self.element(id)?;
        self.persistence.fetch(&element, target)?;
        Ok(())
    }

    pub fn fetch_object<T: Persistent + Default>(&self, id: NodeId) -> DatabaseResult<Shared<T>> {
        let _view = self.read();
        let element = self.element(id)?;
        Ok(self.persistence.fetch_object(&element)?)
    }

    /// Serialize `source` and store it into element `id` with exclusive
    /// access to the tree. Waits for any open update scope to close, so it
    /// must not be called while the caller holds one.
    pub fn save<T: Persistent>(&self, id: NodeId, source: &T) -> DatabaseResult<()> {
        let _exclusive = self.updater.lock().upgradeable().upgrade();
        let element = self.element(id)?;
        self.session().save(&element, source)?;
        debug!(node = %id, "object saved");
        Ok(())
    }
}

impl fmt::Debug for Database {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Database")
            .field("engine", &self.engine.name())
            .field("updater", &self.updater)
            .field("config", &self.config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nxdb_persist::{Scalar, TypeDescription};
    use nxdb_query::QueryConfig;
    use nxdb_tree::Content;
    use nxdb_types::Item;
    use nxdb_update::{MutationCommand, TreeNode, UpdateConfig};

    use crate::error::DatabaseError;

    #[derive(Debug, Default, PartialEq)]
    struct Point {
        x: i32,
        y: i32,
    }

    impl Persistent for Point {
        fn describe(d: &mut TypeDescription<Self>) {
            d.field("x", |p| &p.x, |p| &mut p.x, Scalar::attribute("x"));
            d.field("y", |p| &p.y, |p| &mut p.y, Scalar::attribute("y"));
        }
    }

    fn db() -> (Arc<InMemoryTree>, Database) {
        let tree = Arc::new(InMemoryTree::with_root("root"));
        let db = Database::new(tree.clone(), NxdbConfig::default());
        (tree, db)
    }

    // ---- queries ----

    #[test]
    fn variable_plus_one() {
        let (_, db) = db();
        let mut q = db.query("$x + 1").unwrap();
        q.set_variable("x", 5).unwrap();
        assert_eq!(db.get_list_of::<i64>(&q).unwrap(), vec![6]);
    }

    #[test]
    fn default_collection_in_order() {
        let (_, db) = db();
        let mut q = db.query(".").unwrap();
        q.set_default_collection(vec![1, 2, 3]);
        assert_eq!(db.get_list(&q).unwrap(), Sequence::from(vec![1, 2, 3]));
    }

    #[test]
    fn empty_expression_is_query_error() {
        let (_, db) = db();
        assert!(matches!(db.query("").unwrap_err(), DatabaseError::Query(_)));
    }

    #[test]
    fn node_items_round_trip_through_queries() {
        let (tree, db) = db();
        let root = tree.root_element().unwrap();
        let mut q = db.query("$n, $n = $n").unwrap();
        q.set_variable("n", root).unwrap();
        let out = db.evaluate(&q).unwrap().into_sequence().unwrap();
        assert_eq!(out, Sequence::new(vec![Item::Node(root), Item::Boolean(true)]));
    }

    #[test]
    fn query_config_reaches_engine() {
        let config = NxdbConfig {
            query: QueryConfig::unoptimized(),
            ..Default::default()
        };
        let db = Database::in_memory("root", config);
        assert_eq!(db.engine().name(), "simple");
        let q = db.query("2 * 3").unwrap();
        assert_eq!(db.get_list_of::<i64>(&q).unwrap(), vec![6]);
    }

    // ---- objects ----

    #[test]
    fn store_then_fetch_point() {
        let (tree, db) = db();
        let root = tree.root_element().unwrap();
        db.save(root, &Point { x: 3, y: 4 }).unwrap();

        let mut loaded = Point::default();
        db.fetch(root, &mut loaded).unwrap();
        assert_eq!(loaded, Point { x: 3, y: 4 });

        let shared = db.fetch_object::<Point>(root).unwrap();
        assert_eq!(*shared.read().unwrap(), Point { x: 3, y: 4 });
    }

    #[test]
    fn root_element_found() {
        let (tree, db) = db();
        assert_eq!(db.root_element().unwrap(), tree.root_element());
        assert!(Database::new(Arc::new(InMemoryTree::new()), NxdbConfig::default())
            .root_element()
            .unwrap()
            .is_none());
    }

    #[test]
    fn element_of_missing_node_fails() {
        let (_, db) = db();
        let err = db.inspect(NodeId::from_raw(9999), |_| Ok(())).unwrap_err();
        assert!(matches!(err, DatabaseError::Tree(_)));
    }

    // ---- updates ----

    #[test]
    fn scope_commit_applies_inserts() {
        let (tree, db) = db();
        let root = tree.root_element().unwrap();
        let anchor = db.modify(root, |e| Ok(e.append_child("a")?)).unwrap();

        let mut scope = db.begin_update();
        let node = TreeNode::from(&anchor);
        node.insert_element_before(&mut scope, "before").unwrap();
        node.insert_element_after(&mut scope, "after").unwrap();
        assert_eq!(tree.child_names(root).unwrap(), vec!["a"]);
        scope.commit().unwrap();

        assert_eq!(tree.child_names(root).unwrap(), vec!["before", "a", "after"]);
    }

    #[test]
    fn second_scope_is_busy() {
        let (_, db) = db();
        let _scope = db.begin_update();
        assert!(matches!(
            db.try_begin_update().unwrap_err(),
            DatabaseError::Update(UpdateError::ScopeBusy)
        ));
    }

    #[test]
    fn element_edits_wait_for_open_scope() {
        let (tree, db) = db();
        let root = tree.root_element().unwrap();
        let scope = db.begin_update();
        let err = db.try_modify(root, |e| Ok(e.append_child("x")?)).unwrap_err();
        assert!(matches!(err, DatabaseError::Update(UpdateError::ScopeBusy)));
        assert!(tree.child_names(root).unwrap().is_empty());

        drop(scope);
        db.try_modify(root, |e| Ok(e.append_child("x")?)).unwrap();
        assert_eq!(tree.child_names(root).unwrap(), vec!["x"]);
        let count = db.inspect(root, |e| Ok(e.children("x")?.len())).unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn update_config_bounds_queue() {
        let config = NxdbConfig {
            update: UpdateConfig::bounded(1),
            ..Default::default()
        };
        let tree = Arc::new(InMemoryTree::with_root("root"));
        let db = Database::new(tree.clone(), config);
        let root = tree.root_element().unwrap();
        let anchor = db.modify(root, |e| Ok(e.append_child("a")?.id())).unwrap();

        let mut scope = db.begin_update();
        scope.enqueue(MutationCommand::insert_after(anchor, Content::element("b"))).unwrap();
        let err = scope
            .enqueue(MutationCommand::insert_after(anchor, Content::element("c")))
            .unwrap_err();
        assert!(matches!(err, UpdateError::QueueFull { limit: 1 }));
        scope.rollback();
    }
}
