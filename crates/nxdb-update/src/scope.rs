//! Update scopes: queue structural edits under an upgradeable lock and flush
//! them as one batch.

use std::fmt;
use std::sync::Arc;

use nxdb_tree::{Edit, TreeEngine};
use nxdb_types::NodeId;
use tracing::{debug, info, warn};

use crate::command::MutationCommand;
use crate::config::UpdateConfig;
use crate::error::{UpdateError, UpdateResult};
use crate::lock::{ReadGuard, UpgradeableGuard, UpgradeableLock};

/// Lifecycle of an [`UpdateScope`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScopeState {
    Open,
    Applying,
    Closed,
}

/// Owns the tree lock and hands out update scopes and read views.
pub struct Updater {
    tree: Arc<dyn TreeEngine>,
    lock: UpgradeableLock,
    config: UpdateConfig,
}

impl Updater {
    pub fn new(tree: Arc<dyn TreeEngine>, config: UpdateConfig) -> Self {
        Self {
            tree,
            lock: UpgradeableLock::new(),
            config,
        }
    }

    pub fn tree(&self) -> &Arc<dyn TreeEngine> {
        &self.tree
    }

    pub fn lock(&self) -> &UpgradeableLock {
        &self.lock
    }

    pub fn config(&self) -> &UpdateConfig {
        &self.config
    }

    /// Open an update scope, waiting for any open scope to close.
    pub fn begin(&self) -> UpdateScope<'_> {
        UpdateScope::open(self, self.lock.upgradeable())
    }

    /// Open an update scope, failing with [`UpdateError::ScopeBusy`] if one
    /// is already open.
    pub fn try_begin(&self) -> UpdateResult<UpdateScope<'_>> {
        let guard = self.lock.try_upgradeable().ok_or(UpdateError::ScopeBusy)?;
        Ok(UpdateScope::open(self, guard))
    }

    /// Shared read access to the tree. Queued commands are not visible.
    pub fn read(&self) -> ReadView<'_> {
        ReadView {
            tree: self.tree.as_ref(),
            _guard: self.lock.read(),
        }
    }
}

impl fmt::Debug for Updater {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Updater")
            .field("lock", &self.lock)
            .field("config", &self.config)
            .finish()
    }
}

/// The tree under a read lock.
pub struct ReadView<'a> {
    tree: &'a dyn TreeEngine,
    _guard: ReadGuard<'a>,
}

impl ReadView<'_> {
    pub fn tree(&self) -> &dyn TreeEngine {
        self.tree
    }
}

/// A batch of deferred mutations.
///
/// The scope holds the upgradeable lock from open to close, so readers keep
/// running while commands queue up. Closing promotes to exclusive access and
/// hands the whole queue to the engine as one batch, in enqueue order.
/// Close through [`commit`](Self::commit) to observe the flush result; a
/// scope dropped while open flushes and logs any failure.
pub struct UpdateScope<'u> {
    updater: &'u Updater,
    guard: Option<UpgradeableGuard<'u>>,
    queue: Vec<MutationCommand>,
    state: ScopeState,
}

impl<'u> UpdateScope<'u> {
    fn open(updater: &'u Updater, guard: UpgradeableGuard<'u>) -> Self {
        debug!("update scope opened");
        Self {
            updater,
            guard: Some(guard),
            queue: Vec::new(),
            state: ScopeState::Open,
        }
    }

    pub fn state(&self) -> ScopeState {
        self.state
    }

    pub fn tree(&self) -> &dyn TreeEngine {
        self.updater.tree.as_ref()
    }

    pub fn pending(&self) -> &[MutationCommand] {
        &self.queue
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Fail with [`UpdateError::StaleNode`] unless `node` is live.
    pub fn check(&self, node: NodeId) -> UpdateResult<()> {
        if self.tree().is_live(node) {
            Ok(())
        } else {
            Err(UpdateError::StaleNode(node))
        }
    }

    /// Validate and queue a command. Commands with no content are dropped.
    pub fn enqueue(&mut self, command: MutationCommand) -> UpdateResult<()> {
        self.check(command.target())?;
        for source in command.sources() {
            self.check(source)?;
        }
        if command.content().is_empty() {
            return Ok(());
        }
        if let Some(limit) = self.updater.config.limit() {
            if self.queue.len() >= limit {
                return Err(UpdateError::QueueFull { limit });
            }
        }
        debug!(node = %command.target(), placement = ?command.placement(), "queued command");
        self.queue.push(command);
        Ok(())
    }

    /// Flush the queue and close the scope. Returns the ids of the
    /// top-level nodes the flush created.
    pub fn commit(mut self) -> UpdateResult<Vec<NodeId>> {
        self.flush()
    }

    /// Discard the queue and close the scope.
    pub fn rollback(mut self) {
        let discarded = self.queue.len();
        self.queue.clear();
        self.guard = None;
        self.state = ScopeState::Closed;
        info!(discarded, "update scope rolled back");
    }

    fn flush(&mut self) -> UpdateResult<Vec<NodeId>> {
        self.state = ScopeState::Applying;
        let commands = std::mem::take(&mut self.queue);
        let Some(guard) = self.guard.take() else {
            self.state = ScopeState::Closed;
            return Ok(Vec::new());
        };
        if commands.is_empty() {
            self.state = ScopeState::Closed;
            return Ok(Vec::new());
        }

        let count = commands.len();
        let edits: Vec<Edit> = commands.into_iter().map(MutationCommand::into_edit).collect();
        let result = {
            let _exclusive = guard.upgrade();
            self.updater.tree.apply(&edits)
        };
        self.state = ScopeState::Closed;
        match result {
            Ok(created) => {
                info!(commands = count, created = created.len(), "update scope flushed");
                Ok(created)
            }
            Err(source) => Err(UpdateError::Flush {
                commands: count,
                source,
            }),
        }
    }
}

impl Drop for UpdateScope<'_> {
    fn drop(&mut self) {
        if self.state != ScopeState::Open {
            return;
        }
        if let Err(e) = self.flush() {
            warn!(error = %e, "update scope flush on drop failed");
        }
    }
}

impl fmt::Debug for UpdateScope<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpdateScope")
            .field("state", &self.state)
            .field("pending", &self.queue.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    use nxdb_tree::{Content, InMemoryTree, Position};
    use proptest::prelude::*;

    struct Fixture {
        tree: Arc<InMemoryTree>,
        root: NodeId,
        a: NodeId,
        b: NodeId,
    }

    /// `<root><a/><b/></root>`
    fn fixture() -> Fixture {
        let tree = Arc::new(InMemoryTree::with_root("root"));
        let root = tree.root_element().unwrap();
        let ids = tree
            .apply(&[Edit::Insert {
                target: root,
                position: Position::LastChild,
                content: vec![Content::element("a"), Content::element("b")],
            }])
            .unwrap();
        Fixture {
            tree,
            root,
            a: ids[0],
            b: ids[1],
        }
    }

    fn updater(f: &Fixture, config: UpdateConfig) -> Updater {
        Updater::new(f.tree.clone(), config)
    }

    // ---- ordering and visibility ----

    #[test]
    fn commands_apply_in_enqueue_order() {
        let f = fixture();
        let u = updater(&f, UpdateConfig::default());
        let mut scope = u.begin();
        scope
            .enqueue(MutationCommand::insert_after(f.a, Content::element("x")))
            .unwrap();
        scope
            .enqueue(MutationCommand::insert_after(f.a, Content::element("y")))
            .unwrap();
        scope
            .enqueue(MutationCommand::insert_before(f.b, Content::element("z")))
            .unwrap();
        scope.commit().unwrap();
        assert_eq!(f.tree.child_names(f.root).unwrap(), vec!["a", "y", "x", "z", "b"]);
    }

    #[test]
    fn queued_commands_are_invisible_until_flush() {
        let f = fixture();
        let u = updater(&f, UpdateConfig::default());
        let mut scope = u.begin();
        scope
            .enqueue(MutationCommand::insert_before(f.a, Content::element("x")))
            .unwrap();
        assert_eq!(scope.len(), 1);
        {
            let view = u.read();
            assert_eq!(view.tree().children(f.root).unwrap().len(), 2);
        }
        scope.commit().unwrap();
        assert_eq!(u.read().tree().children(f.root).unwrap().len(), 3);
    }

    #[test]
    fn flush_is_one_batch() {
        let f = fixture();
        let u = updater(&f, UpdateConfig::default());
        let before = f.tree.batches_applied();
        let mut scope = u.begin();
        for _ in 0..4 {
            scope
                .enqueue(MutationCommand::insert_after(f.b, Content::text("t")))
                .unwrap();
        }
        let created = scope.commit().unwrap();
        assert_eq!(created.len(), 4);
        assert_eq!(f.tree.batches_applied(), before + 1);
    }

    #[test]
    fn failed_flush_applies_nothing() {
        let f = fixture();
        let u = updater(&f, UpdateConfig::default());
        let mut scope = u.begin();
        scope
            .enqueue(MutationCommand::insert_before(f.a, Content::element("x")))
            .unwrap();
        scope
            .enqueue(MutationCommand::insert_after(f.b, Content::element("y")))
            .unwrap();
        f.tree.inject_fault(1);
        let err = scope.commit().unwrap_err();
        assert!(matches!(err, UpdateError::Flush { commands: 2, .. }));
        assert_eq!(f.tree.child_names(f.root).unwrap(), vec!["a", "b"]);
    }

    #[test]
    fn node_sources_are_copied_at_flush() {
        let f = fixture();
        f.tree
            .apply(&[Edit::SetAttribute {
                node: f.b,
                name: "v".into(),
                value: "1".into(),
            }])
            .unwrap();
        let u = updater(&f, UpdateConfig::default());
        let mut scope = u.begin();
        scope
            .enqueue(MutationCommand::insert_before(f.a, vec![f.b]))
            .unwrap();
        let created = scope.commit().unwrap();
        assert_eq!(f.tree.child_names(f.root).unwrap(), vec!["b", "a", "b"]);
        assert_ne!(created[0], f.b);
        assert_eq!(f.tree.attribute(created[0], "v").unwrap().as_deref(), Some("1"));
    }

    proptest! {
        #[test]
        fn flush_preserves_enqueue_order(names in prop::collection::vec("[a-z]{1,4}", 0..8)) {
            let f = fixture();
            let u = updater(&f, UpdateConfig::default());
            let mut scope = u.begin();
            for name in &names {
                scope
                    .enqueue(MutationCommand::insert_before(f.b, Content::element(name.clone())))
                    .unwrap();
            }
            scope.commit().unwrap();

            let mut expected = vec!["a".to_string()];
            expected.extend(names.iter().cloned());
            expected.push("b".to_string());
            prop_assert_eq!(f.tree.child_names(f.root).unwrap(), expected);
        }
    }

    // ---- validation ----

    #[test]
    fn stale_target_is_rejected_before_enqueue() {
        let f = fixture();
        f.tree.apply(&[Edit::Delete { node: f.a }]).unwrap();
        let u = updater(&f, UpdateConfig::default());
        let mut scope = u.begin();
        let err = scope
            .enqueue(MutationCommand::insert_after(f.a, Content::element("x")))
            .unwrap_err();
        assert!(matches!(err, UpdateError::StaleNode(id) if id == f.a));
        assert!(scope.is_empty());
    }

    #[test]
    fn stale_source_is_rejected() {
        let f = fixture();
        f.tree.apply(&[Edit::Delete { node: f.b }]).unwrap();
        let u = updater(&f, UpdateConfig::default());
        let mut scope = u.begin();
        let err = scope
            .enqueue(MutationCommand::insert_after(f.a, f.b))
            .unwrap_err();
        assert!(matches!(err, UpdateError::StaleNode(id) if id == f.b));
    }

    #[test]
    fn empty_content_enqueues_nothing() {
        let f = fixture();
        let u = updater(&f, UpdateConfig::default());
        let mut scope = u.begin();
        scope
            .enqueue(MutationCommand::insert_after(f.a, Vec::<NodeId>::new()))
            .unwrap();
        assert!(scope.is_empty());
    }

    #[test]
    fn queue_limit_is_enforced() {
        let f = fixture();
        let u = updater(&f, UpdateConfig::bounded(2));
        let mut scope = u.begin();
        for _ in 0..2 {
            scope
                .enqueue(MutationCommand::insert_after(f.a, Content::text("t")))
                .unwrap();
        }
        let err = scope
            .enqueue(MutationCommand::insert_after(f.a, Content::text("t")))
            .unwrap_err();
        assert!(matches!(err, UpdateError::QueueFull { limit: 2 }));
        assert_eq!(scope.len(), 2);
    }

    // ---- lifecycle ----

    #[test]
    fn drop_flushes_exactly_once() {
        let f = fixture();
        let u = updater(&f, UpdateConfig::default());
        let before = f.tree.batches_applied();
        {
            let mut scope = u.begin();
            scope
                .enqueue(MutationCommand::insert_after(f.b, Content::element("c")))
                .unwrap();
        }
        assert_eq!(f.tree.batches_applied(), before + 1);
        assert_eq!(f.tree.child_names(f.root).unwrap(), vec!["a", "b", "c"]);
    }

    #[test]
    fn commit_then_drop_does_not_flush_again() {
        let f = fixture();
        let u = updater(&f, UpdateConfig::default());
        let before = f.tree.batches_applied();
        let mut scope = u.begin();
        scope
            .enqueue(MutationCommand::insert_after(f.b, Content::element("c")))
            .unwrap();
        scope.commit().unwrap();
        assert_eq!(f.tree.batches_applied(), before + 1);
    }

    #[test]
    fn rollback_discards_queue() {
        let f = fixture();
        let u = updater(&f, UpdateConfig::default());
        let before = f.tree.batches_applied();
        let mut scope = u.begin();
        scope
            .enqueue(MutationCommand::insert_after(f.b, Content::element("c")))
            .unwrap();
        scope.rollback();
        assert_eq!(f.tree.batches_applied(), before);
        assert_eq!(f.tree.child_names(f.root).unwrap(), vec!["a", "b"]);
        assert!(u.try_begin().is_ok());
    }

    #[test]
    fn scopes_do_not_nest() {
        let f = fixture();
        let u = updater(&f, UpdateConfig::default());
        let scope = u.begin();
        assert_eq!(scope.state(), ScopeState::Open);
        assert!(matches!(u.try_begin().unwrap_err(), UpdateError::ScopeBusy));
        drop(scope);
        assert!(u.try_begin().is_ok());
    }

    #[test]
    fn readers_run_while_scope_is_open() {
        let f = fixture();
        let u = Arc::new(updater(&f, UpdateConfig::default()));
        let mut scope = u.begin();
        scope
            .enqueue(MutationCommand::insert_after(f.a, Content::element("x")))
            .unwrap();

        // the reader finishes before the scope closes; a blocked reader
        // would deadlock the join
        let handle = {
            let u = Arc::clone(&u);
            let root = f.root;
            thread::spawn(move || u.read().tree().children(root).unwrap().len())
        };
        assert_eq!(handle.join().unwrap(), 2);
        scope.commit().unwrap();
    }
}
