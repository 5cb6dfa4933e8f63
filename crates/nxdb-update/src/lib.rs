//! Deferred tree mutation for Nxdb.
//!
//! Structural edits are not applied when requested. They are validated,
//! wrapped in a [`MutationCommand`] and appended to the queue of an open
//! [`UpdateScope`]. When the scope closes, the whole queue goes to the tree
//! engine as a single batch, in enqueue order.
//!
//! # Locking
//!
//! An [`UpgradeableLock`] guards the tree. Readers share it freely. An open
//! scope holds its single upgradeable slot, so readers keep running while
//! commands queue up; at flush the scope promotes to exclusive access, which
//! waits for readers to drain and holds back new ones.
//!
//! # Design Rules
//!
//! 1. A command is validated before it is queued; a stale target never
//!    reaches the queue.
//! 2. Queued commands are invisible to readers until the flush.
//! 3. A flush is all-or-nothing and runs exactly once per scope.
//! 4. Scopes do not nest: a second scope waits for the first to close.

pub mod command;
pub mod config;
pub mod error;
pub mod lock;
pub mod node;
pub mod scope;

pub use command::{InsertContent, MutationCommand, Placement};
pub use config::UpdateConfig;
pub use error::{UpdateError, UpdateResult};
pub use lock::{ExclusiveGuard, LockPhase, ReadGuard, UpgradeableGuard, UpgradeableLock};
pub use node::TreeNode;
pub use scope::{ReadView, ScopeState, UpdateScope, Updater};
