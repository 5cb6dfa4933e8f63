//! Nxdb: object persistence, deferred updates and query binding over a
//! tree-document engine.
//!
//! [`Database`] is the entry point. It ties together the layers, each of
//! which is usable on its own:
//!
//! - [`nxdb_persist`] maps objects to elements and back
//! - [`nxdb_update`] queues structural edits and flushes them as one batch
//! - [`nxdb_query`] binds variables and collections to query expressions
//!
//! ```rust
//! use nxdb::{Database, NxdbConfig};
//!
//! let db = Database::in_memory("root", NxdbConfig::default());
//! let mut query = db.query(".").unwrap();
//! query.set_default_collection(vec![1, 2, 3]);
//! assert_eq!(db.get_list_of::<i64>(&query).unwrap(), vec![1, 2, 3]);
//! ```

pub mod config;
pub mod database;
pub mod error;

pub use config::NxdbConfig;
pub use database::Database;
pub use error::{ConfigError, ConfigResult, DatabaseError, DatabaseResult};

pub use nxdb_persist;
pub use nxdb_query;
pub use nxdb_tree;
pub use nxdb_types;
pub use nxdb_update;

pub use nxdb_persist::{Persistence, Persistent, Session, Shared, TypeDescription};
pub use nxdb_query::{Query, QueryEngine, Results};
pub use nxdb_tree::{Element, InMemoryTree, TreeEngine};
pub use nxdb_types::{Item, NodeId, Sequence};
pub use nxdb_update::{TreeNode, UpdateScope};
