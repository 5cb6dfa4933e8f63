//! Object persistence for Nxdb.
//!
//! Maps in-memory objects onto element nodes of a tree document and back.
//! A type opts in by implementing [`Persistent`], which registers each
//! persistent member with an accessor pair, fetch/store/required flags and a
//! conversion strategy. Registrations are resolved once per type into an
//! immutable [`TypeCache`] held by a shared [`TypeCatalog`].
//!
//! # Protocol
//!
//! - **Fetch** computes every member's new value first and assigns them only
//!   when all conversions succeeded, so a failed fetch leaves the target's
//!   persistent members untouched.
//! - **Serialize** turns an object into a [`SerializedForm`] without touching
//!   storage.
//! - **Store** writes a serialized form into an element.
//!
//! Splitting Serialize from Store lets a caller compute the representation
//! of a whole batch of objects before any of them touch storage.
//!
//! # Identity
//!
//! An [`IdentityCache`] maps element identities to objects already
//! materialized during one operation (or one [`Session`]), so the same
//! element always yields the same [`Shared`] instance. The cache holds weak
//! references only; callers own the objects.
//!
//! ```rust
//! use std::sync::Arc;
//! use nxdb_persist::{Persistence, Persistent, Scalar, TypeDescription};
//! use nxdb_tree::{Element, InMemoryTree};
//!
//! #[derive(Default)]
//! struct Point { x: i32, y: i32 }
//!
//! impl Persistent for Point {
//!     fn describe(d: &mut TypeDescription<Self>) {
//!         d.field("x", |p| &p.x, |p| &mut p.x, Scalar::attribute("x"));
//!         d.field("y", |p| &p.y, |p| &mut p.y, Scalar::attribute("y"));
//!     }
//! }
//!
//! let tree = Arc::new(InMemoryTree::with_root("point"));
//! let root = tree.root_element().unwrap();
//! let element = Element::new(tree, root).unwrap();
//!
//! let persistence = Persistence::default();
//! let source = Point { x: 3, y: 4 };
//! let form = persistence.serialize(Some(&source)).unwrap();
//! persistence.store(&element, form.as_ref(), Some(&source)).unwrap();
//!
//! let mut loaded = Point::default();
//! persistence.fetch(&element, &mut loaded).unwrap();
//! assert_eq!((loaded.x, loaded.y), (3, 4));
//! ```

pub mod cache;
pub mod config;
pub mod conversion;
pub mod descriptor;
pub mod error;
pub mod persistence;
pub mod persister;

use std::sync::{Arc, RwLock};

pub use cache::{IdentityCache, TypeCache, TypeCatalog};
pub use config::PersistConfig;
pub use conversion::{
    Conversion, Custom, Json, Nested, Scalar, ScalarList, ScalarValue, Serialized, SerializedForm,
    SerializedValue,
};
pub use descriptor::{Accessor, AccessorKind, MemberDescriptor, MemberFlags, MemberOptions, TypeDescription};
pub use error::{PersistError, PersistResult};
pub use persistence::{Persistence, Session};
pub use persister::Persister;

/// A persistent object shared between an owner graph and identity caches.
pub type Shared<T> = Arc<RwLock<T>>;

/// Wrap a value as a [`Shared`] object.
pub fn shared<T>(value: T) -> Shared<T> {
    Arc::new(RwLock::new(value))
}

/// A type whose members can be fetched from and stored to elements.
///
/// `describe` is called once per type per [`TypeCatalog`] (or again after a
/// catalog reset); it must register members in a stable order.
pub trait Persistent: Sized + Send + Sync + 'static {
    fn describe(description: &mut TypeDescription<Self>);
}
