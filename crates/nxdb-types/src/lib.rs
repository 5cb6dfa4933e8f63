//! Foundation types for Nxdb.
//!
//! This crate provides the identity and value types shared by every other
//! Nxdb crate: the tree engine, the persistence mapper, the update queue and
//! the query pipeline all speak in terms of these types.
//!
//! # Key Types
//!
//! - [`NodeId`]: Stable identity of a node in the tree document
//! - [`NodeKind`]: Structural kind of a node (element, text, comment, ...)
//! - [`Item`]: A single engine-native value produced or consumed by queries
//! - [`Sequence`]: An ordered list of items
//! - [`FromItem`]: Runtime type filter used to extract typed results

pub mod error;
pub mod item;
pub mod node;

pub use error::TypeError;
pub use item::{FromItem, Item, Sequence};
pub use node::{NodeId, NodeKind};
