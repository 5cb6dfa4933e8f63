//! Tree-document engine interface for Nxdb.
//!
//! The tree engine owns the document: it hands out node identities, answers
//! structural questions, and applies batches of raw structural edits. Every
//! higher layer (persistence, update queue, queries) talks to it only through
//! the [`TreeEngine`] trait.
//!
//! # Backends
//!
//! - [`InMemoryTree`] -- arena-backed document for tests and embedding
//!
//! # Design Rules
//!
//! 1. Node identities are never reused while the engine is alive.
//! 2. A batch of edits is applied all-or-nothing: either every edit in the
//!    batch becomes visible or none does.
//! 3. Edits in a batch are applied in order; later edits observe earlier ones.
//! 4. Reads never observe a half-applied batch.

pub mod content;
pub mod element;
pub mod error;
pub mod memory;
pub mod traits;

pub use content::{Content, Edit, Position};
pub use element::Element;
pub use error::{TreeError, TreeResult};
pub use memory::InMemoryTree;
pub use traits::TreeEngine;
