//! Conversion strategies between member values and element content.
//!
//! A [`Conversion`] runs in three places of the protocol: `fetch` computes a
//! candidate value from an element (without touching the owner), `serialize`
//! turns a value into an intermediate [`Serialized`] form, and `store` writes
//! that form into an element.
//!
//! # Strategies
//!
//! - [`Scalar`] -- a single text-convertible value in an attribute, a child
//!   element, or the element's own text
//! - [`Nested`] -- a persistent child object in a child element
//! - [`ScalarList`] -- a list of scalars as repeated child elements
//! - [`Custom`] -- caller-supplied closures
//! - [`Json`] -- any serde value as JSON text

mod collection;
mod custom;
mod nested;
mod scalar;

pub use collection::ScalarList;
pub use custom::{Custom, Json};
pub use nested::Nested;
pub use scalar::{Scalar, ScalarValue};

use nxdb_tree::Element;

use crate::cache::IdentityCache;
use crate::error::PersistResult;

/// Conversion between a member value of type `V` and element content.
pub trait Conversion<V>: Send + Sync + 'static {
    /// Compute a candidate value from `element`.
    ///
    /// `current` is the member's value before the fetch; it must not be
    /// modified. `Ok(None)` means the element holds no value for the member.
    fn fetch(&self, element: &Element, current: &V, cache: &mut IdentityCache) -> PersistResult<Option<V>>;

    /// The value a member takes when `fetch` finds nothing for it. `None`
    /// keeps the member's current value.
    fn cleared(&self) -> Option<V> {
        None
    }

    /// Produce the intermediate form of `value`. Must not touch storage.
    fn serialize(&self, value: &V, cache: &mut IdentityCache) -> PersistResult<Serialized>;

    /// Write a serialized value into `element`.
    fn store(
        &self,
        element: &Element,
        serialized: &Serialized,
        value: &V,
        cache: &mut IdentityCache,
    ) -> PersistResult<()>;
}

/// Intermediate representation of one member value.
#[derive(Clone, Debug, PartialEq)]
pub enum Serialized {
    /// No value; storing it removes whatever the element held.
    Absent,
    Text(String),
    List(Vec<String>),
    Object(SerializedForm),
}

/// Serialized form of a whole object: one value per stored member.
#[derive(Clone, Debug, PartialEq)]
pub struct SerializedForm {
    pub type_name: &'static str,
    pub values: Vec<SerializedValue>,
}

impl SerializedForm {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// The serialized value of the named member.
    pub fn get(&self, member: &str) -> Option<&Serialized> {
        self.values
            .iter()
            .find(|v| v.member == member)
            .map(|v| &v.value)
    }
}

/// One member's serialized value, with the member's position in its type
/// cache.
#[derive(Clone, Debug, PartialEq)]
pub struct SerializedValue {
    pub member: String,
    pub index: usize,
    pub value: Serialized,
}
