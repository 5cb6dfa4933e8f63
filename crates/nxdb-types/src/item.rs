use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;
use crate::node::NodeId;

/// A single engine-native value.
///
/// Items are what the query engine consumes as bindings and produces as
/// results. Node items carry only the node identity; resolving the node is
/// the tree engine's job.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Item {
    Integer(i64),
    Double(f64),
    Boolean(bool),
    String(String),
    Node(NodeId),
}

impl Item {
    /// Short name of the item's runtime type, used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Integer(_) => "integer",
            Self::Double(_) => "double",
            Self::Boolean(_) => "boolean",
            Self::String(_) => "string",
            Self::Node(_) => "node",
        }
    }

    /// Whether the item is an integer or a double.
    pub fn is_numeric(&self) -> bool {
        matches!(self, Self::Integer(_) | Self::Double(_))
    }

    /// Numeric value as `f64`, if the item is numeric.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Integer(i) => Some(*i as f64),
            Self::Double(d) => Some(*d),
            _ => None,
        }
    }

    /// The string value of the item.
    pub fn string_value(&self) -> String {
        match self {
            Self::Integer(i) => i.to_string(),
            Self::Double(d) => d.to_string(),
            Self::Boolean(b) => b.to_string(),
            Self::String(s) => s.clone(),
            Self::Node(id) => id.to_string(),
        }
    }

    /// Infer an item from untyped text.
    ///
    /// Integers, decimals, `true`/`false` and `#<id>` node references are
    /// recognized; anything else becomes a string item. Quoted text
    /// (`'...'` or `"..."`) is always a string with the quotes removed.
    pub fn infer(text: &str) -> Result<Self, TypeError> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(TypeError::InvalidLiteral(text.to_string()));
        }
        for quote in ['\'', '"'] {
            if trimmed.len() >= 2 && trimmed.starts_with(quote) && trimmed.ends_with(quote) {
                return Ok(Self::String(trimmed[1..trimmed.len() - 1].to_string()));
            }
        }
        if let Ok(i) = trimmed.parse::<i64>() {
            return Ok(Self::Integer(i));
        }
        if let Ok(d) = trimmed.parse::<f64>() {
            return Ok(Self::Double(d));
        }
        match trimmed {
            "true" => return Ok(Self::Boolean(true)),
            "false" => return Ok(Self::Boolean(false)),
            _ => {}
        }
        if trimmed.starts_with('#') {
            if let Ok(id) = trimmed.parse::<NodeId>() {
                return Ok(Self::Node(id));
            }
        }
        Ok(Self::String(trimmed.to_string()))
    }
}

impl fmt::Display for Item {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(s) => write!(f, "\"{s}\""),
            other => f.write_str(&other.string_value()),
        }
    }
}

impl From<i64> for Item {
    fn from(v: i64) -> Self {
        Self::Integer(v)
    }
}

impl From<i32> for Item {
    fn from(v: i32) -> Self {
        Self::Integer(i64::from(v))
    }
}

impl From<u32> for Item {
    fn from(v: u32) -> Self {
        Self::Integer(i64::from(v))
    }
}

impl From<f64> for Item {
    fn from(v: f64) -> Self {
        Self::Double(v)
    }
}

impl From<bool> for Item {
    fn from(v: bool) -> Self {
        Self::Boolean(v)
    }
}

impl From<&str> for Item {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<String> for Item {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<NodeId> for Item {
    fn from(v: NodeId) -> Self {
        Self::Node(v)
    }
}

// ---------------------------------------------------------------------------
// Sequence
// ---------------------------------------------------------------------------

/// An ordered sequence of items.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Sequence(Vec<Item>);

impl Sequence {
    /// The empty sequence.
    pub fn empty() -> Self {
        Self(Vec::new())
    }

    /// Create a sequence from items.
    pub fn new(items: Vec<Item>) -> Self {
        Self(items)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Item> {
        self.0.iter()
    }

    pub fn items(&self) -> &[Item] {
        &self.0
    }

    pub fn into_items(self) -> Vec<Item> {
        self.0
    }

    /// Append all items of `other` to this sequence.
    pub fn extend(&mut self, other: Sequence) {
        self.0.extend(other.0);
    }

    /// The single item of a one-item sequence.
    pub fn single(&self) -> Option<&Item> {
        match self.0.as_slice() {
            [item] => Some(item),
            _ => None,
        }
    }
}

impl From<Item> for Sequence {
    fn from(item: Item) -> Self {
        Self(vec![item])
    }
}

impl<T: Into<Item>> From<Vec<T>> for Sequence {
    fn from(items: Vec<T>) -> Self {
        Self(items.into_iter().map(Into::into).collect())
    }
}

impl FromIterator<Item> for Sequence {
    fn from_iter<I: IntoIterator<Item = Item>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for Sequence {
    type Item = Item;
    type IntoIter = std::vec::IntoIter<Item>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a Sequence {
    type Item = &'a Item;
    type IntoIter = std::slice::Iter<'a, Item>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

// ---------------------------------------------------------------------------
// FromItem
// ---------------------------------------------------------------------------

/// Extraction of a typed value from an item by runtime type.
///
/// Extraction never converts between kinds: an integer item does not match
/// `f64` and a string item does not match `i64`. This is the filter used to
/// keep only results of a given type.
pub trait FromItem: Sized {
    fn from_item(item: &Item) -> Option<Self>;
}

impl FromItem for Item {
    fn from_item(item: &Item) -> Option<Self> {
        Some(item.clone())
    }
}

impl FromItem for i64 {
    fn from_item(item: &Item) -> Option<Self> {
        match item {
            Item::Integer(i) => Some(*i),
            _ => None,
        }
    }
}

impl FromItem for i32 {
    fn from_item(item: &Item) -> Option<Self> {
        match item {
            Item::Integer(i) => i32::try_from(*i).ok(),
            _ => None,
        }
    }
}

impl FromItem for f64 {
    fn from_item(item: &Item) -> Option<Self> {
        match item {
            Item::Double(d) => Some(*d),
            _ => None,
        }
    }
}

impl FromItem for bool {
    fn from_item(item: &Item) -> Option<Self> {
        match item {
            Item::Boolean(b) => Some(*b),
            _ => None,
        }
    }
}

impl FromItem for String {
    fn from_item(item: &Item) -> Option<Self> {
        match item {
            Item::String(s) => Some(s.clone()),
            _ => None,
        }
    }
}

impl FromItem for NodeId {
    fn from_item(item: &Item) -> Option<Self> {
        match item {
            Item::Node(id) => Some(*id),
            _ => None,
        }
    }
}
