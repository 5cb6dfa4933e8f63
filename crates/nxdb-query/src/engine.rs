//! The query engine seam and lazy result sequences.

use std::fmt;

use nxdb_types::{FromItem, Item, Sequence};

use crate::context::ExecutionContext;
use crate::error::QueryResult;

/// A query engine: turns expression text into executable plans.
pub trait QueryEngine: Send + Sync {
    /// Engine name for diagnostics.
    fn name(&self) -> &str;

    /// Parse `expression` into an uncompiled plan.
    fn parse(&self, expression: &str) -> QueryResult<Box<dyn QueryPlan>>;
}

/// A parsed query.
pub trait QueryPlan: Send {
    /// Resolve the plan against the bindings it will run with.
    fn compile(&mut self, context: &ExecutionContext) -> QueryResult<()>;

    /// Start evaluating. Items are produced on demand.
    fn iter(self: Box<Self>, context: ExecutionContext) -> QueryResult<Results>;
}

/// A lazily produced, single-pass sequence of result items.
///
/// Each item is computed when it is pulled; an evaluation error surfaces as
/// an `Err` at the position where it occurred.
pub struct Results {
    inner: Box<dyn Iterator<Item = QueryResult<Item>> + Send>,
}

impl Results {
    pub fn new<I>(iter: I) -> Self
    where
        I: Iterator<Item = QueryResult<Item>> + Send + 'static,
    {
        Self {
            inner: Box::new(iter),
        }
    }

    pub fn empty() -> Self {
        Self::new(std::iter::empty())
    }

    /// Drain every item.
    pub fn into_sequence(self) -> QueryResult<Sequence> {
        self.collect()
    }

    /// Drain every item, keeping those whose runtime type is `T`, in order.
    pub fn of_type<T: FromItem>(self) -> QueryResult<Vec<T>> {
        let mut out = Vec::new();
        for item in self {
            if let Some(value) = T::from_item(&item?) {
                out.push(value);
            }
        }
        Ok(out)
    }
}

impl Iterator for Results {
    type Item = QueryResult<Item>;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }
}

impl fmt::Debug for Results {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Results")
    }
}
