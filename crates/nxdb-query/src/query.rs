use std::collections::BTreeMap;

use nxdb_types::{FromItem, Item, NodeId, Sequence};
use tracing::debug;

use crate::context::ExecutionContext;
use crate::engine::{QueryEngine, Results};
use crate::error::{QueryError, QueryResult};

/// A value that can be bound to a variable, collection or context.
///
/// `None` is the absent value: binding it removes the binding. The empty
/// sequence is a value like any other.
pub trait IntoBinding {
    fn into_binding(self) -> Option<Sequence>;
}

impl IntoBinding for Sequence {
    fn into_binding(self) -> Option<Sequence> {
        Some(self)
    }
}

impl IntoBinding for Item {
    fn into_binding(self) -> Option<Sequence> {
        Some(Sequence::from(self))
    }
}

impl<T: IntoBinding> IntoBinding for Option<T> {
    fn into_binding(self) -> Option<Sequence> {
        self.and_then(IntoBinding::into_binding)
    }
}

impl<T: Into<Item>> IntoBinding for Vec<T> {
    fn into_binding(self) -> Option<Sequence> {
        Sequence::from(self).into_binding()
    }
}

macro_rules! bind_via_item {
    ($($t:ty),* $(,)?) => {
        $(
            impl IntoBinding for $t {
                fn into_binding(self) -> Option<Sequence> {
                    Item::from(self).into_binding()
                }
            }
        )*
    };
}

bind_via_item!(i64, i32, u32, f64, bool, &str, String, NodeId);

/// A query expression plus everything bound to it.
///
/// Bindings are staged here and only handed to an engine when the query is
/// evaluated; each evaluation builds a fresh [`ExecutionContext`].
///
/// ```rust
/// use nxdb_query::{Query, SimpleEngine};
///
/// let engine = SimpleEngine::default();
/// let mut query = Query::new("$x + 1").unwrap();
/// query.set_variable("x", 5).unwrap();
/// assert_eq!(query.get_list_of::<i64>(&engine).unwrap(), vec![6]);
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct Query {
    expression: String,
    variables: BTreeMap<String, Sequence>,
    collections: BTreeMap<String, Sequence>,
    default_collection: Option<Sequence>,
    initial_context: Option<Sequence>,
}

impl Query {
    pub fn new(expression: impl Into<String>) -> QueryResult<Self> {
        let expression = validate_expression(expression.into())?;
        Ok(Self {
            expression,
            variables: BTreeMap::new(),
            collections: BTreeMap::new(),
            default_collection: None,
            initial_context: None,
        })
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// Replace the expression text. Empty text is rejected and leaves the
    /// previous expression in place.
    pub fn set_expression(&mut self, expression: impl Into<String>) -> QueryResult<()> {
        self.expression = validate_expression(expression.into())?;
        Ok(())
    }

    /// Bind `$name`, or remove the binding when `value` is absent.
    pub fn set_variable(&mut self, name: &str, value: impl IntoBinding) -> QueryResult<()> {
        if name.is_empty() {
            return Err(QueryError::InvalidBinding("variable name is empty".into()));
        }
        match value.into_binding() {
            Some(sequence) => {
                self.variables.insert(name.to_string(), sequence);
            }
            None => {
                self.variables.remove(name);
            }
        }
        Ok(())
    }

    pub fn variable(&self, name: &str) -> Option<&Sequence> {
        self.variables.get(name)
    }

    /// Bind a named collection, or the default collection when `name` is
    /// empty. An absent value removes a named collection and clears the
    /// default one.
    pub fn set_collection(&mut self, name: &str, value: impl IntoBinding) {
        let value = value.into_binding();
        if name.is_empty() {
            self.default_collection = value;
            return;
        }
        match value {
            Some(sequence) => {
                self.collections.insert(name.to_string(), sequence);
            }
            None => {
                self.collections.remove(name);
            }
        }
    }

    pub fn set_default_collection(&mut self, value: impl IntoBinding) {
        self.set_collection("", value);
    }

    pub fn collection(&self, name: &str) -> Option<&Sequence> {
        if name.is_empty() {
            self.default_collection.as_ref()
        } else {
            self.collections.get(name)
        }
    }

    /// Set the initial context, or clear it when `value` is absent. A
    /// sequence of any length is accepted.
    pub fn set_initial_context(&mut self, value: impl IntoBinding) {
        self.initial_context = value.into_binding();
    }

    pub fn initial_context(&self) -> Option<&Sequence> {
        self.initial_context.as_ref()
    }

    /// A fresh execution context carrying every binding.
    pub fn context(&self) -> ExecutionContext {
        let mut context = ExecutionContext::new();
        for (name, value) in &self.variables {
            context.bind_variable(name, value.clone());
        }
        context.bind_default_collection(self.default_collection.clone().unwrap_or_default());
        for (name, value) in &self.collections {
            context.bind_collection(name, value.clone());
        }
        context.set_initial_context(self.initial_context.clone());
        context
    }

    /// Parse, compile and start evaluating against `engine`.
    pub fn evaluate(&self, engine: &dyn QueryEngine) -> QueryResult<Results> {
        let context = self.context();
        debug!(
            engine = engine.name(),
            expression = %self.expression,
            variables = self.variables.len(),
            collections = self.collections.len(),
            "evaluating query"
        );
        let mut plan = engine.parse(&self.expression)?;
        plan.compile(&context)?;
        plan.iter(context)
    }

    /// Evaluate and drain every result.
    pub fn get_list(&self, engine: &dyn QueryEngine) -> QueryResult<Sequence> {
        self.evaluate(engine)?.into_sequence()
    }

    /// Evaluate and keep the results whose runtime type is `T`.
    pub fn get_list_of<T: FromItem>(&self, engine: &dyn QueryEngine) -> QueryResult<Vec<T>> {
        self.evaluate(engine)?.of_type()
    }
}

fn validate_expression(expression: String) -> QueryResult<String> {
    if expression.trim().is_empty() {
        return Err(QueryError::InvalidBinding("expression is empty".into()));
    }
    Ok(expression)
}
