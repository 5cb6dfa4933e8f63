//! Error types for query binding and evaluation.

use nxdb_types::TypeError;

/// Errors that can occur while binding, parsing or evaluating a query.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum QueryError {
    /// An argument contract was violated at the call that set it (empty
    /// expression, empty variable name, ...). Never deferred to evaluation.
    #[error("invalid binding: {0}")]
    InvalidBinding(String),

    /// The expression text could not be parsed.
    #[error("parse error at offset {offset}: {message}")]
    Parse { offset: usize, message: String },

    /// An operand had the wrong type or cardinality.
    #[error("type error: {0}")]
    Type(String),

    #[error("unknown variable ${0}")]
    UnknownVariable(String),

    #[error("unknown collection {0:?}")]
    UnknownCollection(String),

    /// Engine-specific failure.
    #[error("engine error: {0}")]
    Engine(String),
}

impl QueryError {
    pub(crate) fn parse(offset: usize, message: impl Into<String>) -> Self {
        Self::Parse {
            offset,
            message: message.into(),
        }
    }
}

impl From<TypeError> for QueryError {
    fn from(e: TypeError) -> Self {
        Self::Type(e.to_string())
    }
}

/// Result alias for query operations.
pub type QueryResult<T> = Result<T, QueryError>;
