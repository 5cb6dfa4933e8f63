//! Query binding pipeline for Nxdb.
//!
//! A [`Query`] holds an expression and the values bound to it: variables,
//! a default collection, named collections and an initial context item.
//! Bindings are staged on the query and only reach an engine when the query
//! is evaluated, which builds a fresh [`ExecutionContext`], has the engine
//! parse and compile a [`QueryPlan`], and returns lazy [`Results`].
//!
//! Engines plug in through [`QueryEngine`]. [`SimpleEngine`] is the
//! built-in reference engine.
//!
//! # Design Rules
//!
//! 1. Argument contracts (empty expression, empty variable name, a
//!    multi-item context) fail at the call that sets them.
//! 2. Binding an absent value removes the binding.
//! 3. Every evaluation sees the bindings current at the time it starts.
//! 4. Results are produced on demand; an evaluation error is reported at the
//!    position where it occurs.

pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod query;
mod simple;

pub use config::QueryConfig;
pub use context::ExecutionContext;
pub use engine::{QueryEngine, QueryPlan, Results};
pub use error::{QueryError, QueryResult};
pub use query::{IntoBinding, Query};
pub use simple::{SimpleEngine, SimplePlan};
