//! The reference engine: a small expression language over items.
//!
//! Supported syntax: integer, decimal and string literals, `$variables`,
//! the context item `.`, comma-separated sequences, `()`, unary minus,
//! `+ - * div mod`, the general comparisons `= != < <= > >=`, and the
//! functions `true()`, `false()`, `count()`, `sum()`, `string()` and
//! `collection()`. `(: comments :)` are skipped.

mod eval;
mod lexer;
mod parser;

use std::collections::BTreeSet;

use nxdb_types::Item;
use tracing::{debug, trace};

use crate::config::QueryConfig;
use crate::context::ExecutionContext;
use crate::engine::{QueryEngine, QueryPlan, Results};
use crate::error::{QueryError, QueryResult};

use self::eval::eval;
use self::parser::{parse, Expr};

/// The built-in engine.
#[derive(Clone, Debug, Default)]
pub struct SimpleEngine {
    config: QueryConfig,
}

impl SimpleEngine {
    pub fn new(config: QueryConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &QueryConfig {
        &self.config
    }
}

impl QueryEngine for SimpleEngine {
    fn name(&self) -> &str {
        "simple"
    }

    fn parse(&self, expression: &str) -> QueryResult<Box<dyn QueryPlan>> {
        let expr = parse(expression)?;
        Ok(Box::new(SimplePlan {
            expr,
            optimize: self.config.optimize,
            compiled: false,
        }))
    }
}

/// A parsed expression awaiting compilation.
#[derive(Debug)]
pub struct SimplePlan {
    expr: Expr,
    optimize: bool,
    compiled: bool,
}

impl SimplePlan {
    /// Render the (possibly folded) expression.
    pub fn explain(&self) -> String {
        self.expr.to_string()
    }
}

impl QueryPlan for SimplePlan {
    fn compile(&mut self, context: &ExecutionContext) -> QueryResult<()> {
        let mut names = BTreeSet::new();
        collect_variables(&self.expr, &mut names);
        if let Some(missing) = names.into_iter().find(|name| context.variable(name).is_none()) {
            return Err(QueryError::UnknownVariable(missing));
        }

        if self.optimize {
            let mut folded = 0usize;
            let expr = std::mem::replace(&mut self.expr, Expr::Concat(Vec::new()));
            self.expr = fold(expr, &mut folded);
            debug!(folded, plan = %self.expr, "compiled plan");
        }
        self.compiled = true;
        Ok(())
    }

    fn iter(self: Box<Self>, context: ExecutionContext) -> QueryResult<Results> {
        if !self.compiled {
            return Err(QueryError::Engine("plan was not compiled".into()));
        }
        let branches = match self.expr {
            Expr::Concat(parts) => parts,
            other => vec![other],
        };
        Ok(Results::new(LazyResults {
            branches: branches.into_iter(),
            context,
            pending: Vec::new().into_iter(),
            failed: false,
        }))
    }
}

fn collect_variables(expr: &Expr, names: &mut BTreeSet<String>) {
    match expr {
        Expr::Variable(name) => {
            names.insert(name.clone());
        }
        Expr::Literal(_) | Expr::Context => {}
        Expr::Concat(parts) => parts.iter().for_each(|p| collect_variables(p, names)),
        Expr::Call { args, .. } => args.iter().for_each(|a| collect_variables(a, names)),
        Expr::Negate(inner) => collect_variables(inner, names),
        Expr::Arith { lhs, rhs, .. } | Expr::Compare { lhs, rhs, .. } => {
            collect_variables(lhs, names);
            collect_variables(rhs, names);
        }
    }
}

/// Replace every constant subtree with its value. A subtree that fails to
/// evaluate is kept so the error surfaces at its position when iterated.
fn fold(expr: Expr, folded: &mut usize) -> Expr {
    let expr = match expr {
        Expr::Concat(parts) => Expr::Concat(parts.into_iter().map(|p| fold(p, folded)).collect()),
        Expr::Negate(inner) => Expr::Negate(Box::new(fold(*inner, folded))),
        Expr::Arith { op, lhs, rhs } => Expr::Arith {
            op,
            lhs: Box::new(fold(*lhs, folded)),
            rhs: Box::new(fold(*rhs, folded)),
        },
        Expr::Compare { op, lhs, rhs } => Expr::Compare {
            op,
            lhs: Box::new(fold(*lhs, folded)),
            rhs: Box::new(fold(*rhs, folded)),
        },
        Expr::Call { function, args } => Expr::Call {
            function,
            args: args.into_iter().map(|a| fold(a, folded)).collect(),
        },
        leaf => return leaf,
    };

    let constant = match &expr {
        Expr::Concat(parts) => parts.iter().all(is_literal),
        Expr::Negate(inner) => is_literal(inner),
        Expr::Arith { lhs, rhs, .. } | Expr::Compare { lhs, rhs, .. } => is_literal(lhs) && is_literal(rhs),
        Expr::Call { function, args } => !function.reads_context(args.len()) && args.iter().all(is_literal),
        _ => false,
    };
    if !constant {
        return expr;
    }
    match eval(&expr, &ExecutionContext::new()) {
        Ok(value) => {
            *folded += 1;
            Expr::Literal(value)
        }
        Err(e) => {
            trace!(error = %e, "left unfolded");
            expr
        }
    }
}

fn is_literal(expr: &Expr) -> bool {
    matches!(expr, Expr::Literal(_))
}

/// Evaluates one top-level branch at a time, as items are pulled. Stops
/// after the first error.
struct LazyResults {
    branches: std::vec::IntoIter<Expr>,
    context: ExecutionContext,
    pending: std::vec::IntoIter<Item>,
    failed: bool,
}

impl Iterator for LazyResults {
    type Item = QueryResult<Item>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(item) = self.pending.next() {
                return Some(Ok(item));
            }
            if self.failed {
                return None;
            }
            let branch = self.branches.next()?;
            match eval(&branch, &self.context) {
                Ok(value) => self.pending = value.into_items().into_iter(),
                Err(e) => {
                    self.failed = true;
                    return Some(Err(e));
                }
            }
        }
    }
}
