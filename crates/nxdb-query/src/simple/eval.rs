use std::cmp::Ordering;

use nxdb_types::{Item, Sequence};

use crate::context::ExecutionContext;
use crate::error::{QueryError, QueryResult};
use crate::simple::parser::{ArithOp, CompareOp, Expr, Function};

/// Evaluate `expr` eagerly against `context`.
pub(crate) fn eval(expr: &Expr, context: &ExecutionContext) -> QueryResult<Sequence> {
    match expr {
        Expr::Literal(seq) => Ok(seq.clone()),
        Expr::Variable(name) => context
            .variable(name)
            .cloned()
            .ok_or_else(|| QueryError::UnknownVariable(name.clone())),
        Expr::Context => Ok(context.context_value()),
        Expr::Concat(parts) => {
            let mut out = Sequence::empty();
            for part in parts {
                out.extend(eval(part, context)?);
            }
            Ok(out)
        }
        Expr::Negate(inner) => {
            let value = eval(inner, context)?;
            match optional_single(&value, "unary minus")? {
                None => Ok(Sequence::empty()),
                Some(item) => negate(item).map(Sequence::from),
            }
        }
        Expr::Arith { op, lhs, rhs } => {
            let lhs = eval(lhs, context)?;
            let rhs = eval(rhs, context)?;
            let what = op.to_string();
            match (optional_single(&lhs, &what)?, optional_single(&rhs, &what)?) {
                (Some(a), Some(b)) => arith(*op, a, b).map(Sequence::from),
                _ => Ok(Sequence::empty()),
            }
        }
        Expr::Compare { op, lhs, rhs } => {
            let lhs = eval(lhs, context)?;
            let rhs = eval(rhs, context)?;
            general_compare(*op, &lhs, &rhs).map(|b| Sequence::from(Item::Boolean(b)))
        }
        Expr::Call { function, args } => call(*function, args, context),
    }
}

fn optional_single<'a>(seq: &'a Sequence, what: &str) -> QueryResult<Option<&'a Item>> {
    match seq.len() {
        0 => Ok(None),
        1 => Ok(seq.single()),
        n => Err(QueryError::Type(format!("{what} expects at most one item, got {n}"))),
    }
}

fn numeric<'a>(item: &'a Item, what: &str) -> QueryResult<&'a Item> {
    if item.is_numeric() {
        Ok(item)
    } else {
        Err(QueryError::Type(format!("{what} expects a number, got {}", item.type_name())))
    }
}

fn overflow(what: &str) -> QueryError {
    QueryError::Type(format!("integer overflow in {what}"))
}

fn negate(item: &Item) -> QueryResult<Item> {
    match numeric(item, "unary minus")? {
        Item::Integer(i) => i.checked_neg().map(Item::Integer).ok_or_else(|| overflow("unary minus")),
        other => Ok(Item::Double(-other.as_f64().unwrap_or(f64::NAN))),
    }
}

fn arith(op: ArithOp, a: &Item, b: &Item) -> QueryResult<Item> {
    let what = op.to_string();
    let a = numeric(a, &what)?;
    let b = numeric(b, &what)?;

    if let (Item::Integer(x), Item::Integer(y)) = (a, b) {
        let (x, y) = (*x, *y);
        return match op {
            ArithOp::Add => x.checked_add(y).map(Item::Integer).ok_or_else(|| overflow(&what)),
            ArithOp::Sub => x.checked_sub(y).map(Item::Integer).ok_or_else(|| overflow(&what)),
            ArithOp::Mul => x.checked_mul(y).map(Item::Integer).ok_or_else(|| overflow(&what)),
            ArithOp::Div if y == 0 => Err(QueryError::Type("integer division by zero".into())),
            ArithOp::Div => match x.checked_rem(y) {
                Some(0) => x.checked_div(y).map(Item::Integer).ok_or_else(|| overflow(&what)),
                _ => Ok(Item::Double(x as f64 / y as f64)),
            },
            ArithOp::Mod if y == 0 => Err(QueryError::Type("integer modulo by zero".into())),
            ArithOp::Mod => x.checked_rem(y).map(Item::Integer).ok_or_else(|| overflow(&what)),
        };
    }

    let x = a.as_f64().unwrap_or(f64::NAN);
    let y = b.as_f64().unwrap_or(f64::NAN);
    Ok(Item::Double(match op {
        ArithOp::Add => x + y,
        ArithOp::Sub => x - y,
        ArithOp::Mul => x * y,
        ArithOp::Div => x / y,
        ArithOp::Mod => x % y,
    }))
}

/// Existential comparison: true when any pair of items satisfies `op`.
fn general_compare(op: CompareOp, lhs: &Sequence, rhs: &Sequence) -> QueryResult<bool> {
    for a in lhs.iter() {
        for b in rhs.iter() {
            if compare_items(op, a, b)? {
                return Ok(true);
            }
        }
    }
    Ok(false)
}

fn compare_items(op: CompareOp, a: &Item, b: &Item) -> QueryResult<bool> {
    let ordering = match (a, b) {
        (Item::Integer(x), Item::Integer(y)) => Some(x.cmp(y)),
        (x, y) if x.is_numeric() && y.is_numeric() => {
            x.as_f64().zip(y.as_f64()).and_then(|(x, y)| x.partial_cmp(&y))
        }
        (Item::String(x), Item::String(y)) => Some(x.cmp(y)),
        (Item::Boolean(x), Item::Boolean(y)) => Some(x.cmp(y)),
        (Item::Node(x), Item::Node(y)) => {
            return match op {
                CompareOp::Eq => Ok(x == y),
                CompareOp::Ne => Ok(x != y),
                _ => Err(QueryError::Type(format!("nodes cannot be compared with {op}"))),
            };
        }
        _ => {
            return Err(QueryError::Type(format!(
                "cannot compare {} with {}",
                a.type_name(),
                b.type_name()
            )))
        }
    };
    // Unordered (NaN) only satisfies `!=`.
    let Some(ordering) = ordering else {
        return Ok(op == CompareOp::Ne);
    };
    Ok(match op {
        CompareOp::Eq => ordering == Ordering::Equal,
        CompareOp::Ne => ordering != Ordering::Equal,
        CompareOp::Lt => ordering == Ordering::Less,
        CompareOp::Le => ordering != Ordering::Greater,
        CompareOp::Gt => ordering == Ordering::Greater,
        CompareOp::Ge => ordering != Ordering::Less,
    })
}

fn call(function: Function, args: &[Expr], context: &ExecutionContext) -> QueryResult<Sequence> {
    match function {
        Function::True => Ok(Sequence::from(Item::Boolean(true))),
        Function::False => Ok(Sequence::from(Item::Boolean(false))),
        Function::Count => {
            let arg = eval(&args[0], context)?;
            Ok(Sequence::from(Item::Integer(arg.len() as i64)))
        }
        Function::Sum => sum(&eval(&args[0], context)?).map(Sequence::from),
        Function::String => {
            let value = match args.first() {
                Some(arg) => eval(arg, context)?,
                None => context.context_value(),
            };
            let text = optional_single(&value, "string()")?.map(Item::string_value).unwrap_or_default();
            Ok(Sequence::from(Item::String(text)))
        }
        Function::Collection => match args.first() {
            None => Ok(context.default_collection().clone()),
            Some(arg) => {
                let name = eval(arg, context)?;
                match optional_single(&name, "collection()")? {
                    None => Ok(context.default_collection().clone()),
                    Some(Item::String(name)) => context
                        .collection(name)
                        .cloned()
                        .ok_or_else(|| QueryError::UnknownCollection(name.clone())),
                    Some(other) => Err(QueryError::Type(format!(
                        "collection() expects a string name, got {}",
                        other.type_name()
                    ))),
                }
            }
        },
    }
}

fn sum(values: &Sequence) -> QueryResult<Item> {
    let mut int_total: i64 = 0;
    let mut float_total: Option<f64> = None;
    for item in values.iter() {
        match numeric(item, "sum()")? {
            Item::Integer(i) => match float_total.as_mut() {
                Some(total) => *total += *i as f64,
                None => int_total = int_total.checked_add(*i).ok_or_else(|| overflow("sum()"))?,
            },
            other => {
                let d = other.as_f64().unwrap_or(f64::NAN);
                let total = float_total.get_or_insert(int_total as f64);
                *total += d;
            }
        }
    }
    Ok(match float_total {
        Some(total) => Item::Double(total),
        None => Item::Integer(int_total),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simple::parser::parse;
    use nxdb_types::NodeId;

    fn run(input: &str) -> QueryResult<Sequence> {
        eval(&parse(input)?, &ExecutionContext::new())
    }

    fn one(input: &str) -> Item {
        let seq = run(input).unwrap();
        seq.single().cloned().unwrap_or_else(|| panic!("{input} gave {seq:?}"))
    }

    // ---- arithmetic ----

    #[test]
    fn integer_arithmetic_stays_integer() {
        assert_eq!(one("1 + 2 * 3"), Item::Integer(7));
        assert_eq!(one("7 mod 3"), Item::Integer(1));
        assert_eq!(one("-7 mod 3"), Item::Integer(-1));
        assert_eq!(one("6 div 3"), Item::Integer(2));
    }

    #[test]
    fn inexact_division_is_double() {
        assert_eq!(one("7 div 2"), Item::Double(3.5));
        assert_eq!(one("1 + 0.5"), Item::Double(1.5));
    }

    #[test]
    fn integer_division_by_zero_is_type_error() {
        assert!(matches!(run("1 div 0").unwrap_err(), QueryError::Type(_)));
        assert!(matches!(run("1 mod 0").unwrap_err(), QueryError::Type(_)));
        assert_eq!(one("1.0 div 0"), Item::Double(f64::INFINITY));
    }

    #[test]
    fn overflow_is_type_error() {
        assert!(matches!(run("9223372036854775807 + 1").unwrap_err(), QueryError::Type(_)));
    }

    #[test]
    fn empty_operand_gives_empty_result() {
        assert_eq!(run("() + 1").unwrap(), Sequence::empty());
        assert_eq!(run("-()").unwrap(), Sequence::empty());
    }

    #[test]
    fn multi_item_or_non_numeric_operand_rejected() {
        assert!(matches!(run("(1, 2) + 1").unwrap_err(), QueryError::Type(_)));
        assert!(matches!(run("'a' + 1").unwrap_err(), QueryError::Type(_)));
    }

    // ---- comparison ----

    #[test]
    fn general_comparison_is_existential() {
        assert_eq!(one("(1, 2, 3) = 2"), Item::Boolean(true));
        assert_eq!(one("(1, 2, 3) > 5"), Item::Boolean(false));
        assert_eq!(one("() = ()"), Item::Boolean(false));
        assert_eq!(one("1 = 1.0"), Item::Boolean(true));
        assert_eq!(one("'a' < 'b'"), Item::Boolean(true));
        assert_eq!(one("true() != false()"), Item::Boolean(true));
    }

    #[test]
    fn mixed_kinds_cannot_compare() {
        assert!(matches!(run("1 = 'a'").unwrap_err(), QueryError::Type(_)));
    }

    #[test]
    fn nodes_compare_by_identity_only() {
        let mut ctx = ExecutionContext::new();
        ctx.bind_variable("a", Sequence::from(Item::Node(NodeId::from_raw(3))));
        ctx.bind_variable("b", Sequence::from(Item::Node(NodeId::from_raw(3))));
        let eq = eval(&parse("$a = $b").unwrap(), &ctx).unwrap();
        assert_eq!(eq, Sequence::from(Item::Boolean(true)));
        assert!(eval(&parse("$a < $b").unwrap(), &ctx).is_err());
    }

    // ---- functions ----

    #[test]
    fn count_and_sum() {
        assert_eq!(one("count((1, 'a', 3))"), Item::Integer(3));
        assert_eq!(one("sum(())"), Item::Integer(0));
        assert_eq!(one("sum((1, 2, 3))"), Item::Integer(6));
        assert_eq!(one("sum((1, 2.5))"), Item::Double(3.5));
        assert!(run("sum(('a'))").is_err());
    }

    #[test]
    fn string_function() {
        assert_eq!(one("string(42)"), Item::String("42".into()));
        assert_eq!(one("string(())"), Item::String(String::new()));

        let mut ctx = ExecutionContext::new();
        ctx.set_initial_context(Some(Sequence::from(Item::Boolean(true))));
        let out = eval(&parse("string()").unwrap(), &ctx).unwrap();
        assert_eq!(out, Sequence::from(Item::String("true".into())));
    }

    #[test]
    fn collections() {
        let mut ctx = ExecutionContext::new();
        ctx.bind_default_collection(Sequence::from(vec![1, 2]));
        ctx.bind_collection("c", Sequence::from(vec!["x"]));

        assert_eq!(eval(&parse("collection()").unwrap(), &ctx).unwrap().len(), 2);
        assert_eq!(
            eval(&parse("collection('c')").unwrap(), &ctx).unwrap(),
            Sequence::from(vec!["x"])
        );
        assert_eq!(
            eval(&parse("collection('missing')").unwrap(), &ctx).unwrap_err(),
            QueryError::UnknownCollection("missing".into())
        );
        assert!(matches!(eval(&parse("collection(1)").unwrap(), &ctx).unwrap_err(), QueryError::Type(_)));
    }

    #[test]
    fn unknown_variable() {
        assert_eq!(run("$nope").unwrap_err(), QueryError::UnknownVariable("nope".into()));
    }
}
