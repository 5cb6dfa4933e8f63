use std::fmt;

use nxdb_types::{Item, Sequence};

use crate::error::{QueryError, QueryResult};
use crate::simple::lexer::{tokenize, Spanned, Token};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

impl fmt::Display for ArithOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "div",
            Self::Mod => "mod",
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Eq => "=",
            Self::Ne => "!=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Function {
    True,
    False,
    Collection,
    Count,
    Sum,
    String,
}

impl Function {
    fn lookup(name: &str) -> Option<Self> {
        Some(match name {
            "true" => Self::True,
            "false" => Self::False,
            "collection" => Self::Collection,
            "count" => Self::Count,
            "sum" => Self::Sum,
            "string" => Self::String,
            _ => return None,
        })
    }

    fn arity(&self) -> (usize, usize) {
        match self {
            Self::True | Self::False => (0, 0),
            Self::Collection | Self::String => (0, 1),
            Self::Count | Self::Sum => (1, 1),
        }
    }

    pub(crate) fn name(&self) -> &'static str {
        match self {
            Self::True => "true",
            Self::False => "false",
            Self::Collection => "collection",
            Self::Count => "count",
            Self::Sum => "sum",
            Self::String => "string",
        }
    }

    /// Whether the result depends on anything other than the arguments.
    pub(crate) fn reads_context(&self, argc: usize) -> bool {
        match self {
            Self::Collection => true,
            Self::String => argc == 0,
            _ => false,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Expr {
    Literal(Sequence),
    Variable(String),
    Context,
    Concat(Vec<Expr>),
    Negate(Box<Expr>),
    Arith {
        op: ArithOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Compare {
        op: CompareOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Call {
        function: Function,
        args: Vec<Expr>,
    },
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(seq) => match seq.single() {
                Some(item) => write!(f, "{item}"),
                None => {
                    f.write_str("(")?;
                    for (i, item) in seq.iter().enumerate() {
                        if i > 0 {
                            f.write_str(", ")?;
                        }
                        write!(f, "{item}")?;
                    }
                    f.write_str(")")
                }
            },
            Self::Variable(name) => write!(f, "${name}"),
            Self::Context => f.write_str("."),
            Self::Concat(parts) => {
                f.write_str("(")?;
                for (i, part) in parts.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{part}")?;
                }
                f.write_str(")")
            }
            Self::Negate(inner) => write!(f, "-{inner}"),
            Self::Arith { op, lhs, rhs } => write!(f, "({lhs} {op} {rhs})"),
            Self::Compare { op, lhs, rhs } => write!(f, "({lhs} {op} {rhs})"),
            Self::Call { function, args } => {
                write!(f, "{}(", function.name())?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{arg}")?;
                }
                f.write_str(")")
            }
        }
    }
}

/// Parse an expression into its syntax tree.
pub(crate) fn parse(input: &str) -> QueryResult<Expr> {
    let mut parser = Parser {
        tokens: tokenize(input)?,
        pos: 0,
        end: input.len(),
    };
    let expr = parser.expr()?;
    if let Some(extra) = parser.peek_spanned() {
        return Err(QueryError::parse(
            extra.offset,
            format!("unexpected {:?} after expression", extra.token),
        ));
    }
    Ok(expr)
}

struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
    end: usize,
}

impl Parser {
    fn peek_spanned(&self) -> Option<&Spanned> {
        self.tokens.get(self.pos)
    }

    fn peek(&self) -> Option<&Token> {
        self.peek_spanned().map(|s| &s.token)
    }

    fn offset(&self) -> usize {
        self.peek_spanned().map_or(self.end, |s| s.offset)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).map(|s| s.token.clone());
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.peek() == Some(token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: &Token, what: &str) -> QueryResult<()> {
        if self.eat(token) {
            Ok(())
        } else {
            Err(QueryError::parse(self.offset(), format!("expected {what}")))
        }
    }

    fn is_name(&self, name: &str) -> bool {
        matches!(self.peek(), Some(Token::Name(n)) if n == name)
    }

    // expr := comparison (',' comparison)*
    fn expr(&mut self) -> QueryResult<Expr> {
        let first = self.comparison()?;
        if self.peek() != Some(&Token::Comma) {
            return Ok(first);
        }
        let mut parts = vec![first];
        while self.eat(&Token::Comma) {
            parts.push(self.comparison()?);
        }
        Ok(Expr::Concat(parts))
    }

    // comparison := additive (cmp additive)?
    fn comparison(&mut self) -> QueryResult<Expr> {
        let lhs = self.additive()?;
        let op = match self.peek() {
            Some(Token::Eq) => CompareOp::Eq,
            Some(Token::Ne) => CompareOp::Ne,
            Some(Token::Lt) => CompareOp::Lt,
            Some(Token::Le) => CompareOp::Le,
            Some(Token::Gt) => CompareOp::Gt,
            Some(Token::Ge) => CompareOp::Ge,
            _ => return Ok(lhs),
        };
        self.pos += 1;
        let rhs = self.additive()?;
        Ok(Expr::Compare {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        })
    }

    // additive := multiplicative (('+' | '-') multiplicative)*
    fn additive(&mut self) -> QueryResult<Expr> {
        let mut lhs = self.multiplicative()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => ArithOp::Add,
                Some(Token::Minus) => ArithOp::Sub,
                _ => return Ok(lhs),
            };
            self.pos += 1;
            let rhs = self.multiplicative()?;
            lhs = Expr::Arith {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
    }

    // multiplicative := unary (('*' | 'div' | 'mod') unary)*
    fn multiplicative(&mut self) -> QueryResult<Expr> {
        let mut lhs = self.unary()?;
        loop {
            let op = if self.peek() == Some(&Token::Star) {
                ArithOp::Mul
            } else if self.is_name("div") {
                ArithOp::Div
            } else if self.is_name("mod") {
                ArithOp::Mod
            } else {
                return Ok(lhs);
            };
            self.pos += 1;
            let rhs = self.unary()?;
            lhs = Expr::Arith {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
    }

    // unary := '-' unary | '+' unary | primary
    fn unary(&mut self) -> QueryResult<Expr> {
        if self.eat(&Token::Minus) {
            return Ok(Expr::Negate(Box::new(self.unary()?)));
        }
        if self.eat(&Token::Plus) {
            return self.unary();
        }
        self.primary()
    }

    fn primary(&mut self) -> QueryResult<Expr> {
        let offset = self.offset();
        let Some(token) = self.advance() else {
            return Err(QueryError::parse(offset, "unexpected end of expression"));
        };
        match token {
            Token::Integer(i) => Ok(Expr::Literal(Sequence::from(Item::Integer(i)))),
            Token::Decimal(d) => Ok(Expr::Literal(Sequence::from(Item::Double(d)))),
            Token::Str(s) => Ok(Expr::Literal(Sequence::from(Item::String(s)))),
            Token::Variable(name) => Ok(Expr::Variable(name)),
            Token::Dot => Ok(Expr::Context),
            Token::LParen => {
                if self.eat(&Token::RParen) {
                    return Ok(Expr::Literal(Sequence::empty()));
                }
                let inner = self.expr()?;
                self.expect(&Token::RParen, "')'")?;
                Ok(inner)
            }
            Token::Name(name) => self.call(&name, offset),
            other => Err(QueryError::parse(offset, format!("unexpected {other:?}"))),
        }
    }

    fn call(&mut self, name: &str, offset: usize) -> QueryResult<Expr> {
        if self.peek() != Some(&Token::LParen) {
            return Err(QueryError::parse(
                offset,
                format!("unsupported name {name:?}; only function calls are supported"),
            ));
        }
        let function = Function::lookup(name)
            .ok_or_else(|| QueryError::parse(offset, format!("unknown function {name}()")))?;
        self.pos += 1;

        let mut args = Vec::new();
        if !self.eat(&Token::RParen) {
            loop {
                args.push(self.comparison()?);
                if self.eat(&Token::RParen) {
                    break;
                }
                self.expect(&Token::Comma, "',' or ')'")?;
            }
        }

        let (min, max) = function.arity();
        if args.len() < min || args.len() > max {
            return Err(QueryError::parse(
                offset,
                format!("{name}() takes {min} to {max} arguments, got {}", args.len()),
            ));
        }
        Ok(Expr::Call { function, args })
    }
}
