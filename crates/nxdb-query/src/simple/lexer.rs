use crate::error::{QueryError, QueryResult};

#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Token {
    Integer(i64),
    Decimal(f64),
    Str(String),
    Variable(String),
    Name(String),
    Dot,
    LParen,
    RParen,
    Comma,
    Plus,
    Minus,
    Star,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

/// A token and the byte offset it starts at.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct Spanned {
    pub token: Token,
    pub offset: usize,
}

pub(crate) fn tokenize(input: &str) -> QueryResult<Vec<Spanned>> {
    let bytes = input.as_bytes();
    let mut tokens = Vec::new();
    let mut pos = 0;

    while pos < bytes.len() {
        let c = bytes[pos];
        let start = pos;
        let token = match c {
            b' ' | b'\t' | b'\r' | b'\n' => {
                pos += 1;
                continue;
            }
            b'(' if bytes.get(pos + 1) == Some(&b':') => {
                pos = skip_comment(input, pos)?;
                continue;
            }
            b'(' => single(&mut pos, Token::LParen),
            b')' => single(&mut pos, Token::RParen),
            b',' => single(&mut pos, Token::Comma),
            b'+' => single(&mut pos, Token::Plus),
            b'-' => single(&mut pos, Token::Minus),
            b'*' => single(&mut pos, Token::Star),
            b'=' => single(&mut pos, Token::Eq),
            b'!' if bytes.get(pos + 1) == Some(&b'=') => {
                pos += 2;
                Token::Ne
            }
            b'<' if bytes.get(pos + 1) == Some(&b'=') => {
                pos += 2;
                Token::Le
            }
            b'<' => single(&mut pos, Token::Lt),
            b'>' if bytes.get(pos + 1) == Some(&b'=') => {
                pos += 2;
                Token::Ge
            }
            b'>' => single(&mut pos, Token::Gt),
            b'.' if !bytes.get(pos + 1).is_some_and(u8::is_ascii_digit) => single(&mut pos, Token::Dot),
            b'0'..=b'9' | b'.' => number(input, &mut pos)?,
            b'"' | b'\'' => string(input, &mut pos)?,
            b'$' => {
                pos += 1;
                let name = name(input, &mut pos);
                if name.is_empty() {
                    return Err(QueryError::parse(start, "expected a variable name after '$'"));
                }
                Token::Variable(name)
            }
            c if is_name_start(c) => Token::Name(name(input, &mut pos)),
            _ => {
                let ch = input[pos..].chars().next().unwrap_or('?');
                return Err(QueryError::parse(pos, format!("unexpected character {ch:?}")));
            }
        };
        tokens.push(Spanned {
            token,
            offset: start,
        });
    }
    Ok(tokens)
}

fn single(pos: &mut usize, token: Token) -> Token {
    *pos += 1;
    token
}

fn is_name_start(c: u8) -> bool {
    c.is_ascii_alphabetic() || c == b'_'
}

fn name(input: &str, pos: &mut usize) -> String {
    let bytes = input.as_bytes();
    let start = *pos;
    while *pos < bytes.len() && (bytes[*pos].is_ascii_alphanumeric() || bytes[*pos] == b'_') {
        *pos += 1;
    }
    input[start..*pos].to_string()
}

fn number(input: &str, pos: &mut usize) -> QueryResult<Token> {
    let bytes = input.as_bytes();
    let start = *pos;
    while *pos < bytes.len() && bytes[*pos].is_ascii_digit() {
        *pos += 1;
    }
    let mut decimal = false;
    if *pos < bytes.len() && bytes[*pos] == b'.' {
        decimal = true;
        *pos += 1;
        while *pos < bytes.len() && bytes[*pos].is_ascii_digit() {
            *pos += 1;
        }
    }
    let text = &input[start..*pos];
    if decimal {
        text.parse()
            .map(Token::Decimal)
            .map_err(|_| QueryError::parse(start, format!("invalid decimal {text:?}")))
    } else {
        text.parse()
            .map(Token::Integer)
            .map_err(|_| QueryError::parse(start, format!("integer {text} out of range")))
    }
}

/// A quoted string; a doubled quote inside stands for one quote.
fn string(input: &str, pos: &mut usize) -> QueryResult<Token> {
    let start = *pos;
    let quote = input.as_bytes()[start] as char;
    let mut out = String::new();
    let mut chars = input[start + 1..].char_indices().peekable();
    while let Some((i, ch)) = chars.next() {
        if ch == quote {
            if chars.peek().map(|(_, next)| *next) == Some(quote) {
                chars.next();
                out.push(quote);
                continue;
            }
            *pos = start + 1 + i + 1;
            return Ok(Token::Str(out));
        }
        out.push(ch);
    }
    Err(QueryError::parse(start, "unterminated string literal"))
}

/// Skip a `(: ... :)` comment, which may nest.
fn skip_comment(input: &str, start: usize) -> QueryResult<usize> {
    let bytes = input.as_bytes();
    let mut depth = 0usize;
    let mut pos = start;
    while pos + 1 < bytes.len() {
        match (bytes[pos], bytes[pos + 1]) {
            (b'(', b':') => {
                depth += 1;
                pos += 2;
            }
            (b':', b')') => {
                depth -= 1;
                pos += 2;
                if depth == 0 {
                    return Ok(pos);
                }
            }
            _ => pos += 1,
        }
    }
    Err(QueryError::parse(start, "unterminated comment"))
}
