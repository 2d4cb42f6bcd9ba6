use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq)]
pub enum Tok {
    Int(i64),
    Float(f64),
    Str(String),
    Ident(String),
    Op(&'static str),
    End,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExprToken {
    pub tok: Tok,
    /// Absolute byte offset in the template source.
    pub offset: usize,
}

impl ExprToken {
    /// Whether the token spells `word`, as an identifier/keyword or an operator.
    pub fn is(&self, word: &str) -> bool {
        match &self.tok {
            Tok::Ident(s) => s == word,
            Tok::Op(op) => *op == word,
            _ => false,
        }
    }

    pub fn describe(&self) -> String {
        match &self.tok {
            Tok::Int(i) => i.to_string(),
            Tok::Float(f) => f.to_string(),
            Tok::Str(s) => format!("{:?}", s),
            Tok::Ident(s) => s.clone(),
            Tok::Op(op) => op.to_string(),
            Tok::End => "end of expression".to_string(),
        }
    }
}

// longest first
const OPERATORS: &[&str] = &[
    "**", "//", "<<", ">>", "<=", ">=", "==", "!=", "<>", "||", "..", "+", "-", "*", "/", "%",
    "&", "^", "~", "<", ">", "|", "(", ")", "[", "]", "{", "}", ",", ":", ".", "=",
];

/// Splits an expression into tokens. `base` is the offset of `source` inside
/// the template, so errors point into the template text.
pub fn tokenize(source: &str, base: usize) -> Result<Vec<ExprToken>> {
    let mut tokens = Vec::new();
    let mut chars = source.char_indices().peekable();

    while let Some(&(i, c)) = chars.peek() {
        let offset = base + i;
        if c.is_whitespace() {
            chars.next();
            continue;
        }

        if c.is_ascii_digit() {
            let (tok, len) = lex_number(&source[i..], offset)?;
            tokens.push(ExprToken { tok, offset });
            while chars.peek().is_some_and(|&(j, _)| j < i + len) {
                chars.next();
            }
            continue;
        }

        if c == '\'' || c == '"' {
            chars.next();
            let mut value = String::new();
            let mut closed = false;
            while let Some((_, ch)) = chars.next() {
                match ch {
                    '\\' => match chars.next() {
                        Some((_, 'n')) => value.push('\n'),
                        Some((_, 't')) => value.push('\t'),
                        Some((_, 'r')) => value.push('\r'),
                        Some((_, '0')) => value.push('\0'),
                        Some((_, esc @ ('\\' | '\'' | '"'))) => value.push(esc),
                        Some((_, other)) => {
                            value.push('\\');
                            value.push(other);
                        }
                        None => break,
                    },
                    ch if ch == c => {
                        closed = true;
                        break;
                    }
                    ch => value.push(ch),
                }
            }
            if !closed {
                return Err(Error::syntax("Unterminated string literal", offset));
            }
            tokens.push(ExprToken {
                tok: Tok::Str(value),
                offset,
            });
            continue;
        }

        if c.is_alphabetic() || c == '_' {
            let mut ident = String::new();
            while let Some(&(_, ch)) = chars.peek() {
                if ch.is_alphanumeric() || ch == '_' {
                    ident.push(ch);
                    chars.next();
                } else {
                    break;
                }
            }
            tokens.push(ExprToken {
                tok: Tok::Ident(ident),
                offset,
            });
            continue;
        }

        let rest = &source[i..];
        let Some(op) = OPERATORS.iter().copied().find(|op| rest.starts_with(*op)) else {
            return Err(Error::syntax(
                format!("Unexpected character '{}' in expression", c),
                offset,
            ));
        };
        for _ in 0..op.len() {
            chars.next();
        }
        tokens.push(ExprToken {
            tok: Tok::Op(op),
            offset,
        });
    }

    tokens.push(ExprToken {
        tok: Tok::End,
        offset: base + source.len(),
    });
    Ok(tokens)
}

/// Reads an int or float literal at the start of `s`, returning the token and
/// its byte length. `1..3` lexes as `1`, `..`, `3`.
fn lex_number(s: &str, offset: usize) -> Result<(Tok, usize)> {
    let bytes = s.as_bytes();
    let digits = |from: usize| {
        let mut i = from;
        while i < bytes.len() && (bytes[i].is_ascii_digit() || bytes[i] == b'_') {
            i += 1;
        }
        i
    };
    let mut end = digits(0);
    let mut is_float = false;
    if bytes.get(end) == Some(&b'.') && bytes.get(end + 1).is_some_and(u8::is_ascii_digit) {
        end = digits(end + 1);
        is_float = true;
    }
    if matches!(bytes.get(end), Some(b'e' | b'E')) {
        let mut exp = end + 1;
        if matches!(bytes.get(exp), Some(b'+' | b'-')) {
            exp += 1;
        }
        if bytes.get(exp).is_some_and(u8::is_ascii_digit) {
            end = digits(exp);
            is_float = true;
        }
    }
    let text: String = s[..end].chars().filter(|c| *c != '_').collect();
    let tok = if is_float {
        text.parse::<f64>()
            .map(Tok::Float)
            .map_err(|_| Error::syntax(format!("Invalid number '{}'", text), offset))?
    } else {
        text.parse::<i64>()
            .map(Tok::Int)
            .map_err(|_| Error::syntax(format!("Integer literal too large: {}", text), offset))?
    };
    Ok((tok, end))
}
