use super::grammar::{Grammar, Keyword, Level, OpEntry, grammar};
use super::tokens::{ExprToken, Tok, tokenize};
use crate::config::Mode;
use crate::error::{Error, Result};
use crate::tpl::ast::{BinOp, Expr, Subscript, UnaryOp};
use crate::value::Value;

/// Precedence-climbing parser over one tag head or output expression.
///
/// Besides whole expressions it exposes the small cursor API tag heads need
/// (`for x in ...`, `assign x = ...`).
pub struct ExprParser {
    tokens: Vec<ExprToken>,
    pos: usize,
    grammar: &'static Grammar,
}

/// Parses `source` as a single expression, filters included.
pub fn parse_expression(source: &str, base: usize, mode: Mode) -> Result<Expr> {
    let mut parser = ExprParser::new(source, base, mode)?;
    let expr = parser.parse_expression()?;
    parser.finish()?;
    Ok(expr)
}

impl ExprParser {
    pub fn new(source: &str, base: usize, mode: Mode) -> Result<Self> {
        Ok(Self {
            tokens: tokenize(source, base)?,
            pos: 0,
            grammar: grammar(mode),
        })
    }

    fn peek(&self) -> &ExprToken {
        let last = self.tokens.len() - 1;
        &self.tokens[self.pos.min(last)]
    }

    fn peek_at(&self, ahead: usize) -> &ExprToken {
        let last = self.tokens.len() - 1;
        &self.tokens[(self.pos + ahead).min(last)]
    }

    fn advance(&mut self) -> ExprToken {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    pub fn offset(&self) -> usize {
        self.peek().offset
    }

    pub fn is_end(&self) -> bool {
        self.peek().tok == Tok::End
    }

    pub fn check(&self, word: &str) -> bool {
        self.peek().is(word)
    }

    /// Consumes the next token when it spells `word`.
    pub fn eat(&mut self, word: &str) -> bool {
        if self.check(word) {
            self.advance();
            true
        } else {
            false
        }
    }

    pub fn expect(&mut self, word: &str) -> Result<()> {
        if self.eat(word) {
            Ok(())
        } else {
            Err(self.unexpected(&format!("'{}'", word)))
        }
    }

    fn unexpected(&self, expected: &str) -> Error {
        let token = self.peek();
        Error::syntax(
            format!("Expected {}, got '{}'", expected, token.describe()),
            token.offset,
        )
    }

    /// Fails unless every token has been consumed.
    pub fn finish(&self) -> Result<()> {
        if self.is_end() {
            Ok(())
        } else {
            let token = self.peek();
            Err(Error::syntax(
                format!("Unexpected '{}' in expression", token.describe()),
                token.offset,
            ))
        }
    }

    pub fn parse_identifier(&mut self) -> Result<String> {
        match &self.peek().tok {
            Tok::Ident(name) if !self.grammar.reserved.contains(&name.as_str()) => {
                let name = name.clone();
                self.advance();
                Ok(name)
            }
            _ => Err(self.unexpected("an identifier")),
        }
    }

    /// Expression followed by any number of `| filter` applications.
    pub fn parse_expression(&mut self) -> Result<Expr> {
        let mut expr = self.parse_ternary()?;
        while self.eat("|") {
            let name = match &self.peek().tok {
                Tok::Ident(name) => name.clone(),
                _ => return Err(self.unexpected("a filter name")),
            };
            self.advance();
            let mut args = Vec::new();
            if self.eat(":") {
                loop {
                    args.push(self.parse_ternary()?);
                    if !self.eat(",") {
                        break;
                    }
                }
            } else if self.eat("(") {
                args = self.parse_sequence(")")?;
            }
            expr = Expr::Filter {
                value: Box::new(expr),
                name,
                args,
            };
        }
        Ok(expr)
    }

    /// Ternary `a if cond else b` (python dialect), otherwise the loosest level.
    pub fn parse_ternary(&mut self) -> Result<Expr> {
        let expr = self.parse_level(0)?;
        if !self.grammar.ternary || !self.check("if") {
            return Ok(expr);
        }
        self.advance();
        let cond = self.parse_level(0)?;
        self.expect("else")?;
        let otherwise = self.parse_ternary()?;
        Ok(Expr::Ternary {
            cond: Box::new(cond),
            then: Box::new(expr),
            otherwise: Box::new(otherwise),
        })
    }

    fn match_op(&self, entries: &[OpEntry]) -> Option<(BinOp, usize)> {
        entries.iter().find_map(|entry| {
            entry
                .words
                .iter()
                .enumerate()
                .all(|(i, word)| self.peek_at(i).is(word))
                .then_some((entry.op, entry.words.len()))
        })
    }

    fn parse_level(&mut self, idx: usize) -> Result<Expr> {
        let levels = self.grammar.levels;
        let Some(level) = levels.get(idx) else {
            return self.parse_postfix();
        };
        match level {
            Level::Infix(entries) => {
                let mut left = self.parse_level(idx + 1)?;
                while let Some((op, width)) = self.match_op(entries) {
                    for _ in 0..width {
                        self.advance();
                    }
                    let right = self.parse_level(idx + 1)?;
                    left = Expr::binary(op, left, right);
                }
                Ok(left)
            }
            Level::Not => {
                if self.eat("not") {
                    Ok(Expr::unary(UnaryOp::Not, self.parse_level(idx)?))
                } else {
                    self.parse_level(idx + 1)
                }
            }
            Level::Prefix(ops) => {
                let found = ops.iter().find(|(sym, _)| self.check(sym)).map(|(_, op)| *op);
                match found {
                    Some(op) => {
                        self.advance();
                        Ok(Expr::unary(op, self.parse_level(idx)?))
                    }
                    None => self.parse_level(idx + 1),
                }
            }
            Level::Power => {
                let base = self.parse_postfix()?;
                if self.eat("**") {
                    let exponent = self.parse_level(idx.saturating_sub(1))?;
                    Ok(Expr::binary(BinOp::Pow, base, exponent))
                } else {
                    Ok(base)
                }
            }
        }
    }

    fn parse_postfix(&mut self) -> Result<Expr> {
        let mut expr = self.parse_primary()?;
        loop {
            if self.eat(".") {
                let token = self.advance();
                let name = match token.tok {
                    Tok::Ident(name) => name,
                    Tok::Int(i) => i.to_string(),
                    _ => {
                        return Err(Error::syntax(
                            format!("Expected an attribute name, got '{}'", token.describe()),
                            token.offset,
                        ));
                    }
                };
                expr = Expr::Attr(Box::new(expr), name);
            } else if self.eat("[") {
                let subscript = self.parse_subscript()?;
                self.expect("]")?;
                expr = Expr::Index(Box::new(expr), Box::new(subscript));
            } else if self.grammar.calls && self.eat("(") {
                let args = self.parse_sequence(")")?;
                expr = Expr::Call(Box::new(expr), args);
            } else {
                return Ok(expr);
            }
        }
    }

    fn parse_subscript(&mut self) -> Result<Subscript> {
        let start = if self.check(":") {
            None
        } else {
            Some(self.parse_expression()?)
        };
        if !self.grammar.slicing || !self.eat(":") {
            return match start {
                Some(key) => Ok(Subscript::Key(key)),
                None => Err(self.unexpected("an index")),
            };
        }
        let stop = if self.check("]") || self.check(":") {
            None
        } else {
            Some(self.parse_expression()?)
        };
        let step = if self.eat(":") && !self.check("]") {
            Some(self.parse_expression()?)
        } else {
            None
        };
        Ok(Subscript::Slice { start, stop, step })
    }

    /// Comma-separated expressions up to `close`, trailing comma allowed.
    fn parse_sequence(&mut self, close: &str) -> Result<Vec<Expr>> {
        let mut items = Vec::new();
        while !self.eat(close) {
            items.push(self.parse_expression()?);
            if !self.eat(",") {
                self.expect(close)?;
                break;
            }
        }
        Ok(items)
    }

    fn parse_primary(&mut self) -> Result<Expr> {
        let token = self.advance();
        match token.tok {
            Tok::Int(i) => Ok(Expr::Literal(Value::Int(i))),
            Tok::Float(f) => Ok(Expr::Literal(Value::Float(f))),
            Tok::Str(s) => Ok(Expr::Literal(Value::Str(s))),
            Tok::Ident(name) => {
                if let Some((_, keyword)) = self.grammar.keywords.iter().find(|(k, _)| *k == name) {
                    return Ok(keyword.value().map_or(Expr::Empty, Expr::Literal));
                }
                if self.grammar.reserved.contains(&name.as_str()) {
                    return Err(Error::syntax(
                        format!("Unexpected '{}' in expression", name),
                        token.offset,
                    ));
                }
                Ok(Expr::Var(name))
            }
            Tok::Op("-") if self.grammar.negative_literals => {
                let number = self.advance();
                match number.tok {
                    Tok::Int(i) => Ok(Expr::Literal(Value::Int(-i))),
                    Tok::Float(f) => Ok(Expr::Literal(Value::Float(-f))),
                    _ => Err(Error::syntax(
                        format!("Expected a number after '-', got '{}'", number.describe()),
                        number.offset,
                    )),
                }
            }
            Tok::Op("(") => self.parse_group(),
            Tok::Op("[") if self.grammar.list_literals => Ok(Expr::List(self.parse_sequence("]")?)),
            Tok::Op("{") if self.grammar.collections => self.parse_braces(),
            _ => Err(Error::syntax(
                format!("Unexpected '{}' in expression", token.describe()),
                token.offset,
            )),
        }
    }

    /// `(expr)`, `()`, `(a,)`, `(a, b)` and Liquid `(a..b)`.
    fn parse_group(&mut self) -> Result<Expr> {
        if self.grammar.collections && self.eat(")") {
            return Ok(Expr::Tuple(Vec::new()));
        }
        let first = self.parse_expression()?;
        if self.grammar.ranges && self.eat("..") {
            let end = self.parse_expression()?;
            self.expect(")")?;
            return Ok(Expr::Range(Box::new(first), Box::new(end)));
        }
        if self.grammar.collections && self.eat(",") {
            let mut items = vec![first];
            items.extend(self.parse_sequence(")")?);
            return Ok(Expr::Tuple(items));
        }
        self.expect(")")?;
        Ok(first)
    }

    /// `{}` is an empty dict, `{k: v, ...}` a dict, `{a, b}` a set.
    fn parse_braces(&mut self) -> Result<Expr> {
        if self.eat("}") {
            return Ok(Expr::Dict(Vec::new()));
        }
        let first = self.parse_expression()?;
        if self.eat(":") {
            let value = self.parse_expression()?;
            let mut pairs = vec![(first, value)];
            while self.eat(",") {
                if self.check("}") {
                    break;
                }
                let key = self.parse_expression()?;
                self.expect(":")?;
                let value = self.parse_expression()?;
                pairs.push((key, value));
            }
            self.expect("}")?;
            return Ok(Expr::Dict(pairs));
        }
        let mut items = vec![first];
        if self.eat(",") {
            items.extend(self.parse_sequence("}")?);
        } else {
            self.expect("}")?;
        }
        Ok(Expr::Set(items))
    }
}
