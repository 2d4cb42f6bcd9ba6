use crate::config::Mode;
use crate::error::{Error, Result};
use crate::tags::{Start, TagDescriptor, TagManager, TagRole, TagTable, tag_manager};
use crate::tpl::ast::{BinOp, Expr, ForArgs, Node, OutputNode, TagArgs, TagNode};
use crate::tpl::expr::{ExprParser, parse_expression};
use crate::tpl::lexer::{Token, TokenKind, tokenize};
use std::sync::Arc;
use tracing::trace;

/// Lexer output with trim markers applied.
/// `offset` is where the delimiter starts, `base` where `source` starts.
enum Item<'a> {
    Text(String),
    Tag {
        source: &'a str,
        offset: usize,
        base: usize,
    },
    Output {
        source: &'a str,
        offset: usize,
        base: usize,
    },
}

/// `-` markers: a left trim strips the end of the preceding text, a right trim
/// the start of the following text. Comments are transparent to both.
fn resolve_trims<'a>(tokens: &[Token<'a>]) -> Vec<Item<'a>> {
    let mut items = Vec::new();
    let mut strip_next = false;
    let mut opener = TokenKind::TagOpen;
    let mut offset = 0;
    for token in tokens {
        match token.kind {
            TokenKind::Text => {
                let text = if strip_next {
                    token.lexeme.trim_start()
                } else {
                    token.lexeme
                };
                strip_next = false;
                items.push(Item::Text(text.to_string()));
            }
            TokenKind::TrimLeft => {
                if let Some(Item::Text(text)) = items.last_mut() {
                    text.truncate(text.trim_end().len());
                }
            }
            TokenKind::TrimRight => strip_next = true,
            TokenKind::TagOpen | TokenKind::OutputOpen => {
                opener = token.kind;
                offset = token.offset;
            }
            TokenKind::Source => {
                strip_next = false;
                let (source, base) = (token.lexeme, token.offset);
                items.push(match opener {
                    TokenKind::OutputOpen => Item::Output {
                        source,
                        offset,
                        base,
                    },
                    _ => Item::Tag {
                        source,
                        offset,
                        base,
                    },
                });
            }
            TokenKind::TagClose | TokenKind::OutputClose | TokenKind::Comment => {}
        }
    }
    items
}

/// An open block: the opener node and the clause it is currently filling.
struct Block {
    node: TagNode,
    /// Name of the terminal clause once one is attached.
    terminated: Option<String>,
}

impl Block {
    fn target(&mut self) -> &mut Vec<Node> {
        match self.node.clauses.last_mut() {
            Some(clause) => &mut clause.children,
            None => &mut self.node.children,
        }
    }

    fn is(&self, names: &[String]) -> bool {
        self.node.descriptor.names.iter().any(|n| names.contains(n))
    }
}

/// 文档解析器：维护显式的块栈
struct Parser<'t, 'm> {
    mode: Mode,
    table: &'t TagTable<'m>,
    root: Vec<Node>,
    stack: Vec<Block>,
}

/// Parses a template against the process-wide tag registry.
pub fn parse(source: &str, mode: Mode) -> Result<Vec<Node>> {
    parse_with(source, mode, tag_manager())
}

/// Parses a template; the registry is read-locked for the whole parse.
pub fn parse_with(source: &str, mode: Mode, manager: &TagManager) -> Result<Vec<Node>> {
    let tokens = tokenize(source)?;
    trace!(tokens = tokens.len(), "tokenized template");
    let table = manager.read();
    let mut parser = Parser {
        mode,
        table: &table,
        root: Vec::new(),
        stack: Vec::new(),
    };
    for item in resolve_trims(&tokens) {
        parser.feed(item)?;
    }
    parser.finish()
}

fn split_head(source: &str, offset: usize) -> (&str, &str, usize) {
    let lead = source.len() - source.trim_start().len();
    let body = &source[lead..];
    let name_len = body
        .find(|c: char| c.is_whitespace())
        .unwrap_or(body.len());
    let head = &body[name_len..];
    let head_lead = head.len() - head.trim_start().len();
    (
        &body[..name_len],
        head.trim(),
        offset + lead + name_len + head_lead,
    )
}

impl Parser<'_, '_> {
    fn target(&mut self) -> &mut Vec<Node> {
        match self.stack.last_mut() {
            Some(block) => block.target(),
            None => &mut self.root,
        }
    }

    fn feed(&mut self, item: Item<'_>) -> Result<()> {
        match item {
            Item::Text(text) => {
                if !text.is_empty() {
                    self.target().push(Node::Text(text));
                }
                Ok(())
            }
            Item::Output {
                source,
                offset,
                base,
            } => {
                if source.trim().is_empty() {
                    return Err(Error::syntax("Empty expression in output", offset));
                }
                let expr = parse_expression(source, base, self.mode)?;
                self.target().push(Node::Output(OutputNode { expr, offset }));
                Ok(())
            }
            Item::Tag {
                source,
                offset,
                base,
            } => self.tag(source, offset, base),
        }
    }

    fn tag(&mut self, source: &str, offset: usize, base: usize) -> Result<()> {
        let (mut name, mut head, mut head_offset) = split_head(source, base);
        if name.is_empty() {
            return Err(Error::syntax("Empty tag", offset));
        }
        // python: `else if cond` is `elsif cond`
        if self.mode == Mode::Python && name == "else" {
            let (word, rest, rest_offset) = split_head(head, head_offset);
            if word == "if" {
                (name, head, head_offset) = ("elsif", rest, rest_offset);
            }
        }

        let descriptor = match self.table.get(name, self.mode) {
            Some(d) => d.clone(),
            None => {
                if let Some(opener) = name.strip_prefix("end") {
                    return self.close(name, opener, head, offset);
                }
                return Err(Error::syntax(
                    format!("unknown tag '{}' in {} mode", name, self.mode),
                    offset,
                ));
            }
        };

        // a loop's `else` clause is not part of its body
        let enclosed = self
            .stack
            .iter()
            .any(|b| b.is(&descriptor.inside) && b.node.clauses.is_empty());
        if !descriptor.inside.is_empty() && !enclosed {
            return Err(Error::syntax(
                format!(
                    "'{}' outside of '{}'",
                    name,
                    descriptor.inside.join("' or '")
                ),
                offset,
            ));
        }

        let args = parse_args(&descriptor, name, head, head_offset, self.mode)?;
        let node = TagNode {
            name: name.to_string(),
            descriptor: descriptor.clone(),
            args,
            children: Vec::new(),
            clauses: Vec::new(),
            offset,
        };

        match descriptor.role() {
            TagRole::Standalone => self.target().push(Node::Tag(node)),
            TagRole::Opener => self.stack.push(Block {
                node,
                terminated: None,
            }),
            TagRole::Clause => {
                let Some(block) = self.stack.last_mut() else {
                    return Err(Error::syntax(
                        format!("'{}' outside of a block", name),
                        offset,
                    ));
                };
                if !block.is(&descriptor.parents) {
                    return Err(Error::syntax(
                        format!("'{}' is not allowed in '{}' block", name, block.node.name),
                        offset,
                    ));
                }
                if let Some(terminal) = &block.terminated {
                    return Err(Error::syntax(
                        format!(
                            "No tags allowed after '{}' in '{}' block",
                            terminal, block.node.name
                        ),
                        offset,
                    ));
                }
                if descriptor.terminal {
                    block.terminated = Some(name.to_string());
                }
                block.node.clauses.push(node);
            }
        }
        Ok(())
    }

    fn close(&mut self, closer: &str, opener: &str, head: &str, offset: usize) -> Result<()> {
        let Some(block) = self.stack.pop() else {
            return Err(Error::syntax(
                format!("Unexpected closing tag '{}'", closer),
                offset,
            ));
        };
        if block.node.name != opener {
            return Err(Error::syntax(
                format!(
                    "Mismatched closing tag: expected 'end{}', got '{}'",
                    block.node.name, closer
                ),
                offset,
            ));
        }
        if !head.is_empty() {
            return Err(Error::syntax(
                format!("'{}' takes no arguments", closer),
                offset,
            ));
        }
        self.target().push(Node::Tag(block.node));
        Ok(())
    }

    fn finish(self) -> Result<Vec<Node>> {
        if let Some(block) = self.stack.last() {
            return Err(Error::syntax(
                format!(
                    "Unclosed tag '{}', expected 'end{}'",
                    block.node.name, block.node.name
                ),
                block.node.offset,
            ));
        }
        Ok(self.root)
    }
}

fn parse_args(
    descriptor: &Arc<TagDescriptor>,
    name: &str,
    head: &str,
    base: usize,
    mode: Mode,
) -> Result<TagArgs> {
    if descriptor.start == Start::Raw {
        return Ok(TagArgs::Raw(head.to_string()));
    }
    if head.is_empty() {
        return match descriptor.start {
            Start::None => Ok(TagArgs::None),
            _ => Err(Error::syntax(
                format!("'{}' expects arguments", name),
                base,
            )),
        };
    }
    let mut p = ExprParser::new(head, base, mode)?;
    let args = match descriptor.start {
        Start::None => {
            return Err(Error::syntax(
                format!("'{}' takes no arguments", name),
                base,
            ));
        }
        Start::Raw => TagArgs::Raw(head.to_string()),
        Start::Expr => TagArgs::Expr(p.parse_expression()?),
        Start::VarName => TagArgs::VarName(p.parse_identifier()?),
        Start::ExprList => {
            let mut list = Vec::new();
            loop {
                split_or(p.parse_expression()?, mode, &mut list);
                if !p.eat(",") {
                    break;
                }
            }
            TagArgs::ExprList(list)
        }
        Start::Assign => {
            let target = p.parse_identifier()?;
            p.expect("=")?;
            TagArgs::Assign {
                name: target,
                value: p.parse_expression()?,
            }
        }
        Start::For => TagArgs::For(Box::new(parse_for(&mut p, mode)?)),
    };
    p.finish()?;
    Ok(args)
}

/// Liquid separates `when` values with `or` as well as commas.
fn split_or(expr: Expr, mode: Mode, list: &mut Vec<Expr>) {
    match expr {
        Expr::Binary(BinOp::Or, left, right) if mode == Mode::Standard => {
            split_or(*left, mode, list);
            split_or(*right, mode, list);
        }
        other => list.push(other),
    }
}

fn parse_for(p: &mut ExprParser, mode: Mode) -> Result<ForArgs> {
    let mut targets = vec![p.parse_identifier()?];
    while p.eat(",") {
        targets.push(p.parse_identifier()?);
    }
    p.expect("in")?;
    let iter = p.parse_expression()?;
    let mut args = ForArgs {
        targets,
        iter,
        limit: None,
        offset: None,
        reversed: false,
    };
    if mode == Mode::Standard {
        loop {
            if p.eat("reversed") {
                args.reversed = true;
            } else if p.eat("limit") {
                p.expect(":")?;
                args.limit = Some(p.parse_ternary()?);
            } else if p.eat("offset") {
                p.expect(":")?;
                args.offset = Some(p.parse_ternary()?);
            } else {
                break;
            }
            p.eat(",");
        }
    }
    Ok(args)
}
