//! 内建标签
//!
//! Installed into every [`TagManager`] as protected entries, once per dialect.

use super::{ControlSignal, Start, Tag, TagDescriptor, TagManager};
use crate::config::Mode;
use crate::error::{Error, Result};
use crate::functions::to_int;
use crate::tpl::ast::{Expr, ForArgs, TagArgs, TagNode};
use crate::tpl::render::render_nodes;
use crate::tpl::render_context::RenderContext;
use crate::value::Value;
use indexmap::IndexMap;

const LOOPS: &[&str] = &["for", "while"];

pub(crate) fn install(manager: &TagManager) {
    for mode in [Mode::Standard, Mode::Python] {
        let add = |names: &str, descriptor: TagDescriptor| {
            manager.insert(names, mode, descriptor.protected());
        };
        add("if", TagDescriptor::new(IfTag { negate: false }).start(Start::Expr));
        add("unless", TagDescriptor::new(IfTag { negate: true }).start(Start::Expr));
        let elsif = match mode {
            Mode::Standard => "elsif",
            Mode::Python => "elsif,elif",
        };
        add(
            elsif,
            TagDescriptor::new(ClauseTag)
                .start(Start::Expr)
                .clause_of(&["if", "unless"]),
        );
        add(
            "else",
            TagDescriptor::new(ClauseTag)
                .clause_of(&["if", "unless", "case", "for", "while"])
                .terminal(),
        );
        add("case", TagDescriptor::new(CaseTag).start(Start::Expr));
        add(
            "when",
            TagDescriptor::new(ClauseTag)
                .start(Start::ExprList)
                .clause_of(&["case"]),
        );
        add("for", TagDescriptor::new(ForTag).start(Start::For));
        add("while", TagDescriptor::new(WhileTag).start(Start::Expr));
        add(
            "break",
            TagDescriptor::new(LoopControl(ControlSignal::Break))
                .void()
                .inside(LOOPS),
        );
        add(
            "continue",
            TagDescriptor::new(LoopControl(ControlSignal::Continue))
                .void()
                .inside(LOOPS),
        );
        add("assign", TagDescriptor::new(AssignTag).void().start(Start::Assign));
        add("capture", TagDescriptor::new(CaptureTag).start(Start::VarName));
        add("echo,print", TagDescriptor::new(EchoTag).void().start(Start::Expr));
        add(
            "increment",
            TagDescriptor::new(CounterTag { step: 1 })
                .void()
                .start(Start::VarName),
        );
        add(
            "decrement",
            TagDescriptor::new(CounterTag { step: -1 })
                .void()
                .start(Start::VarName),
        );
    }
}

fn head_expr(node: &TagNode) -> Result<&Expr> {
    match &node.args {
        TagArgs::Expr(e) => Ok(e),
        _ => Err(Error::render(format!("'{}' needs an expression", node.name))),
    }
}

fn head_name(node: &TagNode) -> Result<&str> {
    match &node.args {
        TagArgs::VarName(name) => Ok(name),
        _ => Err(Error::render(format!("'{}' needs a variable name", node.name))),
    }
}

/// Body of `elsif`, `else` and `when`; the opener decides which one runs.
pub struct ClauseTag;

impl Tag for ClauseTag {
    fn render(&self, node: &TagNode, ctx: &mut RenderContext, out: &mut String) -> Result<ControlSignal> {
        node.render_body(ctx, out)
    }
}

/// `if` / `unless` with their `elsif` and `else` clauses.
pub struct IfTag {
    negate: bool,
}

impl Tag for IfTag {
    fn render(&self, node: &TagNode, ctx: &mut RenderContext, out: &mut String) -> Result<ControlSignal> {
        let mode = ctx.mode();
        if ctx.eval(head_expr(node)?)?.truthy(mode) != self.negate {
            return node.render_body(ctx, out);
        }
        for clause in &node.clauses {
            let matched = match &clause.args {
                TagArgs::Expr(cond) => ctx.eval(cond).map_err(|e| e.at(clause.offset))?.truthy(mode),
                _ => true,
            };
            if matched {
                return clause.render(ctx, out);
            }
        }
        Ok(ControlSignal::Normal)
    }
}

/// `case` renders the first `when` holding an equal value, else `else`.
pub struct CaseTag;

impl Tag for CaseTag {
    fn render(&self, node: &TagNode, ctx: &mut RenderContext, out: &mut String) -> Result<ControlSignal> {
        let subject = ctx.eval(head_expr(node)?)?;
        for clause in &node.clauses {
            let matched = match &clause.args {
                TagArgs::ExprList(values) => {
                    let mut hit = false;
                    for value in values {
                        if ctx.eval(value).map_err(|e| e.at(clause.offset))? == subject {
                            hit = true;
                            break;
                        }
                    }
                    hit
                }
                _ => true,
            };
            if matched {
                return clause.render(ctx, out);
            }
        }
        Ok(ControlSignal::Normal)
    }
}

fn loop_info(index: usize, length: usize) -> Value {
    let mut info = IndexMap::new();
    let mut put = |key: &str, value: Value| {
        info.insert(Value::from(key), value);
    };
    put("index", Value::from(index + 1));
    put("index0", Value::from(index));
    put("rindex", Value::from(length - index));
    put("rindex0", Value::from(length - index - 1));
    put("first", Value::Bool(index == 0));
    put("last", Value::Bool(index + 1 == length));
    put("length", Value::from(length));
    Value::Dict(info)
}

fn bind_targets(ctx: &mut RenderContext, targets: &[String], item: Value) -> Result<()> {
    if let [target] = targets {
        ctx.set_local(target, item);
        return Ok(());
    }
    let values = item.iterate()?;
    if values.len() != targets.len() {
        return Err(Error::render(format!(
            "cannot unpack {} value(s) into {} target(s)",
            values.len(),
            targets.len()
        )));
    }
    for (target, value) in targets.iter().zip(values) {
        ctx.set_local(target, value);
    }
    Ok(())
}

/// Liquid `offset:`, `limit:` and `reversed`, applied in that order.
fn slice_items(args: &ForArgs, ctx: &RenderContext, mut items: Vec<Value>) -> Result<Vec<Value>> {
    if let Some(offset) = &args.offset {
        let n = usize::try_from(to_int(&ctx.eval(offset)?)?.max(0)).unwrap_or(0);
        items.drain(..n.min(items.len()));
    }
    if let Some(limit) = &args.limit {
        let n = usize::try_from(to_int(&ctx.eval(limit)?)?.max(0)).unwrap_or(0);
        items.truncate(n);
    }
    if args.reversed {
        items.reverse();
    }
    Ok(items)
}

/// Loop-else: the standard dialect runs it for an empty loop, the python
/// dialect whenever the loop was not left through `break`.
pub struct ForTag;

impl Tag for ForTag {
    fn render(&self, node: &TagNode, ctx: &mut RenderContext, out: &mut String) -> Result<ControlSignal> {
        let TagArgs::For(args) = &node.args else {
            return Err(Error::render("'for' needs a loop head"));
        };
        let mode = ctx.mode();
        let iterable = ctx.eval(&args.iter)?;
        let items = match (&iterable, mode) {
            (Value::None, Mode::Standard) => Vec::new(),
            _ => iterable.iterate()?,
        };
        let items = slice_items(args, ctx, items)?;
        let info_name = match mode {
            Mode::Standard => "forloop",
            Mode::Python => "loop",
        };

        let length = items.len();
        let mut broke = false;
        for (index, item) in items.into_iter().enumerate() {
            let mut frame = ctx.push_frame();
            bind_targets(&mut frame, &args.targets, item)?;
            frame.set_local(info_name, loop_info(index, length));
            if render_nodes(&node.children, &mut frame, out)? == ControlSignal::Break {
                broke = true;
                break;
            }
        }

        let run_else = match mode {
            Mode::Standard => length == 0,
            Mode::Python => !broke,
        };
        match node.clauses.first() {
            Some(otherwise) if run_else => otherwise.render(ctx, out),
            _ => Ok(ControlSignal::Normal),
        }
    }
}

/// `while cond`; its `else` runs when the condition turned false.
pub struct WhileTag;

impl Tag for WhileTag {
    fn render(&self, node: &TagNode, ctx: &mut RenderContext, out: &mut String) -> Result<ControlSignal> {
        let cond = head_expr(node)?;
        let mode = ctx.mode();
        while ctx.eval(cond)?.truthy(mode) {
            let mut frame = ctx.push_frame();
            if render_nodes(&node.children, &mut frame, out)? == ControlSignal::Break {
                return Ok(ControlSignal::Normal);
            }
        }
        match node.clauses.first() {
            Some(otherwise) => otherwise.render(ctx, out),
            None => Ok(ControlSignal::Normal),
        }
    }
}

pub struct LoopControl(ControlSignal);

impl Tag for LoopControl {
    fn render(&self, _: &TagNode, _: &mut RenderContext, _: &mut String) -> Result<ControlSignal> {
        Ok(self.0)
    }
}

pub struct AssignTag;

impl Tag for AssignTag {
    fn render(&self, node: &TagNode, ctx: &mut RenderContext, _: &mut String) -> Result<ControlSignal> {
        let TagArgs::Assign { name, value } = &node.args else {
            return Err(Error::render("'assign' needs 'name = value'"));
        };
        let value = ctx.eval(value)?;
        ctx.assign(name, value);
        Ok(ControlSignal::Normal)
    }
}

/// `capture name` renders its body into a string variable.
pub struct CaptureTag;

impl Tag for CaptureTag {
    fn render(&self, node: &TagNode, ctx: &mut RenderContext, _: &mut String) -> Result<ControlSignal> {
        let name = head_name(node)?;
        let mut buf = String::new();
        let signal = node.render_body(ctx, &mut buf)?;
        ctx.assign(name, Value::Str(buf));
        Ok(signal)
    }
}

pub struct EchoTag;

impl Tag for EchoTag {
    fn render(&self, node: &TagNode, ctx: &mut RenderContext, out: &mut String) -> Result<ControlSignal> {
        let value = ctx.eval(head_expr(node)?)?;
        out.push_str(&value.render(ctx.mode()));
        Ok(ControlSignal::Normal)
    }
}

/// `increment` prints then adds one; `decrement` subtracts one then prints.
pub struct CounterTag {
    step: i64,
}

impl Tag for CounterTag {
    fn render(&self, node: &TagNode, ctx: &mut RenderContext, out: &mut String) -> Result<ControlSignal> {
        let before = ctx.bump_counter(head_name(node)?, self.step);
        let shown = if self.step > 0 { before } else { before + self.step };
        out.push_str(&shown.to_string());
        Ok(ControlSignal::Normal)
    }
}
