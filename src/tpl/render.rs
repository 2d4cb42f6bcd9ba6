use crate::error::Result;
use crate::tpl::ast::{Node, TagNode};
use crate::tpl::render_context::RenderContext;

/// Outcome of rendering a node sequence. `Break`/`Continue` unwind to the
/// nearest enclosing loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlSignal {
    Normal,
    Break,
    Continue,
}

/// Renders `nodes` in order, stopping at the first loop-control signal.
pub fn render_nodes(
    nodes: &[Node],
    ctx: &mut RenderContext,
    out: &mut String,
) -> Result<ControlSignal> {
    for node in nodes {
        match node {
            Node::Text(text) => out.push_str(text),
            Node::Output(output) => {
                let value = ctx.eval(&output.expr).map_err(|e| e.at(output.offset))?;
                out.push_str(&value.render(ctx.mode()));
            }
            Node::Tag(tag) => {
                let signal = tag.render(ctx, out)?;
                if signal != ControlSignal::Normal {
                    return Ok(signal);
                }
            }
        }
    }
    Ok(ControlSignal::Normal)
}

impl TagNode {
    /// Runs the tag's behaviour; errors are tagged with the tag's offset.
    pub fn render(&self, ctx: &mut RenderContext, out: &mut String) -> Result<ControlSignal> {
        self.descriptor
            .behavior
            .render(self, ctx, out)
            .map_err(|e| e.at(self.offset))
    }

    /// Renders the children in a child frame.
    pub fn render_body(&self, ctx: &mut RenderContext, out: &mut String) -> Result<ControlSignal> {
        let mut frame = ctx.push_frame();
        render_nodes(&self.children, &mut frame, out)
    }
}
