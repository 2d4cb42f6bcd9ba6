use crate::config::{Config, Mode};
use crate::error::{Error, Result};
use crate::tpl::ast::Node;
use crate::tpl::parser::parse;
use crate::tpl::render::render_nodes;
use crate::tpl::render_context::{Frame, RenderContext};
use crate::value::{Value, to_value};
use serde::Serialize;
use std::collections::HashMap;
use std::time::Instant;
use tracing::{debug, trace};

/// A compiled template.
///
/// Immutable once built; one `Template` can be rendered from many threads
/// since every render owns its own [`RenderContext`].
#[derive(Debug, Clone)]
pub struct Template {
    source: String,
    config: Config,
    root: Vec<Node>,
}

impl Template {
    /// 解析模板
    ///
    /// ```
    /// use pyliquid::{Config, Template};
    ///
    /// let tpl = Template::new("{{ 1 if x else 2 }}", Config::python()).unwrap();
    /// assert_eq!(tpl.render(&serde_json::json!({"x": true})).unwrap(), "1");
    /// ```
    pub fn new(source: &str, config: impl Into<Config>) -> Result<Self> {
        let config = config.into();
        let started = Instant::now();
        let root = parse(source, config.mode)?;
        if config.debug {
            debug!(
                mode = %config.mode,
                nodes = root.len(),
                elapsed = ?started.elapsed(),
                "template parsed"
            );
        }
        trace!(tree = ?root, "template tree");
        Ok(Self {
            source: source.to_string(),
            config,
            root,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn mode(&self) -> Mode {
        self.config.mode
    }

    /// Renders with variables taken from any serializable mapping (a struct,
    /// a map or `serde_json::json!({...})`). `()` renders without variables.
    pub fn render<T: Serialize + ?Sized>(&self, vars: &T) -> Result<String> {
        let globals = match to_value(vars)? {
            Value::None => Frame::new(),
            Value::Dict(map) => map
                .into_iter()
                .map(|(k, v)| match k {
                    Value::Str(name) => Ok((name, v)),
                    other => Err(Error::render(format!(
                        "variable names must be strings, got {}",
                        other.repr()
                    ))),
                })
                .collect::<Result<Frame>>()?,
            other => {
                return Err(Error::render(format!(
                    "render variables must be a mapping, not '{}'",
                    other.type_name()
                )));
            }
        };
        self.render_with(globals)
    }

    /// Renders with an explicit global frame.
    pub fn render_with(&self, globals: HashMap<String, Value>) -> Result<String> {
        let started = Instant::now();
        let mut ctx = RenderContext::new(globals, self.config);
        let mut out = String::with_capacity(self.source.len());
        // a stray break/continue at the top level just ends the render
        render_nodes(&self.root, &mut ctx, &mut out)?;
        if self.config.debug {
            debug!(
                mode = %self.config.mode,
                bytes = out.len(),
                elapsed = ?started.elapsed(),
                "template rendered"
            );
        }
        Ok(out)
    }
}
