//! Tag registry types: descriptors, behaviours and the `#[tag]` contract.

pub mod builtin;
pub mod manager;

pub use crate::tpl::render::ControlSignal;
pub use manager::{TagManager, TagTable, tag_manager};

use crate::config::Mode;
use crate::error::Result;
use crate::tpl::ast::TagNode;
use crate::tpl::render_context::RenderContext;
use std::fmt;
use std::sync::Arc;

/// How the text after the tag name is parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Start {
    /// No head allowed.
    #[default]
    None,
    /// One expression.
    Expr,
    /// A single identifier.
    VarName,
    /// Comma-separated expressions (`when a, b`).
    ExprList,
    /// `name = expr`
    Assign,
    /// `targets in expr [params]`
    For,
    /// The head text, untouched.
    Raw,
}

/// Position a tag takes in the block structure, derived from its descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagRole {
    /// Opens a block closed by `end<name>`.
    Opener,
    /// Splits an open block (`else`, `elsif`, `when`).
    Clause,
    /// Void tag, no body.
    Standalone,
}

/// Rendering behaviour of a tag.
pub trait Tag: Send + Sync {
    fn render(
        &self,
        node: &TagNode,
        ctx: &mut RenderContext,
        out: &mut String,
    ) -> Result<ControlSignal>;
}

/// 标签描述：名称、方言、结构约束与渲染行为
#[derive(Clone)]
pub struct TagDescriptor {
    pub names: Vec<String>,
    pub mode: Mode,
    pub void: bool,
    pub start: Start,
    /// Openers this tag may appear in as a clause.
    pub parents: Vec<String>,
    /// Nothing may follow this clause inside its block.
    pub terminal: bool,
    /// Ancestors one of which must enclose the tag (`break` needs a loop).
    pub inside: Vec<String>,
    pub(crate) protected: bool,
    pub behavior: Arc<dyn Tag>,
}

fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

impl TagDescriptor {
    pub fn new(behavior: impl Tag + 'static) -> Self {
        Self {
            names: Vec::new(),
            mode: Mode::default(),
            void: false,
            start: Start::None,
            parents: Vec::new(),
            terminal: false,
            inside: Vec::new(),
            protected: false,
            behavior: Arc::new(behavior),
        }
    }

    pub fn void(mut self) -> Self {
        self.void = true;
        self
    }

    pub fn start(mut self, start: Start) -> Self {
        self.start = start;
        self
    }

    pub fn clause_of(mut self, parents: &[&str]) -> Self {
        self.parents = names(parents);
        self
    }

    pub fn terminal(mut self) -> Self {
        self.terminal = true;
        self
    }

    pub fn inside(mut self, ancestors: &[&str]) -> Self {
        self.inside = names(ancestors);
        self
    }

    pub(crate) fn protected(mut self) -> Self {
        self.protected = true;
        self
    }

    pub fn is_protected(&self) -> bool {
        self.protected
    }

    pub fn role(&self) -> TagRole {
        if !self.parents.is_empty() {
            TagRole::Clause
        } else if self.void {
            TagRole::Standalone
        } else {
            TagRole::Opener
        }
    }
}

impl fmt::Debug for TagDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TagDescriptor")
            .field("names", &self.names)
            .field("mode", &self.mode)
            .field("role", &self.role())
            .field("start", &self.start)
            .field("protected", &self.protected)
            .finish_non_exhaustive()
    }
}

/// Implemented by `#[tag(...)]`: lets [`TagManager::register_tag`] install a
/// tag type without spelling out its descriptor.
pub trait TagDefinition: Tag + Default + 'static {
    /// Comma-separated names, e.g. `"print,echo"`.
    const NAMES: &'static str;
    const MODE: Mode;

    fn descriptor() -> TagDescriptor;
}
