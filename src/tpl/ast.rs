use crate::tags::TagDescriptor;
use crate::value::Value;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Or,
    And,
    In,
    NotIn,
    Is,
    IsNot,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    /// Liquid `contains`
    Contains,
    BitOr,
    BitXor,
    BitAnd,
    Shl,
    Shr,
    Add,
    Sub,
    Mul,
    Div,
    FloorDiv,
    Mod,
    Pow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
    Pos,
    Invert,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Subscript {
    Key(Expr),
    Slice {
        start: Option<Expr>,
        stop: Option<Expr>,
        step: Option<Expr>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    List(Vec<Expr>),
    Tuple(Vec<Expr>),
    Set(Vec<Expr>),
    Dict(Vec<(Expr, Expr)>),
    /// Liquid `(a..b)`, both ends inclusive.
    Range(Box<Expr>, Box<Expr>),
    /// Liquid `empty`
    Empty,
    Var(String),
    Attr(Box<Expr>, String),
    Index(Box<Expr>, Box<Subscript>),
    Call(Box<Expr>, Vec<Expr>),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinOp, Box<Expr>, Box<Expr>),
    Ternary {
        cond: Box<Expr>,
        then: Box<Expr>,
        otherwise: Box<Expr>,
    },
    Filter {
        value: Box<Expr>,
        name: String,
        args: Vec<Expr>,
    },
}

impl Expr {
    pub fn binary(op: BinOp, left: Expr, right: Expr) -> Self {
        Expr::Binary(op, Box::new(left), Box::new(right))
    }

    pub fn unary(op: UnaryOp, operand: Expr) -> Self {
        Expr::Unary(op, Box::new(operand))
    }
}

/// `for` head: `targets in iter [limit: n] [offset: n] [reversed]`.
#[derive(Debug, Clone, PartialEq)]
pub struct ForArgs {
    pub targets: Vec<String>,
    pub iter: Expr,
    pub limit: Option<Expr>,
    pub offset: Option<Expr>,
    pub reversed: bool,
}

/// Parsed tag head, shaped by the descriptor's [`Start`](crate::tags::Start).
#[derive(Debug, Clone, PartialEq)]
pub enum TagArgs {
    None,
    Expr(Expr),
    VarName(String),
    ExprList(Vec<Expr>),
    Assign { name: String, value: Expr },
    For(Box<ForArgs>),
    Raw(String),
}

#[derive(Debug, Clone)]
pub struct TagNode {
    /// The name as written in the source, e.g. `elif` or `elsif`.
    pub name: String,
    pub descriptor: Arc<TagDescriptor>,
    pub args: TagArgs,
    pub children: Vec<Node>,
    /// Attached clauses (`elsif`, `else`, `when`, ...) in source order.
    pub clauses: Vec<TagNode>,
    pub offset: usize,
}

#[derive(Debug, Clone)]
pub struct OutputNode {
    pub expr: Expr,
    pub offset: usize,
}

#[derive(Debug, Clone)]
pub enum Node {
    Text(String),
    Output(OutputNode),
    Tag(TagNode),
}
