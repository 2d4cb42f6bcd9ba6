//! Static per-dialect grammar tables.
//!
//! A template picks one table at construction time; the precedence-climbing
//! parser walks `levels` from the loosest binding to the tightest.

use crate::config::Mode;
use crate::tpl::ast::{BinOp, UnaryOp};
use crate::value::Value;

/// One spelling of a binary operator; multi-word operators such as `not in`
/// are matched token by token.
pub struct OpEntry {
    pub words: &'static [&'static str],
    pub op: BinOp,
}

const fn op(words: &'static [&'static str], op: BinOp) -> OpEntry {
    OpEntry { words, op }
}

pub enum Level {
    /// Left-associative binary operators.
    Infix(&'static [OpEntry]),
    /// Prefix `not`.
    Not,
    /// Prefix arithmetic operators.
    Prefix(&'static [(&'static str, UnaryOp)]),
    /// Right-associative `**`; its right operand is parsed one level looser.
    Power,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
    True,
    False,
    None,
    /// Liquid `empty`, only meaningful in comparisons.
    Empty,
}

impl Keyword {
    pub fn value(self) -> Option<Value> {
        match self {
            Keyword::True => Some(Value::Bool(true)),
            Keyword::False => Some(Value::Bool(false)),
            Keyword::None => Some(Value::None),
            Keyword::Empty => None,
        }
    }
}

pub struct Grammar {
    pub mode: Mode,
    pub levels: &'static [Level],
    pub keywords: &'static [(&'static str, Keyword)],
    /// Words that can never name a variable.
    pub reserved: &'static [&'static str],
    pub ternary: bool,
    pub calls: bool,
    pub slicing: bool,
    pub list_literals: bool,
    /// tuple, set and dict literals
    pub collections: bool,
    pub ranges: bool,
    /// `-1`, `-2.5` as literals, for tables without prefix operators
    pub negative_literals: bool,
}

pub static PYTHON: Grammar = Grammar {
    mode: Mode::Python,
    levels: &[
        Level::Infix(&[op(&["or"], BinOp::Or)]),
        Level::Infix(&[op(&["and"], BinOp::And)]),
        Level::Not,
        Level::Infix(&[op(&["not", "in"], BinOp::NotIn), op(&["in"], BinOp::In)]),
        Level::Infix(&[op(&["is", "not"], BinOp::IsNot), op(&["is"], BinOp::Is)]),
        Level::Infix(&[
            op(&["=="], BinOp::Eq),
            op(&["!="], BinOp::Ne),
            op(&["<="], BinOp::Le),
            op(&[">="], BinOp::Ge),
            op(&["<"], BinOp::Lt),
            op(&[">"], BinOp::Gt),
        ]),
        Level::Infix(&[op(&["||"], BinOp::BitOr)]),
        Level::Infix(&[op(&["^"], BinOp::BitXor)]),
        Level::Infix(&[op(&["&"], BinOp::BitAnd)]),
        Level::Infix(&[op(&["<<"], BinOp::Shl), op(&[">>"], BinOp::Shr)]),
        Level::Infix(&[op(&["+"], BinOp::Add), op(&["-"], BinOp::Sub)]),
        Level::Infix(&[
            op(&["*"], BinOp::Mul),
            op(&["//"], BinOp::FloorDiv),
            op(&["/"], BinOp::Div),
            op(&["%"], BinOp::Mod),
        ]),
        Level::Prefix(&[
            ("+", UnaryOp::Pos),
            ("-", UnaryOp::Neg),
            ("~", UnaryOp::Invert),
        ]),
        Level::Power,
    ],
    keywords: &[
        ("True", Keyword::True),
        ("False", Keyword::False),
        ("None", Keyword::None),
    ],
    reserved: &["and", "or", "not", "in", "is", "if", "else"],
    ternary: true,
    calls: true,
    slicing: true,
    list_literals: true,
    collections: true,
    ranges: false,
    negative_literals: false,
};

pub static STANDARD: Grammar = Grammar {
    mode: Mode::Standard,
    levels: &[
        Level::Infix(&[op(&["or"], BinOp::Or)]),
        Level::Infix(&[op(&["and"], BinOp::And)]),
        Level::Infix(&[
            op(&["=="], BinOp::Eq),
            op(&["!="], BinOp::Ne),
            op(&["<>"], BinOp::Ne),
            op(&["<="], BinOp::Le),
            op(&[">="], BinOp::Ge),
            op(&["<"], BinOp::Lt),
            op(&[">"], BinOp::Gt),
            op(&["contains"], BinOp::Contains),
        ]),
    ],
    keywords: &[
        ("true", Keyword::True),
        ("false", Keyword::False),
        ("nil", Keyword::None),
        ("null", Keyword::None),
        ("empty", Keyword::Empty),
    ],
    reserved: &["and", "or", "contains"],
    ternary: false,
    calls: false,
    slicing: false,
    list_literals: true,
    collections: false,
    ranges: true,
    negative_literals: true,
};

pub fn grammar(mode: Mode) -> &'static Grammar {
    match mode {
        Mode::Standard => &STANDARD,
        Mode::Python => &PYTHON,
    }
}
