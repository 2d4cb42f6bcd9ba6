//! Expression language shared by output blocks and tag heads.

pub mod eval;
pub mod grammar;
pub mod parser;
pub mod tokens;

pub use eval::evaluate;
pub use parser::{ExprParser, parse_expression};
