pub mod ast;
pub mod engine;
pub mod expr;
pub mod lexer;
pub mod parser;
pub mod render;
pub mod render_context;

pub use engine::Template;
