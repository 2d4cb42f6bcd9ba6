//! Liquid templates in two dialects: standard Liquid and a python-flavoured
//! expression language, with a process-wide registry of extensible tags.

extern crate self as pyliquid;

pub mod config;
pub mod error;
pub mod filters;
pub mod functions;
pub mod tags;
pub mod tpl;
pub mod value;

pub use config::{Config, Mode};
pub use error::{Error, ErrorKind, Result};
pub use filters::filter_manager;
pub use pyliquid_macros::tag;
pub use tags::tag_manager;
pub use tpl::Template;
pub use value::{Object, Value};
