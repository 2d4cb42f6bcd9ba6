use thiserror::Error;

/// The three error kinds surfaced to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Syntax,
    Render,
    Registry,
}

/// Represents errors that can occur while compiling or rendering a template,
/// or while mutating the tag registry.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// 解析阶段错误：分隔符、未知标签、块嵌套、表达式语法
    #[error("Syntax error at offset {offset}: {message}")]
    Syntax { message: String, offset: usize },
    /// 渲染阶段错误：变量/属性缺失、未知过滤器、运算类型不匹配
    #[error("Render error{}: {message}", fmt_offset(.offset))]
    Render {
        message: String,
        offset: Option<usize>,
    },
    #[error("Tag registry error: {0}")]
    Registry(String),
}

fn fmt_offset(offset: &Option<usize>) -> String {
    match offset {
        Some(o) => format!(" at offset {}", o),
        None => String::new(),
    }
}

impl Error {
    pub fn syntax(message: impl Into<String>, offset: usize) -> Self {
        Error::Syntax {
            message: message.into(),
            offset,
        }
    }

    pub fn render(message: impl Into<String>) -> Self {
        Error::Render {
            message: message.into(),
            offset: None,
        }
    }

    pub fn registry(message: impl Into<String>) -> Self {
        Error::Registry(message.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Syntax { .. } => ErrorKind::Syntax,
            Error::Render { .. } => ErrorKind::Render,
            Error::Registry(_) => ErrorKind::Registry,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Error::Syntax { message, .. } | Error::Render { message, .. } => message,
            Error::Registry(message) => message,
        }
    }

    pub fn offset(&self) -> Option<usize> {
        match self {
            Error::Syntax { offset, .. } => Some(*offset),
            Error::Render { offset, .. } => *offset,
            Error::Registry(_) => None,
        }
    }

    /// Attaches a source offset to a render error that does not have one yet.
    pub(crate) fn at(self, pos: usize) -> Self {
        match self {
            Error::Render {
                message,
                offset: None,
            } => Error::Render {
                message,
                offset: Some(pos),
            },
            other => other,
        }
    }
}

impl serde::ser::Error for Error {
    fn custom<T: std::fmt::Display>(msg: T) -> Self {
        Error::render(msg.to_string())
    }
}

impl serde::de::Error for Error {
    fn custom<T: std::fmt::Display>(msg: T) -> Self {
        Error::render(msg.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
