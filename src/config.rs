use crate::error::Error;
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;

/// Template dialect: selects the expression grammar and the installed tag set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Liquid-compatible expressions.
    #[default]
    #[serde(alias = "liquid")]
    Standard,
    /// Python-flavoured expressions: full operator table, collection literals,
    /// slicing, calls.
    Python,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Standard => "standard",
            Mode::Python => "python",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "standard" | "liquid" => Ok(Mode::Standard),
            "python" => Ok(Mode::Python),
            other => Err(Error::registry(format!("Unknown mode: {}", other))),
        }
    }
}

/// 模板配置
/// Per-template configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub mode: Mode,
    /// Only affects diagnostic verbosity, never the rendered output.
    pub debug: bool,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn python() -> Self {
        Self::new().mode(Mode::Python)
    }

    pub fn mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    pub fn debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }
}

impl From<Mode> for Config {
    fn from(mode: Mode) -> Self {
        Config::new().mode(mode)
    }
}
