use crate::config::{Config, Mode};
use crate::error::{Error, Result};
use crate::functions;
use crate::value::Value;
use std::collections::HashMap;
use std::ops::{Deref, DerefMut};

pub type Frame = HashMap<String, Value>;

/// Variable environment of one render call.
///
/// `frames[0]` is the global frame built from the render variables; every
/// block body pushes a child frame through [`RenderContext::push_frame`].
/// The python builtins sit below the global frame and are read-only.
pub struct RenderContext {
    config: Config,
    builtins: Option<&'static Frame>,
    frames: Vec<Frame>,
    counters: HashMap<String, i64>,
}

impl RenderContext {
    pub fn new(globals: Frame, config: Config) -> Self {
        let builtins = match config.mode {
            Mode::Python => Some(functions::builtins()),
            Mode::Standard => None,
        };
        Self {
            config,
            builtins,
            frames: vec![globals],
            counters: HashMap::new(),
        }
    }

    pub fn mode(&self) -> Mode {
        self.config.mode
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Pushes a child frame; it is popped when the guard drops, on every exit
    /// path.
    pub fn push_frame(&mut self) -> FrameGuard<'_> {
        self.frames.push(Frame::new());
        FrameGuard { ctx: self }
    }

    /// 变量查找：由内向外，最后是内建函数
    pub fn get(&self, name: &str) -> Option<&Value> {
        // 1. 局部帧，从内到外
        if let Some(v) = self.frames.iter().rev().find_map(|f| f.get(name)) {
            return Some(v);
        }
        // 2. 内建
        self.builtins.and_then(|b| b.get(name))
    }

    pub fn lookup(&self, name: &str) -> Result<Value> {
        self.get(name)
            .cloned()
            .ok_or_else(|| Error::render(format!("name '{}' is not defined", name)))
    }

    /// `assign`: rebinds the name in the innermost frame that already holds
    /// it, otherwise creates it in the global frame.
    pub fn assign(&mut self, name: &str, value: Value) {
        let frame = self
            .frames
            .iter()
            .rposition(|f| f.contains_key(name))
            .unwrap_or(0);
        self.frames[frame].insert(name.to_string(), value);
    }

    /// Binds a name in the innermost frame (loop variables).
    pub fn set_local(&mut self, name: &str, value: Value) {
        if let Some(frame) = self.frames.last_mut() {
            frame.insert(name.to_string(), value);
        }
    }

    /// Adds `delta` to a named counter and returns the value before the
    /// change. Counters start at 0 and live for one render.
    pub fn bump_counter(&mut self, name: &str, delta: i64) -> i64 {
        let counter = self.counters.entry(name.to_string()).or_insert(0);
        let before = *counter;
        *counter += delta;
        before
    }
}

pub struct FrameGuard<'c> {
    ctx: &'c mut RenderContext,
}

impl Deref for FrameGuard<'_> {
    type Target = RenderContext;

    fn deref(&self) -> &Self::Target {
        self.ctx
    }
}

impl DerefMut for FrameGuard<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.ctx
    }
}

impl Drop for FrameGuard<'_> {
    fn drop(&mut self) {
        // the global frame is never popped
        if self.ctx.frames.len() > 1 {
            self.ctx.frames.pop();
        }
    }
}
