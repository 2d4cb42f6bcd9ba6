use super::{TagDefinition, TagDescriptor, builtin};
use crate::config::Mode;
use crate::error::{Error, Result};
use parking_lot::{RwLock, RwLockReadGuard};
use std::collections::HashMap;
use std::sync::{Arc, LazyLock};
use tracing::debug;

type Table = HashMap<Mode, HashMap<String, Arc<TagDescriptor>>>;

// 全局单例，首次访问时装入内建标签
static TAGS: LazyLock<TagManager> = LazyLock::new(TagManager::new);

pub fn tag_manager() -> &'static TagManager {
    &TAGS
}

/// 标签注册表
///
/// Keyed by `(mode, name)`. Parsing holds a [`TagTable`] read guard for the
/// whole template, so a registration waits for in-flight parses and a parse
/// never sees a half-applied change.
pub struct TagManager {
    tags: RwLock<Table>,
}

impl Default for TagManager {
    fn default() -> Self {
        Self::new()
    }
}

impl TagManager {
    /// A registry holding the protected built-in tags.
    pub fn new() -> Self {
        let manager = Self {
            tags: RwLock::new(HashMap::new()),
        };
        builtin::install(&manager);
        manager
    }

    pub(crate) fn insert(&self, names: &str, mode: Mode, mut descriptor: TagDescriptor) -> Arc<TagDescriptor> {
        descriptor.names = split_names(names);
        descriptor.mode = mode;
        let descriptor = Arc::new(descriptor);
        let mut tags = self.tags.write();
        let table = tags.entry(mode).or_default();
        for name in &descriptor.names {
            table.insert(name.clone(), descriptor.clone());
        }
        descriptor
    }

    /// 注册标签，同名覆盖（包括内建标签）
    ///
    /// `names` is comma-separated; every name maps to the same descriptor.
    pub fn register(&self, names: &str, mode: Mode, descriptor: TagDescriptor) -> Result<Arc<TagDescriptor>> {
        let list = split_names(names);
        if list.is_empty() {
            return Err(Error::registry("no tag name given"));
        }
        if let Some(bad) = list.iter().find(|n| !is_tag_name(n)) {
            return Err(Error::registry(format!("invalid tag name '{}'", bad)));
        }
        if let Some(reserved) = list.iter().find(|n| n.starts_with("end")) {
            return Err(Error::registry(format!(
                "tag name '{}' is reserved for closing tags",
                reserved
            )));
        }
        let mut descriptor = descriptor;
        descriptor.protected = false;
        debug!(names, mode = %mode, "register tag");
        Ok(self.insert(names, mode, descriptor))
    }

    /// Registers a `#[tag]` type.
    pub fn register_tag<T: TagDefinition>(&self) -> Result<Arc<TagDescriptor>> {
        self.register(T::NAMES, T::MODE, T::descriptor())
    }

    /// Removes one name and returns the descriptor it pointed to. Protected
    /// built-ins cannot be removed.
    pub fn unregister(&self, name: &str, mode: Mode) -> Result<Arc<TagDescriptor>> {
        let mut tags = self.tags.write();
        let table = tags.entry(mode).or_default();
        let protected = match table.get(name) {
            Some(d) => d.protected,
            None => {
                return Err(Error::registry(format!(
                    "tag '{}' is not registered in {} mode",
                    name, mode
                )));
            }
        };
        if protected {
            return Err(Error::registry(format!(
                "tag '{}' is a protected built-in of {} mode",
                name, mode
            )));
        }
        debug!(name, mode = %mode, "unregister tag");
        table
            .remove(name)
            .ok_or_else(|| Error::registry(format!("tag '{}' is not registered", name)))
    }

    pub fn get(&self, name: &str, mode: Mode) -> Option<Arc<TagDescriptor>> {
        self.read().get(name, mode).cloned()
    }

    pub fn contains(&self, name: &str, mode: Mode) -> bool {
        self.read().get(name, mode).is_some()
    }

    /// Read view held for the duration of a parse.
    pub fn read(&self) -> TagTable<'_> {
        TagTable {
            guard: self.tags.read(),
        }
    }
}

pub struct TagTable<'a> {
    guard: RwLockReadGuard<'a, Table>,
}

impl TagTable<'_> {
    pub fn get(&self, name: &str, mode: Mode) -> Option<&Arc<TagDescriptor>> {
        self.guard.get(&mode).and_then(|t| t.get(name))
    }
}

fn split_names(names: &str) -> Vec<String> {
    names
        .split(',')
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .map(str::to_string)
        .collect()
}

fn is_tag_name(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c.is_alphabetic() || c == '_')
        && chars.all(|c| c.is_alphanumeric() || c == '_')
}
