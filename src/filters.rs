use crate::error::{Error, Result};
use crate::functions::{self, sort_values, to_float, to_int};
use crate::value::{Value, ops};
use dashmap::DashMap;
use std::sync::{Arc, LazyLock};
use tracing::debug;

/// `value | name: args...`
pub type FilterFn = Arc<dyn Fn(&Value, &[Value]) -> Result<Value> + Send + Sync>;

// 全局过滤器表，首次访问时装入默认过滤器
static FILTERS: LazyLock<FilterManager> = LazyLock::new(FilterManager::with_defaults);

pub fn filter_manager() -> &'static FilterManager {
    &FILTERS
}

/// 过滤器管理器
pub struct FilterManager {
    filters: DashMap<String, FilterFn>,
}

impl Default for FilterManager {
    fn default() -> Self {
        Self::new()
    }
}

impl FilterManager {
    pub fn new() -> Self {
        Self {
            filters: DashMap::new(),
        }
    }

    fn with_defaults() -> Self {
        let manager = Self::new();
        let defaults: &[(&str, fn(&Value, &[Value]) -> Result<Value>)] = &[
            ("size", size),
            ("len", len),
            ("upper", upper),
            ("lower", lower),
            ("capitalize", capitalize),
            ("strip", strip),
            ("join", join),
            ("split", split),
            ("first", first),
            ("last", last),
            ("reverse", reverse),
            ("sort", sort),
            ("uniq", uniq),
            ("default", default),
            ("append", append),
            ("prepend", prepend),
            ("replace", replace),
            ("plus", plus),
            ("minus", minus),
            ("times", times),
            ("abs", abs),
            ("string", string),
            ("str", string),
            ("int", int),
        ];
        for (name, f) in defaults {
            manager.filters.insert(name.to_string(), Arc::new(*f));
        }
        manager
    }

    /// 注册过滤器，同名覆盖
    pub fn register<F>(&self, name: &str, filter: F)
    where
        F: Fn(&Value, &[Value]) -> Result<Value> + Send + Sync + 'static,
    {
        debug!(filter = name, "register filter");
        self.filters.insert(name.to_string(), Arc::new(filter));
    }

    pub fn unregister(&self, name: &str) -> Option<FilterFn> {
        debug!(filter = name, "unregister filter");
        self.filters.remove(name).map(|(_, f)| f)
    }

    pub fn get(&self, name: &str) -> Option<FilterFn> {
        self.filters.get(name).map(|f| f.value().clone())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.filters.contains_key(name)
    }
}

fn arg<'a>(filter: &str, args: &'a [Value], i: usize) -> Result<&'a Value> {
    args.get(i).ok_or_else(|| {
        Error::render(format!(
            "filter '{}' expects at least {} argument(s)",
            filter,
            i + 1
        ))
    })
}

/// String view of a filter input; `None` is the empty string.
fn text(value: &Value) -> String {
    match value {
        Value::None => String::new(),
        Value::Str(s) => s.clone(),
        other => other.to_py_str(),
    }
}

/// Numeric coercion for the arithmetic filters: strings are parsed.
fn number(value: &Value) -> Result<Value> {
    match value {
        Value::Str(s) if s.trim().parse::<i64>().is_ok() => to_int(value).map(Value::Int),
        Value::Str(_) => to_float(value).map(Value::Float),
        Value::None => Ok(Value::Int(0)),
        other if other.as_f64().is_some() => Ok(other.clone()),
        other => Err(Error::render(format!(
            "expected a number, got '{}'",
            other.type_name()
        ))),
    }
}

fn size(value: &Value, _: &[Value]) -> Result<Value> {
    Ok(Value::from(value.len().unwrap_or(0)))
}

/// Strict like the `len()` builtin: unsized values are an error.
fn len(value: &Value, _: &[Value]) -> Result<Value> {
    functions::len(std::slice::from_ref(value))
}

fn upper(value: &Value, _: &[Value]) -> Result<Value> {
    Ok(Value::Str(text(value).to_uppercase()))
}

fn lower(value: &Value, _: &[Value]) -> Result<Value> {
    Ok(Value::Str(text(value).to_lowercase()))
}

fn capitalize(value: &Value, _: &[Value]) -> Result<Value> {
    let s = text(value);
    let mut chars = s.chars();
    let out = match chars.next() {
        Some(c) => c.to_uppercase().chain(chars).collect(),
        None => String::new(),
    };
    Ok(Value::Str(out))
}

fn strip(value: &Value, _: &[Value]) -> Result<Value> {
    Ok(Value::Str(text(value).trim().to_string()))
}

fn join(value: &Value, args: &[Value]) -> Result<Value> {
    let sep = args.first().map(text).unwrap_or_else(|| " ".to_string());
    let parts: Vec<String> = value.iterate()?.iter().map(text).collect();
    Ok(Value::Str(parts.join(&sep)))
}

fn split(value: &Value, args: &[Value]) -> Result<Value> {
    let s = text(value);
    let sep = text(arg("split", args, 0)?);
    let parts = if sep.is_empty() {
        s.chars().map(|c| Value::Str(c.to_string())).collect()
    } else {
        s.split(sep.as_str()).map(Value::from).collect()
    };
    Ok(Value::List(parts))
}

fn first(value: &Value, _: &[Value]) -> Result<Value> {
    Ok(ops::get_item(value, &Value::Int(0)).unwrap_or_default())
}

fn last(value: &Value, _: &[Value]) -> Result<Value> {
    Ok(ops::get_item(value, &Value::Int(-1)).unwrap_or_default())
}

fn reverse(value: &Value, _: &[Value]) -> Result<Value> {
    match value {
        Value::Str(s) => Ok(Value::Str(s.chars().rev().collect())),
        other => {
            let mut items = other.iterate()?;
            items.reverse();
            Ok(Value::List(items))
        }
    }
}

fn sort(value: &Value, _: &[Value]) -> Result<Value> {
    let mut items = value.iterate()?;
    sort_values(&mut items)?;
    Ok(Value::List(items))
}

fn uniq(value: &Value, _: &[Value]) -> Result<Value> {
    Ok(Value::List(functions::unique(value.iterate()?)))
}

/// Liquid `default`: nil, false and empty values fall back.
fn default(value: &Value, args: &[Value]) -> Result<Value> {
    let fallback = arg("default", args, 0)?;
    let blank = matches!(value, Value::None | Value::Bool(false)) || value.len() == Some(0);
    Ok(if blank { fallback.clone() } else { value.clone() })
}

fn append(value: &Value, args: &[Value]) -> Result<Value> {
    Ok(Value::Str(text(value) + &text(arg("append", args, 0)?)))
}

fn prepend(value: &Value, args: &[Value]) -> Result<Value> {
    Ok(Value::Str(text(arg("prepend", args, 0)?) + &text(value)))
}

fn replace(value: &Value, args: &[Value]) -> Result<Value> {
    let from = text(arg("replace", args, 0)?);
    let to = args.get(1).map(text).unwrap_or_default();
    Ok(Value::Str(text(value).replace(&from, &to)))
}

fn plus(value: &Value, args: &[Value]) -> Result<Value> {
    ops::add(&number(value)?, &number(arg("plus", args, 0)?)?)
}

fn minus(value: &Value, args: &[Value]) -> Result<Value> {
    ops::sub(&number(value)?, &number(arg("minus", args, 0)?)?)
}

fn times(value: &Value, args: &[Value]) -> Result<Value> {
    ops::mul(&number(value)?, &number(arg("times", args, 0)?)?)
}

fn abs(value: &Value, _: &[Value]) -> Result<Value> {
    match number(value)? {
        Value::Float(f) => Ok(Value::Float(f.abs())),
        n => {
            let i = to_int(&n)?;
            i.checked_abs()
                .map(Value::Int)
                .ok_or_else(|| Error::render("integer overflow"))
        }
    }
}

fn string(value: &Value, _: &[Value]) -> Result<Value> {
    Ok(Value::Str(text(value)))
}

fn int(value: &Value, _: &[Value]) -> Result<Value> {
    to_int(value).map(Value::Int)
}
