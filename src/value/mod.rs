pub mod deserializer;
pub mod ops;
pub mod serializer;

pub use deserializer::from_value;
pub use serializer::to_value;

use crate::config::Mode;
use crate::error::{Error, Result};
use indexmap::{IndexMap, IndexSet};
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// A host value exposed to templates through attribute and/or mapping access.
///
/// Member resolution tries [`Object::get_attr`] first and [`Object::get_item`]
/// second, so an implementation only needs to provide the access style it has.
pub trait Object: fmt::Debug + Send + Sync {
    fn type_name(&self) -> &str {
        "object"
    }

    /// Attribute-style access (`obj.name`).
    fn get_attr(&self, name: &str) -> Option<Value>;

    /// Mapping-style access (`obj[key]`).
    fn get_item(&self, _key: &Value) -> Option<Value> {
        None
    }

    fn render(&self) -> String {
        format!("<{} object>", self.type_name())
    }
}

pub type NativeFn = dyn Fn(&[Value]) -> Result<Value> + Send + Sync;

/// A callable value: builtins such as `range`, bound methods, host functions.
#[derive(Clone)]
pub struct Function {
    name: Arc<str>,
    func: Arc<NativeFn>,
}

impl Function {
    pub fn new<F>(name: &str, func: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Value> + Send + Sync + 'static,
    {
        Self {
            name: Arc::from(name),
            func: Arc::new(func),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn call(&self, args: &[Value]) -> Result<Value> {
        (self.func)(args)
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<function {}>", self.name)
    }
}

#[derive(Debug, Clone, Default)]
pub enum Value {
    #[default]
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Value>),
    Tuple(Vec<Value>),
    Set(IndexSet<Value>),
    Dict(IndexMap<Value, Value>),
    Object(Arc<dyn Object>),
    Func(Function),
}

/// Numeric view used by equality, hashing and arithmetic.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Number {
    Int(i64),
    Float(f64),
}

impl Value {
    pub fn from_object<T: Object + 'static>(object: T) -> Self {
        Value::Object(Arc::new(object))
    }

    pub fn from_fn<F>(name: &str, func: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Value> + Send + Sync + 'static,
    {
        Value::Func(Function::new(name, func))
    }

    pub fn type_name(&self) -> &str {
        match self {
            Value::None => "NoneType",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
            Value::List(_) => "list",
            Value::Tuple(_) => "tuple",
            Value::Set(_) => "set",
            Value::Dict(_) => "dict",
            Value::Object(o) => o.type_name(),
            Value::Func(_) => "function",
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Value::None)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Integer view; booleans count as integers, as in Python.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::Bool(b) => Some(*b as i64),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self.as_number()? {
            Number::Int(i) => Some(i as f64),
            Number::Float(f) => Some(f),
        }
    }

    pub(crate) fn as_number(&self) -> Option<Number> {
        match self {
            Value::Bool(b) => Some(Number::Int(*b as i64)),
            Value::Int(i) => Some(Number::Int(*i)),
            Value::Float(f) => Some(Number::Float(*f)),
            _ => None,
        }
    }

    pub fn len(&self) -> Option<usize> {
        match self {
            Value::Str(s) => Some(s.chars().count()),
            Value::List(v) | Value::Tuple(v) => Some(v.len()),
            Value::Set(s) => Some(s.len()),
            Value::Dict(d) => Some(d.len()),
            _ => None,
        }
    }

    /// Python truthiness.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::None => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::List(v) | Value::Tuple(v) => !v.is_empty(),
            Value::Set(s) => !s.is_empty(),
            Value::Dict(d) => !d.is_empty(),
            Value::Object(_) | Value::Func(_) => true,
        }
    }

    /// Liquid truthiness: only `nil` and `false` are falsy.
    pub fn is_liquid_truthy(&self) -> bool {
        !matches!(self, Value::None | Value::Bool(false))
    }

    pub fn truthy(&self, mode: Mode) -> bool {
        match mode {
            Mode::Standard => self.is_liquid_truthy(),
            Mode::Python => self.is_truthy(),
        }
    }

    /// Items produced when iterating the value (`for x in value`).
    pub fn iterate(&self) -> Result<Vec<Value>> {
        match self {
            Value::List(v) | Value::Tuple(v) => Ok(v.clone()),
            Value::Set(s) => Ok(s.iter().cloned().collect()),
            Value::Dict(d) => Ok(d.keys().cloned().collect()),
            Value::Str(s) => Ok(s.chars().map(|c| Value::Str(c.to_string())).collect()),
            other => Err(Error::render(format!(
                "'{}' object is not iterable",
                other.type_name()
            ))),
        }
    }

    /// String conversion in the given dialect, used for `{{ }}` output.
    pub fn render(&self, mode: Mode) -> String {
        match mode {
            Mode::Python => self.to_py_str(),
            Mode::Standard => self.to_liquid_str(),
        }
    }

    /// Python `str()`.
    pub fn to_py_str(&self) -> String {
        match self {
            Value::Str(s) => s.clone(),
            Value::Object(o) => o.render(),
            other => other.repr(),
        }
    }

    /// Python `repr()`.
    pub fn repr(&self) -> String {
        match self {
            Value::None => "None".to_string(),
            Value::Bool(true) => "True".to_string(),
            Value::Bool(false) => "False".to_string(),
            Value::Int(i) => i.to_string(),
            Value::Float(f) => float_repr(*f),
            Value::Str(s) => str_repr(s),
            Value::List(v) => format!("[{}]", join_repr(v.iter())),
            Value::Tuple(v) if v.len() == 1 => format!("({},)", v[0].repr()),
            Value::Tuple(v) => format!("({})", join_repr(v.iter())),
            Value::Set(s) if s.is_empty() => "set()".to_string(),
            Value::Set(s) => format!("{{{}}}", join_repr(s.iter())),
            Value::Dict(d) => {
                let items: Vec<String> = d
                    .iter()
                    .map(|(k, v)| format!("{}: {}", k.repr(), v.repr()))
                    .collect();
                format!("{{{}}}", items.join(", "))
            }
            Value::Object(o) => o.render(),
            Value::Func(f) => format!("<function {}>", f.name()),
        }
    }

    /// Liquid output rules: `nil` is empty, sequences are concatenated.
    pub fn to_liquid_str(&self) -> String {
        match self {
            Value::None => String::new(),
            Value::Bool(b) => b.to_string(),
            Value::List(v) | Value::Tuple(v) => v.iter().map(Value::to_liquid_str).collect(),
            Value::Set(s) => s.iter().map(Value::to_liquid_str).collect(),
            other => other.to_py_str(),
        }
    }
}

fn join_repr<'a>(items: impl Iterator<Item = &'a Value>) -> String {
    items.map(Value::repr).collect::<Vec<_>>().join(", ")
}

fn float_repr(f: f64) -> String {
    if f.is_nan() {
        return "nan".to_string();
    }
    if f.is_infinite() {
        return if f > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    let abs = f.abs();
    if abs != 0.0 && !(1e-4..1e16).contains(&abs) {
        let s = format!("{:e}", f);
        if let Some((mantissa, exp)) = s.split_once('e') {
            let exp: i32 = exp.parse().unwrap_or(0);
            let sign = if exp < 0 { '-' } else { '+' };
            return format!("{}e{}{:02}", mantissa, sign, exp.abs());
        }
        return s;
    }
    if f.fract() == 0.0 {
        format!("{:.1}", f)
    } else {
        format!("{}", f)
    }
}

fn str_repr(s: &str) -> String {
    let quote = if s.contains('\'') && !s.contains('"') {
        '"'
    } else {
        '\''
    };
    let mut out = String::with_capacity(s.len() + 2);
    out.push(quote);
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c == quote => {
                out.push('\\');
                out.push(c);
            }
            c => out.push(c),
        }
    }
    out.push(quote);
    out
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::None, Value::None) => true,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::List(a), Value::List(b)) | (Value::Tuple(a), Value::Tuple(b)) => a == b,
            (Value::Set(a), Value::Set(b)) => a.len() == b.len() && a.iter().all(|v| b.contains(v)),
            (Value::Dict(a), Value::Dict(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => Arc::ptr_eq(a, b),
            (Value::Func(a), Value::Func(b)) => Arc::ptr_eq(&a.func, &b.func),
            _ => match (self.as_number(), other.as_number()) {
                (Some(Number::Int(a)), Some(Number::Int(b))) => a == b,
                (Some(Number::Float(a)), Some(Number::Float(b))) => a == b,
                (Some(Number::Int(i)), Some(Number::Float(f)))
                | (Some(Number::Float(f)), Some(Number::Int(i))) => int_eq_float(i, f),
                _ => false,
            },
        }
    }
}

impl Eq for Value {}

/// Exact int/float equality; matches the integral-float branch of `Hash`.
fn int_eq_float(i: i64, f: f64) -> bool {
    f.fract() == 0.0 && f.abs() < 9.2e18 && f as i64 == i
}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        fn hash_int<H: Hasher>(i: i64, state: &mut H) {
            1u8.hash(state);
            i.hash(state);
        }
        match self {
            Value::None => 0u8.hash(state),
            Value::Bool(b) => hash_int(*b as i64, state),
            Value::Int(i) => hash_int(*i, state),
            // integral floats must hash like the equal int
            Value::Float(f) if f.fract() == 0.0 && f.abs() < 9.2e18 => hash_int(*f as i64, state),
            Value::Float(f) => {
                2u8.hash(state);
                f.to_bits().hash(state);
            }
            Value::Str(s) => {
                3u8.hash(state);
                s.hash(state);
            }
            Value::List(v) | Value::Tuple(v) => {
                4u8.hash(state);
                v.hash(state);
            }
            Value::Set(s) => {
                5u8.hash(state);
                s.len().hash(state);
            }
            Value::Dict(d) => {
                6u8.hash(state);
                d.len().hash(state);
            }
            Value::Object(o) => {
                7u8.hash(state);
                (Arc::as_ptr(o) as *const () as usize).hash(state);
            }
            Value::Func(f) => {
                8u8.hash(state);
                (Arc::as_ptr(&f.func) as *const () as usize).hash(state);
            }
        }
    }
}

impl Number {
    pub(crate) fn to_f64(self) -> f64 {
        match self {
            Number::Int(i) => i as f64,
            Number::Float(f) => f,
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}
impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v as i64)
    }
}
impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}
impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::Int(v as i64)
    }
}
impl From<usize> for Value {
    fn from(v: usize) -> Self {
        Value::Int(v as i64)
    }
}
impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}
impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}
impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}
impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::List(v.into_iter().map(Into::into).collect())
    }
}
impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::None, Into::into)
    }
}
impl<V: Into<Value>> From<HashMap<String, V>> for Value {
    fn from(v: HashMap<String, V>) -> Self {
        Value::Dict(
            v.into_iter()
                .map(|(k, v)| (Value::Str(k), v.into()))
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_python_equality_across_numbers() {
        assert_eq!(Value::Int(1), Value::Float(1.0));
        assert_eq!(Value::Bool(true), Value::Int(1));
        assert_ne!(Value::Int(1), Value::Str("1".into()));
        assert_ne!(Value::List(vec![]), Value::Tuple(vec![]));

        let mut set = IndexSet::new();
        set.insert(Value::Int(1));
        assert!(set.contains(&Value::Float(1.0)));
        assert!(set.contains(&Value::Bool(true)));
    }

    #[test]
    fn test_large_int_float_equality_is_exact() {
        let big = 1i64 << 53;
        assert_eq!(Value::Int(big), Value::Float(big as f64));
        assert_ne!(Value::Int(big + 1), Value::Float(big as f64));
        assert_ne!(Value::Int(1), Value::Float(1.5));
        assert_ne!(Value::Int(i64::MAX), Value::Float(1e19));

        let mut set = IndexSet::new();
        set.insert(Value::Float(big as f64));
        assert!(!set.contains(&Value::Int(big + 1)));
        assert!(set.contains(&Value::Int(big)));
    }

    #[test]
    fn test_repr() {
        assert_eq!(Value::None.repr(), "None");
        assert_eq!(Value::Bool(true).to_py_str(), "True");
        assert_eq!(Value::Float(1.0).repr(), "1.0");
        assert_eq!(Value::Float(0.5).repr(), "0.5");
        assert_eq!(Value::Float(1e20).repr(), "1e+20");
        assert_eq!(Value::Float(1e-5).repr(), "1e-05");
        assert_eq!(Value::Tuple(vec![]).repr(), "()");
        assert_eq!(Value::Tuple(vec![Value::Int(1)]).repr(), "(1,)");
        assert_eq!(Value::Set(IndexSet::new()).repr(), "set()");
        assert_eq!(Value::Dict(IndexMap::new()).repr(), "{}");
        assert_eq!(
            Value::List(vec![Value::from("a"), Value::Int(1)]).repr(),
            "['a', 1]"
        );
        assert_eq!(Value::from("it's").repr(), "\"it's\"");
    }

    #[test]
    fn test_liquid_rendering() {
        assert_eq!(Value::None.render(Mode::Standard), "");
        assert_eq!(Value::Bool(false).render(Mode::Standard), "false");
        assert_eq!(
            Value::from(vec!["a", "b"]).render(Mode::Standard),
            "ab"
        );
        assert_eq!(Value::from("x").render(Mode::Python), "x");
    }

    #[test]
    fn test_truthiness_per_mode() {
        assert!(!Value::Int(0).truthy(Mode::Python));
        assert!(Value::Int(0).truthy(Mode::Standard));
        assert!(Value::from("").truthy(Mode::Standard));
        assert!(!Value::None.truthy(Mode::Standard));
        assert!(!Value::List(vec![]).is_truthy());
    }
}
