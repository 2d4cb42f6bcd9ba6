//! Python-dialect builtins (`range`, `len`, ...) and the methods exposed on
//! built-in values (`d.items()`, `s.upper()`, ...).

use crate::error::{Error, Result};
use crate::tpl::render_context::Frame;
use crate::value::{Value, ops};
use indexmap::{IndexMap, IndexSet};
use std::cmp::Ordering;
use std::sync::LazyLock;

static BUILTINS: LazyLock<Frame> = LazyLock::new(|| {
    let table: &[(&str, fn(&[Value]) -> Result<Value>)] = &[
        ("range", range),
        ("len", len),
        ("int", int),
        ("float", float),
        ("str", str),
        ("bool", bool),
        ("list", list),
        ("tuple", tuple),
        ("set", set),
        ("dict", dict),
        ("abs", abs),
        ("min", min),
        ("max", max),
        ("sum", sum),
        ("sorted", sorted),
        ("reversed", reversed),
        ("enumerate", enumerate),
        ("zip", zip),
        ("round", round),
        ("repr", repr),
    ];
    table
        .iter()
        .map(|(name, f)| (name.to_string(), Value::from_fn(name, *f)))
        .collect()
});

/// The read-only frame that sits below the global frame in python mode.
pub fn builtins() -> &'static Frame {
    &BUILTINS
}

fn arity(name: &str, args: &[Value], min: usize, max: usize) -> Result<()> {
    if args.len() < min {
        return Err(Error::render(format!(
            "{}() expected at least {} argument(s), got {}",
            name,
            min,
            args.len()
        )));
    }
    if args.len() > max {
        return Err(Error::render(format!(
            "{}() expected at most {} argument(s), got {}",
            name,
            max,
            args.len()
        )));
    }
    Ok(())
}

fn int_arg(name: &str, value: &Value) -> Result<i64> {
    value.as_int().ok_or_else(|| {
        Error::render(format!(
            "{}() argument must be an integer, not '{}'",
            name,
            value.type_name()
        ))
    })
}

fn str_arg<'a>(name: &str, value: &'a Value) -> Result<&'a str> {
    value.as_str().ok_or_else(|| {
        Error::render(format!(
            "{}() argument must be str, not '{}'",
            name,
            value.type_name()
        ))
    })
}

fn range(args: &[Value]) -> Result<Value> {
    arity("range", args, 1, 3)?;
    let ints = args
        .iter()
        .map(|a| int_arg("range", a))
        .collect::<Result<Vec<_>>>()?;
    let (start, stop, step) = match ints.as_slice() {
        [stop] => (0, *stop, 1),
        [start, stop] => (*start, *stop, 1),
        [start, stop, step] => (*start, *stop, *step),
        _ => return Err(Error::render("range expected at most 3 arguments")),
    };
    if step == 0 {
        return Err(Error::render("range() arg 3 must not be zero"));
    }
    let mut items = Vec::new();
    let mut i = start;
    while (step > 0 && i < stop) || (step < 0 && i > stop) {
        items.push(Value::Int(i));
        match i.checked_add(step) {
            Some(next) => i = next,
            None => break,
        }
    }
    Ok(Value::List(items))
}

pub(crate) fn len(args: &[Value]) -> Result<Value> {
    arity("len", args, 1, 1)?;
    let n = args[0].len().ok_or_else(|| {
        Error::render(format!(
            "object of type '{}' has no len()",
            args[0].type_name()
        ))
    })?;
    Ok(Value::from(n))
}

pub(crate) fn to_int(value: &Value) -> Result<i64> {
    match value {
        Value::Bool(b) => Ok(*b as i64),
        Value::Int(i) => Ok(*i),
        Value::Float(f) if f.is_finite() && f.abs() < 9.2e18 => Ok(f.trunc() as i64),
        Value::Float(f) => Err(Error::render(format!(
            "cannot convert float {} to integer",
            f
        ))),
        Value::Str(s) => s.trim().parse::<i64>().map_err(|_| {
            Error::render(format!(
                "invalid literal for int() with base 10: {}",
                value.repr()
            ))
        }),
        other => Err(Error::render(format!(
            "int() argument must be a string or a number, not '{}'",
            other.type_name()
        ))),
    }
}

pub(crate) fn to_float(value: &Value) -> Result<f64> {
    if let Some(f) = value.as_f64() {
        return Ok(f);
    }
    match value {
        Value::Str(s) => s.trim().parse::<f64>().map_err(|_| {
            Error::render(format!(
                "could not convert string to float: {}",
                value.repr()
            ))
        }),
        other => Err(Error::render(format!(
            "float() argument must be a string or a number, not '{}'",
            other.type_name()
        ))),
    }
}

fn int(args: &[Value]) -> Result<Value> {
    arity("int", args, 0, 1)?;
    args.first().map_or(Ok(0), to_int).map(Value::Int)
}

fn float(args: &[Value]) -> Result<Value> {
    arity("float", args, 0, 1)?;
    args.first().map_or(Ok(0.0), to_float).map(Value::Float)
}

fn str(args: &[Value]) -> Result<Value> {
    arity("str", args, 0, 1)?;
    Ok(Value::Str(args.first().map(Value::to_py_str).unwrap_or_default()))
}

fn bool(args: &[Value]) -> Result<Value> {
    arity("bool", args, 0, 1)?;
    Ok(Value::Bool(args.first().is_some_and(Value::is_truthy)))
}

fn items_of(args: &[Value]) -> Result<Vec<Value>> {
    args.first().map_or(Ok(Vec::new()), Value::iterate)
}

fn list(args: &[Value]) -> Result<Value> {
    arity("list", args, 0, 1)?;
    Ok(Value::List(items_of(args)?))
}

fn tuple(args: &[Value]) -> Result<Value> {
    arity("tuple", args, 0, 1)?;
    Ok(Value::Tuple(items_of(args)?))
}

fn set(args: &[Value]) -> Result<Value> {
    arity("set", args, 0, 1)?;
    Ok(Value::Set(items_of(args)?.into_iter().collect()))
}

fn dict(args: &[Value]) -> Result<Value> {
    arity("dict", args, 0, 1)?;
    match args.first() {
        None => Ok(Value::Dict(IndexMap::new())),
        Some(Value::Dict(d)) => Ok(Value::Dict(d.clone())),
        Some(other) => {
            let mut map = IndexMap::new();
            for item in other.iterate()? {
                let pair = item.iterate()?;
                let [key, value] = <[Value; 2]>::try_from(pair).map_err(|pair| {
                    Error::render(format!(
                        "dictionary update sequence element has length {}; 2 is required",
                        pair.len()
                    ))
                })?;
                map.insert(key, value);
            }
            Ok(Value::Dict(map))
        }
    }
}

fn abs(args: &[Value]) -> Result<Value> {
    arity("abs", args, 1, 1)?;
    match &args[0] {
        Value::Float(f) => Ok(Value::Float(f.abs())),
        other => {
            let i = other.as_int().ok_or_else(|| {
                Error::render(format!(
                    "bad operand type for abs(): '{}'",
                    other.type_name()
                ))
            })?;
            i.checked_abs()
                .map(Value::Int)
                .ok_or_else(|| Error::render("integer overflow"))
        }
    }
}

/// Class used to keep sorting a total order: values of different classes
/// are rejected before sorting.
fn sort_class(value: &Value) -> Option<u8> {
    match value {
        Value::Bool(_) | Value::Int(_) | Value::Float(_) => Some(0),
        Value::Str(_) => Some(1),
        Value::List(_) => Some(2),
        Value::Tuple(_) => Some(3),
        _ => None,
    }
}

fn total_cmp(a: &Value, b: &Value) -> Ordering {
    match (sort_class(a), sort_class(b)) {
        (Some(x), Some(y)) if x != y => x.cmp(&y),
        (Some(_), Some(_)) => match (a, b) {
            (Value::Str(x), Value::Str(y)) => x.cmp(y),
            (Value::List(x), Value::List(y)) | (Value::Tuple(x), Value::Tuple(y)) => x
                .iter()
                .zip(y)
                .map(|(l, r)| total_cmp(l, r))
                .find(|o| o.is_ne())
                .unwrap_or_else(|| x.len().cmp(&y.len())),
            _ => match (a, b) {
                (Value::Int(x), Value::Int(y)) => x.cmp(y),
                _ => {
                    let x = a.as_f64().unwrap_or(0.0);
                    let y = b.as_f64().unwrap_or(0.0);
                    x.total_cmp(&y)
                }
            },
        },
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.type_name().cmp(b.type_name()),
    }
}

fn check_comparable(items: &[Value]) -> Result<()> {
    if let Some(first) = items.first() {
        for item in items {
            if sort_class(item).is_none() || sort_class(item) != sort_class(first) {
                ops::partial_cmp("<", first, item)?;
                return Err(Error::render(format!(
                    "'<' not supported between instances of '{}' and '{}'",
                    first.type_name(),
                    item.type_name()
                )));
            }
        }
    }
    Ok(())
}

pub(crate) fn sort_values(items: &mut [Value]) -> Result<()> {
    check_comparable(items)?;
    items.sort_by(total_cmp);
    Ok(())
}

fn extreme(name: &str, args: &[Value], want: Ordering) -> Result<Value> {
    arity(name, args, 1, usize::MAX)?;
    let items = if args.len() == 1 {
        args[0].iterate()?
    } else {
        args.to_vec()
    };
    check_comparable(&items)?;
    items
        .into_iter()
        .reduce(|best, item| {
            if total_cmp(&item, &best) == want {
                item
            } else {
                best
            }
        })
        .ok_or_else(|| Error::render(format!("{}() arg is an empty sequence", name)))
}

fn min(args: &[Value]) -> Result<Value> {
    extreme("min", args, Ordering::Less)
}

fn max(args: &[Value]) -> Result<Value> {
    extreme("max", args, Ordering::Greater)
}

fn sum(args: &[Value]) -> Result<Value> {
    arity("sum", args, 1, 2)?;
    let start = args.get(1).cloned().unwrap_or(Value::Int(0));
    args[0]
        .iterate()?
        .iter()
        .try_fold(start, |acc, item| ops::add(&acc, item))
}

fn sorted(args: &[Value]) -> Result<Value> {
    arity("sorted", args, 1, 1)?;
    let mut items = args[0].iterate()?;
    sort_values(&mut items)?;
    Ok(Value::List(items))
}

fn reversed(args: &[Value]) -> Result<Value> {
    arity("reversed", args, 1, 1)?;
    let mut items = args[0].iterate()?;
    items.reverse();
    Ok(Value::List(items))
}

fn enumerate(args: &[Value]) -> Result<Value> {
    arity("enumerate", args, 1, 2)?;
    let start = args.get(1).map_or(Ok(0), |s| int_arg("enumerate", s))?;
    let items = args[0]
        .iterate()?
        .into_iter()
        .zip(0i64..)
        .map(|(item, offset)| {
            let index = start
                .checked_add(offset)
                .ok_or_else(|| Error::render("integer overflow"))?;
            Ok(Value::Tuple(vec![Value::Int(index), item]))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(Value::List(items))
}

fn zip(args: &[Value]) -> Result<Value> {
    let columns = args
        .iter()
        .map(Value::iterate)
        .collect::<Result<Vec<_>>>()?;
    let rows = columns.iter().map(Vec::len).min().unwrap_or(0);
    let items = (0..rows)
        .map(|i| Value::Tuple(columns.iter().map(|c| c[i].clone()).collect()))
        .collect();
    Ok(Value::List(items))
}

fn round(args: &[Value]) -> Result<Value> {
    arity("round", args, 1, 2)?;
    let digits = match args.get(1) {
        None | Some(Value::None) => None,
        Some(d) => Some(int_arg("round", d)?),
    };
    match (&args[0], digits) {
        (Value::Int(i), _) => Ok(Value::Int(*i)),
        (value, None) => {
            let f = to_float(value)?.round_ties_even();
            to_int(&Value::Float(f)).map(Value::Int)
        }
        (value, Some(n)) => {
            let f = to_float(value)?;
            let n = i32::try_from(n).map_err(|_| Error::render("round() ndigits out of range"))?;
            let scale = 10f64.powi(n);
            Ok(Value::Float((f * scale).round_ties_even() / scale))
        }
    }
}

fn repr(args: &[Value]) -> Result<Value> {
    arity("repr", args, 1, 1)?;
    Ok(Value::Str(args[0].repr()))
}

/// Binds a method of a built-in value, e.g. `{'a': 1}.items`.
pub fn method(receiver: &Value, name: &str) -> Option<Value> {
    let call: fn(&Value, &str, &[Value]) -> Result<Value> = match (receiver, name) {
        (Value::Dict(_), "items" | "keys" | "values" | "get") => dict_method,
        (
            Value::Str(_),
            "upper" | "lower" | "strip" | "split" | "startswith" | "endswith" | "replace" | "join",
        ) => str_method,
        (Value::List(_) | Value::Tuple(_), "index" | "count") => seq_method,
        _ => return None,
    };
    let this = receiver.clone();
    let method = name.to_string();
    Some(Value::from_fn(name, move |args| call(&this, &method, args)))
}

fn dict_method(this: &Value, name: &str, args: &[Value]) -> Result<Value> {
    let Value::Dict(d) = this else {
        return Err(Error::render(format!("'{}' has no method {}", this.type_name(), name)));
    };
    match name {
        "items" => {
            arity(name, args, 0, 0)?;
            Ok(Value::List(
                d.iter()
                    .map(|(k, v)| Value::Tuple(vec![k.clone(), v.clone()]))
                    .collect(),
            ))
        }
        "keys" => {
            arity(name, args, 0, 0)?;
            Ok(Value::List(d.keys().cloned().collect()))
        }
        "values" => {
            arity(name, args, 0, 0)?;
            Ok(Value::List(d.values().cloned().collect()))
        }
        _ => {
            arity(name, args, 1, 2)?;
            Ok(d.get(&args[0])
                .cloned()
                .unwrap_or_else(|| args.get(1).cloned().unwrap_or_default()))
        }
    }
}

fn str_method(this: &Value, name: &str, args: &[Value]) -> Result<Value> {
    let Value::Str(s) = this else {
        return Err(Error::render(format!("'{}' has no method {}", this.type_name(), name)));
    };
    match name {
        "upper" => Ok(Value::Str(s.to_uppercase())),
        "lower" => Ok(Value::Str(s.to_lowercase())),
        "strip" => {
            arity(name, args, 0, 1)?;
            match args.first() {
                Some(chars) => {
                    let chars = str_arg(name, chars)?;
                    Ok(Value::Str(s.trim_matches(|c| chars.contains(c)).to_string()))
                }
                None => Ok(Value::Str(s.trim().to_string())),
            }
        }
        "split" => {
            arity(name, args, 0, 1)?;
            let parts: Vec<Value> = match args.first() {
                Some(Value::None) | None => s.split_whitespace().map(Value::from).collect(),
                Some(sep) => {
                    let sep = str_arg(name, sep)?;
                    if sep.is_empty() {
                        return Err(Error::render("empty separator"));
                    }
                    s.split(sep).map(Value::from).collect()
                }
            };
            Ok(Value::List(parts))
        }
        "startswith" => {
            arity(name, args, 1, 1)?;
            Ok(Value::Bool(s.starts_with(str_arg(name, &args[0])?)))
        }
        "endswith" => {
            arity(name, args, 1, 1)?;
            Ok(Value::Bool(s.ends_with(str_arg(name, &args[0])?)))
        }
        "replace" => {
            arity(name, args, 2, 2)?;
            Ok(Value::Str(s.replace(
                str_arg(name, &args[0])?,
                str_arg(name, &args[1])?,
            )))
        }
        _ => {
            arity(name, args, 1, 1)?;
            let parts = args[0]
                .iterate()?
                .iter()
                .map(|item| str_arg(name, item).map(str::to_string))
                .collect::<Result<Vec<_>>>()?;
            Ok(Value::Str(parts.join(s)))
        }
    }
}

fn seq_method(this: &Value, name: &str, args: &[Value]) -> Result<Value> {
    let (Value::List(items) | Value::Tuple(items)) = this else {
        return Err(Error::render(format!("'{}' has no method {}", this.type_name(), name)));
    };
    arity(name, args, 1, 1)?;
    let needle = &args[0];
    match name {
        "index" => items
            .iter()
            .position(|item| item == needle)
            .map(Value::from)
            .ok_or_else(|| Error::render(format!("{} is not in {}", needle.repr(), this.type_name()))),
        _ => Ok(Value::from(items.iter().filter(|item| *item == needle).count())),
    }
}

/// Collects unique values preserving first occurrence.
pub(crate) fn unique(items: Vec<Value>) -> Vec<Value> {
    items.into_iter().collect::<IndexSet<_>>().into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(name: &str, args: &[Value]) -> Result<Value> {
        match builtins().get(name) {
            Some(Value::Func(f)) => f.call(args),
            _ => panic!("no builtin {}", name),
        }
    }

    fn ints(items: &[i64]) -> Value {
        Value::List(items.iter().map(|i| Value::Int(*i)).collect())
    }

    #[test]
    fn test_range() {
        assert_eq!(call("range", &[3.into()]).unwrap(), ints(&[0, 1, 2]));
        assert_eq!(
            call("range", &[5.into(), 0.into(), (-2).into()]).unwrap(),
            ints(&[5, 3, 1])
        );
        assert!(call("range", &[1.into(), 2.into(), 0.into()]).is_err());
        assert!(call("range", &[]).is_err());
    }

    #[test]
    fn test_conversions() {
        assert_eq!(call("int", &[Value::Float(1.9)]).unwrap(), Value::Int(1));
        assert_eq!(call("int", &[" 42 ".into()]).unwrap(), Value::Int(42));
        assert!(call("int", &["x".into()]).is_err());
        assert_eq!(call("float", &["2.5".into()]).unwrap(), Value::Float(2.5));
        assert_eq!(call("str", &[Value::None]).unwrap(), Value::from("None"));
        assert_eq!(call("list", &[]).unwrap(), Value::List(vec![]));
        assert_eq!(call("bool", &[Value::List(vec![])]).unwrap(), Value::Bool(false));
        assert_eq!(call("round", &[Value::Float(2.5)]).unwrap(), Value::Int(2));
        assert_eq!(
            call("round", &[Value::Float(1.25), 1.into()]).unwrap(),
            Value::Float(1.2)
        );
    }

    #[test]
    fn test_aggregates() {
        let v = ints(&[3, 1, 2]);
        assert_eq!(call("min", &[v.clone()]).unwrap(), Value::Int(1));
        assert_eq!(call("max", &[1.into(), Value::Float(2.5)]).unwrap(), Value::Float(2.5));
        assert_eq!(call("sum", &[v.clone()]).unwrap(), Value::Int(6));
        assert_eq!(call("sorted", &[v.clone()]).unwrap(), ints(&[1, 2, 3]));
        assert_eq!(call("reversed", &[v]).unwrap(), ints(&[2, 1, 3]));
        assert!(call("sorted", &[Value::List(vec![1.into(), "a".into()])]).is_err());
        assert!(call("min", &[Value::List(vec![])]).is_err());
    }

    #[test]
    fn test_enumerate_and_zip() {
        let pairs = call("enumerate", &[Value::from(vec!["a", "b"])]).unwrap();
        assert_eq!(pairs.repr(), "[(0, 'a'), (1, 'b')]");
        let last = call("enumerate", &[Value::from(vec!["a"]), i64::MAX.into()]).unwrap();
        assert_eq!(last.repr(), format!("[({}, 'a')]", i64::MAX));
        let err = call("enumerate", &[ints(&[1, 2]), i64::MAX.into()]).unwrap_err();
        assert_eq!(err.message(), "integer overflow");
        let zipped = call("zip", &[ints(&[1, 2, 3]), Value::from(vec!["x", "y"])]).unwrap();
        assert_eq!(zipped.repr(), "[(1, 'x'), (2, 'y')]");
        let d = call("dict", &[zipped]).unwrap();
        assert_eq!(d.repr(), "{1: 'x', 2: 'y'}");
    }

    #[test]
    fn test_methods() {
        let call_method = |receiver: &Value, name: &str, args: &[Value]| match method(receiver, name) {
            Some(Value::Func(f)) => f.call(args),
            _ => panic!("no method {}", name),
        };
        let s = Value::from(" a,b ");
        assert_eq!(call_method(&s, "strip", &[]).unwrap(), Value::from("a,b"));
        assert_eq!(
            call_method(&Value::from("a,b"), "split", &[",".into()]).unwrap(),
            Value::from(vec!["a", "b"])
        );
        assert_eq!(
            call_method(&Value::from("-"), "join", &[Value::from(vec!["a", "b"])]).unwrap(),
            Value::from("a-b")
        );
        let d = Value::from(std::collections::HashMap::from([("k".to_string(), 1)]));
        assert_eq!(call_method(&d, "items", &[]).unwrap().repr(), "[('k', 1)]");
        assert_eq!(call_method(&d, "get", &["z".into(), 0.into()]).unwrap(), Value::Int(0));
        assert_eq!(call_method(&ints(&[1, 2, 1]), "count", &[1.into()]).unwrap(), Value::Int(2));
        assert!(call_method(&ints(&[1]), "index", &[5.into()]).is_err());
        assert!(method(&Value::Int(1), "upper").is_none());
    }

    #[test]
    fn test_unique_keeps_order() {
        assert_eq!(unique(vec![2.into(), 1.into(), 2.into()]), vec![Value::Int(2), Value::Int(1)]);
    }
}
