//! Operator semantics shared by both dialects.
//!
//! Integers are overflow-checked, division and modulo follow Python's sign
//! rules, and every type mismatch surfaces as a render error naming both
//! operand types.

use super::{Number, Value};
use crate::error::{Error, Result};
use indexmap::{IndexMap, IndexSet};
use std::cmp::Ordering;
use std::sync::Arc;

fn unsupported(op: &str, a: &Value, b: &Value) -> Error {
    Error::render(format!(
        "unsupported operand type(s) for {}: '{}' and '{}'",
        op,
        a.type_name(),
        b.type_name()
    ))
}

fn bad_operand(op: &str, a: &Value) -> Error {
    Error::render(format!(
        "bad operand type for unary {}: '{}'",
        op,
        a.type_name()
    ))
}

fn overflow() -> Error {
    Error::render("integer overflow")
}

fn zero_division() -> Error {
    Error::render("division by zero")
}

fn numbers(a: &Value, b: &Value) -> Option<(Number, Number)> {
    Some((a.as_number()?, b.as_number()?))
}

/// Applies `int_op` when both operands are integers, `float_op` otherwise.
fn arith(
    a: Number,
    b: Number,
    int_op: fn(i64, i64) -> Option<i64>,
    float_op: fn(f64, f64) -> f64,
) -> Result<Value> {
    match (a, b) {
        (Number::Int(x), Number::Int(y)) => int_op(x, y).map(Value::Int).ok_or_else(overflow),
        (x, y) => Ok(Value::Float(float_op(x.to_f64(), y.to_f64()))),
    }
}

pub fn add(a: &Value, b: &Value) -> Result<Value> {
    if let Some((x, y)) = numbers(a, b) {
        return arith(x, y, i64::checked_add, |x, y| x + y);
    }
    match (a, b) {
        (Value::Str(x), Value::Str(y)) => Ok(Value::Str(format!("{}{}", x, y))),
        (Value::List(x), Value::List(y)) => Ok(Value::List([x.as_slice(), y.as_slice()].concat())),
        (Value::Tuple(x), Value::Tuple(y)) => Ok(Value::Tuple([x.as_slice(), y.as_slice()].concat())),
        _ => Err(unsupported("+", a, b)),
    }
}

pub fn sub(a: &Value, b: &Value) -> Result<Value> {
    if let Some((x, y)) = numbers(a, b) {
        return arith(x, y, i64::checked_sub, |x, y| x - y);
    }
    match (a, b) {
        (Value::Set(x), Value::Set(y)) => Ok(Value::Set(x.difference(y).cloned().collect())),
        _ => Err(unsupported("-", a, b)),
    }
}

fn repeat_items(items: &[Value], n: usize) -> Vec<Value> {
    (0..n).flat_map(|_| items.iter().cloned()).collect()
}

fn repeat(seq: &Value, times: i64) -> Option<Value> {
    let n = usize::try_from(times).unwrap_or(0);
    match seq {
        Value::Str(s) => Some(Value::Str(s.repeat(n))),
        Value::List(v) => Some(Value::List(repeat_items(v, n))),
        Value::Tuple(v) => Some(Value::Tuple(repeat_items(v, n))),
        _ => None,
    }
}

pub fn mul(a: &Value, b: &Value) -> Result<Value> {
    if let Some((x, y)) = numbers(a, b) {
        return arith(x, y, i64::checked_mul, |x, y| x * y);
    }
    let repeated = match (a.as_int(), b.as_int()) {
        (_, Some(n)) => repeat(a, n),
        (Some(n), _) => repeat(b, n),
        _ => None,
    };
    repeated.ok_or_else(|| unsupported("*", a, b))
}

pub fn truediv(a: &Value, b: &Value) -> Result<Value> {
    let (x, y) = numbers(a, b).ok_or_else(|| unsupported("/", a, b))?;
    let divisor = y.to_f64();
    if divisor == 0.0 {
        return Err(zero_division());
    }
    Ok(Value::Float(x.to_f64() / divisor))
}

pub fn floordiv(a: &Value, b: &Value) -> Result<Value> {
    let (x, y) = numbers(a, b).ok_or_else(|| unsupported("//", a, b))?;
    match (x, y) {
        (Number::Int(_), Number::Int(0)) => Err(zero_division()),
        (Number::Int(x), Number::Int(y)) => {
            let q = x.checked_div(y).ok_or_else(overflow)?;
            if x % y != 0 && (x < 0) != (y < 0) {
                Ok(Value::Int(q - 1))
            } else {
                Ok(Value::Int(q))
            }
        }
        (x, y) => {
            let divisor = y.to_f64();
            if divisor == 0.0 {
                return Err(zero_division());
            }
            Ok(Value::Float((x.to_f64() / divisor).floor()))
        }
    }
}

pub fn rem(a: &Value, b: &Value) -> Result<Value> {
    let (x, y) = numbers(a, b).ok_or_else(|| unsupported("%", a, b))?;
    match (x, y) {
        (Number::Int(_), Number::Int(0)) => Err(zero_division()),
        (Number::Int(x), Number::Int(y)) => {
            let r = x.checked_rem(y).ok_or_else(overflow)?;
            if r != 0 && (r < 0) != (y < 0) {
                Ok(Value::Int(r + y))
            } else {
                Ok(Value::Int(r))
            }
        }
        (x, y) => {
            let divisor = y.to_f64();
            if divisor == 0.0 {
                return Err(zero_division());
            }
            let r = x.to_f64() % divisor;
            if r != 0.0 && (r < 0.0) != (divisor < 0.0) {
                Ok(Value::Float(r + divisor))
            } else {
                Ok(Value::Float(r))
            }
        }
    }
}

pub fn pow(a: &Value, b: &Value) -> Result<Value> {
    let (x, y) = numbers(a, b).ok_or_else(|| unsupported("**", a, b))?;
    match (x, y) {
        (Number::Int(x), Number::Int(y)) if y >= 0 => {
            let exp = u32::try_from(y).map_err(|_| overflow())?;
            x.checked_pow(exp).map(Value::Int).ok_or_else(overflow)
        }
        (x, y) => {
            let (x, y) = (x.to_f64(), y.to_f64());
            if x == 0.0 && y < 0.0 {
                return Err(Error::render("0.0 cannot be raised to a negative power"));
            }
            Ok(Value::Float(x.powf(y)))
        }
    }
}

pub fn bitor(a: &Value, b: &Value) -> Result<Value> {
    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => Ok(Value::Bool(x | y)),
        (Value::Set(x), Value::Set(y)) => Ok(Value::Set(x.union(y).cloned().collect())),
        (Value::Dict(x), Value::Dict(y)) => {
            let mut merged: IndexMap<Value, Value> = x.clone();
            merged.extend(y.iter().map(|(k, v)| (k.clone(), v.clone())));
            Ok(Value::Dict(merged))
        }
        _ => match (a.as_int(), b.as_int()) {
            (Some(x), Some(y)) => Ok(Value::Int(x | y)),
            _ => Err(unsupported("|", a, b)),
        },
    }
}

pub fn bitand(a: &Value, b: &Value) -> Result<Value> {
    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => Ok(Value::Bool(x & y)),
        (Value::Set(x), Value::Set(y)) => Ok(Value::Set(x.intersection(y).cloned().collect())),
        _ => match (a.as_int(), b.as_int()) {
            (Some(x), Some(y)) => Ok(Value::Int(x & y)),
            _ => Err(unsupported("&", a, b)),
        },
    }
}

pub fn bitxor(a: &Value, b: &Value) -> Result<Value> {
    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => Ok(Value::Bool(x ^ y)),
        (Value::Set(x), Value::Set(y)) => {
            let set: IndexSet<Value> = x.symmetric_difference(y).cloned().collect();
            Ok(Value::Set(set))
        }
        _ => match (a.as_int(), b.as_int()) {
            (Some(x), Some(y)) => Ok(Value::Int(x ^ y)),
            _ => Err(unsupported("^", a, b)),
        },
    }
}

pub fn shl(a: &Value, b: &Value) -> Result<Value> {
    let (x, y) = match (a.as_int(), b.as_int()) {
        (Some(x), Some(y)) => (x, y),
        _ => return Err(unsupported("<<", a, b)),
    };
    if y < 0 {
        return Err(Error::render("negative shift count"));
    }
    if x == 0 {
        return Ok(Value::Int(0));
    }
    if y >= 63 {
        return Err(overflow());
    }
    let shifted = x << y;
    if shifted >> y != x {
        return Err(overflow());
    }
    Ok(Value::Int(shifted))
}

pub fn shr(a: &Value, b: &Value) -> Result<Value> {
    let (x, y) = match (a.as_int(), b.as_int()) {
        (Some(x), Some(y)) => (x, y),
        _ => return Err(unsupported(">>", a, b)),
    };
    if y < 0 {
        return Err(Error::render("negative shift count"));
    }
    Ok(Value::Int(if y >= 64 {
        if x < 0 { -1 } else { 0 }
    } else {
        x >> y
    }))
}

pub fn neg(a: &Value) -> Result<Value> {
    match a.as_number() {
        Some(Number::Int(i)) => i.checked_neg().map(Value::Int).ok_or_else(overflow),
        Some(Number::Float(f)) => Ok(Value::Float(-f)),
        None => Err(bad_operand("-", a)),
    }
}

pub fn pos(a: &Value) -> Result<Value> {
    match a.as_number() {
        Some(Number::Int(i)) => Ok(Value::Int(i)),
        Some(Number::Float(f)) => Ok(Value::Float(f)),
        None => Err(bad_operand("+", a)),
    }
}

pub fn invert(a: &Value) -> Result<Value> {
    a.as_int()
        .map(|i| Value::Int(!i))
        .ok_or_else(|| bad_operand("~", a))
}

/// Ordering for `< <= > >=`. `Ok(None)` means unordered (NaN involved).
pub fn partial_cmp(op: &str, a: &Value, b: &Value) -> Result<Option<Ordering>> {
    if let Some((x, y)) = numbers(a, b) {
        return Ok(match (x, y) {
            (Number::Int(x), Number::Int(y)) => Some(x.cmp(&y)),
            (x, y) => x.to_f64().partial_cmp(&y.to_f64()),
        });
    }
    match (a, b) {
        (Value::Str(x), Value::Str(y)) => Ok(Some(x.cmp(y))),
        (Value::List(x), Value::List(y)) | (Value::Tuple(x), Value::Tuple(y)) => {
            for (l, r) in x.iter().zip(y) {
                if l != r {
                    return partial_cmp(op, l, r);
                }
            }
            Ok(Some(x.len().cmp(&y.len())))
        }
        _ => Err(Error::render(format!(
            "'{}' not supported between instances of '{}' and '{}'",
            op,
            a.type_name(),
            b.type_name()
        ))),
    }
}

/// `item in container`.
pub fn contains(container: &Value, item: &Value) -> Result<bool> {
    match container {
        Value::Str(s) => match item {
            Value::Str(needle) => Ok(s.contains(needle.as_str())),
            other => Err(Error::render(format!(
                "'in <string>' requires string as left operand, not {}",
                other.type_name()
            ))),
        },
        Value::List(v) | Value::Tuple(v) => Ok(v.contains(item)),
        Value::Set(s) => Ok(s.contains(item)),
        Value::Dict(d) => Ok(d.contains_key(item)),
        Value::Object(o) => Ok(o.get_item(item).is_some()
            || item.as_str().is_some_and(|name| o.get_attr(name).is_some())),
        other => Err(Error::render(format!(
            "argument of type '{}' is not iterable",
            other.type_name()
        ))),
    }
}

/// `a is b`: scalars by variant and value, host objects and functions by
/// pointer. Containers are built fresh on every evaluation, so they are never
/// identical.
pub fn is_identical(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::None, Value::None) => true,
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::Int(x), Value::Int(y)) => x == y,
        (Value::Str(x), Value::Str(y)) => x == y,
        (Value::Object(x), Value::Object(y)) => Arc::ptr_eq(x, y),
        (Value::Func(x), Value::Func(y)) => Arc::ptr_eq(&x.func, &y.func),
        _ => false,
    }
}

fn normalize_index(index: i64, len: usize) -> Option<usize> {
    let len = i64::try_from(len).ok()?;
    let i = if index < 0 { index + len } else { index };
    if (0..len).contains(&i) {
        usize::try_from(i).ok()
    } else {
        None
    }
}

/// Mapping key or sequence index lookup. `None` when the member does not exist.
pub fn get_item(base: &Value, key: &Value) -> Option<Value> {
    match base {
        Value::Dict(d) => d.get(key).cloned(),
        Value::List(v) | Value::Tuple(v) => {
            let i = normalize_index(key.as_int()?, v.len())?;
            v.get(i).cloned()
        }
        Value::Str(s) => {
            let i = normalize_index(key.as_int()?, s.chars().count())?;
            s.chars().nth(i).map(|c| Value::Str(c.to_string()))
        }
        Value::Object(o) => o.get_item(key),
        _ => None,
    }
}

fn slice_indices(
    len: usize,
    start: Option<i64>,
    stop: Option<i64>,
    step: Option<i64>,
) -> Result<Vec<usize>> {
    let step = step.unwrap_or(1);
    if step == 0 {
        return Err(Error::render("slice step cannot be zero"));
    }
    let len = i64::try_from(len).map_err(|_| overflow())?;
    let clamp = |bound: i64, lower: i64, upper: i64| {
        if bound < 0 {
            (bound + len).max(lower)
        } else {
            bound.min(upper)
        }
    };
    let mut out = Vec::new();
    if step > 0 {
        let start = start.map_or(0, |s| clamp(s, 0, len));
        let stop = stop.map_or(len, |s| clamp(s, 0, len));
        let mut i = start;
        while i < stop {
            out.push(i as usize);
            i = match i.checked_add(step) {
                Some(next) => next,
                None => break,
            };
        }
    } else {
        let start = start.map_or(len - 1, |s| clamp(s, -1, len - 1));
        let stop = stop.map_or(-1, |s| clamp(s, -1, len - 1));
        let mut i = start;
        while i > stop {
            out.push(i as usize);
            i = match i.checked_add(step) {
                Some(next) => next,
                None => break,
            };
        }
    }
    Ok(out)
}

/// `base[start:stop:step]` for strings, lists and tuples.
pub fn slice(
    base: &Value,
    start: Option<i64>,
    stop: Option<i64>,
    step: Option<i64>,
) -> Result<Value> {
    match base {
        Value::Str(s) => {
            let chars: Vec<char> = s.chars().collect();
            let picked = slice_indices(chars.len(), start, stop, step)?;
            Ok(Value::Str(picked.into_iter().map(|i| chars[i]).collect()))
        }
        Value::List(v) => {
            let picked = slice_indices(v.len(), start, stop, step)?;
            Ok(Value::List(picked.into_iter().map(|i| v[i].clone()).collect()))
        }
        Value::Tuple(v) => {
            let picked = slice_indices(v.len(), start, stop, step)?;
            Ok(Value::Tuple(picked.into_iter().map(|i| v[i].clone()).collect()))
        }
        other => Err(Error::render(format!(
            "'{}' object is not subscriptable",
            other.type_name()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int(i: i64) -> Value {
        Value::Int(i)
    }

    #[test]
    fn test_python_division_rules() {
        assert_eq!(floordiv(&int(7), &int(2)).unwrap(), int(3));
        assert_eq!(floordiv(&int(-7), &int(2)).unwrap(), int(-4));
        assert_eq!(rem(&int(-7), &int(2)).unwrap(), int(1));
        assert_eq!(rem(&int(7), &int(-2)).unwrap(), int(-1));
        assert_eq!(truediv(&int(1), &int(2)).unwrap(), Value::Float(0.5));
        assert_eq!(
            truediv(&int(1), &int(0)).unwrap_err().message(),
            "division by zero"
        );
        assert!(floordiv(&Value::Float(1.0), &int(0)).is_err());
    }

    #[test]
    fn test_overflow_is_an_error() {
        assert!(add(&int(i64::MAX), &int(1)).is_err());
        assert!(mul(&int(i64::MAX), &int(2)).is_err());
        assert!(neg(&int(i64::MIN)).is_err());
        assert!(shl(&int(1), &int(64)).is_err());
        assert_eq!(shl(&int(1), &int(2)).unwrap(), int(4));
        assert_eq!(shr(&int(-8), &int(100)).unwrap(), int(-1));
    }

    #[test]
    fn test_pow() {
        assert_eq!(pow(&int(2), &int(10)).unwrap(), int(1024));
        assert_eq!(pow(&int(2), &int(-1)).unwrap(), Value::Float(0.5));
        assert!(pow(&int(0), &int(-1)).is_err());
    }

    #[test]
    fn test_sequences() {
        assert_eq!(add(&"a".into(), &"b".into()).unwrap(), Value::from("ab"));
        assert_eq!(mul(&int(2), &"ab".into()).unwrap(), Value::from("abab"));
        assert_eq!(
            mul(&Value::from(vec![1]), &int(-1)).unwrap(),
            Value::List(vec![])
        );
        let err = add(&int(1), &"a".into()).unwrap_err();
        assert_eq!(
            err.message(),
            "unsupported operand type(s) for +: 'int' and 'str'"
        );
    }

    #[test]
    fn test_bitwise() {
        assert_eq!(bitor(&int(1), &int(1)).unwrap(), int(1));
        assert_eq!(bitxor(&int(1), &int(1)).unwrap(), int(0));
        assert_eq!(bitand(&int(6), &int(3)).unwrap(), int(2));
        assert_eq!(invert(&int(-1)).unwrap(), int(0));
        assert_eq!(bitor(&true.into(), &false.into()).unwrap(), Value::Bool(true));
    }

    #[test]
    fn test_ordering() {
        assert_eq!(
            partial_cmp("<", &int(1), &Value::Float(1.5)).unwrap(),
            Some(Ordering::Less)
        );
        assert_eq!(
            partial_cmp("<", &Value::from(vec![1, 2]), &Value::from(vec![1, 2, 0])).unwrap(),
            Some(Ordering::Less)
        );
        assert!(partial_cmp("<", &int(1), &"a".into()).is_err());
    }

    #[test]
    fn test_contains_and_identity() {
        assert!(contains(&Value::Tuple(vec![int(1)]), &int(1)).unwrap());
        assert!(contains(&"hello".into(), &"ell".into()).unwrap());
        assert!(contains(&int(1), &int(1)).is_err());
        assert!(is_identical(&Value::None, &Value::None));
        assert!(!is_identical(&int(1), &Value::Bool(true)));
        assert!(is_identical(&"a".into(), &"a".into()));
        assert!(!is_identical(&Value::List(vec![]), &Value::List(vec![])));
        assert!(!is_identical(&Value::Float(1.0), &Value::Float(1.0)));
        let f = Value::from_fn("f", |_| Ok(Value::None));
        assert!(is_identical(&f, &f.clone()));
        assert!(!is_identical(&f, &Value::from_fn("f", |_| Ok(Value::None))));
    }

    #[test]
    fn test_slicing() {
        let v = Value::from(vec![0, 1, 2, 3]);
        assert_eq!(slice(&v, Some(1), None, None).unwrap(), Value::from(vec![1, 2, 3]));
        assert_eq!(slice(&v, None, None, Some(-1)).unwrap(), Value::from(vec![3, 2, 1, 0]));
        assert_eq!(slice(&v, Some(-2), None, None).unwrap(), Value::from(vec![2, 3]));
        assert_eq!(slice(&"hello".into(), Some(1), Some(3), None).unwrap(), Value::from("el"));
        assert!(slice(&v, None, None, Some(0)).is_err());
        assert_eq!(slice(&v, Some(1), None, Some(i64::MAX)).unwrap(), Value::from(vec![1]));
        assert_eq!(slice(&v, Some(2), None, Some(i64::MIN)).unwrap(), Value::from(vec![2]));
        assert_eq!(get_item(&v, &int(-1)), Some(int(3)));
        assert_eq!(get_item(&v, &int(9)), None);
    }
}
