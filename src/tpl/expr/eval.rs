use crate::config::Mode;
use crate::error::{Error, Result};
use crate::filters::filter_manager;
use crate::functions::{self, to_int};
use crate::tpl::ast::{BinOp, Expr, Subscript, UnaryOp};
use crate::tpl::render_context::RenderContext;
use crate::value::{Value, ops};
use std::cmp::Ordering;

impl RenderContext {
    /// Evaluates an expression against the current scope.
    pub fn eval(&self, expr: &Expr) -> Result<Value> {
        evaluate(expr, self)
    }
}

pub fn evaluate(expr: &Expr, ctx: &RenderContext) -> Result<Value> {
    let mode = ctx.mode();
    match expr {
        Expr::Literal(v) => Ok(v.clone()),
        Expr::List(items) => Ok(Value::List(eval_all(items, ctx)?)),
        Expr::Tuple(items) => Ok(Value::Tuple(eval_all(items, ctx)?)),
        Expr::Set(items) => {
            let items = eval_all(items, ctx)?;
            items
                .into_iter()
                .map(hashable)
                .collect::<Result<_>>()
                .map(Value::Set)
        }
        Expr::Dict(pairs) => {
            let mut map = indexmap::IndexMap::with_capacity(pairs.len());
            for (k, v) in pairs {
                map.insert(hashable(evaluate(k, ctx)?)?, evaluate(v, ctx)?);
            }
            Ok(Value::Dict(map))
        }
        Expr::Range(start, end) => {
            let start = to_int(&evaluate(start, ctx)?)?;
            let end = to_int(&evaluate(end, ctx)?)?;
            Ok(Value::List((start..=end).map(Value::Int).collect()))
        }
        Expr::Empty => Ok(Value::Str(String::new())),
        Expr::Var(name) => ctx.lookup(name),
        Expr::Attr(base, name) => member(&evaluate(base, ctx)?, name, mode),
        Expr::Index(base, subscript) => {
            let base = evaluate(base, ctx)?;
            match subscript.as_ref() {
                Subscript::Key(key) => index(&base, &evaluate(key, ctx)?),
                Subscript::Slice { start, stop, step } => {
                    let bound = |e: &Option<Expr>| -> Result<Option<i64>> {
                        match e {
                            None => Ok(None),
                            Some(e) => match evaluate(e, ctx)? {
                                Value::None => Ok(None),
                                v => v.as_int().map(Some).ok_or_else(|| {
                                    Error::render(
                                        "slice indices must be integers or None",
                                    )
                                }),
                            },
                        }
                    };
                    ops::slice(&base, bound(start)?, bound(stop)?, bound(step)?)
                }
            }
        }
        Expr::Call(callee, args) => {
            let callee = evaluate(callee, ctx)?;
            let args = eval_all(args, ctx)?;
            match callee {
                Value::Func(f) => f.call(&args),
                other => Err(Error::render(format!(
                    "'{}' object is not callable",
                    other.type_name()
                ))),
            }
        }
        Expr::Unary(op, operand) => {
            let v = evaluate(operand, ctx)?;
            match op {
                UnaryOp::Not => Ok(Value::Bool(!v.truthy(mode))),
                UnaryOp::Neg => ops::neg(&v),
                UnaryOp::Pos => ops::pos(&v),
                UnaryOp::Invert => ops::invert(&v),
            }
        }
        Expr::Binary(op, left, right) => binary(*op, left, right, ctx),
        Expr::Ternary {
            cond,
            then,
            otherwise,
        } => {
            if evaluate(cond, ctx)?.truthy(mode) {
                evaluate(then, ctx)
            } else {
                evaluate(otherwise, ctx)
            }
        }
        Expr::Filter { value, name, args } => {
            let value = evaluate(value, ctx)?;
            let args = eval_all(args, ctx)?;
            apply_filter(name, &value, &args, ctx)
        }
    }
}

fn eval_all(items: &[Expr], ctx: &RenderContext) -> Result<Vec<Value>> {
    items.iter().map(|e| evaluate(e, ctx)).collect()
}

fn hashable(v: Value) -> Result<Value> {
    match v {
        Value::List(_) | Value::Set(_) | Value::Dict(_) => Err(Error::render(format!(
            "unhashable type: '{}'",
            v.type_name()
        ))),
        v => Ok(v),
    }
}

fn apply_filter(name: &str, value: &Value, args: &[Value], ctx: &RenderContext) -> Result<Value> {
    if let Some(filter) = filter_manager().get(name) {
        return filter(value, args);
    }
    // python: any callable in scope can be used as a filter
    if ctx.mode() == Mode::Python {
        if let Some(Value::Func(f)) = ctx.get(name) {
            let mut call_args = Vec::with_capacity(args.len() + 1);
            call_args.push(value.clone());
            call_args.extend_from_slice(args);
            return f.call(&call_args);
        }
    }
    Err(Error::render(format!("No such filter: '{}'", name)))
}

/// `base.name`: attribute, bound method, mapping key, numeric index, then the
/// Liquid `size`/`first`/`last` extras.
pub(crate) fn member(base: &Value, name: &str, mode: Mode) -> Result<Value> {
    if let Value::Object(o) = base {
        if let Some(v) = o.get_attr(name) {
            return Ok(v);
        }
    }
    if mode == Mode::Python {
        if let Some(m) = functions::method(base, name) {
            return Ok(m);
        }
    }
    let key = Value::from(name);
    if let Some(v) = ops::get_item(base, &key) {
        return Ok(v);
    }
    if let Ok(i) = name.parse::<i64>() {
        if let Some(v) = ops::get_item(base, &Value::Int(i)) {
            return Ok(v);
        }
    }
    if mode == Mode::Standard {
        match name {
            "size" => {
                if let Some(n) = base.len() {
                    return Ok(Value::from(n));
                }
            }
            "first" => {
                if let Some(v) = ops::get_item(base, &Value::Int(0)) {
                    return Ok(v);
                }
            }
            "last" => {
                if let Some(v) = ops::get_item(base, &Value::Int(-1)) {
                    return Ok(v);
                }
            }
            _ => {}
        }
    }
    Err(Error::render(format!(
        "'{}' object has no attribute '{}'",
        base.type_name(),
        name
    )))
}

/// `base[key]`
fn index(base: &Value, key: &Value) -> Result<Value> {
    if let Some(v) = ops::get_item(base, key) {
        return Ok(v);
    }
    if let (Value::Object(o), Some(name)) = (base, key.as_str()) {
        if let Some(v) = o.get_attr(name) {
            return Ok(v);
        }
    }
    Err(match base {
        Value::Dict(_) | Value::Object(_) => Error::render(format!("key {} not found", key.repr())),
        Value::List(_) | Value::Tuple(_) | Value::Str(_) if key.as_int().is_some() => {
            Error::render(format!("{} index out of range", base.type_name()))
        }
        Value::List(_) | Value::Tuple(_) | Value::Str(_) => Error::render(format!(
            "{} indices must be integers, not '{}'",
            base.type_name(),
            key.type_name()
        )),
        other => Error::render(format!(
            "'{}' object is not subscriptable",
            other.type_name()
        )),
    })
}

fn compare(op: BinOp, a: &Value, b: &Value, mode: Mode) -> Result<bool> {
    let sym = match op {
        BinOp::Lt => "<",
        BinOp::Le => "<=",
        BinOp::Gt => ">",
        _ => ">=",
    };
    // Liquid: comparing against nil is simply false
    if mode == Mode::Standard && (a.is_none() || b.is_none()) {
        return Ok(false);
    }
    let Some(ord) = ops::partial_cmp(sym, a, b)? else {
        return Ok(false);
    };
    Ok(match op {
        BinOp::Lt => ord == Ordering::Less,
        BinOp::Le => ord != Ordering::Greater,
        BinOp::Gt => ord == Ordering::Greater,
        _ => ord != Ordering::Less,
    })
}

/// Liquid `==`/`!=`; `empty` matches any zero-length value.
fn liquid_eq(left: &Expr, right: &Expr, ctx: &RenderContext) -> Result<bool> {
    match (left, right) {
        (Expr::Empty, Expr::Empty) => Ok(true),
        (Expr::Empty, other) | (other, Expr::Empty) => {
            Ok(evaluate(other, ctx)?.len() == Some(0))
        }
        _ => Ok(evaluate(left, ctx)? == evaluate(right, ctx)?),
    }
}

fn liquid_contains(container: &Value, item: &Value) -> Result<bool> {
    match (container, item) {
        (Value::Str(s), Value::Str(needle)) => Ok(s.contains(needle.as_str())),
        (Value::Str(s), other) => Ok(s.contains(other.to_liquid_str().as_str())),
        (Value::List(_) | Value::Tuple(_) | Value::Set(_) | Value::Dict(_) | Value::Object(_), _) => {
            ops::contains(container, item)
        }
        _ => Ok(false),
    }
}

fn binary(op: BinOp, left: &Expr, right: &Expr, ctx: &RenderContext) -> Result<Value> {
    let mode = ctx.mode();
    match op {
        BinOp::And | BinOp::Or => {
            let l = evaluate(left, ctx)?;
            let short = if op == BinOp::And {
                !l.truthy(mode)
            } else {
                l.truthy(mode)
            };
            match mode {
                // python returns the deciding operand
                Mode::Python if short => Ok(l),
                Mode::Python => evaluate(right, ctx),
                Mode::Standard if short => Ok(Value::Bool(op == BinOp::Or)),
                Mode::Standard => Ok(Value::Bool(evaluate(right, ctx)?.truthy(mode))),
            }
        }
        BinOp::Eq | BinOp::Ne if mode == Mode::Standard => {
            let eq = liquid_eq(left, right, ctx)?;
            Ok(Value::Bool(eq == (op == BinOp::Eq)))
        }
        _ => {
            let l = evaluate(left, ctx)?;
            let r = evaluate(right, ctx)?;
            match op {
                BinOp::Eq => Ok(Value::Bool(l == r)),
                BinOp::Ne => Ok(Value::Bool(l != r)),
                BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge => {
                    compare(op, &l, &r, mode).map(Value::Bool)
                }
                BinOp::In => ops::contains(&r, &l).map(Value::Bool),
                BinOp::NotIn => ops::contains(&r, &l).map(|b| Value::Bool(!b)),
                BinOp::Is => Ok(Value::Bool(ops::is_identical(&l, &r))),
                BinOp::IsNot => Ok(Value::Bool(!ops::is_identical(&l, &r))),
                BinOp::Contains if l.is_none() => Ok(Value::Bool(false)),
                BinOp::Contains => liquid_contains(&l, &r).map(Value::Bool),
                BinOp::BitOr => ops::bitor(&l, &r),
                BinOp::BitXor => ops::bitxor(&l, &r),
                BinOp::BitAnd => ops::bitand(&l, &r),
                BinOp::Shl => ops::shl(&l, &r),
                BinOp::Shr => ops::shr(&l, &r),
                BinOp::Add => ops::add(&l, &r),
                BinOp::Sub => ops::sub(&l, &r),
                BinOp::Mul => ops::mul(&l, &r),
                BinOp::Div => ops::truediv(&l, &r),
                BinOp::FloorDiv => ops::floordiv(&l, &r),
                BinOp::Mod => ops::rem(&l, &r),
                BinOp::Pow => ops::pow(&l, &r),
                BinOp::And | BinOp::Or => unreachable!("handled above"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::tpl::expr::parse_expression;
    use crate::tpl::render_context::Frame;
    use crate::value::Object;

    fn eval_in(mode: Mode, src: &str, vars: &[(&str, Value)]) -> Result<Value> {
        let globals: Frame = vars.iter().map(|(k, v)| (k.to_string(), v.clone())).collect();
        let ctx = RenderContext::new(globals, Config::new().mode(mode));
        let expr = parse_expression(src, 0, mode)?;
        ctx.eval(&expr)
    }

    fn py(src: &str) -> Value {
        eval_in(Mode::Python, src, &[]).unwrap()
    }

    fn py_str(src: &str) -> String {
        py(src).to_py_str()
    }

    #[derive(Debug)]
    struct Point;

    impl Object for Point {
        fn get_attr(&self, name: &str) -> Option<Value> {
            (name == "x").then_some(Value::Int(3))
        }
    }

    #[test]
    fn test_python_operators() {
        assert_eq!(py_str("1 + 2 * 3"), "7");
        assert_eq!(py_str("7 // 2"), "3");
        assert_eq!(py_str("-7 // 2"), "-4");
        assert_eq!(py_str("7 / 2"), "3.5");
        assert_eq!(py_str("2 ** -1"), "0.5");
        assert_eq!(py_str("1 and 2"), "2");
        assert_eq!(py_str("0 or 2"), "2");
        assert_eq!(py_str("0 and undefined_name"), "0");
        assert_eq!(py_str("1 if True else 2"), "1");
        assert_eq!(py_str("3 in [1, 2, 3]"), "True");
        assert_eq!(py_str("'b' not in 'abc'"), "False");
        assert_eq!(py_str("None is None"), "True");
        assert_eq!(py_str("1 < 2 and 'a' < 'b'"), "True");
        assert_eq!(py_str("6 || 3"), "7");
        assert_eq!(py_str("{1, 2} & {2, 3}"), "{2}");
    }

    #[test]
    fn test_python_collections_and_calls() {
        assert_eq!(py_str("{}"), "{}");
        assert_eq!(py_str("list()"), "[]");
        assert_eq!(py_str("(1,)"), "(1,)");
        assert_eq!(py_str("[1, 2, 3][::-1]"), "[3, 2, 1]");
        assert_eq!(py_str("'hello'[1:3]"), "el");
        assert_eq!(py_str("len(range(5))"), "5");
        assert_eq!(py_str("{'a': 1}.items()"), "[('a', 1)]");
        assert_eq!(py_str("'a,b'.split(',')"), "['a', 'b']");
        assert!(eval_in(Mode::Python, "{[1]: 2}", &[]).is_err());
        let err = eval_in(Mode::Python, "1(2)", &[]).unwrap_err();
        assert_eq!(err.message(), "'int' object is not callable");
    }

    #[test]
    fn test_member_resolution() {
        let point = Value::from_object(Point);
        let dict = py("{'x': 3}");
        for base in [point, dict] {
            let v = eval_in(Mode::Python, "p.x", &[("p", base.clone())]).unwrap();
            assert_eq!(v, Value::Int(3));
            assert!(eval_in(Mode::Python, "p.y", &[("p", base)]).is_err());
        }
        let list = Value::from(vec![10, 20]);
        assert_eq!(
            eval_in(Mode::Python, "l.1", &[("l", list.clone())]).unwrap(),
            Value::Int(20)
        );
        assert_eq!(
            eval_in(Mode::Standard, "l.size", &[("l", list.clone())]).unwrap(),
            Value::Int(2)
        );
        assert_eq!(
            eval_in(Mode::Standard, "l.last", &[("l", list.clone())]).unwrap(),
            Value::Int(20)
        );
        assert!(eval_in(Mode::Python, "l.size", &[("l", list)]).is_err());
        let err = eval_in(Mode::Python, "{}.a", &[]).unwrap_err();
        assert_eq!(err.message(), "'dict' object has no attribute 'a'");
    }

    #[test]
    fn test_standard_semantics() {
        let liquid = |src: &str, vars: &[(&str, Value)]| eval_in(Mode::Standard, src, vars).unwrap();
        assert_eq!(liquid("1 and 2", &[]), Value::Bool(true));
        assert_eq!(liquid("nil or false", &[]), Value::Bool(false));
        assert_eq!(liquid("0 and ''", &[]), Value::Bool(true));
        assert_eq!(liquid("'abc' contains 'b'", &[]), Value::Bool(true));
        assert_eq!(liquid("nil contains 'b'", &[]), Value::Bool(false));
        assert_eq!(liquid("'a1' contains 1", &[]), Value::Bool(true));
        assert_eq!(liquid("x == empty", &[("x", Value::List(vec![]))]), Value::Bool(true));
        assert_eq!(liquid("x != empty", &[("x", "a".into())]), Value::Bool(true));
        assert_eq!(liquid("nil > 0", &[]), Value::Bool(false));
        assert_eq!(liquid("(1..3)", &[]), Value::from(vec![1, 2, 3]));
        assert_eq!(liquid("empty", &[]), Value::from(""));
    }

    #[test]
    fn test_filters() {
        assert_eq!(py_str("'abc' | upper"), "ABC");
        assert_eq!(py_str("[1, 2] | join: '-'"), "1-2");
        assert_eq!(py_str("'5' | int | plus(1)"), "6");
        let err = eval_in(Mode::Python, "1 | no_such_filter", &[]).unwrap_err();
        assert_eq!(err.message(), "No such filter: 'no_such_filter'");
        // scope callables act as filters in the python dialect
        assert_eq!(py_str("[3, 1] | sorted"), "[1, 3]");
        assert!(eval_in(Mode::Standard, "x | sorted", &[("x", Value::List(vec![]))]).is_err());
    }

    #[test]
    fn test_missing_name() {
        for mode in [Mode::Python, Mode::Standard] {
            let err = eval_in(mode, "nope", &[]).unwrap_err();
            assert_eq!(err.message(), "name 'nope' is not defined");
        }
    }
}
