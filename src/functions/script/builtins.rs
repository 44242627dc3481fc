//! Built-in functions
//!
//! Every built-in is pure: arguments are values, the result is a new value.
//! `push` returns the extended array rather than mutating its argument.

use serde_json::Value;

use super::value::{
    compare, display, equals, float, int, type_name, Num, OpError, MAX_COLLECTION_LEN,
};

/// Names resolved as built-ins before user functions
pub const BUILTINS: &[&str] = &[
    "len", "push", "keys", "values", "contains", "get", "str", "int", "float", "abs", "min",
    "max", "round", "floor", "ceil", "upper", "lower", "range", "sum", "type_of", "error",
];

/// Outcome of a built-in call
#[derive(Debug, Clone, PartialEq)]
pub enum BuiltinError {
    Op(OpError),
    /// Raised by `error(msg)`
    Raised(String),
}

impl From<OpError> for BuiltinError {
    fn from(e: OpError) -> Self {
        BuiltinError::Op(e)
    }
}

pub fn is_builtin(name: &str) -> bool {
    BUILTINS.contains(&name)
}

fn invalid<T>(msg: impl Into<String>) -> Result<T, BuiltinError> {
    Err(BuiltinError::Op(OpError::Invalid(msg.into())))
}

fn arity(name: &str, args: &[Value], min: usize, max: usize) -> Result<(), BuiltinError> {
    if args.len() < min || args.len() > max {
        let expected = if min == max {
            min.to_string()
        } else {
            format!("{} to {}", min, max)
        };
        return invalid(format!(
            "{}() takes {} argument(s), got {}",
            name,
            expected,
            args.len()
        ));
    }
    Ok(())
}

fn number(name: &str, value: &Value) -> Result<Num, BuiltinError> {
    Num::of(value).map_or_else(
        || invalid(format!("{}() expects a number, got {}", name, type_name(value))),
        Ok,
    )
}

fn string<'a>(name: &str, value: &'a Value) -> Result<&'a str, BuiltinError> {
    value.as_str().map_or_else(
        || invalid(format!("{}() expects a string, got {}", name, type_name(value))),
        Ok,
    )
}

fn float_to_int(name: &str, f: f64) -> Result<Value, BuiltinError> {
    if !f.is_finite() || f < i64::MIN as f64 || f >= i64::MAX as f64 {
        return invalid(format!("{}() result out of integer range", name));
    }
    Ok(int(f as i64))
}

/// Call built-in `name`
pub fn call(name: &str, args: Vec<Value>) -> Result<Value, BuiltinError> {
    match name {
        "len" => {
            arity(name, &args, 1, 1)?;
            let len = match &args[0] {
                Value::String(s) => s.chars().count(),
                Value::Array(a) => a.len(),
                Value::Object(o) => o.len(),
                other => return invalid(format!("len() of {}", type_name(other))),
            };
            Ok(int(len as i64))
        }
        "push" => {
            arity(name, &args, 2, 2)?;
            let mut args = args.into_iter();
            match (args.next(), args.next()) {
                (Some(Value::Array(mut items)), Some(item)) => {
                    if items.len() >= MAX_COLLECTION_LEN {
                        return Err(OpError::TooLarge("array".into()).into());
                    }
                    items.push(item);
                    Ok(Value::Array(items))
                }
                (Some(other), _) => invalid(format!("push() expects an array, got {}", type_name(&other))),
                _ => invalid("push() takes 2 argument(s)"),
            }
        }
        "keys" | "values" => {
            arity(name, &args, 1, 1)?;
            match &args[0] {
                Value::Object(o) if name == "keys" => {
                    Ok(Value::Array(o.keys().cloned().map(Value::String).collect()))
                }
                Value::Object(o) => Ok(Value::Array(o.values().cloned().collect())),
                other => invalid(format!("{}() expects an object, got {}", name, type_name(other))),
            }
        }
        "contains" => {
            arity(name, &args, 2, 2)?;
            let found = match (&args[0], &args[1]) {
                (Value::Array(items), needle) => items.iter().any(|v| equals(v, needle)),
                (Value::Object(o), Value::String(key)) => o.contains_key(key),
                (Value::String(s), Value::String(sub)) => s.contains(sub.as_str()),
                (haystack, needle) => {
                    return invalid(format!(
                        "contains() cannot search {} for {}",
                        type_name(haystack),
                        type_name(needle)
                    ))
                }
            };
            Ok(Value::Bool(found))
        }
        "get" => {
            arity(name, &args, 2, 3)?;
            let default = args.get(2).cloned().unwrap_or(Value::Null);
            let found = match (&args[0], &args[1]) {
                (Value::Object(o), Value::String(key)) => o.get(key).cloned(),
                (Value::Array(items), index) => match Num::of(index) {
                    Some(Num::Int(i)) if i >= 0 => items.get(i as usize).cloned(),
                    _ => None,
                },
                (Value::Null, _) => None,
                (container, _) => {
                    return invalid(format!("get() on {}", type_name(container)))
                }
            };
            Ok(found.unwrap_or(default))
        }
        "str" => {
            arity(name, &args, 1, 1)?;
            Ok(Value::String(display(&args[0])))
        }
        "int" => {
            arity(name, &args, 1, 1)?;
            match &args[0] {
                Value::Bool(b) => Ok(int(*b as i64)),
                Value::String(s) => match s.trim().parse::<i64>() {
                    Ok(i) => Ok(int(i)),
                    Err(_) => invalid(format!("int() cannot parse \"{}\"", s)),
                },
                other => match number(name, other)? {
                    Num::Int(i) => Ok(int(i)),
                    Num::Float(f) => float_to_int(name, f.trunc()),
                },
            }
        }
        "float" => {
            arity(name, &args, 1, 1)?;
            match &args[0] {
                Value::String(s) => match s.trim().parse::<f64>() {
                    Ok(f) => Ok(float(f)?),
                    Err(_) => invalid(format!("float() cannot parse \"{}\"", s)),
                },
                other => Ok(float(number(name, other)?.as_f64())?),
            }
        }
        "abs" => {
            arity(name, &args, 1, 1)?;
            match number(name, &args[0])? {
                Num::Int(i) => i
                    .checked_abs()
                    .map(int)
                    .map_or_else(|| invalid("abs() integer overflow"), Ok),
                Num::Float(f) => Ok(float(f.abs())?),
            }
        }
        "min" | "max" => extreme(name, args),
        "round" => {
            arity(name, &args, 1, 2)?;
            let x = number(name, &args[0])?;
            match args.get(1) {
                None => match x {
                    Num::Int(i) => Ok(int(i)),
                    Num::Float(f) => float_to_int(name, f.round()),
                },
                Some(digits) => {
                    let digits = match Num::of(digits) {
                        Some(Num::Int(d)) if (0..=15).contains(&d) => d as i32,
                        _ => return invalid("round() digits must be an integer from 0 to 15"),
                    };
                    let scale = 10f64.powi(digits);
                    Ok(float((x.as_f64() * scale).round() / scale)?)
                }
            }
        }
        "floor" | "ceil" => {
            arity(name, &args, 1, 1)?;
            match number(name, &args[0])? {
                Num::Int(i) => Ok(int(i)),
                Num::Float(f) if name == "floor" => float_to_int(name, f.floor()),
                Num::Float(f) => float_to_int(name, f.ceil()),
            }
        }
        "upper" => {
            arity(name, &args, 1, 1)?;
            Ok(Value::String(string(name, &args[0])?.to_uppercase()))
        }
        "lower" => {
            arity(name, &args, 1, 1)?;
            Ok(Value::String(string(name, &args[0])?.to_lowercase()))
        }
        "range" => range(args),
        "sum" => {
            arity(name, &args, 1, 1)?;
            let items = match &args[0] {
                Value::Array(items) => items,
                other => return invalid(format!("sum() expects an array, got {}", type_name(other))),
            };
            let mut total = Num::Int(0);
            for item in items {
                total = match (total, number(name, item)?) {
                    (Num::Int(a), Num::Int(b)) => match a.checked_add(b) {
                        Some(s) => Num::Int(s),
                        None => return invalid("sum() integer overflow"),
                    },
                    (a, b) => Num::Float(a.as_f64() + b.as_f64()),
                };
            }
            match total {
                Num::Int(i) => Ok(int(i)),
                Num::Float(f) => Ok(float(f)?),
            }
        }
        "type_of" => {
            arity(name, &args, 1, 1)?;
            Ok(Value::String(type_name(&args[0]).to_string()))
        }
        "error" => {
            arity(name, &args, 0, 1)?;
            let message = args.first().map(display).unwrap_or_else(|| "error() called".into());
            Err(BuiltinError::Raised(message))
        }
        _ => invalid(format!("unknown built-in '{}'", name)),
    }
}

fn extreme(name: &str, args: Vec<Value>) -> Result<Value, BuiltinError> {
    let items = match args.as_slice() {
        [] => return invalid(format!("{}() takes at least 1 argument", name)),
        [Value::Array(items)] => items.clone(),
        _ => args,
    };
    let mut iter = items.into_iter();
    let mut best = match iter.next() {
        Some(first) => first,
        None => return invalid(format!("{}() of an empty array", name)),
    };
    for item in iter {
        let ordering = compare(&item, &best)?;
        let better = if name == "min" {
            ordering.is_lt()
        } else {
            ordering.is_gt()
        };
        if better {
            best = item;
        }
    }
    Ok(best)
}

fn range(args: Vec<Value>) -> Result<Value, BuiltinError> {
    arity("range", &args, 1, 3)?;
    let mut bounds = Vec::with_capacity(args.len());
    for arg in &args {
        match Num::of(arg) {
            Some(Num::Int(i)) => bounds.push(i),
            _ => return invalid(format!("range() expects integers, got {}", type_name(arg))),
        }
    }
    let (start, stop, step) = match bounds.as_slice() {
        [stop] => (0, *stop, 1),
        [start, stop] => (*start, *stop, 1),
        [start, stop, step] => (*start, *stop, *step),
        _ => return invalid("range() takes 1 to 3 argument(s)"),
    };
    if step == 0 {
        return invalid("range() step must not be zero");
    }

    let span = (stop as i128 - start as i128).max(0) as u128;
    let span = if step > 0 {
        span
    } else {
        (start as i128 - stop as i128).max(0) as u128
    };
    let len = span.div_ceil(step.unsigned_abs() as u128);
    if len > MAX_COLLECTION_LEN as u128 {
        return Err(OpError::TooLarge("range".into()).into());
    }

    let mut items = Vec::with_capacity(len as usize);
    let mut current = start as i128;
    for _ in 0..len {
        items.push(int(current as i64));
        current += step as i128;
    }
    Ok(Value::Array(items))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn run(name: &str, args: Vec<Value>) -> Value {
        call(name, args).unwrap()
    }

    #[test]
    fn test_collections() {
        assert_eq!(run("len", vec![json!([1, 2, 3])]), json!(3));
        assert_eq!(run("len", vec![json!("héllo")]), json!(5));
        assert_eq!(run("push", vec![json!([1]), json!(2)]), json!([1, 2]));
        assert_eq!(run("keys", vec![json!({"b": 1, "a": 2})]).as_array().unwrap().len(), 2);
        assert_eq!(run("contains", vec![json!([1, 2]), json!(2.0)]), json!(true));
        assert_eq!(run("contains", vec![json!({"a": 1}), json!("a")]), json!(true));
        assert_eq!(run("get", vec![json!({"a": 1}), json!("b"), json!(0)]), json!(0));
    }

    #[test]
    fn test_conversions() {
        assert_eq!(run("str", vec![json!(5)]), json!("5"));
        assert_eq!(run("int", vec![json!("42")]), json!(42));
        assert_eq!(run("int", vec![json!(3.9)]), json!(3));
        assert_eq!(run("float", vec![json!(2)]), json!(2.0));
        assert!(call("int", vec![json!("x")]).is_err());
    }

    #[test]
    fn test_math() {
        assert_eq!(run("abs", vec![json!(-3)]), json!(3));
        assert_eq!(run("min", vec![json!(3), json!(1), json!(2)]), json!(1));
        assert_eq!(run("max", vec![json!([3, 7, 2])]), json!(7));
        assert_eq!(run("round", vec![json!(2.5)]), json!(3));
        assert_eq!(run("round", vec![json!(2.346), json!(2)]), json!(2.35));
        assert_eq!(run("floor", vec![json!(-1.5)]), json!(-2));
        assert_eq!(run("ceil", vec![json!(1.2)]), json!(2));
        assert_eq!(run("sum", vec![json!([1, 2, 3])]), json!(6));
        assert_eq!(run("sum", vec![json!([1, 0.5])]), json!(1.5));
    }

    #[test]
    fn test_range() {
        assert_eq!(run("range", vec![json!(3)]), json!([0, 1, 2]));
        assert_eq!(run("range", vec![json!(5), json!(0), json!(-2)]), json!([5, 3, 1]));
        assert_eq!(run("range", vec![json!(3), json!(1)]), json!([]));
        assert!(matches!(
            call("range", vec![json!(i64::MAX)]),
            Err(BuiltinError::Op(OpError::TooLarge(_)))
        ));
    }

    #[test]
    fn test_error_raises() {
        assert_eq!(
            call("error", vec![json!("bad row")]),
            Err(BuiltinError::Raised("bad row".into()))
        );
    }

    #[test]
    fn test_arity_checked() {
        assert!(call("len", vec![]).is_err());
        assert!(call("upper", vec![json!(1)]).is_err());
    }
}
