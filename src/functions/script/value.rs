//! Value semantics for transform scripts
//!
//! Runtime values are plain JSON values. Integers are `i64` with checked
//! arithmetic; any float operand promotes the operation to `f64`.

use std::cmp::Ordering;

use serde_json::{Number, Value};

use super::ast::BinaryOp;

/// Upper bound on array length and string bytes produced by a script
pub const MAX_COLLECTION_LEN: usize = 1_000_000;

/// Upper bound on array/object nesting produced by a script
pub const MAX_VALUE_DEPTH: usize = 128;

/// Failure of a value operation
#[derive(Debug, Clone, PartialEq)]
pub enum OpError {
    /// Type errors, overflow, division by zero
    Invalid(String),
    /// A collection grew past `MAX_COLLECTION_LEN`
    TooLarge(String),
}

/// Nesting depth of a value; scalars are 0
pub fn depth(value: &Value) -> usize {
    match value {
        Value::Array(items) => 1 + items.iter().map(depth).max().unwrap_or(0),
        Value::Object(map) => 1 + map.values().map(depth).max().unwrap_or(0),
        _ => 0,
    }
}

pub type OpResult<T> = Result<T, OpError>;

fn invalid<T>(msg: impl Into<String>) -> OpResult<T> {
    Err(OpError::Invalid(msg.into()))
}

pub fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(n) if n.is_f64() => "float",
        Value::Number(_) => "int",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

pub fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => match n.as_i64() {
            Some(i) => i != 0,
            None => n.as_f64().map_or(false, |f| f != 0.0),
        },
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

/// Numeric view of a value
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Num {
    Int(i64),
    Float(f64),
}

impl Num {
    pub fn of(value: &Value) -> Option<Num> {
        let n = match value {
            Value::Number(n) => n,
            _ => return None,
        };
        if let Some(i) = n.as_i64() {
            Some(Num::Int(i))
        } else {
            n.as_f64().map(Num::Float)
        }
    }

    pub fn as_f64(self) -> f64 {
        match self {
            Num::Int(i) => i as f64,
            Num::Float(f) => f,
        }
    }
}

pub fn int(i: i64) -> Value {
    Value::from(i)
}

pub fn float(f: f64) -> OpResult<Value> {
    Number::from_f64(f)
        .map(Value::Number)
        .ok_or_else(|| OpError::Invalid(format!("non-finite result {}", f)))
}

/// Structural equality; numbers compare by value across int and float
pub fn equals(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(_), Value::Number(_)) => match (Num::of(a), Num::of(b)) {
            (Some(Num::Int(x)), Some(Num::Int(y))) => x == y,
            (Some(x), Some(y)) => x.as_f64() == y.as_f64(),
            _ => false,
        },
        (Value::Array(x), Value::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(p, q)| equals(p, q))
        }
        (Value::Object(x), Value::Object(y)) => {
            x.len() == y.len()
                && x
                    .iter()
                    .all(|(k, v)| y.get(k).map_or(false, |w| equals(v, w)))
        }
        _ => a == b,
    }
}

/// Ordering for `<`, `<=`, `>`, `>=`: numbers with numbers, strings with strings
pub fn compare(a: &Value, b: &Value) -> OpResult<Ordering> {
    match (a, b) {
        (Value::String(x), Value::String(y)) => Ok(x.cmp(y)),
        _ => match (Num::of(a), Num::of(b)) {
            (Some(Num::Int(x)), Some(Num::Int(y))) => Ok(x.cmp(&y)),
            (Some(x), Some(y)) => x
                .as_f64()
                .partial_cmp(&y.as_f64())
                .ok_or_else(|| OpError::Invalid("cannot compare NaN".into())),
            _ => invalid(format!(
                "cannot compare {} with {}",
                type_name(a),
                type_name(b)
            )),
        },
    }
}

/// Arithmetic and comparison operators; `&&` and `||` are handled by the caller
pub fn binary(op: BinaryOp, a: &Value, b: &Value) -> OpResult<Value> {
    match op {
        BinaryOp::Eq => Ok(Value::Bool(equals(a, b))),
        BinaryOp::Ne => Ok(Value::Bool(!equals(a, b))),
        BinaryOp::Lt => Ok(Value::Bool(compare(a, b)? == Ordering::Less)),
        BinaryOp::Le => Ok(Value::Bool(compare(a, b)? != Ordering::Greater)),
        BinaryOp::Gt => Ok(Value::Bool(compare(a, b)? == Ordering::Greater)),
        BinaryOp::Ge => Ok(Value::Bool(compare(a, b)? != Ordering::Less)),
        BinaryOp::Add => add(a, b),
        BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem => arithmetic(op, a, b),
        BinaryOp::And | BinaryOp::Or => Ok(Value::Bool(truthy(a) && truthy(b))),
    }
}

fn add(a: &Value, b: &Value) -> OpResult<Value> {
    match (a, b) {
        (Value::String(x), Value::String(y)) => {
            if x.len() + y.len() > MAX_COLLECTION_LEN {
                return Err(OpError::TooLarge("string".into()));
            }
            Ok(Value::String(format!("{}{}", x, y)))
        }
        (Value::Array(x), Value::Array(y)) => {
            if x.len() + y.len() > MAX_COLLECTION_LEN {
                return Err(OpError::TooLarge("array".into()));
            }
            let mut joined = x.clone();
            joined.extend(y.iter().cloned());
            Ok(Value::Array(joined))
        }
        _ => arithmetic(BinaryOp::Add, a, b),
    }
}

fn arithmetic(op: BinaryOp, a: &Value, b: &Value) -> OpResult<Value> {
    let (x, y) = match (Num::of(a), Num::of(b)) {
        (Some(x), Some(y)) => (x, y),
        _ => {
            return invalid(format!(
                "unsupported operand types for {}: {} and {}",
                op.symbol(),
                type_name(a),
                type_name(b)
            ))
        }
    };

    if op == BinaryOp::Div {
        if y.as_f64() == 0.0 {
            return invalid("division by zero");
        }
        return float(x.as_f64() / y.as_f64());
    }

    match (x, y) {
        (Num::Int(x), Num::Int(y)) => {
            let result = match op {
                BinaryOp::Add => x.checked_add(y),
                BinaryOp::Sub => x.checked_sub(y),
                BinaryOp::Mul => x.checked_mul(y),
                BinaryOp::Rem => {
                    if y == 0 {
                        return invalid("modulo by zero");
                    }
                    x.checked_rem(y)
                }
                _ => None,
            };
            result
                .map(int)
                .ok_or_else(|| OpError::Invalid(format!("integer overflow in {}", op.symbol())))
        }
        (x, y) => {
            let (x, y) = (x.as_f64(), y.as_f64());
            let result = match op {
                BinaryOp::Add => x + y,
                BinaryOp::Sub => x - y,
                BinaryOp::Mul => x * y,
                BinaryOp::Rem => {
                    if y == 0.0 {
                        return invalid("modulo by zero");
                    }
                    x % y
                }
                _ => return invalid(format!("unsupported operator {}", op.symbol())),
            };
            float(result)
        }
    }
}

pub fn negate(value: &Value) -> OpResult<Value> {
    match Num::of(value) {
        Some(Num::Int(i)) => i
            .checked_neg()
            .map(int)
            .ok_or_else(|| OpError::Invalid("integer overflow in negation".into())),
        Some(Num::Float(f)) => float(-f),
        None => invalid(format!("cannot negate {}", type_name(value))),
    }
}

/// Text form used by `str()` and string keys
pub fn display(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_truthiness() {
        for falsy in [json!(null), json!(false), json!(0), json!(0.0), json!(""), json!([]), json!({})] {
            assert!(!truthy(&falsy), "{} should be falsy", falsy);
        }
        for truthy_value in [json!(1), json!("a"), json!([0]), json!({"a": null}), json!(true)] {
            assert!(truthy(&truthy_value));
        }
    }

    #[test]
    fn test_depth() {
        assert_eq!(depth(&json!(1)), 0);
        assert_eq!(depth(&json!([])), 1);
        assert_eq!(depth(&json!([{"a": [1]}, 2])), 3);
    }

    #[test]
    fn test_integer_arithmetic() {
        assert_eq!(binary(BinaryOp::Mul, &json!(3), &json!(2)).unwrap(), json!(6));
        assert_eq!(binary(BinaryOp::Rem, &json!(7), &json!(3)).unwrap(), json!(1));
        assert!(binary(BinaryOp::Add, &json!(i64::MAX), &json!(1)).is_err());
        assert!(binary(BinaryOp::Rem, &json!(1), &json!(0)).is_err());
    }

    #[test]
    fn test_division_is_float() {
        assert_eq!(binary(BinaryOp::Div, &json!(6), &json!(3)).unwrap(), json!(2.0));
        assert!(binary(BinaryOp::Div, &json!(1), &json!(0)).is_err());
    }

    #[test]
    fn test_concatenation() {
        assert_eq!(binary(BinaryOp::Add, &json!("a"), &json!("b")).unwrap(), json!("ab"));
        assert_eq!(
            binary(BinaryOp::Add, &json!([1]), &json!([2])).unwrap(),
            json!([1, 2])
        );
        assert!(binary(BinaryOp::Add, &json!("a"), &json!(1)).is_err());
    }

    #[test]
    fn test_numeric_equality() {
        assert!(equals(&json!(1), &json!(1.0)));
        assert!(equals(&json!({"a": [1]}), &json!({"a": [1.0]})));
        assert!(!equals(&json!("1"), &json!(1)));
    }

    #[test]
    fn test_comparison_types() {
        assert_eq!(compare(&json!(1), &json!(2.5)).unwrap(), Ordering::Less);
        assert_eq!(compare(&json!("b"), &json!("a")).unwrap(), Ordering::Greater);
        assert!(compare(&json!(1), &json!("a")).is_err());
    }
}
