//! Expression evaluation over JSON values.

use std::cmp::Ordering;

use serde_json::Value;

use super::parser::{BinaryOp, Expr, UnaryOp};
use super::ExprError;
use crate::context::{descend, value_to_string};

pub(crate) fn evaluate(expr: &Expr, root: &Value) -> Result<Value, ExprError> {
    match expr {
        Expr::Literal(value) => Ok(value.clone()),
        Expr::Path(segments) => Ok(lookup(root, segments).cloned().unwrap_or(Value::Null)),
        Expr::Array(items) => items
            .iter()
            .map(|item| evaluate(item, root))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        Expr::Unary(op, inner) => {
            let value = evaluate(inner, root)?;
            match op {
                UnaryOp::Not => Ok(Value::Bool(!is_truthy(&value))),
                UnaryOp::Neg => {
                    let n = strict_number(&value, "-")?;
                    Ok(number_value(-n))
                }
            }
        }
        Expr::Binary(BinaryOp::And, left, right) => {
            if !is_truthy(&evaluate(left, root)?) {
                return Ok(Value::Bool(false));
            }
            Ok(Value::Bool(is_truthy(&evaluate(right, root)?)))
        }
        Expr::Binary(BinaryOp::Or, left, right) => {
            if is_truthy(&evaluate(left, root)?) {
                return Ok(Value::Bool(true));
            }
            Ok(Value::Bool(is_truthy(&evaluate(right, root)?)))
        }
        Expr::Binary(op, left, right) => {
            let left = evaluate(left, root)?;
            let right = evaluate(right, root)?;
            apply_binary(*op, &left, &right)
        }
    }
}

fn lookup<'a>(root: &'a Value, segments: &[String]) -> Option<&'a Value> {
    segments
        .iter()
        .try_fold(root, |current, segment| descend(current, segment))
}

fn apply_binary(op: BinaryOp, left: &Value, right: &Value) -> Result<Value, ExprError> {
    match op {
        BinaryOp::Eq => Ok(Value::Bool(values_equal(left, right))),
        BinaryOp::Ne => Ok(Value::Bool(!values_equal(left, right))),
        BinaryOp::Gt => compare(left, right).map(|o| Value::Bool(o == Ordering::Greater)),
        BinaryOp::Gte => compare(left, right).map(|o| Value::Bool(o != Ordering::Less)),
        BinaryOp::Lt => compare(left, right).map(|o| Value::Bool(o == Ordering::Less)),
        BinaryOp::Lte => compare(left, right).map(|o| Value::Bool(o != Ordering::Greater)),
        BinaryOp::In => Ok(Value::Bool(contains(right, left))),
        BinaryOp::Contains => Ok(Value::Bool(contains(left, right))),
        BinaryOp::Add => add(left, right),
        BinaryOp::Sub => arithmetic(left, right, "-", |a, b| Ok(a - b)),
        BinaryOp::Mul => arithmetic(left, right, "*", |a, b| Ok(a * b)),
        BinaryOp::Div => arithmetic(left, right, "/", |a, b| {
            if b == 0.0 {
                Err(ExprError::Eval("division by zero".to_string()))
            } else {
                Ok(a / b)
            }
        }),
        BinaryOp::Rem => arithmetic(left, right, "%", |a, b| {
            if b == 0.0 {
                Err(ExprError::Eval("division by zero".to_string()))
            } else {
                Ok(a % b)
            }
        }),
        BinaryOp::And => Ok(Value::Bool(is_truthy(left) && is_truthy(right))),
        BinaryOp::Or => Ok(Value::Bool(is_truthy(left) || is_truthy(right))),
    }
}

/// Check if a JSON value is truthy.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

/// Convert a JSON value to f64, coercing numeric strings, booleans and null.
pub fn value_to_f64(value: &Value) -> Result<f64, ExprError> {
    match value {
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| ExprError::Eval("invalid number".to_string())),
        Value::String(s) => s
            .trim()
            .parse()
            .map_err(|_| ExprError::Eval(format!("cannot parse '{}' as number", s))),
        Value::Bool(b) => Ok(if *b { 1.0 } else { 0.0 }),
        Value::Null => Ok(0.0),
        _ => Err(ExprError::Eval("cannot convert to number".to_string())),
    }
}

fn strict_number(value: &Value, op: &str) -> Result<f64, ExprError> {
    match value {
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| ExprError::Eval("invalid number".to_string())),
        other => Err(ExprError::Eval(format!(
            "operator '{}' expects numbers, got {}",
            op,
            type_name(other)
        ))),
    }
}

fn number_value(f: f64) -> Value {
    // Integral results stay integers so `1 + 2 == 3` holds structurally.
    if f.fract() == 0.0 && f.abs() < 9_007_199_254_740_992.0 {
        Value::from(f as i64)
    } else {
        serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null)
    }
}

fn values_equal(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => a.as_f64() == b.as_f64(),
        _ => left == right,
    }
}

fn compare(left: &Value, right: &Value) -> Result<Ordering, ExprError> {
    if let (Value::String(a), Value::String(b)) = (left, right) {
        return Ok(a.cmp(b));
    }
    let a = value_to_f64(left)?;
    let b = value_to_f64(right)?;
    a.partial_cmp(&b)
        .ok_or_else(|| ExprError::Eval("values are not comparable".to_string()))
}

fn contains(haystack: &Value, needle: &Value) -> bool {
    match haystack {
        Value::Array(items) => items.iter().any(|item| values_equal(item, needle)),
        Value::String(s) => needle.as_str().map(|n| s.contains(n)).unwrap_or(false),
        Value::Object(obj) => needle.as_str().map(|k| obj.contains_key(k)).unwrap_or(false),
        _ => false,
    }
}

fn add(left: &Value, right: &Value) -> Result<Value, ExprError> {
    match (left, right) {
        (Value::Number(_), Value::Number(_)) => {
            arithmetic(left, right, "+", |a, b| Ok(a + b))
        }
        (Value::String(_), _) | (_, Value::String(_)) => Ok(Value::String(format!(
            "{}{}",
            value_to_string(left),
            value_to_string(right)
        ))),
        (Value::Array(a), Value::Array(b)) => {
            Ok(Value::Array(a.iter().chain(b.iter()).cloned().collect()))
        }
        _ => Err(ExprError::Eval(format!(
            "operator '+' cannot combine {} and {}",
            type_name(left),
            type_name(right)
        ))),
    }
}

fn arithmetic<F>(left: &Value, right: &Value, op: &str, f: F) -> Result<Value, ExprError>
where
    F: Fn(f64, f64) -> Result<f64, ExprError>,
{
    let a = strict_number(left, op)?;
    let b = strict_number(right, op)?;
    f(a, b).map(number_value)
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_is_truthy() {
        assert!(!is_truthy(&Value::Null));
        assert!(!is_truthy(&json!(false)));
        assert!(is_truthy(&json!(true)));
        assert!(!is_truthy(&json!(0)));
        assert!(is_truthy(&json!(1)));
        assert!(!is_truthy(&json!("")));
        assert!(is_truthy(&json!("hello")));
        assert!(!is_truthy(&json!([])));
        assert!(is_truthy(&json!([1])));
        assert!(!is_truthy(&json!({})));
    }

    #[test]
    fn test_value_to_f64_coercion() {
        assert_eq!(value_to_f64(&json!("2.5")).unwrap(), 2.5);
        assert_eq!(value_to_f64(&json!(true)).unwrap(), 1.0);
        assert_eq!(value_to_f64(&Value::Null).unwrap(), 0.0);
        assert!(value_to_f64(&json!([1])).is_err());
    }

    #[test]
    fn test_numeric_equality_ignores_representation() {
        assert!(values_equal(&json!(1), &json!(1.0)));
        assert!(!values_equal(&json!(1), &json!("1")));
    }

    #[test]
    fn test_compare_strings_lexicographically() {
        assert_eq!(compare(&json!("apple"), &json!("banana")).unwrap(), Ordering::Less);
        assert_eq!(compare(&json!("10"), &json!(9)).unwrap(), Ordering::Greater);
        assert!(compare(&json!({}), &json!(1)).is_err());
    }

    #[test]
    fn test_arithmetic_type_errors() {
        assert!(apply_binary(BinaryOp::Sub, &json!("a"), &json!(1)).is_err());
        assert!(apply_binary(BinaryOp::Div, &json!(1), &json!(0)).is_err());
        assert!(add(&json!({}), &json!(1)).is_err());
        assert_eq!(add(&json!([1]), &json!([2])).unwrap(), json!([1, 2]));
        assert_eq!(add(&json!("n="), &json!(3)).unwrap(), json!("n=3"));
    }
}
