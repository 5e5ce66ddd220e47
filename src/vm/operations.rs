// Binary and unary operations on script values

use std::cmp::Ordering;

use crate::common::error::{ErrorType, LangError};
use crate::common::value::Value;

/// `=`, `+=`, `-=`, `*=`, `/=`, `&=`
pub fn is_assignment(op: &str) -> bool {
    matches!(op, "=" | "+=" | "-=" | "*=" | "/=" | "&=")
}

/// Binary operator behind a compound assignment (`+=` -> `+`)
pub fn compound_base(op: &str) -> Option<&'static str> {
    match op {
        "+=" => Some("+"),
        "-=" => Some("-"),
        "*=" => Some("*"),
        "/=" => Some("/"),
        "&=" => Some("&"),
        _ => None,
    }
}

pub fn binary_op(op: &str, left: Value, right: Value, line: usize) -> Result<Value, LangError> {
    match op {
        "&" => Ok(Value::String(format!("{}{}", left, right))),
        "+" | "-" | "*" | "/" => arithmetic(op, &left, &right, line),
        "=" => Ok(Value::Bool(loose_equals(&left, &right))),
        "==" => Ok(Value::Bool(left.to_string() == right.to_string())),
        "<>" => Ok(Value::Bool(!loose_equals(&left, &right))),
        "<" => Ok(Value::Bool(compare(&left, &right) == Ordering::Less)),
        ">" => Ok(Value::Bool(compare(&left, &right) == Ordering::Greater)),
        "<=" => Ok(Value::Bool(compare(&left, &right) != Ordering::Greater)),
        ">=" => Ok(Value::Bool(compare(&left, &right) != Ordering::Less)),
        _ => Err(LangError::runtime_error_with_type(
            format!("unexpected operator {} in expression", op),
            line,
            ErrorType::SyntaxError,
        )),
    }
}

fn arithmetic(op: &str, left: &Value, right: &Value, line: usize) -> Result<Value, LangError> {
    // Integer operands keep full i64 precision while the result fits
    if let (Value::Number(a), Value::Number(b)) = (left, right) {
        let exact = match op {
            "+" => a.checked_add(*b),
            "-" => a.checked_sub(*b),
            "*" => a.checked_mul(*b),
            _ => None,
        };
        if let Some(n) = exact {
            return Ok(Value::Number(n));
        }
    }

    let (a, b) = (left.as_number(), right.as_number());
    let result = match op {
        "+" => a + b,
        "-" => a - b,
        "*" => a * b,
        _ => {
            if b == 0.0 {
                return Err(LangError::runtime_error_with_type(
                    "division by zero",
                    line,
                    ErrorType::TypeError,
                ));
            }
            a / b
        }
    };
    Ok(Value::from_f64(result))
}

pub fn negate(value: &Value) -> Value {
    match value {
        Value::Number(n) => match n.checked_neg() {
            Some(negated) => Value::Number(negated),
            None => Value::Double(-(*n as f64)),
        },
        other => Value::from_f64(-other.as_number()),
    }
}

/// `=`: numbers compare numerically, everything else as case-insensitive text
pub fn loose_equals(left: &Value, right: &Value) -> bool {
    if left.is_numeric() && right.is_numeric() {
        return left.as_number() == right.as_number();
    }
    left.to_string().to_lowercase() == right.to_string().to_lowercase()
}

/// Ordering for `<`, `>`, `<=`, `>=` and `Case x To y`: numeric when either
/// side is a number, case-insensitive text otherwise
pub fn compare(left: &Value, right: &Value) -> Ordering {
    if left.is_numeric() || right.is_numeric() {
        return left
            .as_number()
            .partial_cmp(&right.as_number())
            .unwrap_or(Ordering::Equal);
    }
    left.to_string().to_lowercase().cmp(&right.to_string().to_lowercase())
}
