//! Runtime values.

use std::fmt;

use crate::error::RuntimeError;

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Unit,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl Value {
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Unit => "unit",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
        }
    }

    /// Numeric view for mixed int/float arithmetic, `None` otherwise.
    fn as_f64(&self) -> Option<f64> {
        match self {
            #[allow(clippy::cast_precision_loss)]
            Value::Int(v) => Some(*v as f64),
            Value::Float(v) => Some(*v),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Unit => write!(f, "()"),
            Value::Bool(v) => write!(f, "{v}"),
            Value::Int(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Str(v) => write!(f, "{v}"),
        }
    }
}

fn mismatch(op: &str, lhs: &Value, rhs: &Value) -> RuntimeError {
    RuntimeError::TypeMismatch(format!(
        "cannot apply `{op}` to {} and {}",
        lhs.type_name(),
        rhs.type_name()
    ))
}

/// `+` concatenates when either side is a string, otherwise adds numbers.
pub(crate) fn add(lhs: &Value, rhs: &Value) -> Result<Value, RuntimeError> {
    match (lhs, rhs) {
        (Value::Str(a), b) => Ok(Value::Str(format!("{a}{b}"))),
        (a, Value::Str(b)) => Ok(Value::Str(format!("{a}{b}"))),
        (Value::Int(a), Value::Int(b)) => a
            .checked_add(*b)
            .map(Value::Int)
            .ok_or(RuntimeError::IntegerOverflow("+")),
        _ => match (lhs.as_f64(), rhs.as_f64()) {
            (Some(a), Some(b)) => Ok(Value::Float(a + b)),
            _ => Err(mismatch("+", lhs, rhs)),
        },
    }
}

pub(crate) fn sub(lhs: &Value, rhs: &Value) -> Result<Value, RuntimeError> {
    match (lhs, rhs) {
        (Value::Int(a), Value::Int(b)) => a
            .checked_sub(*b)
            .map(Value::Int)
            .ok_or(RuntimeError::IntegerOverflow("-")),
        _ => match (lhs.as_f64(), rhs.as_f64()) {
            (Some(a), Some(b)) => Ok(Value::Float(a - b)),
            _ => Err(mismatch("-", lhs, rhs)),
        },
    }
}

pub(crate) fn mul(lhs: &Value, rhs: &Value) -> Result<Value, RuntimeError> {
    match (lhs, rhs) {
        (Value::Int(a), Value::Int(b)) => a
            .checked_mul(*b)
            .map(Value::Int)
            .ok_or(RuntimeError::IntegerOverflow("*")),
        _ => match (lhs.as_f64(), rhs.as_f64()) {
            (Some(a), Some(b)) => Ok(Value::Float(a * b)),
            _ => Err(mismatch("*", lhs, rhs)),
        },
    }
}

pub(crate) fn div(lhs: &Value, rhs: &Value) -> Result<Value, RuntimeError> {
    match (lhs, rhs) {
        (Value::Int(_), Value::Int(0)) => Err(RuntimeError::DivisionByZero),
        (Value::Int(a), Value::Int(b)) => a
            .checked_div(*b)
            .map(Value::Int)
            .ok_or(RuntimeError::IntegerOverflow("/")),
        _ => match (lhs.as_f64(), rhs.as_f64()) {
            (Some(a), Some(b)) => Ok(Value::Float(a / b)),
            _ => Err(mismatch("/", lhs, rhs)),
        },
    }
}

pub(crate) fn rem(lhs: &Value, rhs: &Value) -> Result<Value, RuntimeError> {
    match (lhs, rhs) {
        (Value::Int(_), Value::Int(0)) => Err(RuntimeError::ModuloByZero),
        (Value::Int(a), Value::Int(b)) => a
            .checked_rem(*b)
            .map(Value::Int)
            .ok_or(RuntimeError::IntegerOverflow("%")),
        _ => match (lhs.as_f64(), rhs.as_f64()) {
            (Some(a), Some(b)) => Ok(Value::Float(a % b)),
            _ => Err(mismatch("%", lhs, rhs)),
        },
    }
}

/// `==`: same-type comparison; int/float pairs compare numerically;
/// any other cross-type pair is simply unequal.
pub(crate) fn eq(lhs: &Value, rhs: &Value) -> bool {
    match (lhs, rhs) {
        #[allow(clippy::cast_precision_loss, clippy::float_cmp)]
        (Value::Int(a), Value::Float(b)) | (Value::Float(b), Value::Int(a)) => (*a as f64) == *b,
        _ => lhs == rhs,
    }
}

/// Ordering comparisons: numbers with numbers, strings with strings.
pub(crate) fn compare(op: &str, lhs: &Value, rhs: &Value) -> Result<std::cmp::Ordering, RuntimeError> {
    match (lhs, rhs) {
        (Value::Int(a), Value::Int(b)) => Ok(a.cmp(b)),
        (Value::Str(a), Value::Str(b)) => Ok(a.cmp(b)),
        _ => match (lhs.as_f64(), rhs.as_f64()) {
            (Some(a), Some(b)) => a.partial_cmp(&b).ok_or_else(|| {
                RuntimeError::TypeMismatch(format!("cannot order {a} and {b} with `{op}`"))
            }),
            _ => Err(mismatch(op, lhs, rhs)),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(Value::Int(2).to_string(), "2");
        assert_eq!(Value::Str("hi".to_string()).to_string(), "hi");
        assert_eq!(Value::Bool(true).to_string(), "true");
        assert_eq!(Value::Unit.to_string(), "()");
    }

    #[test]
    fn test_string_concat_with_numbers() {
        let v = add(&Value::Str("n=".to_string()), &Value::Int(3)).expect("add");
        assert_eq!(v, Value::Str("n=3".to_string()));
    }

    #[test]
    fn test_mixed_arithmetic_promotes() {
        let v = add(&Value::Int(1), &Value::Float(0.5)).expect("add");
        assert_eq!(v, Value::Float(1.5));
    }

    #[test]
    fn test_integer_division_by_zero() {
        assert_eq!(div(&Value::Int(1), &Value::Int(0)), Err(RuntimeError::DivisionByZero));
    }

    #[test]
    fn test_cross_type_equality_is_false() {
        assert!(!eq(&Value::Int(1), &Value::Str("1".to_string())));
        assert!(eq(&Value::Int(1), &Value::Float(1.0)));
    }

    #[test]
    fn test_bool_ordering_rejected() {
        assert!(compare("<", &Value::Bool(true), &Value::Bool(false)).is_err());
    }
}
