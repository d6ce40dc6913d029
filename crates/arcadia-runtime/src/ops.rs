//! Per-kind operation dispatch
//!
//! Arithmetic, comparison, and logic opcodes resolve their operands and
//! then dispatch on the **first** operand's dynamic kind. Each kind
//! supports a subset of the operation slots; a missing slot fails with a
//! type error, and a second operand of a different kind is a mismatch.
//! Integer add/subtract/multiply/negate wrap in two's complement; divide
//! checks for a zero divisor first.

use crate::value::{RuntimeError, Value};

/// Two-operand operation selector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    And,
    Or,
    Concatenate,
    EqualTo,
    NotEqualTo,
    LowerThan,
    LowerThanOrEqualTo,
    GreaterThan,
    GreaterThanOrEqualTo,
}

/// One-operand operation selector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Negate,
    Not,
}

fn unsupported(op: impl std::fmt::Debug, kind: &str) -> RuntimeError {
    RuntimeError::TypeInvalid {
        msg: format!("operation {:?} is not supported for {}", op, kind),
    }
}

fn mismatch(op: impl std::fmt::Debug, expected: &str, actual: &str) -> RuntimeError {
    RuntimeError::TypeInvalid {
        msg: format!(
            "operation {:?} on {} requires a {} second operand, got {}",
            op, expected, expected, actual
        ),
    }
}

/// Integer and Size kinds: wrapping arithmetic, full comparison set.
/// And/Or/Not and Concatenate slots are absent for these kinds.
macro_rules! integer_binary {
    ($variant:ident, $x:expr, $op:expr, $b:expr) => {{
        let x = $x;
        match ($op, $b) {
            (BinaryOp::Add, Value::$variant(y)) => Ok(Value::$variant(x.wrapping_add(*y))),
            (BinaryOp::Subtract, Value::$variant(y)) => Ok(Value::$variant(x.wrapping_sub(*y))),
            (BinaryOp::Multiply, Value::$variant(y)) => Ok(Value::$variant(x.wrapping_mul(*y))),
            (BinaryOp::Divide, Value::$variant(y)) => {
                if *y == 0 {
                    Err(RuntimeError::DivisionByZero)
                } else {
                    Ok(Value::$variant(x.wrapping_div(*y)))
                }
            }
            (BinaryOp::EqualTo, Value::$variant(y)) => Ok(Value::Boolean(x == *y)),
            (BinaryOp::NotEqualTo, Value::$variant(y)) => Ok(Value::Boolean(x != *y)),
            (BinaryOp::LowerThan, Value::$variant(y)) => Ok(Value::Boolean(x < *y)),
            (BinaryOp::LowerThanOrEqualTo, Value::$variant(y)) => Ok(Value::Boolean(x <= *y)),
            (BinaryOp::GreaterThan, Value::$variant(y)) => Ok(Value::Boolean(x > *y)),
            (BinaryOp::GreaterThanOrEqualTo, Value::$variant(y)) => Ok(Value::Boolean(x >= *y)),
            (BinaryOp::And | BinaryOp::Or | BinaryOp::Concatenate, _) => {
                Err(unsupported($op, stringify!($variant)))
            }
            (_, other) => Err(mismatch($op, stringify!($variant), other.kind_name())),
        }
    }};
}

/// Real kinds: IEEE arithmetic with a checked zero divisor, full
/// comparison set.
macro_rules! real_binary {
    ($variant:ident, $x:expr, $op:expr, $b:expr) => {{
        let x = $x;
        match ($op, $b) {
            (BinaryOp::Add, Value::$variant(y)) => Ok(Value::$variant(x + *y)),
            (BinaryOp::Subtract, Value::$variant(y)) => Ok(Value::$variant(x - *y)),
            (BinaryOp::Multiply, Value::$variant(y)) => Ok(Value::$variant(x * *y)),
            (BinaryOp::Divide, Value::$variant(y)) => {
                if *y == 0.0 {
                    Err(RuntimeError::DivisionByZero)
                } else {
                    Ok(Value::$variant(x / *y))
                }
            }
            (BinaryOp::EqualTo, Value::$variant(y)) => Ok(Value::Boolean(x == *y)),
            (BinaryOp::NotEqualTo, Value::$variant(y)) => Ok(Value::Boolean(x != *y)),
            (BinaryOp::LowerThan, Value::$variant(y)) => Ok(Value::Boolean(x < *y)),
            (BinaryOp::LowerThanOrEqualTo, Value::$variant(y)) => Ok(Value::Boolean(x <= *y)),
            (BinaryOp::GreaterThan, Value::$variant(y)) => Ok(Value::Boolean(x > *y)),
            (BinaryOp::GreaterThanOrEqualTo, Value::$variant(y)) => Ok(Value::Boolean(x >= *y)),
            (BinaryOp::And | BinaryOp::Or | BinaryOp::Concatenate, _) => {
                Err(unsupported($op, stringify!($variant)))
            }
            (_, other) => Err(mismatch($op, stringify!($variant), other.kind_name())),
        }
    }};
}

/// Evaluate a two-operand operation, dispatching on the first operand's kind
pub fn binary(op: BinaryOp, a: &Value, b: &Value) -> Result<Value, RuntimeError> {
    match a {
        Value::Boolean(x) => boolean_binary(op, *x, b),
        Value::Integer8(x) => integer_binary!(Integer8, *x, op, b),
        Value::Integer16(x) => integer_binary!(Integer16, *x, op, b),
        Value::Integer32(x) => integer_binary!(Integer32, *x, op, b),
        Value::Integer64(x) => integer_binary!(Integer64, *x, op, b),
        Value::Natural8(x) => integer_binary!(Natural8, *x, op, b),
        Value::Natural16(x) => integer_binary!(Natural16, *x, op, b),
        Value::Natural32(x) => integer_binary!(Natural32, *x, op, b),
        Value::Natural64(x) => integer_binary!(Natural64, *x, op, b),
        Value::Size(x) => integer_binary!(Size, *x, op, b),
        Value::Real32(x) => real_binary!(Real32, *x, op, b),
        Value::Real64(x) => real_binary!(Real64, *x, op, b),
        Value::String(x) => string_binary(op, x, b),
        Value::Void => void_binary(op, b),
        Value::Object(object) => object
            .binary(op, b)
            .unwrap_or_else(|| Err(unsupported(op, object.type_name()))),
        Value::Procedure(_) | Value::Foreign(_) => Err(unsupported(op, a.kind_name())),
    }
}

/// Evaluate a one-operand operation, dispatching on the operand's kind
pub fn unary(op: UnaryOp, a: &Value) -> Result<Value, RuntimeError> {
    match (op, a) {
        (UnaryOp::Negate, Value::Integer8(x)) => Ok(Value::Integer8(x.wrapping_neg())),
        (UnaryOp::Negate, Value::Integer16(x)) => Ok(Value::Integer16(x.wrapping_neg())),
        (UnaryOp::Negate, Value::Integer32(x)) => Ok(Value::Integer32(x.wrapping_neg())),
        (UnaryOp::Negate, Value::Integer64(x)) => Ok(Value::Integer64(x.wrapping_neg())),
        (UnaryOp::Negate, Value::Real32(x)) => Ok(Value::Real32(-x)),
        (UnaryOp::Negate, Value::Real64(x)) => Ok(Value::Real64(-x)),
        (UnaryOp::Not, Value::Boolean(x)) => Ok(Value::Boolean(!x)),
        (_, Value::Object(object)) => object
            .unary(op)
            .unwrap_or_else(|| Err(unsupported(op, object.type_name()))),
        _ => Err(unsupported(op, a.kind_name())),
    }
}

fn boolean_binary(op: BinaryOp, x: bool, b: &Value) -> Result<Value, RuntimeError> {
    match (op, b) {
        (BinaryOp::And, Value::Boolean(y)) => Ok(Value::Boolean(x && *y)),
        (BinaryOp::Or, Value::Boolean(y)) => Ok(Value::Boolean(x || *y)),
        (BinaryOp::EqualTo, Value::Boolean(y)) => Ok(Value::Boolean(x == *y)),
        (BinaryOp::NotEqualTo, Value::Boolean(y)) => Ok(Value::Boolean(x != *y)),
        (
            BinaryOp::And | BinaryOp::Or | BinaryOp::EqualTo | BinaryOp::NotEqualTo,
            other,
        ) => Err(mismatch(op, "Boolean", other.kind_name())),
        _ => Err(unsupported(op, "Boolean")),
    }
}

fn string_binary(op: BinaryOp, x: &str, b: &Value) -> Result<Value, RuntimeError> {
    let y = match b {
        Value::String(y) => y.as_ref(),
        other => {
            return match op {
                BinaryOp::Concatenate
                | BinaryOp::EqualTo
                | BinaryOp::NotEqualTo
                | BinaryOp::LowerThan
                | BinaryOp::LowerThanOrEqualTo
                | BinaryOp::GreaterThan
                | BinaryOp::GreaterThanOrEqualTo => Err(mismatch(op, "String", other.kind_name())),
                _ => Err(unsupported(op, "String")),
            }
        }
    };
    match op {
        BinaryOp::Concatenate => {
            let mut joined = String::with_capacity(x.len() + y.len());
            joined.push_str(x);
            joined.push_str(y);
            Ok(Value::string(joined))
        }
        BinaryOp::EqualTo => Ok(Value::Boolean(x == y)),
        BinaryOp::NotEqualTo => Ok(Value::Boolean(x != y)),
        BinaryOp::LowerThan => Ok(Value::Boolean(x < y)),
        BinaryOp::LowerThanOrEqualTo => Ok(Value::Boolean(x <= y)),
        BinaryOp::GreaterThan => Ok(Value::Boolean(x > y)),
        BinaryOp::GreaterThanOrEqualTo => Ok(Value::Boolean(x >= y)),
        _ => Err(unsupported(op, "String")),
    }
}

fn void_binary(op: BinaryOp, b: &Value) -> Result<Value, RuntimeError> {
    match op {
        BinaryOp::EqualTo => Ok(Value::Boolean(matches!(b, Value::Void))),
        BinaryOp::NotEqualTo => Ok(Value::Boolean(!matches!(b, Value::Void))),
        _ => Err(unsupported(op, "Void")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_integer64_add() {
        let result = binary(BinaryOp::Add, &Value::Integer64(3), &Value::Integer64(4)).unwrap();
        assert_eq!(result, Value::Integer64(7));
    }

    #[test]
    fn test_integer_arithmetic_wraps() {
        let result = binary(
            BinaryOp::Add,
            &Value::Natural8(0xFF),
            &Value::Natural8(1),
        )
        .unwrap();
        assert_eq!(result, Value::Natural8(0));
        assert_eq!(
            unary(UnaryOp::Negate, &Value::Integer8(i8::MIN)).unwrap(),
            Value::Integer8(i8::MIN)
        );
    }

    #[test]
    fn test_divide_by_zero() {
        let result = binary(
            BinaryOp::Divide,
            &Value::Natural8(9),
            &Value::Natural8(0),
        );
        assert_eq!(result, Err(RuntimeError::DivisionByZero));
        let result = binary(BinaryOp::Divide, &Value::Real64(1.0), &Value::Real64(0.0));
        assert_eq!(result, Err(RuntimeError::DivisionByZero));
    }

    #[test]
    fn test_dispatch_keyed_on_first_operand() {
        // First operand selects the kind; a differing second operand is a
        // mismatch rather than a coercion.
        let result = binary(BinaryOp::Add, &Value::Integer64(1), &Value::Natural8(1));
        assert!(matches!(result, Err(RuntimeError::TypeInvalid { .. })));
    }

    #[test]
    fn test_boolean_logic() {
        assert_eq!(
            binary(BinaryOp::And, &Value::Boolean(true), &Value::Boolean(false)).unwrap(),
            Value::Boolean(false)
        );
        assert_eq!(
            binary(BinaryOp::Or, &Value::Boolean(true), &Value::Boolean(false)).unwrap(),
            Value::Boolean(true)
        );
        assert_eq!(
            unary(UnaryOp::Not, &Value::Boolean(true)).unwrap(),
            Value::Boolean(false)
        );
    }

    #[test]
    fn test_boolean_has_no_arithmetic_slot() {
        let result = binary(BinaryOp::Add, &Value::Boolean(true), &Value::Boolean(true));
        assert!(matches!(result, Err(RuntimeError::TypeInvalid { .. })));
    }

    #[test]
    fn test_string_concatenate_and_ordering() {
        assert_eq!(
            binary(
                BinaryOp::Concatenate,
                &Value::string("ab"),
                &Value::string("cd")
            )
            .unwrap(),
            Value::string("abcd")
        );
        assert_eq!(
            binary(
                BinaryOp::LowerThan,
                &Value::string("abc"),
                &Value::string("abd")
            )
            .unwrap(),
            Value::Boolean(true)
        );
    }

    #[derive(Debug)]
    struct Opaque;

    impl crate::value::ObjectType for Opaque {
        fn type_name(&self) -> &str {
            "Opaque"
        }

        fn unary(&self, op: UnaryOp) -> Option<Result<Value, RuntimeError>> {
            match op {
                UnaryOp::Not => Some(Ok(Value::Boolean(false))),
                UnaryOp::Negate => None,
            }
        }
    }

    #[test]
    fn test_object_operand_dispatches_through_trait() {
        let object = Value::Object(std::sync::Arc::new(Opaque));
        assert_eq!(unary(UnaryOp::Not, &object).unwrap(), Value::Boolean(false));
        // Absent slots fail like a null table entry
        assert!(matches!(
            unary(UnaryOp::Negate, &object),
            Err(RuntimeError::TypeInvalid { .. })
        ));
        assert!(matches!(
            binary(BinaryOp::Add, &object, &Value::Void),
            Err(RuntimeError::TypeInvalid { .. })
        ));
    }

    #[test]
    fn test_void_equality() {
        assert_eq!(
            binary(BinaryOp::EqualTo, &Value::Void, &Value::Void).unwrap(),
            Value::Boolean(true)
        );
        assert_eq!(
            binary(BinaryOp::EqualTo, &Value::Void, &Value::Integer64(0)).unwrap(),
            Value::Boolean(false)
        );
    }

    #[test]
    fn test_comparisons() {
        assert_eq!(
            binary(
                BinaryOp::LowerThan,
                &Value::Integer32(1),
                &Value::Integer32(2)
            )
            .unwrap(),
            Value::Boolean(true)
        );
        assert_eq!(
            binary(
                BinaryOp::GreaterThanOrEqualTo,
                &Value::Size(5),
                &Value::Size(5)
            )
            .unwrap(),
            Value::Boolean(true)
        );
        assert_eq!(
            binary(
                BinaryOp::NotEqualTo,
                &Value::Real32(1.5),
                &Value::Real32(2.5)
            )
            .unwrap(),
            Value::Boolean(true)
        );
    }
}
