//! Eager evaluation of operand sub-expressions.
//!
//! Arithmetic, bitwise, unary and method-call operands are folded to a
//! concrete value before translation. They may only involve literals and
//! captures; a column inside such an operand cannot be rendered and is
//! rejected.

use onedata_proto::{BinaryOp, Expr, Function, UnaryOp, Value};

use crate::error::{Error, Result};

/// Fold an operand to a value.
pub fn fold(expr: &Expr) -> Result<Value> {
    match expr {
        Expr::Literal(value) => Ok(value.clone()),
        Expr::Capture(capture) => Ok(capture.evaluate()),
        Expr::Column(name) => Err(Error::UnsupportedExpression(format!(
            "column {name} cannot be evaluated as a constant"
        ))),
        Expr::Unary { op, operand } => unary(*op, fold(operand)?),
        Expr::Binary { op, left, right } if op.is_arithmetic() || op.is_bitwise() => {
            binary(*op, fold(left)?, fold(right)?)
        }
        Expr::Binary { op, .. } => Err(Error::UnsupportedExpression(format!(
            "{op:?} cannot be used as an operand"
        ))),
        Expr::Not(_) => Err(Error::UnsupportedExpression(
            "NOT cannot be used as an operand".into(),
        )),
        Expr::Call { function, args } => {
            let args = args.iter().map(fold).collect::<Result<Vec<_>>>()?;
            method(*function, args)
        }
    }
}

fn overflow(op: impl std::fmt::Debug) -> Error {
    Error::UnsupportedExpression(format!("{op:?} overflows"))
}

fn mismatch(op: impl std::fmt::Debug, left: &Value, right: &Value) -> Error {
    Error::UnsupportedExpression(format!(
        "{op:?} is not defined for {} and {}",
        left.type_name(),
        right.type_name()
    ))
}

fn unary(op: UnaryOp, value: Value) -> Result<Value> {
    match (op, value) {
        (_, Value::Null) => Ok(Value::Null),
        (UnaryOp::Plus, v @ (Value::Int32(_) | Value::Int64(_) | Value::Float32(_) | Value::Float64(_))) => Ok(v),
        (UnaryOp::Negate, Value::Int32(i)) => i.checked_neg().map(Value::Int32).ok_or_else(|| overflow(op)),
        (UnaryOp::Negate, Value::Int64(i)) => i.checked_neg().map(Value::Int64).ok_or_else(|| overflow(op)),
        (UnaryOp::Negate, Value::Float32(f)) => Ok(Value::Float32(-f)),
        (UnaryOp::Negate, Value::Float64(f)) => Ok(Value::Float64(-f)),
        (_, other) => Err(Error::UnsupportedExpression(format!(
            "{op:?} is not defined for {}",
            other.type_name()
        ))),
    }
}

/// Integer results stay 32-bit when both operands are and the result fits.
fn narrow(both_i32: bool, result: i64) -> Value {
    match i32::try_from(result) {
        Ok(small) if both_i32 => Value::Int32(small),
        _ => Value::Int64(result),
    }
}

fn is_integer(value: &Value) -> bool {
    matches!(value, Value::Int32(_) | Value::Int64(_))
}

fn is_float(value: &Value) -> bool {
    matches!(value, Value::Float32(_) | Value::Float64(_))
}

fn binary(op: BinaryOp, left: Value, right: Value) -> Result<Value> {
    if left.is_null() || right.is_null() {
        return Ok(Value::Null);
    }

    if let (BinaryOp::Add, Value::String(l), Value::String(r)) = (op, &left, &right) {
        return Ok(Value::String(format!("{l}{r}")));
    }

    if is_integer(&left) && is_integer(&right) {
        let both_i32 = matches!((&left, &right), (Value::Int32(_), Value::Int32(_)));
        let (Some(l), Some(r)) = (left.as_i64(), right.as_i64()) else {
            return Err(mismatch(op, &left, &right));
        };
        let result = match op {
            BinaryOp::Add => l.checked_add(r),
            BinaryOp::Sub => l.checked_sub(r),
            BinaryOp::Mul => l.checked_mul(r),
            BinaryOp::Div | BinaryOp::Mod if r == 0 => {
                return Err(Error::UnsupportedExpression("division by zero".into()))
            }
            BinaryOp::Div => l.checked_div(r),
            BinaryOp::Mod => l.checked_rem(r),
            BinaryOp::BitAnd => Some(l & r),
            BinaryOp::BitOr => Some(l | r),
            BinaryOp::LeftShift => u32::try_from(r).ok().and_then(|s| l.checked_shl(s)),
            BinaryOp::RightShift => u32::try_from(r).ok().and_then(|s| l.checked_shr(s)),
            _ => return Err(mismatch(op, &left, &right)),
        };
        return result.map(|v| narrow(both_i32, v)).ok_or_else(|| overflow(op));
    }

    let numeric = (is_integer(&left) || is_float(&left)) && (is_integer(&right) || is_float(&right));
    if numeric && op.is_arithmetic() {
        let (Some(l), Some(r)) = (left.as_f64(), right.as_f64()) else {
            return Err(mismatch(op, &left, &right));
        };
        let result = match op {
            BinaryOp::Add => l + r,
            BinaryOp::Sub => l - r,
            BinaryOp::Mul => l * r,
            BinaryOp::Div if r == 0.0 => {
                return Err(Error::UnsupportedExpression("division by zero".into()))
            }
            BinaryOp::Div => l / r,
            BinaryOp::Mod => l % r,
            _ => return Err(mismatch(op, &left, &right)),
        };
        return Ok(Value::Float64(result));
    }

    Err(mismatch(op, &left, &right))
}

fn text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.key_string(),
    }
}

fn method(function: Function, args: Vec<Value>) -> Result<Value> {
    if function == Function::Concat {
        // CONCAT treats NULL as the empty string.
        let joined: String = args.iter().filter(|v| !v.is_null()).map(text).collect();
        return Ok(Value::String(joined));
    }

    let [arg] = args.as_slice() else {
        return Err(Error::UnsupportedExpression(format!(
            "{function:?} takes one argument, got {}",
            args.len()
        )));
    };
    let Some(s) = arg.as_str() else {
        return match arg {
            Value::Null => Ok(Value::Null),
            other => Err(Error::UnsupportedExpression(format!(
                "{function:?} is not defined for {}",
                other.type_name()
            ))),
        };
    };
    Ok(match function {
        Function::Upper => Value::String(s.to_uppercase()),
        Function::Lower => Value::String(s.to_lowercase()),
        Function::Trim => Value::String(s.trim().to_string()),
        Function::Length => Value::Int32(i32::try_from(s.chars().count()).unwrap_or(i32::MAX)),
        Function::Concat => Value::String(s.to_string()),
    })
}
