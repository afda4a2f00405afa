//! In-memory evaluation of compiled predicates against cached rows.
//!
//! Evaluation follows SQL semantics so a cached result set filters the same
//! way the database would: three-valued logic, numeric widening across
//! integer and floating point columns, `bit` columns equal to 0/1, and NULL
//! never comparing true except through IS NULL.

use std::cmp::Ordering;

use onedata_proto::{BinaryOp, Expr, Row, Value};

use super::predicate::{Operand, Predicate};
use crate::error::Result;

/// Filters rows with a compiled predicate.
#[derive(Debug, Clone)]
pub struct MemoryFilter {
    predicate: Predicate,
}

impl MemoryFilter {
    /// Compile an expression into a filter.
    pub fn compile(expr: &Expr) -> Result<Self> {
        Ok(Self {
            predicate: Predicate::compile(expr)?,
        })
    }

    pub fn new(predicate: Predicate) -> Self {
        Self { predicate }
    }

    pub fn predicate(&self) -> &Predicate {
        &self.predicate
    }

    /// Check if a row satisfies the predicate. Unknown counts as false.
    pub fn matches(&self, row: &Row) -> bool {
        evaluate(&self.predicate, row) == Some(true)
    }

    /// Matching rows, in input order.
    pub fn filter<'r>(&self, rows: impl IntoIterator<Item = &'r Row>) -> Vec<Row> {
        rows.into_iter()
            .filter(|row| self.matches(row))
            .cloned()
            .collect()
    }
}

/// Three-valued evaluation: `None` is SQL's UNKNOWN.
pub fn evaluate(predicate: &Predicate, row: &Row) -> Option<bool> {
    match predicate {
        Predicate::And(left, right) => match (evaluate(left, row), evaluate(right, row)) {
            (Some(false), _) | (_, Some(false)) => Some(false),
            (Some(true), Some(true)) => Some(true),
            _ => None,
        },
        Predicate::Or(left, right) => match (evaluate(left, row), evaluate(right, row)) {
            (Some(true), _) | (_, Some(true)) => Some(true),
            (Some(false), Some(false)) => Some(false),
            _ => None,
        },
        Predicate::Not(inner) => evaluate(inner, row).map(|b| !b),
        Predicate::Null { operand, negated } => {
            let is_null = resolve(operand, row).map_or(true, Value::is_null);
            Some(is_null != *negated)
        }
        Predicate::Compare { op, left, right } => {
            let left = resolve(left, row)?;
            let right = resolve(right, row)?;
            if left.is_null() || right.is_null() {
                return None;
            }
            match op {
                BinaryOp::Eq => values_equal(left, right),
                BinaryOp::Ne => values_equal(left, right).map(|eq| !eq),
                BinaryOp::Lt => compare_values(left, right).map(Ordering::is_lt),
                BinaryOp::Le => compare_values(left, right).map(Ordering::is_le),
                BinaryOp::Gt => compare_values(left, right).map(Ordering::is_gt),
                BinaryOp::Ge => compare_values(left, right).map(Ordering::is_ge),
                _ => None,
            }
        }
    }
}

/// A missing column evaluates as NULL.
fn resolve<'a>(operand: &'a Operand, row: &'a Row) -> Option<&'a Value> {
    match operand {
        Operand::Column(name) => row.get(name),
        Operand::Value(value) => Some(value),
    }
}

/// Equality of two non-null values; `None` when they are not comparable.
pub fn values_equal(a: &Value, b: &Value) -> Option<bool> {
    match (a, b) {
        (Value::Bool(a), Value::Bool(b)) => Some(a == b),
        (Value::String(a), Value::String(b)) => Some(a == b),
        (Value::Bytes(a), Value::Bytes(b)) => Some(a == b),
        (Value::Timestamp(a), Value::Timestamp(b)) => Some(a == b),
        (Value::Uuid(a), Value::Uuid(b)) => Some(a == b),
        _ => compare_values(a, b).map(Ordering::is_eq),
    }
}

/// Ordering of two non-null values; `None` when they are not comparable.
pub fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Int32(_) | Value::Int64(_), Value::Int32(_) | Value::Int64(_)) => {
            Some(a.as_i64()?.cmp(&b.as_i64()?))
        }
        (
            Value::Int32(_) | Value::Int64(_) | Value::Float32(_) | Value::Float64(_),
            Value::Int32(_) | Value::Int64(_) | Value::Float32(_) | Value::Float64(_),
        ) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        // bit columns compare with 0 and 1
        (Value::Bool(x), Value::Int32(_) | Value::Int64(_)) => Some(i64::from(*x).cmp(&b.as_i64()?)),
        (Value::Int32(_) | Value::Int64(_), Value::Bool(y)) => Some(a.as_i64()?.cmp(&i64::from(*y))),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bytes(x), Value::Bytes(y)) => Some(x.cmp(y)),
        (Value::Timestamp(x), Value::Timestamp(y)) => Some(x.cmp(y)),
        (Value::Uuid(x), Value::Uuid(y)) => Some(x.cmp(y)),
        _ => None,
    }
}
