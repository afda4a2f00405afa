//! Compiled predicates.
//!
//! [`Predicate::compile`] classifies every node of an [`Expr`], resolves
//! captures and folds constant operands exactly once. Both the SQL renderer
//! and the in-memory filter work from the result, so they cannot disagree
//! on what a predicate means.

use onedata_proto::{BinaryOp, Expr, Parameter, Value};

use super::classify::{classify, NodeGroup};
use super::constant::fold;
use crate::error::{Error, Result};

/// One side of a comparison.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Column(String),
    Value(Value),
}

impl Operand {
    fn resolve(expr: &Expr) -> Result<Self> {
        match (classify(expr), expr) {
            (NodeGroup::Value, Expr::Column(name)) => Ok(Operand::Column(name.clone())),
            (NodeGroup::Value | NodeGroup::Arithmetic | NodeGroup::Bitwise | NodeGroup::Method, _) => {
                Ok(Operand::Value(fold(expr)?))
            }
            (group, _) => Err(Error::UnsupportedExpression(format!(
                "{group:?} node cannot be used as a comparison operand"
            ))),
        }
    }

    fn null_literal(&self) -> bool {
        matches!(self, Operand::Value(Value::Null))
    }
}

/// A translated boolean predicate.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    And(Box<Predicate>, Box<Predicate>),
    Or(Box<Predicate>, Box<Predicate>),
    Not(Box<Predicate>),
    /// `left op right`, `op` being a comparison.
    Compare {
        op: BinaryOp,
        left: Operand,
        right: Operand,
    },
    /// `operand IS [NOT] NULL`, from an (in)equality against a NULL literal.
    Null { operand: Operand, negated: bool },
}

impl Predicate {
    /// Compile an expression tree.
    ///
    /// Fails with [`Error::UnsupportedExpression`] when a node is not a
    /// predicate, an operand cannot be resolved, or an ordering comparison
    /// involves a NULL literal.
    pub fn compile(expr: &Expr) -> Result<Self> {
        match classify(expr) {
            NodeGroup::Logical => match expr {
                Expr::Not(inner) => Ok(Predicate::Not(Box::new(Self::compile(inner)?))),
                Expr::Binary {
                    op: BinaryOp::And,
                    left,
                    right,
                } => Ok(Predicate::And(
                    Box::new(Self::compile(left)?),
                    Box::new(Self::compile(right)?),
                )),
                Expr::Binary {
                    op: BinaryOp::Or,
                    left,
                    right,
                } => Ok(Predicate::Or(
                    Box::new(Self::compile(left)?),
                    Box::new(Self::compile(right)?),
                )),
                other => Err(Error::UnsupportedExpression(format!("{other:?}"))),
            },
            NodeGroup::Comparison => match expr {
                Expr::Binary { op, left, right } => Self::comparison(*op, left, right),
                other => Err(Error::UnsupportedExpression(format!("{other:?}"))),
            },
            group => Err(Error::UnsupportedExpression(format!(
                "{group:?} node is not a predicate"
            ))),
        }
    }

    fn comparison(op: BinaryOp, left: &Expr, right: &Expr) -> Result<Self> {
        let left = Operand::resolve(left)?;
        let right = Operand::resolve(right)?;

        let null_side = if right.null_literal() {
            Some(left.clone())
        } else if left.null_literal() {
            Some(right.clone())
        } else {
            None
        };
        match (null_side, op) {
            (Some(operand), BinaryOp::Eq) => Ok(Predicate::Null {
                operand,
                negated: false,
            }),
            (Some(operand), BinaryOp::Ne) => Ok(Predicate::Null {
                operand,
                negated: true,
            }),
            (Some(_), op) => Err(Error::UnsupportedExpression(format!(
                "{op:?} against NULL is never true"
            ))),
            (None, op) => Ok(Predicate::Compare { op, left, right }),
        }
    }

    /// `{column, value}` pairs of every column-versus-value comparison, in
    /// left-to-right order.
    pub fn parameters(&self) -> Vec<Parameter> {
        let mut out = Vec::new();
        self.collect_parameters(&mut out);
        out
    }

    fn collect_parameters(&self, out: &mut Vec<Parameter>) {
        match self {
            Predicate::And(left, right) | Predicate::Or(left, right) => {
                left.collect_parameters(out);
                right.collect_parameters(out);
            }
            Predicate::Not(inner) => inner.collect_parameters(out),
            Predicate::Compare { left, right, .. } => match (left, right) {
                (Operand::Column(name), Operand::Value(value))
                | (Operand::Value(value), Operand::Column(name)) => {
                    out.push(Parameter::new(name.clone(), value.clone()))
                }
                _ => {}
            },
            Predicate::Null {
                operand: Operand::Column(name),
                ..
            } => out.push(Parameter::new(name.clone(), Value::Null)),
            Predicate::Null { .. } => {}
        }
    }
}

/// Compile an expression and extract its parameters.
pub fn extract_parameters(expr: &Expr) -> Result<Vec<Parameter>> {
    Ok(Predicate::compile(expr)?.parameters())
}

#[cfg(test)]
mod tests {
    use super::*;
    use onedata_proto::{capture, col, lit};

    #[test]
    fn test_compile_keeps_tree_order() {
        let predicate = Predicate::compile(&col("Age").gt(30).and(col("Name").eq("Joe"))).unwrap();
        let Predicate::And(left, right) = predicate else {
            panic!("expected AND");
        };
        assert!(matches!(*left, Predicate::Compare { op: BinaryOp::Gt, .. }));
        assert!(matches!(*right, Predicate::Compare { op: BinaryOp::Eq, .. }));
    }

    #[test]
    fn test_null_comparisons() {
        assert_eq!(
            Predicate::compile(&col("Name").is_null()).unwrap(),
            Predicate::Null {
                operand: Operand::Column("Name".into()),
                negated: false
            }
        );
        assert!(matches!(
            Predicate::compile(&lit(Value::Null).ne(col("Name"))).unwrap(),
            Predicate::Null { negated: true, .. }
        ));
        assert!(matches!(
            Predicate::compile(&col("Age").gt(Value::Null)),
            Err(Error::UnsupportedExpression(_))
        ));
    }

    #[test]
    fn test_non_predicates_are_rejected() {
        for expr in [col("Active"), lit(true), lit(1).add(2), col("Age").add(1).gt(3)] {
            assert!(
                matches!(Predicate::compile(&expr), Err(Error::UnsupportedExpression(_))),
                "{expr:?}"
            );
        }
    }

    #[test]
    fn test_parameters_left_to_right() {
        let limit = capture("limit", || Value::Int32(40));
        let expr = col("Age")
            .gt(30)
            .and(lit("Joe").eq(col("Name")))
            .or(col("Age").lt(limit).not());
        let parameters = extract_parameters(&expr).unwrap();
        assert_eq!(
            parameters,
            vec![
                Parameter::new("Age", 30),
                Parameter::new("Name", "Joe"),
                Parameter::new("Age", 40),
            ]
        );
    }
}
