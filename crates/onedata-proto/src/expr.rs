//! Predicate AST over the columns of a single managed table.
//!
//! A predicate is a tree of [`Expr`] nodes. Comparisons sit at the leaves of
//! the logical structure and compare column references against values:
//!
//! ```
//! use onedata_proto::expr::col;
//!
//! let adults_named_joe = col("Age").gt(30).and(col("Name").eq("Joe"));
//! ```
//!
//! [`Expr::Capture`] holds a value that is only resolved when the predicate
//! is translated, which lets callers close over variables that change
//! between executions of the same predicate.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::parameter::Parameter;
use crate::value::Value;

/// A node in a predicate tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Expr {
    /// Reference to a column of the queried table.
    Column(String),
    /// A constant value.
    Literal(Value),
    /// A value resolved lazily at translation time.
    #[serde(skip)]
    Capture(Capture),
    /// Unary arithmetic on a value.
    Unary { op: UnaryOp, operand: Box<Expr> },
    /// Logical negation.
    Not(Box<Expr>),
    /// Binary operator node.
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    /// Scalar function call over values.
    Call { function: Function, args: Vec<Expr> },
}

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinaryOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    BitAnd,
    BitOr,
    LeftShift,
    RightShift,
}

impl BinaryOp {
    /// Check if this operator compares two operands.
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOp::Eq | BinaryOp::Ne | BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge
        )
    }

    /// Check if this operator combines two predicates.
    pub fn is_logical(self) -> bool {
        matches!(self, BinaryOp::And | BinaryOp::Or)
    }

    /// Check if this operator is arithmetic.
    pub fn is_arithmetic(self) -> bool {
        matches!(
            self,
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod
        )
    }

    /// Check if this operator works on bits.
    pub fn is_bitwise(self) -> bool {
        matches!(
            self,
            BinaryOp::BitAnd | BinaryOp::BitOr | BinaryOp::LeftShift | BinaryOp::RightShift
        )
    }

    /// The operator with its operands swapped (`a < b` is `b > a`).
    pub fn flipped(self) -> Self {
        match self {
            BinaryOp::Lt => BinaryOp::Gt,
            BinaryOp::Le => BinaryOp::Ge,
            BinaryOp::Gt => BinaryOp::Lt,
            BinaryOp::Ge => BinaryOp::Le,
            other => other,
        }
    }
}

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOp {
    Negate,
    Plus,
}

/// Scalar functions that can be folded into a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Function {
    Upper,
    Lower,
    Trim,
    Length,
    Concat,
}

/// A deferred value, resolved each time the predicate is translated.
#[derive(Clone)]
pub struct Capture {
    label: String,
    resolve: Arc<dyn Fn() -> Value + Send + Sync>,
}

impl Capture {
    pub fn new<F>(label: impl Into<String>, resolve: F) -> Self
    where
        F: Fn() -> Value + Send + Sync + 'static,
    {
        Self {
            label: label.into(),
            resolve: Arc::new(resolve),
        }
    }

    /// The name the capture was created with.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Resolve the current value.
    pub fn evaluate(&self) -> Value {
        (self.resolve)()
    }
}

impl fmt::Debug for Capture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Capture").field("label", &self.label).finish()
    }
}

/// Reference a column.
pub fn col(name: impl Into<String>) -> Expr {
    Expr::Column(name.into())
}

/// A literal value.
pub fn lit(value: impl Into<Value>) -> Expr {
    Expr::Literal(value.into())
}

/// A value resolved at translation time.
pub fn capture<F>(label: impl Into<String>, resolve: F) -> Expr
where
    F: Fn() -> Value + Send + Sync + 'static,
{
    Expr::Capture(Capture::new(label, resolve))
}

/// Call a scalar function.
pub fn call(function: Function, args: Vec<Expr>) -> Expr {
    Expr::Call { function, args }
}

#[allow(clippy::should_implement_trait)]
impl Expr {
    fn binary(self, op: BinaryOp, right: impl Into<Expr>) -> Expr {
        Expr::Binary {
            op,
            left: Box::new(self),
            right: Box::new(right.into()),
        }
    }

    pub fn eq(self, right: impl Into<Expr>) -> Expr {
        self.binary(BinaryOp::Eq, right)
    }

    pub fn ne(self, right: impl Into<Expr>) -> Expr {
        self.binary(BinaryOp::Ne, right)
    }

    pub fn lt(self, right: impl Into<Expr>) -> Expr {
        self.binary(BinaryOp::Lt, right)
    }

    pub fn le(self, right: impl Into<Expr>) -> Expr {
        self.binary(BinaryOp::Le, right)
    }

    pub fn gt(self, right: impl Into<Expr>) -> Expr {
        self.binary(BinaryOp::Gt, right)
    }

    pub fn ge(self, right: impl Into<Expr>) -> Expr {
        self.binary(BinaryOp::Ge, right)
    }

    pub fn and(self, right: impl Into<Expr>) -> Expr {
        self.binary(BinaryOp::And, right)
    }

    pub fn or(self, right: impl Into<Expr>) -> Expr {
        self.binary(BinaryOp::Or, right)
    }

    pub fn add(self, right: impl Into<Expr>) -> Expr {
        self.binary(BinaryOp::Add, right)
    }

    pub fn sub(self, right: impl Into<Expr>) -> Expr {
        self.binary(BinaryOp::Sub, right)
    }

    pub fn mul(self, right: impl Into<Expr>) -> Expr {
        self.binary(BinaryOp::Mul, right)
    }

    pub fn div(self, right: impl Into<Expr>) -> Expr {
        self.binary(BinaryOp::Div, right)
    }

    pub fn rem(self, right: impl Into<Expr>) -> Expr {
        self.binary(BinaryOp::Mod, right)
    }

    pub fn bit_and(self, right: impl Into<Expr>) -> Expr {
        self.binary(BinaryOp::BitAnd, right)
    }

    pub fn shl(self, right: impl Into<Expr>) -> Expr {
        self.binary(BinaryOp::LeftShift, right)
    }

    pub fn negate(self) -> Expr {
        Expr::Unary {
            op: UnaryOp::Negate,
            operand: Box::new(self),
        }
    }

    pub fn not(self) -> Expr {
        Expr::Not(Box::new(self))
    }

    pub fn is_null(self) -> Expr {
        self.eq(Value::Null)
    }

    pub fn is_not_null(self) -> Expr {
        self.ne(Value::Null)
    }

    /// Build the conjunction of `name = value` for every parameter, in order.
    ///
    /// Returns `None` for an empty list.
    pub fn from_parameters(parameters: &[Parameter]) -> Option<Expr> {
        parameters
            .iter()
            .map(|p| col(p.name.clone()).eq(p.value.clone()))
            .reduce(|acc, next| acc.and(next))
    }

    /// Names of every column referenced anywhere in the tree, in visit order.
    pub fn columns(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_columns(&mut out);
        out
    }

    fn collect_columns<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Expr::Column(name) => out.push(name),
            Expr::Literal(_) | Expr::Capture(_) => {}
            Expr::Unary { operand, .. } => operand.collect_columns(out),
            Expr::Not(inner) => inner.collect_columns(out),
            Expr::Binary { left, right, .. } => {
                left.collect_columns(out);
                right.collect_columns(out);
            }
            Expr::Call { args, .. } => {
                for arg in args {
                    arg.collect_columns(out);
                }
            }
        }
    }
}

impl From<Value> for Expr {
    fn from(v: Value) -> Self {
        Expr::Literal(v)
    }
}

macro_rules! literal_from {
    ($($t:ty),*) => {
        $(
            impl From<$t> for Expr {
                fn from(v: $t) -> Self {
                    Expr::Literal(v.into())
                }
            }
        )*
    };
}

literal_from!(bool, i8, u8, i16, u16, i32, u32, i64, f32, f64, char, String, &str, Vec<u8>, [u8; 16]);
