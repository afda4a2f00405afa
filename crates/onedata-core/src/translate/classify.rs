//! Node classification.

use onedata_proto::{BinaryOp, Expr, Function};

/// The group a predicate node belongs to.
///
/// Only comparisons render directly. Logical nodes recurse into their
/// children; value, arithmetic, bitwise and method nodes are operands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeGroup {
    Comparison,
    Logical,
    Arithmetic,
    Bitwise,
    Value,
    Method,
    Unknown,
}

/// Classify a node.
pub fn classify(expr: &Expr) -> NodeGroup {
    match expr {
        Expr::Column(_) | Expr::Literal(_) | Expr::Capture(_) => NodeGroup::Value,
        Expr::Unary { .. } => NodeGroup::Arithmetic,
        Expr::Not(_) => NodeGroup::Logical,
        Expr::Binary { op, .. } => classify_op(*op),
        Expr::Call { function, args } if arity_matches(*function, args.len()) => NodeGroup::Method,
        Expr::Call { .. } => NodeGroup::Unknown,
    }
}

fn classify_op(op: BinaryOp) -> NodeGroup {
    if op.is_comparison() {
        NodeGroup::Comparison
    } else if op.is_logical() {
        NodeGroup::Logical
    } else if op.is_arithmetic() {
        NodeGroup::Arithmetic
    } else if op.is_bitwise() {
        NodeGroup::Bitwise
    } else {
        NodeGroup::Unknown
    }
}

fn arity_matches(function: Function, count: usize) -> bool {
    match function {
        Function::Upper | Function::Lower | Function::Trim | Function::Length => count == 1,
        Function::Concat => count >= 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use onedata_proto::{call, col, lit};

    #[test]
    fn test_classify() {
        assert_eq!(classify(&col("Age").gt(30)), NodeGroup::Comparison);
        assert_eq!(classify(&col("Age").gt(30).and(col("Age").lt(40))), NodeGroup::Logical);
        assert_eq!(classify(&col("Age").gt(30).not()), NodeGroup::Logical);
        assert_eq!(classify(&lit(1).add(2)), NodeGroup::Arithmetic);
        assert_eq!(classify(&lit(1).shl(2)), NodeGroup::Bitwise);
        assert_eq!(classify(&lit(1).negate()), NodeGroup::Arithmetic);
        assert_eq!(classify(&col("Age")), NodeGroup::Value);
        assert_eq!(classify(&call(Function::Upper, vec![lit("a")])), NodeGroup::Method);
        assert_eq!(classify(&call(Function::Upper, vec![])), NodeGroup::Unknown);
    }
}
