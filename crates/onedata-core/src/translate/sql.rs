//! SQL rendering of compiled predicates.

use onedata_proto::{BinaryOp, Expr};

use super::predicate::{Operand, Predicate};
use crate::dialect::SqlDialect;
use crate::error::{Error, Result};

/// Renders predicates as WHERE fragments for one dialect.
#[derive(Debug, Clone, Copy)]
pub struct SqlTranslator<'a> {
    dialect: &'a dyn SqlDialect,
    qualifier: Option<&'a str>,
}

impl<'a> SqlTranslator<'a> {
    pub fn new(dialect: &'a dyn SqlDialect) -> Self {
        Self {
            dialect,
            qualifier: None,
        }
    }

    /// Qualify column references with a table name (`Blog.Name`).
    pub fn with_qualifier(mut self, table: &'a str) -> Self {
        self.qualifier = Some(table);
        self
    }

    /// Compile and render an expression.
    pub fn translate(&self, expr: &Expr) -> Result<String> {
        self.render(&Predicate::compile(expr)?)
    }

    /// Render a compiled predicate.
    pub fn render(&self, predicate: &Predicate) -> Result<String> {
        self.render_node(predicate, None)
    }

    fn render_node(&self, predicate: &Predicate, parent: Option<BinaryOp>) -> Result<String> {
        match predicate {
            Predicate::And(left, right) => self.render_logical(BinaryOp::And, left, right, parent),
            Predicate::Or(left, right) => self.render_logical(BinaryOp::Or, left, right, parent),
            Predicate::Not(inner) => Ok(format!("NOT ({})", self.render_node(inner, None)?)),
            Predicate::Compare { op, left, right } => Ok(format!(
                "{} {} {}",
                self.operand(left)?,
                comparison_text(*op)?,
                self.operand(right)?
            )),
            Predicate::Null { operand, negated } => {
                let suffix = if *negated { "IS NOT NULL" } else { "IS NULL" };
                Ok(format!("{} {suffix}", self.operand(operand)?))
            }
        }
    }

    /// Left subtree, operator, right subtree. A child joined by a different
    /// operator than its parent is parenthesised.
    fn render_logical(
        &self,
        op: BinaryOp,
        left: &Predicate,
        right: &Predicate,
        parent: Option<BinaryOp>,
    ) -> Result<String> {
        let keyword = if op == BinaryOp::And { "AND" } else { "OR" };
        let text = format!(
            "{} {keyword} {}",
            self.render_node(left, Some(op))?,
            self.render_node(right, Some(op))?
        );
        match parent {
            Some(parent) if parent != op => Ok(format!("({text})")),
            _ => Ok(text),
        }
    }

    fn operand(&self, operand: &Operand) -> Result<String> {
        match operand {
            Operand::Column(name) => {
                let name = self.dialect.identifier(name);
                Ok(match self.qualifier {
                    Some(table) => format!("{table}.{name}"),
                    None => name.into_owned(),
                })
            }
            Operand::Value(value) => self.dialect.literal(value),
        }
    }
}

fn comparison_text(op: BinaryOp) -> Result<&'static str> {
    Ok(match op {
        BinaryOp::Eq => "=",
        BinaryOp::Ne => "<>",
        BinaryOp::Lt => "<",
        BinaryOp::Le => "<=",
        BinaryOp::Gt => ">",
        BinaryOp::Ge => ">=",
        other => {
            return Err(Error::UnsupportedExpression(format!(
                "{other:?} is not a comparison"
            )))
        }
    })
}

/// Translate an expression to a WHERE fragment.
pub fn to_sql(expr: &Expr, dialect: &dyn SqlDialect, qualifier: Option<&str>) -> Result<String> {
    let translator = SqlTranslator::new(dialect);
    match qualifier {
        Some(table) => translator.with_qualifier(table).translate(expr),
        None => translator.translate(expr),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::{MsSqlDialect, MySqlDialect};
    use onedata_proto::{call, capture, col, lit, Function, Value};

    fn mssql(expr: &Expr) -> String {
        to_sql(expr, &MsSqlDialect, None).unwrap()
    }

    #[test]
    fn test_left_to_right_order() {
        let expr = col("Age").gt(30).and(col("Name").eq("Joe"));
        assert_eq!(mssql(&expr), "Age > 30 AND Name = 'Joe'");
        assert_eq!(
            to_sql(&expr, &MsSqlDialect, Some("Blog")).unwrap(),
            "Blog.Age > 30 AND Blog.Name = 'Joe'"
        );
    }

    #[test]
    fn test_mixed_logical_nesting_is_parenthesised() {
        let expr = col("A").eq(1).and(col("B").eq(2)).or(col("C").eq(3));
        assert_eq!(mssql(&expr), "(A = 1 AND B = 2) OR C = 3");

        let expr = col("A").eq(1).and(col("B").eq(2).or(col("C").eq(3)));
        assert_eq!(mssql(&expr), "A = 1 AND (B = 2 OR C = 3)");

        let expr = col("A").eq(1).and(col("B").eq(2)).and(col("C").eq(3));
        assert_eq!(mssql(&expr), "A = 1 AND B = 2 AND C = 3");

        let expr = col("A").eq(1).or(col("B").eq(2)).not();
        assert_eq!(mssql(&expr), "NOT (A = 1 OR B = 2)");
    }

    #[test]
    fn test_literals_per_dialect() {
        let expr = col("Active").eq(true).and(col("Name").ne("O'Brien"));
        assert_eq!(mssql(&expr), "Active = 1 AND Name <> 'O''Brien'");
        assert_eq!(
            to_sql(&expr, &MySqlDialect, None).unwrap(),
            "Active = TRUE AND Name <> 'O''Brien'"
        );
        assert_eq!(mssql(&col("Data").eq(vec![0xABu8, 0x01])), "Data = 0xAB01");
    }

    #[test]
    fn test_reserved_column_is_delimited() {
        let expr = col("Transaction").eq("Insert");
        assert_eq!(
            to_sql(&expr, &MsSqlDialect, Some("logs")).unwrap(),
            "logs.[Transaction] = 'Insert'"
        );
        assert_eq!(to_sql(&expr, &MySqlDialect, None).unwrap(), "`Transaction` = 'Insert'");
    }

    #[test]
    fn test_null_rendering() {
        assert_eq!(mssql(&col("Name").is_null()), "Name IS NULL");
        assert_eq!(mssql(&col("Name").ne(Value::Null)), "Name IS NOT NULL");
    }

    #[test]
    fn test_operands_are_folded() {
        let base = capture("base", || Value::Int32(25));
        let expr = col("Age").ge(base.add(5)).and(col("Code").eq(call(Function::Upper, vec![lit("ab")])));
        assert_eq!(mssql(&expr), "Age >= 30 AND Code = 'AB'");
    }

    #[test]
    fn test_capture_is_resolved_per_translation() {
        use std::sync::atomic::{AtomicI32, Ordering};
        use std::sync::Arc;

        let current = Arc::new(AtomicI32::new(1));
        let seen = current.clone();
        let expr = col("Id").eq(capture("id", move || Value::Int32(seen.load(Ordering::SeqCst))));

        assert_eq!(mssql(&expr), "Id = 1");
        current.store(2, Ordering::SeqCst);
        assert_eq!(mssql(&expr), "Id = 2");
    }

    #[test]
    fn test_unsupported_is_an_error() {
        assert!(matches!(
            to_sql(&col("Flag"), &MsSqlDialect, None),
            Err(Error::UnsupportedExpression(_))
        ));
        assert!(matches!(
            to_sql(&col("Age").add(1).gt(2), &MsSqlDialect, None),
            Err(Error::UnsupportedExpression(_))
        ));
    }
}
