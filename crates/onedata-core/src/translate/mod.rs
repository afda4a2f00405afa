//! Predicate translator.
//!
//! A predicate [`Expr`](onedata_proto::Expr) is compiled once into a
//! [`Predicate`] and then rendered either as a SQL WHERE fragment
//! ([`SqlTranslator`]) or as an in-memory filter over cached rows
//! ([`MemoryFilter`]). Untranslatable nodes fail with
//! [`Error::UnsupportedExpression`](crate::Error::UnsupportedExpression);
//! nothing degrades to "match all" or "match nothing".

mod classify;
mod constant;
mod memory;
mod predicate;
mod sql;

pub use classify::{classify, NodeGroup};
pub use constant::fold;
pub use memory::{compare_values, evaluate, values_equal, MemoryFilter};
pub use predicate::{extract_parameters, Operand, Predicate};
pub use sql::{to_sql, SqlTranslator};
