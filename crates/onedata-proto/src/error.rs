//! Protocol error types.

use thiserror::Error;

/// Errors raised while reading values out of rows.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum Error {
    /// The row has no column with this name.
    #[error("missing column: {0}")]
    MissingColumn(String),

    /// The column holds a value of an unexpected type.
    #[error("column {column} holds {actual}, expected {expected}")]
    TypeMismatch {
        column: String,
        expected: &'static str,
        actual: &'static str,
    },
}
