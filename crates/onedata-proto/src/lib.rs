//! OneData shared types.
//!
//! This crate defines the plain data exchanged between the data-access core,
//! database drivers and callers.
//!
//! # Modules
//!
//! - [`value`] - Runtime value types for parameters and rows
//! - [`expr`] - Predicate AST and fluent builder
//! - [`parameter`] - Named procedure parameters
//! - [`result`] - Rows, driver results and the result envelope
//! - [`options`] - Paging and cache-bypass options
//! - [`error`] - Row access errors

pub mod error;
pub mod expr;
pub mod options;
pub mod parameter;
pub mod result;
pub mod value;

pub use error::Error;

// Re-export commonly used types at crate root
pub use expr::{call, capture, col, lit, BinaryOp, Capture, Expr, Function, UnaryOp};
pub use options::QueryOptions;
pub use parameter::Parameter;
pub use result::{QueryResult, Row, Tabular};
pub use value::{FromValue, Value};
