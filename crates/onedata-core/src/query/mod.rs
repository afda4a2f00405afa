//! Query evaluator.
//!
//! Turns typed requests into procedure calls and keeps the model caches in
//! step with what the database acknowledged.

mod evaluator;
mod transaction;

pub use evaluator::{call_parameters, BatchOutcome, QueryEvaluator};
pub use transaction::TransactionKind;
