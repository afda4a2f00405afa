//! Operation kinds dispatched by the evaluator.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::reconcile::ProcedureKind;

/// Kind of a data-manager operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransactionKind {
    Select,
    SelectAll,
    Insert,
    Update,
    Delete,
    InsertBatch,
    UpdateBatch,
    DeleteBatch,
    /// Caller-named procedure, passed through untouched.
    StoredProcedure,
}

impl TransactionKind {
    pub fn is_batch(self) -> bool {
        matches!(
            self,
            TransactionKind::InsertBatch | TransactionKind::UpdateBatch | TransactionKind::DeleteBatch
        )
    }

    /// Check if the operation writes rows.
    pub fn is_mutation(self) -> bool {
        !matches!(
            self,
            TransactionKind::Select | TransactionKind::SelectAll | TransactionKind::StoredProcedure
        )
    }

    /// Single-row counterpart of a batch kind.
    pub fn single(self) -> Self {
        match self {
            TransactionKind::InsertBatch => TransactionKind::Insert,
            TransactionKind::UpdateBatch => TransactionKind::Update,
            TransactionKind::DeleteBatch => TransactionKind::Delete,
            other => other,
        }
    }

    /// Generated procedure backing this kind.
    pub fn procedure(self) -> Option<ProcedureKind> {
        match self.single() {
            TransactionKind::Select => Some(ProcedureKind::Select),
            TransactionKind::SelectAll => Some(ProcedureKind::SelectAll),
            TransactionKind::Insert => Some(ProcedureKind::Insert),
            TransactionKind::Update => Some(ProcedureKind::Update),
            TransactionKind::Delete => Some(ProcedureKind::Delete),
            _ => None,
        }
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}
