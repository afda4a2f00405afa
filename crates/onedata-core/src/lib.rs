//! OneData Core - Model metadata, schema reconciliation and cache-coherent
//! data access through generated stored procedures.
//!
//! Callers describe their types once ([`Manageable`]), and the
//! [`DataManager`] creates the backing tables and CRUD procedures, translates
//! predicates to SQL, and answers reads from per-model caches where it can.

pub mod audit;
pub mod cache;
pub mod catalog;
pub mod config;
pub mod dialect;
pub mod driver;
pub mod error;
pub mod events;
pub mod manager;
pub mod query;
pub mod reconcile;
pub mod translate;

pub use catalog::{
    AutoKind, CachePolicy, ForeignAction, ForeignReference, KeyGeneration, Manageable,
    ModelComposition, ModelDescriptor, ModelRegistry, ModelTag, PrimitiveKind, PropertyDescriptor,
    PropertyTag,
};
pub use config::{DatabaseFamily, ManagerConfig, NamingConvention};
pub use dialect::{dialect_for, MsSqlDialect, MySqlDialect, SqlDialect};
pub use driver::{ProcedureExecutor, StoreError};
pub use error::{Error, Result};
pub use manager::DataManager;

// Cache exports
pub use cache::{CacheCoordinator, CacheState, Clock, ManualClock, SystemClock};

// Evaluation exports
pub use events::{ExecutionEvent, EventBus};
pub use query::{QueryEvaluator, TransactionKind};

// Reconciliation exports
pub use reconcile::{
    ProcedureBuilder, ProcedureDefinition, ProcedureKind, ReconcileReport, SchemaReconciler,
    TableDiff,
};
pub use translate::{extract_parameters, to_sql, MemoryFilter, Predicate, SqlTranslator};

/// Re-export shared types.
pub use onedata_proto as proto;
