//! Data manager facade.
//!
//! Entry point for callers: typed CRUD over [`Manageable`] models, schema
//! consolidation on first use, optional audit rows and execution events.
//! Every method blocks on the driver; the `_async` variants move the call
//! onto tokio's blocking pool.

use std::any::TypeId;
use std::sync::Arc;

use dashmap::DashSet;
use onedata_proto::{Expr, Parameter, QueryOptions, QueryResult, Row};
use tracing::{debug, info, warn};

use crate::audit::LogEntry;
use crate::cache::{CacheCoordinator, Clock, SystemClock};
use crate::catalog::{Manageable, ModelComposition, ModelRegistry};
use crate::config::ManagerConfig;
use crate::dialect::{dialect_for, SqlDialect};
use crate::driver::ProcedureExecutor;
use crate::error::{Error, Result};
use crate::events::{ExecutionEvent, EventBus};
use crate::query::{call_parameters, QueryEvaluator, TransactionKind};
use crate::reconcile::{ProcedureBuilder, ProcedureDefinition, ReconcileReport, SchemaReconciler};

/// Typed data access over one database.
pub struct DataManager {
    config: ManagerConfig,
    dialect: Arc<dyn SqlDialect>,
    executor: Arc<dyn ProcedureExecutor>,
    registry: ModelRegistry,
    evaluator: QueryEvaluator,
    /// Models whose schema was consolidated.
    consolidated: DashSet<TypeId>,
    events: EventBus,
}

impl DataManager {
    /// Create a manager for the configured database family.
    pub fn new(config: ManagerConfig, executor: Arc<dyn ProcedureExecutor>) -> Self {
        Self::with_clock(config, executor, Arc::new(SystemClock))
    }

    /// Create a manager whose caches expire against `clock`.
    pub fn with_clock(
        config: ManagerConfig,
        executor: Arc<dyn ProcedureExecutor>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let dialect = dialect_for(config.database);
        let evaluator = QueryEvaluator::new(
            dialect.clone(),
            executor.clone(),
            config.naming.clone(),
            config.default_connection.clone(),
            Arc::new(CacheCoordinator::new(clock)),
        );
        info!(
            database = ?config.database,
            connection = %config.default_connection,
            "data manager created"
        );
        Self {
            registry: ModelRegistry::new(config.default_schema.clone()),
            config,
            dialect,
            executor,
            evaluator,
            consolidated: DashSet::new(),
            events: EventBus::new(),
        }
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    pub fn dialect(&self) -> &dyn SqlDialect {
        self.dialect.as_ref()
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    pub fn evaluator(&self) -> &QueryEvaluator {
        &self.evaluator
    }

    pub fn caches(&self) -> &CacheCoordinator {
        self.evaluator.coordinator()
    }

    /// Composition of `T`.
    pub fn describe<T: Manageable>(&self) -> Result<Arc<ModelComposition>> {
        self.registry.describe::<T>()
    }

    /// Register a listener for execution events.
    pub fn subscribe<F>(&self, listener: F)
    where
        F: Fn(&ExecutionEvent) + Send + Sync + 'static,
    {
        self.events.subscribe(listener);
    }

    /// Reconcile `T`'s table and procedures now, as the toggles allow.
    pub fn consolidate<T: Manageable>(&self) -> Result<ReconcileReport> {
        let composition = self.describe::<T>()?;
        let report = self.reconciler().consolidate(&composition, &self.config.default_connection)?;
        self.consolidated.insert(TypeId::of::<T>());
        Ok(report)
    }

    /// Generated CREATE text of `T`'s five procedures.
    pub fn procedures<T: Manageable>(&self) -> Result<Vec<ProcedureDefinition>> {
        let composition = self.describe::<T>()?;
        Ok(ProcedureBuilder::new(self.dialect.as_ref(), &self.config.naming, &composition).build_all(false))
    }

    /// Drop `T`'s cached rows.
    pub fn reset_cache<T: Manageable>(&self) -> Result<()> {
        let composition = self.describe::<T>()?;
        self.caches().reset(composition.model());
        Ok(())
    }

    /// Drop every cached row.
    pub fn reset_caches(&self) {
        self.caches().reset_all();
    }

    pub fn select<T: Manageable>(&self, predicate: &Expr, options: &QueryOptions) -> Result<QueryResult<T>> {
        let composition = self.prepare::<T>()?;
        let result = self.evaluator.select(&composition, predicate, options)?;
        self.finish(TransactionKind::Select, &composition, result)
    }

    pub fn select_all<T: Manageable>(&self, options: &QueryOptions) -> Result<QueryResult<T>> {
        let composition = self.prepare::<T>()?;
        let result = self.evaluator.select_all(&composition, options)?;
        self.finish(TransactionKind::SelectAll, &composition, result)
    }

    /// Select rows whose columns equal every non-null parameter.
    pub fn select_by_parameters<T: Manageable>(
        &self,
        parameters: &[Parameter],
        options: &QueryOptions,
    ) -> Result<QueryResult<T>> {
        let composition = self.prepare::<T>()?;
        let result = self.evaluator.select_by_parameters(&composition, parameters, options)?;
        self.finish(TransactionKind::Select, &composition, result)
    }

    /// Insert one item. The result holds the row as read back.
    pub fn insert<T: Manageable>(&self, item: &T) -> Result<QueryResult<T>> {
        self.write(TransactionKind::Insert, vec![item.to_row()], &QueryOptions::default())
    }

    /// Update one item. Null columns keep their stored value.
    pub fn update<T: Manageable>(&self, item: &T) -> Result<QueryResult<T>> {
        self.write(TransactionKind::Update, vec![item.to_row()], &QueryOptions::default())
    }

    pub fn delete<T: Manageable>(&self, item: &T) -> Result<QueryResult<T>> {
        self.write(TransactionKind::Delete, vec![item.to_row()], &QueryOptions::default())
    }

    pub fn insert_batch<T: Manageable>(&self, items: &[T]) -> Result<QueryResult<T>> {
        self.write(TransactionKind::InsertBatch, rows_of(items), &QueryOptions::default())
    }

    pub fn update_batch<T: Manageable>(&self, items: &[T]) -> Result<QueryResult<T>> {
        self.write(TransactionKind::UpdateBatch, rows_of(items), &QueryOptions::default())
    }

    pub fn delete_batch<T: Manageable>(&self, items: &[T]) -> Result<QueryResult<T>> {
        self.write(TransactionKind::DeleteBatch, rows_of(items), &QueryOptions::default())
    }

    /// Mutate with explicit options (connection override). Single kinds take
    /// exactly one item; anything else is an unsupported transaction.
    pub fn execute<T: Manageable>(
        &self,
        kind: TransactionKind,
        items: &[T],
        options: &QueryOptions,
    ) -> Result<QueryResult<T>> {
        self.write(kind, rows_of(items), options)
    }

    /// Run a caller-named procedure and return its rows untyped.
    pub fn stored_procedure(
        &self,
        table_hint: &str,
        procedure: &str,
        parameters: &[Parameter],
        connection: Option<&str>,
    ) -> Result<QueryResult<Row>> {
        let result = self
            .evaluator
            .stored_procedure(table_hint, procedure, parameters, connection)?;
        self.events.publish(&ExecutionEvent {
            kind: TransactionKind::StoredProcedure,
            table: table_hint.to_string(),
            from_cache: false,
            rows: result.len(),
        });
        Ok(result)
    }

    pub async fn select_async<T: Manageable>(
        self: &Arc<Self>,
        predicate: Expr,
        options: QueryOptions,
    ) -> Result<QueryResult<T>> {
        let manager = self.clone();
        tokio::task::spawn_blocking(move || manager.select::<T>(&predicate, &options)).await?
    }

    pub async fn select_all_async<T: Manageable>(
        self: &Arc<Self>,
        options: QueryOptions,
    ) -> Result<QueryResult<T>> {
        let manager = self.clone();
        tokio::task::spawn_blocking(move || manager.select_all::<T>(&options)).await?
    }

    pub async fn insert_async<T: Manageable>(self: &Arc<Self>, item: T) -> Result<QueryResult<T>> {
        let manager = self.clone();
        tokio::task::spawn_blocking(move || manager.insert(&item)).await?
    }

    pub async fn update_async<T: Manageable>(self: &Arc<Self>, item: T) -> Result<QueryResult<T>> {
        let manager = self.clone();
        tokio::task::spawn_blocking(move || manager.update(&item)).await?
    }

    pub async fn delete_async<T: Manageable>(self: &Arc<Self>, item: T) -> Result<QueryResult<T>> {
        let manager = self.clone();
        tokio::task::spawn_blocking(move || manager.delete(&item)).await?
    }

    pub async fn stored_procedure_async(
        self: &Arc<Self>,
        table_hint: String,
        procedure: String,
        parameters: Vec<Parameter>,
        connection: Option<String>,
    ) -> Result<QueryResult<Row>> {
        let manager = self.clone();
        tokio::task::spawn_blocking(move || {
            manager.stored_procedure(&table_hint, &procedure, &parameters, connection.as_deref())
        })
        .await?
    }

    fn reconciler(&self) -> SchemaReconciler<'_> {
        SchemaReconciler::new(self.dialect.as_ref(), &self.config, self.executor.as_ref())
    }

    fn reconciles(&self) -> bool {
        self.config.auto_create_tables
            || self.config.auto_alter_tables
            || self.config.auto_create_procedures
            || self.config.auto_alter_procedures
    }

    /// Describe `T` and make sure its schema was consolidated.
    fn prepare<T: Manageable>(&self) -> Result<Arc<ModelComposition>> {
        let composition = self.describe::<T>()?;
        let key = TypeId::of::<T>();
        if self.reconciles() && (self.config.constant_table_consolidation || !self.consolidated.contains(&key)) {
            self.reconciler().consolidate(&composition, &self.config.default_connection)?;
            self.consolidated.insert(key);
        }
        Ok(composition)
    }

    fn write<T: Manageable>(
        &self,
        kind: TransactionKind,
        rows: Vec<Row>,
        options: &QueryOptions,
    ) -> Result<QueryResult<T>> {
        let composition = self.prepare::<T>()?;
        let mut audited = if self.config.log_in_database { rows.clone() } else { Vec::new() };

        let result = if kind.is_batch() {
            let outcome = self.evaluator.execute_batch_partial(kind, &composition, rows, options)?;
            if let Some(e) = outcome.failure {
                // Rows before the failure are committed and get their audit rows.
                audited.truncate(outcome.applied);
                self.audit(kind, &composition, &audited);
                return Err(e);
            }
            QueryResult::from_database(outcome.written)
        } else {
            let mut rows = rows.into_iter();
            match (rows.next(), rows.next()) {
                (Some(row), None) => self.evaluator.execute(kind, &composition, row, options)?,
                _ => return Err(Error::UnsupportedTransaction(kind)),
            }
        };

        self.audit(kind, &composition, &audited);
        self.finish(kind, &composition, result)
    }

    /// Publish the event and convert rows to `T`.
    fn finish<T: Manageable>(
        &self,
        kind: TransactionKind,
        composition: &ModelComposition,
        result: QueryResult<Row>,
    ) -> Result<QueryResult<T>> {
        debug!(
            model = %composition.model(),
            kind = %kind,
            rows = result.len(),
            from_cache = result.from_cache,
            "operation completed"
        );
        self.events.publish(&ExecutionEvent {
            kind,
            table: composition.model().to_string(),
            from_cache: result.from_cache,
            rows: result.len(),
        });
        Ok(result.try_map(|row| T::from_row(&row))?)
    }

    /// Write one audit row per mutated row. Failures are logged, never
    /// surfaced: the mutation itself already succeeded.
    fn audit(&self, kind: TransactionKind, composition: &ModelComposition, rows: &[Row]) {
        if rows.is_empty() {
            return;
        }
        let log = match self.prepare::<LogEntry>() {
            Ok(log) => log,
            Err(e) => {
                warn!(error = %e, "audit table unavailable");
                return;
            }
        };
        for row in rows {
            let parameters = call_parameters(kind, composition, row).unwrap_or_else(|_| row.to_parameters());
            let entry = LogEntry::new(kind, composition.table(), &parameters);
            if let Err(e) = self
                .evaluator
                .execute(TransactionKind::Insert, &log, entry.to_row(), &QueryOptions::default())
            {
                warn!(model = %composition.model(), error = %e, "audit row not written");
            }
        }
    }
}

fn rows_of<T: Manageable>(items: &[T]) -> Vec<Row> {
    items.iter().map(T::to_row).collect()
}
