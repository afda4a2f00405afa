//! Dispatches operations to the cache or the database.
//!
//! Cache rules, for cache-enabled models:
//!
//! - a select is answered from the cache when it holds matching rows, or
//!   when the cache is full; otherwise the select procedure runs and its
//!   rows are merged in
//! - a select-all is answered from a full cache; otherwise the select-all
//!   procedure runs, and without paging its rows become the full cache
//! - mutations reach the cache only after the procedure succeeded
//!
//! The model's cache stays locked for the whole operation, database call
//! included.

use std::sync::Arc;

use onedata_proto::{Expr, Parameter, QueryOptions, QueryResult, Row, Value};
use tracing::{debug, warn};

use crate::cache::{CacheCoordinator, CacheState, DataCache};
use crate::catalog::ModelComposition;
use crate::config::NamingConvention;
use crate::dialect::SqlDialect;
use crate::driver::ProcedureExecutor;
use crate::error::{Error, Result};
use crate::reconcile::{
    ProcedureKind, TableTarget, EXPRESSION_PARAMETER, MAX_RESULTS_PARAMETER, OFFSET_PARAMETER,
};
use crate::translate::{MemoryFilter, Predicate, SqlTranslator};

use super::transaction::TransactionKind;

/// Runs operations for any model. Holds no per-model state of its own; the
/// caches live in the shared [`CacheCoordinator`].
#[derive(Clone)]
pub struct QueryEvaluator {
    dialect: Arc<dyn SqlDialect>,
    executor: Arc<dyn ProcedureExecutor>,
    naming: NamingConvention,
    default_connection: String,
    coordinator: Arc<CacheCoordinator>,
}

impl QueryEvaluator {
    pub fn new(
        dialect: Arc<dyn SqlDialect>,
        executor: Arc<dyn ProcedureExecutor>,
        naming: NamingConvention,
        default_connection: impl Into<String>,
        coordinator: Arc<CacheCoordinator>,
    ) -> Self {
        Self {
            dialect,
            executor,
            naming,
            default_connection: default_connection.into(),
            coordinator,
        }
    }

    pub fn coordinator(&self) -> &Arc<CacheCoordinator> {
        &self.coordinator
    }

    /// Rows matching `predicate`.
    pub fn select(
        &self,
        composition: &ModelComposition,
        predicate: &Expr,
        options: &QueryOptions,
    ) -> Result<QueryResult> {
        // Captures are resolved once; SQL and the in-memory filter share them.
        let compiled = Predicate::compile(predicate)?;
        let target = self.target(composition);
        let expression = SqlTranslator::new(self.dialect.as_ref())
            .with_qualifier(&target.table)
            .render(&compiled)?;

        if !composition.cache().enabled {
            let rows = self.fetch(composition, &target, TransactionKind::Select, Some(expression), options)?;
            return Ok(QueryResult::from_database(rows));
        }

        let filter = MemoryFilter::new(compiled);
        self.coordinator.with_cache(composition, |cache| {
            if !options.force_database && cache.state() != CacheState::Absent {
                let matched = filter.filter(cache.rows());
                if !matched.is_empty() || cache.state() == CacheState::Full {
                    self.coordinator.stats().record_hit();
                    debug!(model = %composition.model(), rows = matched.len(), "select answered from cache");
                    return Ok(QueryResult::from_cache(options.page(matched)));
                }
            }

            self.coordinator.stats().record_miss();
            let rows = self.fetch(composition, &target, TransactionKind::Select, Some(expression), options)?;
            cache.merge(rows.clone(), self.coordinator.now());
            Ok(QueryResult::from_database(rows))
        })
    }

    /// Every row of the model's table, subject to paging.
    pub fn select_all(&self, composition: &ModelComposition, options: &QueryOptions) -> Result<QueryResult> {
        let target = self.target(composition);
        if !composition.cache().enabled {
            let rows = self.fetch(composition, &target, TransactionKind::SelectAll, None, options)?;
            return Ok(QueryResult::from_database(rows));
        }

        self.coordinator.with_cache(composition, |cache| {
            if !options.force_database && cache.state() == CacheState::Full {
                self.coordinator.stats().record_hit();
                let rows: Vec<Row> = cache.rows().cloned().collect();
                return Ok(QueryResult::from_cache(options.page(rows)));
            }

            self.coordinator.stats().record_miss();
            let rows = self.fetch(composition, &target, TransactionKind::SelectAll, None, options)?;
            if options.is_paged() {
                cache.merge(rows.clone(), self.coordinator.now());
            } else {
                cache.fill(rows.clone(), self.coordinator.now());
            }
            Ok(QueryResult::from_database(rows))
        })
    }

    /// Select with the conjunction of `name = value` for every non-null
    /// parameter.
    pub fn select_by_parameters(
        &self,
        composition: &ModelComposition,
        parameters: &[Parameter],
        options: &QueryOptions,
    ) -> Result<QueryResult> {
        let usable: Vec<Parameter> = parameters
            .iter()
            .filter(|p| !p.value.is_null())
            .cloned()
            .collect();
        let predicate = Expr::from_parameters(&usable)
            .ok_or_else(|| Error::InvalidNumberOfParameters(composition.model().to_string()))?;
        self.select(composition, &predicate, options)
    }

    /// Insert, update or delete one row.
    pub fn execute(
        &self,
        kind: TransactionKind,
        composition: &ModelComposition,
        row: Row,
        options: &QueryOptions,
    ) -> Result<QueryResult> {
        match kind {
            TransactionKind::Insert | TransactionKind::Update | TransactionKind::Delete => {
                self.mutate(kind, composition, vec![row], options)?.into_result()
            }
            other => Err(Error::UnsupportedTransaction(other)),
        }
    }

    /// Insert, update or delete several rows, one procedure call each.
    ///
    /// Stops at the first failure. Rows already written stay written and
    /// stay reflected in the cache.
    pub fn execute_batch(
        &self,
        kind: TransactionKind,
        composition: &ModelComposition,
        rows: Vec<Row>,
        options: &QueryOptions,
    ) -> Result<QueryResult> {
        self.execute_batch_partial(kind, composition, rows, options)?
            .into_result()
    }

    /// Like [`execute_batch`](Self::execute_batch), but a failing row does
    /// not hide the rows written before it.
    pub fn execute_batch_partial(
        &self,
        kind: TransactionKind,
        composition: &ModelComposition,
        rows: Vec<Row>,
        options: &QueryOptions,
    ) -> Result<BatchOutcome> {
        if !kind.is_batch() {
            return Err(Error::UnsupportedTransaction(kind));
        }
        self.mutate(kind.single(), composition, rows, options)
    }

    /// Run a caller-named procedure. The cache is not consulted.
    pub fn stored_procedure(
        &self,
        table_hint: &str,
        procedure: &str,
        parameters: &[Parameter],
        connection: Option<&str>,
    ) -> Result<QueryResult> {
        let connection = connection.unwrap_or(&self.default_connection);
        let tabular = self
            .executor
            .execute_procedure(table_hint, procedure, connection, parameters)
            .inspect_err(|e| warn!(procedure, error = %e, "stored procedure failed"))?;
        Ok(QueryResult::from_database(tabular.rows))
    }

    fn target(&self, composition: &ModelComposition) -> TableTarget {
        TableTarget::new(self.dialect.as_ref(), &self.naming, composition)
    }

    fn connection<'o>(&'o self, options: &'o QueryOptions) -> &'o str {
        options.connection.as_deref().unwrap_or(&self.default_connection)
    }

    fn procedure(&self, kind: ProcedureKind, composition: &ModelComposition) -> String {
        self.dialect
            .qualify(composition.schema(), &kind.name(&self.naming, composition))
    }

    fn call(
        &self,
        composition: &ModelComposition,
        target: &TableTarget,
        procedure: &str,
        connection: &str,
        parameters: &[Parameter],
    ) -> Result<Vec<Row>> {
        debug!(model = %composition.model(), procedure, connection, "executing procedure");
        let tabular = self
            .executor
            .execute_procedure(&target.table, procedure, connection, parameters)
            .inspect_err(|e| {
                warn!(model = %composition.model(), procedure, error = %e, "procedure failed")
            })?;
        Ok(tabular.rows)
    }

    /// Run the select or select-all procedure.
    fn fetch(
        &self,
        composition: &ModelComposition,
        target: &TableTarget,
        kind: TransactionKind,
        expression: Option<String>,
        options: &QueryOptions,
    ) -> Result<Vec<Row>> {
        let procedure_kind = kind.procedure().ok_or(Error::UnsupportedTransaction(kind))?;
        let procedure = self.procedure(procedure_kind, composition);

        let mut parameters = Vec::with_capacity(3);
        if let Some(expression) = expression {
            parameters.push(Parameter::new(EXPRESSION_PARAMETER, expression));
        }
        parameters.push(Parameter::new(MAX_RESULTS_PARAMETER, paging_value(options.max_results)));
        parameters.push(Parameter::new(OFFSET_PARAMETER, paging_value(options.offset)));

        self.call(composition, target, &procedure, self.connection(options), &parameters)
    }

    fn mutate(
        &self,
        kind: TransactionKind,
        composition: &ModelComposition,
        rows: Vec<Row>,
        options: &QueryOptions,
    ) -> Result<BatchOutcome> {
        let target = self.target(composition);
        let procedure_kind = kind.procedure().ok_or(Error::UnsupportedTransaction(kind))?;
        let procedure = self.procedure(procedure_kind, composition);
        let connection = self.connection(options);

        let run = |mut cache: Option<&mut DataCache>| -> BatchOutcome {
            let mut outcome = BatchOutcome::default();
            for row in &rows {
                let returned = match call_parameters(kind, composition, row)
                    .and_then(|parameters| self.call(composition, &target, &procedure, connection, &parameters))
                {
                    Ok(returned) => returned,
                    Err(e) => {
                        outcome.failure = Some(e);
                        break;
                    }
                };
                if let Some(cache) = cache.as_deref_mut() {
                    apply_to_cache(kind, composition, cache, row, &returned);
                }
                outcome.applied += 1;
                if returned.is_empty() || kind == TransactionKind::Delete {
                    outcome.written.push(row.clone());
                } else {
                    outcome.written.extend(returned);
                }
            }
            outcome
        };

        let outcome = if composition.cache().enabled {
            self.coordinator.with_cache(composition, |cache| run(Some(cache)))
        } else {
            run(None)
        };
        if outcome.failure.is_some() {
            debug!(
                model = %composition.model(),
                applied = outcome.applied,
                requested = rows.len(),
                "mutation stopped early"
            );
        }
        Ok(outcome)
    }
}

/// Progress of a mutation that may have stopped part way.
#[derive(Debug, Default)]
pub struct BatchOutcome {
    /// Rows as written, read back from the procedure where it returned them.
    pub written: Vec<Row>,
    /// Number of leading input rows whose procedure call succeeded.
    pub applied: usize,
    /// Error that stopped the batch.
    pub failure: Option<Error>,
}

impl BatchOutcome {
    pub fn into_result(self) -> Result<QueryResult> {
        match self.failure {
            Some(e) => Err(e),
            None => Ok(QueryResult::from_database(self.written)),
        }
    }
}

fn paging_value(raw: Option<u32>) -> Value {
    match raw {
        Some(n) => Value::Int32(i32::try_from(n).unwrap_or(i32::MAX)),
        None => Value::Null,
    }
}

fn key_value(composition: &ModelComposition, row: &Row) -> Result<Value> {
    let key = &composition.primary_key().name;
    match row.get(key) {
        Some(value) if !value.is_null() => Ok(value.clone()),
        _ => Err(onedata_proto::Error::MissingColumn(key.clone()).into()),
    }
}

/// Parameters of a generated mutation procedure, in declaration order.
///
/// Insert takes every caller-supplied column except a server-generated key;
/// update takes the key plus every caller-supplied column; delete takes the
/// key alone. Absent columns are sent as NULL.
pub fn call_parameters(kind: TransactionKind, composition: &ModelComposition, row: &Row) -> Result<Vec<Parameter>> {
    let key = &composition.primary_key().name;
    let value_of = |name: &str| row.get(name).cloned().unwrap_or(Value::Null);

    match kind.single() {
        TransactionKind::Insert => Ok(composition
            .managed()
            .filter(|p| !(p.name == *key && composition.key_generation().is_server_generated()))
            .map(|p| Parameter::new(p.name.clone(), value_of(&p.name)))
            .collect()),
        TransactionKind::Update => {
            let mut parameters = vec![Parameter::new(key.clone(), key_value(composition, row)?)];
            parameters.extend(
                composition
                    .managed()
                    .filter(|p| p.name != *key)
                    .map(|p| Parameter::new(p.name.clone(), value_of(&p.name))),
            );
            Ok(parameters)
        }
        TransactionKind::Delete => Ok(vec![Parameter::new(key.clone(), key_value(composition, row)?)]),
        other => Err(Error::UnsupportedTransaction(other)),
    }
}

/// Reflect a successful mutation in the cache.
fn apply_to_cache(
    kind: TransactionKind,
    composition: &ModelComposition,
    cache: &mut DataCache,
    row: &Row,
    returned: &[Row],
) {
    if cache.state() == CacheState::Absent {
        return;
    }
    match kind {
        TransactionKind::Insert if returned.is_empty() => {
            // Server-populated columns are unknown without the read-back.
            debug!(model = %composition.model(), "insert returned no row, cache reset");
            cache.reset();
        }
        TransactionKind::Update if returned.is_empty() => {
            cache.merge_update(row);
        }
        TransactionKind::Insert | TransactionKind::Update => {
            for written in returned {
                cache.upsert(written.clone());
            }
        }
        TransactionKind::Delete => {
            if let Some(key) = row.get(&composition.primary_key().name) {
                cache.remove(key);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{KeyGeneration, ModelDescriptor, PrimitiveKind, PropertyDescriptor};

    fn blog() -> ModelComposition {
        let descriptor = ModelDescriptor::new("Blog")
            .with_table("Blog")
            .with_property(
                PropertyDescriptor::new("Id", PrimitiveKind::Int32)
                    .primary_key(KeyGeneration::AutoIncrement),
            )
            .with_property(PropertyDescriptor::new("Name", PrimitiveKind::String))
            .with_property(PropertyDescriptor::new("Tagline", PrimitiveKind::String).nullable())
            .with_property(PropertyDescriptor::new("Scratch", PrimitiveKind::String).unmanaged())
            .with_property(PropertyDescriptor::new("DateCreated", PrimitiveKind::DateTime).date_created());
        ModelComposition::build(&descriptor, "dbo").unwrap()
    }

    fn names(parameters: &[Parameter]) -> Vec<&str> {
        parameters.iter().map(|p| p.name.as_str()).collect()
    }

    #[test]
    fn test_call_parameters_follow_procedures() {
        let composition = blog();
        let row = Row::new().with("Id", 4).with("Name", "A").with("Scratch", "x");

        let insert = call_parameters(TransactionKind::Insert, &composition, &row).unwrap();
        assert_eq!(names(&insert), vec!["Name", "Tagline"]);
        assert_eq!(insert[1].value, Value::Null);

        let update = call_parameters(TransactionKind::UpdateBatch, &composition, &row).unwrap();
        assert_eq!(names(&update), vec!["Id", "Name", "Tagline"]);

        let delete = call_parameters(TransactionKind::Delete, &composition, &row).unwrap();
        assert_eq!(delete, vec![Parameter::new("Id", 4)]);
    }

    #[test]
    fn test_key_required_for_update_and_delete() {
        let composition = blog();
        let row = Row::new().with("Name", "A");
        assert!(matches!(
            call_parameters(TransactionKind::Delete, &composition, &row),
            Err(Error::Protocol(onedata_proto::Error::MissingColumn(_)))
        ));
        assert!(call_parameters(TransactionKind::Insert, &composition, &row).is_ok());
        assert!(matches!(
            call_parameters(TransactionKind::Select, &composition, &row),
            Err(Error::UnsupportedTransaction(TransactionKind::Select))
        ));
    }

    #[test]
    fn test_paging_value() {
        assert_eq!(paging_value(None), Value::Null);
        assert_eq!(paging_value(Some(10)), Value::Int32(10));
        assert_eq!(paging_value(Some(u32::MAX)), Value::Int32(i32::MAX));
    }
}
