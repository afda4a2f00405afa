//! Schema reconciler.
//!
//! Brings the live database in line with a model: the backing table through
//! [`TableDiff`] and the five CRUD procedures through [`ProcedureBuilder`].

mod diff;
mod live;
mod procedures;
mod table;

pub use diff::TableDiff;
pub use live::{routine_names, ColumnDefinition, ConstraintDefinition, ConstraintKind, LiveTable};
pub use procedures::{
    ProcedureBuilder, ProcedureDefinition, ProcedureKind, EXPRESSION_PARAMETER,
    MAX_RESULTS_PARAMETER, OFFSET_PARAMETER,
};
pub use table::{create_table, declared_table, TableTarget};

use tracing::{debug, info};

use crate::catalog::ModelComposition;
use crate::config::ManagerConfig;
use crate::dialect::SqlDialect;
use crate::driver::ProcedureExecutor;
use crate::error::Result;

/// What one consolidation pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub table_created: bool,
    /// Every table statement executed, CREATE included.
    pub table_statements: Vec<String>,
    pub procedures_created: Vec<String>,
    pub procedures_altered: Vec<String>,
}

impl ReconcileReport {
    /// Check if nothing was executed.
    pub fn is_empty(&self) -> bool {
        self.table_statements.is_empty()
            && self.procedures_created.is_empty()
            && self.procedures_altered.is_empty()
    }
}

/// Runs reconciliation passes against a driver.
pub struct SchemaReconciler<'a> {
    dialect: &'a dyn SqlDialect,
    config: &'a ManagerConfig,
    executor: &'a dyn ProcedureExecutor,
}

impl<'a> SchemaReconciler<'a> {
    pub fn new(
        dialect: &'a dyn SqlDialect,
        config: &'a ManagerConfig,
        executor: &'a dyn ProcedureExecutor,
    ) -> Self {
        Self {
            dialect,
            config,
            executor,
        }
    }

    /// Read the live columns and constraints of a model's table.
    pub fn read_table(&self, composition: &ModelComposition, connection: &str) -> Result<LiveTable> {
        let target = TableTarget::new(self.dialect, &self.config.naming, composition);
        let columns = self
            .executor
            .execute_command(connection, &self.dialect.columns_query(&target.schema, &target.table))?;
        let constraints = self.executor.execute_command(
            connection,
            &self.dialect.constraints_query(&target.schema, &target.table),
        )?;
        LiveTable::from_tabular(&columns, &constraints)
    }

    /// Names of the procedures already present in the model's schema.
    pub fn read_routines(&self, composition: &ModelComposition, connection: &str) -> Result<Vec<String>> {
        let routines = self
            .executor
            .execute_command(connection, &self.dialect.routines_query(composition.schema()))?;
        Ok(routine_names(&routines))
    }

    /// Table statements that would bring the live table in line, without
    /// executing them.
    pub fn plan_table(&self, composition: &ModelComposition, connection: &str) -> Result<TableDiff> {
        let live = self.read_table(composition, connection)?;
        TableDiff::compute(self.dialect, &self.config.naming, composition, &live)
    }

    /// Create or alter the table, then create or alter each procedure, as
    /// the configuration toggles allow.
    pub fn consolidate(&self, composition: &ModelComposition, connection: &str) -> Result<ReconcileReport> {
        let mut report = ReconcileReport::default();
        let alterations = self.config.alterations_allowed();

        let live = self.read_table(composition, connection)?;
        let table_allowed = if live.exists() {
            self.config.auto_alter_tables && alterations
        } else {
            self.config.auto_create_tables
        };
        if table_allowed {
            let diff = TableDiff::compute(self.dialect, &self.config.naming, composition, &live)?;
            report.table_created = !live.exists();
            for statement in diff.statements {
                self.execute(composition, connection, &statement)?;
                report.table_statements.push(statement);
            }
        } else {
            debug!(model = %composition.model(), exists = live.exists(), "table reconciliation disabled");
        }

        let existing = self.read_routines(composition, connection)?;
        let builder = ProcedureBuilder::new(self.dialect, &self.config.naming, composition);
        for kind in ProcedureKind::ALL {
            let name = kind.name(&self.config.naming, composition);
            let exists = existing.iter().any(|r| r.eq_ignore_ascii_case(&name));
            let allowed = if exists {
                self.config.auto_alter_procedures && alterations
            } else {
                self.config.auto_create_procedures
            };
            if !allowed {
                continue;
            }
            let definition = builder.build(kind, exists);
            for statement in &definition.statements {
                self.execute(composition, connection, statement)?;
            }
            if exists {
                report.procedures_altered.push(definition.name);
            } else {
                report.procedures_created.push(definition.name);
            }
        }

        info!(
            model = %composition.model(),
            table_statements = report.table_statements.len(),
            created = report.procedures_created.len(),
            altered = report.procedures_altered.len(),
            "schema consolidated"
        );
        Ok(report)
    }

    fn execute(&self, composition: &ModelComposition, connection: &str, statement: &str) -> Result<()> {
        info!(model = %composition.model(), sql = %statement, "executing schema statement");
        self.executor.execute_command(connection, statement)?;
        Ok(())
    }
}
