//! Declared-versus-live table diffing.
//!
//! The diff walks every persisted property and decides, in a fixed order,
//! whether the live column needs work:
//!
//! 1. add a missing column (nullable at first)
//! 2. change its type
//! 3. add or remove NOT NULL
//! 4. add or remove the unique constraint
//! 5. add, replace or remove the default
//! 6. add or remove the primary key
//! 7. add, replace or remove the foreign key
//!
//! Live columns with no persisted property are then dropped, after their
//! default and unique constraints.
//!
//! Every emitted statement is also applied to a working copy of the live
//! table. Later steps read the working copy, so they see the effect of
//! earlier ones, and the final copy is what the database looks like once the
//! statements ran. Diffing that copy again yields nothing.

use crate::catalog::ModelComposition;
use crate::config::NamingConvention;
use crate::dialect::SqlDialect;
use crate::error::Result;

use super::live::{ColumnDefinition, ConstraintDefinition, ConstraintKind, LiveTable};
use super::table::{
    create_table, declared_columns, declared_table, DeclaredColumn, TableTarget, DEFAULT_PREFIX,
    FOREIGN_KEY_PREFIX, PRIMARY_KEY_PREFIX, UNIQUE_PREFIX,
};

/// Ordered DDL bringing a live table in line with its model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDiff {
    pub statements: Vec<String>,
    /// The live table after every statement ran.
    pub projected: LiveTable,
}

impl TableDiff {
    /// Compute the diff. A table with no live columns is created.
    pub fn compute(
        dialect: &dyn SqlDialect,
        naming: &NamingConvention,
        composition: &ModelComposition,
        live: &LiveTable,
    ) -> Result<Self> {
        if !live.exists() {
            return Ok(Self {
                statements: create_table(dialect, naming, composition)?,
                projected: declared_table(dialect, naming, composition)?,
            });
        }

        let mut differ = Differ {
            dialect,
            target: TableTarget::new(dialect, naming, composition),
            state: live.clone(),
            statements: Vec::new(),
        };
        let declared = declared_columns(dialect, naming, composition)?;
        for column in &declared {
            differ.reconcile(column)?;
        }
        differ.drop_undeclared(composition);

        Ok(Self {
            statements: differ.statements,
            projected: differ.state,
        })
    }

    /// Check if the table already matches.
    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    pub fn len(&self) -> usize {
        self.statements.len()
    }
}

struct Differ<'d> {
    dialect: &'d dyn SqlDialect,
    target: TableTarget,
    state: LiveTable,
    statements: Vec<String>,
}

impl Differ<'_> {
    fn emit(&mut self, statement: String) {
        self.statements.push(statement);
    }

    fn live(&self, name: &str) -> Option<&ColumnDefinition> {
        self.state.column(name)
    }

    fn reconcile(&mut self, column: &DeclaredColumn<'_>) -> Result<()> {
        self.add_missing(column);
        self.change_type(column);
        self.change_nullability(column)?;
        self.change_unique(column);
        self.change_default(column);
        self.change_primary_key(column);
        self.change_foreign_key(column);
        Ok(())
    }

    /// New columns start nullable; the nullability step fills and tightens them.
    fn add_missing(&mut self, column: &DeclaredColumn<'_>) {
        if self.live(column.name()).is_some() {
            return;
        }
        let table = self.target.qualified.clone();
        self.emit(self.dialect.add_column(&table, column.name(), &column.sql_type));
        self.state.columns.push(ColumnDefinition {
            is_nullable: true,
            column_default: None,
            ..column.projected()
        });
    }

    fn change_type(&mut self, column: &DeclaredColumn<'_>) {
        let Some(live) = self.live(column.name()) else {
            return;
        };
        if self.dialect.live_type(live).eq_ignore_ascii_case(&column.sql_type) {
            return;
        }
        let nullable = live.is_nullable;
        self.alter_column(column, nullable);
    }

    fn change_nullability(&mut self, column: &DeclaredColumn<'_>) -> Result<()> {
        let Some(live) = self.live(column.name()) else {
            return Ok(());
        };
        if live.is_nullable == column.nullable {
            return Ok(());
        }
        if !column.nullable {
            let fill = column.fill_value(self.dialect)?;
            let table = self.target.qualified.clone();
            self.emit(self.dialect.fill_nulls(&table, column.name(), &fill));
        }
        self.alter_column(column, column.nullable);
        Ok(())
    }

    /// ALTER COLUMN to the declared type. Constraints and the default that
    /// depend on the column are dropped first; the later steps re-add them.
    fn alter_column(&mut self, column: &DeclaredColumn<'_>, nullable: bool) {
        let table = self.target.qualified.clone();
        self.drop_default(column.name());
        let dependent: Vec<ConstraintDefinition> =
            self.state.constraints_on(column.name()).cloned().collect();
        for constraint in dependent {
            self.drop_constraint(&constraint);
        }

        self.emit(self.dialect.alter_column(&table, column.name(), &column.sql_type, nullable));
        if let Some(live) = self.state.column_mut(column.name()) {
            *live = ColumnDefinition {
                is_nullable: nullable,
                column_default: None,
                ..column.projected()
            };
        }
    }

    fn change_unique(&mut self, column: &DeclaredColumn<'_>) {
        let live = self
            .state
            .constraint_on(column.name(), ConstraintKind::Unique)
            .cloned();
        match (column.unique, live) {
            (true, None) => {
                let name = self.target.constraint(UNIQUE_PREFIX, column.name());
                let statement = self
                    .dialect
                    .add_unique(&self.target.qualified, &name, column.name());
                self.emit(statement);
                self.add_constraint(name, column.name(), ConstraintKind::Unique, None);
            }
            (false, Some(constraint)) => self.drop_constraint(&constraint),
            _ => {}
        }
    }

    fn change_default(&mut self, column: &DeclaredColumn<'_>) {
        let Some(live) = self.live(column.name()) else {
            return;
        };
        let live_default = live.column_default.clone();
        let unchanged = match (&live_default, &column.default) {
            (None, None) => true,
            (Some(live), Some(declared)) => {
                self.dialect
                    .same_default(column.property.kind, live, declared)
            }
            _ => false,
        };
        if unchanged {
            return;
        }

        if live_default.is_some() {
            self.drop_default(column.name());
        }
        if let Some(literal) = &column.default {
            let name = self.target.constraint(DEFAULT_PREFIX, column.name());
            let statement =
                self.dialect
                    .add_default(&self.target.qualified, &name, column.name(), literal);
            self.emit(statement);
            if let Some(live) = self.state.column_mut(column.name()) {
                live.column_default = Some(literal.clone());
            }
        }
    }

    fn change_primary_key(&mut self, column: &DeclaredColumn<'_>) {
        let live = self
            .state
            .constraint_on(column.name(), ConstraintKind::PrimaryKey)
            .cloned();
        match (column.primary_key, live) {
            (true, None) => {
                // A table holds one primary key; release any other first.
                let others: Vec<ConstraintDefinition> = self
                    .state
                    .constraints
                    .iter()
                    .filter(|c| c.kind == ConstraintKind::PrimaryKey)
                    .cloned()
                    .collect();
                for other in others {
                    self.drop_constraint(&other);
                }
                let name = self.target.constraint(PRIMARY_KEY_PREFIX, column.name());
                let statement =
                    self.dialect
                        .add_primary_key(&self.target.qualified, &name, column.name());
                self.emit(statement);
                self.add_constraint(name, column.name(), ConstraintKind::PrimaryKey, None);
            }
            (false, Some(constraint)) => self.drop_constraint(&constraint),
            _ => {}
        }
    }

    fn change_foreign_key(&mut self, column: &DeclaredColumn<'_>) {
        let live = self
            .state
            .constraint_on(column.name(), ConstraintKind::ForeignKey)
            .cloned();
        let declared = column.reference.as_ref();

        if let Some(constraint) = &live {
            let matches = declared.is_some_and(|r| constraint.delete_rule.unwrap_or_default() == r.on_delete);
            if matches {
                return;
            }
            self.drop_constraint(constraint);
        }
        if let Some(reference) = declared {
            let name = self.target.constraint(FOREIGN_KEY_PREFIX, column.name());
            let statement = self.dialect.add_foreign_key(
                &self.target.qualified,
                &name,
                column.name(),
                &reference.table,
                &reference.column,
                reference.on_delete,
            );
            self.emit(statement);
            self.add_constraint(
                name,
                column.name(),
                ConstraintKind::ForeignKey,
                Some(reference.on_delete),
            );
        }
    }

    fn drop_undeclared(&mut self, composition: &ModelComposition) {
        let undeclared: Vec<String> = self
            .state
            .columns
            .iter()
            .filter(|live| {
                !composition
                    .persisted()
                    .any(|p| p.name.eq_ignore_ascii_case(&live.column_name))
            })
            .map(|live| live.column_name.clone())
            .collect();

        for name in undeclared {
            self.drop_default(&name);
            for kind in [
                ConstraintKind::Unique,
                ConstraintKind::ForeignKey,
                ConstraintKind::PrimaryKey,
            ] {
                if let Some(constraint) = self.state.constraint_on(&name, kind).cloned() {
                    self.drop_constraint(&constraint);
                }
            }
            let statement = self.dialect.drop_column(&self.target.qualified, &name);
            self.emit(statement);
            self.state.remove_column(&name);
        }
    }

    fn drop_default(&mut self, column: &str) {
        let has_default = self
            .live(column)
            .is_some_and(|live| live.column_default.is_some());
        if !has_default {
            return;
        }
        let name = self.target.constraint(DEFAULT_PREFIX, column);
        let statement = self
            .dialect
            .drop_default(&self.target.qualified, &name, column);
        self.emit(statement);
        if let Some(live) = self.state.column_mut(column) {
            live.column_default = None;
        }
    }

    fn drop_constraint(&mut self, constraint: &ConstraintDefinition) {
        let table = &self.target.qualified;
        let statement = match constraint.kind {
            ConstraintKind::PrimaryKey => self.dialect.drop_primary_key(table, &constraint.name),
            ConstraintKind::ForeignKey => self.dialect.drop_foreign_key(table, &constraint.name),
            ConstraintKind::Unique => self.dialect.drop_unique(table, &constraint.name),
        };
        self.emit(statement);
        self.state.remove_constraint(&constraint.name);
    }

    fn add_constraint(
        &mut self,
        name: String,
        column: &str,
        kind: ConstraintKind,
        delete_rule: Option<crate::catalog::ForeignAction>,
    ) {
        self.state.constraints.push(ConstraintDefinition {
            name,
            column: column.to_string(),
            kind,
            delete_rule,
        });
    }
}
