//! Shared fixtures: an in-memory procedure executor and sample models.

#![allow(dead_code)]

use std::collections::HashMap;
use std::time::Duration;

use onedata_core::dialect::MsSqlDialect;
use onedata_core::reconcile::LiveTable;
use onedata_core::translate::{to_sql, MemoryFilter};
use onedata_core::{
    KeyGeneration, Manageable, ModelDescriptor, PrimitiveKind, ProcedureExecutor,
    PropertyDescriptor, StoreError,
};
use onedata_proto::{Expr, Parameter, Row, Tabular, Value};
use parking_lot::Mutex;

/// A recorded procedure call.
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub procedure: String,
    pub connection: String,
    pub parameters: Vec<Parameter>,
}

impl Call {
    pub fn parameter(&self, name: &str) -> Option<&Value> {
        onedata_proto::parameter::find(&self.parameters, name)
    }
}

#[derive(Default)]
struct State {
    tables: HashMap<String, Vec<Row>>,
    filters: Vec<(String, MemoryFilter)>,
    schema: HashMap<String, LiveTable>,
    routines: Vec<String>,
    calls: Vec<Call>,
    commands: Vec<String>,
    /// Procedure to fail, optionally only for one key.
    failing: Option<(String, Option<String>)>,
    next_id: i32,
    read_back: bool,
}

/// Executor keeping tables in memory.
///
/// The generated procedures are emulated by name suffix. The select
/// procedure only understands WHERE fragments registered with
/// [`FakeDatabase::understand`]. Information-schema queries answer from
/// [`FakeDatabase::set_schema`].
pub struct FakeDatabase {
    state: Mutex<State>,
}

impl Default for FakeDatabase {
    fn default() -> Self {
        Self {
            state: Mutex::new(State {
                next_id: 1,
                read_back: true,
                ..State::default()
            }),
        }
    }
}

impl FakeDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Teach the select procedure a predicate on `table`.
    pub fn understand(&self, table: &str, expr: &Expr) {
        let sql = to_sql(expr, &MsSqlDialect, Some(table)).unwrap();
        let filter = MemoryFilter::compile(expr).unwrap();
        self.state.lock().filters.push((sql, filter));
    }

    /// Write a row behind the manager's back.
    pub fn seed(&self, table: &str, row: Row) {
        let mut state = self.state.lock();
        if let Some(id) = row.get("Id").and_then(Value::as_i32) {
            state.next_id = state.next_id.max(id + 1);
        }
        state.tables.entry(table.to_string()).or_default().push(row);
    }

    pub fn rows(&self, table: &str) -> Vec<Row> {
        self.state.lock().tables.get(table).cloned().unwrap_or_default()
    }

    /// Make every call to `procedure` fail.
    pub fn fail_on(&self, procedure: &str) {
        self.state.lock().failing = Some((procedure.to_string(), None));
    }

    /// Make calls to `procedure` for the row with key `id` fail.
    pub fn fail_on_key(&self, procedure: &str, id: i32) {
        self.state.lock().failing = Some((procedure.to_string(), Some(Value::Int32(id).key_string())));
    }

    pub fn recover(&self) {
        self.state.lock().failing = None;
    }

    /// Make insert and update return no rows.
    pub fn without_read_back(&self) {
        self.state.lock().read_back = false;
    }

    pub fn set_schema(&self, table: &str, live: LiveTable) {
        self.state.lock().schema.insert(table.to_string(), live);
    }

    pub fn set_routines(&self, names: &[String]) {
        self.state.lock().routines = names.to_vec();
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().calls.clone()
    }

    /// Calls to procedures whose name ends with `suffix`.
    pub fn calls_to(&self, suffix: &str) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| c.procedure.ends_with(suffix))
            .collect()
    }

    pub fn commands(&self) -> Vec<String> {
        self.state.lock().commands.clone()
    }

    pub fn clear_log(&self) {
        let mut state = self.state.lock();
        state.calls.clear();
        state.commands.clear();
    }
}

fn paging(parameters: &[Parameter], rows: Vec<Row>) -> Vec<Row> {
    let number = |name: &str| {
        onedata_proto::parameter::find(parameters, name)
            .and_then(Value::as_i64)
            .map(|n| n as usize)
    };
    let skip = number("offset").unwrap_or(0);
    let take = number("maximumResults").unwrap_or(usize::MAX);
    rows.into_iter().skip(skip).take(take).collect()
}

fn failure(procedure: &str, message: &str) -> StoreError {
    StoreError::Execution {
        procedure: procedure.to_string(),
        message: message.to_string(),
    }
}

impl ProcedureExecutor for FakeDatabase {
    fn execute_procedure(
        &self,
        table_hint: &str,
        procedure: &str,
        connection: &str,
        parameters: &[Parameter],
    ) -> Result<Tabular, StoreError> {
        let mut state = self.state.lock();
        state.calls.push(Call {
            procedure: procedure.to_string(),
            connection: connection.to_string(),
            parameters: parameters.to_vec(),
        });
        if let Some((failing, only)) = &state.failing {
            let id = onedata_proto::parameter::find(parameters, "Id").map(Value::key_string);
            if failing == procedure && (only.is_none() || *only == id) {
                return Err(failure(procedure, "injected failure"));
            }
        }

        let read_back = state.read_back;
        let tabular = Tabular::new(table_hint);
        let key = |row: &Row| row.get("Id").map(Value::key_string);

        if procedure.ends_with("SelectAll") {
            let rows = state.tables.get(table_hint).cloned().unwrap_or_default();
            return Ok(tabular.with_rows(paging(parameters, rows)));
        }
        if procedure.ends_with("Select") {
            let expression = onedata_proto::parameter::find(parameters, "expression")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            let Some((_, filter)) = state.filters.iter().find(|(sql, _)| *sql == expression) else {
                return Err(failure(procedure, &format!("cannot evaluate {expression}")));
            };
            let rows = filter.filter(state.tables.get(table_hint).into_iter().flatten());
            return Ok(tabular.with_rows(paging(parameters, rows)));
        }
        if procedure.ends_with("Insert") {
            let mut row = Row::new();
            if !parameters.iter().any(|p| p.name == "Id") {
                row.set("Id", state.next_id);
                state.next_id += 1;
            }
            for p in parameters {
                row.set(p.name.clone(), p.value.clone());
            }
            state.tables.entry(table_hint.to_string()).or_default().push(row.clone());
            let rows = if read_back { vec![row] } else { Vec::new() };
            return Ok(tabular.with_rows(rows));
        }
        if procedure.ends_with("Update") {
            let changes = Row::from_parameters(parameters);
            let target = key(&changes);
            let rows = state.tables.entry(table_hint.to_string()).or_default();
            let Some(stored) = rows.iter_mut().find(|r| key(r) == target) else {
                return Ok(tabular);
            };
            stored.merge_non_null(&changes);
            let updated = stored.clone();
            return Ok(tabular.with_rows(if read_back { vec![updated] } else { Vec::new() }));
        }
        if procedure.ends_with("Delete") {
            let target = key(&Row::from_parameters(parameters));
            if let Some(rows) = state.tables.get_mut(table_hint) {
                rows.retain(|r| key(r) != target);
            }
            return Ok(tabular);
        }
        Err(failure(procedure, "unknown procedure"))
    }

    fn execute_command(&self, _connection: &str, sql: &str) -> Result<Tabular, StoreError> {
        let mut state = self.state.lock();
        state.commands.push(sql.to_string());

        let live = state
            .schema
            .iter()
            .find(|(table, _)| sql.contains(&format!("TABLE_NAME = '{table}'")))
            .map(|(_, live)| live.clone())
            .unwrap_or_default();

        if sql.contains("INFORMATION_SCHEMA.ROUTINES") {
            let rows = state
                .routines
                .iter()
                .map(|name| Row::new().with("ROUTINE_NAME", name.clone()))
                .collect();
            return Ok(Tabular::new("ROUTINES").with_rows(rows));
        }
        if sql.contains("INFORMATION_SCHEMA.TABLE_CONSTRAINTS") {
            let rows = live
                .constraints
                .iter()
                .map(|c| {
                    let kind = match c.kind {
                        onedata_core::reconcile::ConstraintKind::PrimaryKey => "PRIMARY KEY",
                        onedata_core::reconcile::ConstraintKind::ForeignKey => "FOREIGN KEY",
                        onedata_core::reconcile::ConstraintKind::Unique => "UNIQUE",
                    };
                    Row::new()
                        .with("CONSTRAINT_NAME", c.name.clone())
                        .with("COLUMN_NAME", c.column.clone())
                        .with("CONSTRAINT_TYPE", kind)
                        .with("DELETE_RULE", c.delete_rule.map(|r| r.sql().to_string()))
                })
                .collect();
            return Ok(Tabular::new("TABLE_CONSTRAINTS").with_rows(rows));
        }
        if sql.contains("INFORMATION_SCHEMA.COLUMNS") {
            let rows = live
                .columns
                .iter()
                .map(|c| {
                    Row::new()
                        .with("COLUMN_NAME", c.column_name.clone())
                        .with("DATA_TYPE", c.data_type.clone())
                        .with("COLUMN_TYPE", c.column_type.clone())
                        .with("CHARACTER_MAXIMUM_LENGTH", c.character_maximum_length)
                        .with("NUMERIC_PRECISION", c.numeric_precision)
                        .with("NUMERIC_SCALE", c.numeric_scale)
                        .with("IS_NULLABLE", if c.is_nullable { "YES" } else { "NO" })
                        .with("COLUMN_DEFAULT", c.column_default.clone())
                })
                .collect();
            return Ok(Tabular::new("COLUMNS").with_rows(rows));
        }
        Ok(Tabular::empty())
    }
}

/// Cached model with an identity key.
#[derive(Debug, Clone, PartialEq)]
pub struct Blog {
    pub id: Option<i32>,
    pub name: String,
    pub tagline: Option<String>,
}

impl Blog {
    pub fn new(name: &str) -> Self {
        Self {
            id: None,
            name: name.to_string(),
            tagline: None,
        }
    }

    pub fn stored(id: i32, name: &str) -> Self {
        Self {
            id: Some(id),
            ..Self::new(name)
        }
    }
}

impl Manageable for Blog {
    fn descriptor() -> ModelDescriptor {
        ModelDescriptor::new("Blog")
            .with_table("Blog")
            .with_cache(Duration::from_secs(60))
            .with_property(
                PropertyDescriptor::new("Id", PrimitiveKind::Int32)
                    .primary_key(KeyGeneration::AutoIncrement),
            )
            .with_property(PropertyDescriptor::new("Name", PrimitiveKind::String))
            .with_property(PropertyDescriptor::new("Tagline", PrimitiveKind::String).nullable())
    }

    fn to_row(&self) -> Row {
        Row::new()
            .with("Id", self.id)
            .with("Name", self.name.clone())
            .with("Tagline", self.tagline.clone())
    }

    fn from_row(row: &Row) -> Result<Self, onedata_proto::Error> {
        Ok(Self {
            id: row.get("Id").and_then(Value::as_i32),
            name: row.value("Name")?,
            tagline: row.get("Tagline").and_then(Value::as_str).map(String::from),
        })
    }
}

/// Uncached model with a caller-supplied key.
#[derive(Debug, Clone, PartialEq)]
pub struct Tag {
    pub id: i32,
    pub label: String,
}

impl Manageable for Tag {
    fn descriptor() -> ModelDescriptor {
        ModelDescriptor::new("Tag")
            .with_table("Tag")
            .with_property(
                PropertyDescriptor::new("Id", PrimitiveKind::Int32).primary_key(KeyGeneration::Supplied),
            )
            .with_property(PropertyDescriptor::new("Label", PrimitiveKind::String))
    }

    fn to_row(&self) -> Row {
        Row::new().with("Id", self.id).with("Label", self.label.clone())
    }

    fn from_row(row: &Row) -> Result<Self, onedata_proto::Error> {
        Ok(Self {
            id: row.value("Id")?,
            label: row.value("Label")?,
        })
    }
}
