//! SQL dialects.
//!
//! The translator and the reconciler never hard-code database syntax. They go
//! through a [`SqlDialect`], implemented once per supported family.

mod mssql;
mod mysql;

use std::borrow::Cow;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use onedata_proto::Value;

pub use mssql::MsSqlDialect;
pub use mysql::MySqlDialect;

use crate::catalog::{AutoKind, ForeignAction, PrimitiveKind, PropertyDescriptor};
use crate::config::DatabaseFamily;
use crate::error::{Error, Result};
use crate::reconcile::ColumnDefinition;

/// Length used for string columns without a declared length, and the cap
/// applied to unique string columns.
pub const DEFAULT_STRING_LENGTH: u32 = 255;

/// Words either family refuses as a bare identifier.
const RESERVED_WORDS: &[&str] = &[
    "ADD", "ALL", "ALTER", "AND", "ANY", "AS", "ASC", "BETWEEN", "BY", "CASE", "CHECK", "COLUMN",
    "CONSTRAINT", "CREATE", "CROSS", "CURRENT_DATE", "CURRENT_TIME", "CURRENT_TIMESTAMP",
    "CURRENT_USER", "DATABASE", "DEFAULT", "DELETE", "DESC", "DISTINCT", "DROP", "ELSE", "END",
    "EXISTS", "FOREIGN", "FROM", "FULL", "FUNCTION", "GRANT", "GROUP", "HAVING", "IN", "INDEX",
    "INNER", "INSERT", "INTO", "IS", "JOIN", "KEY", "KEYS", "LEFT", "LIKE", "LIMIT", "NOT", "NULL",
    "OF", "ON", "OPTION", "OR", "ORDER", "OUTER", "PRIMARY", "PROCEDURE", "READ", "REFERENCES",
    "RIGHT", "SCHEMA", "SELECT", "SET", "TABLE", "THEN", "TO", "TRANSACTION", "TRIGGER", "UNION",
    "UNIQUE", "UPDATE", "USE", "USER", "VALUES", "VIEW", "WHEN", "WHERE", "WITH",
];

/// Check if `name` must be delimited to be used as an identifier.
pub fn is_reserved(name: &str) -> bool {
    RESERVED_WORDS.iter().any(|word| word.eq_ignore_ascii_case(name))
}

/// A column as it appears in a CREATE TABLE statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSpec {
    pub name: String,
    pub sql_type: String,
    pub nullable: bool,
    pub identity: bool,
}

/// One parameter of a generated procedure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcedureParameter {
    pub name: String,
    pub sql_type: String,
    /// Defaults to NULL where the dialect supports parameter defaults.
    pub optional: bool,
}

impl ProcedureParameter {
    pub fn required(name: impl Into<String>, sql_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sql_type: sql_type.into(),
            optional: false,
        }
    }

    pub fn optional(name: impl Into<String>, sql_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sql_type: sql_type.into(),
            optional: true,
        }
    }
}

/// Dialect-specific SQL generation.
pub trait SqlDialect: Send + Sync + std::fmt::Debug {
    fn family(&self) -> DatabaseFamily;

    /// Prefix added to a property name to form its procedure parameter.
    fn parameter_prefix(&self) -> &'static str;

    /// Procedure parameter name for a property.
    fn parameter(&self, name: &str) -> String {
        format!("{}{}", self.parameter_prefix(), name)
    }

    /// Null-coalescing function (`ISNULL`, `IFNULL`).
    fn null_coalesce(&self) -> &'static str;

    /// Expression assigning a server-populated value.
    fn auto_value(&self, kind: AutoKind) -> &'static str;

    /// Expression returning the identity assigned by the last insert.
    fn last_identity(&self) -> &'static str;

    /// Expression producing a new GUID.
    fn new_guid(&self) -> &'static str;

    fn bool_literal(&self, value: bool) -> &'static str;

    fn bytes_literal(&self, bytes: &[u8]) -> String;

    /// SQL type of a property.
    ///
    /// Unique string columns are capped at [`DEFAULT_STRING_LENGTH`] so they
    /// stay indexable.
    fn sql_type(&self, property: &PropertyDescriptor, unique: bool) -> String;

    /// Canonical type text of a live column, comparable with [`sql_type`].
    ///
    /// [`sql_type`]: SqlDialect::sql_type
    fn live_type(&self, column: &ColumnDefinition) -> String;

    /// Normalize a default expression so live and declared defaults compare.
    fn canonical_default(&self, raw: &str) -> String;

    /// Check if a reported default and a declared literal denote the same
    /// value for a column of `kind`.
    ///
    /// Databases normalize what they report (`0.00` for a decimal `0`, no
    /// fractional seconds on a datetime), so numbers, booleans and
    /// timestamps are compared by value. Anything unparsable falls back to
    /// the canonical text.
    fn same_default(&self, kind: PrimitiveKind, live: &str, declared: &str) -> bool {
        let live = self.canonical_default(live);
        let declared = self.canonical_default(declared);
        if live == declared {
            return true;
        }
        let (a, b) = (unwrap_default(&live), unwrap_default(&declared));
        let by_value = match kind {
            PrimitiveKind::Bool => parse_bool(a).zip(parse_bool(b)).map(|(a, b)| a == b),
            PrimitiveKind::DateTime => parse_datetime(a).zip(parse_datetime(b)).map(|(a, b)| a == b),
            kind if kind.is_numeric() => parse_number(a).zip(parse_number(b)).map(|(a, b)| a == b),
            _ => None,
        };
        by_value.unwrap_or(false)
    }

    /// Delimited identifier (`[Order]`, `` `Order` ``).
    fn delimit(&self, name: &str) -> String;

    /// Column name as written in generated SQL. Reserved words are
    /// delimited, everything else is left bare.
    fn identifier<'n>(&self, name: &'n str) -> Cow<'n, str> {
        if is_reserved(name) {
            Cow::Owned(self.delimit(name))
        } else {
            Cow::Borrowed(name)
        }
    }

    /// Schema-qualified object name.
    fn qualify(&self, schema: &str, name: &str) -> String {
        format!("{schema}.{name}")
    }

    /// Render a value as a SQL literal.
    fn literal(&self, value: &Value) -> Result<String> {
        Ok(match value {
            Value::Null => "NULL".to_string(),
            Value::Bool(b) => self.bool_literal(*b).to_string(),
            Value::Int32(i) => i.to_string(),
            Value::Int64(i) => i.to_string(),
            Value::Float32(f) if f.is_finite() => f.to_string(),
            Value::Float64(f) if f.is_finite() => f.to_string(),
            Value::Float32(_) | Value::Float64(_) => {
                return Err(Error::UnsupportedExpression(
                    "non-finite floating point literal".into(),
                ))
            }
            Value::String(s) => quote(s),
            Value::Bytes(b) => self.bytes_literal(b),
            Value::Timestamp(micros) => quote(&format_timestamp(*micros)?),
            Value::Uuid(u) => quote(&format_uuid(u)),
        })
    }

    /// CREATE or ALTER text for a procedure. Returns every statement needed.
    fn procedure(
        &self,
        qualified_name: &str,
        parameters: &[ProcedureParameter],
        body: &[String],
        alter: bool,
    ) -> Vec<String>;

    /// Local variable declaration with an initial value.
    fn declare(&self, name: &str, sql_type: &str, initial: &str) -> String;

    /// Body of the filtered select procedure. The WHERE fragment arrives in
    /// the `expression` parameter and is executed as dynamic SQL.
    fn dynamic_select(&self, table: &str, order_by: &str) -> Vec<String>;

    /// Body of the select-all procedure with optional paging.
    fn paged_select_all(&self, table: &str, order_by: &str) -> Vec<String>;

    /// Type of the `expression` parameter.
    fn expression_type(&self) -> &'static str;

    fn create_table(&self, table: &str, columns: &[ColumnSpec], primary_key: (&str, &str)) -> String;

    fn add_column(&self, table: &str, column: &str, sql_type: &str) -> String;

    fn alter_column(&self, table: &str, column: &str, sql_type: &str, nullable: bool) -> String;

    fn drop_column(&self, table: &str, column: &str) -> String {
        format!("ALTER TABLE {table} DROP COLUMN {}", self.identifier(column))
    }

    fn fill_nulls(&self, table: &str, column: &str, literal: &str) -> String {
        let column = self.identifier(column);
        format!("UPDATE {table} SET {column} = {literal} WHERE {column} IS NULL")
    }

    fn add_unique(&self, table: &str, constraint: &str, column: &str) -> String {
        format!(
            "ALTER TABLE {table} ADD CONSTRAINT {constraint} UNIQUE ({})",
            self.identifier(column)
        )
    }

    fn drop_unique(&self, table: &str, constraint: &str) -> String;

    fn add_default(&self, table: &str, constraint: &str, column: &str, literal: &str) -> String;

    fn drop_default(&self, table: &str, constraint: &str, column: &str) -> String;

    fn add_primary_key(&self, table: &str, constraint: &str, column: &str) -> String {
        format!(
            "ALTER TABLE {table} ADD CONSTRAINT {constraint} PRIMARY KEY ({})",
            self.identifier(column)
        )
    }

    fn drop_primary_key(&self, table: &str, constraint: &str) -> String;

    fn add_foreign_key(
        &self,
        table: &str,
        constraint: &str,
        column: &str,
        referenced_table: &str,
        referenced_column: &str,
        on_delete: ForeignAction,
    ) -> String {
        format!(
            "ALTER TABLE {table} ADD CONSTRAINT {constraint} FOREIGN KEY ({}) \
             REFERENCES {referenced_table}({}) ON DELETE {} ON UPDATE NO ACTION",
            self.identifier(column),
            self.identifier(referenced_column),
            on_delete.sql()
        )
    }

    fn drop_foreign_key(&self, table: &str, constraint: &str) -> String;

    /// Query listing the live columns of a table.
    fn columns_query(&self, schema: &str, table: &str) -> String {
        format!(
            "SELECT COLUMN_NAME, DATA_TYPE, CHARACTER_MAXIMUM_LENGTH, NUMERIC_PRECISION, \
             NUMERIC_SCALE, IS_NULLABLE, COLUMN_DEFAULT FROM INFORMATION_SCHEMA.COLUMNS \
             WHERE TABLE_SCHEMA = {} AND TABLE_NAME = {} ORDER BY ORDINAL_POSITION",
            quote(schema),
            quote(table)
        )
    }

    /// Query listing the key, unique and foreign constraints of a table.
    fn constraints_query(&self, schema: &str, table: &str) -> String {
        format!(
            "SELECT tc.CONSTRAINT_NAME, kcu.COLUMN_NAME, tc.CONSTRAINT_TYPE, rc.DELETE_RULE \
             FROM INFORMATION_SCHEMA.TABLE_CONSTRAINTS tc \
             JOIN INFORMATION_SCHEMA.KEY_COLUMN_USAGE kcu \
             ON tc.CONSTRAINT_NAME = kcu.CONSTRAINT_NAME AND tc.TABLE_SCHEMA = kcu.TABLE_SCHEMA \
             AND tc.TABLE_NAME = kcu.TABLE_NAME \
             LEFT JOIN INFORMATION_SCHEMA.REFERENTIAL_CONSTRAINTS rc \
             ON tc.CONSTRAINT_NAME = rc.CONSTRAINT_NAME AND tc.TABLE_SCHEMA = rc.CONSTRAINT_SCHEMA \
             WHERE tc.TABLE_SCHEMA = {} AND tc.TABLE_NAME = {}",
            quote(schema),
            quote(table)
        )
    }

    /// Query listing the stored procedures of a schema.
    fn routines_query(&self, schema: &str) -> String {
        format!(
            "SELECT ROUTINE_NAME FROM INFORMATION_SCHEMA.ROUTINES \
             WHERE ROUTINE_SCHEMA = {} AND ROUTINE_TYPE = 'PROCEDURE'",
            quote(schema)
        )
    }
}

/// Dialect for a configured database family.
pub fn dialect_for(family: DatabaseFamily) -> Arc<dyn SqlDialect> {
    match family {
        DatabaseFamily::MsSql => Arc::new(MsSqlDialect),
        DatabaseFamily::MySql => Arc::new(MySqlDialect),
    }
}

/// Quote a string literal, doubling embedded quotes.
pub fn quote(raw: &str) -> String {
    format!("'{}'", raw.replace('\'', "''"))
}

/// Strip the parentheses and quotes a default may still carry.
fn unwrap_default(raw: &str) -> &str {
    let mut text = raw.trim();
    loop {
        let inner = if text.len() >= 2 && text.starts_with('(') && text.ends_with(')') {
            &text[1..text.len() - 1]
        } else if text.len() >= 2 && text.starts_with('\'') && text.ends_with('\'') {
            &text[1..text.len() - 1]
        } else if text.len() >= 3 && text.starts_with("b'") && text.ends_with('\'') {
            &text[2..text.len() - 1]
        } else {
            return text;
        };
        text = inner.trim();
    }
}

fn parse_number(text: &str) -> Option<f64> {
    text.parse::<f64>().ok().filter(|n| n.is_finite())
}

fn parse_bool(text: &str) -> Option<bool> {
    if text.eq_ignore_ascii_case("true") {
        return Some(true);
    }
    if text.eq_ignore_ascii_case("false") {
        return Some(false);
    }
    parse_number(text).map(|n| n != 0.0)
}

fn parse_datetime(text: &str) -> Option<NaiveDateTime> {
    const FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];
    FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(text, "%Y-%m-%d")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
}

/// Effective length of a string column.
pub(crate) fn string_length(property: &PropertyDescriptor, unique: bool) -> u32 {
    let declared = property
        .declared_length()
        .filter(|n| *n > 0)
        .unwrap_or(DEFAULT_STRING_LENGTH);
    if unique {
        declared.min(DEFAULT_STRING_LENGTH)
    } else {
        declared
    }
}

fn format_timestamp(micros: i64) -> Result<String> {
    let datetime = DateTime::from_timestamp_micros(micros).ok_or_else(|| {
        Error::UnsupportedExpression(format!("timestamp {micros} is out of range"))
    })?;
    Ok(datetime.naive_utc().format("%Y-%m-%d %H:%M:%S%.3f").to_string())
}

/// Hyphenated lowercase GUID text.
pub fn format_uuid(bytes: &[u8; 16]) -> String {
    let hex = hex::encode(bytes);
    format!(
        "{}-{}-{}-{}-{}",
        &hex[0..8],
        &hex[8..12],
        &hex[12..16],
        &hex[16..20],
        &hex[20..32]
    )
}
