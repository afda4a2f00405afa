//! Rows, tabular driver results and the uniform result envelope.

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::parameter::Parameter;
use crate::value::{FromValue, Value};

/// A single row as ordered `(column, value)` pairs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Row {
    pub fields: Vec<(String, Value)>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a column, builder style.
    pub fn with(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(column, value);
        self
    }

    /// Get a column value by name.
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.fields
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, v)| v)
    }

    /// Set a column, replacing an existing value or appending a new column.
    pub fn set(&mut self, column: impl Into<String>, value: impl Into<Value>) {
        let column = column.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(name, _)| *name == column) {
            Some((_, slot)) => *slot = value,
            None => self.fields.push((column, value)),
        }
    }

    /// Read a column converted to `T`.
    pub fn value<T: FromValue>(&self, column: &str) -> Result<T, Error> {
        let raw = self
            .get(column)
            .ok_or_else(|| Error::MissingColumn(column.to_string()))?;
        T::from_value(raw).ok_or_else(|| Error::TypeMismatch {
            column: column.to_string(),
            expected: std::any::type_name::<T>(),
            actual: raw.type_name(),
        })
    }

    /// Overwrite columns with the non-null values of `other`.
    ///
    /// Mirrors the null-coalescing update: a null in `other` keeps the
    /// existing value.
    pub fn merge_non_null(&mut self, other: &Row) {
        for (name, value) in &other.fields {
            if !value.is_null() {
                self.set(name.clone(), value.clone());
            }
        }
    }

    /// Column names in order.
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(name, _)| name.as_str())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Convert every column into a parameter.
    pub fn to_parameters(&self) -> Vec<Parameter> {
        self.fields
            .iter()
            .map(|(name, value)| Parameter::new(name.clone(), value.clone()))
            .collect()
    }

    /// Build a row from parameters.
    pub fn from_parameters(parameters: &[Parameter]) -> Self {
        let mut row = Row::new();
        for p in parameters {
            row.set(p.name.clone(), p.value.clone());
        }
        row
    }
}

impl From<Vec<(String, Value)>> for Row {
    fn from(fields: Vec<(String, Value)>) -> Self {
        Self { fields }
    }
}

/// Tabular result returned by the driver for one procedure call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Tabular {
    /// Table the rows belong to, when known.
    pub table: String,
    pub rows: Vec<Row>,
}

impl Tabular {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            rows: Vec::new(),
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_rows(mut self, rows: Vec<Row>) -> Self {
        self.rows = rows;
        self
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Uniform envelope returned by every data operation.
///
/// Success is carried by the surrounding `Result`; the envelope holds the
/// payload and whether it was served from the cache.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryResult<T = Row> {
    pub data: Vec<T>,
    pub from_cache: bool,
}

impl<T> QueryResult<T> {
    pub fn new(data: Vec<T>, from_cache: bool) -> Self {
        Self { data, from_cache }
    }

    pub fn from_database(data: Vec<T>) -> Self {
        Self::new(data, false)
    }

    pub fn from_cache(data: Vec<T>) -> Self {
        Self::new(data, true)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn first(&self) -> Option<&T> {
        self.data.first()
    }

    /// Convert the payload, keeping provenance.
    pub fn try_map<U, E, F>(self, f: F) -> Result<QueryResult<U>, E>
    where
        F: FnMut(T) -> Result<U, E>,
    {
        let data = self.data.into_iter().map(f).collect::<Result<Vec<_>, E>>()?;
        Ok(QueryResult {
            data,
            from_cache: self.from_cache,
        })
    }
}
