//! Named parameters passed to stored procedures and ad-hoc filters.

use serde::{Deserialize, Serialize};

use crate::value::Value;

/// A name/value pair.
///
/// The name is the bare property name; dialects add their own prefix when
/// binding (`@_Name` for SQL Server, `_Name` for MySQL).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub value: Value,
}

impl Parameter {
    pub fn new(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Find a parameter by name.
pub fn find<'a>(parameters: &'a [Parameter], name: &str) -> Option<&'a Value> {
    parameters.iter().find(|p| p.name == name).map(|p| &p.value)
}
