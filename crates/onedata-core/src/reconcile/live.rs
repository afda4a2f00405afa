//! Live table metadata read from the information schema.

use onedata_proto::{Row, Tabular, Value};
use serde::{Deserialize, Serialize};

use crate::catalog::ForeignAction;
use crate::error::Result;

/// One column as reported by `INFORMATION_SCHEMA.COLUMNS`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDefinition {
    pub column_name: String,
    pub data_type: String,
    /// Full type text (MySQL only).
    #[serde(default)]
    pub column_type: Option<String>,
    #[serde(default)]
    pub character_maximum_length: Option<i64>,
    #[serde(default)]
    pub numeric_precision: Option<i64>,
    #[serde(default)]
    pub numeric_scale: Option<i64>,
    pub is_nullable: bool,
    #[serde(default)]
    pub column_default: Option<String>,
}

impl ColumnDefinition {
    /// Parse one row of the columns query.
    pub fn from_row(row: &Row) -> Result<Self> {
        Ok(Self {
            column_name: required_text(row, "COLUMN_NAME")?,
            data_type: required_text(row, "DATA_TYPE")?,
            column_type: text(row, "COLUMN_TYPE"),
            character_maximum_length: number(row, "CHARACTER_MAXIMUM_LENGTH"),
            numeric_precision: number(row, "NUMERIC_PRECISION"),
            numeric_scale: number(row, "NUMERIC_SCALE"),
            is_nullable: text(row, "IS_NULLABLE")
                .map(|v| v.eq_ignore_ascii_case("YES"))
                .unwrap_or(true),
            column_default: text(row, "COLUMN_DEFAULT"),
        })
    }
}

/// Constraint kinds the reconciler manages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConstraintKind {
    PrimaryKey,
    ForeignKey,
    Unique,
}

impl ConstraintKind {
    /// Parse `TABLE_CONSTRAINTS.CONSTRAINT_TYPE`. CHECK constraints are ignored.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "PRIMARY KEY" => Some(ConstraintKind::PrimaryKey),
            "FOREIGN KEY" => Some(ConstraintKind::ForeignKey),
            "UNIQUE" => Some(ConstraintKind::Unique),
            _ => None,
        }
    }
}

/// A single-column constraint on a live table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstraintDefinition {
    pub name: String,
    pub column: String,
    pub kind: ConstraintKind,
    /// Delete rule of a foreign key.
    #[serde(default)]
    pub delete_rule: Option<ForeignAction>,
}

impl ConstraintDefinition {
    /// Parse one row of the constraints query. Unmanaged kinds yield `None`.
    pub fn from_row(row: &Row) -> Result<Option<Self>> {
        let Some(kind) = text(row, "CONSTRAINT_TYPE").and_then(|t| ConstraintKind::parse(&t)) else {
            return Ok(None);
        };
        Ok(Some(Self {
            name: required_text(row, "CONSTRAINT_NAME")?,
            column: required_text(row, "COLUMN_NAME")?,
            kind,
            delete_rule: text(row, "DELETE_RULE").and_then(|r| ForeignAction::parse(&r)),
        }))
    }
}

/// Snapshot of a live table: its columns and constraints.
///
/// A table with no columns does not exist.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiveTable {
    #[serde(default)]
    pub columns: Vec<ColumnDefinition>,
    #[serde(default)]
    pub constraints: Vec<ConstraintDefinition>,
}

impl LiveTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_column(mut self, column: ColumnDefinition) -> Self {
        self.columns.push(column);
        self
    }

    pub fn with_constraint(mut self, constraint: ConstraintDefinition) -> Self {
        self.constraints.push(constraint);
        self
    }

    /// Build a snapshot from the results of the columns and constraints queries.
    pub fn from_tabular(columns: &Tabular, constraints: &Tabular) -> Result<Self> {
        let columns = columns
            .rows
            .iter()
            .map(ColumnDefinition::from_row)
            .collect::<Result<Vec<_>>>()?;
        let mut parsed = Vec::new();
        for row in &constraints.rows {
            if let Some(constraint) = ConstraintDefinition::from_row(row)? {
                parsed.push(constraint);
            }
        }
        Ok(Self {
            columns,
            constraints: parsed,
        })
    }

    pub fn exists(&self) -> bool {
        !self.columns.is_empty()
    }

    /// Column lookup. Identifiers compare case-insensitively.
    pub fn column(&self, name: &str) -> Option<&ColumnDefinition> {
        self.columns
            .iter()
            .find(|c| c.column_name.eq_ignore_ascii_case(name))
    }

    pub(crate) fn column_mut(&mut self, name: &str) -> Option<&mut ColumnDefinition> {
        self.columns
            .iter_mut()
            .find(|c| c.column_name.eq_ignore_ascii_case(name))
    }

    /// Constraint of `kind` on `column`.
    pub fn constraint_on(&self, column: &str, kind: ConstraintKind) -> Option<&ConstraintDefinition> {
        self.constraints
            .iter()
            .find(|c| c.kind == kind && c.column.eq_ignore_ascii_case(column))
    }

    /// All constraints on `column`.
    pub fn constraints_on<'a>(&'a self, column: &'a str) -> impl Iterator<Item = &'a ConstraintDefinition> {
        self.constraints
            .iter()
            .filter(move |c| c.column.eq_ignore_ascii_case(column))
    }

    pub(crate) fn remove_constraint(&mut self, name: &str) {
        self.constraints.retain(|c| c.name != name);
    }

    pub(crate) fn remove_column(&mut self, name: &str) {
        self.columns.retain(|c| !c.column_name.eq_ignore_ascii_case(name));
        self.constraints.retain(|c| !c.column.eq_ignore_ascii_case(name));
    }
}

/// Names of the procedures returned by the routines query.
pub fn routine_names(routines: &Tabular) -> Vec<String> {
    routines
        .rows
        .iter()
        .filter_map(|row| text(row, "ROUTINE_NAME"))
        .collect()
}

// Drivers disagree on the case of information-schema headers.
fn field<'a>(row: &'a Row, name: &str) -> Option<&'a Value> {
    row.fields
        .iter()
        .find(|(column, _)| column.eq_ignore_ascii_case(name))
        .map(|(_, value)| value)
}

fn text(row: &Row, name: &str) -> Option<String> {
    match field(row, name)? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.key_string()),
    }
}

fn required_text(row: &Row, name: &str) -> Result<String> {
    text(row, name).ok_or_else(|| onedata_proto::Error::MissingColumn(name.to_string()).into())
}

fn number(row: &Row, name: &str) -> Option<i64> {
    let value = field(row, name)?;
    value
        .as_i64()
        .or_else(|| value.as_str().and_then(|s| s.trim().parse().ok()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn column_row(name: &str, data_type: &str, nullable: &str) -> Row {
        Row::new()
            .with("COLUMN_NAME", name)
            .with("DATA_TYPE", data_type)
            .with("CHARACTER_MAXIMUM_LENGTH", Value::Int32(255))
            .with("NUMERIC_PRECISION", Value::Null)
            .with("NUMERIC_SCALE", Value::Null)
            .with("IS_NULLABLE", nullable)
            .with("COLUMN_DEFAULT", Value::Null)
    }

    #[test]
    fn test_parse_columns_and_constraints() {
        let columns = Tabular::new("COLUMNS").with_rows(vec![
            column_row("Id", "int", "NO"),
            column_row("Name", "varchar", "YES"),
        ]);
        let constraints = Tabular::new("TABLE_CONSTRAINTS").with_rows(vec![
            Row::new()
                .with("CONSTRAINT_NAME", "PK_dbo_Blog_Id")
                .with("COLUMN_NAME", "Id")
                .with("CONSTRAINT_TYPE", "PRIMARY KEY")
                .with("DELETE_RULE", Value::Null),
            Row::new()
                .with("CONSTRAINT_NAME", "CK_dbo_Blog_Name")
                .with("COLUMN_NAME", "Name")
                .with("CONSTRAINT_TYPE", "CHECK")
                .with("DELETE_RULE", Value::Null),
        ]);

        let live = LiveTable::from_tabular(&columns, &constraints).unwrap();
        assert!(live.exists());
        assert_eq!(live.columns.len(), 2);
        assert!(!live.column("id").unwrap().is_nullable);
        assert_eq!(live.column("Name").unwrap().character_maximum_length, Some(255));
        assert_eq!(live.constraints.len(), 1);
        assert!(live.constraint_on("Id", ConstraintKind::PrimaryKey).is_some());
    }

    #[test]
    fn test_missing_column_name_is_an_error() {
        let columns = Tabular::new("COLUMNS").with_rows(vec![Row::new().with("DATA_TYPE", "int")]);
        assert!(LiveTable::from_tabular(&columns, &Tabular::empty()).is_err());
    }

    #[test]
    fn test_remove_column_drops_its_constraints() {
        let mut live = LiveTable::new()
            .with_column(ColumnDefinition::from_row(&column_row("Code", "varchar", "YES")).unwrap())
            .with_constraint(ConstraintDefinition {
                name: "UQ_dbo_T_Code".into(),
                column: "Code".into(),
                kind: ConstraintKind::Unique,
                delete_rule: None,
            });
        live.remove_column("code");
        assert!(!live.exists());
        assert!(live.constraints.is_empty());
    }

    #[test]
    fn test_routine_names() {
        let routines = Tabular::new("ROUTINES").with_rows(vec![
            Row::new().with("routine_name", "spBlogInsert"),
            Row::new().with("ROUTINE_NAME", "spBlogUpdate"),
        ]);
        assert_eq!(routine_names(&routines), vec!["spBlogInsert", "spBlogUpdate"]);
    }
}
