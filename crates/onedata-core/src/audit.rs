//! Database audit log.
//!
//! With `log_in_database` set, every successful mutation writes one
//! [`LogEntry`] through the regular insert procedure of the `logs` table.

use chrono::{DateTime, Utc};
use onedata_proto::{Parameter, Row, Value};

use crate::catalog::{KeyGeneration, Manageable, ModelDescriptor, PrimitiveKind, PropertyDescriptor};
use crate::query::TransactionKind;

/// Table holding audit rows.
pub const LOG_TABLE: &str = "logs";

/// Maximum stored length of the serialized parameters.
pub const PARAMETERS_LENGTH: u32 = 2550;

/// One audited operation.
#[derive(Debug, Clone, PartialEq)]
pub struct LogEntry {
    /// Assigned by the insert procedure.
    pub id: Option<[u8; 16]>,
    pub date_created: Option<DateTime<Utc>>,
    pub date_modified: Option<DateTime<Utc>>,
    pub transaction: String,
    pub affected_table: String,
    /// Parameters of the call, as JSON.
    pub parameters: String,
}

impl LogEntry {
    /// Describe one call. The serialized parameters are cut to
    /// [`PARAMETERS_LENGTH`] characters.
    pub fn new(kind: TransactionKind, table: &str, parameters: &[Parameter]) -> Self {
        let serialized = serde_json::to_string(parameters).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "could not serialize audit parameters");
            String::new()
        });
        Self {
            id: None,
            date_created: None,
            date_modified: None,
            transaction: kind.to_string(),
            affected_table: table.to_string(),
            parameters: serialized.chars().take(PARAMETERS_LENGTH as usize).collect(),
        }
    }
}

fn timestamp(micros: Option<i64>) -> Option<DateTime<Utc>> {
    micros.and_then(DateTime::from_timestamp_micros)
}

impl Manageable for LogEntry {
    fn descriptor() -> ModelDescriptor {
        ModelDescriptor::new("LogEntry")
            .with_table(LOG_TABLE)
            .with_property(
                PropertyDescriptor::new("Id", PrimitiveKind::Guid).primary_key(KeyGeneration::Generated),
            )
            .with_property(PropertyDescriptor::new("DateCreated", PrimitiveKind::DateTime).date_created())
            .with_property(PropertyDescriptor::new("DateModified", PrimitiveKind::DateTime).date_modified())
            .with_property(PropertyDescriptor::new("Transaction", PrimitiveKind::String))
            .with_property(PropertyDescriptor::new("AffectedTable", PrimitiveKind::String))
            .with_property(
                PropertyDescriptor::new("Parameters", PrimitiveKind::String).data_length(PARAMETERS_LENGTH),
            )
    }

    fn to_row(&self) -> Row {
        let stamp = |t: Option<DateTime<Utc>>| t.map_or(Value::Null, |t| Value::Timestamp(t.timestamp_micros()));
        Row::new()
            .with("Id", self.id.map_or(Value::Null, Value::Uuid))
            .with("DateCreated", stamp(self.date_created))
            .with("DateModified", stamp(self.date_modified))
            .with("Transaction", self.transaction.clone())
            .with("AffectedTable", self.affected_table.clone())
            .with("Parameters", self.parameters.clone())
    }

    fn from_row(row: &Row) -> std::result::Result<Self, onedata_proto::Error> {
        Ok(Self {
            id: row.get("Id").and_then(Value::as_uuid).copied(),
            date_created: timestamp(row.get("DateCreated").and_then(Value::as_timestamp)),
            date_modified: timestamp(row.get("DateModified").and_then(Value::as_timestamp)),
            transaction: row.value("Transaction")?,
            affected_table: row.value("AffectedTable")?,
            parameters: row.value("Parameters")?,
        })
    }
}
