//! Boundary to the database driver.
//!
//! The core never talks to a database directly. It hands procedure calls and
//! DDL text to a [`ProcedureExecutor`] supplied for the selected database
//! family and receives tabular results back.

use onedata_proto::{Parameter, Tabular};
use thiserror::Error;

/// Errors reported by a driver.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum StoreError {
    /// Could not reach the database.
    #[error("connection {connection} failed: {message}")]
    Connection { connection: String, message: String },

    /// The database rejected the call.
    #[error("procedure {procedure} failed: {message}")]
    Execution { procedure: String, message: String },

    /// The call did not finish within the driver's timeout.
    #[error("procedure {0} timed out")]
    Timeout(String),
}

/// Executes stored procedures and raw commands against one database family.
///
/// Implementations block until the database answers. They are shared across
/// threads by the data manager.
pub trait ProcedureExecutor: Send + Sync {
    /// Execute a stored procedure and return its result set.
    ///
    /// `table_hint` names the table the rows belong to so the driver can label
    /// the returned [`Tabular`].
    fn execute_procedure(
        &self,
        table_hint: &str,
        procedure: &str,
        connection: &str,
        parameters: &[Parameter],
    ) -> Result<Tabular, StoreError>;

    /// Execute a raw command (DDL, information-schema queries).
    fn execute_command(&self, connection: &str, sql: &str) -> Result<Tabular, StoreError>;
}

impl<T: ProcedureExecutor + ?Sized> ProcedureExecutor for std::sync::Arc<T> {
    fn execute_procedure(
        &self,
        table_hint: &str,
        procedure: &str,
        connection: &str,
        parameters: &[Parameter],
    ) -> Result<Tabular, StoreError> {
        (**self).execute_procedure(table_hint, procedure, connection, parameters)
    }

    fn execute_command(&self, connection: &str, sql: &str) -> Result<Tabular, StoreError> {
        (**self).execute_command(connection, sql)
    }
}
