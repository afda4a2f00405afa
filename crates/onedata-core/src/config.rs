//! Manager configuration.
//!
//! Settings can be built in code, loaded from a JSON file, or read from a flat
//! key/value map using the classic setting names (`DefaultConnection`,
//! `ConnectionType`, `AutoCreateTables`, ...).

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default schema when none is configured.
pub const DEFAULT_SCHEMA: &str = "dbo";

/// Default prefix for generated procedure names.
pub const DEFAULT_PROCEDURE_PREFIX: &str = "sp";

/// Supported database families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DatabaseFamily {
    #[default]
    MsSql,
    MySql,
}

impl DatabaseFamily {
    fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "mssql" | "sqlserver" => Some(DatabaseFamily::MsSql),
            "mysql" => Some(DatabaseFamily::MySql),
            _ => None,
        }
    }
}

/// Naming convention for generated tables and procedures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NamingConvention {
    pub table_prefix: String,
    pub procedure_prefix: String,
    pub insert_suffix: String,
    pub update_suffix: String,
    pub delete_suffix: String,
    pub select_suffix: String,
    pub select_all_suffix: String,
}

impl Default for NamingConvention {
    fn default() -> Self {
        Self {
            table_prefix: String::new(),
            procedure_prefix: DEFAULT_PROCEDURE_PREFIX.to_string(),
            insert_suffix: "Insert".to_string(),
            update_suffix: "Update".to_string(),
            delete_suffix: "Delete".to_string(),
            select_suffix: "Select".to_string(),
            select_all_suffix: "SelectAll".to_string(),
        }
    }
}

impl NamingConvention {
    /// `{table_prefix}{table}`.
    pub fn table_name(&self, table: &str) -> String {
        format!("{}{}", self.table_prefix, table)
    }

    /// `{procedure_prefix}{table}{suffix}`.
    pub fn procedure_name(&self, table: &str, suffix: &str) -> String {
        format!("{}{}{}", self.procedure_prefix, table, suffix)
    }
}

/// Configuration consumed by the data manager.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagerConfig {
    /// Connection identifier used when a call does not name one.
    pub default_connection: String,
    /// Schema used when a model does not declare one.
    pub default_schema: String,
    /// Selected database family.
    pub database: DatabaseFamily,
    pub auto_create_tables: bool,
    pub auto_alter_tables: bool,
    pub auto_create_procedures: bool,
    pub auto_alter_procedures: bool,
    /// Write diagnostics into the database log table.
    pub log_in_database: bool,
    /// Write diagnostics into `log_file`.
    pub log_in_file: bool,
    pub log_file: Option<PathBuf>,
    /// Only apply ALTER statements in debug builds.
    pub override_only_in_debug: bool,
    /// Reconcile the schema on every operation rather than once per model.
    pub constant_table_consolidation: bool,
    pub naming: NamingConvention,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            default_connection: String::new(),
            default_schema: DEFAULT_SCHEMA.to_string(),
            database: DatabaseFamily::MsSql,
            auto_create_tables: false,
            auto_alter_tables: false,
            auto_create_procedures: false,
            auto_alter_procedures: false,
            log_in_database: false,
            log_in_file: false,
            log_file: None,
            override_only_in_debug: false,
            constant_table_consolidation: false,
            naming: NamingConvention::default(),
        }
    }
}

impl ManagerConfig {
    /// Create a configuration for the given connection identifier.
    pub fn new(default_connection: impl Into<String>) -> Self {
        Self {
            default_connection: default_connection.into(),
            ..Self::default()
        }
    }

    pub fn with_database(mut self, database: DatabaseFamily) -> Self {
        self.database = database;
        self
    }

    pub fn with_default_schema(mut self, schema: impl Into<String>) -> Self {
        self.default_schema = schema.into();
        self
    }

    /// Enable every auto-create and auto-alter toggle.
    pub fn with_auto_reconcile(mut self) -> Self {
        self.auto_create_tables = true;
        self.auto_alter_tables = true;
        self.auto_create_procedures = true;
        self.auto_alter_procedures = true;
        self
    }

    pub fn with_naming(mut self, naming: NamingConvention) -> Self {
        self.naming = naming;
        self
    }

    pub fn with_log_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_in_file = true;
        self.log_file = Some(path.into());
        self
    }

    pub fn with_constant_consolidation(mut self) -> Self {
        self.constant_table_consolidation = true;
        self
    }

    pub fn with_override_only_in_debug(mut self, enabled: bool) -> Self {
        self.override_only_in_debug = enabled;
        self
    }

    /// Whether ALTER statements may run in this build.
    pub fn alterations_allowed(&self) -> bool {
        !self.override_only_in_debug || cfg!(debug_assertions)
    }

    /// Load from a JSON document.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config: ManagerConfig = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Read from a flat settings map using the classic key names.
    pub fn from_settings(settings: &HashMap<String, String>) -> Result<Self> {
        let required = |key: &str| -> Result<String> {
            settings
                .get(key)
                .filter(|v| !v.trim().is_empty())
                .cloned()
                .ok_or_else(|| Error::Configuration(format!("missing setting {key}")))
        };
        let flag = |key: &str| -> Result<bool> {
            match settings.get(key) {
                None => Ok(false),
                Some(raw) => raw.trim().to_ascii_lowercase().parse::<bool>().map_err(|_| {
                    Error::Configuration(format!("setting {key} is not a boolean: {raw}"))
                }),
            }
        };
        let optional = |key: &str, fallback: &str| -> String {
            settings
                .get(key)
                .cloned()
                .unwrap_or_else(|| fallback.to_string())
        };

        let connection_type = required("ConnectionType")?;
        let database = DatabaseFamily::parse(&connection_type).ok_or_else(|| {
            Error::Configuration(format!("unknown ConnectionType {connection_type}"))
        })?;

        let defaults = NamingConvention::default();
        let naming = NamingConvention {
            table_prefix: optional("TablePrefix", &defaults.table_prefix),
            procedure_prefix: optional("StoredProcedurePrefix", &defaults.procedure_prefix),
            insert_suffix: optional("InsertSuffix", &defaults.insert_suffix),
            update_suffix: optional("UpdateSuffix", &defaults.update_suffix),
            delete_suffix: optional("DeleteSuffix", &defaults.delete_suffix),
            select_suffix: optional("SelectSuffix", &defaults.select_suffix),
            select_all_suffix: optional("SelectAllSuffix", &defaults.select_all_suffix),
        };

        let config = Self {
            default_connection: required("DefaultConnection")?,
            default_schema: optional("DefaultSchema", DEFAULT_SCHEMA),
            database,
            auto_create_tables: flag("AutoCreateTables")?,
            auto_alter_tables: flag("AutoAlterTables")?,
            auto_create_procedures: flag("AutoCreateStoredProcedures")?,
            auto_alter_procedures: flag("AutoAlterStoredProcedures")?,
            log_in_database: flag("EnableLogInDatabase")?,
            log_in_file: flag("EnableLogInFile")?,
            log_file: settings.get("LogFile").map(PathBuf::from),
            override_only_in_debug: flag("OverrideOnlyInDebug")?,
            constant_table_consolidation: flag("ConstantTableConsolidation")?,
            naming,
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.default_schema.trim().is_empty() {
            return Err(Error::Configuration("default schema is empty".into()));
        }
        if self.log_in_file && self.log_file.is_none() {
            return Err(Error::Configuration(
                "EnableLogInFile is set but no log file is configured".into(),
            ));
        }
        Ok(())
    }
}
