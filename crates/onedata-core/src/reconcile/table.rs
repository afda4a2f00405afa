//! Declared table shape and CREATE TABLE generation.

use crate::catalog::{ForeignAction, KeyGeneration, ModelComposition, PropertyDescriptor};
use crate::config::NamingConvention;
use crate::dialect::{ColumnSpec, SqlDialect};
use crate::error::Result;

use super::live::{ColumnDefinition, ConstraintDefinition, ConstraintKind, LiveTable};

pub const PRIMARY_KEY_PREFIX: &str = "PK";
pub const FOREIGN_KEY_PREFIX: &str = "FK";
pub const UNIQUE_PREFIX: &str = "UQ";
pub const DEFAULT_PREFIX: &str = "DF";

/// Physical names of a model's table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableTarget {
    pub schema: String,
    /// Table name with the configured prefix.
    pub table: String,
    /// `schema.table`.
    pub qualified: String,
}

impl TableTarget {
    pub fn new(dialect: &dyn SqlDialect, naming: &NamingConvention, composition: &ModelComposition) -> Self {
        let table = naming.table_name(composition.table());
        Self {
            schema: composition.schema().to_string(),
            qualified: dialect.qualify(composition.schema(), &table),
            table,
        }
    }

    /// `{prefix}_{schema}_{table}_{column}`.
    pub fn constraint(&self, prefix: &str, column: &str) -> String {
        format!("{prefix}_{}_{}_{column}", self.schema, self.table)
    }
}

/// Foreign key target of a declared column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct DeclaredReference {
    pub table: String,
    pub column: String,
    pub on_delete: ForeignAction,
}

/// Everything the database should know about one persisted property.
#[derive(Debug, Clone)]
pub(crate) struct DeclaredColumn<'a> {
    pub property: &'a PropertyDescriptor,
    pub sql_type: String,
    pub nullable: bool,
    /// Default rendered as a SQL literal.
    pub default: Option<String>,
    pub primary_key: bool,
    pub identity: bool,
    pub unique: bool,
    pub reference: Option<DeclaredReference>,
}

impl<'a> DeclaredColumn<'a> {
    pub fn new(
        dialect: &dyn SqlDialect,
        naming: &NamingConvention,
        composition: &ModelComposition,
        property: &'a PropertyDescriptor,
    ) -> Result<Self> {
        let primary_key = composition.is_primary_key(&property.name);
        let unique = property.is_unique();
        let default = property
            .declared_default()
            .map(|value| dialect.literal(value))
            .transpose()?;
        let reference = property.foreign_reference().map(|r| DeclaredReference {
            table: dialect.qualify(
                r.schema.as_deref().unwrap_or(composition.schema()),
                &naming.table_name(&r.table),
            ),
            column: r.column.clone(),
            on_delete: r.on_delete,
        });

        Ok(Self {
            property,
            sql_type: dialect.sql_type(property, unique),
            nullable: property.nullable && !primary_key,
            default,
            primary_key,
            identity: primary_key && composition.key_generation() == KeyGeneration::AutoIncrement,
            unique,
            reference,
        })
    }

    pub fn name(&self) -> &str {
        &self.property.name
    }

    /// Value written into existing rows before the column becomes NOT NULL.
    pub fn fill_value(&self, dialect: &dyn SqlDialect) -> Result<String> {
        if let Some(default) = &self.default {
            return Ok(default.clone());
        }
        if let Some(kind) = self.property.auto_kind() {
            return Ok(dialect.auto_value(kind).to_string());
        }
        dialect.literal(&self.property.kind.zero_value())
    }

    /// The live column this declaration reconciles to.
    pub fn projected(&self) -> ColumnDefinition {
        ColumnDefinition {
            column_name: self.name().to_string(),
            data_type: self.sql_type.clone(),
            column_type: Some(self.sql_type.clone()),
            character_maximum_length: None,
            numeric_precision: None,
            numeric_scale: None,
            is_nullable: self.nullable,
            column_default: self.default.clone(),
        }
    }
}

/// Declared columns of a model, in declaration order.
pub(crate) fn declared_columns<'a>(
    dialect: &dyn SqlDialect,
    naming: &NamingConvention,
    composition: &'a ModelComposition,
) -> Result<Vec<DeclaredColumn<'a>>> {
    composition
        .persisted()
        .map(|property| DeclaredColumn::new(dialect, naming, composition, property))
        .collect()
}

/// CREATE TABLE followed by the unique, default and foreign key constraints.
pub fn create_table(
    dialect: &dyn SqlDialect,
    naming: &NamingConvention,
    composition: &ModelComposition,
) -> Result<Vec<String>> {
    let target = TableTarget::new(dialect, naming, composition);
    let declared = declared_columns(dialect, naming, composition)?;

    let specs: Vec<ColumnSpec> = declared
        .iter()
        .map(|column| ColumnSpec {
            name: column.name().to_string(),
            sql_type: column.sql_type.clone(),
            nullable: column.nullable,
            identity: column.identity,
        })
        .collect();
    let key = composition.primary_key().name.as_str();
    let key_constraint = target.constraint(PRIMARY_KEY_PREFIX, key);

    let mut statements = vec![dialect.create_table(&target.qualified, &specs, (&key_constraint, key))];
    for column in &declared {
        if column.unique {
            statements.push(dialect.add_unique(
                &target.qualified,
                &target.constraint(UNIQUE_PREFIX, column.name()),
                column.name(),
            ));
        }
        if let Some(default) = &column.default {
            statements.push(dialect.add_default(
                &target.qualified,
                &target.constraint(DEFAULT_PREFIX, column.name()),
                column.name(),
                default,
            ));
        }
    }
    for column in &declared {
        if let Some(reference) = &column.reference {
            statements.push(dialect.add_foreign_key(
                &target.qualified,
                &target.constraint(FOREIGN_KEY_PREFIX, column.name()),
                column.name(),
                &reference.table,
                &reference.column,
                reference.on_delete,
            ));
        }
    }
    Ok(statements)
}

/// The live table a fresh CREATE TABLE produces.
pub fn declared_table(
    dialect: &dyn SqlDialect,
    naming: &NamingConvention,
    composition: &ModelComposition,
) -> Result<LiveTable> {
    let target = TableTarget::new(dialect, naming, composition);
    let mut table = LiveTable::new();
    for column in declared_columns(dialect, naming, composition)? {
        table.columns.push(column.projected());
        let mut constrain = |prefix: &str, kind: ConstraintKind, delete_rule: Option<ForeignAction>| {
            table.constraints.push(ConstraintDefinition {
                name: target.constraint(prefix, column.name()),
                column: column.name().to_string(),
                kind,
                delete_rule,
            });
        };
        if column.primary_key {
            constrain(PRIMARY_KEY_PREFIX, ConstraintKind::PrimaryKey, None);
        }
        if column.unique {
            constrain(UNIQUE_PREFIX, ConstraintKind::Unique, None);
        }
        if let Some(reference) = &column.reference {
            constrain(FOREIGN_KEY_PREFIX, ConstraintKind::ForeignKey, Some(reference.on_delete));
        }
    }
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{ForeignReference, ModelDescriptor, PrimitiveKind};
    use crate::dialect::{MsSqlDialect, MySqlDialect};

    fn post() -> ModelComposition {
        let descriptor = ModelDescriptor::new("Post")
            .with_table("Post")
            .with_property(
                PropertyDescriptor::new("Id", PrimitiveKind::Int32)
                    .primary_key(KeyGeneration::AutoIncrement),
            )
            .with_property(PropertyDescriptor::new("Slug", PrimitiveKind::String).unique().data_length(1000))
            .with_property(PropertyDescriptor::new("Votes", PrimitiveKind::Int32).default_value(0))
            .with_property(
                PropertyDescriptor::new("BlogId", PrimitiveKind::Int32)
                    .nullable()
                    .foreign_key(ForeignReference::new("Blog").on_delete(ForeignAction::Cascade)),
            )
            .with_property(PropertyDescriptor::new("DateCreated", PrimitiveKind::DateTime).date_created());
        ModelComposition::build(&descriptor, "dbo").unwrap()
    }

    #[test]
    fn test_create_table_mssql() {
        let naming = NamingConvention {
            table_prefix: "t".into(),
            ..NamingConvention::default()
        };
        let statements = create_table(&MsSqlDialect, &naming, &post()).unwrap();

        assert_eq!(
            statements[0],
            "CREATE TABLE dbo.tPost (\n    Id int IDENTITY(1,1) NOT NULL,\n    Slug varchar(255) NOT NULL,\n    \
             Votes int NOT NULL,\n    BlogId int NULL,\n    DateCreated datetime NOT NULL,\n    \
             CONSTRAINT PK_dbo_tPost_Id PRIMARY KEY (Id)\n)"
        );
        assert_eq!(
            statements[1..],
            [
                "ALTER TABLE dbo.tPost ADD CONSTRAINT UQ_dbo_tPost_Slug UNIQUE (Slug)".to_string(),
                "ALTER TABLE dbo.tPost ADD CONSTRAINT DF_dbo_tPost_Votes DEFAULT 0 FOR Votes".to_string(),
                "ALTER TABLE dbo.tPost ADD CONSTRAINT FK_dbo_tPost_BlogId FOREIGN KEY (BlogId) \
                 REFERENCES dbo.tBlog(Id) ON DELETE CASCADE ON UPDATE NO ACTION"
                    .to_string(),
            ]
        );
    }

    #[test]
    fn test_create_table_mysql_identity() {
        let statements = create_table(&MySqlDialect, &NamingConvention::default(), &post()).unwrap();
        assert!(statements[0].contains("    Id int NOT NULL AUTO_INCREMENT,"));
        assert!(statements[2].ends_with("ALTER COLUMN Votes SET DEFAULT 0"));
    }

    #[test]
    fn test_declared_table_matches_create() {
        let table = declared_table(&MsSqlDialect, &NamingConvention::default(), &post()).unwrap();
        assert_eq!(table.columns.len(), 5);
        assert_eq!(table.constraints.len(), 3);
        assert_eq!(table.column("Votes").unwrap().column_default.as_deref(), Some("0"));
        assert_eq!(
            table.constraint_on("BlogId", ConstraintKind::ForeignKey).unwrap().delete_rule,
            Some(ForeignAction::Cascade)
        );
    }
}
