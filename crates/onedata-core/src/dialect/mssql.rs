//! SQL Server dialect.

use crate::catalog::{AutoKind, PrimitiveKind, PropertyDescriptor};
use crate::config::DatabaseFamily;
use crate::reconcile::ColumnDefinition;

use super::{string_length, ColumnSpec, ProcedureParameter, SqlDialect};

/// Microsoft SQL Server.
#[derive(Debug, Clone, Copy, Default)]
pub struct MsSqlDialect;

impl SqlDialect for MsSqlDialect {
    fn family(&self) -> DatabaseFamily {
        DatabaseFamily::MsSql
    }

    fn parameter_prefix(&self) -> &'static str {
        "@_"
    }

    fn null_coalesce(&self) -> &'static str {
        "ISNULL"
    }

    fn delimit(&self, name: &str) -> String {
        format!("[{}]", name.replace(']', "]]"))
    }

    fn auto_value(&self, kind: AutoKind) -> &'static str {
        match kind {
            AutoKind::Date => "CONVERT(DATE, GETDATE())",
            AutoKind::DateTime => "GETDATE()",
        }
    }

    fn last_identity(&self) -> &'static str {
        "SCOPE_IDENTITY()"
    }

    fn new_guid(&self) -> &'static str {
        "NEWID()"
    }

    fn bool_literal(&self, value: bool) -> &'static str {
        if value {
            "1"
        } else {
            "0"
        }
    }

    fn bytes_literal(&self, bytes: &[u8]) -> String {
        format!("0x{}", hex::encode_upper(bytes))
    }

    fn sql_type(&self, property: &PropertyDescriptor, unique: bool) -> String {
        match property.kind {
            PrimitiveKind::Bool => "bit".into(),
            PrimitiveKind::Guid => "uniqueidentifier".into(),
            PrimitiveKind::Char => "char(1)".into(),
            PrimitiveKind::String => format!("varchar({})", string_length(property, unique)),
            PrimitiveKind::DateTime => "datetime".into(),
            PrimitiveKind::Decimal => "decimal(18,2)".into(),
            PrimitiveKind::Float32 => "real".into(),
            PrimitiveKind::Float64 => "float".into(),
            PrimitiveKind::UInt8 => "tinyint".into(),
            PrimitiveKind::Int8 | PrimitiveKind::Int16 => "smallint".into(),
            PrimitiveKind::UInt16 => "numeric(5)".into(),
            PrimitiveKind::Int32 | PrimitiveKind::Enum => "int".into(),
            PrimitiveKind::UInt32 => "numeric(10)".into(),
            PrimitiveKind::Int64 => "bigint".into(),
            PrimitiveKind::UInt64 => "numeric(20)".into(),
            PrimitiveKind::Bytes => "varbinary(1024)".into(),
        }
    }

    fn live_type(&self, column: &ColumnDefinition) -> String {
        let data_type = column.data_type.to_ascii_lowercase();
        match data_type.as_str() {
            "varchar" | "nvarchar" | "char" | "nchar" | "varbinary" | "binary" => {
                match column.character_maximum_length {
                    Some(-1) => format!("{data_type}(max)"),
                    Some(length) => format!("{data_type}({length})"),
                    None => data_type,
                }
            }
            "decimal" | "numeric" => match (column.numeric_precision, column.numeric_scale) {
                (Some(p), Some(0)) if data_type == "numeric" => format!("numeric({p})"),
                (Some(p), Some(s)) => format!("{data_type}({p},{s})"),
                (Some(p), None) => format!("{data_type}({p})"),
                _ => data_type,
            },
            _ => data_type,
        }
    }

    fn canonical_default(&self, raw: &str) -> String {
        // SQL Server reports defaults wrapped in parentheses: ((0)), ('abc').
        let mut text = raw.trim();
        while text.len() >= 2 && text.starts_with('(') && text.ends_with(')') {
            text = text[1..text.len() - 1].trim();
        }
        text.to_string()
    }

    fn procedure(
        &self,
        qualified_name: &str,
        parameters: &[ProcedureParameter],
        body: &[String],
        alter: bool,
    ) -> Vec<String> {
        let verb = if alter { "ALTER" } else { "CREATE" };
        let mut text = format!("{verb} PROCEDURE {qualified_name}\n");
        let declared: Vec<String> = parameters
            .iter()
            .map(|p| {
                let default = if p.optional { " = NULL" } else { "" };
                format!("    {} {}{}", self.parameter(&p.name), p.sql_type, default)
            })
            .collect();
        if !declared.is_empty() {
            text.push_str(&declared.join(",\n"));
            text.push('\n');
        }
        text.push_str("AS\nBEGIN\n");
        for line in body {
            text.push_str(line);
            text.push('\n');
        }
        text.push_str("END");
        vec![text]
    }

    fn declare(&self, name: &str, sql_type: &str, initial: &str) -> String {
        format!("DECLARE {} {} = {};", self.parameter(name), sql_type, initial)
    }

    fn dynamic_select(&self, table: &str, order_by: &str) -> Vec<String> {
        vec![
            format!(
                "DECLARE @_query nvarchar(max) = N'SELECT * FROM {table} WHERE ' + @_expression + N' ORDER BY {order_by}';"
            ),
            "IF @_offset IS NOT NULL OR @_maximumResults IS NOT NULL".to_string(),
            "    SET @_query = @_query + N' OFFSET ' + CAST(ISNULL(@_offset, 0) AS nvarchar(20)) + N' ROWS';"
                .to_string(),
            "IF @_maximumResults IS NOT NULL".to_string(),
            "    SET @_query = @_query + N' FETCH NEXT ' + CAST(@_maximumResults AS nvarchar(20)) + N' ROWS ONLY';"
                .to_string(),
            "EXEC sp_executesql @_query;".to_string(),
        ]
    }

    fn paged_select_all(&self, table: &str, order_by: &str) -> Vec<String> {
        vec![
            "IF @_maximumResults IS NULL AND @_offset IS NULL".to_string(),
            format!("    SELECT * FROM {table} ORDER BY {order_by};"),
            "ELSE".to_string(),
            format!(
                "    SELECT * FROM {table} ORDER BY {order_by} OFFSET ISNULL(@_offset, 0) ROWS FETCH NEXT ISNULL(@_maximumResults, 2147483647) ROWS ONLY;"
            ),
        ]
    }

    fn expression_type(&self) -> &'static str {
        "nvarchar(max)"
    }

    fn create_table(&self, table: &str, columns: &[ColumnSpec], primary_key: (&str, &str)) -> String {
        let mut lines: Vec<String> = columns
            .iter()
            .map(|c| {
                let identity = if c.identity { " IDENTITY(1,1)" } else { "" };
                let null = if c.nullable { "NULL" } else { "NOT NULL" };
                format!("    {} {}{} {}", self.identifier(&c.name), c.sql_type, identity, null)
            })
            .collect();
        let (constraint, column) = primary_key;
        lines.push(format!(
            "    CONSTRAINT {constraint} PRIMARY KEY ({})",
            self.identifier(column)
        ));
        format!("CREATE TABLE {table} (\n{}\n)", lines.join(",\n"))
    }

    fn add_column(&self, table: &str, column: &str, sql_type: &str) -> String {
        format!("ALTER TABLE {table} ADD {} {sql_type} NULL", self.identifier(column))
    }

    fn alter_column(&self, table: &str, column: &str, sql_type: &str, nullable: bool) -> String {
        let null = if nullable { "NULL" } else { "NOT NULL" };
        format!(
            "ALTER TABLE {table} ALTER COLUMN {} {sql_type} {null}",
            self.identifier(column)
        )
    }

    fn drop_unique(&self, table: &str, constraint: &str) -> String {
        format!("ALTER TABLE {table} DROP CONSTRAINT {constraint}")
    }

    fn add_default(&self, table: &str, constraint: &str, column: &str, literal: &str) -> String {
        format!(
            "ALTER TABLE {table} ADD CONSTRAINT {constraint} DEFAULT {literal} FOR {}",
            self.identifier(column)
        )
    }

    fn drop_default(&self, table: &str, constraint: &str, _column: &str) -> String {
        format!("ALTER TABLE {table} DROP CONSTRAINT {constraint}")
    }

    fn drop_primary_key(&self, table: &str, constraint: &str) -> String {
        format!("ALTER TABLE {table} DROP CONSTRAINT {constraint}")
    }

    fn drop_foreign_key(&self, table: &str, constraint: &str) -> String {
        format!("ALTER TABLE {table} DROP CONSTRAINT {constraint}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn column(data_type: &str, length: Option<i64>, precision: Option<i64>, scale: Option<i64>) -> ColumnDefinition {
        ColumnDefinition {
            column_name: "C".into(),
            data_type: data_type.into(),
            column_type: None,
            character_maximum_length: length,
            numeric_precision: precision,
            numeric_scale: scale,
            is_nullable: true,
            column_default: None,
        }
    }

    #[test]
    fn test_type_table() {
        let dialect = MsSqlDialect;
        let cases = [
            (PrimitiveKind::Bool, "bit"),
            (PrimitiveKind::Guid, "uniqueidentifier"),
            (PrimitiveKind::Decimal, "decimal(18,2)"),
            (PrimitiveKind::UInt16, "numeric(5)"),
            (PrimitiveKind::UInt64, "numeric(20)"),
            (PrimitiveKind::Bytes, "varbinary(1024)"),
            (PrimitiveKind::Enum, "int"),
        ];
        for (kind, expected) in cases {
            let property = PropertyDescriptor::new("P", kind);
            assert_eq!(dialect.sql_type(&property, false), expected, "{kind:?}");
        }
    }

    #[test]
    fn test_live_type_matches_declared() {
        let dialect = MsSqlDialect;
        assert_eq!(dialect.live_type(&column("varchar", Some(255), None, None)), "varchar(255)");
        assert_eq!(dialect.live_type(&column("decimal", None, Some(18), Some(2))), "decimal(18,2)");
        assert_eq!(dialect.live_type(&column("numeric", None, Some(10), Some(0))), "numeric(10)");
        assert_eq!(dialect.live_type(&column("INT", None, Some(10), Some(0))), "int");
    }

    #[test]
    fn test_canonical_default_strips_parentheses() {
        let dialect = MsSqlDialect;
        assert_eq!(dialect.canonical_default("((0))"), "0");
        assert_eq!(dialect.canonical_default("('abc')"), "'abc'");
        assert_eq!(dialect.canonical_default("(getdate())"), "getdate()");
    }

    #[test]
    fn test_procedure_header() {
        let dialect = MsSqlDialect;
        let text = dialect.procedure(
            "dbo.spBlogDelete",
            &[ProcedureParameter::required("Id", "int")],
            &["DELETE FROM dbo.Blog".to_string(), "WHERE Id = @_Id;".to_string()],
            false,
        );
        assert_eq!(
            text,
            vec!["CREATE PROCEDURE dbo.spBlogDelete\n    @_Id int\nAS\nBEGIN\nDELETE FROM dbo.Blog\nWHERE Id = @_Id;\nEND"]
        );
    }
}
