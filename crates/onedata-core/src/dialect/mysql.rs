//! MySQL dialect.

use crate::catalog::{AutoKind, PrimitiveKind, PropertyDescriptor};
use crate::config::DatabaseFamily;
use crate::reconcile::ColumnDefinition;

use super::{quote, string_length, ColumnSpec, ProcedureParameter, SqlDialect};

const INTEGER_TYPES: [&str; 5] = ["tinyint", "smallint", "mediumint", "int", "bigint"];

/// MySQL 5.7 / 8.x.
#[derive(Debug, Clone, Copy, Default)]
pub struct MySqlDialect;

impl SqlDialect for MySqlDialect {
    fn family(&self) -> DatabaseFamily {
        DatabaseFamily::MySql
    }

    fn parameter_prefix(&self) -> &'static str {
        "_"
    }

    fn null_coalesce(&self) -> &'static str {
        "IFNULL"
    }

    fn delimit(&self, name: &str) -> String {
        format!("`{}`", name.replace('`', "``"))
    }

    fn auto_value(&self, kind: AutoKind) -> &'static str {
        match kind {
            AutoKind::Date => "CURDATE()",
            AutoKind::DateTime => "NOW()",
        }
    }

    fn last_identity(&self) -> &'static str {
        "LAST_INSERT_ID()"
    }

    fn new_guid(&self) -> &'static str {
        "UUID()"
    }

    fn bool_literal(&self, value: bool) -> &'static str {
        if value {
            "TRUE"
        } else {
            "FALSE"
        }
    }

    fn bytes_literal(&self, bytes: &[u8]) -> String {
        format!("X'{}'", hex::encode_upper(bytes))
    }

    fn sql_type(&self, property: &PropertyDescriptor, unique: bool) -> String {
        match property.kind {
            PrimitiveKind::Bool => "tinyint(1)".into(),
            PrimitiveKind::Guid => "char(36)".into(),
            PrimitiveKind::Char => "char(1)".into(),
            PrimitiveKind::String => format!("varchar({})", string_length(property, unique)),
            PrimitiveKind::DateTime => "datetime".into(),
            PrimitiveKind::Decimal => "decimal(18,2)".into(),
            PrimitiveKind::Float32 => "float".into(),
            PrimitiveKind::Float64 => "double".into(),
            PrimitiveKind::UInt8 => "tinyint unsigned".into(),
            PrimitiveKind::Int8 => "tinyint".into(),
            PrimitiveKind::Int16 => "smallint".into(),
            PrimitiveKind::UInt16 => "smallint unsigned".into(),
            PrimitiveKind::Int32 | PrimitiveKind::Enum => "int".into(),
            PrimitiveKind::UInt32 => "int unsigned".into(),
            PrimitiveKind::Int64 => "bigint".into(),
            PrimitiveKind::UInt64 => "bigint unsigned".into(),
            PrimitiveKind::Bytes => "varbinary(1024)".into(),
        }
    }

    fn live_type(&self, column: &ColumnDefinition) -> String {
        let Some(raw) = column.column_type.as_deref() else {
            return column.data_type.to_ascii_lowercase();
        };
        let raw = raw.trim().to_ascii_lowercase();
        if raw == "tinyint(1)" {
            return raw;
        }
        // Integer display widths (int(11)) are cosmetic and dropped by MySQL 8.
        let (base, rest) = match raw.find('(') {
            Some(open) => (&raw[..open], raw[open..].find(')').map(|close| &raw[open + close + 1..])),
            None => (raw.as_str(), None),
        };
        match rest {
            Some(rest) if INTEGER_TYPES.contains(&base) => format!("{base}{rest}"),
            _ => raw.clone(),
        }
    }

    fn canonical_default(&self, raw: &str) -> String {
        // MySQL 8 reports string defaults without quotes.
        let text = raw.trim();
        if text.eq_ignore_ascii_case("true") {
            return "1".to_string();
        }
        if text.eq_ignore_ascii_case("false") {
            return "0".to_string();
        }
        if text.len() >= 2 && text.starts_with('\'') && text.ends_with('\'') {
            text[1..text.len() - 1].replace("''", "'")
        } else {
            text.to_string()
        }
    }

    fn procedure(
        &self,
        qualified_name: &str,
        parameters: &[ProcedureParameter],
        body: &[String],
        alter: bool,
    ) -> Vec<String> {
        let declared: Vec<String> = parameters
            .iter()
            .map(|p| format!("    IN {} {}", self.parameter(&p.name), p.sql_type))
            .collect();
        let mut text = format!("CREATE PROCEDURE {qualified_name}(\n");
        if !declared.is_empty() {
            text.push_str(&declared.join(",\n"));
            text.push('\n');
        }
        text.push_str(")\nBEGIN\n");
        for line in body {
            text.push_str(line);
            text.push('\n');
        }
        text.push_str("END");

        if alter {
            vec![format!("DROP PROCEDURE IF EXISTS {qualified_name}"), text]
        } else {
            vec![text]
        }
    }

    fn declare(&self, name: &str, sql_type: &str, initial: &str) -> String {
        format!("DECLARE {} {} DEFAULT {};", self.parameter(name), sql_type, initial)
    }

    fn dynamic_select(&self, table: &str, order_by: &str) -> Vec<String> {
        vec![
            format!(
                "SET @_query = CONCAT('SELECT * FROM {table} WHERE ', _expression, ' ORDER BY {order_by}');"
            ),
            "IF _maximumResults IS NOT NULL THEN".to_string(),
            "    SET @_query = CONCAT(@_query, ' LIMIT ', IFNULL(_offset, 0), ', ', _maximumResults);"
                .to_string(),
            "ELSEIF _offset IS NOT NULL THEN".to_string(),
            "    SET @_query = CONCAT(@_query, ' LIMIT ', _offset, ', 18446744073709551615');"
                .to_string(),
            "END IF;".to_string(),
            "PREPARE _statement FROM @_query;".to_string(),
            "EXECUTE _statement;".to_string(),
            "DEALLOCATE PREPARE _statement;".to_string(),
        ]
    }

    fn paged_select_all(&self, table: &str, order_by: &str) -> Vec<String> {
        vec![
            "DECLARE _skip BIGINT UNSIGNED DEFAULT IFNULL(_offset, 0);".to_string(),
            "DECLARE _take BIGINT UNSIGNED DEFAULT IFNULL(_maximumResults, 18446744073709551615);"
                .to_string(),
            "IF _maximumResults IS NULL AND _offset IS NULL THEN".to_string(),
            format!("    SELECT * FROM {table} ORDER BY {order_by};"),
            "ELSE".to_string(),
            format!("    SELECT * FROM {table} ORDER BY {order_by} LIMIT _skip, _take;"),
            "END IF;".to_string(),
        ]
    }

    fn expression_type(&self) -> &'static str {
        "TEXT"
    }

    fn create_table(&self, table: &str, columns: &[ColumnSpec], primary_key: (&str, &str)) -> String {
        let mut lines: Vec<String> = columns
            .iter()
            .map(|c| {
                let null = if c.nullable { "NULL" } else { "NOT NULL" };
                let identity = if c.identity { " AUTO_INCREMENT" } else { "" };
                format!("    {} {} {}{}", self.identifier(&c.name), c.sql_type, null, identity)
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
        format!("ALTER TABLE {table} ADD COLUMN {} {sql_type} NULL", self.identifier(column))
    }

    fn alter_column(&self, table: &str, column: &str, sql_type: &str, nullable: bool) -> String {
        let null = if nullable { "NULL" } else { "NOT NULL" };
        format!(
            "ALTER TABLE {table} MODIFY COLUMN {} {sql_type} {null}",
            self.identifier(column)
        )
    }

    fn drop_unique(&self, table: &str, constraint: &str) -> String {
        format!("ALTER TABLE {table} DROP INDEX {constraint}")
    }

    fn add_default(&self, table: &str, _constraint: &str, column: &str, literal: &str) -> String {
        format!(
            "ALTER TABLE {table} ALTER COLUMN {} SET DEFAULT {literal}",
            self.identifier(column)
        )
    }

    fn drop_default(&self, table: &str, _constraint: &str, column: &str) -> String {
        format!("ALTER TABLE {table} ALTER COLUMN {} DROP DEFAULT", self.identifier(column))
    }

    fn drop_primary_key(&self, table: &str, _constraint: &str) -> String {
        format!("ALTER TABLE {table} DROP PRIMARY KEY")
    }

    fn drop_foreign_key(&self, table: &str, constraint: &str) -> String {
        format!("ALTER TABLE {table} DROP FOREIGN KEY {constraint}")
    }

    fn columns_query(&self, schema: &str, table: &str) -> String {
        format!(
            "SELECT COLUMN_NAME, DATA_TYPE, COLUMN_TYPE, CHARACTER_MAXIMUM_LENGTH, NUMERIC_PRECISION, \
             NUMERIC_SCALE, IS_NULLABLE, COLUMN_DEFAULT FROM INFORMATION_SCHEMA.COLUMNS \
             WHERE TABLE_SCHEMA = {} AND TABLE_NAME = {} ORDER BY ORDINAL_POSITION",
            quote(schema),
            quote(table)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn column_of(column_type: &str) -> ColumnDefinition {
        ColumnDefinition {
            column_name: "C".into(),
            data_type: column_type.split(['(', ' ']).next().unwrap_or_default().into(),
            column_type: Some(column_type.into()),
            character_maximum_length: None,
            numeric_precision: None,
            numeric_scale: None,
            is_nullable: true,
            column_default: None,
        }
    }

    #[test]
    fn test_live_type_drops_integer_display_width() {
        let dialect = MySqlDialect;
        assert_eq!(dialect.live_type(&column_of("int(11)")), "int");
        assert_eq!(dialect.live_type(&column_of("int(10) unsigned")), "int unsigned");
        assert_eq!(dialect.live_type(&column_of("tinyint(1)")), "tinyint(1)");
        assert_eq!(dialect.live_type(&column_of("varchar(255)")), "varchar(255)");
        assert_eq!(dialect.live_type(&column_of("decimal(18,2)")), "decimal(18,2)");
    }

    #[test]
    fn test_alter_procedure_drops_first() {
        let dialect = MySqlDialect;
        let statements = dialect.procedure(
            "shop.spBlogDelete",
            &[ProcedureParameter::required("Id", "int")],
            &["DELETE FROM shop.Blog WHERE Id = _Id;".to_string()],
            true,
        );
        assert_eq!(statements.len(), 2);
        assert_eq!(statements[0], "DROP PROCEDURE IF EXISTS shop.spBlogDelete");
        assert!(statements[1].starts_with("CREATE PROCEDURE shop.spBlogDelete(\n    IN _Id int\n)"));
    }

    #[test]
    fn test_canonical_default_unquotes() {
        let dialect = MySqlDialect;
        assert_eq!(dialect.canonical_default("'it''s'"), "it's");
        assert_eq!(dialect.canonical_default("0"), "0");
        assert_eq!(dialect.canonical_default("TRUE"), dialect.canonical_default("1"));
    }
}
