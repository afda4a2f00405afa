//! Offline generators behind each subcommand.
//!
//! Nothing here talks to a database: models, live-table snapshots and
//! predicates are read from JSON documents and the generated text is
//! returned as titled sections for the formatter.

use std::path::{Path, PathBuf};

use onedata_core::reconcile::{create_table, LiveTable, ProcedureBuilder, TableDiff};
use onedata_core::translate::{Predicate, SqlTranslator};
use onedata_core::{ManagerConfig, ModelComposition, ModelDescriptor, SqlDialect};
use onedata_proto::Expr;
use serde::de::DeserializeOwned;

/// Errors surfaced to the command line.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("cannot parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error(transparent)]
    Core(#[from] onedata_core::Error),
}

/// One titled block of output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub title: String,
    pub body: String,
}

impl Section {
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
        }
    }
}

/// Read and deserialize a JSON document.
pub fn load<T: DeserializeOwned>(path: &Path) -> Result<T, CliError> {
    let raw = std::fs::read_to_string(path).map_err(|source| CliError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&raw).map_err(|source| CliError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Resolve a model description against the configured default schema.
pub fn compose(descriptor: &ModelDescriptor, config: &ManagerConfig) -> Result<ModelComposition, CliError> {
    Ok(ModelComposition::build(descriptor, &config.default_schema)?)
}

/// Text of the five CRUD procedures.
pub fn procedures(
    dialect: &dyn SqlDialect,
    config: &ManagerConfig,
    composition: &ModelComposition,
    alter: bool,
) -> Vec<Section> {
    ProcedureBuilder::new(dialect, &config.naming, composition)
        .build_all(alter)
        .into_iter()
        .map(|definition| Section::new(definition.name, definition.statements.join(";\n")))
        .collect()
}

/// CREATE TABLE text, followed by any foreign keys.
pub fn table(
    dialect: &dyn SqlDialect,
    config: &ManagerConfig,
    composition: &ModelComposition,
) -> Result<Vec<Section>, CliError> {
    let statements = create_table(dialect, &config.naming, composition)?;
    Ok(vec![Section::new(composition.table(), statements.join(";\n"))])
}

/// Statements that would bring `live` in line with the model.
pub fn diff(
    dialect: &dyn SqlDialect,
    config: &ManagerConfig,
    composition: &ModelComposition,
    live: &LiveTable,
) -> Result<Vec<Section>, CliError> {
    let diff = TableDiff::compute(dialect, &config.naming, composition, live)?;
    tracing::debug!(
        model = %composition.model(),
        statements = diff.statements.len(),
        "table diff computed"
    );
    Ok(diff
        .statements
        .into_iter()
        .enumerate()
        .map(|(i, statement)| Section::new(format!("step {}", i + 1), statement))
        .collect())
}

/// WHERE fragment and parameter list of a predicate.
pub fn translate(dialect: &dyn SqlDialect, expr: &Expr, table: Option<&str>) -> Result<Vec<Section>, CliError> {
    let predicate = Predicate::compile(expr)?;
    let mut translator = SqlTranslator::new(dialect);
    if let Some(table) = table {
        translator = translator.with_qualifier(table);
    }
    let sql = translator.render(&predicate)?;
    let parameters = predicate
        .parameters()
        .iter()
        .map(|p| Ok(format!("{} = {}", p.name, dialect.literal(&p.value)?)))
        .collect::<Result<Vec<_>, onedata_core::Error>>()?
        .join("\n");
    Ok(vec![Section::new("where", sql), Section::new("parameters", parameters)])
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::time::Duration;

    use onedata_core::{KeyGeneration, MsSqlDialect, MySqlDialect, PrimitiveKind, PropertyDescriptor};
    use onedata_proto::col;

    use super::*;

    fn blog() -> ModelDescriptor {
        ModelDescriptor::new("Blog")
            .with_table("Blog")
            .with_cache(Duration::from_secs(60))
            .with_property(
                PropertyDescriptor::new("Id", PrimitiveKind::Int32).primary_key(KeyGeneration::AutoIncrement),
            )
            .with_property(PropertyDescriptor::new("Name", PrimitiveKind::String))
    }

    fn setup() -> (ManagerConfig, ModelComposition) {
        let config = ManagerConfig::default();
        let composition = compose(&blog(), &config).unwrap();
        (config, composition)
    }

    #[test]
    fn test_procedures_are_named_by_convention() {
        let (config, composition) = setup();
        let sections = procedures(&MsSqlDialect, &config, &composition, false);
        let names: Vec<_> = sections.iter().map(|s| s.title.as_str()).collect();
        assert_eq!(
            names,
            vec!["spBlogInsert", "spBlogUpdate", "spBlogDelete", "spBlogSelect", "spBlogSelectAll"]
        );
        assert!(sections[0].body.starts_with("CREATE PROCEDURE dbo.spBlogInsert"));
    }

    #[test]
    fn test_mysql_alter_drops_first() {
        let (config, composition) = setup();
        let sections = procedures(&MySqlDialect, &config, &composition, true);
        assert!(sections[2].body.starts_with("DROP PROCEDURE IF EXISTS"));
    }

    #[test]
    fn test_diff_against_missing_table_creates_it() {
        let (config, composition) = setup();
        let sections = diff(&MsSqlDialect, &config, &composition, &LiveTable::new()).unwrap();
        assert_eq!(sections[0].title, "step 1");
        assert!(sections[0].body.starts_with("CREATE TABLE dbo.Blog"));

        let created = table(&MsSqlDialect, &config, &composition).unwrap();
        assert_eq!(created[0].body, sections[0].body);
    }

    #[test]
    fn test_translate_qualifies_columns() {
        let expr = col("Name").eq("Joe");
        let sections = translate(&MsSqlDialect, &expr, Some("Blog")).unwrap();
        assert_eq!(sections[0], Section::new("where", "Blog.Name = 'Joe'"));
        assert_eq!(sections[1].title, "parameters");
        assert!(sections[1].body.contains("'Joe'"));

        assert!(translate(&MsSqlDialect, &col("Name"), None).is_err());
    }

    #[test]
    fn test_load_model_document() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(serde_json::to_string(&blog()).unwrap().as_bytes())
            .unwrap();
        let loaded: ModelDescriptor = load(file.path()).unwrap();
        assert_eq!(loaded, blog());

        let missing = load::<ModelDescriptor>(Path::new("/nonexistent/model.json"));
        assert!(matches!(missing, Err(CliError::Read { .. })));
    }
}
