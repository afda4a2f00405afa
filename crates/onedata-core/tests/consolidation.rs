//! Schema consolidation through the data manager.

mod support;

use std::sync::Arc;

use onedata_core::dialect::MsSqlDialect;
use onedata_core::reconcile::declared_table;
use onedata_core::{DataManager, ManagerConfig, NamingConvention};
use onedata_proto::QueryOptions;
use support::{Blog, FakeDatabase};

const PROCEDURES: [&str; 5] = [
    "spBlogInsert",
    "spBlogUpdate",
    "spBlogDelete",
    "spBlogSelect",
    "spBlogSelectAll",
];

fn setup(config: ManagerConfig) -> (Arc<FakeDatabase>, DataManager) {
    let db = Arc::new(FakeDatabase::new());
    let manager = DataManager::new(config, db.clone());
    (db, manager)
}

/// Make the fake report Blog exactly as declared.
fn settle(db: &FakeDatabase, manager: &DataManager) {
    let composition = manager.describe::<Blog>().unwrap();
    let live = declared_table(&MsSqlDialect, &NamingConvention::default(), &composition).unwrap();
    db.set_schema("Blog", live);
    db.set_routines(&PROCEDURES.map(String::from));
}

fn schema_reads(db: &FakeDatabase) -> usize {
    db.commands()
        .iter()
        .filter(|sql| sql.contains("INFORMATION_SCHEMA.COLUMNS"))
        .count()
}

#[test]
fn test_first_consolidation_creates_everything() {
    let (db, manager) = setup(ManagerConfig::new("main").with_auto_reconcile());
    let report = manager.consolidate::<Blog>().unwrap();

    assert!(report.table_created);
    assert!(report.table_statements[0].starts_with("CREATE TABLE dbo.Blog ("));
    assert_eq!(report.procedures_created, PROCEDURES.map(String::from).to_vec());
    assert!(report.procedures_altered.is_empty());

    let commands = db.commands();
    assert!(commands
        .iter()
        .any(|sql| sql.starts_with("CREATE PROCEDURE dbo.spBlogSelectAll")));
}

#[test]
fn test_consolidation_is_idempotent() {
    let (db, manager) = setup(ManagerConfig::new("main").with_auto_reconcile());
    manager.consolidate::<Blog>().unwrap();
    settle(&db, &manager);

    let report = manager.consolidate::<Blog>().unwrap();
    assert!(!report.table_created);
    assert!(report.table_statements.is_empty(), "{:?}", report.table_statements);
    assert!(report.procedures_created.is_empty());
    assert_eq!(report.procedures_altered.len(), 5);

    // Without the alter toggles a settled model needs nothing at all.
    let config = ManagerConfig {
        auto_create_tables: true,
        auto_create_procedures: true,
        ..ManagerConfig::new("main")
    };
    let (db, manager) = setup(config);
    settle(&db, &manager);
    assert!(manager.consolidate::<Blog>().unwrap().is_empty());
}

#[test]
fn test_drifted_column_is_added() {
    let (db, manager) = setup(ManagerConfig::new("main").with_auto_reconcile());
    settle(&db, &manager);
    let composition = manager.describe::<Blog>().unwrap();
    let mut live = declared_table(&MsSqlDialect, &NamingConvention::default(), &composition).unwrap();
    live.columns.retain(|c| c.column_name != "Tagline");
    db.set_schema("Blog", live);

    let report = manager.consolidate::<Blog>().unwrap();
    assert_eq!(report.table_statements.len(), 1);
    assert!(report.table_statements[0].starts_with("ALTER TABLE dbo.Blog ADD Tagline"));
}

#[test]
fn test_schema_is_consolidated_once_per_model() {
    let (db, manager) = setup(ManagerConfig::new("main").with_auto_reconcile());
    manager.select_all::<Blog>(&QueryOptions::new()).unwrap();
    manager.select_all::<Blog>(&QueryOptions::new()).unwrap();
    assert_eq!(schema_reads(&db), 1);

    let (db, manager) = setup(
        ManagerConfig::new("main")
            .with_auto_reconcile()
            .with_constant_consolidation(),
    );
    manager.select_all::<Blog>(&QueryOptions::new()).unwrap();
    manager.select_all::<Blog>(&QueryOptions::new()).unwrap();
    assert_eq!(schema_reads(&db), 2);
}

#[test]
fn test_no_toggles_no_schema_traffic() {
    let (db, manager) = setup(ManagerConfig::new("main"));
    manager.select_all::<Blog>(&QueryOptions::new()).unwrap();
    assert!(db.commands().is_empty());
}
