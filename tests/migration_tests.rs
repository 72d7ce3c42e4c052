use flowlog::core::{Column, DataType};
use flowlog::migration::store_updates::{FLOW_TABLE, USER_TABLE};
use flowlog::migration::{SCHEMA_VERSION_TABLE, StoreUpdates};
use flowlog::storage::TableSchema;
use flowlog::{Database, Migration, Migrator, StepOutcome};

async fn langflow_base() -> Database {
    let db = Database::new();
    for table in [FLOW_TABLE, USER_TABLE] {
        db.create_table(TableSchema::new(
            table,
            vec![
                Column::new("id", DataType::Uuid).primary_key(),
                Column::new("name", DataType::Text),
            ],
        ))
        .await
        .unwrap();
    }
    db
}

#[tokio::test]
async fn test_upgrade_records_head_and_is_repeatable() {
    let db = langflow_base().await;
    let migrator = Migrator::with_defaults();

    assert_eq!(migrator.current_revision(&db).await.unwrap(), None);

    let report = migrator.upgrade(&db).await.unwrap();
    assert_eq!(report.from, None);
    assert_eq!(report.to.as_deref(), Some(StoreUpdates.revision()));
    assert_eq!(report.revisions.len(), 1);
    assert!(db.table_exists(SCHEMA_VERSION_TABLE).await);
    assert!(db.columns(FLOW_TABLE).await.unwrap().contains(&"is_component".to_string()));
    assert!(db.columns(USER_TABLE).await.unwrap().contains(&"store_api_key".to_string()));

    let again = migrator.upgrade(&db).await.unwrap();
    assert!(again.revisions.is_empty());
}

#[tokio::test]
async fn test_columns_added_out_of_band_are_reported_present() {
    let db = langflow_base().await;
    db.add_column(FLOW_TABLE, Column::new("is_component", DataType::Boolean))
        .await
        .unwrap();

    let report = Migrator::with_defaults().upgrade(&db).await.unwrap();
    let steps = &report.revisions[0].steps;
    assert_eq!(
        steps[0],
        StepOutcome::AlreadyPresent {
            table: FLOW_TABLE.to_string(),
            column: "is_component".to_string(),
        }
    );
    assert!(matches!(steps[1], StepOutcome::Applied { .. }));
}

#[tokio::test]
async fn test_failed_step_does_not_abort_run() {
    let db = Database::new();

    let report = Migrator::with_defaults().upgrade(&db).await.unwrap();
    let steps = &report.revisions[0].steps;
    assert!(steps.iter().all(StepOutcome::is_skipped));
    assert_eq!(report.to.as_deref(), Some("7843803a87b5"));
}

#[tokio::test]
async fn test_downgrade_to_base_drops_columns() {
    let db = langflow_base().await;
    let migrator = Migrator::with_defaults();
    migrator.upgrade(&db).await.unwrap();

    let report = migrator.downgrade_to(&db, Some("eb5866d51fd2")).await.unwrap();
    assert_eq!(report.to.as_deref(), Some("eb5866d51fd2"));
    assert_eq!(db.columns(FLOW_TABLE).await.unwrap(), vec!["id", "name"]);
    assert_eq!(db.columns(USER_TABLE).await.unwrap(), vec!["id", "name"]);

    // the base revision is a valid starting point for a new upgrade
    let report = migrator.upgrade(&db).await.unwrap();
    assert_eq!(report.revisions.len(), 1);
}

#[tokio::test]
async fn test_unknown_downgrade_target_is_rejected() {
    let db = langflow_base().await;
    let migrator = Migrator::with_defaults();
    migrator.upgrade(&db).await.unwrap();

    assert!(migrator.downgrade_to(&db, Some("deadbeef")).await.is_err());
    assert_eq!(
        migrator.current_revision(&db).await.unwrap().as_deref(),
        Some("7843803a87b5")
    );
}

#[tokio::test]
async fn test_report_serializes_outcomes() {
    let db = langflow_base().await;
    let report = Migrator::with_defaults().upgrade(&db).await.unwrap();
    let value = serde_json::to_value(&report).unwrap();
    assert_eq!(value["revisions"][0]["steps"][0]["outcome"], "applied");
}
