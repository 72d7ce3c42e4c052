use super::{Migration, StepOutcome, add_column_if_missing, drop_column_if_present};
use crate::core::{Column, DataType};
use crate::facade::Database;
use async_trait::async_trait;

pub const FLOW_TABLE: &str = "flow";
pub const USER_TABLE: &str = "user";

/// Adds `flow.is_component` and `user.store_api_key`, both nullable.
pub struct StoreUpdates;

#[async_trait]
impl Migration for StoreUpdates {
    fn revision(&self) -> &'static str {
        "7843803a87b5"
    }

    fn down_revision(&self) -> Option<&'static str> {
        Some("eb5866d51fd2")
    }

    fn description(&self) -> &'static str {
        "Store updates"
    }

    async fn upgrade(&self, db: &Database) -> Vec<StepOutcome> {
        vec![
            add_column_if_missing(db, FLOW_TABLE, Column::new("is_component", DataType::Boolean))
                .await,
            add_column_if_missing(db, USER_TABLE, Column::new("store_api_key", DataType::Text))
                .await,
        ]
    }

    async fn downgrade(&self, db: &Database) -> Vec<StepOutcome> {
        vec![
            drop_column_if_present(db, USER_TABLE, "store_api_key").await,
            drop_column_if_present(db, FLOW_TABLE, "is_component").await,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::TableSchema;

    async fn base_tables() -> Database {
        let db = Database::new();
        db.create_table(TableSchema::new(
            FLOW_TABLE,
            vec![Column::new("id", DataType::Uuid).primary_key()],
        ))
        .await
        .unwrap();
        db.create_table(TableSchema::new(
            USER_TABLE,
            vec![Column::new("id", DataType::Uuid).primary_key()],
        ))
        .await
        .unwrap();
        db
    }

    #[tokio::test]
    async fn test_upgrade_adds_both_columns_once() {
        let db = base_tables().await;

        let first = StoreUpdates.upgrade(&db).await;
        assert!(first.iter().all(|o| matches!(o, StepOutcome::Applied { .. })));
        assert_eq!(db.columns(FLOW_TABLE).await.unwrap(), vec!["id", "is_component"]);
        assert_eq!(db.columns(USER_TABLE).await.unwrap(), vec!["id", "store_api_key"]);

        let second = StoreUpdates.upgrade(&db).await;
        assert!(second.iter().all(|o| matches!(o, StepOutcome::AlreadyPresent { .. })));
    }

    #[tokio::test]
    async fn test_downgrade_removes_columns_and_tolerates_absence() {
        let db = base_tables().await;
        StoreUpdates.upgrade(&db).await;

        let outcomes = StoreUpdates.downgrade(&db).await;
        assert!(outcomes.iter().all(|o| matches!(o, StepOutcome::Applied { .. })));
        assert_eq!(db.columns(FLOW_TABLE).await.unwrap(), vec!["id"]);

        let again = StoreUpdates.downgrade(&db).await;
        assert!(again.iter().all(|o| matches!(o, StepOutcome::Absent { .. })));
    }

    #[tokio::test]
    async fn test_missing_user_table_does_not_block_flow_column() {
        let db = Database::new();
        db.create_table(TableSchema::new(
            FLOW_TABLE,
            vec![Column::new("id", DataType::Uuid).primary_key()],
        ))
        .await
        .unwrap();

        let outcomes = StoreUpdates.upgrade(&db).await;
        assert!(matches!(outcomes[0], StepOutcome::Applied { .. }));
        assert!(outcomes[1].is_skipped());
    }
}
