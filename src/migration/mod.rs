// ============================================================================
// Schema Evolution
// ============================================================================
//
// Revisions form a chain through `down_revision`. The applied head is kept in
// the `schema_version` table. Individual column steps are best-effort: a
// column that is already in the wanted state is an explicit no-op outcome, and
// a failed alteration is reported and skipped rather than aborting the run.
//
// ============================================================================

pub mod store_updates;

pub use store_updates::StoreUpdates;

use crate::core::{Column, DataType, DbError, Result, Value};
use crate::facade::Database;
use crate::storage::{Predicate, Query, Session, TableSchema};
use async_trait::async_trait;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use tracing::{info, warn};

pub const SCHEMA_VERSION_TABLE: &str = "schema_version";

const VERSION_COLUMN: &str = "version_num";

/// Result of a single column step
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum StepOutcome {
    Applied { table: String, column: String },
    AlreadyPresent { table: String, column: String },
    Absent { table: String, column: String },
    Skipped { table: String, column: String, reason: String },
}

impl StepOutcome {
    pub fn is_skipped(&self) -> bool {
        matches!(self, Self::Skipped { .. })
    }
}

#[async_trait]
pub trait Migration: Send + Sync {
    fn revision(&self) -> &'static str;

    fn down_revision(&self) -> Option<&'static str>;

    fn description(&self) -> &'static str {
        ""
    }

    async fn upgrade(&self, db: &Database) -> Vec<StepOutcome>;

    async fn downgrade(&self, db: &Database) -> Vec<StepOutcome>;
}

/// Add a nullable column unless the table already has it.
pub async fn add_column_if_missing(db: &Database, table: &str, column: Column) -> StepOutcome {
    let name = column.name.clone();
    let columns = match db.columns(table).await {
        Ok(columns) => columns,
        Err(err) => return skipped(table, &name, err),
    };

    if columns.iter().any(|existing| existing == &name) {
        return StepOutcome::AlreadyPresent {
            table: table.to_string(),
            column: name,
        };
    }

    match db.add_column(table, column).await {
        Ok(()) => StepOutcome::Applied {
            table: table.to_string(),
            column: name,
        },
        // lost a race with another writer of the same column
        Err(DbError::ColumnExists(..)) => StepOutcome::AlreadyPresent {
            table: table.to_string(),
            column: name,
        },
        Err(err) => skipped(table, &name, err),
    }
}

/// Drop a column if the table has it.
pub async fn drop_column_if_present(db: &Database, table: &str, column: &str) -> StepOutcome {
    let columns = match db.columns(table).await {
        Ok(columns) => columns,
        Err(err) => return skipped(table, column, err),
    };

    if !columns.iter().any(|existing| existing == column) {
        return StepOutcome::Absent {
            table: table.to_string(),
            column: column.to_string(),
        };
    }

    match db.drop_column(table, column).await {
        Ok(()) => StepOutcome::Applied {
            table: table.to_string(),
            column: column.to_string(),
        },
        Err(err) => skipped(table, column, err),
    }
}

fn skipped(table: &str, column: &str, err: DbError) -> StepOutcome {
    warn!(table, column, error = %err, "schema step skipped");
    StepOutcome::Skipped {
        table: table.to_string(),
        column: column.to_string(),
        reason: err.to_string(),
    }
}

/// Steps run for one revision
#[derive(Debug, Clone, Serialize)]
pub struct AppliedRevision {
    pub revision: &'static str,
    pub steps: Vec<StepOutcome>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MigrationReport {
    pub from: Option<String>,
    pub to: Option<String>,
    pub revisions: Vec<AppliedRevision>,
}

/// Runs registered migrations in chain order and tracks the applied head.
#[derive(Default)]
pub struct Migrator {
    migrations: Vec<Box<dyn Migration>>,
}

impl Migrator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every revision shipped with this crate
    pub fn with_defaults() -> Self {
        Self::new().register(StoreUpdates)
    }

    pub fn register<M: Migration + 'static>(mut self, migration: M) -> Self {
        self.migrations.push(Box::new(migration));
        self
    }

    /// Head revision recorded in the database, if any.
    pub async fn current_revision(&self, db: &Database) -> Result<Option<String>> {
        if !db.table_exists(SCHEMA_VERSION_TABLE).await {
            return Ok(None);
        }
        let rows = db.query(SCHEMA_VERSION_TABLE, &Query::all()).await?;
        Ok(rows
            .into_iter()
            .next()
            .and_then(|row| row.into_iter().next())
            .and_then(|value| value.as_str().map(str::to_string)))
    }

    /// Apply every revision after the current head.
    pub async fn upgrade(&self, db: &Database) -> Result<MigrationReport> {
        let chain = self.chain()?;
        let from = self.current_revision(db).await?;
        let start = match &from {
            None => 0,
            Some(current) => match chain.iter().position(|m| m.revision() == current.as_str()) {
                Some(idx) => idx + 1,
                None if chain.first().and_then(|m| m.down_revision()) == Some(current.as_str()) => 0,
                None => {
                    return Err(DbError::ExecutionError(format!(
                        "unknown schema revision '{}'",
                        current
                    )));
                }
            },
        };

        let mut revisions = Vec::new();
        for migration in &chain[start..] {
            info!(revision = migration.revision(), "upgrading schema: {}", migration.description());
            let steps = migration.upgrade(db).await;
            self.set_revision(db, Some(migration.revision())).await?;
            revisions.push(AppliedRevision {
                revision: migration.revision(),
                steps,
            });
        }

        Ok(MigrationReport {
            to: self.current_revision(db).await?,
            from,
            revisions,
        })
    }

    /// Undo revisions from the head down to (not including) `target`.
    /// `None` undoes every registered revision.
    pub async fn downgrade_to(&self, db: &Database, target: Option<&str>) -> Result<MigrationReport> {
        let chain = self.chain()?;
        let from = self.current_revision(db).await?;

        let Some(current) = from.as_deref() else {
            return Ok(MigrationReport {
                from: None,
                to: None,
                revisions: Vec::new(),
            });
        };
        let Some(head) = chain.iter().position(|m| m.revision() == current) else {
            return Err(DbError::ExecutionError(format!(
                "unknown schema revision '{}'",
                current
            )));
        };
        if let Some(target) = target {
            let known = chain.iter().any(|m| m.revision() == target)
                || chain.first().and_then(|m| m.down_revision()) == Some(target);
            if !known {
                return Err(DbError::ExecutionError(format!(
                    "unknown target revision '{}'",
                    target
                )));
            }
        }

        let mut revisions = Vec::new();
        for migration in chain[..=head].iter().rev() {
            if Some(migration.revision()) == target {
                break;
            }
            info!(revision = migration.revision(), "downgrading schema");
            let steps = migration.downgrade(db).await;
            self.set_revision(db, migration.down_revision()).await?;
            revisions.push(AppliedRevision {
                revision: migration.revision(),
                steps,
            });
        }

        Ok(MigrationReport {
            to: self.current_revision(db).await?,
            from,
            revisions,
        })
    }

    /// Registered migrations ordered from base to head.
    fn chain(&self) -> Result<Vec<&dyn Migration>> {
        let revisions: HashSet<&str> = self.migrations.iter().map(|m| m.revision()).collect();
        if revisions.len() != self.migrations.len() {
            return Err(DbError::ExecutionError("duplicate schema revision".into()));
        }

        let mut children: HashMap<&str, &dyn Migration> = HashMap::new();
        let mut bases = Vec::new();
        for migration in &self.migrations {
            match migration.down_revision() {
                Some(parent) if revisions.contains(parent) => {
                    if children.insert(parent, migration.as_ref()).is_some() {
                        return Err(DbError::ExecutionError(format!(
                            "schema revision '{}' has more than one child",
                            parent
                        )));
                    }
                }
                _ => bases.push(migration.as_ref()),
            }
        }

        let mut chain = Vec::with_capacity(self.migrations.len());
        match bases.as_slice() {
            [] if self.migrations.is_empty() => return Ok(chain),
            [base] => chain.push(*base),
            _ => {
                return Err(DbError::ExecutionError(
                    "schema revisions do not form a single chain".into(),
                ));
            }
        }

        while let Some(next) = chain.last().and_then(|m| children.get(m.revision())) {
            chain.push(*next);
        }
        if chain.len() != self.migrations.len() {
            return Err(DbError::ExecutionError(
                "schema revisions do not form a single chain".into(),
            ));
        }
        Ok(chain)
    }

    async fn set_revision(&self, db: &Database, revision: Option<&str>) -> Result<()> {
        db.create_table_if_not_exists(TableSchema::new(
            SCHEMA_VERSION_TABLE,
            vec![Column::new(VERSION_COLUMN, DataType::Text).primary_key()],
        ))
        .await?;

        let mut session = db.begin().await?;
        session
            .delete(SCHEMA_VERSION_TABLE, &Predicate::not_in(VERSION_COLUMN, Vec::new()))
            .await?;
        if let Some(revision) = revision {
            session
                .insert(SCHEMA_VERSION_TABLE, vec![Value::Text(revision.to_string())])
                .await?;
        }
        session.commit().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Step(&'static str, Option<&'static str>);

    #[async_trait]
    impl Migration for Step {
        fn revision(&self) -> &'static str {
            self.0
        }

        fn down_revision(&self) -> Option<&'static str> {
            self.1
        }

        async fn upgrade(&self, _db: &Database) -> Vec<StepOutcome> {
            Vec::new()
        }

        async fn downgrade(&self, _db: &Database) -> Vec<StepOutcome> {
            Vec::new()
        }
    }

    #[test]
    fn test_chain_orders_by_down_revision() {
        let migrator = Migrator::new()
            .register(Step("c", Some("b")))
            .register(Step("a", None))
            .register(Step("b", Some("a")));
        let order: Vec<_> = migrator.chain().unwrap().iter().map(|m| m.revision()).collect();
        assert_eq!(order, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_branching_chain_is_rejected() {
        let migrator = Migrator::new()
            .register(Step("a", None))
            .register(Step("b", Some("a")))
            .register(Step("c", Some("a")));
        assert!(migrator.chain().is_err());
    }

    #[tokio::test]
    async fn test_upgrade_then_downgrade_tracks_head() {
        let db = Database::new();
        let migrator = Migrator::new()
            .register(Step("a", Some("root")))
            .register(Step("b", Some("a")));

        let report = migrator.upgrade(&db).await.unwrap();
        assert_eq!(report.revisions.len(), 2);
        assert_eq!(report.to.as_deref(), Some("b"));

        // nothing left to apply
        assert!(migrator.upgrade(&db).await.unwrap().revisions.is_empty());

        let report = migrator.downgrade_to(&db, Some("a")).await.unwrap();
        assert_eq!(report.revisions.len(), 1);
        assert_eq!(migrator.current_revision(&db).await.unwrap().as_deref(), Some("a"));

        let report = migrator.downgrade_to(&db, None).await.unwrap();
        assert_eq!(report.to.as_deref(), Some("root"));
    }

    #[tokio::test]
    async fn test_step_on_missing_table_is_skipped() {
        let db = Database::new();
        let outcome =
            add_column_if_missing(&db, "flow", Column::new("is_component", DataType::Boolean)).await;
        assert!(outcome.is_skipped());
    }
}
