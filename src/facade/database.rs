use crate::config::DatabaseConfig;
use crate::core::{Column, Result, Row};
use crate::storage::{InMemoryStorage, Query, TableSchema, TransactionalStore};
use crate::transaction::{MemorySession, TransactionManager, TransactionStats};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

/// In-memory relational engine.
///
/// Cloning is cheap and every clone shares the same tables. DDL runs under
/// the affected table's write lock, so it waits for open sessions on that
/// table to finish.
///
/// # Examples
///
/// ```
/// use flowlog::{Database, Value};
/// use flowlog::core::{Column, DataType};
/// use flowlog::storage::{Query, Session, TableSchema};
///
/// # #[tokio::main]
/// # async fn main() -> flowlog::Result<()> {
/// let db = Database::new();
/// db.create_table(TableSchema::new(
///     "flow",
///     vec![Column::new("id", DataType::Integer).primary_key()],
/// ))
/// .await?;
///
/// let mut session = db.begin().await?;
/// session.insert("flow", vec![Value::Integer(1)]).await?;
/// session.commit().await?;
///
/// assert_eq!(db.query("flow", &Query::all()).await?.len(), 1);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Database {
    config: DatabaseConfig,
    storage: Arc<InMemoryStorage>,
    transaction_manager: Arc<TransactionManager>,
}

impl Database {
    pub fn new() -> Self {
        Self::with_config(DatabaseConfig::default())
    }

    pub fn with_config(config: DatabaseConfig) -> Self {
        let storage = Arc::new(InMemoryStorage::new(config.lock_timeout));
        Self {
            config,
            storage,
            transaction_manager: Arc::new(TransactionManager::new()),
        }
    }

    pub async fn create_table(&self, schema: TableSchema) -> Result<()> {
        debug!(db = %self.config.name, table = schema.name(), "create table");
        self.storage.create_table(schema).await
    }

    pub async fn create_table_if_not_exists(&self, schema: TableSchema) -> Result<bool> {
        self.storage.create_table_if_not_exists(schema).await
    }

    pub async fn table_exists(&self, name: &str) -> bool {
        self.storage.table_exists(name).await
    }

    pub async fn list_tables(&self) -> Vec<String> {
        self.storage.list_tables().await
    }

    /// Column names of `table`, in storage order
    pub async fn columns(&self, table: &str) -> Result<Vec<String>> {
        Ok(self.storage.get_schema(table).await?.column_names())
    }

    pub async fn add_column(&self, table: &str, column: Column) -> Result<()> {
        let mut locked = self.storage.write_table(table).await?;
        debug!(db = %self.config.name, table, column = %column.name, "add column");
        locked.add_column(column)
    }

    pub async fn drop_column(&self, table: &str, column: &str) -> Result<()> {
        let mut locked = self.storage.write_table(table).await?;
        debug!(db = %self.config.name, table, column, "drop column");
        locked.drop_column(column).map(|_| ())
    }

    pub async fn row_count(&self, table: &str) -> Result<usize> {
        self.storage.row_count(table).await
    }

    /// Open a new session
    pub async fn begin(&self) -> Result<MemorySession> {
        Ok(MemorySession::new(
            self.storage.clone(),
            self.transaction_manager.clone(),
        ))
    }

    /// Autocommit read of committed rows
    pub async fn query(&self, table: &str, query: &Query) -> Result<Vec<Row>> {
        self.storage.scan(table, query).await
    }

    pub fn stats(&self) -> TransactionStats {
        self.transaction_manager.stats()
    }
}

impl Default for Database {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TransactionalStore for Database {
    type Session = MemorySession;

    async fn begin(&self) -> Result<MemorySession> {
        Database::begin(self).await
    }

    async fn query(&self, table: &str, query: &Query) -> Result<Vec<Row>> {
        Database::query(self, table, query).await
    }

    async fn ensure_table(&self, schema: TableSchema) -> Result<bool> {
        self.create_table_if_not_exists(schema).await
    }
}
