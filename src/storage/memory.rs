use super::query::Query;
use super::{Table, TableSchema};
use crate::core::{DbError, Result, Row};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{OwnedRwLockReadGuard, OwnedRwLockWriteGuard, RwLock};
use tokio::time::timeout;

/// Table registry with one lock per table.
///
/// The registry lock only guards the name -> table map and is held briefly.
/// Table locks may be held for the length of a session; every wait on them
/// is bounded by `lock_timeout`.
pub struct InMemoryStorage {
    tables: RwLock<HashMap<String, Arc<RwLock<Table>>>>,
    lock_timeout: Duration,
}

impl InMemoryStorage {
    pub fn new(lock_timeout: Duration) -> Self {
        Self {
            tables: RwLock::new(HashMap::new()),
            lock_timeout,
        }
    }

    pub async fn create_table(&self, schema: TableSchema) -> Result<()> {
        let mut tables = self.tables.write().await;
        let name = schema.name().to_string();

        if tables.contains_key(&name) {
            return Err(DbError::TableExists(name));
        }

        tables.insert(name, Arc::new(RwLock::new(Table::new(schema))));
        Ok(())
    }

    pub async fn create_table_if_not_exists(&self, schema: TableSchema) -> Result<bool> {
        match self.create_table(schema).await {
            Ok(()) => Ok(true),
            Err(DbError::TableExists(_)) => Ok(false),
            Err(err) => Err(err),
        }
    }

    pub async fn table_exists(&self, name: &str) -> bool {
        self.tables.read().await.contains_key(name)
    }

    pub async fn list_tables(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tables.read().await.keys().cloned().collect();
        names.sort();
        names
    }

    pub async fn get_table(&self, name: &str) -> Result<Arc<RwLock<Table>>> {
        self.tables
            .read()
            .await
            .get(name)
            .cloned()
            .ok_or_else(|| DbError::TableNotFound(name.to_string()))
    }

    /// Shared access to a table, waiting at most `lock_timeout`
    pub async fn read_table(&self, name: &str) -> Result<OwnedRwLockReadGuard<Table>> {
        let handle = self.get_table(name).await?;
        Ok(timeout(self.lock_timeout, handle.read_owned()).await?)
    }

    /// Exclusive access to a table, waiting at most `lock_timeout`
    pub async fn write_table(&self, name: &str) -> Result<OwnedRwLockWriteGuard<Table>> {
        let handle = self.get_table(name).await?;
        Ok(timeout(self.lock_timeout, handle.write_owned()).await?)
    }

    /// Read committed rows
    pub async fn scan(&self, name: &str, query: &Query) -> Result<Vec<Row>> {
        let table = self.read_table(name).await?;
        table.select(query)
    }

    pub async fn get_schema(&self, name: &str) -> Result<TableSchema> {
        let table = self.read_table(name).await?;
        Ok(table.schema().clone())
    }

    pub async fn row_count(&self, name: &str) -> Result<usize> {
        let table = self.read_table(name).await?;
        Ok(table.row_count())
    }
}

impl Default for InMemoryStorage {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_LOCK_TIMEOUT)
    }
}
