use super::{Change, TransactionId, TransactionManager, TransactionState};
use crate::core::{DbError, Result, Row};
use crate::storage::{InMemoryStorage, Predicate, Query, Session, Table};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::OwnedRwLockWriteGuard;
use tracing::{debug, warn};

/// Session over `InMemoryStorage`.
///
/// Writes go straight into the table while its write lock is held, so other
/// sessions and autocommit readers never observe them before commit. Locks are
/// released only when the session commits, rolls back or is dropped.
pub struct MemorySession {
    id: TransactionId,
    state: TransactionState,
    storage: Arc<InMemoryStorage>,
    manager: Arc<TransactionManager>,
    locks: HashMap<String, OwnedRwLockWriteGuard<Table>>,
    undo: Vec<Change>,
}

impl MemorySession {
    pub(crate) fn new(storage: Arc<InMemoryStorage>, manager: Arc<TransactionManager>) -> Self {
        let id = manager.begin();
        Self {
            id,
            state: TransactionState::Active,
            storage,
            manager,
            locks: HashMap::new(),
            undo: Vec::new(),
        }
    }

    pub fn id(&self) -> TransactionId {
        self.id
    }

    pub fn state(&self) -> TransactionState {
        self.state
    }

    /// Number of undo records held
    pub fn change_count(&self) -> usize {
        self.undo.len()
    }

    async fn lock_for_write(&mut self, table: &str) -> Result<&mut Table> {
        if !self.locks.contains_key(table) {
            let guard = self.storage.write_table(table).await?;
            self.locks.insert(table.to_string(), guard);
        }
        self.locks
            .get_mut(table)
            .map(|guard| &mut **guard)
            .ok_or_else(|| DbError::LockError(format!("lock on '{}' was lost", table)))
    }

    fn revert_all(&mut self) {
        while let Some(change) = self.undo.pop() {
            match self.locks.get_mut(change.table_name()) {
                Some(table) => change.revert(table),
                None => warn!(txn = %self.id, table = change.table_name(), "undo entry without table lock"),
            }
        }
    }

    fn finish(&mut self, state: TransactionState) {
        self.state = state;
        self.locks.clear();
        self.manager.finish(self.id, state);
    }
}

#[async_trait]
impl Session for MemorySession {
    async fn insert(&mut self, table: &str, row: Row) -> Result<()> {
        let row_id = self.lock_for_write(table).await?.insert(row)?;
        self.undo.push(Change::InsertRow {
            table: table.to_string(),
            row_id,
        });
        Ok(())
    }

    async fn query(&mut self, table: &str, query: &Query) -> Result<Vec<Row>> {
        match self.locks.get(table) {
            Some(guard) => guard.select(query),
            None => self.storage.scan(table, query).await,
        }
    }

    async fn delete(&mut self, table: &str, predicate: &Predicate) -> Result<usize> {
        let locked = self.lock_for_write(table).await?;
        let mut removed = Vec::new();
        for row_id in locked.matching_ids(predicate)? {
            if let Some(old_row) = locked.remove(row_id) {
                removed.push((row_id, old_row));
            }
        }

        let count = removed.len();
        self.undo
            .extend(removed.into_iter().map(|(row_id, old_row)| Change::DeleteRow {
                table: table.to_string(),
                row_id,
                old_row,
            }));
        Ok(count)
    }

    async fn commit(mut self) -> Result<()> {
        debug!(txn = %self.id, changes = self.undo.len(), "commit");
        self.undo.clear();
        self.finish(TransactionState::Committed);
        Ok(())
    }

    async fn rollback(mut self) -> Result<()> {
        debug!(txn = %self.id, changes = self.undo.len(), "rollback");
        self.revert_all();
        self.finish(TransactionState::Aborted);
        Ok(())
    }
}

impl Drop for MemorySession {
    fn drop(&mut self) {
        if self.state.is_active() {
            if !self.undo.is_empty() {
                warn!(txn = %self.id, changes = self.undo.len(), "session dropped while active, rolling back");
            }
            self.revert_all();
            self.finish(TransactionState::Aborted);
        }
    }
}

impl std::fmt::Debug for MemorySession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemorySession")
            .field("id", &self.id)
            .field("state", &self.state)
            .field("locked_tables", &self.locks.keys().collect::<Vec<_>>())
            .field("changes", &self.undo.len())
            .finish()
    }
}
