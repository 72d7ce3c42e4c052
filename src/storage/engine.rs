// ============================================================================
// Storage Engine Contract
// ============================================================================
//
// The log store talks to storage only through these two traits. A store hands
// out sessions; a session is one transactional scope.
//
// Scoped-release contract for implementors:
// - `commit` and `rollback` consume the session
// - if `commit` fails, the session's writes must already be rolled back
// - a session dropped while still active must roll back before the drop returns
//
// ============================================================================

use super::query::{Predicate, Query};
use super::table::TableSchema;
use crate::core::{Result, Row};
use async_trait::async_trait;

/// One transactional scope over the store
#[async_trait]
pub trait Session: Send {
    /// Insert a full row into `table`
    async fn insert(&mut self, table: &str, row: Row) -> Result<()>;

    /// Read rows, seeing this session's own uncommitted writes
    async fn query(&mut self, table: &str, query: &Query) -> Result<Vec<Row>>;

    /// Delete every row matching `predicate`, returning how many were removed
    async fn delete(&mut self, table: &str, predicate: &Predicate) -> Result<usize>;

    /// Make all writes of this session visible and release it
    async fn commit(self) -> Result<()>;

    /// Discard all writes of this session and release it
    async fn rollback(self) -> Result<()>;
}

/// Storage engine handing out sessions
#[async_trait]
pub trait TransactionalStore: Send + Sync {
    type Session: Session;

    /// Open a new transactional scope
    async fn begin(&self) -> Result<Self::Session>;

    /// Autocommit read of committed data
    async fn query(&self, table: &str, query: &Query) -> Result<Vec<Row>>;

    /// Create `schema` unless a table with that name exists. Returns true if created.
    async fn ensure_table(&self, schema: TableSchema) -> Result<bool>;
}
