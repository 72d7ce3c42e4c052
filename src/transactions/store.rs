use super::model::{NewTransaction, TransactionRecord};
use super::schema::{
    FLOW_ID, ID, TIMESTAMP, TRANSACTION_TABLE, record_to_row, row_to_record,
    transaction_table_schema,
};
use crate::core::{Result, Value};
use crate::settings::SettingsProvider;
use crate::storage::{Predicate, Query, Session, TransactionalStore};
use std::num::NonZeroUsize;
use tracing::{debug, warn};
use uuid::Uuid;

/// Default row cap for [`TransactionLog::list_by_flow`]
pub const DEFAULT_LIST_LIMIT: usize = 1000;

/// How many rows a listing may return
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListLimit {
    Max(usize),
    Unbounded,
}

impl ListLimit {
    pub fn as_option(self) -> Option<usize> {
        match self {
            Self::Max(limit) => Some(limit),
            Self::Unbounded => None,
        }
    }
}

impl Default for ListLimit {
    fn default() -> Self {
        Self::Max(DEFAULT_LIST_LIMIT)
    }
}

impl From<usize> for ListLimit {
    fn from(limit: usize) -> Self {
        Self::Max(limit)
    }
}

impl From<Option<usize>> for ListLimit {
    fn from(limit: Option<usize>) -> Self {
        limit.map_or(Self::Unbounded, Self::Max)
    }
}

/// Per-flow bounded transaction log.
///
/// Holds no storage of its own: each append borrows one session from `S` and
/// finishes it (commit or rollback) before returning. The retention limit is
/// read from `P` on every append, so a settings change applies to the next call.
///
/// Ordering within a flow is `timestamp` with `id` as tie-break, ascending for
/// listings and descending when choosing which rows to keep.
pub struct TransactionLog<S, P> {
    store: S,
    settings: P,
}

impl<S, P> TransactionLog<S, P>
where
    S: TransactionalStore,
    P: SettingsProvider,
{
    pub fn new(store: S, settings: P) -> Self {
        Self { store, settings }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn settings(&self) -> &P {
        &self.settings
    }

    /// Create the transaction table if it does not exist yet.
    pub async fn init(&self) -> Result<()> {
        if self.store.ensure_table(transaction_table_schema()).await? {
            debug!(table = TRANSACTION_TABLE, "created transaction table");
        }
        Ok(())
    }

    /// Store `transaction` and trim its flow to the retention limit.
    ///
    /// Returns `Ok(None)` without touching storage when the transaction has no
    /// flow id. On any storage error the insert and the trim are both rolled
    /// back and the error is returned as is.
    pub async fn append(&self, transaction: NewTransaction) -> Result<Option<TransactionRecord>> {
        let Some(flow_id) = transaction.flow_id else {
            debug!("Transaction flow_id is None");
            return Ok(None);
        };

        let record = transaction.into_record(flow_id);
        let max_entries = self.settings.max_transactions_to_keep();

        let mut session = self.store.begin().await?;
        match insert_and_trim(&mut session, &record, max_entries).await {
            Ok(evicted) => {
                session.commit().await?;
                debug!(
                    flow_id = %flow_id,
                    max_entries = max_entries.get(),
                    evicted,
                    "Logged transaction and maintained retention limit"
                );
                Ok(Some(record))
            }
            Err(err) => {
                if let Err(rollback_err) = session.rollback().await {
                    warn!(flow_id = %flow_id, error = %rollback_err, "rollback after failed append also failed");
                }
                Err(err)
            }
        }
    }

    /// Transactions of one flow, oldest first.
    pub async fn list_by_flow(
        &self,
        flow_id: Uuid,
        limit: impl Into<ListLimit>,
    ) -> Result<Vec<TransactionRecord>> {
        let query = Query::all()
            .filter(Predicate::eq(FLOW_ID, flow_id))
            .order_by(TIMESTAMP)
            .order_by(ID)
            .maybe_limit(limit.into().as_option());

        self.store
            .query(TRANSACTION_TABLE, &query)
            .await?
            .into_iter()
            .map(row_to_record)
            .collect()
    }

    /// Number of stored transactions of one flow
    pub async fn count_by_flow(&self, flow_id: Uuid) -> Result<usize> {
        let query = Query::all()
            .filter(Predicate::eq(FLOW_ID, flow_id))
            .select([ID]);
        Ok(self.store.query(TRANSACTION_TABLE, &query).await?.len())
    }
}

/// Insert `record`, then delete everything in its flow outside the newest
/// `max_entries` rows. Returns the number of evicted rows.
async fn insert_and_trim<T: Session>(
    session: &mut T,
    record: &TransactionRecord,
    max_entries: NonZeroUsize,
) -> Result<usize> {
    session
        .insert(TRANSACTION_TABLE, record_to_row(record))
        .await?;

    let keep_query = Query::all()
        .filter(Predicate::eq(FLOW_ID, record.flow_id))
        .order_by_desc(TIMESTAMP)
        .order_by_desc(ID)
        .limit(max_entries.get())
        .select([ID]);

    let keep_ids: Vec<Value> = session
        .query(TRANSACTION_TABLE, &keep_query)
        .await?
        .into_iter()
        .filter_map(|row| row.into_iter().next())
        .collect();

    if keep_ids.len() < max_entries.get() {
        return Ok(0);
    }

    let excess = Predicate::eq(FLOW_ID, record.flow_id).and(Predicate::not_in(ID, keep_ids));
    session.delete(TRANSACTION_TABLE, &excess).await
}
