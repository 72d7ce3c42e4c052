//! Retention-bounded transaction log.
//!
//! Every executed vertex of a flow is logged as one transaction. Each flow is
//! a partition capped at `max_transactions_to_keep` rows; appending past the
//! cap evicts the oldest rows in the same storage session as the insert.

pub mod model;
pub mod schema;
pub mod store;

pub use model::{
    IntoReadModel, NewTransaction, TransactionReadResponse, TransactionRecord, to_read_model,
};
pub use schema::{TRANSACTION_TABLE, transaction_table_schema};
pub use store::{DEFAULT_LIST_LIMIT, ListLimit, TransactionLog};
