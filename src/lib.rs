// ============================================================================
// flowlog Library
// ============================================================================
//
// A per-flow, retention-bounded transaction log on top of a small in-memory
// transactional store. Every append inserts one record and trims its flow to
// the newest `max_transactions_to_keep` entries inside the same session.
//
// ============================================================================

pub mod config;
pub mod core;
pub mod facade;
pub mod migration;
pub mod settings;
pub mod storage;
pub mod transaction;
pub mod transactions;

pub use crate::config::DatabaseConfig;
pub use crate::core::{DataType, DbError, Result, Value};
pub use crate::facade::Database;
pub use crate::migration::{Migration, MigrationReport, Migrator, StepOutcome};
pub use crate::settings::{Settings, SettingsProvider, SharedSettings};
pub use crate::transactions::{
    ListLimit, NewTransaction, TransactionLog, TransactionReadResponse, TransactionRecord,
    to_read_model,
};
