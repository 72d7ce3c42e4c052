pub mod engine;
pub mod memory;
pub mod query;
pub mod table;

pub use engine::{Session, TransactionalStore};
pub use memory::InMemoryStorage;
pub use query::{OrderBy, Predicate, Query};
pub use table::{RowId, Table, TableSchema};
