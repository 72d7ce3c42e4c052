// ============================================================================
// Transaction Management Module
// ============================================================================
//
// Sessions lock each table they write on first write and keep the lock until
// they finish (strict two-phase locking on writes). Every write is paired with
// an undo entry; rollback replays the undo log in reverse.
//
// Design Patterns Used:
// - State Pattern: Transaction state management (Active, Committed, Aborted)
// - Command Pattern: Reversible operations for rollback
// - RAII: a dropped active session rolls itself back
//
// ============================================================================

pub mod change;
pub mod manager;
pub mod session;
pub mod state;

pub use change::Change;
pub use manager::{TransactionManager, TransactionStats};
pub use session::MemorySession;
pub use state::{TransactionId, TransactionState};
