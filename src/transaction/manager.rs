// ============================================================================
// Transaction Manager
// ============================================================================
//
// Bookkeeping for sessions: which are still open, and how many ended each way.
// Kept behind a std mutex because sessions deregister from `Drop`.
//
// ============================================================================

use super::{TransactionId, TransactionState};
use std::collections::HashSet;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
struct Registry {
    active: HashSet<TransactionId>,
    committed: u64,
    aborted: u64,
}

#[derive(Debug, Default)]
pub struct TransactionManager {
    next_id: AtomicU64,
    registry: Mutex<Registry>,
}

/// Snapshot of session counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransactionStats {
    pub active: usize,
    pub committed: u64,
    pub aborted: u64,
}

impl TransactionManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin(&self) -> TransactionId {
        let id = TransactionId::from_raw(self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        let mut registry = self.registry.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        registry.active.insert(id);
        id
    }

    /// Record the terminal state of a session. Ending an unknown id is a no-op.
    pub fn finish(&self, id: TransactionId, state: TransactionState) {
        let mut registry = self.registry.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if !registry.active.remove(&id) {
            return;
        }
        match state {
            TransactionState::Committed => registry.committed += 1,
            TransactionState::Aborted => registry.aborted += 1,
            TransactionState::Active => {
                registry.active.insert(id);
            }
        }
    }

    pub fn is_active(&self, id: TransactionId) -> bool {
        let registry = self.registry.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        registry.active.contains(&id)
    }

    pub fn stats(&self) -> TransactionStats {
        let registry = self.registry.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        TransactionStats {
            active: registry.active.len(),
            committed: registry.committed,
            aborted: registry.aborted,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_begin_and_finish() {
        let tm = TransactionManager::new();
        let tx1 = tm.begin();
        let tx2 = tm.begin();
        assert_ne!(tx1, tx2);
        assert!(tm.is_active(tx1));

        tm.finish(tx1, TransactionState::Committed);
        tm.finish(tx2, TransactionState::Aborted);

        assert_eq!(
            tm.stats(),
            TransactionStats {
                active: 0,
                committed: 1,
                aborted: 1
            }
        );
    }

    #[test]
    fn test_finish_twice_counts_once() {
        let tm = TransactionManager::new();
        let tx = tm.begin();
        tm.finish(tx, TransactionState::Aborted);
        tm.finish(tx, TransactionState::Aborted);
        assert_eq!(tm.stats().aborted, 1);
    }
}
