use std::fmt;

/// Session identifier, unique within one `TransactionManager`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TransactionId(u64);

impl TransactionId {
    pub(crate) fn from_raw(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "txn_{}", self.0)
    }
}

/// Lifecycle of a session: `Active` until commit, rollback or drop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    Active,
    Committed,
    Aborted,
}

impl TransactionState {
    pub fn is_active(self) -> bool {
        self == Self::Active
    }
}

impl fmt::Display for TransactionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Active => "active",
            Self::Committed => "committed",
            Self::Aborted => "aborted",
        };
        f.write_str(label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_display() {
        assert_eq!(TransactionId::from_raw(7).to_string(), "txn_7");
    }

    #[test]
    fn test_only_active_is_active() {
        assert!(TransactionState::Active.is_active());
        assert!(!TransactionState::Committed.is_active());
        assert_eq!(TransactionState::Aborted.to_string(), "aborted");
    }
}
