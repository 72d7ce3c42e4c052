use std::time::Duration;

/// How long a session waits for a table lock before giving up
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(5);

/// Storage engine configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Database name, used in diagnostics only
    pub name: String,

    /// Upper bound on any wait for a table lock
    pub lock_timeout: Duration,
}

impl DatabaseConfig {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
        }
    }

    /// Set the lock timeout
    pub fn lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self::new("flowlog")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let config = DatabaseConfig::new("logs").lock_timeout(Duration::from_millis(250));
        assert_eq!(config.name, "logs");
        assert_eq!(config.lock_timeout, Duration::from_millis(250));
        assert_eq!(DatabaseConfig::default().lock_timeout, DEFAULT_LOCK_TIMEOUT);
    }
}
