//! Runtime settings consumed by the transaction log.
//!
//! The log store never reads process-wide state; it is handed a
//! [`SettingsProvider`] and asks it for the retention limit on every append.

use crate::core::{DbError, Result};
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::sync::{Arc, RwLock};

pub const DEFAULT_MAX_TRANSACTIONS_TO_KEEP: NonZeroUsize = match NonZeroUsize::new(3000) {
    Some(value) => value,
    None => unreachable!(),
};

/// Environment variable overriding `max_transactions_to_keep`
pub const MAX_TRANSACTIONS_TO_KEEP_ENV: &str = "FLOWLOG_MAX_TRANSACTIONS_TO_KEEP";

fn default_max_transactions_to_keep() -> NonZeroUsize {
    DEFAULT_MAX_TRANSACTIONS_TO_KEEP
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Per-flow cap on stored transactions
    #[serde(default = "default_max_transactions_to_keep")]
    pub max_transactions_to_keep: NonZeroUsize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            max_transactions_to_keep: DEFAULT_MAX_TRANSACTIONS_TO_KEEP,
        }
    }
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from an arbitrary key lookup; unset keys keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut settings = Self::default();

        if let Some(raw) = lookup(MAX_TRANSACTIONS_TO_KEEP_ENV) {
            settings.max_transactions_to_keep = raw.trim().parse().map_err(|_| {
                DbError::ConfigError(format!(
                    "{} must be a positive integer, got '{}'",
                    MAX_TRANSACTIONS_TO_KEEP_ENV, raw
                ))
            })?;
        }

        Ok(settings)
    }

    pub fn with_max_transactions_to_keep(mut self, max: NonZeroUsize) -> Self {
        self.max_transactions_to_keep = max;
        self
    }
}

/// Supplies the retention limit. Implementations must be cheap to query.
pub trait SettingsProvider: Send + Sync {
    fn max_transactions_to_keep(&self) -> NonZeroUsize;
}

impl SettingsProvider for Settings {
    fn max_transactions_to_keep(&self) -> NonZeroUsize {
        self.max_transactions_to_keep
    }
}

impl<P: SettingsProvider + ?Sized> SettingsProvider for Arc<P> {
    fn max_transactions_to_keep(&self) -> NonZeroUsize {
        (**self).max_transactions_to_keep()
    }
}

/// Settings that can be changed while the log is in use.
///
/// Clones share state; an update is seen by the next read.
#[derive(Debug, Clone, Default)]
pub struct SharedSettings {
    inner: Arc<RwLock<Settings>>,
}

impl SharedSettings {
    pub fn new(settings: Settings) -> Self {
        Self {
            inner: Arc::new(RwLock::new(settings)),
        }
    }

    pub fn get(&self) -> Settings {
        match self.inner.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn replace(&self, settings: Settings) {
        match self.inner.write() {
            Ok(mut guard) => *guard = settings,
            Err(poisoned) => *poisoned.into_inner() = settings,
        }
    }

    pub fn set_max_transactions_to_keep(&self, max: NonZeroUsize) {
        let updated = self.get().with_max_transactions_to_keep(max);
        self.replace(updated);
    }
}

impl SettingsProvider for SharedSettings {
    fn max_transactions_to_keep(&self) -> NonZeroUsize {
        self.get().max_transactions_to_keep
    }
}
