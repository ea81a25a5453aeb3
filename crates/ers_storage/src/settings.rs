//! Configuration for the RAM storage.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Configuration for a [`crate::RamEntityRelationshipStorage`].
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(default))]
pub struct ErsSettings {
    /// How many times `transactional` runs its closure before giving up on
    /// conflicts. Zero behaves like one.
    pub commit_attempts: u32,

    /// Publish value indexes built by queries of transactions that changed no
    /// data. Best effort: losing the race to another commit is ignored.
    pub persist_query_indexes: bool,
}

impl Default for ErsSettings {
    fn default() -> Self {
        Self {
            commit_attempts: 3,
            persist_query_indexes: true,
        }
    }
}

impl ErsSettings {
    /// Creates the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a configuration that never retries and never publishes
    /// query-built indexes.
    #[must_use]
    pub fn strict() -> Self {
        Self {
            commit_attempts: 1,
            persist_query_indexes: false,
        }
    }

    /// Builder method to set the retry budget of `transactional`.
    #[must_use]
    pub fn with_commit_attempts(mut self, attempts: u32) -> Self {
        self.commit_attempts = attempts;
        self
    }

    /// Builder method to set whether query-built indexes are published.
    #[must_use]
    pub fn with_persist_query_indexes(mut self, persist: bool) -> Self {
        self.persist_query_indexes = persist;
        self
    }

    /// Returns the effective number of attempts.
    #[must_use]
    pub fn attempts(&self) -> u32 {
        self.commit_attempts.max(1)
    }
}
