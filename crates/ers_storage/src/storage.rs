//! The RAM storage: one atomically published snapshot pointer.

use std::sync::Arc;

use arc_swap::ArcSwap;
use ers_foundation::Result;
use tracing::debug;

use crate::api::{EntityRelationshipStorage, Transaction};
use crate::container::DataContainer;
use crate::settings::ErsSettings;
use crate::transaction::RamTransaction;

#[derive(Debug)]
struct StorageInner {
    current: ArcSwap<DataContainer>,
    settings: ErsSettings,
}

/// In-memory entity-relationship storage.
///
/// Holds the latest committed [`DataContainer`]. Transactions capture it at
/// begin and publish their result with a compare-and-swap against the
/// captured pointer, so readers never block and never see a partial commit.
/// Clones share the same database.
#[derive(Debug, Clone)]
pub struct RamEntityRelationshipStorage {
    inner: Arc<StorageInner>,
}

impl Default for RamEntityRelationshipStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl RamEntityRelationshipStorage {
    /// Creates an empty storage with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::with_settings(ErsSettings::default())
    }

    /// Creates an empty storage.
    #[must_use]
    pub fn with_settings(settings: ErsSettings) -> Self {
        Self::from_container(DataContainer::new(), settings)
    }

    fn from_container(container: DataContainer, settings: ErsSettings) -> Self {
        Self {
            inner: Arc::new(StorageInner {
                current: ArcSwap::from_pointee(container),
                settings,
            }),
        }
    }

    /// Returns the settings.
    #[must_use]
    pub fn settings(&self) -> &ErsSettings {
        &self.inner.settings
    }

    /// Returns the latest committed snapshot.
    #[must_use]
    pub fn current(&self) -> Arc<DataContainer> {
        self.inner.current.load_full()
    }

    /// Publishes `new` if the current snapshot is still `expected`.
    pub(crate) fn compare_and_swap(
        &self,
        expected: &Arc<DataContainer>,
        new: Arc<DataContainer>,
    ) -> bool {
        let previous = self.inner.current.compare_and_swap(expected, new);
        Arc::ptr_eq(&*previous, expected)
    }
}

impl EntityRelationshipStorage for RamEntityRelationshipStorage {
    type Transaction = RamTransaction;

    fn begin_transaction(&self, readonly: bool) -> Result<RamTransaction> {
        Ok(RamTransaction::new(self.clone(), readonly))
    }

    fn as_readonly(&self) -> Result<Self> {
        let current = self.current();
        let flattened = current.to_immutable()?;
        debug!("flattened snapshot into a read-only storage");
        Ok(Self::from_container(flattened, self.settings().clone()))
    }

    fn transactional<T, F>(&self, readonly: bool, mut f: F) -> Result<T>
    where
        F: FnMut(&RamTransaction) -> Result<T>,
    {
        let attempts = self.settings().attempts();
        let mut attempt = 1;
        loop {
            let txn = self.begin_transaction(readonly)?;
            let outcome = f(&txn).and_then(|value| txn.commit().map(|()| value));
            match outcome {
                Ok(value) => return Ok(value),
                Err(err) => {
                    txn.abort();
                    if !err.is_retryable() || attempt >= attempts {
                        return Err(err);
                    }
                    debug!(attempt, "retrying conflicting transaction");
                    attempt += 1;
                }
            }
        }
    }
}
