//! Blob stores: unindexed raw bytes per instance.

use bytes::Bytes;
use ers_foundation::{Result, TransactionalPersistentLongMap};

use crate::attributes::AttributesImmutable;

/// Persistent blobs of one `(type, blob name)` attribute.
#[derive(Debug, Clone, Default)]
pub struct BlobsMutable {
    blobs: TransactionalPersistentLongMap<Bytes>,
}

impl BlobsMutable {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Gets the blob of an instance.
    #[must_use]
    pub fn get(&self, instance_id: u64) -> Option<&Bytes> {
        self.blobs.get(&instance_id)
    }

    /// Returns the number of stored blobs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.blobs.len()
    }

    /// Returns true if nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.blobs.is_empty()
    }

    /// Stores a blob. Returns `None` if an equal blob was already there.
    #[must_use]
    pub fn set_blob(&self, instance_id: u64, value: Bytes) -> Option<Self> {
        if self.blobs.get(&instance_id) == Some(&value) {
            return None;
        }
        Some(Self {
            blobs: self.blobs.update(instance_id, value),
        })
    }

    /// Removes a blob. Returns `None` if there was none.
    #[must_use]
    pub fn delete_blob(&self, instance_id: u64) -> Option<Self> {
        if !self.blobs.contains_key(&instance_id) {
            return None;
        }
        Some(Self {
            blobs: self.blobs.without(&instance_id),
        })
    }

    /// Flattens the store into its dense form.
    ///
    /// # Errors
    ///
    /// Returns [`ers_foundation::ErrorKind::CapacityExceeded`] if the blobs
    /// outgrow the dense buffer.
    pub fn to_immutable(&self) -> Result<BlobsImmutable> {
        let attributes = AttributesImmutable::from_sorted(self.blobs.iter().map(|(id, v)| (*id, v)))?;
        Ok(BlobsImmutable { attributes })
    }
}

/// Read-only blobs of one attribute in the dense form.
#[derive(Debug, Default)]
pub struct BlobsImmutable {
    attributes: AttributesImmutable,
}

impl BlobsImmutable {
    /// Gets the blob of an instance.
    #[must_use]
    pub fn get(&self, instance_id: u64) -> Option<Bytes> {
        self.attributes.get(instance_id)
    }

    /// Returns the number of stored blobs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    /// Returns true if nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }
}
