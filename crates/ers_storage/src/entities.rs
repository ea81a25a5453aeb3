//! Per-type instance id allocation with tombstones.
//!
//! Instance ids are handed out from a monotonically increasing counter and are
//! never recycled: deleting an entity only records its id in a tombstone set.

use ers_foundation::SparseBitSet;

/// Instance id counter and tombstone set of one entity type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Entities {
    /// Next free instance id.
    instance_id_counter: u64,
    /// Deleted instance ids.
    deleted: SparseBitSet,
}

impl Entities {
    /// Creates an empty entity set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reassembles an entity set from its counter and tombstones.
    #[must_use]
    pub fn from_parts(instance_id_counter: u64, deleted: SparseBitSet) -> Self {
        Self {
            instance_id_counter,
            deleted,
        }
    }

    /// Returns the next instance id that would be allocated.
    #[must_use]
    pub fn instance_id_counter(&self) -> u64 {
        self.instance_id_counter
    }

    /// Returns the tombstone set.
    #[must_use]
    pub fn deleted(&self) -> &SparseBitSet {
        &self.deleted
    }

    /// Allocates a fresh instance id.
    pub fn allocate(&mut self) -> u64 {
        let id = self.instance_id_counter;
        self.instance_id_counter += 1;
        id
    }

    /// Returns true if the instance was allocated and not deleted.
    #[must_use]
    pub fn exists(&self, instance_id: u64) -> bool {
        instance_id < self.instance_id_counter && !self.deleted.contains(instance_id)
    }

    /// Tombstones an instance. Returns false if it did not exist.
    pub fn delete(&mut self, instance_id: u64) -> bool {
        self.exists(instance_id) && self.deleted.set(instance_id)
    }

    /// Returns the number of live instances.
    #[must_use]
    pub fn live_count(&self) -> u64 {
        self.instance_id_counter - self.deleted.len() as u64
    }

    /// Iterates over live instance ids in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = u64> + '_ {
        (0..self.instance_id_counter).filter(|id| !self.deleted.contains(*id))
    }
}
