//! Entity identifiers scoped by entity type.

use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Identifier of an entity type, allocated monotonically by the type registry.
pub type TypeId = u32;

/// Entity identifier: one instance within one type's namespace.
///
/// Instance ids are allocated from a per-type counter and are never reused,
/// so an `EntityId` held from an older snapshot can never alias a newer entity.
///
/// # Layout
/// - `type_id`: 32-bit entity type id
/// - `instance_id`: 64-bit instance id within the type
#[derive(Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EntityId {
    /// Entity type id.
    pub type_id: TypeId,
    /// Instance id within the type.
    pub instance_id: u64,
}

impl EntityId {
    /// Creates a new entity ID.
    #[must_use]
    pub const fn new(type_id: TypeId, instance_id: u64) -> Self {
        Self {
            type_id,
            instance_id,
        }
    }
}

impl fmt::Debug for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntityId({}:{})", self.type_id, self.instance_id)
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.type_id, self.instance_id)
    }
}
