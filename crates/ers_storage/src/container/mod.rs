//! Data containers: the whole database state as one copy-on-write value.
//!
//! A [`DataContainer`] is either the persistent form, backed by structurally
//! shared trees and cheap to derive new versions from, or the flattened form,
//! built once for fast reads and refusing every write.
//!
//! Writes never modify a container in place. Each returns `Ok(Some(next))`
//! with a new container, or `Ok(None)` when nothing changed, so the caller's
//! container keeps its identity.
//!
//! Queries that may build a value index return `(Option<DataContainer>, _)`;
//! the container is present exactly when an index was built and should be
//! kept for later queries.

pub mod immutable;
pub mod mutable;

use std::sync::Arc;

use bytes::Bytes;
use ers_foundation::{EntityId, Error, Result, TypeId};

use crate::api::FindOption;

pub use immutable::RamDataContainerImmutable;
pub use mutable::RamDataContainerMutable;

/// Identifies one attribute: a property, link or blob name within a type.
///
/// Ordered by type id, then name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AttributeKey {
    /// Owner entity type.
    pub type_id: TypeId,
    /// Attribute name.
    pub name: String,
}

impl AttributeKey {
    /// Creates an attribute key.
    #[must_use]
    pub fn new(type_id: TypeId, name: impl Into<String>) -> Self {
        Self {
            type_id,
            name: name.into(),
        }
    }
}

/// One version of the database state.
#[derive(Debug, Clone)]
pub enum DataContainer {
    /// Persistent, copy-on-write form.
    Mutable(RamDataContainerMutable),
    /// Flattened, read-only form.
    Immutable(Arc<RamDataContainerImmutable>),
}

impl Default for DataContainer {
    fn default() -> Self {
        Self::Mutable(RamDataContainerMutable::new())
    }
}

macro_rules! read_any {
    ($self:ident, $c:ident => $body:expr) => {
        match $self {
            DataContainer::Mutable($c) => $body,
            DataContainer::Immutable($c) => $body,
        }
    };
}

macro_rules! write_mutable {
    ($self:ident, $op:literal, $c:ident => $body:expr) => {
        match $self {
            DataContainer::Mutable($c) => Ok($body?.map(DataContainer::Mutable)),
            DataContainer::Immutable(_) => Err(Error::container_immutable($op)),
        }
    };
}

impl DataContainer {
    /// Creates an empty database.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true for the flattened form.
    #[must_use]
    pub fn is_immutable(&self) -> bool {
        matches!(self, Self::Immutable(_))
    }

    /// Returns true if writes have been staged since the last commit.
    #[must_use]
    pub fn is_mutable(&self) -> bool {
        match self {
            Self::Mutable(c) => c.is_mutable(),
            Self::Immutable(_) => false,
        }
    }

    /// Returns a copy in the staged state.
    ///
    /// # Errors
    ///
    /// Returns [`ers_foundation::ErrorKind::ContainerImmutable`] for the flattened form.
    pub fn mutate(&self) -> Result<Self> {
        match self {
            Self::Mutable(c) => Ok(Self::Mutable(c.mutate())),
            Self::Immutable(_) => Err(Error::container_immutable("mutate")),
        }
    }

    /// Folds staged writes into the persistent maps.
    #[must_use]
    pub fn commit(&self) -> Self {
        match self {
            Self::Mutable(c) => Self::Mutable(c.commit()),
            Self::Immutable(_) => self.clone(),
        }
    }

    /// Flattens the container. The flattened form is returned as is.
    ///
    /// # Errors
    ///
    /// Returns [`ers_foundation::ErrorKind::CapacityExceeded`] if an attribute
    /// outgrows the dense encoding.
    pub fn to_immutable(&self) -> Result<Self> {
        match self {
            Self::Mutable(c) => Ok(Self::Immutable(Arc::new(c.to_immutable()?))),
            Self::Immutable(_) => Ok(self.clone()),
        }
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Returns true if the entity was allocated and not deleted.
    #[must_use]
    pub fn entity_exists(&self, id: EntityId) -> bool {
        read_any!(self, c => c.entity_exists(id))
    }

    /// Returns the id of a registered type.
    #[must_use]
    pub fn type_id(&self, type_name: &str) -> Option<TypeId> {
        read_any!(self, c => c.type_id(type_name))
    }

    /// Returns live instance ids of a type, ascending.
    #[must_use]
    pub fn all(&self, type_id: TypeId) -> Vec<u64> {
        read_any!(self, c => c.all(type_id))
    }

    /// Sorted property names of a type.
    #[must_use]
    pub fn property_names(&self, type_id: TypeId) -> Vec<String> {
        read_any!(self, c => c.property_names(type_id))
    }

    /// Sorted blob names of a type.
    #[must_use]
    pub fn blob_names(&self, type_id: TypeId) -> Vec<String> {
        read_any!(self, c => c.blob_names(type_id))
    }

    /// Sorted link names of a type.
    #[must_use]
    pub fn link_names(&self, type_id: TypeId) -> Vec<String> {
        read_any!(self, c => c.link_names(type_id))
    }

    /// Reads a property value.
    #[must_use]
    pub fn get_property(&self, id: EntityId, name: &str) -> Option<Bytes> {
        read_any!(self, c => c.get_property(id, name))
    }

    /// Reads a blob.
    #[must_use]
    pub fn get_blob(&self, id: EntityId, name: &str) -> Option<Bytes> {
        read_any!(self, c => c.get_blob(id, name))
    }

    /// Returns the live targets of a link attribute, ascending.
    ///
    /// # Errors
    ///
    /// Returns [`ers_foundation::ErrorKind::MalformedValue`] if a flattened
    /// link run cannot be decoded.
    pub fn links(&self, id: EntityId, name: &str) -> Result<Vec<EntityId>> {
        read_any!(self, c => c.links(id, name))
    }

    /// Returns live instances of `type_id` whose property satisfies `option`.
    #[must_use]
    pub fn find(
        &self,
        type_id: TypeId,
        name: &str,
        option: FindOption,
        value: &[u8],
    ) -> (Option<Self>, Vec<u64>) {
        match self {
            Self::Mutable(c) => {
                let (built, ids) = c.find(type_id, name, option, value);
                (built.map(Self::Mutable), ids)
            }
            Self::Immutable(c) => (None, c.find(type_id, name, option, value)),
        }
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Returns the id of a type, registering it if needed.
    ///
    /// # Errors
    ///
    /// Fails on the flattened form if the type is unknown.
    pub fn get_or_allocate_type_id(&self, type_name: &str) -> Result<(Option<Self>, TypeId)> {
        match self {
            Self::Mutable(c) => {
                let (next, type_id) = c.get_or_allocate_type_id(type_name);
                Ok((next.map(Self::Mutable), type_id))
            }
            Self::Immutable(c) => c
                .type_id(type_name)
                .map(|type_id| (None, type_id))
                .ok_or_else(|| Error::container_immutable("allocate type id")),
        }
    }

    /// Allocates a fresh instance id of a type.
    ///
    /// # Errors
    ///
    /// Fails on the flattened form.
    pub fn allocate_instance_id(&self, type_id: TypeId) -> Result<(Self, u64)> {
        match self {
            Self::Mutable(c) => {
                let (next, instance_id) = c.allocate_instance_id(type_id);
                Ok((Self::Mutable(next), instance_id))
            }
            Self::Immutable(_) => Err(Error::container_immutable("allocate instance id")),
        }
    }

    /// Tombstones an entity.
    ///
    /// # Errors
    ///
    /// Fails on the flattened form.
    pub fn delete_entity(&self, id: EntityId) -> Result<Option<Self>> {
        match self {
            Self::Mutable(c) => Ok(c.delete_entity(id).map(Self::Mutable)),
            Self::Immutable(_) => Err(Error::container_immutable("delete entity")),
        }
    }

    /// Writes a property; `None` deletes it.
    ///
    /// # Errors
    ///
    /// Fails on the flattened form, or if the value index is inconsistent.
    pub fn set_property(
        &self,
        id: EntityId,
        name: &str,
        value: Option<Bytes>,
    ) -> Result<Option<Self>> {
        write_mutable!(self, "set property", c => c.set_property(id, name, value))
    }

    /// Writes a blob; `None` deletes it.
    ///
    /// # Errors
    ///
    /// Fails on the flattened form.
    pub fn set_blob(&self, id: EntityId, name: &str, value: Option<Bytes>) -> Result<Option<Self>> {
        match self {
            Self::Mutable(c) => Ok(c.set_blob(id, name, value).map(Self::Mutable)),
            Self::Immutable(_) => Err(Error::container_immutable("set blob")),
        }
    }

    /// Adds a link.
    ///
    /// # Errors
    ///
    /// Fails on the flattened form, or on a target type mismatch.
    pub fn add_link(&self, id: EntityId, name: &str, target: EntityId) -> Result<Option<Self>> {
        write_mutable!(self, "add link", c => c.add_link(id, name, target))
    }

    /// Removes a link.
    ///
    /// # Errors
    ///
    /// Fails on the flattened form, or on a target type mismatch.
    pub fn delete_link(&self, id: EntityId, name: &str, target: EntityId) -> Result<Option<Self>> {
        write_mutable!(self, "delete link", c => c.delete_link(id, name, target))
    }
}
