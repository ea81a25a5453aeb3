//! Persistent data container.
//!
//! Every collection is a persistent map, so deriving a new container clones
//! a handful of roots and copies only the paths a write touches. Entity
//! counters and blobs written since the last [`RamDataContainerMutable::commit`]
//! are staged in side maps and folded into the main maps on commit.

use std::collections::{BTreeSet, HashMap};

use bytes::Bytes;
use ers_foundation::{EntityId, Result, TransactionalPersistentMap, TypeId};

use crate::api::FindOption;
use crate::blobs::BlobsMutable;
use crate::container::AttributeKey;
use crate::container::immutable::RamDataContainerImmutable;
use crate::entities::Entities;
use crate::links::LinksMutable;
use crate::properties::PropertiesMutable;

/// Writes staged since the last commit.
#[derive(Debug, Clone, Default)]
struct Staged {
    entities: TransactionalPersistentMap<TypeId, Entities>,
    blobs: TransactionalPersistentMap<AttributeKey, BlobsMutable>,
}

/// The persistent form of the database state.
#[derive(Debug, Clone, Default)]
pub struct RamDataContainerMutable {
    /// Next free type id.
    type_id_counter: TypeId,
    types: TransactionalPersistentMap<String, TypeId>,
    instances: TransactionalPersistentMap<TypeId, Entities>,
    properties: TransactionalPersistentMap<AttributeKey, PropertiesMutable>,
    links: TransactionalPersistentMap<AttributeKey, LinksMutable>,
    blobs: TransactionalPersistentMap<AttributeKey, BlobsMutable>,
    /// Present while the container is in the staged (mutable) state.
    staged: Option<Staged>,
}

impl RamDataContainerMutable {
    /// Creates an empty container.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true in the staged state.
    #[must_use]
    pub fn is_mutable(&self) -> bool {
        self.staged.is_some()
    }

    /// Returns a copy in the staged state; a staged container is cloned as is.
    #[must_use]
    pub fn mutate(&self) -> Self {
        let mut next = self.clone();
        next.staged.get_or_insert_with(Staged::default);
        next
    }

    /// Folds staged entity counters and blobs into the main maps and leaves
    /// the staged state.
    #[must_use]
    pub fn commit(&self) -> Self {
        let Some(staged) = &self.staged else {
            return self.clone();
        };
        let ((), instances) = self.instances.write(|instances| {
            for (type_id, entities) in staged.entities.iter() {
                instances.insert(*type_id, entities.clone());
            }
        });
        let ((), blobs) = self.blobs.write(|blobs| {
            for (key, store) in staged.blobs.iter() {
                blobs.insert(key.clone(), store.clone());
            }
        });
        Self {
            type_id_counter: self.type_id_counter,
            types: self.types.clone(),
            instances,
            properties: self.properties.clone(),
            links: self.links.clone(),
            blobs,
            staged: None,
        }
    }

    /// Flattens the committed state into the dense read-only form.
    ///
    /// # Errors
    ///
    /// Returns [`ers_foundation::ErrorKind::CapacityExceeded`] if an attribute
    /// outgrows the dense encoding.
    pub fn to_immutable(&self) -> Result<RamDataContainerImmutable> {
        let committed = self.commit();

        let types: HashMap<String, TypeId> = committed
            .types
            .iter()
            .map(|(name, id)| (name.clone(), *id))
            .collect();

        let slots = committed
            .instances
            .iter()
            .next_back()
            .map_or(0, |(max, _)| *max as usize + 1);
        let mut instances = vec![None; slots];
        for (type_id, entities) in committed.instances.iter() {
            instances[*type_id as usize] = Some(entities.clone());
        }

        let mut properties = HashMap::with_capacity(committed.properties.len());
        for (key, store) in committed.properties.iter() {
            properties.insert(key.clone(), store.to_immutable()?);
        }
        let mut links = HashMap::with_capacity(committed.links.len());
        for (key, store) in committed.links.iter() {
            links.insert(key.clone(), store.to_immutable()?);
        }
        let mut blobs = HashMap::with_capacity(committed.blobs.len());
        for (key, store) in committed.blobs.iter() {
            blobs.insert(key.clone(), store.to_immutable()?);
        }

        Ok(RamDataContainerImmutable::new(
            types, instances, properties, links, blobs,
        ))
    }

    // =========================================================================
    // Reads
    // =========================================================================

    fn entities(&self, type_id: TypeId) -> Option<&Entities> {
        self.staged
            .as_ref()
            .and_then(|staged| staged.entities.get(&type_id))
            .or_else(|| self.instances.get(&type_id))
    }

    fn blob_store(&self, key: &AttributeKey) -> Option<&BlobsMutable> {
        self.staged
            .as_ref()
            .and_then(|staged| staged.blobs.get(key))
            .or_else(|| self.blobs.get(key))
    }

    /// Returns true if the entity was allocated and not deleted.
    #[must_use]
    pub fn entity_exists(&self, id: EntityId) -> bool {
        self.entities(id.type_id)
            .is_some_and(|entities| entities.exists(id.instance_id))
    }

    /// Returns the id of a registered type.
    #[must_use]
    pub fn type_id(&self, type_name: &str) -> Option<TypeId> {
        self.types.get(type_name).copied()
    }

    /// Returns live instance ids of a type, ascending.
    #[must_use]
    pub fn all(&self, type_id: TypeId) -> Vec<u64> {
        self.entities(type_id)
            .map(|entities| entities.iter().collect())
            .unwrap_or_default()
    }

    /// Sorted property names of a type.
    #[must_use]
    pub fn property_names(&self, type_id: TypeId) -> Vec<String> {
        let live = self.properties.iter().filter(|(_, store)| !store.is_empty());
        names_of(type_id, live.map(|(key, _)| key))
    }

    /// Sorted blob names of a type.
    #[must_use]
    pub fn blob_names(&self, type_id: TypeId) -> Vec<String> {
        let staged = self.staged.iter().flat_map(|staged| staged.blobs.keys());
        let live = self
            .blobs
            .keys()
            .chain(staged)
            .filter(|key| self.blob_store(key).is_some_and(|store| !store.is_empty()));
        names_of(type_id, live)
    }

    /// Sorted link names of a type.
    #[must_use]
    pub fn link_names(&self, type_id: TypeId) -> Vec<String> {
        let live = self.links.iter().filter(|(_, store)| !store.is_empty());
        names_of(type_id, live.map(|(key, _)| key))
    }

    /// Reads a property value.
    #[must_use]
    pub fn get_property(&self, id: EntityId, name: &str) -> Option<Bytes> {
        self.properties
            .get(&AttributeKey::new(id.type_id, name))
            .and_then(|store| store.get(id.instance_id))
            .cloned()
    }

    /// Reads a blob.
    #[must_use]
    pub fn get_blob(&self, id: EntityId, name: &str) -> Option<Bytes> {
        self.blob_store(&AttributeKey::new(id.type_id, name))
            .and_then(|store| store.get(id.instance_id))
            .cloned()
    }

    /// Returns the live targets of a link attribute, ascending.
    ///
    /// # Errors
    ///
    /// Never fails for the persistent form.
    pub fn links(&self, id: EntityId, name: &str) -> Result<Vec<EntityId>> {
        let Some(store) = self.links.get(&AttributeKey::new(id.type_id, name)) else {
            return Ok(Vec::new());
        };
        let Some(target_type_id) = store.target_type_id() else {
            return Ok(Vec::new());
        };
        Ok(store
            .targets(id.instance_id)
            .map(|instance_id| EntityId::new(target_type_id, instance_id))
            .filter(|target| self.entity_exists(*target))
            .collect())
    }

    /// Returns live instances whose property satisfies `option`, and the
    /// container carrying a freshly built value index if one was built.
    #[must_use]
    pub fn find(
        &self,
        type_id: TypeId,
        name: &str,
        option: FindOption,
        value: &[u8],
    ) -> (Option<Self>, Vec<u64>) {
        let key = AttributeKey::new(type_id, name);
        let Some(store) = self.properties.get(&key) else {
            return (None, Vec::new());
        };
        let (built, ids) = store.find(option, value);
        let ids = match self.entities(type_id) {
            Some(entities) => ids.into_iter().filter(|id| entities.exists(*id)).collect(),
            None => Vec::new(),
        };
        let next = built.map(|store| Self {
            properties: self.properties.update(key, store),
            ..self.clone()
        });
        (next, ids)
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Returns the id of a type, registering it if needed. The container is
    /// present only if the type was new.
    #[must_use]
    pub fn get_or_allocate_type_id(&self, type_name: &str) -> (Option<Self>, TypeId) {
        if let Some(type_id) = self.type_id(type_name) {
            return (None, type_id);
        }
        let type_id = self.type_id_counter;
        let mut next = self.mutate();
        next.types = next.types.update(type_name.to_string(), type_id);
        next.type_id_counter = type_id + 1;
        (Some(next), type_id)
    }

    /// Allocates a fresh instance id of a type.
    #[must_use]
    pub fn allocate_instance_id(&self, type_id: TypeId) -> (Self, u64) {
        let mut entities = self.entities(type_id).cloned().unwrap_or_default();
        let instance_id = entities.allocate();
        (self.with_entities(type_id, entities), instance_id)
    }

    /// Tombstones an entity. Returns `None` if it did not exist.
    #[must_use]
    pub fn delete_entity(&self, id: EntityId) -> Option<Self> {
        let mut entities = self.entities(id.type_id)?.clone();
        if !entities.delete(id.instance_id) {
            return None;
        }
        Some(self.with_entities(id.type_id, entities))
    }

    fn with_entities(&self, type_id: TypeId, entities: Entities) -> Self {
        let mut next = self.mutate();
        if let Some(staged) = next.staged.as_mut() {
            staged.entities = staged.entities.update(type_id, entities);
        }
        next
    }

    /// Writes a property; `None` deletes it.
    ///
    /// # Errors
    ///
    /// Returns [`ers_foundation::ErrorKind::InconsistentValueIndex`] if the
    /// value index lost track of the deleted value.
    pub fn set_property(
        &self,
        id: EntityId,
        name: &str,
        value: Option<Bytes>,
    ) -> Result<Option<Self>> {
        let key = AttributeKey::new(id.type_id, name);
        let current = self.properties.get(&key);
        let store = match (value, current) {
            (None, None) => None,
            (None, Some(store)) => store.delete_property(id.instance_id)?,
            (Some(value), current) => current
                .cloned()
                .unwrap_or_default()
                .set_property(id.instance_id, value),
        };
        Ok(store.map(|store| {
            let mut next = self.mutate();
            next.properties = next.properties.update(key, store);
            next
        }))
    }

    /// Writes a blob; `None` deletes it. Returns `None` if nothing changed.
    #[must_use]
    pub fn set_blob(&self, id: EntityId, name: &str, value: Option<Bytes>) -> Option<Self> {
        let key = AttributeKey::new(id.type_id, name);
        let current = self.blob_store(&key);
        let store = match (value, current) {
            (None, None) => None,
            (None, Some(store)) => store.delete_blob(id.instance_id),
            (Some(value), current) => current
                .cloned()
                .unwrap_or_default()
                .set_blob(id.instance_id, value),
        }?;
        let mut next = self.mutate();
        if let Some(staged) = next.staged.as_mut() {
            staged.blobs = staged.blobs.update(key, store);
        }
        Some(next)
    }

    /// Adds a link. Returns `None` if it already existed.
    ///
    /// # Errors
    ///
    /// Returns [`ers_foundation::ErrorKind::LinkTargetTypeMismatch`] if the
    /// attribute already targets another type.
    pub fn add_link(&self, id: EntityId, name: &str, target: EntityId) -> Result<Option<Self>> {
        let key = AttributeKey::new(id.type_id, name);
        let store = self
            .links
            .get(&key)
            .cloned()
            .unwrap_or_default()
            .add_link(id.instance_id, target)
            .map_err(|err| with_link_context(err, "add link", id, name))?;
        Ok(store.map(|store| self.with_links(key, store)))
    }

    /// Removes a link. Returns `None` if there was no such link.
    ///
    /// # Errors
    ///
    /// Returns [`ers_foundation::ErrorKind::LinkTargetTypeMismatch`] if the
    /// attribute targets another type.
    pub fn delete_link(&self, id: EntityId, name: &str, target: EntityId) -> Result<Option<Self>> {
        let key = AttributeKey::new(id.type_id, name);
        let Some(store) = self.links.get(&key) else {
            return Ok(None);
        };
        let store = store
            .delete_link(id.instance_id, target)
            .map_err(|err| with_link_context(err, "delete link", id, name))?;
        Ok(store.map(|store| self.with_links(key, store)))
    }

    fn with_links(&self, key: AttributeKey, store: LinksMutable) -> Self {
        let mut next = self.mutate();
        next.links = next.links.update(key, store);
        next
    }

    /// Returns true if both containers share every collection root.
    #[must_use]
    pub fn shares_state_with(&self, other: &Self) -> bool {
        self.type_id_counter == other.type_id_counter
            && self.types.ptr_eq(&other.types)
            && self.instances.ptr_eq(&other.instances)
            && self.properties.ptr_eq(&other.properties)
            && self.links.ptr_eq(&other.links)
            && self.blobs.ptr_eq(&other.blobs)
    }
}

fn with_link_context(
    err: ers_foundation::Error,
    operation: &str,
    id: EntityId,
    name: &str,
) -> ers_foundation::Error {
    err.with_context(
        ers_foundation::ErrorContext::new()
            .with_operation(operation)
            .with_entity(id)
            .with_attribute(name),
    )
}

fn names_of<'a>(type_id: TypeId, keys: impl Iterator<Item = &'a AttributeKey>) -> Vec<String> {
    keys.filter(|key| key.type_id == type_id)
        .map(|key| key.name.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}
