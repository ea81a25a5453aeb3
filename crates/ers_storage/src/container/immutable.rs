//! Flattened, read-only data container.

use std::collections::HashMap;

use bytes::Bytes;
use ers_foundation::{EntityId, Result, TypeId};

use crate::api::FindOption;
use crate::blobs::BlobsImmutable;
use crate::container::AttributeKey;
use crate::entities::Entities;
use crate::links::LinksImmutable;
use crate::properties::PropertiesImmutable;

/// The dense form of the database state. Built once by flattening a
/// [`crate::RamDataContainerMutable`]; every write is refused by the
/// enclosing [`crate::DataContainer`].
#[derive(Debug, Default)]
pub struct RamDataContainerImmutable {
    types: HashMap<String, TypeId>,
    /// Indexed by type id.
    instances: Vec<Option<Entities>>,
    properties: HashMap<AttributeKey, PropertiesImmutable>,
    links: HashMap<AttributeKey, LinksImmutable>,
    blobs: HashMap<AttributeKey, BlobsImmutable>,
}

impl RamDataContainerImmutable {
    /// Assembles a container from flattened parts.
    #[must_use]
    pub fn new(
        types: HashMap<String, TypeId>,
        instances: Vec<Option<Entities>>,
        properties: HashMap<AttributeKey, PropertiesImmutable>,
        links: HashMap<AttributeKey, LinksImmutable>,
        blobs: HashMap<AttributeKey, BlobsImmutable>,
    ) -> Self {
        Self {
            types,
            instances,
            properties,
            links,
            blobs,
        }
    }

    fn entities(&self, type_id: TypeId) -> Option<&Entities> {
        self.instances.get(type_id as usize).and_then(Option::as_ref)
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
        names_of(type_id, live(&self.properties, PropertiesImmutable::is_empty))
    }

    /// Sorted blob names of a type.
    #[must_use]
    pub fn blob_names(&self, type_id: TypeId) -> Vec<String> {
        names_of(type_id, live(&self.blobs, BlobsImmutable::is_empty))
    }

    /// Sorted link names of a type.
    #[must_use]
    pub fn link_names(&self, type_id: TypeId) -> Vec<String> {
        names_of(type_id, live(&self.links, LinksImmutable::is_empty))
    }

    /// Reads a property value.
    #[must_use]
    pub fn get_property(&self, id: EntityId, name: &str) -> Option<Bytes> {
        self.properties
            .get(&AttributeKey::new(id.type_id, name))
            .and_then(|store| store.get(id.instance_id))
    }

    /// Reads a blob.
    #[must_use]
    pub fn get_blob(&self, id: EntityId, name: &str) -> Option<Bytes> {
        self.blobs
            .get(&AttributeKey::new(id.type_id, name))
            .and_then(|store| store.get(id.instance_id))
    }

    /// Returns the live targets of a link attribute, ascending.
    ///
    /// # Errors
    ///
    /// Returns [`ers_foundation::ErrorKind::MalformedValue`] if a link run
    /// cannot be decoded.
    pub fn links(&self, id: EntityId, name: &str) -> Result<Vec<EntityId>> {
        let Some(store) = self.links.get(&AttributeKey::new(id.type_id, name)) else {
            return Ok(Vec::new());
        };
        let Some(target_type_id) = store.target_type_id() else {
            return Ok(Vec::new());
        };
        let mut targets = Vec::new();
        for instance_id in store.targets(id.instance_id) {
            let target = EntityId::new(target_type_id, instance_id?);
            if self.entity_exists(target) {
                targets.push(target);
            }
        }
        Ok(targets)
    }

    /// Returns live instances whose property satisfies `option`.
    #[must_use]
    pub fn find(&self, type_id: TypeId, name: &str, option: FindOption, value: &[u8]) -> Vec<u64> {
        let Some(store) = self.properties.get(&AttributeKey::new(type_id, name)) else {
            return Vec::new();
        };
        let Some(entities) = self.entities(type_id) else {
            return Vec::new();
        };
        store
            .find(option, value)
            .into_iter()
            .filter(|id| entities.exists(*id))
            .collect()
    }
}

fn live<'a, S>(
    stores: &'a HashMap<AttributeKey, S>,
    is_empty: impl Fn(&S) -> bool + 'a,
) -> impl Iterator<Item = &'a AttributeKey> {
    stores
        .iter()
        .filter(move |(_, store)| !is_empty(store))
        .map(|(key, _)| key)
}

fn names_of<'a>(type_id: TypeId, keys: impl Iterator<Item = &'a AttributeKey>) -> Vec<String> {
    let mut names: Vec<String> = keys
        .filter(|key| key.type_id == type_id)
        .map(|key| key.name.clone())
        .collect();
    names.sort_unstable();
    names
}
