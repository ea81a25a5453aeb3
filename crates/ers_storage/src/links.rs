//! Link stores.
//!
//! A link attribute maps an owner instance to a set of target instances. All
//! targets of one attribute share a single entity type, recorded on the first
//! link; a link to any other type is a configuration error.
//!
//! The dense form stores each owner's targets as one run of link varints and
//! decodes them lazily. Deleted targets are filtered by the reader, since the
//! store itself never learns about entity deletion.

use bytes::Bytes;
use ers_foundation::codec::{read_compressed_unsigned, write_compressed_unsigned};
use ers_foundation::{
    EntityId, Error, PersistentLongSet, Result, TransactionalPersistentLongMap, TypeId,
};

use crate::attributes::AttributesImmutable;

/// Persistent links of one `(owner type, link name)` attribute.
#[derive(Debug, Clone, Default)]
pub struct LinksMutable {
    target_type_id: Option<TypeId>,
    links: TransactionalPersistentLongMap<PersistentLongSet>,
}

impl LinksMutable {
    /// Creates an empty store with no target type recorded.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the target type, once a link has been added.
    #[must_use]
    pub fn target_type_id(&self) -> Option<TypeId> {
        self.target_type_id
    }

    /// Returns the number of owners with at least one link.
    #[must_use]
    pub fn len(&self) -> usize {
        self.links.len()
    }

    /// Returns true if no owner has links.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    /// Iterates over the target instance ids of an owner, ascending.
    pub fn targets(&self, instance_id: u64) -> impl Iterator<Item = u64> + '_ {
        self.links
            .get(&instance_id)
            .into_iter()
            .flat_map(|ids| ids.iter())
    }

    /// Adds a link from `instance_id` to `target`.
    ///
    /// Returns `None` if the link already existed.
    ///
    /// # Errors
    ///
    /// Returns [`ers_foundation::ErrorKind::LinkTargetTypeMismatch`] if the
    /// attribute already targets another type.
    pub fn add_link(&self, instance_id: u64, target: EntityId) -> Result<Option<Self>> {
        let target_type_id = self.check_target_type(target)?;
        let ids = match self.links.get(&instance_id) {
            Some(ids) => match ids.inserted(target.instance_id) {
                Some(ids) => ids,
                None => return Ok(None),
            },
            None => PersistentLongSet::unit(target.instance_id),
        };
        Ok(Some(Self {
            target_type_id: Some(target_type_id),
            links: self.links.update(instance_id, ids),
        }))
    }

    /// Removes the link from `instance_id` to `target`.
    ///
    /// Returns `None` if there was no such link.
    ///
    /// # Errors
    ///
    /// Returns [`ers_foundation::ErrorKind::LinkTargetTypeMismatch`] if the
    /// attribute targets another type.
    pub fn delete_link(&self, instance_id: u64, target: EntityId) -> Result<Option<Self>> {
        self.check_target_type(target)?;
        let Some(ids) = self
            .links
            .get(&instance_id)
            .and_then(|ids| ids.removed(target.instance_id))
        else {
            return Ok(None);
        };
        let links = if ids.is_empty() {
            self.links.without(&instance_id)
        } else {
            self.links.update(instance_id, ids)
        };
        Ok(Some(Self {
            target_type_id: self.target_type_id,
            links,
        }))
    }

    fn check_target_type(&self, target: EntityId) -> Result<TypeId> {
        match self.target_type_id {
            Some(expected) if expected != target.type_id => Err(Error::link_target_type_mismatch(
                expected,
                target.type_id,
            )),
            _ => Ok(target.type_id),
        }
    }

    /// Flattens the store: each owner's targets become one varint run.
    ///
    /// # Errors
    ///
    /// Returns [`ers_foundation::ErrorKind::CapacityExceeded`] if the encoded
    /// links outgrow the dense buffer.
    pub fn to_immutable(&self) -> Result<LinksImmutable> {
        let encoded = self.links.iter().map(|(owner, ids)| {
            let mut run = Vec::with_capacity(ids.len());
            for id in ids.iter() {
                write_compressed_unsigned(id, &mut run);
            }
            (*owner, run)
        });
        Ok(LinksImmutable {
            target_type_id: self.target_type_id,
            attributes: AttributesImmutable::from_sorted(encoded)?,
        })
    }
}

/// Read-only links of one attribute in the dense form.
#[derive(Debug, Default)]
pub struct LinksImmutable {
    target_type_id: Option<TypeId>,
    attributes: AttributesImmutable,
}

impl LinksImmutable {
    /// Returns the target type, if any link was ever recorded.
    #[must_use]
    pub fn target_type_id(&self) -> Option<TypeId> {
        self.target_type_id
    }

    /// Returns the number of owners with links.
    #[must_use]
    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    /// Returns true if no owner has links.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    /// Lazily decodes the target instance ids of an owner, ascending.
    #[must_use]
    pub fn targets(&self, instance_id: u64) -> LinkTargets {
        LinkTargets {
            run: self.attributes.get(instance_id).unwrap_or_default(),
            offset: 0,
        }
    }
}

/// Decoder over one owner's varint-encoded link targets.
#[derive(Debug, Clone)]
pub struct LinkTargets {
    run: Bytes,
    offset: usize,
}

impl Iterator for LinkTargets {
    type Item = Result<u64>;

    fn next(&mut self) -> Option<Result<u64>> {
        if self.offset >= self.run.len() {
            return None;
        }
        match read_compressed_unsigned(&self.run[self.offset..]) {
            Ok((id, len)) => {
                self.offset += len;
                Some(Ok(id))
            }
            Err(err) => {
                self.offset = self.run.len();
                Some(Err(err))
            }
        }
    }
}
