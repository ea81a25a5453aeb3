//! Backend-neutral storage, transaction and entity API.
//!
//! Callers program against [`EntityRelationshipStorage`] and [`Transaction`]
//! and pick the concrete backend once, at construction time. Values crossing
//! this boundary are raw byte sequences; [`Binding`] converts domain values.

use std::collections::HashSet;
use std::fmt;

use bytes::Bytes;
use ers_foundation::{Binding, EntityId, Result, TypeId};

// =============================================================================
// Storage Trait
// =============================================================================

/// A store of typed entities with properties, blobs and links.
pub trait EntityRelationshipStorage: Sized {
    /// Transaction type handed out by this storage.
    type Transaction: Transaction;

    /// Opens a transaction over the current snapshot.
    ///
    /// # Errors
    ///
    /// Backend specific; the RAM backend never fails here.
    fn begin_transaction(&self, readonly: bool) -> Result<Self::Transaction>;

    /// Returns a storage serving a read-optimized copy of the current snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot cannot be flattened.
    fn as_readonly(&self) -> Result<Self>;

    /// Runs `f` in a transaction and commits it, retrying on conflicts.
    ///
    /// # Errors
    ///
    /// Returns the first non-retryable error from `f` or commit, or the last
    /// conflict once the retry budget is spent.
    fn transactional<T, F>(&self, readonly: bool, f: F) -> Result<T>
    where
        F: FnMut(&Self::Transaction) -> Result<T>;
}

// =============================================================================
// Transaction Trait
// =============================================================================

/// A snapshot-scoped unit of work.
///
/// Reads observe the snapshot taken when the transaction began plus the
/// transaction's own writes. Every method fails with
/// [`ers_foundation::ErrorKind::TransactionFinished`] after commit or abort.
pub trait Transaction {
    /// Returns true if writes are refused.
    fn is_readonly(&self) -> bool;

    /// Returns true once committed or aborted.
    fn is_finished(&self) -> bool;

    /// Creates an entity of the named type, registering the type if needed.
    ///
    /// # Errors
    ///
    /// Fails on a finished or read-only transaction.
    fn new_entity(&self, type_name: &str) -> Result<Entity<'_, Self>>;

    /// Returns a handle to an existing entity.
    ///
    /// # Errors
    ///
    /// Fails on a finished transaction.
    fn entity(&self, id: EntityId) -> Result<Option<Entity<'_, Self>>>;

    /// Returns true if the entity exists.
    ///
    /// # Errors
    ///
    /// Fails on a finished transaction.
    fn entity_exists(&self, id: EntityId) -> Result<bool>;

    /// Deletes an entity. Its instance id is never reused.
    ///
    /// # Errors
    ///
    /// Fails on a finished or read-only transaction, or if the entity does not exist.
    fn delete_entity(&self, id: EntityId) -> Result<()>;

    /// Returns the id of a registered type.
    ///
    /// # Errors
    ///
    /// Fails on a finished transaction.
    fn type_id(&self, type_name: &str) -> Result<Option<TypeId>>;

    /// Returns every live entity of a type, ascending by instance id.
    ///
    /// # Errors
    ///
    /// Fails on a finished transaction.
    fn all(&self, type_name: &str) -> Result<EntityIterable>;

    /// Returns entities whose property compares to `value` as `option` requires.
    ///
    /// Unknown types and properties yield an empty result.
    ///
    /// # Errors
    ///
    /// Fails on a finished transaction.
    fn find(
        &self,
        type_name: &str,
        property_name: &str,
        option: FindOption,
        value: &[u8],
    ) -> Result<EntityIterable>;

    /// Sorted names of the properties written for a type.
    ///
    /// # Errors
    ///
    /// Fails on a finished transaction.
    fn property_names(&self, type_name: &str) -> Result<Vec<String>>;

    /// Sorted names of the blobs written for a type.
    ///
    /// # Errors
    ///
    /// Fails on a finished transaction.
    fn blob_names(&self, type_name: &str) -> Result<Vec<String>>;

    /// Sorted names of the links written for a type.
    ///
    /// # Errors
    ///
    /// Fails on a finished transaction.
    fn link_names(&self, type_name: &str) -> Result<Vec<String>>;

    /// Replaces the working state with an empty database.
    ///
    /// # Errors
    ///
    /// Fails on a finished or read-only transaction.
    fn drop_all(&self) -> Result<()>;

    /// Publishes the transaction's writes and finishes it.
    ///
    /// # Errors
    ///
    /// Fails with [`ers_foundation::ErrorKind::ConflictingTransaction`] if
    /// another commit was installed since this transaction began.
    fn commit(&self) -> Result<()>;

    /// Discards the transaction's writes and finishes it.
    fn abort(&self);

    /// Reads a raw property value.
    ///
    /// # Errors
    ///
    /// Fails if the entity does not exist.
    fn get_property(&self, id: EntityId, name: &str) -> Result<Option<Bytes>>;

    /// Writes a raw property value; `None` deletes it.
    ///
    /// # Errors
    ///
    /// Fails if the entity does not exist or the transaction is read-only.
    fn set_property(&self, id: EntityId, name: &str, value: Option<Bytes>) -> Result<()>;

    /// Reads a raw blob.
    ///
    /// # Errors
    ///
    /// Fails if the entity does not exist.
    fn get_blob(&self, id: EntityId, name: &str) -> Result<Option<Bytes>>;

    /// Writes a raw blob; `None` deletes it.
    ///
    /// # Errors
    ///
    /// Fails if the entity does not exist or the transaction is read-only.
    fn set_blob(&self, id: EntityId, name: &str, value: Option<Bytes>) -> Result<()>;

    /// Returns live link targets, ascending by instance id.
    ///
    /// # Errors
    ///
    /// Fails if the entity does not exist.
    fn links(&self, id: EntityId, name: &str) -> Result<EntityIterable>;

    /// Adds a link. Returns false if it already existed.
    ///
    /// # Errors
    ///
    /// Fails if either entity does not exist, or if the link attribute
    /// already targets a different type.
    fn add_link(&self, id: EntityId, name: &str, target: EntityId) -> Result<bool>;

    /// Removes a link. Returns false if it did not exist.
    ///
    /// # Errors
    ///
    /// Fails if the owner does not exist, or on a target type mismatch.
    fn delete_link(&self, id: EntityId, name: &str, target: EntityId) -> Result<bool>;

    /// Entities whose property equals `value`.
    ///
    /// # Errors
    ///
    /// See [`Transaction::find`].
    fn find_eq(&self, type_name: &str, property_name: &str, value: &[u8]) -> Result<EntityIterable> {
        self.find(type_name, property_name, FindOption::Eq, value)
    }

    /// Entities whose property is less than `value`, descending by value.
    ///
    /// # Errors
    ///
    /// See [`Transaction::find`].
    fn find_lt(&self, type_name: &str, property_name: &str, value: &[u8]) -> Result<EntityIterable> {
        self.find(type_name, property_name, FindOption::Lt, value)
    }

    /// Entities whose property is at most `value`, descending by value.
    ///
    /// # Errors
    ///
    /// See [`Transaction::find`].
    fn find_eq_or_lt(
        &self,
        type_name: &str,
        property_name: &str,
        value: &[u8],
    ) -> Result<EntityIterable> {
        self.find(type_name, property_name, FindOption::EqOrLt, value)
    }

    /// Entities whose property is greater than `value`, ascending by value.
    ///
    /// # Errors
    ///
    /// See [`Transaction::find`].
    fn find_gt(&self, type_name: &str, property_name: &str, value: &[u8]) -> Result<EntityIterable> {
        self.find(type_name, property_name, FindOption::Gt, value)
    }

    /// Entities whose property is at least `value`, ascending by value.
    ///
    /// # Errors
    ///
    /// See [`Transaction::find`].
    fn find_eq_or_gt(
        &self,
        type_name: &str,
        property_name: &str,
        value: &[u8],
    ) -> Result<EntityIterable> {
        self.find(type_name, property_name, FindOption::EqOrGt, value)
    }
}

// =============================================================================
// Find Option
// =============================================================================

/// Comparison applied by a property query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FindOption {
    /// Equal to the probe.
    Eq,
    /// Less than the probe.
    Lt,
    /// Less than or equal to the probe.
    EqOrLt,
    /// Greater than the probe.
    Gt,
    /// Greater than or equal to the probe.
    EqOrGt,
}

impl FindOption {
    /// Returns true if results come in descending value order.
    #[must_use]
    pub fn is_descending(self) -> bool {
        matches!(self, Self::Lt | Self::EqOrLt)
    }
}

// =============================================================================
// Entity Handle
// =============================================================================

/// An entity bound to the transaction it was obtained from.
pub struct Entity<'t, T: Transaction + ?Sized> {
    txn: &'t T,
    id: EntityId,
}

impl<'t, T: Transaction + ?Sized> Entity<'t, T> {
    /// Binds an entity id to a transaction.
    #[must_use]
    pub fn new(txn: &'t T, id: EntityId) -> Self {
        Self { txn, id }
    }

    /// Returns the entity id.
    #[must_use]
    pub fn id(&self) -> EntityId {
        self.id
    }

    /// Returns the transaction this entity is bound to.
    #[must_use]
    pub fn txn(&self) -> &'t T {
        self.txn
    }

    /// Returns true if the entity still exists in the transaction.
    ///
    /// # Errors
    ///
    /// Fails on a finished transaction.
    pub fn exists(&self) -> Result<bool> {
        self.txn.entity_exists(self.id)
    }

    /// Deletes the entity.
    ///
    /// # Errors
    ///
    /// See [`Transaction::delete_entity`].
    pub fn delete(&self) -> Result<()> {
        self.txn.delete_entity(self.id)
    }

    /// Reads a raw property.
    ///
    /// # Errors
    ///
    /// See [`Transaction::get_property`].
    pub fn get_raw_property(&self, name: &str) -> Result<Option<Bytes>> {
        self.txn.get_property(self.id, name)
    }

    /// Writes a raw property.
    ///
    /// # Errors
    ///
    /// See [`Transaction::set_property`].
    pub fn set_raw_property(&self, name: &str, value: impl Into<Bytes>) -> Result<()> {
        self.txn.set_property(self.id, name, Some(value.into()))
    }

    /// Deletes a property.
    ///
    /// # Errors
    ///
    /// See [`Transaction::set_property`].
    pub fn delete_property(&self, name: &str) -> Result<()> {
        self.txn.set_property(self.id, name, None)
    }

    /// Reads and decodes a property.
    ///
    /// # Errors
    ///
    /// Fails like [`Entity::get_raw_property`], or if the stored bytes do not decode.
    pub fn get_property<V: Binding>(&self, name: &str) -> Result<Option<V>> {
        self.get_raw_property(name)?
            .map(|bytes| V::from_bytes(&bytes))
            .transpose()
    }

    /// Encodes and writes a property.
    ///
    /// # Errors
    ///
    /// See [`Transaction::set_property`].
    pub fn set_property<V: Binding>(&self, name: &str, value: &V) -> Result<()> {
        self.set_raw_property(name, value.to_bytes())
    }

    /// Reads a raw blob.
    ///
    /// # Errors
    ///
    /// See [`Transaction::get_blob`].
    pub fn get_raw_blob(&self, name: &str) -> Result<Option<Bytes>> {
        self.txn.get_blob(self.id, name)
    }

    /// Writes a raw blob.
    ///
    /// # Errors
    ///
    /// See [`Transaction::set_blob`].
    pub fn set_raw_blob(&self, name: &str, value: impl Into<Bytes>) -> Result<()> {
        self.txn.set_blob(self.id, name, Some(value.into()))
    }

    /// Deletes a blob.
    ///
    /// # Errors
    ///
    /// See [`Transaction::set_blob`].
    pub fn delete_blob(&self, name: &str) -> Result<()> {
        self.txn.set_blob(self.id, name, None)
    }

    /// Reads and decodes a blob.
    ///
    /// # Errors
    ///
    /// Fails like [`Entity::get_raw_blob`], or if the stored bytes do not decode.
    pub fn get_blob<V: Binding>(&self, name: &str) -> Result<Option<V>> {
        self.get_raw_blob(name)?
            .map(|bytes| V::from_bytes(&bytes))
            .transpose()
    }

    /// Encodes and writes a blob.
    ///
    /// # Errors
    ///
    /// See [`Transaction::set_blob`].
    pub fn set_blob<V: Binding>(&self, name: &str, value: &V) -> Result<()> {
        self.set_raw_blob(name, value.to_bytes())
    }

    /// Returns live link targets.
    ///
    /// # Errors
    ///
    /// See [`Transaction::links`].
    pub fn links(&self, name: &str) -> Result<EntityIterable> {
        self.txn.links(self.id, name)
    }

    /// Adds a link to `target`.
    ///
    /// # Errors
    ///
    /// See [`Transaction::add_link`].
    pub fn add_link(&self, name: &str, target: EntityId) -> Result<bool> {
        self.txn.add_link(self.id, name, target)
    }

    /// Removes a link to `target`.
    ///
    /// # Errors
    ///
    /// See [`Transaction::delete_link`].
    pub fn delete_link(&self, name: &str, target: EntityId) -> Result<bool> {
        self.txn.delete_link(self.id, name, target)
    }
}

impl<T: Transaction + ?Sized> Clone for Entity<'_, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T: Transaction + ?Sized> Copy for Entity<'_, T> {}

impl<T: Transaction + ?Sized> PartialEq for Entity<'_, T> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<T: Transaction + ?Sized> Eq for Entity<'_, T> {}

impl<T: Transaction + ?Sized> fmt::Debug for Entity<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Entity({})", self.id)
    }
}

// =============================================================================
// Entity Iterable
// =============================================================================

/// An ordered, materialized sequence of entity ids returned by queries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntityIterable {
    ids: Vec<EntityId>,
}

impl EntityIterable {
    /// Returns an empty sequence.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Wraps ids of one type, keeping their order.
    #[must_use]
    pub fn from_instances(type_id: TypeId, instance_ids: impl IntoIterator<Item = u64>) -> Self {
        instance_ids
            .into_iter()
            .map(|instance_id| EntityId::new(type_id, instance_id))
            .collect()
    }

    /// Returns the number of entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Returns true if there are no entities.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Returns true if the sequence contains `id`.
    #[must_use]
    pub fn contains(&self, id: EntityId) -> bool {
        self.ids.contains(&id)
    }

    /// Iterates over the ids in order.
    pub fn iter(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.ids.iter().copied()
    }

    /// Returns the ids as a slice.
    #[must_use]
    pub fn as_slice(&self) -> &[EntityId] {
        &self.ids
    }

    /// Iterates over entity handles bound to `txn`.
    pub fn entities<'a, 't, T: Transaction + ?Sized>(
        &'a self,
        txn: &'t T,
    ) -> impl Iterator<Item = Entity<'t, T>> + 'a
    where
        't: 'a,
    {
        self.ids.iter().map(move |id| Entity::new(txn, *id))
    }

    /// This sequence followed by the ids of `other` not already present.
    #[must_use]
    pub fn union(&self, other: &Self) -> Self {
        let mut seen: HashSet<EntityId> = self.ids.iter().copied().collect();
        let mut ids = self.ids.clone();
        ids.extend(other.iter().filter(|id| seen.insert(*id)));
        Self { ids }
    }

    /// The ids of this sequence also present in `other`.
    #[must_use]
    pub fn intersect(&self, other: &Self) -> Self {
        let keep: HashSet<EntityId> = other.iter().collect();
        self.iter().filter(|id| keep.contains(id)).collect()
    }

    /// The ids of this sequence absent from `other`.
    #[must_use]
    pub fn minus(&self, other: &Self) -> Self {
        let drop: HashSet<EntityId> = other.iter().collect();
        self.iter().filter(|id| !drop.contains(id)).collect()
    }
}

impl FromIterator<EntityId> for EntityIterable {
    fn from_iter<I: IntoIterator<Item = EntityId>>(iter: I) -> Self {
        Self {
            ids: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for EntityIterable {
    type Item = EntityId;
    type IntoIter = std::vec::IntoIter<EntityId>;

    fn into_iter(self) -> Self::IntoIter {
        self.ids.into_iter()
    }
}

impl<'a> IntoIterator for &'a EntityIterable {
    type Item = EntityId;
    type IntoIter = std::iter::Copied<std::slice::Iter<'a, EntityId>>;

    fn into_iter(self) -> Self::IntoIter {
        self.ids.iter().copied()
    }
}
