//! Persistent collections with structural sharing.
//!
//! Thin wrappers around the `im` crate's persistent ordered map and set.
//! Cloning any of them is O(1). Edits go through an explicit two-phase scope:
//! [`TransactionalPersistentMap::begin_mutation`] hands out a private
//! [`MapMutation`] that batches edits, and [`MapMutation::freeze`] turns it back
//! into a shareable map. Maps handed out earlier never observe those edits.

use std::borrow::Borrow;
use std::fmt;
use std::iter::FromIterator;
use std::ops::RangeBounds;

use im::{OrdMap, OrdSet};

/// Persistent ordered map with an explicit mutation scope.
pub struct TransactionalPersistentMap<K, V>(OrdMap<K, V>)
where
    K: Ord + Clone,
    V: Clone;

/// Persistent map keyed by 64-bit instance ids.
pub type TransactionalPersistentLongMap<V> = TransactionalPersistentMap<u64, V>;

impl<K: Ord + Clone, V: Clone> TransactionalPersistentMap<K, V> {
    /// Creates an empty map.
    #[must_use]
    pub fn new() -> Self {
        Self(OrdMap::new())
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if the map is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Gets a value by key.
    #[must_use]
    pub fn get<BK>(&self, key: &BK) -> Option<&V>
    where
        BK: Ord + ?Sized,
        K: Borrow<BK>,
    {
        self.0.get(key)
    }

    /// Returns true if the map contains the key.
    #[must_use]
    pub fn contains_key<BK>(&self, key: &BK) -> bool
    where
        BK: Ord + ?Sized,
        K: Borrow<BK>,
    {
        self.0.contains_key(key)
    }

    /// Iterates over entries in ascending key order.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = (&K, &V)> {
        self.0.iter()
    }

    /// Iterates over the entries whose keys fall in `range`, ascending.
    pub fn range<R, BK>(&self, range: R) -> impl DoubleEndedIterator<Item = (&K, &V)>
    where
        R: RangeBounds<BK>,
        K: Borrow<BK>,
        BK: Ord + ?Sized,
    {
        self.0.range(range)
    }

    /// Iterates over keys in ascending order.
    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.0.keys()
    }

    /// Iterates over values in ascending key order.
    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.0.values()
    }

    /// Returns a new map with the entry inserted.
    #[must_use]
    pub fn update(&self, key: K, value: V) -> Self {
        Self(self.0.update(key, value))
    }

    /// Returns a new map without the key.
    #[must_use]
    pub fn without<BK>(&self, key: &BK) -> Self
    where
        BK: Ord + ?Sized,
        K: Borrow<BK>,
    {
        Self(self.0.without(key))
    }

    /// Opens a private mutation scope over a structural copy of this map.
    #[must_use]
    pub fn begin_mutation(&self) -> MapMutation<K, V> {
        MapMutation {
            map: self.0.clone(),
            changed: false,
        }
    }

    /// Runs `f` inside a mutation scope and returns its result together with
    /// the frozen map.
    pub fn write<T>(&self, f: impl FnOnce(&mut MapMutation<K, V>) -> T) -> (T, Self) {
        let mut mutation = self.begin_mutation();
        let result = f(&mut mutation);
        (result, mutation.freeze())
    }

    /// Returns true if both maps share the same root, which implies equality.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        self.0.ptr_eq(&other.0)
    }
}

impl<K: Ord + Clone, V: Clone> Clone for TransactionalPersistentMap<K, V> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<K: Ord + Clone, V: Clone> Default for TransactionalPersistentMap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Ord + Clone + fmt::Debug, V: Clone + fmt::Debug> fmt::Debug
    for TransactionalPersistentMap<K, V>
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<K: Ord + Clone, V: Clone + PartialEq> PartialEq for TransactionalPersistentMap<K, V> {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl<K: Ord + Clone, V: Clone + Eq> Eq for TransactionalPersistentMap<K, V> {}

impl<K: Ord + Clone, V: Clone> FromIterator<(K, V)> for TransactionalPersistentMap<K, V> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(OrdMap::from_iter(iter))
    }
}

/// A batch of edits against a private copy of a [`TransactionalPersistentMap`].
///
/// Nodes shared with the source map are copied on first write, so the source
/// and any other clone of it stay untouched.
pub struct MapMutation<K, V>
where
    K: Ord + Clone,
    V: Clone,
{
    map: OrdMap<K, V>,
    changed: bool,
}

impl<K: Ord + Clone, V: Clone> MapMutation<K, V> {
    /// Gets a value by key.
    #[must_use]
    pub fn get<BK>(&self, key: &BK) -> Option<&V>
    where
        BK: Ord + ?Sized,
        K: Borrow<BK>,
    {
        self.map.get(key)
    }

    /// Returns true if the key is present.
    #[must_use]
    pub fn contains_key<BK>(&self, key: &BK) -> bool
    where
        BK: Ord + ?Sized,
        K: Borrow<BK>,
    {
        self.map.contains_key(key)
    }

    /// Inserts an entry, returning the previous value.
    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        self.changed = true;
        self.map.insert(key, value)
    }

    /// Removes an entry, returning its value.
    pub fn remove<BK>(&mut self, key: &BK) -> Option<V>
    where
        BK: Ord + ?Sized,
        K: Borrow<BK>,
    {
        let removed = self.map.remove(key);
        self.changed |= removed.is_some();
        removed
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Returns true if there are no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Iterates over entries in ascending key order.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = (&K, &V)> {
        self.map.iter()
    }

    /// Returns true if any insert or effective removal happened.
    #[must_use]
    pub fn is_changed(&self) -> bool {
        self.changed
    }

    /// Ends the mutation scope.
    #[must_use]
    pub fn freeze(self) -> TransactionalPersistentMap<K, V> {
        TransactionalPersistentMap(self.map)
    }
}

/// Persistent ordered set of 64-bit instance ids.
///
/// [`PersistentLongSet::inserted`] and [`PersistentLongSet::removed`] return
/// `None` when the set would not change, so callers can keep the old value.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct PersistentLongSet(OrdSet<u64>);

impl PersistentLongSet {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self(OrdSet::new())
    }

    /// Creates a set holding one id.
    #[must_use]
    pub fn unit(value: u64) -> Self {
        Self(OrdSet::unit(value))
    }

    /// Returns the number of ids.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if the set is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns true if the set contains `value`.
    #[must_use]
    pub fn contains(&self, value: u64) -> bool {
        self.0.contains(&value)
    }

    /// Returns a copy with `value` added, or `None` if it was already present.
    #[must_use]
    pub fn inserted(&self, value: u64) -> Option<Self> {
        if self.0.contains(&value) {
            return None;
        }
        Some(Self(self.0.update(value)))
    }

    /// Returns a copy without `value`, or `None` if it was absent.
    #[must_use]
    pub fn removed(&self, value: u64) -> Option<Self> {
        if !self.0.contains(&value) {
            return None;
        }
        Some(Self(self.0.without(&value)))
    }

    /// Iterates over ids in ascending order.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = u64> + '_ {
        self.0.iter().copied()
    }
}

impl fmt::Debug for PersistentLongSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl FromIterator<u64> for PersistentLongSet {
    fn from_iter<I: IntoIterator<Item = u64>>(iter: I) -> Self {
        Self(OrdSet::from_iter(iter))
    }
}
