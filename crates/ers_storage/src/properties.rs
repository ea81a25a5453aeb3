//! Property stores with a lazily built value index.
//!
//! [`PropertiesMutable`] maps instance ids to raw values in a persistent tree.
//! Its value index (value -> instance ids) is not maintained until the first
//! query builds it; from then on every write keeps it in sync. The store is a
//! value: every change returns a new store and leaves the old one intact.
//!
//! [`PropertiesImmutable`] is the flattened, read-only form.

use std::ops::Bound;

use bytes::Bytes;
use ers_foundation::{
    Error, ErrorKind, PersistentLongSet, Result, TransactionalPersistentLongMap,
    TransactionalPersistentMap,
};
use tracing::trace;

use crate::api::FindOption;
use crate::attributes::AttributesImmutable;

type ValueIndex = TransactionalPersistentMap<Bytes, PersistentLongSet>;

/// Persistent property values of one `(type, property name)` attribute.
#[derive(Debug, Clone, Default)]
pub struct PropertiesMutable {
    props: TransactionalPersistentLongMap<Bytes>,
    value_index: Option<ValueIndex>,
}

impl PropertiesMutable {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Gets the value of an instance.
    #[must_use]
    pub fn get(&self, instance_id: u64) -> Option<&Bytes> {
        self.props.get(&instance_id)
    }

    /// Returns the number of instances with a value.
    #[must_use]
    pub fn len(&self) -> usize {
        self.props.len()
    }

    /// Returns true if no instance has a value.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.props.is_empty()
    }

    /// Iterates over `(instance id, value)` ascending by instance id.
    pub fn iter(&self) -> impl Iterator<Item = (u64, &Bytes)> {
        self.props.iter().map(|(id, value)| (*id, value))
    }

    /// Returns true if the value index has been built.
    #[must_use]
    pub fn has_value_index(&self) -> bool {
        self.value_index.is_some()
    }

    /// Sets the value of an instance.
    ///
    /// Returns `None` if the instance already holds an equal value.
    #[must_use]
    pub fn set_property(&self, instance_id: u64, value: Bytes) -> Option<Self> {
        let (old_value, props) = self.props.write(|props| {
            if props.get(&instance_id) == Some(&value) {
                return Err(());
            }
            Ok(props.insert(instance_id, value.clone()))
        });
        let old_value = old_value.ok()?;

        let value_index = self.value_index.as_ref().map(|index| {
            index
                .write(|index| {
                    if let Some(old_value) = &old_value {
                        remove_from_bucket(index, old_value, instance_id);
                    }
                    let bucket = match index.get(&value) {
                        Some(ids) => ids.inserted(instance_id).unwrap_or_else(|| ids.clone()),
                        None => PersistentLongSet::unit(instance_id),
                    };
                    index.insert(value, bucket);
                })
                .1
        });
        Some(Self { props, value_index })
    }

    /// Deletes the value of an instance.
    ///
    /// Returns `None` if the instance had no value.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::InconsistentValueIndex`] if the value index does
    /// not reference the instance under its current value.
    pub fn delete_property(&self, instance_id: u64) -> Result<Option<Self>> {
        let (old_value, props) = self.props.write(|props| props.remove(&instance_id));
        let Some(old_value) = old_value else {
            return Ok(None);
        };

        let value_index = match &self.value_index {
            None => None,
            Some(index) => {
                let (removed, index) =
                    index.write(|index| remove_from_bucket(index, &old_value, instance_id));
                if !removed {
                    return Err(Error::new(ErrorKind::InconsistentValueIndex { instance_id }));
                }
                Some(index)
            }
        };
        Ok(Some(Self { props, value_index }))
    }

    /// Builds the value index if it does not exist yet.
    ///
    /// Returns the store carrying the new index, or `None` if the index was
    /// already there.
    #[must_use]
    pub fn ensure_value_index(&self) -> Option<Self> {
        if self.value_index.is_some() {
            return None;
        }
        let ((), index) = ValueIndex::new().write(|index| {
            for (instance_id, value) in self.props.iter() {
                let bucket = match index.get(value) {
                    Some(ids) => ids.inserted(*instance_id).unwrap_or_else(|| ids.clone()),
                    None => PersistentLongSet::unit(*instance_id),
                };
                index.insert(value.clone(), bucket);
            }
        });
        trace!(
            instances = self.props.len(),
            values = index.len(),
            "built property value index"
        );
        Some(Self {
            props: self.props.clone(),
            value_index: Some(index),
        })
    }

    /// Returns instance ids whose values satisfy `option` against `value`.
    ///
    /// The first element is the store carrying a freshly built value index,
    /// if the query had to build one.
    #[must_use]
    pub fn find(&self, option: FindOption, value: &[u8]) -> (Option<Self>, Vec<u64>) {
        let built = self.ensure_value_index();
        let store = built.as_ref().unwrap_or(self);
        let result = match &store.value_index {
            Some(index) => query_index(index, option, value),
            None => Vec::new(),
        };
        (built, result)
    }

    /// Flattens the store into its dense form.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::CapacityExceeded`] if the values outgrow the dense
    /// buffer.
    pub fn to_immutable(&self) -> Result<PropertiesImmutable> {
        AttributesImmutable::from_sorted(self.iter()).map(PropertiesImmutable::new)
    }
}

/// Removes `instance_id` from the bucket of `value`. Returns false if the
/// bucket did not hold it.
fn remove_from_bucket(
    index: &mut ers_foundation::MapMutation<Bytes, PersistentLongSet>,
    value: &Bytes,
    instance_id: u64,
) -> bool {
    let Some(remaining) = index.get(value).and_then(|ids| ids.removed(instance_id)) else {
        return false;
    };
    if remaining.is_empty() {
        index.remove(value);
    } else {
        index.insert(value.clone(), remaining);
    }
    true
}

fn query_index(index: &ValueIndex, option: FindOption, value: &[u8]) -> Vec<u64> {
    let ascending = |range: (Bound<&[u8]>, Bound<&[u8]>)| -> Vec<u64> {
        index
            .range::<_, [u8]>(range)
            .flat_map(|(_, ids)| ids.iter())
            .collect()
    };
    let descending = |range: (Bound<&[u8]>, Bound<&[u8]>)| -> Vec<u64> {
        index
            .range::<_, [u8]>(range)
            .rev()
            .flat_map(|(_, ids)| ids.iter().rev())
            .collect()
    };
    match option {
        FindOption::Eq => index
            .get(value)
            .map(|ids| ids.iter().collect())
            .unwrap_or_default(),
        FindOption::Lt => descending((Bound::Unbounded, Bound::Excluded(value))),
        FindOption::EqOrLt => descending((Bound::Unbounded, Bound::Included(value))),
        FindOption::Gt => ascending((Bound::Excluded(value), Bound::Unbounded)),
        FindOption::EqOrGt => ascending((Bound::Included(value), Bound::Unbounded)),
    }
}

/// Read-only property values of one attribute in the dense form.
#[derive(Debug, Default)]
pub struct PropertiesImmutable {
    attributes: AttributesImmutable,
}

impl PropertiesImmutable {
    /// Wraps a dense attribute array.
    #[must_use]
    pub fn new(attributes: AttributesImmutable) -> Self {
        Self { attributes }
    }

    /// Gets the value of an instance.
    #[must_use]
    pub fn get(&self, instance_id: u64) -> Option<Bytes> {
        self.attributes.get(instance_id)
    }

    /// Returns the number of instances with a value.
    #[must_use]
    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    /// Returns true if no instance has a value.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    /// Returns instance ids whose values satisfy `option` against `value`.
    #[must_use]
    pub fn find(&self, option: FindOption, value: &[u8]) -> Vec<u64> {
        self.attributes.find(option, value)
    }
}
