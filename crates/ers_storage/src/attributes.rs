//! Dense, binary-searchable attribute arrays.
//!
//! An [`AttributesImmutable`] keeps every value of one attribute in a single
//! contiguous buffer plus two parallel arrays: the instance ids in ascending
//! order, and each value's `(offset, len)` packed into one word. Point lookups
//! binary-search the instance ids. Value queries binary-search by value, either
//! over the instance id order directly (when it already sorts the values) or
//! over a value-sorted permutation computed on first use.

// Cursor positions step one below zero before iteration starts
#![allow(clippy::cast_possible_wrap, clippy::cast_sign_loss)]

use std::cmp::Ordering;
use std::fmt;
use std::sync::OnceLock;

use bytes::{Bytes, BytesMut};
use ers_foundation::codec::{pack_offset_len, unpack_offset_len};
use ers_foundation::{Error, ErrorKind, Result};

use crate::api::FindOption;

/// Immutable, densely packed attribute values keyed by instance id.
pub struct AttributesImmutable {
    values: Bytes,
    instance_ids: Vec<u64>,
    offset_and_lens: Vec<u64>,
    /// True if ascending instance ids also give non-decreasing values.
    same_order: bool,
    /// Indices into `instance_ids`, stably sorted by value.
    by_value: OnceLock<Vec<usize>>,
}

impl AttributesImmutable {
    /// Returns an empty attribute array.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            values: Bytes::new(),
            instance_ids: Vec::new(),
            offset_and_lens: Vec::new(),
            same_order: true,
            by_value: OnceLock::new(),
        }
    }

    /// Packs `(instance id, value)` pairs into a dense array.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::UnsortedInstanceIds`] if the ids are not strictly
    /// ascending, or [`ErrorKind::CapacityExceeded`] if the buffer outgrows
    /// 32-bit offsets.
    pub fn from_sorted<I, V>(entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = (u64, V)>,
        V: AsRef<[u8]>,
    {
        let mut buffer = BytesMut::new();
        let mut instance_ids = Vec::new();
        let mut offset_and_lens = Vec::new();

        for (instance_id, value) in entries {
            if let Some(&previous) = instance_ids.last() {
                if previous >= instance_id {
                    return Err(Error::new(ErrorKind::UnsortedInstanceIds {
                        previous,
                        current: instance_id,
                    }));
                }
            }
            let value = value.as_ref();
            let offset = u32::try_from(buffer.len()).map_err(|_| capacity("attribute buffer"))?;
            let len = u32::try_from(value.len()).map_err(|_| capacity("attribute value"))?;
            buffer.extend_from_slice(value);
            instance_ids.push(instance_id);
            offset_and_lens.push(pack_offset_len(offset, len));
        }
        if u32::try_from(buffer.len()).is_err() {
            return Err(capacity("attribute buffer"));
        }

        let mut attributes = Self {
            values: buffer.freeze(),
            instance_ids,
            offset_and_lens,
            same_order: true,
            by_value: OnceLock::new(),
        };
        attributes.same_order = (1..attributes.len())
            .all(|i| attributes.value_at(i - 1) <= attributes.value_at(i));
        Ok(attributes)
    }

    /// Returns the number of stored values.
    #[must_use]
    pub fn len(&self) -> usize {
        self.instance_ids.len()
    }

    /// Returns true if nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.instance_ids.is_empty()
    }

    /// Returns true if instance id order already sorts the values.
    #[must_use]
    pub fn is_same_order(&self) -> bool {
        self.same_order
    }

    /// Gets the value of an instance. The result shares the dense buffer.
    #[must_use]
    pub fn get(&self, instance_id: u64) -> Option<Bytes> {
        let index = self.instance_ids.binary_search(&instance_id).ok()?;
        let (offset, len) = unpack_offset_len(self.offset_and_lens[index]);
        Some(self.values.slice(offset..offset + len))
    }

    /// Returns true if the instance has a value.
    #[must_use]
    pub fn contains(&self, instance_id: u64) -> bool {
        self.instance_ids.binary_search(&instance_id).is_ok()
    }

    /// Iterates over `(instance id, value)` in ascending instance id order.
    pub fn iter(&self) -> impl Iterator<Item = (u64, &[u8])> {
        (0..self.len()).map(|i| (self.instance_ids[i], self.value_at(i)))
    }

    fn value_at(&self, index: usize) -> &[u8] {
        let (offset, len) = unpack_offset_len(self.offset_and_lens[index]);
        &self.values[offset..offset + len]
    }

    /// Maps a position in value order to an index into the parallel arrays.
    fn by_value_index(&self, position: usize) -> usize {
        if self.same_order {
            return position;
        }
        self.by_value.get_or_init(|| {
            let mut order: Vec<usize> = (0..self.len()).collect();
            order.sort_by(|a, b| self.value_at(*a).cmp(self.value_at(*b)));
            order
        })[position]
    }

    /// Positions a cursor at the left or right boundary of the run of values
    /// equal to `value`.
    ///
    /// The search never stops at the first hit: it keeps narrowing past every
    /// match to pin the exact boundary. With no match, the cursor sits at the
    /// insertion point.
    #[must_use]
    pub fn navigate(&self, value: &[u8], left_bound: bool) -> AttributesCursor<'_> {
        let mut low: isize = 0;
        let mut high: isize = self.len() as isize - 1;
        let mut found: isize = -1;
        while low <= high {
            let mid = low + (high - low) / 2;
            let cmp = value.cmp(self.value_at(self.by_value_index(mid as usize)));
            if cmp == Ordering::Equal {
                found = mid;
            }
            if left_bound {
                if cmp == Ordering::Greater {
                    low = mid + 1;
                } else {
                    high = mid - 1;
                }
            } else if cmp == Ordering::Less {
                high = mid - 1;
            } else {
                low = mid + 1;
            }
        }
        AttributesCursor {
            attributes: self,
            position: if found >= 0 { found } else { low },
            has_match: found >= 0,
        }
    }

    /// Returns the instance ids whose values satisfy `option` against `value`.
    ///
    /// `Eq`, `Gt` and `EqOrGt` results ascend by value, `Lt` and `EqOrLt`
    /// results descend. Ties follow the same direction by instance id.
    #[must_use]
    pub fn find(&self, option: FindOption, value: &[u8]) -> Vec<u64> {
        match option {
            FindOption::Eq => {
                let mut cursor = self.navigate(value, true);
                cursor.move_prev();
                cursor.collect_forward(|v| v == value)
            }
            FindOption::Lt => self.navigate(value, true).collect_backward(|v| v < value),
            FindOption::EqOrLt => {
                let mut cursor = self.navigate(value, false);
                if cursor.has_match() {
                    cursor.move_next();
                }
                cursor.collect_backward(|v| v <= value)
            }
            FindOption::Gt => {
                let mut cursor = self.navigate(value, false);
                if !cursor.has_match() {
                    cursor.move_prev();
                }
                cursor.collect_forward(|v| v > value)
            }
            FindOption::EqOrGt => {
                let mut cursor = self.navigate(value, true);
                cursor.move_prev();
                cursor.collect_forward(|v| v >= value)
            }
        }
    }
}

fn capacity(what: &'static str) -> Error {
    Error::new(ErrorKind::CapacityExceeded { what })
}

impl Default for AttributesImmutable {
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Debug for AttributesImmutable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AttributesImmutable")
            .field("len", &self.len())
            .field("bytes", &self.values.len())
            .field("same_order", &self.same_order)
            .finish_non_exhaustive()
    }
}

/// A position in the value order of an [`AttributesImmutable`].
///
/// Moves step one slot at a time and report whether the new position is in
/// bounds, so a cursor can sit one slot before the first or after the last
/// value.
pub struct AttributesCursor<'a> {
    attributes: &'a AttributesImmutable,
    position: isize,
    has_match: bool,
}

impl<'a> AttributesCursor<'a> {
    /// Returns true if navigation found a value equal to the probe.
    #[must_use]
    pub fn has_match(&self) -> bool {
        self.has_match
    }

    /// Moves one slot forward.
    pub fn move_next(&mut self) -> bool {
        self.position += 1;
        self.position < self.attributes.len() as isize
    }

    /// Moves one slot backward.
    pub fn move_prev(&mut self) -> bool {
        self.position -= 1;
        self.position >= 0
    }

    /// Returns the `(instance id, value)` at the cursor, if it is in bounds.
    #[must_use]
    pub fn current(&self) -> Option<(u64, &'a [u8])> {
        if self.position < 0 || self.position >= self.attributes.len() as isize {
            return None;
        }
        let index = self.attributes.by_value_index(self.position as usize);
        Some((
            self.attributes.instance_ids[index],
            self.attributes.value_at(index),
        ))
    }

    fn collect_forward(mut self, predicate: impl Fn(&[u8]) -> bool) -> Vec<u64> {
        let mut result = Vec::new();
        while self.move_next() {
            match self.current() {
                Some((id, v)) if predicate(v) => result.push(id),
                _ => break,
            }
        }
        result
    }

    fn collect_backward(mut self, predicate: impl Fn(&[u8]) -> bool) -> Vec<u64> {
        let mut result = Vec::new();
        while self.move_prev() {
            match self.current() {
                Some((id, v)) if predicate(v) => result.push(id),
                _ => break,
            }
        }
        result
    }
}
