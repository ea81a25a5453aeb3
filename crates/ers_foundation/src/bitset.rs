//! Sparse bit set over 64-bit instance ids.
//!
//! The id space is split into 64-bit buckets kept in a persistent ordered map,
//! so cloning a set is O(1) and a modified copy shares every untouched bucket
//! with the original. Buckets that become zero are removed.

use std::fmt;
use std::sync::OnceLock;

use im::OrdMap;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

const BUCKET_SHIFT: u32 = 6;
const BUCKET_MASK: u64 = (1 << BUCKET_SHIFT) - 1;

/// Persistent set of instance ids, used as a tombstone set.
#[derive(Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SparseBitSet {
    /// Bucket index (`bit >> 6`) -> bucket word. Words are stored inline, so a
    /// full bucket (`u64::MAX`) costs the same as any other and is never interned.
    buckets: OrdMap<u64, u64>,
    /// Number of set bits.
    len: usize,
}

impl Default for SparseBitSet {
    fn default() -> Self {
        Self::empty()
    }
}

impl SparseBitSet {
    /// Returns the shared empty set.
    #[must_use]
    pub fn empty() -> Self {
        static EMPTY: OnceLock<SparseBitSet> = OnceLock::new();
        EMPTY
            .get_or_init(|| Self {
                buckets: OrdMap::new(),
                len: 0,
            })
            .clone()
    }

    /// Sets `bit`. Returns true if the set changed.
    pub fn set(&mut self, bit: u64) -> bool {
        let (index, mask) = split(bit);
        if let Some(word) = self.buckets.get_mut(&index) {
            if *word & mask != 0 {
                return false;
            }
            *word |= mask;
        } else {
            self.buckets.insert(index, mask);
        }
        self.len += 1;
        true
    }

    /// Clears `bit`. Returns true if the set changed.
    pub fn clear(&mut self, bit: u64) -> bool {
        let (index, mask) = split(bit);
        let Some(word) = self.buckets.get(&index).copied() else {
            return false;
        };
        if word & mask == 0 {
            return false;
        }
        let word = word & !mask;
        if word == 0 {
            self.buckets.remove(&index);
        } else {
            self.buckets.insert(index, word);
        }
        self.len -= 1;
        true
    }

    /// Returns true if `bit` is set.
    #[must_use]
    pub fn test(&self, bit: u64) -> bool {
        let (index, mask) = split(bit);
        self.buckets.get(&index).is_some_and(|word| word & mask != 0)
    }

    /// Alias of [`SparseBitSet::test`].
    #[must_use]
    pub fn contains(&self, bit: u64) -> bool {
        self.test(bit)
    }

    /// Returns a copy with `bit` set, sharing structure with `self`.
    #[must_use]
    pub fn with(&self, bit: u64) -> Self {
        let mut result = self.clone();
        result.set(bit);
        result
    }

    /// Returns the number of set bits.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns true if no bit is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the number of non-zero buckets.
    #[must_use]
    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    /// Iterates over set bits in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = u64> + '_ {
        self.buckets
            .iter()
            .flat_map(|(index, word)| BucketBits {
                base: index << BUCKET_SHIFT,
                word: *word,
            })
    }
}

fn split(bit: u64) -> (u64, u64) {
    (bit >> BUCKET_SHIFT, 1 << (bit & BUCKET_MASK))
}

struct BucketBits {
    base: u64,
    word: u64,
}

impl Iterator for BucketBits {
    type Item = u64;

    fn next(&mut self) -> Option<u64> {
        if self.word == 0 {
            return None;
        }
        let offset = u64::from(self.word.trailing_zeros());
        self.word &= self.word - 1;
        Some(self.base + offset)
    }
}

impl FromIterator<u64> for SparseBitSet {
    fn from_iter<I: IntoIterator<Item = u64>>(iter: I) -> Self {
        let mut set = Self::empty();
        for bit in iter {
            set.set(bit);
        }
        set
    }
}

impl fmt::Debug for SparseBitSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}
