//! Integration tests for persistent collections

use ers_foundation::{PersistentLongSet, SparseBitSet, TransactionalPersistentLongMap};

// =============================================================================
// TransactionalPersistentMap
// =============================================================================

#[test]
fn map_versions_are_independent() {
    let v1: TransactionalPersistentLongMap<&str> = [(1, "one"), (2, "two")].into_iter().collect();
    let v2 = v1.update(3, "three");
    let v3 = v2.without(&1u64);

    assert_eq!(v1.len(), 2);
    assert_eq!(v2.len(), 3);
    assert_eq!(v3.len(), 2);
    assert_eq!(v1.get(&1u64), Some(&"one"));
    assert_eq!(v3.get(&1u64), None);
}

#[test]
fn mutation_scope_batches_writes() {
    let base: TransactionalPersistentLongMap<u64> = (0..10).map(|i| (i, i * i)).collect();
    let (removed, next) = base.write(|m| {
        m.insert(100, 1);
        m.remove(&3u64)
    });

    assert_eq!(removed, Some(9));
    assert_eq!(next.len(), 10);
    assert!(next.contains_key(&100u64));
    assert!(!next.contains_key(&3u64));
    assert!(base.contains_key(&3u64));
}

#[test]
fn untouched_mutation_reports_no_change() {
    let base: TransactionalPersistentLongMap<u64> = (0..4).map(|i| (i, i)).collect();
    let mutation = base.begin_mutation();
    assert!(!mutation.is_changed());
    assert_eq!(mutation.freeze(), base);
}

#[test]
fn ranges_iterate_both_ways() {
    let map: TransactionalPersistentLongMap<u64> = (0..10).map(|i| (i, i)).collect();
    let up: Vec<u64> = map.range(3u64..6).map(|(k, _)| *k).collect();
    let down: Vec<u64> = map.range(..=3u64).rev().map(|(k, _)| *k).collect();
    assert_eq!(up, vec![3, 4, 5]);
    assert_eq!(down, vec![3, 2, 1, 0]);
}

// =============================================================================
// PersistentLongSet
// =============================================================================

#[test]
fn long_set_signals_noops() {
    let set = PersistentLongSet::unit(5);
    assert!(set.inserted(5).is_none());
    assert!(set.removed(6).is_none());

    let set = set.inserted(1).unwrap();
    assert_eq!(set.iter().collect::<Vec<_>>(), vec![1, 5]);
    assert!(set.removed(1).unwrap().contains(5));
}

// =============================================================================
// SparseBitSet
// =============================================================================

#[test]
fn bitset_spans_distant_buckets() {
    let bits: SparseBitSet = [3, 64, 1 << 33, u64::MAX].into_iter().collect();
    assert_eq!(bits.len(), 4);
    assert_eq!(bits.bucket_count(), 4);
    assert_eq!(bits.iter().collect::<Vec<_>>(), vec![3, 64, 1 << 33, u64::MAX]);
}

#[test]
fn bitset_copies_are_independent() {
    let original: SparseBitSet = [1, 2].into_iter().collect();
    let mut copy = original.clone();
    assert!(copy.clear(1));
    assert!(copy.set(200));

    assert!(original.test(1));
    assert!(!original.test(200));
    assert!(!copy.test(1));
    assert_eq!(original.with(7).len(), 3);
}

#[test]
fn empty_bitsets_are_equal() {
    let mut bits = SparseBitSet::empty();
    bits.set(9);
    bits.clear(9);
    assert_eq!(bits, SparseBitSet::default());
    assert_eq!(bits.bucket_count(), 0);
}
