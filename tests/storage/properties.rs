//! Integration tests for properties and property queries
//!
//! Tests typed access, equality and range queries, ordering of results, and
//! lazily built value indexes.

use std::sync::Arc;

use ers_foundation::{Binding, EntityId, ErrorKind};
use ers_storage::{
    EntityIterable, EntityRelationshipStorage, FindOption, RamEntityRelationshipStorage,
    Transaction,
};
use proptest::prelude::*;

use crate::init_tracing;

fn instance_ids(found: &EntityIterable) -> Vec<u64> {
    found.iter().map(|id| id.instance_id).collect()
}

/// `Service` entities 0..count with `port` = instance id.
fn services(count: i32) -> RamEntityRelationshipStorage {
    let storage = RamEntityRelationshipStorage::new();
    storage
        .transactional(false, |txn| {
            for port in 0..count {
                txn.new_entity("Service")?.set_property("port", &port)?;
            }
            Ok(())
        })
        .unwrap();
    storage
}

// =============================================================================
// Typed Access
// =============================================================================

#[test]
fn typed_properties() {
    init_tracing();
    let storage = RamEntityRelationshipStorage::new();
    let txn = storage.begin_transaction(false).unwrap();
    let user = txn.new_entity("User").unwrap();
    user.set_property("login", &"alice".to_string()).unwrap();
    user.set_property("age", &31i32).unwrap();
    user.set_property("admin", &true).unwrap();

    assert_eq!(user.get_property::<String>("login").unwrap().as_deref(), Some("alice"));
    assert_eq!(user.get_property::<i32>("age").unwrap(), Some(31));
    assert_eq!(user.get_property::<bool>("admin").unwrap(), Some(true));
    assert_eq!(user.get_property::<i32>("missing").unwrap(), None);

    let err = user.get_property::<i32>("login").unwrap_err();
    assert!(matches!(err.kind, ErrorKind::MalformedValue { .. }));
}

#[test]
fn deleted_property_disappears_from_queries() {
    let storage = services(3);
    let txn = storage.begin_transaction(false).unwrap();
    let service = txn.entity(EntityId::new(0, 1)).unwrap().unwrap();
    assert_eq!(txn.find_eq("Service", "port", &1i32.to_bytes()).unwrap().len(), 1);

    service.delete_property("port").unwrap();
    assert_eq!(service.get_raw_property("port").unwrap(), None);
    assert!(txn.find_eq("Service", "port", &1i32.to_bytes()).unwrap().is_empty());
    assert_eq!(txn.property_names("Service").unwrap(), vec!["port"]);
}

#[test]
fn property_name_is_dropped_with_its_last_value() {
    let storage = services(2);
    storage
        .transactional(false, |txn| {
            for service in &txn.all("Service")? {
                txn.set_property(service, "port", None)?;
            }
            Ok(())
        })
        .unwrap();

    let txn = storage.begin_transaction(true).unwrap();
    assert!(txn.property_names("Service").unwrap().is_empty());
    let readonly = storage.as_readonly().unwrap();
    let txn = readonly.begin_transaction(true).unwrap();
    assert!(txn.property_names("Service").unwrap().is_empty());
}

#[test]
fn unchanged_write_keeps_the_snapshot() {
    let storage = services(2);
    let before = storage.current();
    storage
        .transactional(false, |txn| {
            let service = txn.entity(EntityId::new(0, 0))?.expect("service exists");
            service.set_property("port", &0i32)?;
            service.delete_property("missing")
        })
        .unwrap();
    assert!(Arc::ptr_eq(&before, &storage.current()));
}

// =============================================================================
// Queries
// =============================================================================

#[test]
fn equality_over_duplicate_values() {
    let storage = RamEntityRelationshipStorage::new();
    storage
        .transactional(false, |txn| {
            for value in [1u8, 2, 1] {
                txn.new_entity("T")?.set_raw_property("p", vec![value])?;
            }
            Ok(())
        })
        .unwrap();

    let txn = storage.begin_transaction(true).unwrap();
    assert_eq!(instance_ids(&txn.find_eq("T", "p", &[1]).unwrap()), vec![0, 2]);
    assert_eq!(instance_ids(&txn.find_eq("T", "p", &[2]).unwrap()), vec![1]);
    assert!(txn.find_eq("T", "p", &[3]).unwrap().is_empty());
    assert!(txn.find_eq("T", "q", &[1]).unwrap().is_empty());
    assert!(txn.find_eq("U", "p", &[1]).unwrap().is_empty());
}

#[test]
fn less_than_is_descending_by_value() {
    let storage = services(100);
    let txn = storage.begin_transaction(true).unwrap();
    let found = txn.find_lt("Service", "port", &50i32.to_bytes()).unwrap();
    assert_eq!(instance_ids(&found), (0..50).rev().collect::<Vec<_>>());

    let found = txn.find_eq_or_lt("Service", "port", &50i32.to_bytes()).unwrap();
    assert_eq!(found.len(), 51);
    assert_eq!(found.iter().next(), Some(EntityId::new(0, 50)));
}

#[test]
fn greater_than_is_ascending_by_value() {
    let storage = services(100);
    let txn = storage.begin_transaction(true).unwrap();
    let found = txn.find_gt("Service", "port", &95i32.to_bytes()).unwrap();
    assert_eq!(instance_ids(&found), vec![96, 97, 98, 99]);

    let found = txn.find_eq_or_gt("Service", "port", &95i32.to_bytes()).unwrap();
    assert_eq!(instance_ids(&found), vec![95, 96, 97, 98, 99]);
    assert!(txn.find_gt("Service", "port", &99i32.to_bytes()).unwrap().is_empty());
}

#[test]
fn negative_values_order_before_positive() {
    let storage = RamEntityRelationshipStorage::new();
    storage
        .transactional(false, |txn| {
            for value in [5i64, -3, 0, -100] {
                txn.new_entity("Reading")?.set_property("delta", &value)?;
            }
            Ok(())
        })
        .unwrap();

    let txn = storage.begin_transaction(true).unwrap();
    let found = txn.find_lt("Reading", "delta", &0i64.to_bytes()).unwrap();
    assert_eq!(instance_ids(&found), vec![1, 3]);
    let found = txn.find_eq_or_gt("Reading", "delta", &(-3i64).to_bytes()).unwrap();
    assert_eq!(instance_ids(&found), vec![1, 2, 0]);
}

#[test]
fn string_prefixes_compare_shorter_first() {
    let storage = RamEntityRelationshipStorage::new();
    storage
        .transactional(false, |txn| {
            for name in ["ab", "a", "abc", "b"] {
                txn.new_entity("Word")?.set_property("text", &name.to_string())?;
            }
            Ok(())
        })
        .unwrap();

    let txn = storage.begin_transaction(true).unwrap();
    let found = txn.find_gt("Word", "text", b"a").unwrap();
    assert_eq!(instance_ids(&found), vec![0, 2, 3]);
    let found = txn.find_lt("Word", "text", b"abc").unwrap();
    assert_eq!(instance_ids(&found), vec![0, 1]);
}

// =============================================================================
// Value Index
// =============================================================================

#[test]
fn writes_after_a_query_keep_the_index_in_sync() {
    let storage = services(10);
    let txn = storage.begin_transaction(false).unwrap();
    assert_eq!(txn.find_eq("Service", "port", &3i32.to_bytes()).unwrap().len(), 1);

    let service = txn.entity(EntityId::new(0, 3)).unwrap().unwrap();
    service.set_property("port", &7i32).unwrap();

    assert!(txn.find_eq("Service", "port", &3i32.to_bytes()).unwrap().is_empty());
    let found = txn.find_eq("Service", "port", &7i32.to_bytes()).unwrap();
    assert_eq!(instance_ids(&found), vec![3, 7]);
    txn.commit().unwrap();

    let txn = storage.begin_transaction(true).unwrap();
    let found = txn.find_eq("Service", "port", &7i32.to_bytes()).unwrap();
    assert_eq!(instance_ids(&found), vec![3, 7]);
}

fn option() -> impl Strategy<Value = FindOption> {
    prop_oneof![
        Just(FindOption::Eq),
        Just(FindOption::Lt),
        Just(FindOption::EqOrLt),
        Just(FindOption::Gt),
        Just(FindOption::EqOrGt),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn queries_ignore_when_the_index_was_built(
        writes in prop::collection::vec((0u64..12, prop::option::of(0u8..6)), 1..40),
        split in 0usize..40,
        option in option(),
        probe in 0u8..6,
    ) {
        let storage = RamEntityRelationshipStorage::new();
        let eager = storage.begin_transaction(false).unwrap();
        let lazy = RamEntityRelationshipStorage::new();
        let lazy = lazy.begin_transaction(false).unwrap();
        for txn in [&eager, &lazy] {
            for _ in 0..12 {
                txn.new_entity("T").unwrap();
            }
        }

        let split = split.min(writes.len());
        for (i, (instance_id, value)) in writes.iter().enumerate() {
            if i == split {
                eager.find("T", "p", FindOption::Eq, &[0]).unwrap();
            }
            let id = EntityId::new(0, *instance_id);
            for txn in [&eager, &lazy] {
                txn.set_property(id, "p", value.map(|v| vec![v].into())).unwrap();
            }
        }

        prop_assert_eq!(
            eager.find("T", "p", option, &[probe]).unwrap(),
            lazy.find("T", "p", option, &[probe]).unwrap()
        );
    }
}
