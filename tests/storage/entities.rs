//! Integration tests for entity lifecycle
//!
//! Tests entity creation, deletion, tombstone permanence, and id allocation.

use ers_foundation::{Binding, EntityId, ErrorKind};
use ers_storage::{EntityRelationshipStorage, RamEntityRelationshipStorage, Transaction};

use crate::init_tracing;

fn storage_with_users(count: usize) -> RamEntityRelationshipStorage {
    let storage = RamEntityRelationshipStorage::new();
    storage
        .transactional(false, |txn| {
            for _ in 0..count {
                txn.new_entity("User")?;
            }
            Ok(())
        })
        .unwrap();
    storage
}

// =============================================================================
// Creation
// =============================================================================

#[test]
fn instance_ids_are_per_type() {
    init_tracing();
    let storage = RamEntityRelationshipStorage::new();
    let txn = storage.begin_transaction(false).unwrap();
    let u0 = txn.new_entity("User").unwrap().id();
    let g0 = txn.new_entity("Group").unwrap().id();
    let u1 = txn.new_entity("User").unwrap().id();

    assert_eq!(u0.instance_id, 0);
    assert_eq!(u1.instance_id, 1);
    assert_eq!(g0.instance_id, 0);
    assert_ne!(u0.type_id, g0.type_id);
    txn.commit().unwrap();
}

#[test]
fn all_lists_live_entities_ascending() {
    let storage = storage_with_users(5);
    let txn = storage.begin_transaction(false).unwrap();
    txn.delete_entity(EntityId::new(0, 1)).unwrap();
    txn.delete_entity(EntityId::new(0, 3)).unwrap();

    let ids: Vec<u64> = txn.all("User").unwrap().iter().map(|id| id.instance_id).collect();
    assert_eq!(ids, vec![0, 2, 4]);
    assert!(txn.all("Unknown").unwrap().is_empty());
}

// =============================================================================
// Deletion
// =============================================================================

#[test]
fn deleted_ids_are_never_reused() {
    let storage = storage_with_users(3);
    storage
        .transactional(false, |txn| txn.delete_entity(EntityId::new(0, 2)))
        .unwrap();

    let txn = storage.begin_transaction(false).unwrap();
    let fresh = txn.new_entity("User").unwrap();
    assert_eq!(fresh.id(), EntityId::new(0, 3));
    assert!(!txn.entity_exists(EntityId::new(0, 2)).unwrap());
}

#[test]
fn deleting_twice_fails() {
    let storage = storage_with_users(1);
    let txn = storage.begin_transaction(false).unwrap();
    let user = txn.entity(EntityId::new(0, 0)).unwrap().unwrap();
    user.delete().unwrap();

    let err = user.delete().unwrap_err();
    assert!(matches!(err.kind, ErrorKind::NonExistingEntity(_)));
    assert!(!user.exists().unwrap());
}

#[test]
fn deleted_entities_leave_queries() {
    let storage = RamEntityRelationshipStorage::new();
    storage
        .transactional(false, |txn| {
            for age in [30i32, 30, 40] {
                txn.new_entity("User")?.set_property("age", &age)?;
            }
            Ok(())
        })
        .unwrap();

    let txn = storage.begin_transaction(false).unwrap();
    assert_eq!(txn.find_eq("User", "age", &30i32.to_bytes()).unwrap().len(), 2);
    txn.delete_entity(EntityId::new(0, 0)).unwrap();
    let found = txn.find_eq("User", "age", &30i32.to_bytes()).unwrap();
    assert_eq!(found.as_slice(), &[EntityId::new(0, 1)]);
}

#[test]
fn unknown_entity_lookups() {
    let storage = storage_with_users(1);
    let txn = storage.begin_transaction(true).unwrap();
    assert!(txn.entity(EntityId::new(0, 7)).unwrap().is_none());
    assert!(txn.entity(EntityId::new(9, 0)).unwrap().is_none());
    assert_eq!(txn.type_id("User").unwrap(), Some(0));
    assert_eq!(txn.type_id("Group").unwrap(), None);
}
