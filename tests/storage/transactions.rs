//! Integration tests for transactions
//!
//! Tests snapshot isolation, conflicts, retries, commit and abort.

use std::sync::Arc;
use std::thread;

use bytes::Bytes;
use ers_foundation::{EntityId, ErrorKind};
use ers_storage::{
    EntityRelationshipStorage, ErsSettings, RamEntityRelationshipStorage, Transaction,
};

use crate::init_tracing;

// =============================================================================
// Snapshot Isolation
// =============================================================================

#[test]
fn readers_keep_their_snapshot() {
    init_tracing();
    let storage = RamEntityRelationshipStorage::new();
    let id = storage
        .transactional(false, |txn| {
            let user = txn.new_entity("User")?;
            user.set_raw_property("name", "before")?;
            Ok(user.id())
        })
        .unwrap();

    let reader = storage.begin_transaction(true).unwrap();
    storage
        .transactional(false, |txn| {
            txn.set_property(id, "name", Some(Bytes::from_static(b"after")))?;
            txn.new_entity("User").map(|_| ())
        })
        .unwrap();

    assert_eq!(
        reader.get_property(id, "name").unwrap(),
        Some(Bytes::from_static(b"before"))
    );
    assert_eq!(reader.all("User").unwrap().len(), 1);

    let fresh = storage.begin_transaction(true).unwrap();
    assert_eq!(
        fresh.get_property(id, "name").unwrap(),
        Some(Bytes::from_static(b"after"))
    );
    assert_eq!(fresh.all("User").unwrap().len(), 2);
}

#[test]
fn uncommitted_writes_are_private() {
    let storage = RamEntityRelationshipStorage::new();
    let writer = storage.begin_transaction(false).unwrap();
    writer.new_entity("User").unwrap();

    let reader = storage.begin_transaction(true).unwrap();
    assert!(reader.all("User").unwrap().is_empty());
    assert_eq!(writer.all("User").unwrap().len(), 1);
}

// =============================================================================
// Commit And Abort
// =============================================================================

#[test]
fn concurrent_writers_conflict() {
    let storage = RamEntityRelationshipStorage::new();
    let first = storage.begin_transaction(false).unwrap();
    let second = storage.begin_transaction(false).unwrap();
    first.new_entity("User").unwrap();
    second.new_entity("Group").unwrap();

    first.commit().unwrap();
    let err = second.commit().unwrap_err();
    assert!(matches!(err.kind, ErrorKind::ConflictingTransaction));
    assert!(err.is_retryable());
    assert!(second.is_finished());

    let txn = storage.begin_transaction(true).unwrap();
    assert_eq!(txn.type_id("Group").unwrap(), None);
}

#[test]
fn read_only_transactions_never_conflict() {
    let storage = RamEntityRelationshipStorage::new();
    let reader = storage.begin_transaction(true).unwrap();
    storage
        .transactional(false, |txn| txn.new_entity("User").map(|_| ()))
        .unwrap();
    reader.commit().unwrap();
}

#[test]
fn abort_discards_writes() {
    let storage = RamEntityRelationshipStorage::new();
    let before = storage.current();
    let txn = storage.begin_transaction(false).unwrap();
    let user = txn.new_entity("User").unwrap().id();
    txn.abort();

    assert!(txn.is_finished());
    assert!(matches!(
        txn.entity_exists(user).unwrap_err().kind,
        ErrorKind::TransactionFinished
    ));
    assert!(Arc::ptr_eq(&before, &storage.current()));
}

#[test]
fn entity_handles_die_with_their_transaction() {
    let storage = RamEntityRelationshipStorage::new();
    let txn = storage.begin_transaction(false).unwrap();
    let user = txn.new_entity("User").unwrap();
    user.set_raw_property("name", "x").unwrap();
    txn.commit().unwrap();

    let err = user.get_raw_property("name").unwrap_err();
    assert!(matches!(err.kind, ErrorKind::TransactionFinished));
}

#[test]
fn failed_closure_is_not_committed() {
    let storage = RamEntityRelationshipStorage::new();
    let err = storage
        .transactional(false, |txn| {
            txn.new_entity("User")?;
            txn.delete_entity(EntityId::new(0, 5))
        })
        .unwrap_err();
    assert!(matches!(err.kind, ErrorKind::NonExistingEntity(_)));

    let txn = storage.begin_transaction(true).unwrap();
    assert!(txn.all("User").unwrap().is_empty());
}

// =============================================================================
// Concurrency
// =============================================================================

#[test]
fn parallel_transactional_writers_all_land() {
    let storage = RamEntityRelationshipStorage::with_settings(
        ErsSettings::new().with_commit_attempts(1_000),
    );
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let storage = storage.clone();
            thread::spawn(move || {
                for _ in 0..25 {
                    storage
                        .transactional(false, |txn| txn.new_entity("Event").map(|_| ()))
                        .unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let txn = storage.begin_transaction(true).unwrap();
    let events = txn.all("Event").unwrap();
    assert_eq!(events.len(), 100);
    let ids: Vec<u64> = events.iter().map(|id| id.instance_id).collect();
    assert_eq!(ids, (0..100).collect::<Vec<_>>());
}
