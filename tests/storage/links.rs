//! Integration tests for links
//!
//! Tests adding and deleting links, target type checks, and visibility of
//! link targets across deletions and snapshots.

use ers_foundation::{EntityId, ErrorKind};
use ers_storage::{EntityRelationshipStorage, RamEntityRelationshipStorage, Transaction};

use crate::init_tracing;

/// A method `m` calling functions `f0`, `f1`, `f2`.
fn call_graph() -> (RamEntityRelationshipStorage, EntityId, Vec<EntityId>) {
    init_tracing();
    let storage = RamEntityRelationshipStorage::new();
    let (method, functions) = storage
        .transactional(false, |txn| {
            let method = txn.new_entity("Method")?;
            let mut functions = Vec::new();
            for _ in 0..3 {
                let function = txn.new_entity("Function")?;
                method.add_link("calls", function.id())?;
                functions.push(function.id());
            }
            Ok((method.id(), functions))
        })
        .unwrap();
    (storage, method, functions)
}

#[test]
fn links_are_listed_by_target_instance() {
    let (storage, method, functions) = call_graph();
    let txn = storage.begin_transaction(true).unwrap();
    let calls = txn.links(method, "calls").unwrap();
    assert_eq!(calls.as_slice(), functions.as_slice());
    assert!(txn.links(method, "overrides").unwrap().is_empty());
    assert_eq!(txn.link_names("Method").unwrap(), vec!["calls"]);
}

#[test]
fn many_links_on_one_owner() {
    let storage = RamEntityRelationshipStorage::new();
    let txn = storage.begin_transaction(false).unwrap();
    let user = txn.new_entity("User").unwrap();
    for _ in 0..200 {
        let profile = txn.new_entity("UserProfile").unwrap();
        assert!(user.add_link("userProfile", profile.id()).unwrap());
    }
    let profile = txn.new_entity("UserProfile").unwrap();
    assert!(user.add_link("userProfile", profile.id()).unwrap());
    for _ in 0..200 {
        let other = txn.new_entity("UserProfile").unwrap();
        user.add_link("userProfile", other.id()).unwrap();
    }

    let profiles = user.links("userProfile").unwrap();
    assert_eq!(profiles.len(), 401);
    assert!(profiles.contains(profile.id()));
    assert!(!user.add_link("userProfile", profile.id()).unwrap());

    assert!(user.delete_link("userProfile", profile.id()).unwrap());
    assert!(!user.links("userProfile").unwrap().contains(profile.id()));
    assert!(!user.delete_link("userProfile", profile.id()).unwrap());
}

#[test]
fn deleted_targets_vanish_from_links() {
    let (storage, method, functions) = call_graph();
    let reader = storage.begin_transaction(true).unwrap();

    storage
        .transactional(false, |txn| txn.delete_entity(functions[1]))
        .unwrap();

    let txn = storage.begin_transaction(true).unwrap();
    let calls = txn.links(method, "calls").unwrap();
    assert_eq!(calls.as_slice(), &[functions[0], functions[2]]);

    // the reader still sees its snapshot
    let calls = reader.links(method, "calls").unwrap();
    assert_eq!(calls.as_slice(), functions.as_slice());
}

#[test]
fn link_attribute_has_one_target_type() {
    let (storage, method, _) = call_graph();
    let txn = storage.begin_transaction(false).unwrap();
    let other = txn.new_entity("Method").unwrap();

    let err = txn.add_link(method, "calls", other.id()).unwrap_err();
    assert!(matches!(err.kind, ErrorKind::LinkTargetTypeMismatch { .. }));
    let context = err.context.unwrap();
    assert_eq!(context.attribute.as_deref(), Some("calls"));

    // a different attribute may target another type
    assert!(txn.add_link(method, "overrides", other.id()).unwrap());
}

#[test]
fn links_survive_flattening() {
    let (storage, method, functions) = call_graph();
    storage
        .transactional(false, |txn| txn.delete_entity(functions[0]))
        .unwrap();
    let readonly = storage.as_readonly().unwrap();

    let txn = readonly.begin_transaction(true).unwrap();
    let calls = txn.links(method, "calls").unwrap();
    assert_eq!(calls.as_slice(), &functions[1..]);
}
