//! Integration tests for the error taxonomy

use ers_foundation::{EntityId, Error, ErrorClass, ErrorContext, ErrorKind};

#[test]
fn errors_are_classified() {
    assert_eq!(
        Error::container_immutable("set property").class(),
        ErrorClass::Configuration
    );
    assert_eq!(
        Error::link_target_type_mismatch(1, 2).class(),
        ErrorClass::Configuration
    );
    assert_eq!(
        Error::new(ErrorKind::InconsistentValueIndex { instance_id: 3 }).class(),
        ErrorClass::Consistency
    );
    assert_eq!(Error::conflicting_transaction().class(), ErrorClass::Conflict);
    assert_eq!(Error::transaction_finished().class(), ErrorClass::Usage);
    assert_eq!(
        Error::non_existing_entity(EntityId::new(0, 1)).class(),
        ErrorClass::Usage
    );
}

#[test]
fn only_conflicts_are_retryable() {
    assert!(Error::conflicting_transaction().is_retryable());
    assert!(!Error::transaction_finished().is_retryable());
    assert!(!Error::new(ErrorKind::ReadonlyTransaction).is_retryable());
    assert!(!Error::malformed_value("4-byte integer", 3).is_retryable());
}

#[test]
fn error_messages() {
    let err = Error::link_target_type_mismatch(4, 9);
    assert_eq!(
        err.to_string(),
        "link attribute targets type 4, got target of type 9"
    );
    assert_eq!(
        Error::container_immutable("add link").to_string(),
        "cannot add link: container is immutable"
    );
}

#[test]
fn context_is_attached() {
    let err = Error::non_existing_entity(EntityId::new(2, 5)).with_context(
        ErrorContext::new()
            .with_operation("set property")
            .with_entity(EntityId::new(2, 5))
            .with_attribute("name"),
    );
    let context = err.context.unwrap();
    assert_eq!(context.operation.as_deref(), Some("set property"));
    assert_eq!(context.entity, Some(EntityId::new(2, 5)));
    assert_eq!(context.attribute.as_deref(), Some("name"));
}
