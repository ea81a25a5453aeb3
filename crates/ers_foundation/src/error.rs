//! Error types for the ERS engine.
//!
//! Uses `thiserror` for ergonomic error definition with rich context.

use std::fmt;

use thiserror::Error;

use crate::entity::{EntityId, TypeId};

/// Result alias used throughout the ERS crates.
pub type Result<T> = std::result::Result<T, Error>;

/// The main error type for ERS operations.
#[derive(Debug, Error)]
#[error("{kind}")]
pub struct Error {
    /// The kind of error that occurred.
    pub kind: ErrorKind,
    /// Optional context about where the error occurred.
    pub context: Option<ErrorContext>,
}

impl Error {
    /// Creates a new error with the given kind.
    #[must_use]
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            context: None,
        }
    }

    /// Adds context to this error.
    #[must_use]
    pub fn with_context(mut self, context: ErrorContext) -> Self {
        self.context = Some(context);
        self
    }

    /// Creates an error for a mutation attempted on a flattened container.
    #[must_use]
    pub fn container_immutable(operation: &'static str) -> Self {
        Self::new(ErrorKind::ContainerImmutable { operation })
    }

    /// Creates an error for a link attribute receiving a second target type.
    #[must_use]
    pub fn link_target_type_mismatch(expected: TypeId, actual: TypeId) -> Self {
        Self::new(ErrorKind::LinkTargetTypeMismatch { expected, actual })
    }

    /// Creates a non-existing entity error.
    #[must_use]
    pub fn non_existing_entity(id: EntityId) -> Self {
        Self::new(ErrorKind::NonExistingEntity(id))
    }

    /// Creates a transaction conflict error.
    #[must_use]
    pub fn conflicting_transaction() -> Self {
        Self::new(ErrorKind::ConflictingTransaction)
    }

    /// Creates a finished transaction error.
    #[must_use]
    pub fn transaction_finished() -> Self {
        Self::new(ErrorKind::TransactionFinished)
    }

    /// Creates a malformed value error.
    #[must_use]
    pub fn malformed_value(expected: &'static str, actual_len: usize) -> Self {
        Self::new(ErrorKind::MalformedValue {
            expected,
            actual_len,
        })
    }

    /// Returns the class of this error.
    #[must_use]
    pub fn class(&self) -> ErrorClass {
        self.kind.class()
    }

    /// Returns true if the failed operation may succeed when retried
    /// against a newer snapshot.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.class() == ErrorClass::Conflict
    }
}

/// Categorized error kinds for pattern matching.
#[derive(Debug, Error)]
pub enum ErrorKind {
    /// A mutation was attempted on a container that refuses mutation.
    #[error("cannot {operation}: container is immutable")]
    ContainerImmutable {
        /// The refused operation.
        operation: &'static str,
    },

    /// A link attribute already records a different target type.
    #[error("link attribute targets type {expected}, got target of type {actual}")]
    LinkTargetTypeMismatch {
        /// The target type recorded for the attribute.
        expected: TypeId,
        /// The target type of the rejected link.
        actual: TypeId,
    },

    /// Dense attribute store input was not strictly ascending by instance id.
    #[error("instance ids must be sorted without duplicates: {current} follows {previous}")]
    UnsortedInstanceIds {
        /// The preceding instance id.
        previous: u64,
        /// The offending instance id.
        current: u64,
    },

    /// A dense buffer outgrew its 32-bit offset/length encoding.
    #[error("capacity exceeded: {what}")]
    CapacityExceeded {
        /// What overflowed.
        what: &'static str,
    },

    /// The value index does not reference an instance it should.
    #[error("value index is inconsistent: missing instance {instance_id}")]
    InconsistentValueIndex {
        /// The instance whose value bucket is missing.
        instance_id: u64,
    },

    /// A concurrent commit was installed between begin and commit.
    #[error("cannot commit transaction since a parallel one has been committed in between")]
    ConflictingTransaction,

    /// The transaction was already committed or aborted.
    #[error("transaction has been already finished")]
    TransactionFinished,

    /// A write was attempted through a read-only transaction.
    #[error("transaction is read-only")]
    ReadonlyTransaction,

    /// The entity was deleted or never created.
    #[error("entity does not exist: {0:?}")]
    NonExistingEntity(EntityId),

    /// Stored bytes cannot be decoded as the requested value type.
    #[error("malformed value: expected {expected}, got {actual_len} bytes")]
    MalformedValue {
        /// Description of the expected encoding.
        expected: &'static str,
        /// Number of bytes found.
        actual_len: usize,
    },
}

impl ErrorKind {
    /// Returns the class of this error kind.
    #[must_use]
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::ContainerImmutable { .. }
            | Self::LinkTargetTypeMismatch { .. }
            | Self::UnsortedInstanceIds { .. }
            | Self::CapacityExceeded { .. } => ErrorClass::Configuration,
            Self::InconsistentValueIndex { .. } => ErrorClass::Consistency,
            Self::ConflictingTransaction => ErrorClass::Conflict,
            Self::TransactionFinished
            | Self::ReadonlyTransaction
            | Self::NonExistingEntity(_)
            | Self::MalformedValue { .. } => ErrorClass::Usage,
        }
    }
}

/// How an error should be handled by callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Misuse of the engine's structure; fatal for the operation, never retried.
    Configuration,
    /// Internal desynchronization between data and an index; fatal.
    Consistency,
    /// Lost compare-and-swap race; the caller may retry on a newer snapshot.
    Conflict,
    /// Invalid use of a transaction or entity handle.
    Usage,
}

/// Context about where an error occurred.
#[derive(Debug, Clone, Default)]
pub struct ErrorContext {
    /// Operation that failed.
    pub operation: Option<String>,
    /// Entity the operation was scoped to.
    pub entity: Option<EntityId>,
    /// Attribute the operation was scoped to.
    pub attribute: Option<String>,
}

impl ErrorContext {
    /// Creates a new empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the failed operation.
    #[must_use]
    pub fn with_operation(mut self, operation: impl Into<String>) -> Self {
        self.operation = Some(operation.into());
        self
    }

    /// Sets the entity.
    #[must_use]
    pub fn with_entity(mut self, entity: EntityId) -> Self {
        self.entity = Some(entity);
        self
    }

    /// Sets the attribute name.
    #[must_use]
    pub fn with_attribute(mut self, attribute: impl Into<String>) -> Self {
        self.attribute = Some(attribute.into());
        self
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(operation) = &self.operation {
            write!(f, "in {operation}")?;
        }
        if let Some(entity) = &self.entity {
            write!(f, " on {entity}")?;
        }
        if let Some(attribute) = &self.attribute {
            write!(f, " [{attribute}]")?;
        }
        Ok(())
    }
}
