//! Core types, codecs, and persistent collections for the ERS engine.
//!
//! This crate provides:
//! - [`EntityId`] - `(type id, instance id)` entity identifiers
//! - [`Error`] - Error taxonomy with configuration/consistency/conflict classes
//! - [`codec`] - Varint, order-preserving integer and offset/length packing helpers
//! - [`Binding`] - Conversions between domain values and raw byte sequences
//! - [`SparseBitSet`] - Persistent tombstone set over 64-bit instance ids
//! - Persistent collections ([`TransactionalPersistentMap`], [`PersistentLongSet`])

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod binding;
pub mod bitset;
pub mod codec;
pub mod collections;
pub mod entity;
pub mod error;

pub use binding::{Binding, Compressed};
pub use bitset::SparseBitSet;
pub use collections::{
    MapMutation, PersistentLongSet, TransactionalPersistentLongMap, TransactionalPersistentMap,
};
pub use entity::{EntityId, TypeId};
pub use error::{Error, ErrorClass, ErrorContext, ErrorKind, Result};
