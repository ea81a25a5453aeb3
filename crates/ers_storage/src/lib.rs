//! RAM entity-relationship storage for ERS.
//!
//! This crate provides:
//! - [`AttributesImmutable`] - Dense, binary-searchable attribute arrays
//! - [`PropertiesMutable`] / [`LinksMutable`] / [`BlobsMutable`] - Persistent attribute stores
//! - [`Entities`] - Per-type instance id counters and tombstones
//! - [`DataContainer`] - Copy-on-write aggregate of the whole database state
//! - [`RamEntityRelationshipStorage`] - Atomically swapped snapshots with MVCC transactions
//! - [`api`] - Backend-neutral storage, transaction and entity traits

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod api;
pub mod attributes;
pub mod blobs;
pub mod container;
pub mod entities;
pub mod links;
pub mod properties;
pub mod settings;
pub mod storage;
pub mod transaction;

pub use api::{Entity, EntityIterable, EntityRelationshipStorage, FindOption, Transaction};
pub use attributes::AttributesImmutable;
pub use blobs::{BlobsImmutable, BlobsMutable};
pub use container::{
    AttributeKey, DataContainer, RamDataContainerImmutable, RamDataContainerMutable,
};
pub use entities::Entities;
pub use links::{LinksImmutable, LinksMutable};
pub use properties::{PropertiesImmutable, PropertiesMutable};
pub use settings::ErsSettings;
pub use storage::RamEntityRelationshipStorage;
pub use transaction::RamTransaction;
