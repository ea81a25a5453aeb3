//! ERS - In-memory entity-relationship store
//!
//! This crate re-exports all layers of the ERS system for convenient access.
//! For detailed documentation, see the individual layer crates.
//!
//! # Architecture
//!
//! ```text
//! Layer 1: ers_storage    - Attribute stores, data containers, MVCC transactions
//! Layer 0: ers_foundation - Entity ids, errors, codecs, persistent collections
//! ```

pub use ers_foundation as foundation;
pub use ers_storage as storage;
