//! Integration tests for Layer 1: Storage
//!
//! Tests for entities, properties, links, transactions, and read-only snapshots.

mod entities;
mod links;
mod properties;
mod transactions;

use tracing_subscriber::filter::LevelFilter;

/// Routes engine events to the test output.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(LevelFilter::TRACE)
        .with_test_writer()
        .try_init();
}
