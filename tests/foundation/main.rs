//! Integration tests for Layer 0: Foundation
//!
//! Tests for codecs, bindings, errors, and persistent collections.

mod codec;
mod collections;
mod errors;
