//! Conversions between domain values and the raw byte sequences the store keeps.
//!
//! The store itself only compares bytes lexicographically; these bindings pick
//! encodings whose byte order matches the value order where that is possible.

use crate::codec;
use crate::error::{Error, Result};

/// A value that can be stored as a property or blob.
pub trait Binding: Sized {
    /// Encodes the value.
    fn to_bytes(&self) -> Vec<u8>;

    /// Decodes a value from its stored bytes.
    ///
    /// # Errors
    ///
    /// Returns [`crate::ErrorKind::MalformedValue`] if `bytes` is not a valid
    /// encoding for this type.
    fn from_bytes(bytes: &[u8]) -> Result<Self>;
}

impl Binding for Vec<u8> {
    fn to_bytes(&self) -> Vec<u8> {
        self.clone()
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(bytes.to_vec())
    }
}

impl Binding for String {
    fn to_bytes(&self) -> Vec<u8> {
        self.as_bytes().to_vec()
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self> {
        String::from_utf8(bytes.to_vec()).map_err(|_| Error::malformed_value("UTF-8", bytes.len()))
    }
}

impl Binding for i32 {
    fn to_bytes(&self) -> Vec<u8> {
        codec::i32_to_bytes(*self).to_vec()
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self> {
        codec::i32_from_bytes(bytes)
    }
}

impl Binding for i64 {
    fn to_bytes(&self) -> Vec<u8> {
        codec::i64_to_bytes(*self).to_vec()
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self> {
        codec::i64_from_bytes(bytes)
    }
}

// Goes through the i64 encoding of the IEEE bits, so byte order only
// matches numeric order for non-negative values.
impl Binding for f64 {
    fn to_bytes(&self) -> Vec<u8> {
        codec::i64_to_bytes(i64::from_ne_bytes(self.to_bits().to_ne_bytes())).to_vec()
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let bits = codec::i64_from_bytes(bytes)?;
        Ok(f64::from_bits(u64::from_ne_bytes(bits.to_ne_bytes())))
    }
}

impl Binding for bool {
    fn to_bytes(&self) -> Vec<u8> {
        vec![u8::from(*self)]
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self> {
        match bytes {
            [b] => Ok(*b != 0),
            _ => Err(Error::malformed_value("1-byte boolean", bytes.len())),
        }
    }
}

/// A non-negative integer stored in the variable-length compressed form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Compressed(pub u64);

impl Binding for Compressed {
    fn to_bytes(&self) -> Vec<u8> {
        codec::compressed_to_bytes(self.0)
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self> {
        codec::compressed_from_bytes(bytes).map(Compressed)
    }
}

impl From<u64> for Compressed {
    fn from(value: u64) -> Self {
        Self(value)
    }
}
