//! Compact integer and byte codecs.
//!
//! Three encodings live here:
//! - the link varint: little-endian base-128 groups, 7 payload bits per byte,
//!   with the high bit set on the *terminal* byte. Frozen link stores use it
//!   and it must stay bit-exact.
//! - sign-inverted big-endian fixed-width integers, whose unsigned byte order
//!   equals numeric order.
//! - the compressed property form: big-endian base-128 groups with the high bit
//!   set on every byte but the last.
//!
//! Dense attribute stores pack `(offset, len)` into one word with
//! [`pack_offset_len`].

// Sign inversion reinterprets bits between signed and unsigned widths
#![allow(clippy::cast_sign_loss, clippy::cast_possible_wrap)]

use crate::error::{Error, Result};

/// Maximum number of bytes in an encoded `u64` varint.
pub const MAX_VARINT_LEN: usize = 10;

/// Appends the link varint encoding of `value` to `out`.
pub fn write_compressed_unsigned(value: u64, out: &mut Vec<u8>) {
    let mut rest = value;
    loop {
        let group = (rest & 0x7F) as u8;
        rest >>= 7;
        if rest == 0 {
            out.push(group | 0x80);
            return;
        }
        out.push(group);
    }
}

/// Returns the link varint encoding of `value`.
#[must_use]
pub fn compressed_unsigned_bytes(value: u64) -> Vec<u8> {
    let mut out = Vec::with_capacity(MAX_VARINT_LEN);
    write_compressed_unsigned(value, &mut out);
    out
}

/// Decodes one link varint from the start of `bytes`.
///
/// Returns the value and the number of bytes consumed.
///
/// # Errors
///
/// Returns an error if `bytes` ends before the terminal byte or the encoding
/// is longer than [`MAX_VARINT_LEN`].
pub fn read_compressed_unsigned(bytes: &[u8]) -> Result<(u64, usize)> {
    let mut result = 0u64;
    for (len, &b) in bytes.iter().enumerate().take(MAX_VARINT_LEN) {
        result |= u64::from(b & 0x7F) << (len * 7);
        if b & 0x80 != 0 {
            return Ok((result, len + 1));
        }
    }
    Err(Error::malformed_value("terminated varint", bytes.len()))
}

/// Packs a buffer slice position into one word: `(len << 32) | offset`.
#[must_use]
pub const fn pack_offset_len(offset: u32, len: u32) -> u64 {
    ((len as u64) << 32) | offset as u64
}

/// Unpacks a word produced by [`pack_offset_len`] into `(offset, len)`.
#[must_use]
pub const fn unpack_offset_len(packed: u64) -> (usize, usize) {
    ((packed & 0xFFFF_FFFF) as usize, (packed >> 32) as usize)
}

/// Encodes an `i32` as 4 big-endian bytes with the sign bit inverted.
#[must_use]
pub fn i32_to_bytes(value: i32) -> [u8; 4] {
    (value as u32 ^ 0x8000_0000).to_be_bytes()
}

/// Decodes an `i32` written by [`i32_to_bytes`].
///
/// # Errors
///
/// Returns an error if `bytes` is not exactly 4 bytes long.
pub fn i32_from_bytes(bytes: &[u8]) -> Result<i32> {
    let raw: [u8; 4] = bytes
        .try_into()
        .map_err(|_| Error::malformed_value("4-byte integer", bytes.len()))?;
    Ok((u32::from_be_bytes(raw) ^ 0x8000_0000) as i32)
}

/// Encodes an `i64` as 8 big-endian bytes with the sign bit inverted.
#[must_use]
pub fn i64_to_bytes(value: i64) -> [u8; 8] {
    (value as u64 ^ 0x8000_0000_0000_0000).to_be_bytes()
}

/// Decodes an `i64` written by [`i64_to_bytes`].
///
/// # Errors
///
/// Returns an error if `bytes` is not exactly 8 bytes long.
pub fn i64_from_bytes(bytes: &[u8]) -> Result<i64> {
    let raw: [u8; 8] = bytes
        .try_into()
        .map_err(|_| Error::malformed_value("8-byte integer", bytes.len()))?;
    Ok((u64::from_be_bytes(raw) ^ 0x8000_0000_0000_0000) as i64)
}

/// Encodes a `u64` in the compressed property form.
///
/// Values below `2^14` keep numeric order under byte comparison.
#[must_use]
pub fn compressed_to_bytes(value: u64) -> Vec<u8> {
    let mut groups = Vec::with_capacity(MAX_VARINT_LEN);
    let mut rest = value;
    loop {
        groups.push((rest & 0x7F) as u8 | 0x80);
        rest >>= 7;
        if rest == 0 {
            break;
        }
    }
    groups.reverse();
    if let Some(last) = groups.last_mut() {
        *last &= 0x7F;
    }
    groups
}

/// Decodes a `u64` written by [`compressed_to_bytes`].
///
/// # Errors
///
/// Returns an error if `bytes` is empty, ends before the terminal byte, or
/// is longer than [`MAX_VARINT_LEN`].
pub fn compressed_from_bytes(bytes: &[u8]) -> Result<u64> {
    let mut result = 0u64;
    for &b in bytes.iter().take(MAX_VARINT_LEN) {
        result = (result << 7) | u64::from(b & 0x7F);
        if b & 0x80 == 0 {
            return Ok(result);
        }
    }
    Err(Error::malformed_value("compressed integer", bytes.len()))
}
