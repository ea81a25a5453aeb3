//! Integration tests for codecs and bindings

use ers_foundation::codec::{
    compressed_unsigned_bytes, pack_offset_len, read_compressed_unsigned, unpack_offset_len,
};
use ers_foundation::{Binding, Compressed, ErrorKind};
use proptest::prelude::*;

// =============================================================================
// Link Varint
// =============================================================================

#[test]
fn varint_runs_decode_in_sequence() {
    let mut run = Vec::new();
    for id in [0u64, 127, 128, 1 << 40] {
        run.extend(compressed_unsigned_bytes(id));
    }

    let mut decoded = Vec::new();
    let mut offset = 0;
    while offset < run.len() {
        let (id, len) = read_compressed_unsigned(&run[offset..]).unwrap();
        decoded.push(id);
        offset += len;
    }
    assert_eq!(decoded, vec![0, 127, 128, 1 << 40]);
}

#[test]
fn varint_without_terminal_byte_is_rejected() {
    let err = read_compressed_unsigned(&[0x01, 0x02]).unwrap_err();
    assert!(matches!(err.kind, ErrorKind::MalformedValue { .. }));
    assert!(read_compressed_unsigned(&[]).is_err());
}

#[test]
fn offset_len_packing() {
    let packed = pack_offset_len(12, 7);
    assert_eq!(packed, (7 << 32) | 12);
    assert_eq!(unpack_offset_len(packed), (12, 7));
    assert_eq!(unpack_offset_len(pack_offset_len(u32::MAX, 0)), (u32::MAX as usize, 0));
}

// =============================================================================
// Bindings
// =============================================================================

#[test]
fn integer_bindings_sort_like_numbers() {
    let values = [i64::MIN, -300, -1, 0, 1, 255, 256, i64::MAX];
    let encoded: Vec<Vec<u8>> = values.iter().map(Binding::to_bytes).collect();
    let mut sorted = encoded.clone();
    sorted.sort();
    assert_eq!(encoded, sorted);
}

#[test]
fn compressed_binding_keeps_small_values_ordered() {
    let encoded: Vec<Vec<u8>> = (0u64..300).map(|v| Compressed(v).to_bytes()).collect();
    assert!(encoded.windows(2).all(|pair| pair[0] < pair[1]));
}

#[test]
fn malformed_bindings_are_rejected() {
    assert!(i32::from_bytes(&[1, 2, 3]).is_err());
    assert!(bool::from_bytes(&[]).is_err());
    assert!(String::from_bytes(&[0xFF, 0xFE]).is_err());
    assert!(Compressed::from_bytes(&[0x81]).is_err());
}

proptest! {
    #[test]
    fn i32_binding_round_trips_and_orders(a: i32, b: i32) {
        prop_assert_eq!(i32::from_bytes(&a.to_bytes()).unwrap(), a);
        prop_assert_eq!(a.cmp(&b), a.to_bytes().cmp(&b.to_bytes()));
    }

    #[test]
    fn varint_round_trips(value: u64) {
        let bytes = compressed_unsigned_bytes(value);
        prop_assert_eq!(read_compressed_unsigned(&bytes).unwrap(), (value, bytes.len()));
    }
}
