//! Strings carried in the trailing word array.
//!
//! Each string is NUL-terminated, the whole run is zero-padded to a multiple
//! of four bytes, and the bytes are reinterpreted as 32-bit words in wire
//! byte order, so the peer sees the original UTF-8 bytes verbatim.

use crate::codec::ByteOrder;

/// Byte length of a `len`-byte string once terminated and padded.
pub const fn padded_len(len: usize) -> usize {
    (len + 1).next_multiple_of(4)
}

/// Packs a single string.
pub fn encode_str(s: &str, order: ByteOrder) -> Vec<i32> {
    encode_strs(&[s], order)
}

/// Packs several strings back to back, each with its own terminator.
pub fn encode_strs(parts: &[&str], order: ByteOrder) -> Vec<i32> {
    let mut bytes = Vec::with_capacity(parts.iter().map(|p| p.len() + 1).sum::<usize>() + 3);
    for p in parts {
        bytes.extend_from_slice(p.as_bytes());
        bytes.push(0);
    }
    bytes.resize(bytes.len().next_multiple_of(4), 0);
    bytes
        .chunks_exact(4)
        .map(|w| order.read_i32([w[0], w[1], w[2], w[3]]))
        .collect()
}

/// Recovers the string stored at the front of a word array.
///
/// Reads up to the first NUL; invalid UTF-8 is replaced rather than
/// rejected since the peer does not guarantee an encoding.
pub fn decode_str(words: &[i32], order: ByteOrder) -> String {
    let bytes: Vec<u8> = words.iter().flat_map(|&w| order.i32_bytes(w)).collect();
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}
