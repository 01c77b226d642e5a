//! Fixed-layout packet codec.
//!
//! ```text
//! [i32 total size][longs: i32 * n1][bools: i32 * n2][doubles: f64 * n3][array: i32 * n4]
//! ```
//!
//! When the array is non-empty its word count is appended to the longs so
//! the peer knows how much trailing data follows. Group counts are not on
//! the wire; both sides agree on them per function code.

use serde::{Deserialize, Serialize};

use crate::message::{MAX_PACKET, Message, Shape};
use crate::{Error, Result};

/// Byte order of every multi-byte field on the wire.
///
/// The reference peer runs on the same architecture as its clients and
/// never swaps, so [`ByteOrder::Native`] is the compatible default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[non_exhaustive]
pub enum ByteOrder {
    /// Host order.
    #[default]
    Native,
    /// Little-endian.
    Little,
    /// Big-endian.
    Big,
}

impl ByteOrder {
    /// Encodes a 32-bit integer.
    pub const fn i32_bytes(self, v: i32) -> [u8; 4] {
        match self {
            Self::Native => v.to_ne_bytes(),
            Self::Little => v.to_le_bytes(),
            Self::Big => v.to_be_bytes(),
        }
    }

    /// Decodes a 32-bit integer.
    pub const fn read_i32(self, b: [u8; 4]) -> i32 {
        match self {
            Self::Native => i32::from_ne_bytes(b),
            Self::Little => i32::from_le_bytes(b),
            Self::Big => i32::from_be_bytes(b),
        }
    }

    /// Encodes a 64-bit float.
    pub const fn f64_bytes(self, v: f64) -> [u8; 8] {
        match self {
            Self::Native => v.to_ne_bytes(),
            Self::Little => v.to_le_bytes(),
            Self::Big => v.to_be_bytes(),
        }
    }

    /// Decodes a 64-bit float.
    pub const fn read_f64(self, b: [u8; 8]) -> f64 {
        match self {
            Self::Native => f64::from_ne_bytes(b),
            Self::Little => f64::from_le_bytes(b),
            Self::Big => f64::from_be_bytes(b),
        }
    }

    /// Decodes an unsigned 16-bit sample.
    pub const fn read_u16(self, b: [u8; 2]) -> u16 {
        match self {
            Self::Native => u16::from_ne_bytes(b),
            Self::Little => u16::from_le_bytes(b),
            Self::Big => u16::from_be_bytes(b),
        }
    }
}

/// Serializes `msg` into one contiguous packet.
///
/// Fails with [`Error::SizeExceeded`] if the packet would exceed
/// [`MAX_PACKET`]; nothing is produced in that case.
pub fn pack(msg: &Message, order: ByteOrder) -> Result<Vec<u8>> {
    let size = msg.shape().byte_len();
    if size > MAX_PACKET {
        return Err(Error::SizeExceeded {
            size,
            max: MAX_PACKET,
        });
    }

    let mut buf = Vec::with_capacity(size);
    put_len(&mut buf, size, order);
    for &v in &msg.longs {
        buf.extend_from_slice(&order.i32_bytes(v));
    }
    if !msg.array.is_empty() {
        put_len(&mut buf, msg.array.len(), order);
    }
    for &b in &msg.bools {
        buf.extend_from_slice(&order.i32_bytes(i32::from(b)));
    }
    for &v in &msg.doubles {
        buf.extend_from_slice(&order.f64_bytes(v));
    }
    for &w in &msg.array {
        buf.extend_from_slice(&order.i32_bytes(w));
    }
    debug_assert_eq!(buf.len(), size);
    Ok(buf)
}

/// Deserializes a packet of the declared `shape`.
///
/// The buffer length, the leading size field and (for shapes with an array)
/// the embedded array length must all agree with `shape`.
pub fn unpack(buf: &[u8], shape: Shape, order: ByteOrder) -> Result<Message> {
    let expected = shape.byte_len();
    if buf.len() != expected {
        return Err(Error::ShapeMismatch {
            expected,
            actual: buf.len(),
        });
    }

    let mut r = Reader { buf, order };
    let size = r.i32()?;
    check_field("size", size, expected)?;

    let mut msg = Message::default();
    msg.longs = (0..shape.longs).map(|_| r.i32()).collect::<Result<_>>()?;
    if shape.array > 0 {
        let words = r.i32()?;
        check_field("array length", words, shape.array)?;
    }
    msg.bools = (0..shape.bools)
        .map(|_| r.i32().map(|v| v != 0))
        .collect::<Result<_>>()?;
    msg.doubles = (0..shape.doubles).map(|_| r.f64()).collect::<Result<_>>()?;
    msg.array = (0..shape.array).map(|_| r.i32()).collect::<Result<_>>()?;
    Ok(msg)
}

/// Writes a length that [`MAX_PACKET`] already bounds.
#[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
fn put_len(buf: &mut Vec<u8>, n: usize, order: ByteOrder) {
    buf.extend_from_slice(&order.i32_bytes(n as i32));
}

/// Verifies a length-bearing field against the declared shape.
fn check_field(field: &'static str, declared: i32, expected: usize) -> Result<()> {
    if usize::try_from(declared).ok() == Some(expected) {
        Ok(())
    } else {
        Err(Error::FieldMismatch {
            field,
            declared,
            expected,
        })
    }
}

/// Forward-only cursor over a packet.
struct Reader<'a> {
    /// Bytes not yet consumed.
    buf: &'a [u8],
    /// Field byte order.
    order: ByteOrder,
}

impl Reader<'_> {
    /// Consumes `N` bytes.
    fn take<const N: usize>(&mut self) -> Result<[u8; N]> {
        let (head, rest) = self
            .buf
            .split_first_chunk::<N>()
            .ok_or(Error::ShapeMismatch {
                expected: N,
                actual: self.buf.len(),
            })?;
        self.buf = rest;
        Ok(*head)
    }

    /// Consumes one 32-bit integer.
    fn i32(&mut self) -> Result<i32> {
        Ok(self.order.read_i32(self.take()?))
    }

    /// Consumes one 64-bit float.
    fn f64(&mut self) -> Result<f64> {
        Ok(self.order.read_f64(self.take()?))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::Function;

    #[test]
    fn layout_matches_wire_format() {
        let msg = Message::call(Function::InsertCamera)
            .longs([2])
            .bools([true])
            .doubles([1.5]);
        let buf = pack(&msg, ByteOrder::Little).unwrap();

        assert_eq!(buf.len(), 4 + 8 + 4 + 8);
        assert_eq!(buf[0..4], 24i32.to_le_bytes());
        assert_eq!(buf[4..8], 13i32.to_le_bytes());
        assert_eq!(buf[8..12], 2i32.to_le_bytes());
        assert_eq!(buf[12..16], 1i32.to_le_bytes());
        assert_eq!(buf[16..24], 1.5f64.to_le_bytes());
    }

    #[test]
    fn array_length_follows_longs() {
        let msg = Message::call(Function::ExecuteScript)
            .bools([false])
            .array(vec![7, 8, 9]);
        let buf = pack(&msg, ByteOrder::Big).unwrap();

        assert_eq!(buf[0..4], 28i32.to_be_bytes());
        assert_eq!(buf[4..8], 1i32.to_be_bytes());
        assert_eq!(buf[8..12], 3i32.to_be_bytes());
        assert_eq!(buf[12..16], 0i32.to_be_bytes());
        assert_eq!(buf[16..20], 7i32.to_be_bytes());

        let back = unpack(&buf, msg.shape(), ByteOrder::Big).unwrap();
        assert_eq!(back, msg);
    }

    #[test]
    fn oversized_packet_is_rejected() {
        let msg = Message::call(Function::ExecuteScript).array(vec![0; 255]);
        let err = pack(&msg, ByteOrder::Native).unwrap_err();
        assert!(matches!(err, Error::SizeExceeded { size: 1032, max: 1024 }));

        // exactly at the cap is fine
        let msg = Message::call(Function::ExecuteScript).array(vec![0; 253]);
        assert_eq!(pack(&msg, ByteOrder::Native).unwrap().len(), MAX_PACKET);
    }

    #[test]
    fn unpack_rejects_wrong_length() {
        let buf = pack(&Message::default().longs([0, 5]), ByteOrder::Native).unwrap();
        let err = unpack(&buf, Shape::STATUS, ByteOrder::Native).unwrap_err();
        assert!(matches!(err, Error::ShapeMismatch { expected: 8, actual: 12 }));
    }

    #[test]
    fn unpack_rejects_bad_size_field() {
        let mut buf = pack(&Message::default().longs([0]), ByteOrder::Little).unwrap();
        buf[0..4].copy_from_slice(&99i32.to_le_bytes());
        let err = unpack(&buf, Shape::STATUS, ByteOrder::Little).unwrap_err();
        assert!(matches!(err, Error::FieldMismatch { field: "size", declared: 99, .. }));
    }

    #[test]
    fn nonzero_bool_words_decode_true() {
        let mut buf = pack(&Message::default().longs([0]).bools([false]), ByteOrder::Little)
            .unwrap();
        buf[8..12].copy_from_slice(&7i32.to_le_bytes());
        let msg = unpack(&buf, Shape::new(1, 1, 0), ByteOrder::Little).unwrap();
        assert!(msg.flag(0));
    }

    /// Messages whose packed size stays under the cap.
    fn arb_message() -> impl Strategy<Value = Message> {
        (
            prop::collection::vec(any::<i32>(), 0..16),
            prop::collection::vec(any::<bool>(), 0..8),
            prop::collection::vec(-1e12f64..1e12, 0..8),
            prop::collection::vec(any::<i32>(), 0..160),
        )
            .prop_map(|(l, b, d, a)| Message::from_parts(l, b, d, a))
    }

    proptest! {
        #[test]
        fn prop_roundtrip_within_cap(msg in arb_message()) {
            for order in [ByteOrder::Native, ByteOrder::Little, ByteOrder::Big] {
                let buf = pack(&msg, order).unwrap();
                prop_assert_eq!(buf.len(), msg.shape().byte_len());
                prop_assert_eq!(unpack(&buf, msg.shape(), order).unwrap(), msg.clone());
            }
        }

        #[test]
        fn prop_over_cap_always_fails(extra in 0usize..64, longs in 1usize..16) {
            // fill the array until the packet is past the cap
            let words = (MAX_PACKET - 4 - 4 * longs) / 4 + extra;
            let msg = Message::default()
                .longs(vec![1; longs])
                .array(vec![0; words]);
            let over = matches!(pack(&msg, ByteOrder::Native), Err(Error::SizeExceeded { .. }));
            prop_assert!(over);
        }
    }
}
