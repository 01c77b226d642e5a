//! Wire format for the SerialEMCCD camera socket protocol.
//!
//! Every exchange is one fixed-layout [`Message`] each way: a size header
//! followed by long, bool, double and trailing-array argument groups. The
//! groups are untagged, so receivers declare the [`Shape`] they expect.
//! Function codes live in [`Function`] and form an append-only contract
//! with the peer plugin.

mod codec;
mod function;
mod message;
pub mod text;

pub use codec::{ByteOrder, pack, unpack};
pub use function::Function;
pub use message::{MAX_PACKET, Message, Shape};

/// Result type for wire-level operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors from encoding, decoding, or function lookup.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// An outbound packet would not fit the peer's argument buffer.
    #[error("message packet size {size} is larger than maximum {max}")]
    SizeExceeded {
        /// Bytes the packet would occupy.
        size: usize,
        /// Fixed packet cap.
        max: usize,
    },

    /// No function is declared under this name.
    #[error("unknown operation: {0}")]
    UnknownOperation(String),

    /// No function is declared under this code.
    #[error("unknown function code {0}")]
    UnknownCode(i32),

    /// A buffer does not have the length its declared shape implies.
    #[error("expected {expected} bytes for declared shape, got {actual}")]
    ShapeMismatch {
        /// Bytes implied by the shape.
        expected: usize,
        /// Bytes present.
        actual: usize,
    },

    /// A length-bearing field disagrees with the declared shape.
    #[error("{field} field is {declared}, declared shape implies {expected}")]
    FieldMismatch {
        /// Which field.
        field: &'static str,
        /// Value found on the wire.
        declared: i32,
        /// Value implied by the shape.
        expected: usize,
    },
}
