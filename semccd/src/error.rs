//! Error types for camera socket operations.

use std::io;

use semccd_proto::Function;

/// Alias for `Result<T, semccd::Error>`.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by a camera session.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// The peer could not be reached.
    #[error("cannot connect to {addr}: {source}")]
    Connection {
        /// `host:port` that was dialed.
        addr: String,
        /// Underlying socket error.
        source: io::Error,
    },

    /// The socket failed mid-exchange, or the session was already
    /// desynchronized by an earlier failure.
    #[error("connection lost: {0}")]
    ConnectionLost(#[source] io::Error),

    /// An outbound packet exceeded the peer's argument buffer.
    #[error("message packet size {size} is larger than maximum {max}")]
    SizeExceeded {
        /// Bytes the packet would occupy.
        size: usize,
        /// Fixed packet cap.
        max: usize,
    },

    /// The byte stream no longer matches what the protocol implies.
    #[error("protocol desync: {0}")]
    ProtocolDesync(String),

    /// A function name is not in the code table.
    #[error("unknown operation: {0}")]
    UnknownOperation(String),

    /// The peer does not provide the named script function.
    #[error("capability unavailable: {0}")]
    CapabilityUnavailable(String),

    /// A remote script reported an error status.
    #[error("script failed with status {status}")]
    ScriptFailed {
        /// Status code returned by the peer.
        status: i32,
    },

    /// The peer refused a request.
    #[error("{function} rejected with status {status}")]
    Rejected {
        /// Function that was called.
        function: Function,
        /// Status code returned by the peer.
        status: i32,
    },

    /// Session configuration could not be read or parsed.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Local I/O outside the session socket (configuration, script files).
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl From<semccd_proto::Error> for Error {
    fn from(e: semccd_proto::Error) -> Self {
        match e {
            semccd_proto::Error::SizeExceeded { size, max } => Self::SizeExceeded { size, max },
            semccd_proto::Error::UnknownOperation(name) => Self::UnknownOperation(name),
            other => Self::ProtocolDesync(other.to_string()),
        }
    }
}
