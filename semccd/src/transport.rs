//! TCP transport to the camera plugin.
//!
//! The protocol has no framing beyond each side's knowledge of the next
//! packet's shape, so any read that fails part-way leaves the peer's send
//! cursor unknown. The transport latches that state and refuses further
//! traffic until [`Transport::reconnect`] opens a fresh socket.

use std::io::{self, Read, Write};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::time::Duration;

use semccd_proto::ByteOrder;
use tracing::{debug, info, warn};

use crate::config::SessionConfig;
use crate::error::{Error, Result};

/// One TCP connection to the peer.
#[derive(Debug)]
pub struct Transport {
    /// `host:port` to dial.
    addr: String,
    /// Connect timeout.
    connect_timeout: Option<Duration>,
    /// Per-read and per-write timeout.
    read_timeout: Option<Duration>,
    /// Wire byte order.
    order: ByteOrder,
    /// Open socket; `None` once disconnected.
    stream: Option<TcpStream>,
    /// Set when the byte stream can no longer be trusted.
    desynced: bool,
}

impl Transport {
    /// Opens a connection described by `config`.
    pub fn connect(config: &SessionConfig) -> Result<Self> {
        let mut transport = Self {
            addr: config.addr(),
            connect_timeout: config.connect_timeout(),
            read_timeout: config.read_timeout(),
            order: config.byte_order,
            stream: None,
            desynced: false,
        };
        transport.open()?;
        Ok(transport)
    }

    /// Dials the peer and applies socket options.
    fn open(&mut self) -> Result<()> {
        let stream = self.dial().map_err(|source| Error::Connection {
            addr: self.addr.clone(),
            source,
        })?;
        info!(addr = %self.addr, "connected to camera plugin");
        self.stream = Some(stream);
        self.desynced = false;
        Ok(())
    }

    /// Establishes the TCP stream.
    fn dial(&self) -> io::Result<TcpStream> {
        let stream = match self.connect_timeout {
            Some(timeout) => {
                let mut last = io::Error::new(
                    io::ErrorKind::InvalidInput,
                    "address resolved to nothing",
                );
                let mut found = None;
                for addr in self.addr.to_socket_addrs()? {
                    match TcpStream::connect_timeout(&addr, timeout) {
                        Ok(s) => {
                            found = Some(s);
                            break;
                        }
                        Err(e) => last = e,
                    }
                }
                found.ok_or(last)?
            }
            None => TcpStream::connect(&self.addr)?,
        };
        // Requests are small and strictly alternate with responses.
        stream.set_nodelay(true)?;
        stream.set_read_timeout(self.read_timeout)?;
        stream.set_write_timeout(self.read_timeout)?;
        Ok(stream)
    }

    /// Shuts down both directions and closes the socket.
    pub fn disconnect(&mut self) {
        if let Some(stream) = self.stream.take() {
            if let Err(e) = stream.shutdown(Shutdown::Both) {
                debug!(addr = %self.addr, "shutdown: {e}");
            }
            info!(addr = %self.addr, "disconnected from camera plugin");
        }
    }

    /// Closes the current socket completely, then opens a new one.
    pub fn reconnect(&mut self) -> Result<()> {
        self.disconnect();
        self.open()
    }

    /// Whether a socket is currently open.
    pub const fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    /// Whether the session must be reconnected before further use.
    pub const fn is_desynced(&self) -> bool {
        self.desynced
    }

    /// Wire byte order in use.
    pub const fn byte_order(&self) -> ByteOrder {
        self.order
    }

    /// Marks the stream untrustworthy until the next reconnect.
    pub(crate) fn mark_desynced(&mut self) {
        if !self.desynced {
            warn!(addr = %self.addr, "session desynchronized; reconnect required");
        }
        self.desynced = true;
    }

    /// Fails if the stream cannot carry another exchange.
    pub(crate) fn ensure_usable(&self) -> Result<()> {
        if self.desynced {
            return Err(Error::ConnectionLost(io::Error::new(
                io::ErrorKind::NotConnected,
                "session desynchronized by an earlier failure",
            )));
        }
        if self.stream.is_none() {
            return Err(Error::ConnectionLost(io::Error::from(
                io::ErrorKind::NotConnected,
            )));
        }
        Ok(())
    }

    /// Writes all of `bytes`.
    pub fn send(&mut self, bytes: &[u8]) -> Result<()> {
        let result = match self.stream.as_mut() {
            Some(s) => s.write_all(bytes),
            None => Err(io::Error::from(io::ErrorKind::NotConnected)),
        };
        result.map_err(|e| self.lost(e))
    }

    /// Reads whatever is available, up to `buf.len()` bytes.
    ///
    /// A short read is normal; end-of-stream is reported as an error
    /// because the protocol never expects the peer to close first.
    pub fn receive(&mut self, buf: &mut [u8]) -> Result<usize> {
        let result = loop {
            let read = match self.stream.as_mut() {
                Some(s) => s.read(buf),
                None => Err(io::Error::from(io::ErrorKind::NotConnected)),
            };
            match read {
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Ok(0) if !buf.is_empty() => {
                    break Err(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "peer closed the connection",
                    ));
                }
                other => break other,
            }
        };
        result.map_err(|e| self.lost(e))
    }

    /// Reads exactly `buf.len()` bytes, looping over short reads.
    pub fn receive_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        let mut filled = 0;
        while filled < buf.len() {
            filled += self.receive(&mut buf[filled..])?;
        }
        Ok(())
    }

    /// Latches desync and wraps a socket failure.
    fn lost(&mut self, e: io::Error) -> Error {
        self.mark_desynced();
        Error::ConnectionLost(e)
    }
}

impl Drop for Transport {
    fn drop(&mut self) {
        self.disconnect();
    }
}
