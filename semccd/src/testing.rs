//! Loopback stand-in for the camera plugin, used by unit tests.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::missing_docs_in_private_items)]

use std::io::{self, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use semccd_proto::{ByteOrder, Function, Message, Shape, text};

use crate::config::SessionConfig;

const TIMEOUT: Duration = Duration::from_secs(10);

/// A peer thread serving exactly one connection.
pub(crate) struct Peer {
    port: u16,
    order: ByteOrder,
    handle: JoinHandle<()>,
}

impl Peer {
    pub(crate) fn spawn(serve: impl FnOnce(&mut PeerConn) + Send + 'static) -> Self {
        Self::spawn_ordered(ByteOrder::Native, serve)
    }

    pub(crate) fn spawn_ordered(
        order: ByteOrder,
        serve: impl FnOnce(&mut PeerConn) + Send + 'static,
    ) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let handle = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            stream.set_read_timeout(Some(TIMEOUT)).unwrap();
            serve(&mut PeerConn { stream, order });
        });
        Self {
            port,
            order,
            handle,
        }
    }

    /// Client settings pointing at this peer, with filter probing off.
    pub(crate) fn config(&self) -> SessionConfig {
        SessionConfig::new("127.0.0.1", self.port)
            .with_read_timeout(TIMEOUT)
            .with_byte_order(self.order)
            .with_filter_probing(false)
    }

    /// Waits for the peer, propagating its assertion failures.
    pub(crate) fn join(self) {
        if let Err(panic) = self.handle.join() {
            std::panic::resume_unwind(panic);
        }
    }
}

pub(crate) struct PeerConn {
    stream: TcpStream,
    order: ByteOrder,
}

impl PeerConn {
    /// Reads one request packet, or `None` once the client hangs up.
    pub(crate) fn recv_raw(&mut self) -> Option<Vec<u8>> {
        let mut header = [0u8; 4];
        match self.stream.read_exact(&mut header) {
            Ok(()) => {}
            Err(e)
                if matches!(
                    e.kind(),
                    io::ErrorKind::UnexpectedEof | io::ErrorKind::ConnectionReset
                ) =>
            {
                return None;
            }
            Err(e) => panic!("peer read failed: {e}"),
        }
        let size = usize::try_from(self.order.read_i32(header)).unwrap();
        let mut packet = header.to_vec();
        packet.resize(size, 0);
        self.stream.read_exact(&mut packet[4..]).unwrap();
        Some(packet)
    }

    /// Function code of a raw request.
    pub(crate) fn code(&self, raw: &[u8]) -> i32 {
        self.order.read_i32(raw[4..8].try_into().unwrap())
    }

    pub(crate) fn recv(&mut self, shape: Shape) -> Message {
        let raw = self.recv_raw().expect("client hung up");
        semccd_proto::unpack(&raw, shape, self.order).unwrap()
    }

    /// Decodes a raw `GS_ExecuteScript` request into its script text.
    pub(crate) fn script(&self, raw: &[u8]) -> String {
        assert_eq!(self.code(raw), Function::ExecuteScript.code());
        let words = self.order.read_i32(raw[8..12].try_into().unwrap());
        let shape = Shape::new(1, 1, 0).with_array(usize::try_from(words).unwrap());
        let msg = semccd_proto::unpack(raw, shape, self.order).unwrap();
        text::decode_str(&msg.array, self.order)
    }

    pub(crate) fn recv_script(&mut self) -> String {
        let raw = self.recv_raw().expect("client hung up");
        self.script(&raw)
    }

    /// Answers every script with `(0, answer(script))` until hang-up.
    pub(crate) fn serve_scripts(&mut self, mut answer: impl FnMut(&str) -> f64) {
        while let Some(raw) = self.recv_raw() {
            let value = answer(&self.script(&raw));
            self.reply(&Message::default().longs([0]).doubles([value]));
        }
    }

    pub(crate) fn pack(&self, msg: &Message) -> Vec<u8> {
        semccd_proto::pack(msg, self.order).unwrap()
    }

    pub(crate) fn reply(&mut self, msg: &Message) {
        let bytes = self.pack(msg);
        self.write(&bytes);
    }

    /// Sends a reply in `piece`-byte writes to exercise short reads.
    pub(crate) fn reply_split(&mut self, msg: &Message, piece: usize) {
        let bytes = self.pack(msg);
        for part in bytes.chunks(piece) {
            self.write(part);
            thread::sleep(Duration::from_millis(1));
        }
    }

    pub(crate) fn write(&mut self, bytes: &[u8]) {
        self.stream.write_all(bytes).unwrap();
        self.stream.flush().unwrap();
    }

    /// Encodes samples in wire order.
    pub(crate) fn samples(&self, samples: &[u16]) -> Vec<u8> {
        samples
            .iter()
            .flat_map(|&s| match self.order {
                ByteOrder::Big => s.to_be_bytes(),
                ByteOrder::Little => s.to_le_bytes(),
                _ => s.to_ne_bytes(),
            })
            .collect()
    }
}
