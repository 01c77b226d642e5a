//! Thread-shared session handle.

use std::sync::{Arc, Mutex};

use tracing::warn;

use crate::client::Client;
use crate::config::SessionConfig;
use crate::error::Result;

/// A [`Client`] shared between threads.
///
/// The lock is held for a whole logical operation, so a chunked image
/// transfer is never interleaved with another caller's traffic. If a
/// holder panics mid-exchange the session is marked desynchronized and
/// later callers see `ConnectionLost` until someone reconnects.
#[derive(Debug, Clone)]
pub struct SharedClient {
    /// Serialized session.
    inner: Arc<Mutex<Client>>,
}

impl SharedClient {
    /// Connects a new shared session.
    pub fn connect(config: &SessionConfig) -> Result<Self> {
        Client::connect(config).map(Self::new)
    }

    /// Shares an existing session.
    pub fn new(client: Client) -> Self {
        Self {
            inner: Arc::new(Mutex::new(client)),
        }
    }

    /// Runs `f` with exclusive access to the session.
    pub fn with<T>(&self, f: impl FnOnce(&mut Client) -> T) -> T {
        let mut guard = self.inner.lock().unwrap_or_else(|poisoned| {
            warn!("session lock poisoned; marking session desynchronized");
            self.inner.clear_poison();
            let mut guard = poisoned.into_inner();
            guard.mark_desynced();
            guard
        });
        f(&mut guard)
    }

    /// Reconnects the shared session.
    pub fn reconnect(&self) -> Result<()> {
        self.with(Client::reconnect)
    }
}

impl From<Client> for SharedClient {
    fn from(client: Client) -> Self {
        Self::new(client)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::thread;

    use semccd_proto::{Function, Message, Shape};

    use super::*;
    use crate::Acquisition;
    use crate::error::Error;
    use crate::testing::Peer;

    #[test]
    fn concurrent_acquisitions_do_not_interleave() {
        const ROUNDS: usize = 6;
        let peer = Peer::spawn(|conn| {
            for _ in 0..ROUNDS {
                conn.recv(Shape::new(14, 0, 2));
                conn.reply(&Message::default().longs([0, 8, 4, 2, 2]));
                let bytes = conn.samples(&[1, 2, 3, 4, 5, 6, 7, 8]);
                conn.write(&bytes[..8]);
                let raw = conn.recv_raw().unwrap();
                assert_eq!(conn.code(&raw), Function::ChunkHandshake.code());
                conn.write(&bytes[8..]);
            }
        });

        let shared = SharedClient::connect(&peer.config()).unwrap();
        let workers: Vec<_> = (0..ROUNDS / 2)
            .map(|_| {
                let shared = shared.clone();
                thread::spawn(move || {
                    for _ in 0..2 {
                        let image = shared
                            .with(|c| c.acquire(&Acquisition::new(4, 2, 0.1)))
                            .unwrap();
                        assert_eq!(image.pixels(), &[1, 2, 3, 4, 5, 6, 7, 8]);
                    }
                })
            })
            .collect();
        for w in workers {
            w.join().unwrap();
        }
        peer.join();
    }

    #[test]
    fn poisoned_lock_desyncs_session() {
        let peer = Peer::spawn(|conn| assert!(conn.recv_raw().is_none()));
        let shared = SharedClient::connect(&peer.config()).unwrap();

        let other = shared.clone();
        let holder = thread::spawn(move || {
            other.with(|c| assert!(!c.is_connected(), "caller bug"));
        });
        assert!(holder.join().is_err());

        let err = shared.with(Client::last_error).unwrap_err();
        assert!(matches!(err, Error::ConnectionLost(_)));
        drop(shared);
        peer.join();
    }
}
