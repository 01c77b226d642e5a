//! Camera session: one transport plus the state the plugin expects a
//! client to remember between calls.

use semccd_proto::{ByteOrder, Function, Message, Shape};
use tracing::{info, warn};

use crate::capability::Bindings;
use crate::config::SessionConfig;
use crate::error::Result;
use crate::transport::Transport;

/// A connected session with the camera plugin.
///
/// Every call is one synchronous round trip; the type is `!Sync` by way of
/// `&mut self` receivers. Use [`crate::SharedClient`] to share a session
/// across threads.
#[derive(Debug)]
pub struct Client {
    /// Underlying socket.
    transport: Transport,
    /// Resolved energy filter functions.
    pub(crate) bindings: Bindings,
    /// Re-resolve bindings after every (re)connect.
    probe_filter: bool,
    /// Frames will be saved by the next acquisition.
    pub(crate) save_frames: bool,
    /// Early-return RAM grabs and frame count, packed as
    /// `65536 * grabs + frames`.
    pub(crate) num_grab_sum: i64,
}

impl Client {
    /// Connects and, if configured, resolves energy filter functions.
    pub fn connect(config: &SessionConfig) -> Result<Self> {
        let transport = Transport::connect(config)?;
        let mut client = Self {
            transport,
            bindings: Bindings::default(),
            probe_filter: config.probe_filter,
            save_frames: false,
            num_grab_sum: 0,
        };
        if client.probe_filter {
            client.resolve_filter()?;
        }
        Ok(client)
    }

    /// Replaces the socket and all session state.
    pub fn reconnect(&mut self) -> Result<()> {
        self.transport.reconnect()?;
        self.bindings = Bindings::default();
        self.save_frames = false;
        self.num_grab_sum = 0;
        info!("session state reset");
        if self.probe_filter {
            self.resolve_filter()?;
        }
        Ok(())
    }

    /// Closes the socket. Later calls fail until [`Client::reconnect`].
    pub fn disconnect(&mut self) {
        self.transport.disconnect();
    }

    /// Whether a socket is open.
    pub const fn is_connected(&self) -> bool {
        self.transport.is_connected()
    }

    /// Whether the session must be reconnected before further use.
    pub const fn is_desynced(&self) -> bool {
        self.transport.is_desynced()
    }

    /// Energy filter functions bound on this session.
    pub const fn bindings(&self) -> &Bindings {
        &self.bindings
    }

    /// Whether frame saving was requested by the last counting-mode setup.
    pub const fn save_frames(&self) -> bool {
        self.save_frames
    }

    /// Packed early-return parameters from the last file-saving setup.
    pub const fn num_grab_sum(&self) -> i64 {
        self.num_grab_sum
    }

    /// Raw round trip: sends `request` and reads a response of shape
    /// `expect`. The response status is not interpreted.
    pub fn exchange(&mut self, request: &Message, expect: Shape) -> Result<Message> {
        self.transport.exchange(request, expect)
    }

    /// Wire byte order in use.
    pub const fn byte_order(&self) -> ByteOrder {
        self.transport.byte_order()
    }

    /// Underlying transport, for chunked reads.
    pub(crate) const fn transport_mut(&mut self) -> &mut Transport {
        &mut self.transport
    }

    /// Flags the session as unusable until reconnect.
    pub(crate) fn mark_desynced(&mut self) {
        self.transport.mark_desynced();
    }

    /// Sends a status-only call. A nonzero status is logged, not raised.
    pub(crate) fn apply(&mut self, request: &Message) -> Result<()> {
        let response = self.exchange(request, Shape::STATUS)?;
        warn_status(request, response.head());
        Ok(())
    }

    /// Calls `function` with `args` and returns the long after the status.
    pub(crate) fn get_long(
        &mut self,
        function: Function,
        args: impl IntoIterator<Item = i32>,
    ) -> Result<i32> {
        let request = Message::call(function).longs(args);
        let response = self.exchange(&request, Shape::new(2, 0, 0))?;
        warn_status(&request, response.head());
        Ok(response.long(1))
    }
}

/// Logs a nonzero peer status for `request`.
pub(crate) fn warn_status(request: &Message, status: i32) {
    if status != 0 {
        match Function::from_code(request.head()) {
            Ok(function) => warn!(%function, status, "peer reported nonzero status"),
            Err(_) => warn!(code = request.head(), status, "peer reported nonzero status"),
        }
    }
}
