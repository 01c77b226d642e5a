//! Synchronous request/response pairing over a [`Transport`].

use semccd_proto::{Message, Shape};
use tracing::debug;

use crate::error::{Error, Result};
use crate::transport::Transport;

impl Transport {
    /// Sends `request` and reads one response of the declared shape.
    ///
    /// The leading status of the response is returned as-is; whether it
    /// signals failure depends on the operation.
    pub fn exchange(&mut self, request: &Message, expect: Shape) -> Result<Message> {
        self.post(request)?;

        let mut buf = vec![0u8; expect.byte_len()];
        self.receive_exact(&mut buf)?;
        let response = semccd_proto::unpack(&buf, expect, self.byte_order()).map_err(|e| {
            self.mark_desynced();
            Error::ProtocolDesync(e.to_string())
        })?;

        debug!(func = request.head(), code = response.head(), "exchange");
        Ok(response)
    }

    /// Sends `request` without reading a response.
    pub fn post(&mut self, request: &Message) -> Result<()> {
        self.ensure_usable()?;
        let bytes = semccd_proto::pack(request, self.byte_order())?;
        self.send(&bytes)
    }
}
