//! Client for the SerialEMCCD camera control socket.
//!
//! `semccd` drives Gatan cameras through the SerialEMCCD plugin running
//! inside DigitalMicrograph. A [`Client`] owns one TCP session and issues
//! strictly alternating request/response exchanges; images come back as
//! chunked 16-bit payloads.
//!
//! # Quick start
//!
//! ```no_run
//! use semccd::{Acquisition, Client, CountingParams, SessionConfig, read_mode};
//!
//! let mut cam = Client::connect(&SessionConfig::from_env()?)?;
//! cam.select_camera(0)?;
//! cam.set_k2_parameters(&CountingParams::new(read_mode::K2_COUNTING))?;
//!
//! let corrections = cam.correction_flags()?;
//! let image = cam.acquire(&Acquisition::new(2048, 2048, 1.0).corrections(corrections))?;
//! println!("{}x{}", image.width(), image.height());
//! # Ok::<(), semccd::Error>(())
//! ```
//!
//! Any socket failure or framing inconsistency desynchronizes the session;
//! every later call fails with [`Error::ConnectionLost`] until
//! [`Client::reconnect`].

mod acquire;
mod camera;
mod capability;
mod chunked;
mod client;
mod config;
mod error;
mod exchange;
mod filter;
mod script;
mod setup;
mod shared;
mod transport;
mod version;

#[cfg(test)]
mod testing;

pub use acquire::{Acquisition, Processing};
pub use camera::{DmCapabilities, read_mode};
pub use capability::{Bindings, FILTER_CANDIDATES, FilterCapability};
pub use chunked::{BYTES_PER_SAMPLE, ChunkHeader, Image, read_image};
pub use client::Client;
pub use config::{DEFAULT_HOST, DEFAULT_PORT, ENV_HOST, ENV_PORT, SessionConfig};
pub use error::{Error, Result};
pub use script::{SCRIPT_RESPONSE, camera_object_script, probe_script};
pub use semccd_proto::{ByteOrder, Function, MAX_PACKET, Message, Shape};
pub use setup::{CountingParams, FileSaveResult, FileSaving};
pub use shared::SharedClient;
pub use transport::Transport;
pub use version::DmVersion;
