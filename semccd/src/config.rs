//! Session configuration and JSON persistence.

use std::fs;
use std::path::Path;
use std::time::Duration;

use semccd_proto::ByteOrder;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default peer address; the plugin is usually reached over loopback.
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Port the plugin listens on unless `SERIALEMCCD_PORT` says otherwise.
pub const DEFAULT_PORT: u16 = 48890;

/// Environment variable overriding the peer host.
pub const ENV_HOST: &str = "SERIALEMCCD_HOST";

/// Environment variable overriding the peer port.
pub const ENV_PORT: &str = "SERIALEMCCD_PORT";

/// Connection settings for one camera session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
#[non_exhaustive]
pub struct SessionConfig {
    /// Peer host name or address.
    pub host: String,
    /// Peer TCP port.
    pub port: u16,
    /// Connect timeout in milliseconds; `None` blocks.
    pub connect_timeout_ms: Option<u64>,
    /// Socket read and write timeout in milliseconds; `None` blocks.
    /// Expiry is fatal to the session.
    pub read_timeout_ms: Option<u64>,
    /// Byte order of wire fields and image samples.
    pub byte_order: ByteOrder,
    /// Resolve energy filter functions when the session opens.
    pub probe_filter: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_owned(),
            port: DEFAULT_PORT,
            connect_timeout_ms: None,
            read_timeout_ms: None,
            byte_order: ByteOrder::Native,
            probe_filter: true,
        }
    }
}

impl SessionConfig {
    /// Settings for `host:port` with everything else defaulted.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Self::default()
        }
    }

    /// Defaults overlaid with `SERIALEMCCD_HOST` / `SERIALEMCCD_PORT`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overlaid with values from `lookup`.
    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();
        if let Some(host) = lookup(ENV_HOST) {
            config.host = host;
        }
        if let Some(port) = lookup(ENV_PORT) {
            config.port = port
                .trim()
                .parse()
                .map_err(|e| Error::Config(format!("{ENV_PORT}={port}: {e}")))?;
        }
        Ok(config)
    }

    /// Loads settings from a JSON file. Missing fields take defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let data = fs::read_to_string(path)?;
        serde_json::from_str(&data).map_err(|e| Error::Config(e.to_string()))
    }

    /// Persists settings to a JSON file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let file = fs::File::create(path)?;
        serde_json::to_writer_pretty(file, self).map_err(|e| Error::Config(e.to_string()))
    }

    /// Sets the connect timeout.
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout_ms = Some(millis(timeout));
        self
    }

    /// Sets the socket read and write timeout.
    #[must_use]
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout_ms = Some(millis(timeout));
        self
    }

    /// Sets the wire byte order.
    #[must_use]
    pub const fn with_byte_order(mut self, order: ByteOrder) -> Self {
        self.byte_order = order;
        self
    }

    /// Enables or disables energy filter probing at connect.
    #[must_use]
    pub const fn with_filter_probing(mut self, probe: bool) -> Self {
        self.probe_filter = probe;
        self
    }

    /// `host:port` as dialed.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Connect timeout, if any.
    pub fn connect_timeout(&self) -> Option<Duration> {
        self.connect_timeout_ms.map(Duration::from_millis)
    }

    /// Socket read and write timeout, if any.
    pub fn read_timeout(&self) -> Option<Duration> {
        self.read_timeout_ms.map(Duration::from_millis)
    }
}

/// Whole milliseconds, saturating, never zero (the socket API rejects zero).
fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX).max(1)
}
