//! Session configuration.
//!
//! [`ClientConfig`] holds every tunable of a session. It can be built in code
//! through [`ClientBuilder`](crate::ClientBuilder) or loaded from JSON:
//!
//! ```
//! use lichat_client::ClientConfig;
//!
//! let config = ClientConfig::from_json(r#"{ "username": "alice", "connect_timeout_ms": 500 }"#).unwrap();
//! assert_eq!(config.username.as_deref(), Some("alice"));
//! assert_eq!(config.connect_timeout_ms, 500);
//! assert_eq!(config.disconnect_timeout_ms, 3000);
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::protocol::DEFAULT_MAX_FRAME_SIZE;

/// Protocol version sent in the connect handshake.
pub const PROTOCOL_VERSION: &str = "2.0";

/// Default handshake timeout.
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 10_000;

/// Default wait for the server's disconnect reply.
pub const DEFAULT_DISCONNECT_TIMEOUT_MS: u64 = 3_000;

/// Default size of a single transport read.
pub const DEFAULT_READ_BUFFER_SIZE: usize = 4096;

/// In-flight entries older than this many clock units are dropped.
pub const DEFAULT_STALE_AFTER: i64 = 600;

/// Configuration for a client session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub username: Option<String>,
    /// An empty password is treated as none.
    pub password: Option<String>,
    pub connect_timeout_ms: u64,
    pub disconnect_timeout_ms: u64,
    pub read_buffer_size: usize,
    pub max_frame_size: usize,
    pub stale_after: i64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            username: None,
            password: None,
            connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT_MS,
            disconnect_timeout_ms: DEFAULT_DISCONNECT_TIMEOUT_MS,
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            stale_after: DEFAULT_STALE_AFTER,
        }
    }
}

impl ClientConfig {
    /// Parse a JSON configuration. Missing keys take their defaults.
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Read a JSON configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    #[inline]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    #[inline]
    pub fn disconnect_timeout(&self) -> Duration {
        Duration::from_millis(self.disconnect_timeout_ms)
    }
}
