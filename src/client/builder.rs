//! Fluent session configuration.

use std::sync::Arc;
use std::time::Duration;

use super::Client;
use crate::clock::{Clock, SystemClock};
use crate::config::ClientConfig;
use crate::error::Result;
use crate::handler::{Handler, HandlerRegistry};
use crate::schema::{Message, Registry};

/// Builder for configuring and creating a Lichat client.
///
/// Handlers registered here are installed after the built-in bookkeeping
/// handlers. Kind names are resolved when [`build`](Self::build) runs.
pub struct ClientBuilder {
    config: ClientConfig,
    registry: Option<Arc<Registry>>,
    clock: Arc<dyn Clock>,
    handlers: HandlerRegistry,
    /// Exact-kind handlers awaiting tag resolution.
    pending: Vec<(String, Handler)>,
}

impl ClientBuilder {
    /// Create a new client builder.
    pub fn new() -> Self {
        Self::from_config(ClientConfig::default())
    }

    /// Start from a loaded configuration.
    pub fn from_config(config: ClientConfig) -> Self {
        Self {
            config,
            registry: None,
            clock: Arc::new(SystemClock),
            handlers: HandlerRegistry::new(),
            pending: Vec::new(),
        }
    }

    pub fn username(mut self, username: &str) -> Self {
        self.config.username = Some(username.to_string());
        self
    }

    pub fn password(mut self, password: &str) -> Self {
        self.config.password = Some(password.to_string());
        self
    }

    /// Set the handshake timeout.
    ///
    /// Default: 10 seconds
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Set how long `disconnect` waits for the server's reply.
    ///
    /// Default: 3 seconds
    pub fn disconnect_timeout(mut self, timeout: Duration) -> Self {
        self.config.disconnect_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Default: 4096 bytes
    pub fn read_buffer_size(mut self, size: usize) -> Self {
        self.config.read_buffer_size = size;
        self
    }

    /// Default: 16 MiB
    pub fn max_frame_size(mut self, size: usize) -> Self {
        self.config.max_frame_size = size;
        self
    }

    /// Age in clock units after which unanswered requests are forgotten.
    ///
    /// Default: 600
    pub fn stale_after(mut self, units: i64) -> Self {
        self.config.stale_after = units;
        self
    }

    /// Use a specific schema registry instead of the bundled catalogue.
    pub fn registry(mut self, registry: Arc<Registry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Register a handler for one protocol kind, e.g. `"message"`.
    pub fn on<F>(mut self, kind: &str, handler: F) -> Self
    where
        F: Fn(&mut Client, &Message) + Send + Sync + 'static,
    {
        self.pending.push((kind.to_string(), Arc::new(handler)));
        self
    }

    /// Register a handler for every kind.
    pub fn on_any<F>(mut self, handler: F) -> Self
    where
        F: Fn(&mut Client, &Message) + Send + Sync + 'static,
    {
        self.handlers.register_any(handler);
        self
    }

    /// Build the client. No connection is made yet.
    ///
    /// # Errors
    ///
    /// Fails if the bundled catalogue cannot be loaded or a handler names an
    /// unknown kind.
    pub fn build(self) -> Result<Client> {
        let registry = match self.registry {
            Some(registry) => registry,
            None => Arc::new(Registry::lichat()?),
        };
        let mut handlers = self.handlers;
        for (kind, handler) in self.pending {
            handlers.insert(registry.tag(&kind)?, handler);
        }
        Client::new(self.config, registry, self.clock, handlers)
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}
