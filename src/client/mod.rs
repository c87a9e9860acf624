//! Client session.
//!
//! The [`Client`] owns the transport and all session state. There is no
//! background task: the caller drives the session by alternating
//! [`recv`](Client::recv) and [`handle`](Client::handle), or by calling
//! [`run`](Client::run). Lifecycle:
//! 1. Build with [`ClientBuilder`]
//! 2. [`connect`](Client::connect) performs the handshake
//! 3. Receive and handle messages; send requests
//! 4. [`disconnect`](Client::disconnect), or the server ends the session
//!
//! Every failure after the handshake (peer close, read or write error,
//! oversized frame) is turned into a synthesized `disconnect` message that
//! flows through the normal handler path.
//!
//! # Example
//!
//! ```ignore
//! use lichat_client::Client;
//!
//! #[tokio::main]
//! async fn main() -> lichat_client::Result<()> {
//!     let mut client = Client::builder()
//!         .username("alice")
//!         .on("message", |_client, message| {
//!             println!("<{}> {}", message.from().unwrap_or("?"), message.text().unwrap_or(""));
//!         })
//!         .build()?;
//!
//!     client.connect("chat.tymoon.eu", None).await?;
//!     client.send("join", [("channel", "lichatters")]).await?;
//!     client.run().await
//! }
//! ```

mod builder;
mod builtin;
mod channel;

pub use builder::ClientBuilder;
pub use channel::{Channel, Emote};

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::io::AsyncReadExt;

use crate::clock::Clock;
use crate::codec::WireValue;
use crate::config::{ClientConfig, PROTOCOL_VERSION};
use crate::error::{ConnectFailure, LichatError, Result};
use crate::handler::HandlerRegistry;
use crate::protocol::{build_frame, FrameBuffer};
use crate::schema::{Kind, Message, Registry, NO_FIELDS};
use crate::symbol::{fold, Symbol};
use crate::toolkit::CaseInsensitiveMap;
use crate::transport::{connect_tcp, BoxedTransport, Transport};
use crate::writer::write_batch;

/// Read timeout used by [`Client::run`].
pub const RUN_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Tags of the kinds the session itself reacts to.
struct Tags {
    connect: Symbol,
    disconnect: Arc<Kind>,
    ping: Symbol,
    join: Symbol,
    leave: Symbol,
    emote: Symbol,
    set_channel_info: Symbol,
    users: Symbol,
}

impl Tags {
    fn resolve(registry: &Registry) -> Result<Self> {
        Ok(Self {
            connect: registry.tag("connect")?,
            disconnect: registry.kind_named("disconnect")?,
            ping: registry.tag("ping")?,
            join: registry.tag("join")?,
            leave: registry.tag("leave")?,
            emote: registry.tag("emote")?,
            set_channel_info: registry.tag("set-channel-info")?,
            users: registry.tag("users")?,
        })
    }
}

/// A Lichat client session.
pub struct Client {
    config: ClientConfig,
    registry: Arc<Registry>,
    clock: Arc<dyn Clock>,
    handlers: HandlerRegistry,
    tags: Tags,
    transport: Option<BoxedTransport>,
    /// Reassembly buffer for incoming frames.
    frames: FrameBuffer,
    read_buf: Vec<u8>,
    /// Framed messages waiting to be written.
    outbox: VecDeque<Bytes>,
    username: Option<String>,
    password: Option<String>,
    servername: Option<String>,
    connected: bool,
    /// Negotiated extensions, folded.
    extensions: Vec<String>,
    last_id: i64,
    in_flight: HashMap<i64, Message>,
    channels: CaseInsensitiveMap<Channel>,
    active_channel: Option<String>,
    emotes: CaseInsensitiveMap<Emote>,
}

impl Client {
    /// Create a new client builder.
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    pub(crate) fn new(
        config: ClientConfig,
        registry: Arc<Registry>,
        clock: Arc<dyn Clock>,
        handlers: HandlerRegistry,
    ) -> Result<Self> {
        let tags = Tags::resolve(&registry)?;
        Ok(Self {
            frames: FrameBuffer::with_max_frame_size(config.max_frame_size),
            read_buf: vec![0u8; config.read_buffer_size.max(1)],
            username: config.username.clone(),
            password: config.password.clone(),
            config,
            registry,
            clock,
            handlers,
            tags,
            transport: None,
            outbox: VecDeque::new(),
            servername: None,
            connected: false,
            extensions: Vec::new(),
            last_id: 0,
            in_flight: HashMap::new(),
            channels: CaseInsensitiveMap::new(),
            active_channel: None,
            emotes: CaseInsensitiveMap::new(),
        })
    }

    // ========================================================================
    // Connection
    // ========================================================================

    /// Open a TCP connection and perform the handshake.
    ///
    /// `port` defaults to 1111.
    pub async fn connect(&mut self, host: &str, port: Option<u16>) -> Result<()> {
        if self.connected {
            return Err(LichatError::AlreadyConnected);
        }
        let stream = match tokio::time::timeout(self.config.connect_timeout(), connect_tcp(host, port)).await {
            Ok(stream) => stream?,
            Err(_) => return Err(LichatError::ConnectionFailed(ConnectFailure::Timeout)),
        };
        self.connect_with(stream).await
    }

    /// Perform the handshake over an already open transport.
    ///
    /// Sends `connect` with the protocol version and every supported
    /// extension, then waits up to the connect timeout for the reply. A
    /// `connect` reply is dispatched like any other message, together with
    /// whatever arrived alongside it; anything else closes the transport.
    pub async fn connect_with<T>(&mut self, transport: T) -> Result<()>
    where
        T: Transport + 'static,
    {
        if self.connected {
            return Err(LichatError::AlreadyConnected);
        }
        if self.password.as_deref() == Some("") {
            self.password = None;
        }
        self.frames.clear();
        self.outbox.clear();
        self.transport = Some(Box::new(transport));

        let mut fields = vec![
            ("version", WireValue::string(PROTOCOL_VERSION)),
            ("extensions", WireValue::strings(self.registry.extensions().iter().cloned())),
        ];
        if let Some(password) = &self.password {
            fields.push(("password", WireValue::string(password.clone())));
        }
        let request = self.make("connect", fields)?;
        let frame = build_frame(&request.encode()?);
        self.track(request);
        self.outbox.push_back(frame);
        if let Err(err) = self.write_outbox().await {
            self.close();
            return Err(err);
        }

        let updates = match tokio::time::timeout(self.config.connect_timeout(), self.recv_first()).await {
            Ok(Ok(updates)) => updates,
            Ok(Err(err)) => {
                self.close();
                return Err(err);
            }
            Err(_) => {
                tracing::warn!("No handshake reply within {:?}", self.config.connect_timeout());
                self.close();
                return Err(LichatError::ConnectionFailed(ConnectFailure::Timeout));
            }
        };

        let mut updates = updates.into_iter();
        let Some(first) = updates.next() else {
            self.close();
            return Err(LichatError::ConnectionFailed(ConnectFailure::Timeout));
        };
        if !first.is(&self.tags.connect) {
            tracing::warn!("Handshake rejected with {}", first.kind().name());
            self.close();
            return Err(LichatError::ConnectionFailed(ConnectFailure::Rejected(Box::new(first))));
        }

        self.handle(first).await;
        for update in updates {
            self.handle(update).await;
        }
        Ok(())
    }

    async fn recv_first(&mut self) -> Result<Vec<Message>> {
        loop {
            let updates = self.recv(None).await?;
            if !updates.is_empty() {
                return Ok(updates);
            }
        }
    }

    /// Say goodbye and close the transport.
    ///
    /// When connected, sends `disconnect` and handles whatever arrives within
    /// the disconnect timeout before closing.
    pub async fn disconnect(&mut self) -> Result<()> {
        if self.connected {
            self.send("disconnect", NO_FIELDS).await?;
            if self.transport.is_some() {
                let updates = self
                    .recv(Some(self.config.disconnect_timeout()))
                    .await
                    .unwrap_or_default();
                for update in updates {
                    self.handle(update).await;
                }
            }
        }
        self.close();
        self.connected = false;
        Ok(())
    }

    /// Drop the transport and any partial input.
    fn close(&mut self) {
        if self.transport.take().is_some() {
            tracing::debug!("Transport closed");
        }
        self.frames.clear();
    }

    // ========================================================================
    // Outgoing
    // ========================================================================

    /// Build a message stamped with this session's `from`, `clock` and a
    /// fresh `id`, unless those fields were provided.
    pub fn make<I, K, V>(&mut self, kind: &str, fields: I) -> Result<Message>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<WireValue>,
    {
        let mut message = self.registry.make(kind, fields)?;
        if message.get("from").is_none() {
            if let Some(username) = &self.username {
                message.set("from", Some(WireValue::string(username.clone())))?;
            }
        }
        if message.get("clock").is_none() {
            message.set("clock", Some(WireValue::Integer(self.clock.now())))?;
        }
        if message.get("id").is_none() {
            let id = self.next_id();
            message.set("id", Some(WireValue::Integer(id)))?;
        }
        Ok(message)
    }

    fn next_id(&mut self) -> i64 {
        self.last_id += 1;
        self.last_id
    }

    /// Record a message as in flight and return its id.
    fn track(&mut self, message: Message) -> i64 {
        let id = message.id().unwrap_or(0);
        self.in_flight.insert(id, message);
        id
    }

    /// Send a request and return its id.
    ///
    /// A write failure ends the session through a synthesized `disconnect`;
    /// the id is still returned.
    pub async fn send<I, K, V>(&mut self, kind: &str, fields: I) -> Result<i64>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<WireValue>,
    {
        let message = self.make(kind, fields)?;
        self.send_message(message).await
    }

    /// Send a request and call `callback` with it and its response.
    ///
    /// The callback runs once, before any handler sees the response.
    pub async fn send_with_callback<I, K, V, F>(&mut self, kind: &str, fields: I, callback: F) -> Result<i64>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<WireValue>,
        F: FnOnce(&mut Client, &Message, &Message) + Send + 'static,
    {
        if self.transport.is_none() {
            return Err(LichatError::NotConnected);
        }
        let message = self.make(kind, fields)?;
        let id = message.id().unwrap_or(0);
        self.handlers.add_callback(id, message.clone(), Box::new(callback));
        self.send_message(message).await
    }

    /// Send an already built message as is.
    pub async fn send_message(&mut self, message: Message) -> Result<i64> {
        if self.transport.is_none() {
            return Err(LichatError::NotConnected);
        }
        let frame = build_frame(&message.encode()?);
        let id = self.track(message);
        self.outbox.push_back(frame);
        self.flush().await;
        Ok(id)
    }

    /// Queue a request without writing it.
    ///
    /// For use inside handlers; the queue is written once the current
    /// message has been dispatched, or by [`flush`](Self::flush).
    pub fn queue<I, K, V>(&mut self, kind: &str, fields: I) -> Result<i64>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<WireValue>,
    {
        let message = self.make(kind, fields)?;
        let frame = build_frame(&message.encode()?);
        let id = self.track(message);
        self.outbox.push_back(frame);
        Ok(id)
    }

    /// Write every queued message.
    pub async fn flush(&mut self) {
        if let Err(err) = self.write_outbox().await {
            tracing::warn!("Write failed, ending session: {}", err);
            let update = self.disconnect_update();
            self.handle(update).await;
        }
    }

    async fn write_outbox(&mut self) -> Result<()> {
        if self.outbox.is_empty() {
            return Ok(());
        }
        let batch: Vec<Bytes> = self.outbox.drain(..).collect();
        match self.transport.as_mut() {
            Some(transport) => write_batch(transport, &batch).await,
            None => {
                tracing::debug!("Dropping {} queued messages, no transport", batch.len());
                Ok(())
            }
        }
    }

    // ========================================================================
    // Incoming
    // ========================================================================

    /// Read once and return the text of every frame completed by the read.
    ///
    /// With a timeout, an expired wait returns no frames. A closed or failed
    /// transport, or a frame over the size limit, appends a synthesized
    /// `disconnect` attributed to the server.
    pub async fn recv_raw(&mut self, timeout: Option<Duration>) -> Result<Vec<String>> {
        let transport = self.transport.as_mut().ok_or(LichatError::NotConnected)?;
        let read = transport.read(&mut self.read_buf);
        let result = match timeout {
            Some(timeout) => match tokio::time::timeout(timeout, read).await {
                Ok(result) => result,
                Err(_) => return Ok(Vec::new()),
            },
            None => read.await,
        };

        let mut texts = Vec::new();
        let errored = match result {
            Ok(0) => {
                tracing::debug!("Transport closed by peer");
                true
            }
            Ok(n) => match self.frames.push(&self.read_buf[..n]) {
                Ok(frames) => {
                    for frame in frames {
                        match frame.text() {
                            Ok(text) => texts.push(text.to_string()),
                            Err(err) => tracing::warn!("Dropping frame with invalid UTF-8: {}", err),
                        }
                    }
                    false
                }
                Err(err) => {
                    tracing::error!("{}", err);
                    true
                }
            },
            Err(err) => {
                tracing::warn!("Read failed: {}", err);
                true
            }
        };

        if errored {
            texts.push(self.disconnect_update().encode()?);
        }
        Ok(texts)
    }

    /// Read once and decode the completed frames.
    ///
    /// Frames that do not decode to a known kind are dropped.
    pub async fn recv(&mut self, timeout: Option<Duration>) -> Result<Vec<Message>> {
        let texts = self.recv_raw(timeout).await?;
        Ok(texts
            .iter()
            .filter_map(|text| match self.registry.decode_message(text) {
                Ok(message) => Some(message),
                Err(err) => {
                    tracing::debug!("Dropping frame {:?}: {}", text, err);
                    None
                }
            })
            .collect())
    }

    /// `disconnect` standing in for a transport failure.
    fn disconnect_update(&self) -> Message {
        let mut message = Message::with_defaults(self.tags.disconnect.clone());
        // Both fields exist on every kind.
        let _ = message.set("id", Some(WireValue::Integer(0)));
        if let Some(servername) = &self.servername {
            let _ = message.set("from", Some(WireValue::string(servername.clone())));
        }
        message
    }

    // ========================================================================
    // Dispatch
    // ========================================================================

    /// Dispatch a message to the callback, built-in, and registered handlers,
    /// then write whatever they queued.
    pub async fn handle(&mut self, message: Message) {
        let mut pending = VecDeque::from([message]);
        while let Some(message) = pending.pop_front() {
            self.dispatch(&message);
            if let Err(err) = self.write_outbox().await {
                tracing::warn!("Write failed, ending session: {}", err);
                self.outbox.clear();
                pending.push_back(self.disconnect_update());
            }
        }
    }

    fn dispatch(&mut self, message: &Message) {
        let correlation = self.correlation_id(message);
        if let Some(id) = correlation {
            if let Some((sent, callback)) = self.handlers.take_callback(id) {
                callback(self, &sent, message);
            }
        }

        self.run_builtin(message);
        for handler in self.handlers.handlers_for(message.tag()) {
            handler(self, message);
        }

        if let Some(id) = correlation {
            self.in_flight.remove(&id);
        }
        self.sweep_in_flight();
    }

    /// Id of the request a message answers, if any.
    fn correlation_id(&self, message: &Message) -> Option<i64> {
        if self.is_self(message.from()) {
            message.id()
        } else if message.kind().has_field("update-id") {
            message.get_integer("update-id")
        } else {
            None
        }
    }

    /// Forget requests older than `stale_after` by the local clock, along
    /// with their callbacks.
    fn sweep_in_flight(&mut self) {
        let now = self.clock.now();
        let stale_after = self.config.stale_after;
        let before = self.in_flight.len();
        self.in_flight
            .retain(|_, sent| sent.clock().map_or(true, |clock| now.saturating_sub(clock) <= stale_after));
        let pruned = before - self.in_flight.len();
        if pruned > 0 {
            tracing::debug!("Pruned {} stale in-flight requests", pruned);
        }
        let in_flight = &self.in_flight;
        self.handlers.retain_callbacks(|id| in_flight.contains_key(&id));
    }

    /// Receive and handle messages until the session ends.
    pub async fn run(&mut self) -> Result<()> {
        while self.connected {
            for message in self.recv(Some(RUN_POLL_INTERVAL)).await? {
                self.handle(message).await;
            }
        }
        Ok(())
    }

    /// Register a handler for one protocol kind.
    pub fn on<F>(&mut self, kind: &str, handler: F) -> Result<()>
    where
        F: Fn(&mut Client, &Message) + Send + Sync + 'static,
    {
        let tag = self.registry.tag(kind)?;
        self.handlers.register(tag, handler);
        Ok(())
    }

    /// Register a handler for every kind.
    pub fn on_any<F>(&mut self, handler: F)
    where
        F: Fn(&mut Client, &Message) + Send + Sync + 'static,
    {
        self.handlers.register_any(handler);
    }

    // ========================================================================
    // State
    // ========================================================================

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    /// Name of the server, learned from the first join it sends.
    pub fn servername(&self) -> Option<&str> {
        self.servername.as_deref()
    }

    /// Extensions both sides agreed on.
    pub fn extensions(&self) -> &[String] {
        &self.extensions
    }

    pub fn is_supported(&self, extension: &str) -> bool {
        let extension = fold(extension);
        self.extensions.iter().any(|e| *e == extension)
    }

    /// The request a response answers, while the response is being handled.
    pub fn origin(&self, message: &Message) -> Option<&Message> {
        let id = if message.kind().has_field("update-id") {
            message.get_integer("update-id")
        } else {
            message.id()
        };
        id.and_then(|id| self.in_flight.get(&id))
    }

    pub fn is_in_flight(&self, id: i64) -> bool {
        self.in_flight.contains_key(&id)
    }

    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }

    pub fn channels(&self) -> &CaseInsensitiveMap<Channel> {
        &self.channels
    }

    pub fn channel(&self, name: &str) -> Option<&Channel> {
        self.channels.get(name)
    }

    pub fn active_channel(&self) -> Option<&Channel> {
        self.active_channel
            .as_deref()
            .and_then(|name| self.channels.get(name))
    }

    /// Make a joined channel the active one.
    pub fn set_active_channel(&mut self, name: &str) -> bool {
        match self.channels.get(name) {
            Some(channel) => {
                self.active_channel = Some(channel.name().to_string());
                true
            }
            None => false,
        }
    }

    pub fn emotes(&self) -> &CaseInsensitiveMap<Emote> {
        &self.emotes
    }

    pub fn emote(&self, name: &str) -> Option<&Emote> {
        self.emotes.get(name)
    }

    /// Cache an emote, e.g. one loaded from disk.
    pub fn insert_emote(&mut self, emote: Emote) {
        let name = emote.name.clone();
        self.emotes.insert(&name, emote);
    }
}
