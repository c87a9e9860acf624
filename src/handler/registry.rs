//! Handler registry for dispatching messages by exact kind.
//!
//! Handlers registered for a kind only see messages of exactly that kind;
//! composition is ignored. Wildcard handlers see every message, after the
//! exact-kind ones.

use std::collections::HashMap;
use std::sync::Arc;

use crate::schema::Message;
use crate::symbol::Symbol;
use crate::Client;

/// Handler invoked for every matching incoming message.
pub type Handler = Arc<dyn Fn(&mut Client, &Message) + Send + Sync>;

/// One-shot callback receiving the original request and its response.
pub type Callback = Box<dyn FnOnce(&mut Client, &Message, &Message) + Send>;

/// Pending one-shot callback.
struct CallbackEntry {
    /// The message that was sent.
    sent: Message,
    callback: Callback,
}

/// Registry mapping kinds to handlers.
#[derive(Default)]
pub struct HandlerRegistry {
    /// Handlers by exact kind tag, in registration order.
    by_kind: HashMap<Symbol, Vec<Handler>>,
    /// Handlers for every kind.
    wildcard: Vec<Handler>,
    /// One-shot callbacks by correlation id.
    callbacks: HashMap<i64, CallbackEntry>,
}

impl HandlerRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for one kind.
    pub fn register<F>(&mut self, tag: Symbol, handler: F)
    where
        F: Fn(&mut Client, &Message) + Send + Sync + 'static,
    {
        self.insert(tag, Arc::new(handler));
    }

    pub(crate) fn insert(&mut self, tag: Symbol, handler: Handler) {
        self.by_kind.entry(tag).or_default().push(handler);
    }

    /// Register a handler for every kind.
    pub fn register_any<F>(&mut self, handler: F)
    where
        F: Fn(&mut Client, &Message) + Send + Sync + 'static,
    {
        self.wildcard.push(Arc::new(handler));
    }

    /// Handlers for exactly this kind followed by the wildcard handlers.
    ///
    /// Returns clones so the caller can invoke them while mutating the session.
    pub fn handlers_for(&self, tag: &Symbol) -> Vec<Handler> {
        self.by_kind
            .get(tag)
            .into_iter()
            .flatten()
            .chain(&self.wildcard)
            .cloned()
            .collect()
    }

    /// Number of handlers registered for exactly this kind.
    pub fn count_for(&self, tag: &Symbol) -> usize {
        self.by_kind.get(tag).map(Vec::len).unwrap_or(0)
    }

    /// Number of wildcard handlers.
    pub fn wildcard_count(&self) -> usize {
        self.wildcard.len()
    }

    /// Register a one-shot callback for a correlation id.
    pub fn add_callback(&mut self, id: i64, sent: Message, callback: Callback) {
        self.callbacks.insert(id, CallbackEntry { sent, callback });
    }

    /// Remove and return the callback for a correlation id.
    pub fn take_callback(&mut self, id: i64) -> Option<(Message, Callback)> {
        self.callbacks
            .remove(&id)
            .map(|entry| (entry.sent, entry.callback))
    }

    pub fn has_callback(&self, id: i64) -> bool {
        self.callbacks.contains_key(&id)
    }

    /// Keep only the callbacks whose correlation id passes `keep`.
    pub fn retain_callbacks<F>(&mut self, mut keep: F)
    where
        F: FnMut(i64) -> bool,
    {
        self.callbacks.retain(|id, _| keep(*id));
    }

    /// Drop every pending callback.
    pub fn clear_callbacks(&mut self) {
        self.callbacks.clear();
    }
}
