//! Local records of channels and emotes.

use crate::toolkit::{CaseInsensitiveMap, CaseInsensitiveSet};

/// A channel the session has joined.
///
/// Holds the member set and the key/value info stored by servers with the
/// `shirakumo-channel-info` extension. Info keys are symbol names without
/// their namespace, e.g. `topic` for `:topic`.
#[derive(Debug, Clone)]
pub struct Channel {
    name: String,
    users: CaseInsensitiveSet,
    info: CaseInsensitiveMap<String>,
}

impl Channel {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            users: CaseInsensitiveSet::new(),
            info: CaseInsensitiveMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Private channels are named with a leading `@`.
    pub fn is_private(&self) -> bool {
        self.name.starts_with('@')
    }

    pub fn users(&self) -> &CaseInsensitiveSet {
        &self.users
    }

    pub fn has_user(&self, user: &str) -> bool {
        self.users.contains(user)
    }

    pub fn join(&mut self, user: &str) {
        self.users.insert(user);
    }

    pub fn leave(&mut self, user: &str) {
        self.users.remove(user);
    }

    pub fn info(&self, key: &str) -> Option<&str> {
        self.info.get(key).map(String::as_str)
    }

    pub fn set_info(&mut self, key: &str, value: impl Into<String>) {
        self.info.insert(key, value.into());
    }

    pub fn info_entries(&self) -> impl Iterator<Item = (&str, &str)> {
        self.info.iter().map(|(k, v)| (k, v.as_str()))
    }
}

/// An emote image received from the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Emote {
    pub name: String,
    /// MIME type, e.g. `image/png`.
    pub content_type: String,
    pub payload: Vec<u8>,
}

impl Emote {
    pub fn new(name: &str, content_type: &str, payload: Vec<u8>) -> Self {
        Self {
            name: name.to_string(),
            content_type: content_type.to_string(),
            payload,
        }
    }
}
