//! Case-insensitive collections for channel, user, and emote names.
//!
//! Keys are compared after [`fold`](crate::symbol::fold); the spelling of the
//! most recent insert is kept for display. Iteration is in folded-key order,
//! which keeps "first entry" choices deterministic.

use std::collections::BTreeMap;

use crate::symbol::fold;

/// Map whose string keys ignore case.
#[derive(Debug, Clone)]
pub struct CaseInsensitiveMap<V> {
    data: BTreeMap<String, (String, V)>,
}

impl<V> Default for CaseInsensitiveMap<V> {
    fn default() -> Self {
        Self {
            data: BTreeMap::new(),
        }
    }
}

impl<V> CaseInsensitiveMap<V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.data.contains_key(&fold(key))
    }

    pub fn get(&self, key: &str) -> Option<&V> {
        self.data.get(&fold(key)).map(|(_, v)| v)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut V> {
        self.data.get_mut(&fold(key)).map(|(_, v)| v)
    }

    /// Insert, returning the previous value under the same folded key.
    pub fn insert(&mut self, key: &str, value: V) -> Option<V> {
        self.data
            .insert(fold(key), (key.to_string(), value))
            .map(|(_, v)| v)
    }

    pub fn remove(&mut self, key: &str) -> Option<V> {
        self.data.remove(&fold(key)).map(|(_, v)| v)
    }

    pub fn clear(&mut self) {
        self.data.clear();
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Keys in their display spelling.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.data.values().map(|(k, _)| k.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.data.values().map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &V)> {
        self.data.values().map(|(k, v)| (k.as_str(), v))
    }
}

/// Set of strings that ignores case.
#[derive(Debug, Clone, Default)]
pub struct CaseInsensitiveSet {
    data: BTreeMap<String, String>,
}

impl CaseInsensitiveSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, item: &str) -> bool {
        self.data.contains_key(&fold(item))
    }

    /// Add an item. Returns whether it was newly added.
    pub fn insert(&mut self, item: &str) -> bool {
        self.data.insert(fold(item), item.to_string()).is_none()
    }

    /// Remove an item. Returns whether it was present.
    pub fn remove(&mut self, item: &str) -> bool {
        self.data.remove(&fold(item)).is_some()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.data.values().map(String::as_str)
    }
}
