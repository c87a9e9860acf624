//! Namespace-qualified symbol interning.
//!
//! Symbols are the identifiers of the wire protocol: kind tags, field keywords,
//! and bare tokens. A [`SymbolTable`] guarantees that interning the same
//! `(namespace, name)` pair twice yields the same [`Symbol`], so symbols can be
//! used as map keys and dispatch tags.
//!
//! Namespace and name lookups are case-insensitive using full case folding.
//!
//! # Example
//!
//! ```
//! use lichat_client::symbol::{SymbolTable, DEFAULT_NAMESPACE};
//!
//! let table = SymbolTable::with_defaults();
//! let a = table.intern("Join", DEFAULT_NAMESPACE);
//! let b = table.intern("jOIN", DEFAULT_NAMESPACE);
//! assert_eq!(a, b);
//! assert_eq!(a.name(), "Join");
//! ```

use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, PoisonError, RwLock};

use crate::error::{LichatError, Result};

/// Namespace that bare tokens intern into.
pub const DEFAULT_NAMESPACE: &str = "lichat";

/// Namespace of `:name` tokens.
pub const KEYWORD_NAMESPACE: &str = "keyword";

/// Case-fold a string for identity comparison.
///
/// Upper-casing first expands characters such as `ß` to `SS`, which the
/// following lower-casing turns into the folded `ss`.
pub fn fold(s: &str) -> String {
    s.to_uppercase().to_lowercase()
}

struct SymbolData {
    namespace: Arc<str>,
    key: String,
    name: String,
}

/// An interned, namespace-qualified identifier.
///
/// Cheap to clone. Equality and hashing use the folded namespace and name.
#[derive(Clone)]
pub struct Symbol(Arc<SymbolData>);

impl Symbol {
    /// Folded namespace name.
    #[inline]
    pub fn namespace(&self) -> &str {
        &self.0.namespace
    }

    /// Name as first interned, for display.
    #[inline]
    pub fn name(&self) -> &str {
        &self.0.name
    }

    /// Folded name used for lookups.
    #[inline]
    pub fn key(&self) -> &str {
        &self.0.key
    }

    /// Whether this symbol lives in the keyword namespace.
    #[inline]
    pub fn is_keyword(&self) -> bool {
        &*self.0.namespace == KEYWORD_NAMESPACE
    }
}

impl PartialEq for Symbol {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
            || (self.0.namespace == other.0.namespace && self.0.key == other.0.key)
    }
}

impl Eq for Symbol {}

impl Hash for Symbol {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.namespace.hash(state);
        self.0.key.hash(state);
    }
}

impl std::fmt::Debug for Symbol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.0.namespace, self.0.name)
    }
}

impl std::fmt::Display for Symbol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.0.namespace, self.0.name)
    }
}

struct Namespace {
    name: Arc<str>,
    symbols: HashMap<String, Symbol>,
}

/// Table of namespaces, each mapping folded names to symbols.
///
/// Populated during schema loading and append-only afterwards. Interior
/// locking lets a table be shared behind an `Arc` between the codec and the
/// schema registry.
#[derive(Default)]
pub struct SymbolTable {
    namespaces: RwLock<HashMap<String, Namespace>>,
}

impl SymbolTable {
    /// Create an empty table with no namespaces.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a table with the protocol and keyword namespaces defined.
    pub fn with_defaults() -> Self {
        let table = Self::new();
        table.define_namespace(DEFAULT_NAMESPACE);
        table.define_namespace(KEYWORD_NAMESPACE);
        table
    }

    /// Define a namespace. Idempotent; returns the folded name.
    pub fn define_namespace(&self, name: &str) -> String {
        let key = fold(name);
        let mut namespaces = self.namespaces.write().unwrap_or_else(PoisonError::into_inner);
        namespaces.entry(key.clone()).or_insert_with(|| Namespace {
            name: Arc::from(key.as_str()),
            symbols: HashMap::new(),
        });
        key
    }

    /// Whether a namespace of that name exists.
    pub fn has_namespace(&self, name: &str) -> bool {
        let namespaces = self.namespaces.read().unwrap_or_else(PoisonError::into_inner);
        namespaces.contains_key(&fold(name))
    }

    /// Return the canonical symbol for `(name, namespace)`, creating the
    /// namespace and the symbol if absent.
    pub fn intern(&self, name: &str, namespace: &str) -> Symbol {
        if let Ok(symbol) = self.find(name, namespace) {
            return symbol;
        }

        let ns_key = fold(namespace);
        let key = fold(name);
        let mut namespaces = self.namespaces.write().unwrap_or_else(PoisonError::into_inner);
        let ns = namespaces.entry(ns_key.clone()).or_insert_with(|| Namespace {
            name: Arc::from(ns_key.as_str()),
            symbols: HashMap::new(),
        });
        let ns_name = ns.name.clone();
        ns.symbols
            .entry(key.clone())
            .or_insert_with(|| {
                Symbol(Arc::new(SymbolData {
                    namespace: ns_name,
                    key,
                    name: name.to_string(),
                }))
            })
            .clone()
    }

    /// Look up an existing symbol without creating anything.
    pub fn find(&self, name: &str, namespace: &str) -> Result<Symbol> {
        let namespaces = self.namespaces.read().unwrap_or_else(PoisonError::into_inner);
        let ns = namespaces
            .get(&fold(namespace))
            .ok_or_else(|| LichatError::NotFound(format!("namespace {}", namespace)))?;
        ns.symbols
            .get(&fold(name))
            .cloned()
            .ok_or_else(|| LichatError::NotFound(format!("symbol {}:{}", namespace, name)))
    }

    /// Intern into the keyword namespace.
    pub fn keyword(&self, name: &str) -> Symbol {
        self.intern(name, KEYWORD_NAMESPACE)
    }

    /// Intern into the protocol namespace.
    pub fn protocol(&self, name: &str) -> Symbol {
        self.intern(name, DEFAULT_NAMESPACE)
    }

    /// Remove a namespace and all its symbols. Returns whether it existed.
    pub fn undefine_namespace(&self, name: &str) -> bool {
        let mut namespaces = self.namespaces.write().unwrap_or_else(PoisonError::into_inner);
        namespaces.remove(&fold(name)).is_some()
    }

    /// Remove a single symbol from its namespace. Returns whether it existed.
    pub fn unintern(&self, symbol: &Symbol) -> bool {
        let mut namespaces = self.namespaces.write().unwrap_or_else(PoisonError::into_inner);
        namespaces
            .get_mut(symbol.namespace())
            .map(|ns| ns.symbols.remove(symbol.key()).is_some())
            .unwrap_or(false)
    }
}
