//! Kind registry: declaration, composition, and instantiation.
//!
//! Kinds are declared with a tag, parent tags, and their own field defaults.
//! The full field set of a kind is the deduplicated union of the base fields,
//! every parent's fields, and its own, computed when the kind is declared.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use lichat_client::codec::WireValue;
//! use lichat_client::schema::Registry;
//! use lichat_client::symbol::SymbolTable;
//!
//! let mut registry = Registry::new(Arc::new(SymbolTable::with_defaults()));
//! let symbols = registry.symbols().clone();
//! registry
//!     .define_kind(symbols.protocol("channel-update"), &[], vec![("channel", None)])
//!     .unwrap();
//! registry
//!     .define_kind::<&str>(symbols.protocol("join"), &[symbols.protocol("channel-update")], vec![])
//!     .unwrap();
//!
//! let join = registry.make("join", [("channel", "lounge")]).unwrap();
//! assert_eq!(join.channel(), Some("lounge"));
//! assert_eq!(join.encode().unwrap(), "(join :channel \"lounge\")");
//! ```

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use super::kind::{FieldDef, Kind, Message, BASE_FIELDS};
use crate::codec::{Reader, WireValue};
use crate::error::{LichatError, Result};
use crate::symbol::{fold, Symbol, SymbolTable, DEFAULT_NAMESPACE};

/// Empty field list for [`Registry::instantiate`] and [`Registry::make`].
pub const NO_FIELDS: [(&str, WireValue); 0] = [];

/// Kind as declared, before composition.
#[derive(Debug, Clone)]
struct Declaration {
    parents: Vec<Symbol>,
    fields: Vec<(String, Option<WireValue>)>,
}

/// Registry of every known message kind plus the supported extension set.
///
/// Built once at startup and then shared read-only, usually behind an `Arc`.
pub struct Registry {
    reader: Reader,
    declarations: HashMap<Symbol, Declaration>,
    /// Tags in declaration order.
    order: Vec<Symbol>,
    kinds: HashMap<Symbol, Arc<Kind>>,
    extensions: Vec<String>,
}

impl Registry {
    /// Create an empty registry over the given symbol table.
    pub fn new(symbols: Arc<SymbolTable>) -> Self {
        Self {
            reader: Reader::new(symbols),
            declarations: HashMap::new(),
            order: Vec::new(),
            kinds: HashMap::new(),
            extensions: Vec::new(),
        }
    }

    /// The symbol table kinds and keywords are interned into.
    pub fn symbols(&self) -> &Arc<SymbolTable> {
        self.reader.symbols()
    }

    /// Reader used for wire text and schema descriptions.
    pub fn reader(&self) -> &Reader {
        &self.reader
    }

    /// Mutable reader access, e.g. to adjust the namespace remap table.
    pub fn reader_mut(&mut self) -> &mut Reader {
        &mut self.reader
    }

    /// Declare a kind.
    ///
    /// Redeclaring an existing tag replaces it.
    ///
    /// # Errors
    ///
    /// Returns [`LichatError::UnknownKind`] if a parent is not declared.
    pub fn define_kind<S>(
        &mut self,
        tag: Symbol,
        parents: &[Symbol],
        field_defaults: Vec<(S, Option<WireValue>)>,
    ) -> Result<Arc<Kind>>
    where
        S: AsRef<str>,
    {
        for parent in parents {
            if !self.declarations.contains_key(parent) {
                return Err(LichatError::UnknownKind(parent.name().to_string()));
            }
        }

        let fields = field_defaults
            .into_iter()
            .map(|(name, default)| (fold(name.as_ref()), default))
            .collect();
        let declaration = Declaration {
            parents: parents.to_vec(),
            fields,
        };
        if self.declarations.insert(tag.clone(), declaration).is_none() {
            self.order.push(tag.clone());
            let kind = Arc::new(self.compose(&tag)?);
            self.kinds.insert(tag, kind.clone());
            Ok(kind)
        } else {
            self.rebuild()?;
            self.kinds
                .get(&tag)
                .cloned()
                .ok_or_else(|| LichatError::UnknownKind(tag.name().to_string()))
        }
    }

    /// Add parents and fields to an already declared kind.
    ///
    /// Kinds composed from it pick up the additions as well.
    pub fn extend_kind<S>(
        &mut self,
        tag: &Symbol,
        parents: &[Symbol],
        field_defaults: Vec<(S, Option<WireValue>)>,
    ) -> Result<Arc<Kind>>
    where
        S: AsRef<str>,
    {
        for parent in parents {
            if !self.declarations.contains_key(parent) {
                return Err(LichatError::UnknownKind(parent.name().to_string()));
            }
        }
        let declaration = self
            .declarations
            .get_mut(tag)
            .ok_or_else(|| LichatError::UnknownKind(tag.name().to_string()))?;

        for parent in parents {
            if !declaration.parents.contains(parent) {
                declaration.parents.push(parent.clone());
            }
        }
        for (name, default) in field_defaults {
            let name = fold(name.as_ref());
            match declaration.fields.iter_mut().find(|(n, _)| *n == name) {
                Some(existing) => existing.1 = default,
                None => declaration.fields.push((name, default)),
            }
        }

        self.rebuild()?;
        self.kinds
            .get(tag)
            .cloned()
            .ok_or_else(|| LichatError::UnknownKind(tag.name().to_string()))
    }

    /// Recompose every kind from its declaration.
    fn rebuild(&mut self) -> Result<()> {
        self.kinds.clear();
        for tag in self.order.clone() {
            self.resolve(&tag, &mut HashSet::new())?;
        }
        Ok(())
    }

    fn resolve(&mut self, tag: &Symbol, visiting: &mut HashSet<Symbol>) -> Result<Arc<Kind>> {
        if let Some(kind) = self.kinds.get(tag) {
            return Ok(kind.clone());
        }
        if !visiting.insert(tag.clone()) {
            return Err(LichatError::Schema(format!(
                "kind {} inherits from itself",
                tag.name()
            )));
        }
        let parents = self
            .declarations
            .get(tag)
            .map(|d| d.parents.clone())
            .ok_or_else(|| LichatError::UnknownKind(tag.name().to_string()))?;
        for parent in &parents {
            self.resolve(parent, visiting)?;
        }
        let kind = Arc::new(self.compose(tag)?);
        self.kinds.insert(tag.clone(), kind.clone());
        Ok(kind)
    }

    /// Compose a kind whose parents are already composed.
    fn compose(&self, tag: &Symbol) -> Result<Kind> {
        let declaration = self
            .declarations
            .get(tag)
            .ok_or_else(|| LichatError::UnknownKind(tag.name().to_string()))?;
        let symbols = self.symbols();

        let mut fields: Vec<FieldDef> = BASE_FIELDS
            .iter()
            .map(|name| FieldDef {
                name: (*name).to_string(),
                keyword: symbols.keyword(name),
                default: None,
            })
            .collect();
        let mut ancestors = HashSet::new();

        for parent in &declaration.parents {
            let parent_kind = self
                .kinds
                .get(parent)
                .ok_or_else(|| LichatError::UnknownKind(parent.name().to_string()))?;
            ancestors.insert(parent.clone());
            ancestors.extend(parent_kind.ancestors.iter().cloned());
            for field in &parent_kind.fields {
                if !fields.iter().any(|f| f.name == field.name) {
                    fields.push(field.clone());
                }
            }
        }

        for (name, default) in &declaration.fields {
            match fields.iter_mut().find(|f| f.name == *name) {
                Some(existing) => existing.default = default.clone(),
                None => fields.push(FieldDef {
                    name: name.clone(),
                    keyword: symbols.keyword(name),
                    default: default.clone(),
                }),
            }
        }

        Ok(Kind {
            tag: tag.clone(),
            parents: declaration.parents.clone(),
            ancestors,
            fields,
        })
    }

    /// Look up a kind by tag.
    pub fn kind(&self, tag: &Symbol) -> Option<&Arc<Kind>> {
        self.kinds.get(tag)
    }

    /// Look up a kind by name in the protocol namespace.
    pub fn kind_named(&self, name: &str) -> Result<Arc<Kind>> {
        self.symbols()
            .find(name, DEFAULT_NAMESPACE)
            .ok()
            .and_then(|tag| self.kinds.get(&tag).cloned())
            .ok_or_else(|| LichatError::UnknownKind(name.to_string()))
    }

    /// Tag symbol of a protocol kind.
    pub fn tag(&self, name: &str) -> Result<Symbol> {
        self.kind_named(name).map(|kind| kind.tag.clone())
    }

    /// Every registered kind.
    pub fn kinds(&self) -> impl Iterator<Item = &Arc<Kind>> {
        self.order.iter().filter_map(|tag| self.kinds.get(tag))
    }

    /// Whether `tag` is `ancestor` or composed from it.
    pub fn is_subkind(&self, tag: &Symbol, ancestor: &Symbol) -> bool {
        self.kinds
            .get(tag)
            .map(|kind| kind.is_a(ancestor))
            .unwrap_or(false)
    }

    /// Build a message of the given kind.
    ///
    /// Fields not provided take the kind's default.
    ///
    /// # Errors
    ///
    /// [`LichatError::UnknownKind`] for an unregistered tag,
    /// [`LichatError::UnknownField`] for a field the kind does not declare.
    pub fn instantiate<I, K, V>(&self, tag: &Symbol, provided: I) -> Result<Message>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<WireValue>,
    {
        let kind = self
            .kinds
            .get(tag)
            .cloned()
            .ok_or_else(|| LichatError::UnknownKind(tag.name().to_string()))?;
        let mut message = Message::with_defaults(kind);
        for (field, value) in provided {
            message.set(field.as_ref(), Some(value.into()))?;
        }
        Ok(message)
    }

    /// [`instantiate`](Self::instantiate) by protocol kind name.
    pub fn make<I, K, V>(&self, name: &str, provided: I) -> Result<Message>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<WireValue>,
    {
        let tag = self.tag(name)?;
        self.instantiate(&tag, provided)
    }

    /// Build a message from the flat keyword/value items that follow the tag
    /// in a wire list.
    pub fn instantiate_from_wire_list(&self, tag: &Symbol, flat: &[WireValue]) -> Result<Message> {
        if flat.len() % 2 != 0 {
            return Err(LichatError::parse(0, "odd number of property items"));
        }
        let mut pairs = Vec::with_capacity(flat.len() / 2);
        for pair in flat.chunks_exact(2) {
            let key = pair[0]
                .as_symbol()
                .ok_or_else(|| LichatError::parse(0, "property key is not a symbol"))?;
            pairs.push((key.key().to_string(), pair[1].clone()));
        }
        self.instantiate(tag, pairs)
    }

    /// Build a message from a decoded wire list `(tag :key value ...)`.
    pub fn message_from_wire(&self, value: &WireValue) -> Result<Message> {
        let items = value
            .as_list()
            .ok_or_else(|| LichatError::parse(0, "update is not a list"))?;
        let (head, rest) = items
            .split_first()
            .ok_or_else(|| LichatError::parse(0, "update list is empty"))?;
        let tag = head
            .as_symbol()
            .ok_or_else(|| LichatError::parse(0, "update tag is not a symbol"))?;
        self.instantiate_from_wire_list(tag, rest)
    }

    /// Decode wire text into a message.
    pub fn decode_message(&self, text: &str) -> Result<Message> {
        let value = self.reader.decode_str(text)?;
        self.message_from_wire(&value)
    }

    /// Extensions this registry supports, in load order.
    pub fn extensions(&self) -> &[String] {
        &self.extensions
    }

    /// Record an extension as supported.
    pub fn add_extension(&mut self, name: &str) {
        let name = fold(name);
        if !self.extensions.contains(&name) {
            self.extensions.push(name);
        }
    }
}
