//! Kind descriptors and message instances.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::codec::{encode, WireValue};
use crate::error::{LichatError, Result};
use crate::symbol::{fold, Symbol};

/// Fields every kind carries.
pub const BASE_FIELDS: [&str; 3] = ["id", "clock", "from"];

/// One declared field.
#[derive(Debug, Clone)]
pub struct FieldDef {
    /// Folded field name, e.g. `update-id`.
    pub name: String,
    /// Keyword used on the wire.
    pub keyword: Symbol,
    /// Value used when the field is not provided; `None` means absent.
    pub default: Option<WireValue>,
}

/// A message kind: tag, composition, and the full field list.
#[derive(Debug)]
pub struct Kind {
    pub(crate) tag: Symbol,
    pub(crate) parents: Vec<Symbol>,
    pub(crate) ancestors: HashSet<Symbol>,
    pub(crate) fields: Vec<FieldDef>,
}

impl Kind {
    /// Wire tag.
    #[inline]
    pub fn tag(&self) -> &Symbol {
        &self.tag
    }

    /// Tag name for display.
    #[inline]
    pub fn name(&self) -> &str {
        self.tag.name()
    }

    /// Direct parents, in declaration order.
    pub fn parents(&self) -> &[Symbol] {
        &self.parents
    }

    /// Every field, in wire order: base fields, inherited, then own.
    pub fn fields(&self) -> &[FieldDef] {
        &self.fields
    }

    /// Names of every field.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.field_index(name).is_some()
    }

    pub(crate) fn field_index(&self, name: &str) -> Option<usize> {
        let name = fold(name);
        self.fields.iter().position(|f| f.name == name)
    }

    /// Whether `ancestor` is this kind or one of its transitive parents.
    pub fn is_a(&self, ancestor: &Symbol) -> bool {
        &self.tag == ancestor || self.ancestors.contains(ancestor)
    }
}

/// A concrete message of some [`Kind`].
///
/// Holds a value slot for every field of its kind. Annotations are free-form
/// handler bookkeeping and never go on the wire.
#[derive(Debug, Clone)]
pub struct Message {
    kind: Arc<Kind>,
    values: Vec<Option<WireValue>>,
    annotations: HashMap<String, WireValue>,
}

impl Message {
    /// Build a message with every field at its default.
    pub(crate) fn with_defaults(kind: Arc<Kind>) -> Self {
        let values = kind.fields.iter().map(|f| f.default.clone()).collect();
        Self {
            kind,
            values,
            annotations: HashMap::new(),
        }
    }

    pub fn kind(&self) -> &Arc<Kind> {
        &self.kind
    }

    pub fn tag(&self) -> &Symbol {
        &self.kind.tag
    }

    /// Exact kind match; composition is ignored.
    pub fn is(&self, tag: &Symbol) -> bool {
        &self.kind.tag == tag
    }

    /// Value of a field, if present.
    pub fn get(&self, field: &str) -> Option<&WireValue> {
        self.kind
            .field_index(field)
            .and_then(|i| self.values[i].as_ref())
    }

    /// Set or clear a declared field.
    pub fn set(&mut self, field: &str, value: Option<WireValue>) -> Result<()> {
        let index = self
            .kind
            .field_index(field)
            .ok_or_else(|| LichatError::UnknownField {
                kind: self.kind.name().to_string(),
                field: field.to_string(),
            })?;
        self.values[index] = value;
        Ok(())
    }

    /// All fields with their values, in wire order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, Option<&WireValue>)> {
        self.kind
            .fields
            .iter()
            .zip(&self.values)
            .map(|(f, v)| (f.name.as_str(), v.as_ref()))
    }

    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.get(field).and_then(WireValue::as_str)
    }

    pub fn get_integer(&self, field: &str) -> Option<i64> {
        self.get(field).and_then(WireValue::as_integer)
    }

    pub fn id(&self) -> Option<i64> {
        self.get_integer("id")
    }

    pub fn clock(&self) -> Option<i64> {
        self.get_integer("clock")
    }

    pub fn from(&self) -> Option<&str> {
        self.get_str("from")
    }

    pub fn channel(&self) -> Option<&str> {
        self.get_str("channel")
    }

    pub fn text(&self) -> Option<&str> {
        self.get_str("text")
    }

    /// Attach handler bookkeeping data.
    pub fn annotate(&mut self, key: impl Into<String>, value: WireValue) {
        self.annotations.insert(key.into(), value);
    }

    pub fn annotation(&self, key: &str) -> Option<&WireValue> {
        self.annotations.get(key)
    }

    /// Wire form: the tag followed by keyword/value pairs for present fields.
    pub fn to_wire(&self) -> WireValue {
        let mut items = Vec::with_capacity(1 + self.values.len() * 2);
        items.push(WireValue::Symbol(self.kind.tag.clone()));
        for (field, value) in self.kind.fields.iter().zip(&self.values) {
            if let Some(value) = value {
                items.push(WireValue::Symbol(field.keyword.clone()));
                items.push(value.clone());
            }
        }
        WireValue::List(items)
    }

    /// Wire text of this message.
    pub fn encode(&self) -> Result<String> {
        encode(&self.to_wire())
    }
}
