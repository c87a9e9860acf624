//! The universal value domain of the wire grammar.

use crate::symbol::Symbol;

/// A parsed or to-be-printed wire value.
///
/// Absence is not a value: message fields that are absent are `None` at the
/// field level and are omitted from the wire entirely.
///
/// Numbers are machine-sized. An integer literal outside the `i64` range is
/// rejected by the reader with a parse error, and a decimal literal keeps
/// only the precision of an `f64` (about 17 significant digits).
#[derive(Debug, Clone, PartialEq)]
pub enum WireValue {
    /// Run of ASCII digits, optionally negative. Limited to `i64`.
    Integer(i64),
    /// Fixed-point decimal literal, printed without exponent. Rounded to
    /// the nearest `f64`.
    Decimal(f64),
    /// Double-quoted string.
    String(String),
    /// `T` or `NIL`.
    Bool(bool),
    /// Interned, namespace-qualified token.
    Symbol(Symbol),
    /// Parenthesized sequence.
    List(Vec<WireValue>),
}

impl WireValue {
    /// Build a string value.
    pub fn string(s: impl Into<String>) -> Self {
        Self::String(s.into())
    }

    /// Build a list of strings.
    pub fn strings<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::List(items.into_iter().map(|s| Self::String(s.into())).collect())
    }

    /// An empty list.
    pub fn empty_list() -> Self {
        Self::List(Vec::new())
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_decimal(&self) -> Option<f64> {
        match self {
            Self::Decimal(d) => Some(*d),
            Self::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_symbol(&self) -> Option<&Symbol> {
        match self {
            Self::Symbol(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[WireValue]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    /// Strings of a list value, skipping non-string items.
    pub fn string_items(&self) -> Vec<&str> {
        self.as_list()
            .map(|items| items.iter().filter_map(WireValue::as_str).collect())
            .unwrap_or_default()
    }
}

impl From<&str> for WireValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for WireValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<i64> for WireValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<f64> for WireValue {
    fn from(value: f64) -> Self {
        Self::Decimal(value)
    }
}

impl From<bool> for WireValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<Symbol> for WireValue {
    fn from(value: Symbol) -> Self {
        Self::Symbol(value)
    }
}

impl From<Vec<WireValue>> for WireValue {
    fn from(value: Vec<WireValue>) -> Self {
        Self::List(value)
    }
}
