//! Message Schema Registry.
//!
//! Every message kind is a named, composable field set. Kinds are declared
//! once at startup, usually from a schema description, and messages are
//! generic instances holding one value slot per field of their kind.
//!
//! [`Registry::lichat`] loads the bundled Lichat 2.0 catalogue.

mod kind;
mod loader;
mod registry;

pub use kind::{FieldDef, Kind, Message, BASE_FIELDS};
pub use registry::{Registry, NO_FIELDS};

use std::sync::Arc;

use crate::error::Result;
use crate::symbol::SymbolTable;

/// The bundled Lichat 2.0 schema description.
pub const LICHAT_SCHEMA: &str = include_str!("lichat.sexpr");

impl Registry {
    /// Registry holding the full Lichat 2.0 catalogue and its extensions.
    pub fn lichat() -> Result<Self> {
        Self::lichat_with(Arc::new(SymbolTable::with_defaults()))
    }

    /// [`lichat`](Self::lichat) over an existing symbol table.
    pub fn lichat_with(symbols: Arc<SymbolTable>) -> Result<Self> {
        let mut registry = Self::new(symbols);
        registry.load(LICHAT_SCHEMA)?;
        Ok(registry)
    }
}
