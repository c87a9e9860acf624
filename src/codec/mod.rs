//! Codec module - the textual wire grammar.
//!
//! - [`WireValue`] - integers, decimals, strings, booleans, symbols, lists
//! - [`Reader`] - bounded, streaming-aware decoding with symbol interning
//! - [`encode`] - printing, the inverse of the reader
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use lichat_client::codec::{encode, Reader, WireValue};
//! use lichat_client::symbol::SymbolTable;
//!
//! let reader = Reader::new(Arc::new(SymbolTable::with_defaults()));
//! let value = reader.decode_str("(ping :id 1)").unwrap();
//! assert_eq!(encode(&value).unwrap(), "(ping :id 1)");
//! ```

mod printer;
mod reader;
mod value;

pub use printer::{encode, encode_into, format_decimal};
pub use reader::{Reader, LEGACY_NAMESPACE};
pub use value::WireValue;
