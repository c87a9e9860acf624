//! Handler module - dispatch tables for incoming messages.
//!
//! Provides:
//! - [`HandlerRegistry`] - exact-kind handler lists, a wildcard list, and
//!   one-shot callbacks keyed by correlation id
//! - [`Handler`] / [`Callback`] - the function shapes stored in it
//!
//! # Example
//!
//! ```
//! use lichat_client::Client;
//!
//! let client = Client::builder()
//!     .on("message", |_client, message| {
//!         println!("{}: {}", message.from().unwrap_or("?"), message.text().unwrap_or(""));
//!     })
//!     .on_any(|_client, message| println!("got {}", message.kind().name()))
//!     .build()
//!     .unwrap();
//! # let _ = client;
//! ```

mod registry;

pub use registry::{Callback, Handler, HandlerRegistry};
