//! # lichat-client
//!
//! Rust client engine for the Lichat 2.0 chat protocol.
//!
//! ## Architecture
//!
//! - **Wire codec**: a small S-expression grammar of lists, strings, numbers
//!   and namespaced symbols, printed and read by [`codec`]
//! - **Framing**: each message is UTF-8 wire text followed by a NUL byte
//! - **Schema**: message kinds are composable field sets loaded from a
//!   declarative description ([`schema`])
//! - **Session**: [`Client`] performs the handshake, dispatches incoming
//!   messages to handlers and correlates requests with their responses
//!
//! ## Example
//!
//! ```ignore
//! use lichat_client::Client;
//!
//! #[tokio::main]
//! async fn main() -> lichat_client::Result<()> {
//!     let mut client = Client::builder()
//!         .username("alice")
//!         .on("message", |_client, message| {
//!             println!("{}: {}", message.from().unwrap_or("?"), message.text().unwrap_or(""));
//!         })
//!         .build()?;
//!
//!     client.connect("localhost", None).await?;
//!     client.run().await
//! }
//! ```

pub mod clock;
pub mod codec;
pub mod config;
pub mod error;
pub mod handler;
pub mod protocol;
pub mod schema;
pub mod symbol;
pub mod toolkit;
pub mod transport;

mod client;
mod writer;

pub use client::{Channel, Client, ClientBuilder, Emote, RUN_POLL_INTERVAL};
pub use config::{ClientConfig, PROTOCOL_VERSION};
pub use error::{ConnectFailure, LichatError, Result};
pub use schema::{Message, Registry};
