//! Transport module - the byte stream a session runs over.
//!
//! Any tokio stream that is readable, writable, and `Send` is a
//! [`Transport`]. TCP is built in; an encrypted stream (port 1112 by
//! convention) can be wrapped by the caller and handed to
//! [`Client::connect_with`](crate::Client::connect_with).

mod tcp;

pub use tcp::{connect_tcp, resolve_port, DEFAULT_PORT, DEFAULT_TLS_PORT};

use tokio::io::{AsyncRead, AsyncWrite};

/// A reliable, ordered byte stream.
pub trait Transport: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T> Transport for T where T: AsyncRead + AsyncWrite + Unpin + Send {}

/// Owned transport as held by a session.
pub type BoxedTransport = Box<dyn Transport>;
