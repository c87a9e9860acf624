//! TCP connection setup.
//!
//! # Example
//!
//! ```ignore
//! use lichat_client::transport::connect_tcp;
//!
//! let stream = connect_tcp("chat.tymoon.eu", None).await?;
//! ```

use tokio::net::TcpStream;

use crate::error::Result;

/// Default port for plain connections.
pub const DEFAULT_PORT: u16 = 1111;

/// Default port for encrypted connections.
pub const DEFAULT_TLS_PORT: u16 = 1112;

/// Port to use when the caller did not name one.
pub fn resolve_port(port: Option<u16>, encrypted: bool) -> u16 {
    match (port, encrypted) {
        (Some(port), _) => port,
        (None, false) => DEFAULT_PORT,
        (None, true) => DEFAULT_TLS_PORT,
    }
}

/// Open a plain TCP connection, defaulting to [`DEFAULT_PORT`].
pub async fn connect_tcp(host: &str, port: Option<u16>) -> Result<TcpStream> {
    let port = resolve_port(port, false);
    let stream = TcpStream::connect((host, port)).await?;
    stream.set_nodelay(true)?;
    tracing::debug!("Connected to {}:{}", host, port);
    Ok(stream)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[test]
    fn test_resolve_port() {
        assert_eq!(resolve_port(None, false), 1111);
        assert_eq!(resolve_port(None, true), 1112);
        assert_eq!(resolve_port(Some(4000), true), 4000);
    }

    #[tokio::test]
    async fn test_connect_tcp() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let (client, accepted) = tokio::join!(connect_tcp("127.0.0.1", Some(port)), listener.accept());

        assert!(client.is_ok());
        assert!(accepted.is_ok());
    }

    #[tokio::test]
    async fn test_connect_refused() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        assert!(connect_tcp("127.0.0.1", Some(port)).await.is_err());
    }
}
