//! Error types for lichat-client.

use thiserror::Error;

use crate::schema::Message;

/// Why a connection handshake did not complete.
#[derive(Debug)]
pub enum ConnectFailure {
    /// The server did not answer within the connect timeout.
    Timeout,
    /// The server answered with something other than a connect confirmation.
    Rejected(Box<Message>),
}

impl std::fmt::Display for ConnectFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Timeout => f.write_str("timeout"),
            Self::Rejected(update) => match update.text() {
                Some(text) => write!(f, "rejected with {}: {}", update.kind().name(), text),
                None => write!(f, "rejected with {}", update.kind().name()),
            },
        }
    }
}

/// Main error type for all lichat operations.
#[derive(Debug, Error)]
pub enum LichatError {
    /// The reader ran out of input before the value was complete.
    ///
    /// This is a streaming signal rather than a failure: feed more bytes and retry.
    #[error("Incomplete input")]
    Incomplete,

    /// Malformed wire text.
    #[error("Parse error at offset {offset}: {reason}")]
    Parse { offset: usize, reason: String },

    /// A value that has no wire representation.
    #[error("Encode error: {0}")]
    Encode(String),

    /// Wire tag or parent tag not present in the schema registry.
    #[error("Unknown kind: {0}")]
    UnknownKind(String),

    /// Field not declared by the kind being constructed.
    #[error("Unknown field {field} for kind {kind}")]
    UnknownField { kind: String, field: String },

    /// Symbol or namespace lookup failed.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Malformed schema description.
    #[error("Schema error: {0}")]
    Schema(String),

    /// Handshake did not complete.
    #[error("Connection failed: {0}")]
    ConnectionFailed(ConnectFailure),

    /// `connect` called on a session that is already connected.
    #[error("Already connected")]
    AlreadyConnected,

    /// Operation needs an open transport.
    #[error("Not connected")]
    NotConnected,

    /// Incoming data grew past the frame limit without a terminator.
    #[error("Frame size {size} exceeds maximum {max}")]
    FrameTooLarge { size: usize, max: usize },

    /// I/O error during socket operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error (configuration only).
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid base64 in an emote payload.
    #[error("Base64 error: {0}")]
    Base64(#[from] base64::DecodeError),
}

impl LichatError {
    pub(crate) fn parse(offset: usize, reason: impl Into<String>) -> Self {
        Self::Parse {
            offset,
            reason: reason.into(),
        }
    }
}

/// Result type alias using LichatError.
pub type Result<T> = std::result::Result<T, LichatError>;
