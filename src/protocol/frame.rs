//! Frame type and outgoing frame construction.
//!
//! A frame is the wire text of one message. On the wire every frame is
//! followed by a single NUL byte; the [`Frame`] itself never contains it.
//!
//! # Example
//!
//! ```
//! use lichat_client::protocol::{build_frame, Frame};
//! use bytes::Bytes;
//!
//! assert_eq!(&build_frame("(ping)")[..], b"(ping)\0");
//!
//! let frame = Frame::new(Bytes::from_static(b"(pong)"));
//! assert_eq!(frame.text().unwrap(), "(pong)");
//! ```

use bytes::{BufMut, Bytes, BytesMut};

/// Frame terminator.
pub const FRAME_TERMINATOR: u8 = 0;

/// One complete, terminator-stripped frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Raw frame bytes (zero-copy via `bytes::Bytes`).
    pub payload: Bytes,
}

impl Frame {
    /// Create a new frame from its bytes.
    pub fn new(payload: Bytes) -> Self {
        Self { payload }
    }

    /// Create a frame from text (copies data).
    pub fn from_text(text: &str) -> Self {
        Self {
            payload: Bytes::copy_from_slice(text.as_bytes()),
        }
    }

    /// Get a reference to the frame bytes.
    #[inline]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Get the frame length in bytes.
    #[inline]
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    /// Check if the frame is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    /// Frame contents as UTF-8 text.
    pub fn text(&self) -> Result<&str, std::str::Utf8Error> {
        std::str::from_utf8(&self.payload)
    }
}

/// Build the bytes for one outgoing frame: the text plus terminator.
pub fn build_frame(text: &str) -> Bytes {
    let mut buf = BytesMut::with_capacity(text.len() + 1);
    buf.put_slice(text.as_bytes());
    buf.put_u8(FRAME_TERMINATOR);
    buf.freeze()
}
