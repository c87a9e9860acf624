//! Frame buffer for accumulating partial reads.
//!
//! Uses `bytes::BytesMut` for zero-copy buffer management. Incoming bytes are
//! appended; every NUL splits off one complete [`Frame`], and whatever follows
//! the last NUL stays buffered as the prefix of the next frame. Because the
//! split happens on bytes, multi-byte UTF-8 characters cut across reads are
//! reassembled intact.
//!
//! # Example
//!
//! ```
//! use lichat_client::protocol::FrameBuffer;
//!
//! let mut buffer = FrameBuffer::new();
//!
//! assert!(buffer.push(b"(ping").unwrap().is_empty());
//! let frames = buffer.push(b" :id 1)\0").unwrap();
//!
//! assert_eq!(frames.len(), 1);
//! assert_eq!(frames[0].text().unwrap(), "(ping :id 1)");
//! ```

use bytes::BytesMut;

use super::frame::FRAME_TERMINATOR;
use super::Frame;
use crate::error::{LichatError, Result};

/// Default maximum frame size (16 MiB).
pub const DEFAULT_MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

/// Buffer for accumulating incoming bytes and extracting complete frames.
pub struct FrameBuffer {
    /// Accumulated bytes from socket reads.
    buffer: BytesMut,
    /// Bytes at the front of `buffer` already known to hold no terminator.
    scanned: usize,
    /// Maximum allowed frame size.
    max_frame_size: usize,
}

impl FrameBuffer {
    /// Create a new frame buffer with default settings.
    pub fn new() -> Self {
        Self::with_max_frame_size(DEFAULT_MAX_FRAME_SIZE)
    }

    /// Create a new frame buffer with a custom frame size limit.
    pub fn with_max_frame_size(max_frame_size: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(4096),
            scanned: 0,
            max_frame_size,
        }
    }

    /// Push data into the buffer and extract all complete frames.
    ///
    /// Frames come out in wire order. Returns an empty vector while still
    /// waiting for a terminator.
    ///
    /// # Errors
    ///
    /// Returns [`LichatError::FrameTooLarge`] if a frame, complete or not,
    /// exceeds the size limit. The buffer is cleared in that case.
    pub fn push(&mut self, data: &[u8]) -> Result<Vec<Frame>> {
        self.buffer.extend_from_slice(data);

        let mut frames = Vec::new();
        while let Some(frame) = self.try_extract_one()? {
            frames.push(frame);
        }

        if self.buffer.len() > self.max_frame_size {
            let size = self.buffer.len();
            self.clear();
            return Err(LichatError::FrameTooLarge {
                size,
                max: self.max_frame_size,
            });
        }

        Ok(frames)
    }

    fn try_extract_one(&mut self) -> Result<Option<Frame>> {
        let Some(offset) = self.buffer[self.scanned..]
            .iter()
            .position(|&b| b == FRAME_TERMINATOR)
        else {
            self.scanned = self.buffer.len();
            return Ok(None);
        };

        let end = self.scanned + offset;
        self.scanned = 0;
        if end > self.max_frame_size {
            self.clear();
            return Err(LichatError::FrameTooLarge {
                size: end,
                max: self.max_frame_size,
            });
        }

        let payload = self.buffer.split_to(end).freeze();
        // Drop the terminator.
        let _ = self.buffer.split_to(1);
        Ok(Some(Frame::new(payload)))
    }

    /// Get the number of buffered bytes.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Check if the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Discard any partial frame.
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.scanned = 0;
    }
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new()
    }
}
