//! Protocol module - message framing.
//!
//! Every message travels as UTF-8 wire text followed by a single NUL byte.
//! There is no length prefix:
//! - [`build_frame`] appends the terminator to outgoing text
//! - [`FrameBuffer`] reassembles incoming reads into complete frames

mod frame;
mod frame_buffer;

pub use frame::{build_frame, Frame, FRAME_TERMINATOR};
pub use frame_buffer::{FrameBuffer, DEFAULT_MAX_FRAME_SIZE};
