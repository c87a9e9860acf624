//! Frame writing.
//!
//! Frames are written in full: partial writes are resumed from where they
//! stopped, and several queued frames go out through one scatter/gather
//! write where the transport allows it. A write that accepts zero bytes is
//! reported as [`std::io::ErrorKind::WriteZero`]; the session turns any write
//! error into a disconnect.

use std::io::IoSlice;

use bytes::Bytes;
use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::error::{LichatError, Result};

/// Write a batch of frames using scatter/gather I/O (write_vectored).
pub async fn write_batch<W>(writer: &mut W, batch: &[Bytes]) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let total_size: usize = batch.iter().map(Bytes::len).sum();
    if total_size == 0 {
        return Ok(());
    }

    let mut total_written = 0;
    while total_written < total_size {
        let slices = build_remaining_slices(batch, total_written);
        let written = writer.write_vectored(&slices).await?;
        if written == 0 {
            return Err(LichatError::Io(std::io::Error::new(
                std::io::ErrorKind::WriteZero,
                "write_vectored returned 0",
            )));
        }
        total_written += written;
    }

    writer.flush().await?;
    Ok(())
}

/// Build IoSlice array for remaining data after a partial write.
fn build_remaining_slices(batch: &[Bytes], skip_bytes: usize) -> Vec<IoSlice<'_>> {
    let mut slices = Vec::with_capacity(batch.len());
    let mut skipped = 0;

    for frame in batch {
        let start = skipped;
        let end = skipped + frame.len();
        if skip_bytes < end && !frame.is_empty() {
            let start_in_frame = skip_bytes.saturating_sub(start);
            slices.push(IoSlice::new(&frame[start_in_frame..]));
        }
        skipped = end;
    }

    slices
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::pin::Pin;
    use std::task::{Context, Poll};
    use tokio::io::{duplex, AsyncReadExt};

    use crate::protocol::build_frame;

    /// Accepts at most `limit` bytes per write call.
    struct Trickle {
        written: Vec<u8>,
        limit: usize,
    }

    impl AsyncWrite for Trickle {
        fn poll_write(
            mut self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &[u8],
        ) -> Poll<std::io::Result<usize>> {
            let n = buf.len().min(self.limit);
            self.written.extend_from_slice(&buf[..n]);
            Poll::Ready(Ok(n))
        }

        fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
            Poll::Ready(Ok(()))
        }

        fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
            Poll::Ready(Ok(()))
        }
    }

    #[test]
    fn test_build_remaining_slices_no_skip() {
        let batch = vec![build_frame("(a)"), build_frame("(bc)")];

        let slices = build_remaining_slices(&batch, 0);
        assert_eq!(slices.len(), 2);
    }

    #[test]
    fn test_build_remaining_slices_partial_frame() {
        let batch = vec![build_frame("(a)"), build_frame("(bc)")];

        let slices = build_remaining_slices(&batch, 2);
        assert_eq!(slices.len(), 2);
        assert_eq!(&slices[0][..], b")\0");
        assert_eq!(slices[1].len(), 5);
    }

    #[test]
    fn test_build_remaining_slices_skip_frame() {
        let batch = vec![build_frame("(a)"), build_frame("(bc)")];

        let slices = build_remaining_slices(&batch, 4);
        assert_eq!(slices.len(), 1);
        assert_eq!(&slices[0][..], b"(bc)\0");
    }

    #[tokio::test]
    async fn test_write_single_frame() {
        let mut buf = Cursor::new(Vec::new());

        write_batch(&mut buf, &[build_frame("(ping :id 1)")]).await.unwrap();

        assert_eq!(buf.into_inner(), b"(ping :id 1)\0");
    }

    #[tokio::test]
    async fn test_write_batch_multiple() {
        let mut buf = Cursor::new(Vec::new());
        let batch: Vec<_> = (0..5).map(|i| build_frame(&format!("(x :id {})", i))).collect();

        write_batch(&mut buf, &batch).await.unwrap();

        let written = buf.into_inner();
        assert_eq!(written.iter().filter(|&&b| b == 0).count(), 5);
        assert!(written.starts_with(b"(x :id 0)\0(x :id 1)\0"));
    }

    #[tokio::test]
    async fn test_partial_writes_are_resumed() {
        let mut trickle = Trickle {
            written: Vec::new(),
            limit: 3,
        };
        let batch = vec![build_frame("(message :text \"long\")"), build_frame("(pong)")];

        write_batch(&mut trickle, &batch).await.unwrap();

        assert_eq!(trickle.written, b"(message :text \"long\")\0(pong)\0");
    }

    #[tokio::test]
    async fn test_zero_write_is_an_error() {
        let mut trickle = Trickle {
            written: Vec::new(),
            limit: 0,
        };

        let result = write_batch(&mut trickle, &[build_frame("(ping)")]).await;

        assert!(matches!(
            result,
            Err(LichatError::Io(e)) if e.kind() == std::io::ErrorKind::WriteZero
        ));
    }

    #[tokio::test]
    async fn test_write_to_duplex() {
        let (mut client, mut server) = duplex(4096);

        write_batch(&mut client, &[build_frame("(pong)")]).await.unwrap();

        let mut buf = vec![0u8; 64];
        let n = server.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"(pong)\0");
    }
}
