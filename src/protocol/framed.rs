//! Async framed reader and writer
//!
//! Thin wrappers that move whole [`Message`]s over any tokio byte stream.

use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use super::codec::{decode_frame, encode_message};
use super::constants::DEFAULT_MAX_FRAME_SIZE;
use super::message::Message;
use crate::error::{ProtocolError, Result};

/// Reads framed messages from a byte stream
pub struct FrameReader<R> {
    inner: R,
    buf: BytesMut,
    max_frame_size: usize,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    /// Create a reader with the default frame limit
    pub fn new(inner: R) -> Self {
        Self::with_max_frame_size(inner, DEFAULT_MAX_FRAME_SIZE)
    }

    /// Create a reader with a custom frame limit
    pub fn with_max_frame_size(inner: R, max_frame_size: usize) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(8 * 1024),
            max_frame_size,
        }
    }

    /// Read the next message
    ///
    /// Returns `Ok(None)` on a clean close between frames. Partial frames are
    /// kept in the internal buffer, so dropping this future inside a
    /// `select!` loses no data.
    pub async fn read_message(&mut self) -> Result<Option<Message>> {
        loop {
            if let Some(msg) = decode_frame(&mut self.buf, self.max_frame_size)? {
                return Ok(Some(msg));
            }

            let n = self.inner.read_buf(&mut self.buf).await?;
            if n == 0 {
                if self.buf.is_empty() {
                    return Ok(None);
                }
                return Err(ProtocolError::UnexpectedEof.into());
            }
        }
    }
}

/// Writes framed messages to a byte stream
pub struct FrameWriter<W> {
    inner: W,
    buf: BytesMut,
}

impl<W: AsyncWrite + Unpin> FrameWriter<W> {
    /// Create a new writer
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(8 * 1024),
        }
    }

    /// Encode, write and flush one message
    pub async fn write_message(&mut self, msg: &Message) -> Result<()> {
        self.buf.clear();
        encode_message(msg, &mut self.buf)?;
        self.inner.write_all(&self.buf).await?;
        self.inner.flush().await?;
        Ok(())
    }

    /// Shut down the write side of the stream
    pub async fn shutdown(&mut self) -> Result<()> {
        self.inner.shutdown().await?;
        Ok(())
    }
}
