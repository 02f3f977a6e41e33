use std::io::{ErrorKind, Write};

use bytes::BytesMut;

use crate::codec::{encode_frame, encode_frame_with_checksum, FRAME_SIZE, VALUE_COUNT};
use crate::error::{FrameError, Result};

/// Writes the device side of the stream: status lines and frames.
///
/// Used for simulators, capture fixtures and loopback tests.
pub struct FrameWriter<T> {
    inner: T,
    buf: BytesMut,
}

impl<T: Write> FrameWriter<T> {
    pub fn new(inner: T) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(FRAME_SIZE),
        }
    }

    /// Encode and send one frame with a correct checksum.
    pub fn send_frame(&mut self, sequence: u8, values: &[u16; VALUE_COUNT]) -> Result<()> {
        self.buf.clear();
        encode_frame(sequence, values, &mut self.buf);
        self.write_buf()
    }

    /// Send a frame carrying `checksum` verbatim, even if it is wrong.
    pub fn send_raw_frame(
        &mut self,
        sequence: u8,
        values: &[u16; VALUE_COUNT],
        checksum: u16,
    ) -> Result<()> {
        self.buf.clear();
        encode_frame_with_checksum(sequence, values, checksum, &mut self.buf);
        self.write_buf()
    }

    /// Send a text line; a trailing newline is added.
    pub fn send_line(&mut self, text: &str) -> Result<()> {
        self.buf.clear();
        self.buf.extend_from_slice(text.as_bytes());
        self.buf.extend_from_slice(b"\n");
        self.write_buf()
    }

    /// Send arbitrary bytes, e.g. line noise.
    pub fn send_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.buf.clear();
        self.buf.extend_from_slice(bytes);
        self.write_buf()
    }

    fn write_buf(&mut self) -> Result<()> {
        let mut offset = 0usize;
        while offset < self.buf.len() {
            match self.inner.write(&self.buf[offset..]) {
                Ok(0) => return Err(FrameError::ConnectionClosed),
                Ok(n) => offset += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }
        Ok(())
    }

    /// Flush the underlying stream.
    pub fn flush(&mut self) -> Result<()> {
        loop {
            match self.inner.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Consume the writer and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }
}
