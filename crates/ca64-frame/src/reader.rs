use std::collections::VecDeque;
use std::io::{ErrorKind, Read};

use crate::decoder::{DecodeEvent, DecoderConfig, DecoderStats, StreamDecoder};
use crate::error::{FrameError, Result};

/// Reads decode events from any `Read` stream.
///
/// Handles partial reads internally: callers get one complete line or frame
/// per call, in wire order.
pub struct EventReader<T> {
    inner: T,
    decoder: StreamDecoder,
    pending: VecDeque<DecodeEvent>,
    chunk: Vec<u8>,
}

impl<T: Read> EventReader<T> {
    /// Create a new event reader with default configuration.
    pub fn new(inner: T) -> Self {
        let decoder = StreamDecoder::new();
        let chunk = vec![0u8; decoder.config().read_chunk_size];
        Self {
            inner,
            decoder,
            pending: VecDeque::new(),
            chunk,
        }
    }

    /// Create a new event reader with explicit configuration.
    pub fn with_config(inner: T, config: DecoderConfig) -> Result<Self> {
        let chunk = vec![0u8; config.read_chunk_size];
        Ok(Self {
            inner,
            decoder: StreamDecoder::with_config(config)?,
            pending: VecDeque::new(),
            chunk,
        })
    }

    /// Read the next event (blocking).
    ///
    /// Returns `Err(FrameError::ConnectionClosed)` once the stream hits EOF
    /// and every buffered event has been handed out.
    pub fn next_event(&mut self) -> Result<DecodeEvent> {
        loop {
            if let Some(event) = self.pending.pop_front() {
                return Ok(event);
            }

            let read = match self.inner.read(&mut self.chunk) {
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            };

            if read == 0 {
                return Err(FrameError::ConnectionClosed);
            }

            self.pending.extend(self.decoder.feed(&self.chunk[..read]));
        }
    }

    /// Decoder counters so far.
    pub fn stats(&self) -> &DecoderStats {
        self.decoder.stats()
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the reader and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }
}

impl<T: Read> Iterator for EventReader<T> {
    type Item = Result<DecodeEvent>;

    /// Yields events until EOF; I/O errors are yielded once and end iteration.
    fn next(&mut self) -> Option<Self::Item> {
        match self.next_event() {
            Ok(event) => Some(Ok(event)),
            Err(FrameError::ConnectionClosed) => None,
            Err(err) => Some(Err(err)),
        }
    }
}
