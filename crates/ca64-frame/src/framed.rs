//! `tokio_util` codec adapter for async transports.

use std::collections::VecDeque;

use bytes::BytesMut;
use tokio_util::codec::Decoder;

use crate::decoder::{DecodeEvent, DecoderConfig, DecoderStats, StreamDecoder};
use crate::error::{FrameError, Result};

/// Decodes lines and frames out of a `FramedRead` buffer.
///
/// Every byte handed in is moved into the inner [`StreamDecoder`], which
/// keeps its own accumulator and buffer guard.
#[derive(Debug, Default)]
pub struct TelemetryCodec {
    decoder: StreamDecoder,
    pending: VecDeque<DecodeEvent>,
}

impl TelemetryCodec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: DecoderConfig) -> Result<Self> {
        Ok(Self {
            decoder: StreamDecoder::with_config(config)?,
            pending: VecDeque::new(),
        })
    }

    pub fn stats(&self) -> &DecoderStats {
        self.decoder.stats()
    }
}

impl Decoder for TelemetryCodec {
    type Item = DecodeEvent;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<DecodeEvent>> {
        if !src.is_empty() {
            let chunk = src.split();
            self.pending.extend(self.decoder.feed(&chunk));
        }
        Ok(self.pending.pop_front())
    }
}
