use bytes::BytesMut;
use tracing::{debug, warn};

use crate::codec::{extract_frame, Extracted, SensorFrame};
use crate::error::Result;
use crate::guard::{BufferGuard, DEFAULT_HIGH_WATER, DEFAULT_LOW_WATER};
use crate::lines::{split_line, LineStep, LogLine};

/// Read size used by the original device tooling.
pub const DEFAULT_READ_CHUNK: usize = 1024;

/// Something the decoder pulled out of the stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeEvent {
    Line(LogLine),
    Frame(SensorFrame),
}

impl DecodeEvent {
    pub fn as_frame(&self) -> Option<&SensorFrame> {
        match self {
            DecodeEvent::Frame(frame) => Some(frame),
            DecodeEvent::Line(_) => None,
        }
    }

    pub fn as_line(&self) -> Option<&LogLine> {
        match self {
            DecodeEvent::Line(line) => Some(line),
            DecodeEvent::Frame(_) => None,
        }
    }
}

/// Configuration for the stream decoder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecoderConfig {
    /// Marker-free accumulator size that triggers truncation. Default: 4096.
    pub high_water: usize,
    /// Bytes kept after truncation. Default: 1024.
    pub low_water: usize,
    /// Bytes requested per read by blocking readers. Default: 1024.
    pub read_chunk_size: usize,
}

impl DecoderConfig {
    pub fn validate(&self) -> Result<()> {
        BufferGuard::new(self.high_water, self.low_water)?;
        if self.read_chunk_size == 0 {
            return Err(crate::FrameError::InvalidConfig(
                "read chunk size must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            high_water: DEFAULT_HIGH_WATER,
            low_water: DEFAULT_LOW_WATER,
            read_chunk_size: DEFAULT_READ_CHUNK,
        }
    }
}

/// Running diagnostic counters. They only ever grow.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecoderStats {
    pub lines: u64,
    pub frames_ok: u64,
    pub frames_crc_failed: u64,
    /// False marker matches skipped by single-byte resync.
    pub resyncs: u64,
    /// Buffer guard activations.
    pub truncations: u64,
    /// Bytes dropped without producing an event.
    pub bytes_discarded: u64,
}

impl DecoderStats {
    pub fn frames(&self) -> u64 {
        self.frames_ok + self.frames_crc_failed
    }
}

/// Demultiplexes text lines and binary frames from an unreliable byte stream.
///
/// The decoder owns its accumulator; the only way in is [`feed`](Self::feed).
/// Output depends only on the bytes fed so far, not on how they were chunked.
#[derive(Debug)]
pub struct StreamDecoder {
    buf: BytesMut,
    guard: BufferGuard,
    config: DecoderConfig,
    stats: DecoderStats,
}

impl StreamDecoder {
    /// Create a decoder with default thresholds.
    pub fn new() -> Self {
        let config = DecoderConfig::default();
        Self {
            buf: BytesMut::with_capacity(config.high_water),
            guard: BufferGuard::default(),
            config,
            stats: DecoderStats::default(),
        }
    }

    /// Create a decoder with explicit configuration.
    pub fn with_config(config: DecoderConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            buf: BytesMut::with_capacity(config.high_water),
            guard: BufferGuard::new(config.high_water, config.low_water)?,
            config,
            stats: DecoderStats::default(),
        })
    }

    /// Append `chunk` and return every event it completes, in wire order.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<DecodeEvent> {
        let mut events = Vec::new();
        self.feed_into(chunk, &mut events);
        events
    }

    /// Like [`feed`](Self::feed), appending to an existing event list.
    pub fn feed_into(&mut self, chunk: &[u8], events: &mut Vec<DecodeEvent>) {
        self.buf.extend_from_slice(chunk);

        loop {
            let mut progressed = false;

            loop {
                match split_line(&mut self.buf) {
                    LineStep::Line(line) => {
                        self.stats.lines += 1;
                        events.push(DecodeEvent::Line(line));
                        progressed = true;
                    }
                    LineStep::Skipped => progressed = true,
                    LineStep::Blocked | LineStep::NeedMore => break,
                }
            }

            let step = extract_frame(&mut self.buf);
            progressed |= step.made_progress();
            match step {
                Extracted::NoMarker => {}
                Extracted::Incomplete { discarded } => {
                    self.stats.bytes_discarded += discarded as u64;
                }
                Extracted::Resync { discarded } => {
                    self.stats.resyncs += 1;
                    self.stats.bytes_discarded += discarded as u64;
                    debug!(discarded, "false frame marker, resyncing");
                }
                Extracted::Frame { frame, discarded } => {
                    self.stats.bytes_discarded += discarded as u64;
                    if frame.is_valid() {
                        self.stats.frames_ok += 1;
                    } else {
                        self.stats.frames_crc_failed += 1;
                        debug!(
                            sequence = frame.sequence,
                            received = frame.crc_received,
                            computed = frame.crc_computed,
                            "frame checksum mismatch"
                        );
                    }
                    events.push(DecodeEvent::Frame(frame));
                }
            }

            if !progressed {
                break;
            }
        }

        let dropped = self.guard.apply(&mut self.buf);
        if dropped > 0 {
            self.stats.truncations += 1;
            self.stats.bytes_discarded += dropped as u64;
            warn!(
                dropped,
                kept = self.buf.len(),
                "no frame marker within high water mark, truncated buffer"
            );
        }
    }

    /// Bytes currently held waiting for a line end or frame completion.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    pub fn stats(&self) -> &DecoderStats {
        &self.stats
    }

    /// Current decoder configuration.
    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    /// Drop any partial input, e.g. after reopening the port. Counters stay.
    pub fn reset(&mut self) {
        self.buf.clear();
    }
}

impl Default for StreamDecoder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{encode_frame, encode_frame_with_checksum, VALUE_COUNT};

    fn wire_frame(sequence: u8, fill: u16) -> BytesMut {
        let mut buf = BytesMut::new();
        encode_frame(sequence, &[fill; VALUE_COUNT], &mut buf);
        buf
    }

    #[test]
    fn decodes_lines_and_frames_in_order() {
        let mut stream = BytesMut::from(&b"#OK CONNECT\n"[..]);
        stream.extend_from_slice(&wire_frame(1, 500));
        stream.extend_from_slice(b"> !STAT\n");
        stream.extend_from_slice(&wire_frame(2, 501));

        let mut decoder = StreamDecoder::new();
        let events = decoder.feed(&stream);

        assert_eq!(events.len(), 4);
        assert_eq!(events[0].as_line().unwrap().text, "#OK CONNECT");
        assert_eq!(events[1].as_frame().unwrap().sequence, 1);
        assert_eq!(events[2].as_line().unwrap().text, "> !STAT");
        assert_eq!(events[3].as_frame().unwrap().values[0], 501);
        assert_eq!(decoder.buffered(), 0);
        assert_eq!(decoder.stats().frames_ok, 2);
        assert_eq!(decoder.stats().lines, 2);
    }

    #[test]
    fn byte_at_a_time_matches_single_chunk() {
        let mut stream = BytesMut::from(&b"#a\n"[..]);
        stream.extend_from_slice(&wire_frame(3, 7));
        stream.extend_from_slice(b"#b\n");

        let whole = StreamDecoder::new().feed(&stream);

        let mut decoder = StreamDecoder::new();
        let mut split = Vec::new();
        for byte in stream.iter() {
            decoder.feed_into(std::slice::from_ref(byte), &mut split);
        }

        assert_eq!(whole, split);
    }

    #[test]
    fn crc_failure_is_emitted_and_counted() {
        let mut stream = BytesMut::new();
        encode_frame_with_checksum(5, &[1; VALUE_COUNT], 0x0000, &mut stream);

        let mut decoder = StreamDecoder::new();
        let events = decoder.feed(&stream);

        assert_eq!(events.len(), 1);
        assert!(!events[0].as_frame().unwrap().is_valid());
        assert_eq!(decoder.stats().frames_crc_failed, 1);
        assert_eq!(decoder.stats().frames_ok, 0);
    }

    #[test]
    fn partial_frame_is_retained() {
        let frame = wire_frame(8, 42);
        let mut decoder = StreamDecoder::new();

        assert!(decoder.feed(&frame[..100]).is_empty());
        assert_eq!(decoder.buffered(), 100);

        let events = decoder.feed(&frame[100..]);
        assert_eq!(events.len(), 1);
        assert_eq!(decoder.buffered(), 0);
    }

    #[test]
    fn guard_truncates_marker_free_noise() {
        let mut decoder = StreamDecoder::new();
        decoder.feed(&[0x55; 5000]);

        assert_eq!(decoder.buffered(), DEFAULT_LOW_WATER);
        assert_eq!(decoder.stats().truncations, 1);
        assert_eq!(decoder.stats().bytes_discarded, 5000 - DEFAULT_LOW_WATER as u64);
    }

    #[test]
    fn custom_thresholds() {
        let config = DecoderConfig {
            high_water: 64,
            low_water: 16,
            ..DecoderConfig::default()
        };
        let mut decoder = StreamDecoder::with_config(config).unwrap();
        decoder.feed(&[0x01; 65]);
        assert_eq!(decoder.buffered(), 16);
    }

    #[test]
    fn rejects_invalid_config() {
        let config = DecoderConfig {
            read_chunk_size: 0,
            ..DecoderConfig::default()
        };
        assert!(StreamDecoder::with_config(config).is_err());
    }

    #[test]
    fn reset_clears_buffer_but_keeps_stats() {
        let mut decoder = StreamDecoder::new();
        decoder.feed(b"#one\n#partial");
        decoder.reset();

        assert_eq!(decoder.buffered(), 0);
        assert_eq!(decoder.stats().lines, 1);
        assert!(decoder.feed(b"\n").is_empty());
    }
}
