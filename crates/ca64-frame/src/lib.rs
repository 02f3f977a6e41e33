//! Streaming decoder for the CA64 sensor telemetry link.
//!
//! The device interleaves newline-terminated status text with fixed-size
//! binary frames. Every frame is laid out as:
//! - A 4-byte marker (`"CA64"`)
//! - A 2-byte little-endian payload length (always 128)
//! - A 1-byte free-running sequence number
//! - 64 little-endian `u16` raw counts (an 8x8 matrix, row-major)
//! - A 2-byte little-endian CRC-16/CCITT-FALSE
//!
//! Feed bytes in whatever chunks the transport hands you; [`StreamDecoder`]
//! returns log lines and frames in the order they appeared on the wire.

pub mod codec;
pub mod crc;
pub mod decoder;
pub mod error;
#[cfg(feature = "async")]
pub mod framed;
pub mod guard;
pub mod lines;
pub mod reader;
pub mod writer;

pub use codec::{
    encode_frame, extract_frame, Extracted, SensorFrame, FRAME_SIZE, HEADER_SIZE, MARKER,
    MATRIX_COLS, MATRIX_ROWS, PAYLOAD_LEN, VALUE_COUNT,
};
pub use crc::{crc16, crc16_update};
pub use decoder::{DecodeEvent, DecoderConfig, DecoderStats, StreamDecoder};
pub use error::{FrameError, Result};
#[cfg(feature = "async")]
pub use framed::TelemetryCodec;
pub use guard::{BufferGuard, DEFAULT_HIGH_WATER, DEFAULT_LOW_WATER};
pub use lines::{LineKind, LogLine};
pub use reader::EventReader;
pub use writer::FrameWriter;
