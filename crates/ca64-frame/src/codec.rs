use std::fmt;

use bytes::{Buf, BufMut, BytesMut};

use crate::crc::{crc16, crc16_update};

/// Frame marker: "CA64".
pub const MARKER: [u8; 4] = *b"CA64";

/// Matrix geometry carried by every frame.
pub const MATRIX_ROWS: usize = 8;
pub const MATRIX_COLS: usize = 8;
pub const VALUE_COUNT: usize = MATRIX_ROWS * MATRIX_COLS;

/// The only payload length a real frame declares.
pub const PAYLOAD_LEN: usize = VALUE_COUNT * 2;

/// Marker (4) + length (2) + sequence (1).
pub const HEADER_SIZE: usize = MARKER.len() + 2 + 1;

/// Header + payload + checksum = 137 bytes.
pub const FRAME_SIZE: usize = HEADER_SIZE + PAYLOAD_LEN + 2;

/// One decoded 8x8 snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SensorFrame {
    /// Producer-assigned counter, wraps at 256.
    pub sequence: u8,
    /// Raw counts in row-major order.
    pub values: [u16; VALUE_COUNT],
    /// Checksum carried on the wire.
    pub crc_received: u16,
    /// Checksum recomputed over sequence, length and payload.
    pub crc_computed: u16,
}

impl SensorFrame {
    /// Whether the received checksum matched.
    pub fn is_valid(&self) -> bool {
        self.crc_received == self.crc_computed
    }

    pub fn min(&self) -> u16 {
        self.values.iter().copied().min().unwrap_or(0)
    }

    pub fn max(&self) -> u16 {
        self.values.iter().copied().max().unwrap_or(0)
    }

    /// Reshape the leading `rows * cols` values into a row-major grid.
    ///
    /// The device can be configured for an M×N array smaller than 8x8, in
    /// which case only the first `rows * cols` cells carry data. Returns
    /// `None` when the shape is empty or needs more than 64 cells.
    pub fn grid(&self, rows: usize, cols: usize) -> Option<Vec<Vec<u16>>> {
        if rows == 0 || cols == 0 || rows.checked_mul(cols)? > VALUE_COUNT {
            return None;
        }
        Some(
            self.values[..rows * cols]
                .chunks(cols)
                .map(<[u16]>::to_vec)
                .collect(),
        )
    }
}

impl fmt::Display for SensorFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "CA seq={:3} len={:3} elems={} min={:4} max={:4} crc={} first8={:?}",
            self.sequence,
            PAYLOAD_LEN,
            VALUE_COUNT,
            self.min(),
            self.max(),
            if self.is_valid() { "OK" } else { "BAD" },
            &self.values[..8]
        )
    }
}

/// Outcome of one extraction attempt against the accumulator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extracted {
    /// No marker in the buffer; nothing was consumed.
    NoMarker,
    /// A marker was found but the frame is not complete yet. Bytes before
    /// the marker were dropped.
    Incomplete { discarded: usize },
    /// The marker match declared a wrong length. Everything up to and
    /// including the marker's first byte was dropped.
    Resync { discarded: usize },
    /// A well-formed frame was consumed; its checksum may still be bad.
    Frame {
        frame: SensorFrame,
        discarded: usize,
    },
}

impl Extracted {
    /// Whether the call removed bytes or produced a frame.
    pub fn made_progress(&self) -> bool {
        match self {
            Extracted::NoMarker => false,
            Extracted::Incomplete { discarded } => *discarded > 0,
            Extracted::Resync { .. } | Extracted::Frame { .. } => true,
        }
    }
}

/// Position of the first marker in `buf`.
pub fn find_marker(buf: &[u8]) -> Option<usize> {
    buf.windows(MARKER.len()).position(|w| w == MARKER)
}

/// Checksum of a frame body: sequence, length bytes, then payload.
pub fn frame_checksum(sequence: u8, payload: &[u8]) -> u16 {
    let len = payload.len() as u16;
    let head = [sequence, len as u8, (len >> 8) as u8];
    crc16_update(crc16(&head), payload)
}

/// Encode a frame into the wire format.
///
/// Wire format:
/// ```text
/// ┌────────────┬───────────┬──────────┬────────────────────┬───────────┐
/// │ Marker (4) │ Length    │ Sequence │ Payload            │ CRC       │
/// │ "CA64"     │ (2B LE)   │ (1B)     │ 64 x u16 LE        │ (2B LE)   │
/// └────────────┴───────────┴──────────┴────────────────────┴───────────┘
/// ```
pub fn encode_frame(sequence: u8, values: &[u16; VALUE_COUNT], dst: &mut BytesMut) {
    let payload = payload_bytes(values);
    let crc = frame_checksum(sequence, &payload);
    encode_frame_with_checksum(sequence, values, crc, dst);
}

/// Encode a frame carrying an explicit checksum, valid or not.
pub fn encode_frame_with_checksum(
    sequence: u8,
    values: &[u16; VALUE_COUNT],
    checksum: u16,
    dst: &mut BytesMut,
) {
    dst.reserve(FRAME_SIZE);
    dst.put_slice(&MARKER);
    dst.put_u16_le(PAYLOAD_LEN as u16);
    dst.put_u8(sequence);
    for &value in values {
        dst.put_u16_le(value);
    }
    dst.put_u16_le(checksum);
}

fn payload_bytes(values: &[u16; VALUE_COUNT]) -> [u8; PAYLOAD_LEN] {
    let mut payload = [0u8; PAYLOAD_LEN];
    for (chunk, value) in payload.chunks_exact_mut(2).zip(values) {
        chunk.copy_from_slice(&value.to_le_bytes());
    }
    payload
}

/// Try to pull one frame from the front of `src`.
///
/// A marker whose declared length is not 128 is a false positive; the
/// caller is expected to call again, which resumes the search one byte past
/// the rejected match.
pub fn extract_frame(src: &mut BytesMut) -> Extracted {
    let Some(start) = find_marker(src) else {
        return Extracted::NoMarker;
    };

    if src.len() - start < FRAME_SIZE {
        src.advance(start);
        return Extracted::Incomplete { discarded: start };
    }

    let len_at = start + MARKER.len();
    let declared = u16::from_le_bytes([src[len_at], src[len_at + 1]]) as usize;
    if declared != PAYLOAD_LEN {
        src.advance(start + 1);
        return Extracted::Resync {
            discarded: start + 1,
        };
    }

    src.advance(len_at + 2);
    let sequence = src.get_u8();
    let payload = src.split_to(PAYLOAD_LEN);
    let crc_received = src.get_u16_le();

    let mut values = [0u16; VALUE_COUNT];
    for (value, chunk) in values.iter_mut().zip(payload.chunks_exact(2)) {
        *value = u16::from_le_bytes([chunk[0], chunk[1]]);
    }

    Extracted::Frame {
        frame: SensorFrame {
            sequence,
            values,
            crc_received,
            crc_computed: frame_checksum(sequence, &payload),
        },
        discarded: start,
    }
}
