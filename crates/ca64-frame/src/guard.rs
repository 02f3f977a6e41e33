use bytes::{Buf, BytesMut};

use crate::error::{FrameError, Result};

/// Accumulator size above which marker-free data gets truncated.
pub const DEFAULT_HIGH_WATER: usize = 4096;

/// Bytes kept from the tail after a truncation.
pub const DEFAULT_LOW_WATER: usize = 1024;

/// Bounds accumulator growth when the stream carries no frame marker.
///
/// Truncation is lossy: the discarded prefix may hold the start of a text
/// line, or the head of a frame whose marker has not fully arrived.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferGuard {
    high_water: usize,
    low_water: usize,
}

impl BufferGuard {
    /// Create a guard, rejecting thresholds that cannot work together.
    ///
    /// `low_water` must be at least 3 so a marker split across reads keeps
    /// its leading bytes.
    pub fn new(high_water: usize, low_water: usize) -> Result<Self> {
        if low_water < crate::codec::MARKER.len() - 1 {
            return Err(FrameError::InvalidConfig(format!(
                "low water mark {low_water} must be at least {}",
                crate::codec::MARKER.len() - 1
            )));
        }
        if low_water > high_water {
            return Err(FrameError::InvalidConfig(format!(
                "low water mark {low_water} exceeds high water mark {high_water}"
            )));
        }
        Ok(Self {
            high_water,
            low_water,
        })
    }

    pub fn high_water(&self) -> usize {
        self.high_water
    }

    pub fn low_water(&self) -> usize {
        self.low_water
    }

    /// Truncate `buf` to its newest `low_water` bytes when it has grown past
    /// `high_water` without a marker. Returns the number of bytes dropped.
    pub fn apply(&self, buf: &mut BytesMut) -> usize {
        if buf.len() <= self.high_water || crate::codec::find_marker(buf).is_some() {
            return 0;
        }
        let dropped = buf.len() - self.low_water;
        buf.advance(dropped);
        dropped
    }
}

impl Default for BufferGuard {
    fn default() -> Self {
        Self {
            high_water: DEFAULT_HIGH_WATER,
            low_water: DEFAULT_LOW_WATER,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::MARKER;

    #[test]
    fn below_high_water_is_untouched() {
        let mut buf = BytesMut::from(&vec![0x11u8; DEFAULT_HIGH_WATER][..]);
        assert_eq!(BufferGuard::default().apply(&mut buf), 0);
        assert_eq!(buf.len(), DEFAULT_HIGH_WATER);
    }

    #[test]
    fn truncates_to_newest_tail() {
        let mut data = vec![0x11u8; 5000];
        data[4999] = 0x22;
        let mut buf = BytesMut::from(&data[..]);

        let dropped = BufferGuard::default().apply(&mut buf);

        assert_eq!(dropped, 5000 - DEFAULT_LOW_WATER);
        assert_eq!(buf.len(), DEFAULT_LOW_WATER);
        assert_eq!(buf[buf.len() - 1], 0x22);
    }

    #[test]
    fn marker_anywhere_blocks_truncation() {
        let mut data = vec![0x11u8; 6000];
        data[10..14].copy_from_slice(&MARKER);
        let mut buf = BytesMut::from(&data[..]);

        assert_eq!(BufferGuard::default().apply(&mut buf), 0);
        assert_eq!(buf.len(), 6000);
    }

    #[test]
    fn rejects_inverted_thresholds() {
        assert!(matches!(
            BufferGuard::new(100, 200),
            Err(FrameError::InvalidConfig(_))
        ));
        assert!(BufferGuard::new(16, 2).is_err());
        assert!(BufferGuard::new(16, 16).is_ok());
    }
}
