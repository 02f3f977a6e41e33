use std::time::{Duration, Instant};

use ca64_frame::SensorFrame;

/// Default minimum spacing between emitted frames.
pub const DEFAULT_SAMPLE_INTERVAL: Duration = Duration::from_millis(100);

/// Rate limiter for frame consumers that redraw.
///
/// At most one frame passes per interval. Frames offered in between
/// replace each other; only the latest is kept for [`flush`](Self::flush).
#[derive(Debug)]
pub struct FrameSampler {
    interval: Duration,
    last_emit: Option<Instant>,
    pending: Option<SensorFrame>,
    dropped: u64,
}

impl FrameSampler {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_emit: None,
            pending: None,
            dropped: 0,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Offer a frame seen at `now`. Returns the frame to show, if due.
    pub fn offer(&mut self, frame: SensorFrame, now: Instant) -> Option<SensorFrame> {
        if self.pending.replace(frame).is_some() {
            self.dropped += 1;
        }
        self.flush(now)
    }

    /// Emit the held frame if the interval has passed since the last emit.
    pub fn flush(&mut self, now: Instant) -> Option<SensorFrame> {
        let due = match self.last_emit {
            Some(last) => now.saturating_duration_since(last) >= self.interval,
            None => true,
        };
        if !due {
            return None;
        }
        let frame = self.pending.take()?;
        self.last_emit = Some(now);
        Some(frame)
    }

    /// Emit the held frame regardless of timing, e.g. at shutdown.
    pub fn take_pending(&mut self) -> Option<SensorFrame> {
        self.pending.take()
    }

    /// Frames replaced before they could be emitted.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}

impl Default for FrameSampler {
    fn default() -> Self {
        Self::new(DEFAULT_SAMPLE_INTERVAL)
    }
}
