use std::io::{ErrorKind, Read};
use std::mem;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, SyncSender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use ca64_frame::{DecodeEvent, DecoderConfig, DecoderStats, LogLine, SensorFrame, StreamDecoder};
use tracing::{debug, info, warn};

use crate::error::{LinkError, Result};

/// Default bound on undelivered events.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;

/// Pause after a failed read before trying again.
pub const DEFAULT_ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// Pause when the source has nothing to give.
pub const DEFAULT_IDLE_POLL: Duration = Duration::from_millis(10);

/// How long `stop` waits for the reader before detaching it.
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_millis(500);

const SHUTDOWN_POLL: Duration = Duration::from_millis(5);

/// What the reader does when the source reports end of stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EofPolicy {
    /// End the session. Right for capture files and pipes.
    #[default]
    Stop,
    /// Treat EOF as an idle read and keep polling. Serial drivers return
    /// zero bytes on read timeout.
    Idle,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Bound of the event channel. Default: 256.
    pub channel_capacity: usize,
    /// Decoder thresholds and read size.
    pub decoder: DecoderConfig,
    /// Sleep after a read error. Default: 100 ms.
    pub error_backoff: Duration,
    /// Sleep after an empty read. Default: 10 ms.
    pub idle_poll: Duration,
    pub eof: EofPolicy,
    /// Wait for the reader on stop before detaching it. Default: 500 ms.
    pub shutdown_timeout: Duration,
}

impl SessionConfig {
    pub fn validate(&self) -> Result<()> {
        if self.channel_capacity == 0 {
            return Err(LinkError::InvalidConfig(
                "channel capacity must be greater than zero".to_string(),
            ));
        }
        self.decoder.validate()?;
        Ok(())
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            decoder: DecoderConfig::default(),
            error_backoff: DEFAULT_ERROR_BACKOFF,
            idle_poll: DEFAULT_IDLE_POLL,
            eof: EofPolicy::Stop,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
        }
    }
}

/// Event delivered to the session consumer, in wire order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    Line(LogLine),
    Frame(SensorFrame),
    /// A read failed; the reader backs off and retries.
    ReadFailed { message: String },
    /// Last event of a session that ended on its own.
    Closed { stats: DecoderStats },
}

impl From<DecodeEvent> for LinkEvent {
    fn from(event: DecodeEvent) -> Self {
        match event {
            DecodeEvent::Line(line) => LinkEvent::Line(line),
            DecodeEvent::Frame(frame) => LinkEvent::Frame(frame),
        }
    }
}

/// Cloneable handle that asks a session's reader to stop.
#[derive(Debug, Clone)]
pub struct StopHandle {
    flag: Arc<AtomicBool>,
}

impl StopHandle {
    pub fn stop(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// A background reader decoding one byte source.
///
/// The reader thread owns the source and the [`StreamDecoder`]. Events
/// arrive on [`Session::events`] through a bounded channel, so a slow
/// consumer blocks the reader instead of growing memory. The stop flag is
/// checked once per read. A reader still blocked in `read` after
/// [`SessionConfig::shutdown_timeout`] is detached: it exits on its own once
/// the read returns, and `stop` reports the counters as of its last chunk.
#[derive(Debug)]
pub struct Session {
    events: Receiver<LinkEvent>,
    stop: StopHandle,
    stats: Arc<Mutex<DecoderStats>>,
    shutdown_timeout: Duration,
    handle: Option<JoinHandle<DecoderStats>>,
}

impl Session {
    /// Start reading `source` on a new thread.
    pub fn spawn<R>(source: R, config: SessionConfig) -> Result<Self>
    where
        R: Read + Send + 'static,
    {
        config.validate()?;
        let decoder = StreamDecoder::with_config(config.decoder.clone())?;
        let (tx, rx) = mpsc::sync_channel(config.channel_capacity);
        let stop = StopHandle {
            flag: Arc::new(AtomicBool::new(false)),
        };
        let stats = Arc::new(Mutex::new(DecoderStats::default()));
        let shutdown_timeout = config.shutdown_timeout;

        let reader = ReadLoop {
            source,
            decoder,
            tx,
            stop: stop.clone(),
            stats: Arc::clone(&stats),
            config,
        };
        let handle = thread::Builder::new()
            .name("ca64-reader".to_string())
            .spawn(move || reader.run())?;

        Ok(Self {
            events: rx,
            stop,
            stats,
            shutdown_timeout,
            handle: Some(handle),
        })
    }

    /// Receiver for decoded events. Disconnects once the reader exits.
    pub fn events(&self) -> &Receiver<LinkEvent> {
        &self.events
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Whether the reader thread has exited.
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Stop the reader and return the final decoder counters.
    ///
    /// Waits at most [`SessionConfig::shutdown_timeout`] for the reader to
    /// exit.
    pub fn stop(mut self) -> Result<DecoderStats> {
        self.shutdown()
    }

    fn shutdown(&mut self) -> Result<DecoderStats> {
        self.stop.stop();
        // Dropping the live receiver unblocks a reader waiting on a full channel.
        let (_, detached) = mpsc::sync_channel(0);
        drop(mem::replace(&mut self.events, detached));

        let Some(handle) = self.handle.take() else {
            return Ok(self.last_stats());
        };
        let deadline = Instant::now() + self.shutdown_timeout;
        while !handle.is_finished() {
            if Instant::now() >= deadline {
                warn!(
                    timeout_ms = self.shutdown_timeout.as_millis() as u64,
                    "reader blocked in read, detaching"
                );
                return Ok(self.last_stats());
            }
            thread::sleep(SHUTDOWN_POLL);
        }
        handle.join().map_err(|_| LinkError::ReaderPanicked)
    }

    fn last_stats(&self) -> DecoderStats {
        match self.stats.lock() {
            Ok(stats) => *stats,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if self.handle.is_some() {
            if let Err(err) = self.shutdown() {
                warn!(error = %err, "reader shutdown failed");
            }
        }
    }
}

struct ReadLoop<R> {
    source: R,
    decoder: StreamDecoder,
    tx: SyncSender<LinkEvent>,
    stop: StopHandle,
    stats: Arc<Mutex<DecoderStats>>,
    config: SessionConfig,
}

impl<R: Read> ReadLoop<R> {
    fn run(mut self) -> DecoderStats {
        info!(eof = ?self.config.eof, "reader started");
        let mut chunk = vec![0u8; self.config.decoder.read_chunk_size];
        let mut events = Vec::new();
        let mut closed = false;

        while !self.stop.is_stopped() {
            match self.source.read(&mut chunk) {
                Ok(0) => match self.config.eof {
                    EofPolicy::Stop => {
                        closed = true;
                        break;
                    }
                    EofPolicy::Idle => thread::sleep(self.config.idle_poll),
                },
                Ok(n) => {
                    self.decoder.feed_into(&chunk[..n], &mut events);
                    self.publish_stats();
                    if !self.deliver(&mut events) {
                        break;
                    }
                }
                Err(err) if err.kind() == ErrorKind::Interrupted => {}
                Err(err) if err.kind() == ErrorKind::TimedOut => {}
                Err(err) if err.kind() == ErrorKind::WouldBlock => {
                    thread::sleep(self.config.idle_poll)
                }
                Err(err) => {
                    warn!(error = %err, "read failed");
                    let event = LinkEvent::ReadFailed {
                        message: err.to_string(),
                    };
                    if self.tx.send(event).is_err() {
                        break;
                    }
                    thread::sleep(self.config.error_backoff);
                }
            }
        }

        let stats = *self.decoder.stats();
        if closed {
            // The consumer may already be gone; nothing left to tell it.
            let _ = self.tx.send(LinkEvent::Closed { stats });
        }
        info!(
            frames = stats.frames(),
            lines = stats.lines,
            resyncs = stats.resyncs,
            truncations = stats.truncations,
            "reader stopped"
        );
        stats
    }

    fn publish_stats(&self) {
        if let Ok(mut shared) = self.stats.lock() {
            *shared = *self.decoder.stats();
        }
    }

    fn deliver(&self, events: &mut Vec<DecodeEvent>) -> bool {
        for event in events.drain(..) {
            if self.tx.send(event.into()).is_err() {
                debug!("event receiver dropped");
                return false;
            }
        }
        true
    }
}
