/// Errors that can occur on the device link.
#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    /// Decoder-level error.
    #[error("frame error: {0}")]
    Frame(#[from] ca64_frame::FrameError),

    /// An I/O error occurred on the device or a config file.
    #[error("link I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A device command could not be parsed or is out of range.
    #[error("invalid command: {0}")]
    InvalidCommand(String),

    /// Device or session configuration is out of range.
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    /// JSON serialization/deserialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// An I2C cycle packet had an unexpected length.
    #[error("unexpected cycle packet length {len} (expected 22 or 10)")]
    CyclePacket { len: usize },

    /// A cycle number past the end of a scan.
    #[error("cycle {cycle} is outside a 16-cycle scan")]
    CycleOutOfRange { cycle: u8 },

    /// The reader thread panicked.
    #[error("reader thread panicked")]
    ReaderPanicked,
}

pub type Result<T> = std::result::Result<T, LinkError>;
