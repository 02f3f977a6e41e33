/// Errors that can occur while decoding or encoding the telemetry stream.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// An I/O error occurred while reading or writing the stream.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The byte source reached end of stream.
    #[error("connection closed")]
    ConnectionClosed,

    /// Decoder thresholds are inconsistent.
    #[error("invalid decoder config: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, FrameError>;
