//! Link-level plumbing for a CA64 sensor bridge.
//!
//! [`Session`] runs the blocking read loop on its own thread and hands
//! decoded lines and frames to the consumer over a bounded channel.
//! [`Command`] and [`DeviceConfig`] cover the outbound side.

pub mod command;
pub mod config;
pub mod cycle;
pub mod error;
pub mod sampler;
pub mod session;

pub use command::{Command, CommandWriter, Setting};
pub use config::DeviceConfig;
pub use cycle::{element_index, read_cycle, read_scan, CycleBus, CyclePacket, ScanAssembler};
pub use error::{LinkError, Result};
pub use sampler::{FrameSampler, DEFAULT_SAMPLE_INTERVAL};
pub use session::{EofPolicy, LinkEvent, Session, SessionConfig, StopHandle};
