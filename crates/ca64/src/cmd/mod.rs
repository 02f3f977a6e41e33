use clap::{Args, Subcommand};
use std::path::PathBuf;

use crate::exit::CliResult;
use crate::output::OutputFormat;

pub mod config;
pub mod decode;
pub mod send;
pub mod synth;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Decode lines and frames from a capture file or device.
    Decode(DecodeArgs),
    /// Write commands to a device.
    Send(SendArgs),
    /// Write a synthetic capture file.
    Synth(SynthArgs),
    /// Validate a device config and show the commands it expands to.
    Config(ConfigArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Decode(args) => decode::run(args, format),
        Command::Send(args) => send::run(args, format),
        Command::Synth(args) => synth::run(args, format),
        Command::Config(args) => config::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct DecodeArgs {
    /// Capture file or device node to read.
    pub path: PathBuf,
    /// Keep reading at end of input instead of exiting.
    #[arg(long)]
    pub follow: bool,
    /// Exit after printing N frames.
    #[arg(long)]
    pub count: Option<usize>,
    /// Print frames only, not text lines.
    #[arg(long)]
    pub frames_only: bool,
    /// Print at most one frame per interval in milliseconds, keeping the latest.
    #[arg(long, value_name = "MS")]
    pub sample: Option<u64>,
    /// Device config file (JSON).
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,
    /// Write the config and `!START` to the device before decoding.
    #[arg(long, requires = "config")]
    pub apply: bool,
}

#[derive(Args, Debug)]
pub struct SendArgs {
    /// Device node to write to.
    pub path: PathBuf,
    /// Commands, one per argument (e.g. '!SET ARRAY 4 4' '!START').
    #[arg(required = true, num_args = 1..)]
    pub commands: Vec<String>,
}

#[derive(Args, Debug)]
pub struct SynthArgs {
    /// Output capture file.
    pub out: PathBuf,
    /// Number of frames to write.
    #[arg(long, default_value = "10")]
    pub frames: u32,
    /// Bytes of marker-free line noise before each frame.
    #[arg(long, value_name = "BYTES", default_value = "0")]
    pub noise: usize,
    /// Corrupt the checksum of every Kth frame.
    #[arg(long, value_name = "K")]
    pub corrupt_every: Option<u32>,
    /// Seed for values and noise.
    #[arg(long, default_value = "1")]
    pub seed: u32,
}

#[derive(Args, Debug)]
pub struct ConfigArgs {
    /// Device config file (JSON). Defaults apply when omitted.
    pub file: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}
