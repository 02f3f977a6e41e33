//! Decoder and tooling for CA64 capacitive sensor telemetry.
//!
//! A CA64 bridge interleaves newline-terminated status text with binary
//! 8×8 sensor frames on one byte stream. This crate bundles the pieces:
//!
//! - [`frame`]: stream decoder, wire codec and CRC
//! - [`link`]: background reader session, device commands and config
//!
//! The `ca64` binary (feature `cli`) decodes captures and devices from the
//! command line.

/// Re-export frame types.
pub mod frame {
    pub use ca64_frame::*;
}

/// Re-export link types.
pub mod link {
    pub use ca64_link::*;
}
