use std::fs::{self, File};
use std::io::{BufWriter, Write};

use ca64_frame::codec::frame_checksum;
use ca64_frame::{FrameWriter, VALUE_COUNT};

use crate::cmd::SynthArgs;
use crate::exit::{frame_error, io_error, CliResult, SUCCESS};
use crate::output::{print_summary, OutputFormat, SynthOutput};

/// Status lines are written after every this many frames.
const STAT_EVERY: u32 = 10;

pub fn run(args: SynthArgs, format: OutputFormat) -> CliResult<i32> {
    let file = File::create(&args.out)
        .map_err(|err| io_error(&format!("failed creating {}", args.out.display()), err))?;
    let mut writer = FrameWriter::new(BufWriter::new(file));
    let corrupted =
        write_capture(&mut writer, &args).map_err(|err| frame_error("synth failed", err))?;
    writer
        .flush()
        .map_err(|err| frame_error("synth failed", err))?;
    drop(writer);

    let bytes = fs::metadata(&args.out)
        .map_err(|err| io_error(&format!("failed reading {}", args.out.display()), err))?
        .len();
    let summary = SynthOutput {
        path: args.out.display().to_string(),
        frames: args.frames,
        corrupted,
        noise_bytes: args.noise.saturating_mul(args.frames as usize),
        bytes,
    };
    let text = format!(
        "wrote {} frames ({} corrupted) to {} ({} bytes)",
        summary.frames, summary.corrupted, summary.path, summary.bytes
    );
    print_summary(&summary, &text, format);
    Ok(SUCCESS)
}

/// Write a capture: connect banner, frames with optional leading noise,
/// periodic status lines, disconnect banner. Returns how many frames were
/// written with a bad checksum.
fn write_capture<W: Write>(
    writer: &mut FrameWriter<W>,
    args: &SynthArgs,
) -> ca64_frame::Result<u32> {
    let mut rng = Lcg(args.seed);
    let mut corrupted = 0u32;

    writer.send_line("#OK CONNECT")?;
    writer.send_line(">!START")?;
    for index in 0..args.frames {
        if args.noise > 0 {
            writer.send_bytes(&rng.noise(args.noise))?;
        }

        let sequence = (index % 256) as u8;
        let values = rng.values(index);
        let corrupt = args
            .corrupt_every
            .is_some_and(|every| every > 0 && (index + 1) % every == 0);
        if corrupt {
            let payload: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
            let checksum = frame_checksum(sequence, &payload) ^ 0xFFFF;
            writer.send_raw_frame(sequence, &values, checksum)?;
            corrupted += 1;
        } else {
            writer.send_frame(sequence, &values)?;
        }

        if (index + 1) % STAT_EVERY == 0 {
            writer.send_line(&format!("#STAT frames={}", index + 1))?;
        }
    }
    writer.send_line("#OK DISCONNECT")?;
    Ok(corrupted)
}

/// Deterministic generator for values and noise.
struct Lcg(u32);

impl Lcg {
    fn next(&mut self) -> u32 {
        self.0 = self.0.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
        self.0 >> 8
    }

    /// Noise that can never form a marker or end a line.
    fn noise(&mut self, len: usize) -> Vec<u8> {
        (0..len)
            .map(|_| match self.next() as u8 {
                b'C' | b'\n' => b'.',
                b => b,
            })
            .collect()
    }

    /// A smooth baseline with a slowly moving touch bump and jitter.
    fn values(&mut self, index: u32) -> [u16; VALUE_COUNT] {
        let touch = (index as usize) % VALUE_COUNT;
        let mut values = [0u16; VALUE_COUNT];
        for (cell, value) in values.iter_mut().enumerate() {
            let jitter = (self.next() % 16) as u16;
            let bump = if cell == touch { 400 } else { 0 };
            *value = 1000 + (cell as u16) * 4 + jitter + bump;
        }
        values
    }
}
