use std::io::{IsTerminal, Write};

use ca64_frame::{DecoderStats, FrameWriter, LogLine, SensorFrame, MATRIX_COLS};
use ca64_link::{Command, DeviceConfig, LinkEvent};
use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    /// Re-emit the cleaned stream: lines as text, frames as wire bytes.
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum EventOutput<'a> {
    Line {
        kind: &'static str,
        text: &'a str,
    },
    Frame {
        sequence: u8,
        valid: bool,
        crc_received: u16,
        crc_computed: u16,
        min: u16,
        max: u16,
        values: &'a [u16],
    },
    ReadFailed {
        message: &'a str,
    },
    Closed {
        stats: StatsOutput,
    },
}

#[derive(Serialize)]
struct StatsOutput {
    lines: u64,
    frames_ok: u64,
    frames_crc_failed: u64,
    resyncs: u64,
    truncations: u64,
    bytes_discarded: u64,
}

impl From<&DecoderStats> for StatsOutput {
    fn from(stats: &DecoderStats) -> Self {
        Self {
            lines: stats.lines,
            frames_ok: stats.frames_ok,
            frames_crc_failed: stats.frames_crc_failed,
            resyncs: stats.resyncs,
            truncations: stats.truncations,
            bytes_discarded: stats.bytes_discarded,
        }
    }
}

pub fn print_event(event: &LinkEvent, format: OutputFormat) {
    match event {
        LinkEvent::Line(line) => print_line(line, format),
        LinkEvent::Frame(frame) => print_frame(frame, format),
        LinkEvent::ReadFailed { message } => match format {
            OutputFormat::Json => print_json(&EventOutput::ReadFailed { message }),
            OutputFormat::Raw => {}
            OutputFormat::Table | OutputFormat::Pretty => println!("read failed: {message}"),
        },
        LinkEvent::Closed { stats } => print_stats(stats, format),
    }
}

pub fn print_line(line: &LogLine, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(&EventOutput::Line {
            kind: line.kind.as_str(),
            text: &line.text,
        }),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["KIND", "TEXT"])
                .add_row(vec![line.kind.as_str(), line.text.as_str()]);
            println!("{table}");
        }
        OutputFormat::Pretty => println!("{line}"),
        OutputFormat::Raw => {
            let mut writer = FrameWriter::new(std::io::stdout().lock());
            let _ = writer.send_line(&line.text);
            let _ = writer.flush();
        }
    }
}

pub fn print_frame(frame: &SensorFrame, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(&EventOutput::Frame {
            sequence: frame.sequence,
            valid: frame.is_valid(),
            crc_received: frame.crc_received,
            crc_computed: frame.crc_computed,
            min: frame.min(),
            max: frame.max(),
            values: &frame.values,
        }),
        OutputFormat::Table => {
            println!("{frame}");
            let mut header = vec!["ROW".to_string()];
            header.extend((0..MATRIX_COLS).map(|col| format!("C{col}")));

            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(header);
            for (row, cells) in frame.values.chunks(MATRIX_COLS).enumerate() {
                let mut line = vec![format!("R{row}")];
                line.extend(cells.iter().map(u16::to_string));
                table.add_row(line);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => println!("{frame}"),
        OutputFormat::Raw => {
            let mut writer = FrameWriter::new(std::io::stdout().lock());
            let _ = writer.send_raw_frame(frame.sequence, &frame.values, frame.crc_received);
            let _ = writer.flush();
        }
    }
}

pub fn print_stats(stats: &DecoderStats, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(&EventOutput::Closed {
            stats: stats.into(),
        }),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["COUNTER", "VALUE"]);
            for (name, value) in [
                ("lines", stats.lines),
                ("frames_ok", stats.frames_ok),
                ("frames_crc_failed", stats.frames_crc_failed),
                ("resyncs", stats.resyncs),
                ("truncations", stats.truncations),
                ("bytes_discarded", stats.bytes_discarded),
            ] {
                table.add_row(vec![name.to_string(), value.to_string()]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => println!(
            "closed: lines={} frames_ok={} frames_crc_failed={} resyncs={} truncations={} bytes_discarded={}",
            stats.lines,
            stats.frames_ok,
            stats.frames_crc_failed,
            stats.resyncs,
            stats.truncations,
            stats.bytes_discarded
        ),
        OutputFormat::Raw => {}
    }
}

#[derive(Serialize)]
struct ConfigOutput<'a> {
    config: &'a DeviceConfig,
    commands: Vec<String>,
}

pub fn print_config(config: &DeviceConfig, commands: &[Command], format: OutputFormat) {
    let lines: Vec<String> = commands.iter().map(ToString::to_string).collect();
    match format {
        OutputFormat::Json => print_json(&ConfigOutput {
            config,
            commands: lines,
        }),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["SETTING", "VALUE", "COMMAND"]);
            let values = [
                ("i2c_hz", config.i2c_hz.to_string()),
                ("rs", u8::from(config.rs).to_string()),
                ("period_us", config.period_us.to_string()),
                ("guard_us", config.guard_us.to_string()),
                ("sensor_id", config.sensor_id.to_string()),
                ("rawsrc", u8::from(config.rawsrc).to_string()),
                ("array", format!("{}x{}", config.rows, config.cols)),
            ];
            for ((name, value), command) in values.into_iter().zip(&lines) {
                table.add_row(vec![name.to_string(), value, command.clone()]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty | OutputFormat::Raw => {
            for line in &lines {
                println!("{line}");
            }
        }
    }
}

#[derive(Serialize)]
pub struct SentOutput<'a> {
    pub path: String,
    pub commands: &'a [String],
}

#[derive(Serialize)]
pub struct SynthOutput {
    pub path: String,
    pub frames: u32,
    pub corrupted: u32,
    pub noise_bytes: usize,
    pub bytes: u64,
}

/// Print a command summary. Raw and pretty formats get plain text.
pub fn print_summary<T: Serialize>(summary: &T, text: &str, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(summary),
        OutputFormat::Table | OutputFormat::Pretty | OutputFormat::Raw => println!("{text}"),
    }
}

fn print_json<T: Serialize + ?Sized>(out: &T) {
    let mut stdout = std::io::stdout().lock();
    let _ = writeln!(
        stdout,
        "{}",
        serde_json::to_string(out).unwrap_or_else(|_| "{}".to_string())
    );
}
