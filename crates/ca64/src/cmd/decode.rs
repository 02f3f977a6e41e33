use std::fs::{File, OpenOptions};
use std::sync::mpsc::RecvTimeoutError;
use std::time::{Duration, Instant};

use ca64_frame::SensorFrame;
use ca64_link::{
    Command, CommandWriter, DeviceConfig, EofPolicy, FrameSampler, LinkEvent, Session,
    SessionConfig, StopHandle,
};
use tracing::info;

use crate::cmd::DecodeArgs;
use crate::exit::{io_error, link_error, CliError, CliResult, INTERNAL, SUCCESS};
use crate::output::{print_event, print_frame, print_line, print_stats, OutputFormat};

/// How often the consumer wakes to check for Ctrl-C and due samples.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

pub fn run(args: DecodeArgs, format: OutputFormat) -> CliResult<i32> {
    let source = open_source(&args)?;

    if let Some(path) = &args.config {
        let config = DeviceConfig::load(path)
            .map_err(|err| link_error(&format!("failed loading {}", path.display()), err))?;
        if args.apply {
            apply_config(&source, &config)?;
        }
    }

    let session_config = SessionConfig {
        eof: if args.follow {
            EofPolicy::Idle
        } else {
            EofPolicy::Stop
        },
        ..SessionConfig::default()
    };
    let session = Session::spawn(source, session_config)
        .map_err(|err| link_error("failed starting reader", err))?;
    let stop = session.stop_handle();
    install_ctrlc_handler(stop.clone())?;

    let mut printer = Printer {
        format,
        frames_only: args.frames_only,
        count: args.count,
        printed: 0,
        sampler: args
            .sample
            .map(|ms| FrameSampler::new(Duration::from_millis(ms))),
    };

    while !stop.is_stopped() && !printer.done() {
        let event = match session.events().recv_timeout(POLL_INTERVAL) {
            Ok(event) => event,
            Err(RecvTimeoutError::Timeout) => {
                printer.flush(Instant::now());
                continue;
            }
            Err(RecvTimeoutError::Disconnected) => break,
        };

        match event {
            LinkEvent::Frame(frame) => printer.frame(frame, Instant::now()),
            LinkEvent::Line(line) => {
                if !printer.frames_only {
                    print_line(&line, format);
                }
            }
            event @ LinkEvent::ReadFailed { .. } => print_event(&event, format),
            LinkEvent::Closed { stats } => {
                printer.finish();
                if !printer.frames_only {
                    print_stats(&stats, format);
                }
                break;
            }
        }
    }

    let stats = session
        .stop()
        .map_err(|err| link_error("reader shutdown failed", err))?;
    info!(
        frames_ok = stats.frames_ok,
        frames_crc_failed = stats.frames_crc_failed,
        lines = stats.lines,
        resyncs = stats.resyncs,
        truncations = stats.truncations,
        "decode finished"
    );
    Ok(SUCCESS)
}

fn open_source(args: &DecodeArgs) -> CliResult<File> {
    let opened = if args.apply {
        OpenOptions::new().read(true).write(true).open(&args.path)
    } else {
        File::open(&args.path)
    };
    opened.map_err(|err| io_error(&format!("failed opening {}", args.path.display()), err))
}

fn apply_config(device: &File, config: &DeviceConfig) -> CliResult<()> {
    let mut commands = config
        .commands()
        .map_err(|err| link_error("invalid device config", err))?;
    commands.push(Command::Start);

    let port = device
        .try_clone()
        .map_err(|err| io_error("failed cloning device handle", err))?;
    CommandWriter::new(port)
        .send_all(&commands)
        .map_err(|err| link_error("failed applying device config", err))?;
    info!(commands = commands.len(), "device config applied");
    Ok(())
}

fn install_ctrlc_handler(stop: StopHandle) -> CliResult<()> {
    ctrlc::set_handler(move || stop.stop()).map_err(|err| {
        CliError::new(INTERNAL, format!("signal handler setup failed: {err}"))
    })
}

struct Printer {
    format: OutputFormat,
    frames_only: bool,
    count: Option<usize>,
    printed: usize,
    sampler: Option<FrameSampler>,
}

impl Printer {
    fn done(&self) -> bool {
        self.count.is_some_and(|count| self.printed >= count)
    }

    fn frame(&mut self, frame: SensorFrame, now: Instant) {
        let due = match self.sampler.as_mut() {
            Some(sampler) => sampler.offer(frame, now),
            None => Some(frame),
        };
        if let Some(frame) = due {
            self.emit(&frame);
        }
    }

    fn flush(&mut self, now: Instant) {
        if let Some(frame) = self.sampler.as_mut().and_then(|s| s.flush(now)) {
            self.emit(&frame);
        }
    }

    /// Show the frame still held by the sampler when the stream ends.
    fn finish(&mut self) {
        if let Some(frame) = self.sampler.as_mut().and_then(FrameSampler::take_pending) {
            self.emit(&frame);
        }
    }

    fn emit(&mut self, frame: &SensorFrame) {
        if self.done() {
            return;
        }
        print_frame(frame, self.format);
        self.printed = self.printed.saturating_add(1);
    }
}
