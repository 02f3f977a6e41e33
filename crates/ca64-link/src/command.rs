use std::fmt;
use std::io::{ErrorKind, Write};
use std::str::FromStr;

use tracing::debug;

use crate::error::{LinkError, Result};

/// Lowest and highest I2C clock the bridge accepts.
pub const MIN_I2C_HZ: u32 = 10_000;
pub const MAX_I2C_HZ: u32 = 1_000_000;

/// Cells available in a frame; `rows * cols` must fit.
pub const MAX_ARRAY_CELLS: u16 = ca64_frame::VALUE_COUNT as u16;

/// A bridge parameter written with `!SET`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Setting {
    /// Active M×N sensor array.
    Array { rows: u8, cols: u8 },
    /// I2C bus clock in Hz.
    I2cHz(u32),
    /// I2C repeated-start between write and read.
    RepeatedStart(bool),
    /// Scan period in microseconds.
    PeriodUs(u32),
    /// Guard time between transactions in microseconds.
    GuardUs(u32),
    /// Target sensor id on the bus.
    SensorId(u8),
    /// Raw count source selector.
    RawSource(bool),
}

impl Setting {
    /// Validated array shape.
    pub fn array(rows: u8, cols: u8) -> Result<Self> {
        if rows == 0 || cols == 0 || (rows as u16) * (cols as u16) > MAX_ARRAY_CELLS {
            return Err(LinkError::InvalidCommand(format!(
                "array {rows}x{cols} must have 1..={MAX_ARRAY_CELLS} cells"
            )));
        }
        Ok(Setting::Array { rows, cols })
    }

    /// Validated I2C clock.
    pub fn i2c_hz(hz: u32) -> Result<Self> {
        if !(MIN_I2C_HZ..=MAX_I2C_HZ).contains(&hz) {
            return Err(LinkError::InvalidCommand(format!(
                "i2c clock {hz} Hz outside {MIN_I2C_HZ}..={MAX_I2C_HZ}"
            )));
        }
        Ok(Setting::I2cHz(hz))
    }

    /// Validated scan period.
    pub fn period_us(us: u32) -> Result<Self> {
        if us == 0 {
            return Err(LinkError::InvalidCommand(
                "period must be greater than zero".to_string(),
            ));
        }
        Ok(Setting::PeriodUs(us))
    }

    pub fn name(&self) -> &'static str {
        match self {
            Setting::Array { .. } => "ARRAY",
            Setting::I2cHz(_) => "I2C",
            Setting::RepeatedStart(_) => "RS",
            Setting::PeriodUs(_) => "PERIOD_US",
            Setting::GuardUs(_) => "GUARD_US",
            Setting::SensorId(_) => "SENSOR_ID",
            Setting::RawSource(_) => "RAWSRC",
        }
    }
}

impl fmt::Display for Setting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Setting::Array { rows, cols } => write!(f, "ARRAY {rows} {cols}"),
            Setting::I2cHz(hz) => write!(f, "I2C {hz}"),
            Setting::RepeatedStart(on) => write!(f, "RS {}", u8::from(*on)),
            Setting::PeriodUs(us) => write!(f, "PERIOD_US {us}"),
            Setting::GuardUs(us) => write!(f, "GUARD_US {us}"),
            Setting::SensorId(id) => write!(f, "SENSOR_ID {id}"),
            Setting::RawSource(on) => write!(f, "RAWSRC {}", u8::from(*on)),
        }
    }
}

/// Outbound bridge command. `Display` gives the wire text without newline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Start,
    Stop,
    ReadOnce,
    Stat,
    Set(Setting),
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Start => f.write_str("!START"),
            Command::Stop => f.write_str("!STOP"),
            Command::ReadOnce => f.write_str("!READONCE"),
            Command::Stat => f.write_str("!STAT"),
            Command::Set(setting) => write!(f, "!SET {setting}"),
        }
    }
}

impl FromStr for Command {
    type Err = LinkError;

    /// Parse `!SET PERIOD_US 5000` style text. Keywords are case
    /// insensitive and the leading `!` is optional.
    fn from_str(input: &str) -> Result<Self> {
        let mut words = input.split_whitespace();
        let Some(head) = words.next() else {
            return Err(LinkError::InvalidCommand("empty command".to_string()));
        };
        let head = head.strip_prefix('!').unwrap_or(head).to_ascii_uppercase();

        let command = match head.as_str() {
            "START" => Command::Start,
            "STOP" => Command::Stop,
            "READONCE" => Command::ReadOnce,
            "STAT" => Command::Stat,
            "SET" => Command::Set(parse_setting(&mut words)?),
            other => {
                return Err(LinkError::InvalidCommand(format!(
                    "unknown command: {other}"
                )))
            }
        };

        if let Some(extra) = words.next() {
            return Err(LinkError::InvalidCommand(format!(
                "unexpected argument: {extra}"
            )));
        }
        Ok(command)
    }
}

fn parse_setting<'a>(words: &mut impl Iterator<Item = &'a str>) -> Result<Setting> {
    let param = words
        .next()
        .ok_or_else(|| LinkError::InvalidCommand("SET requires a parameter".to_string()))?
        .to_ascii_uppercase();

    match param.as_str() {
        "ARRAY" => {
            let rows = parse_value(words, "rows")?;
            let cols = parse_value(words, "cols")?;
            Setting::array(rows, cols)
        }
        "I2C" => Setting::i2c_hz(parse_value(words, "hz")?),
        "RS" => Ok(Setting::RepeatedStart(parse_flag(words, "RS")?)),
        "PERIOD_US" => Setting::period_us(parse_value(words, "period")?),
        "GUARD_US" => Ok(Setting::GuardUs(parse_value(words, "guard")?)),
        "SENSOR_ID" => Ok(Setting::SensorId(parse_value(words, "sensor id")?)),
        "RAWSRC" => Ok(Setting::RawSource(parse_flag(words, "RAWSRC")?)),
        other => Err(LinkError::InvalidCommand(format!(
            "unknown parameter: {other}"
        ))),
    }
}

fn parse_value<'a, T: FromStr>(
    words: &mut impl Iterator<Item = &'a str>,
    what: &str,
) -> Result<T> {
    let word = words
        .next()
        .ok_or_else(|| LinkError::InvalidCommand(format!("missing {what}")))?;
    word.parse()
        .map_err(|_| LinkError::InvalidCommand(format!("invalid {what}: {word}")))
}

fn parse_flag<'a>(words: &mut impl Iterator<Item = &'a str>, what: &str) -> Result<bool> {
    match parse_value::<u8>(words, what)? {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(LinkError::InvalidCommand(format!(
            "{what} must be 0 or 1, got {other}"
        ))),
    }
}

/// Writes newline-terminated commands to the bridge.
pub struct CommandWriter<T> {
    inner: T,
}

impl<T: Write> CommandWriter<T> {
    pub fn new(inner: T) -> Self {
        Self { inner }
    }

    /// Send one command and flush.
    pub fn send(&mut self, command: &Command) -> Result<()> {
        let line = format!("{command}\n");
        let mut offset = 0usize;
        while offset < line.len() {
            match self.inner.write(&line.as_bytes()[offset..]) {
                Ok(0) => return Err(LinkError::Io(ErrorKind::WriteZero.into())),
                Ok(n) => offset += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(LinkError::Io(err)),
            }
        }
        self.inner.flush()?;
        debug!(%command, "sent command");
        Ok(())
    }

    /// Send commands in order, stopping at the first failure.
    pub fn send_all<'a>(&mut self, commands: impl IntoIterator<Item = &'a Command>) -> Result<()> {
        for command in commands {
            self.send(command)?;
        }
        Ok(())
    }

    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    pub fn into_inner(self) -> T {
        self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_wire_text() {
        assert_eq!(Command::Start.to_string(), "!START");
        assert_eq!(Command::ReadOnce.to_string(), "!READONCE");
        assert_eq!(
            Command::Set(Setting::Array { rows: 4, cols: 4 }).to_string(),
            "!SET ARRAY 4 4"
        );
        assert_eq!(
            Command::Set(Setting::RepeatedStart(true)).to_string(),
            "!SET RS 1"
        );
        assert_eq!(
            Command::Set(Setting::RawSource(false)).to_string(),
            "!SET RAWSRC 0"
        );
    }

    #[test]
    fn parses_commands() {
        assert_eq!("!STAT".parse::<Command>().unwrap(), Command::Stat);
        assert_eq!("stop".parse::<Command>().unwrap(), Command::Stop);
        assert_eq!(
            "!set period_us 5000".parse::<Command>().unwrap(),
            Command::Set(Setting::PeriodUs(5000))
        );
        assert_eq!(
            "!SET I2C 400000".parse::<Command>().unwrap(),
            Command::Set(Setting::I2cHz(400_000))
        );
        assert_eq!(
            "!SET SENSOR_ID 3".parse::<Command>().unwrap(),
            Command::Set(Setting::SensorId(3))
        );
    }

    #[test]
    fn parse_display_agree() {
        let commands = [
            Command::Start,
            Command::Set(Setting::Array { rows: 2, cols: 8 }),
            Command::Set(Setting::GuardUs(150)),
            Command::Set(Setting::RawSource(true)),
        ];
        for command in commands {
            assert_eq!(command.to_string().parse::<Command>().unwrap(), command);
        }
    }

    #[test]
    fn rejects_out_of_range_values() {
        for bad in [
            "",
            "!RESET",
            "!SET",
            "!SET ARRAY 9 8",
            "!SET ARRAY 0 4",
            "!SET ARRAY 4",
            "!SET I2C 5",
            "!SET RS 2",
            "!SET PERIOD_US 0",
            "!SET SENSOR_ID 256",
            "!SET GUARD_US -1",
            "!START now",
            "!SET BAUD 9600",
        ] {
            assert!(
                matches!(bad.parse::<Command>(), Err(LinkError::InvalidCommand(_))),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn writer_appends_newline() {
        let mut writer = CommandWriter::new(Vec::<u8>::new());
        writer
            .send_all(&[Command::Start, Command::Set(Setting::GuardUs(150))])
            .unwrap();
        assert_eq!(writer.into_inner(), b"!START\n!SET GUARD_US 150\n");
    }
}
