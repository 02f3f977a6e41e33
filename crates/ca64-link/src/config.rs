use std::path::Path;

use serde::{Deserialize, Deserializer, Serialize};

use crate::command::{Command, Setting};
use crate::error::{LinkError, Result};

/// Bridge settings pushed to the device after connecting.
///
/// Flags accept either JSON booleans or the `0`/`1` integers the device
/// protocol uses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DeviceConfig {
    /// Active array rows. Default: 4.
    pub rows: u8,
    /// Active array columns. Default: 4.
    pub cols: u8,
    /// I2C bus clock. Default: 400 kHz.
    pub i2c_hz: u32,
    /// I2C repeated start. Default: on.
    #[serde(deserialize_with = "flag")]
    pub rs: bool,
    /// Scan period. Default: 5000 us.
    pub period_us: u32,
    /// Inter-transaction guard time. Default: 150 us.
    pub guard_us: u32,
    /// Target sensor. Default: 0.
    pub sensor_id: u8,
    /// Raw count source. Default: 0.
    #[serde(deserialize_with = "flag")]
    pub rawsrc: bool,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            rows: 4,
            cols: 4,
            i2c_hz: 400_000,
            rs: true,
            period_us: 5000,
            guard_us: 150,
            sensor_id: 0,
            rawsrc: false,
        }
    }
}

impl DeviceConfig {
    /// Load and validate a JSON config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Parse and validate JSON text. Missing fields take defaults.
    pub fn from_json(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.commands().map(|_| ())
    }

    /// The `!SET` sequence that applies this config: link settings first,
    /// then the array shape.
    pub fn commands(&self) -> Result<Vec<Command>> {
        let settings = [
            Setting::i2c_hz(self.i2c_hz),
            Ok(Setting::RepeatedStart(self.rs)),
            Setting::period_us(self.period_us),
            Ok(Setting::GuardUs(self.guard_us)),
            Ok(Setting::SensorId(self.sensor_id)),
            Ok(Setting::RawSource(self.rawsrc)),
            Setting::array(self.rows, self.cols),
        ];
        settings
            .into_iter()
            .map(|setting| match setting {
                Ok(setting) => Ok(Command::Set(setting)),
                Err(LinkError::InvalidCommand(message)) => Err(LinkError::InvalidConfig(message)),
                Err(err) => Err(err),
            })
            .collect()
    }
}

fn flag<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<bool, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Int(u8),
    }

    match Flag::deserialize(deserializer)? {
        Flag::Bool(on) => Ok(on),
        Flag::Int(0) => Ok(false),
        Flag::Int(1) => Ok(true),
        Flag::Int(other) => Err(serde::de::Error::custom(format!(
            "flag must be 0 or 1, got {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_expand_to_commands() {
        let lines: Vec<String> = DeviceConfig::default()
            .commands()
            .unwrap()
            .iter()
            .map(ToString::to_string)
            .collect();

        assert_eq!(
            lines,
            [
                "!SET I2C 400000",
                "!SET RS 1",
                "!SET PERIOD_US 5000",
                "!SET GUARD_US 150",
                "!SET SENSOR_ID 0",
                "!SET RAWSRC 0",
                "!SET ARRAY 4 4",
            ]
        );
    }

    #[test]
    fn partial_json_uses_defaults() {
        let config = DeviceConfig::from_json(r#"{"rows": 8, "cols": 8, "rs": 0}"#).unwrap();
        assert_eq!(config.rows, 8);
        assert!(!config.rs);
        assert_eq!(config.period_us, 5000);
    }

    #[test]
    fn accepts_bool_flags() {
        let config = DeviceConfig::from_json(r#"{"rawsrc": true}"#).unwrap();
        assert!(config.rawsrc);
    }

    #[test]
    fn rejects_bad_values() {
        assert!(matches!(
            DeviceConfig::from_json(r#"{"rows": 9, "cols": 8}"#),
            Err(LinkError::InvalidConfig(_))
        ));
        assert!(matches!(
            DeviceConfig::from_json(r#"{"period_us": 0}"#),
            Err(LinkError::InvalidConfig(_))
        ));
        assert!(matches!(
            DeviceConfig::from_json(r#"{"rs": 2}"#),
            Err(LinkError::Json(_))
        ));
        assert!(matches!(
            DeviceConfig::from_json(r#"{"baud": 9600}"#),
            Err(LinkError::Json(_))
        ));
    }

    #[test]
    fn load_from_file() {
        let path = std::env::temp_dir().join(format!(
            "ca64-config-{}-{}.json",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .expect("time should be after epoch")
                .as_nanos()
        ));
        std::fs::write(&path, r#"{"sensor_id": 2, "i2c_hz": 100000}"#).unwrap();

        let config = DeviceConfig::load(&path).unwrap();
        assert_eq!(config.sensor_id, 2);
        assert_eq!(config.i2c_hz, 100_000);

        let _ = std::fs::remove_file(&path);
        assert!(matches!(DeviceConfig::load(&path), Err(LinkError::Io(_))));
    }
}
