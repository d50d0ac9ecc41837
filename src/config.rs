//! JSON configuration for the phase pins and the decoder.
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::{fs::File, io::BufReader, path::Path, time::Duration};

use crate::watchdog::DEFAULT_WINDOW;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecoderConfig {
    /// How long a half-completed sequence may wait for its partner edge
    #[serde(default = "default_watchdog_ms")]
    pub watchdog_ms: u64,
}

impl DecoderConfig {
    pub fn watchdog(&self) -> Duration {
        Duration::from_millis(self.watchdog_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.watchdog_ms == 0 {
            bail!("watchdog_ms must be greater than zero");
        }
        Ok(())
    }
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            watchdog_ms: default_watchdog_ms(),
        }
    }
}

fn default_watchdog_ms() -> u64 {
    DEFAULT_WINDOW.as_millis() as u64
}

/// A phase input pin and its debounce parameters.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PinConfig {
    pub pin: u64,
    /// Edges closer than this to the previous accepted edge are ignored
    #[serde(default = "default_min_pulse_us")]
    pub min_pulse_us: u64,
    /// Delay between an interrupt and reading the settled level
    #[serde(default = "default_settle_us")]
    pub settle_us: u64,
}

impl PinConfig {
    pub fn new(pin: u64) -> Self {
        Self {
            pin,
            min_pulse_us: default_min_pulse_us(),
            settle_us: default_settle_us(),
        }
    }

    pub fn min_pulse(&self) -> Duration {
        Duration::from_micros(self.min_pulse_us)
    }

    pub fn settle(&self) -> Duration {
        Duration::from_micros(self.settle_us)
    }
}

fn default_min_pulse_us() -> u64 {
    1000
}

fn default_settle_us() -> u64 {
    200
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Configuration {
    pub phase_a: PinConfig,
    pub phase_b: PinConfig,
    #[serde(default)]
    pub decoder: DecoderConfig,
    /// Directory for the rotation journal, disabled when absent
    #[serde(default)]
    pub log_dir: Option<String>,
}

impl Configuration {
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Configuration> {
        let path = path.as_ref();
        let f = File::open(path)
            .with_context(|| format!("could not open configuration {}", path.display()))?;
        let reader = BufReader::new(f);
        let config: Configuration = serde_json::from_reader(reader)
            .with_context(|| format!("invalid configuration {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn write_to_path<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let f = File::create(path.as_ref())?;
        serde_json::to_writer_pretty(&f, self)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.phase_a.pin == self.phase_b.pin {
            bail!(
                "phase A and phase B cannot share GPIO pin {}",
                self.phase_a.pin
            );
        }
        self.decoder.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        file.write_all(contents.as_bytes()).expect("write config");
        file
    }

    #[test]
    fn missing_fields_use_defaults() {
        let file = write_config(r#"{ "phase_a": { "pin": 27 }, "phase_b": { "pin": 22 } }"#);
        let config = Configuration::load_from_path(file.path()).unwrap();

        assert_eq!(config.phase_a, PinConfig::new(27));
        assert_eq!(config.phase_b.pin, 22);
        assert_eq!(config.decoder.watchdog(), Duration::from_millis(50));
        assert_eq!(config.log_dir, None);
    }

    #[test]
    fn round_trips_through_file() {
        let config = Configuration {
            phase_a: PinConfig {
                pin: 5,
                min_pulse_us: 500,
                settle_us: 0,
            },
            phase_b: PinConfig::new(6),
            decoder: DecoderConfig { watchdog_ms: 80 },
            log_dir: Some("log".to_string()),
        };
        let file = tempfile::NamedTempFile::new().unwrap();
        config.write_to_path(file.path()).unwrap();
        assert_eq!(Configuration::load_from_path(file.path()).unwrap(), config);
    }

    #[test]
    fn rejects_shared_pin() {
        let file = write_config(r#"{ "phase_a": { "pin": 4 }, "phase_b": { "pin": 4 } }"#);
        let err = Configuration::load_from_path(file.path()).unwrap_err();
        assert!(err.to_string().contains("share GPIO pin 4"));
    }

    #[test]
    fn rejects_zero_watchdog() {
        let file = write_config(
            r#"{ "phase_a": { "pin": 1 }, "phase_b": { "pin": 2 }, "decoder": { "watchdog_ms": 0 } }"#,
        );
        assert!(Configuration::load_from_path(file.path()).is_err());
    }

    #[test]
    fn missing_file_names_path() {
        let err = Configuration::load_from_path("/nonexistent/rotary.json").unwrap_err();
        assert!(err.to_string().contains("/nonexistent/rotary.json"));
    }
}
