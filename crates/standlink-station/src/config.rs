//! Station configuration.
//!
//! Loaded from JSON. Every field has a default, so `{}` is a valid config
//! describing the stock four-pressure, six-valve stand.

use std::fmt;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use standlink_frame::{CommandFormat, FrameCodec, FrameLayout, MAX_CHANNELS};
use standlink_transport::DEFAULT_BAUD;

use crate::calibration::SensorClass;
use crate::command::{SolenoidBitOrder, MAX_VALVES};
use crate::error::{Result, StationError};

pub const DEFAULT_PORT: &str = "/dev/ttyACM0";
pub const DEFAULT_HISTORY_LEN: usize = 150;
pub const DEFAULT_READ_TIMEOUT_MS: u64 = 100;
pub const DEFAULT_SUMMARY_INTERVAL_SECS: u64 = 5;

/// Command encoding on the wire.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandWire {
    #[default]
    Text,
    Binary,
}

/// Which frame layout the link carries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkLayout {
    #[default]
    Live,
    Capture,
}

/// What a channel measures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelKind {
    Pressure(SensorClass),
    Temperature,
    LoadCell,
}

impl ChannelKind {
    pub fn prefix(self) -> &'static str {
        match self {
            Self::Pressure(_) => "P",
            Self::Temperature => "T",
            Self::LoadCell => "LC",
        }
    }
}

/// A channel's kind and its display label (`P_0`, `T_1`, `LC_0`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelInfo {
    pub index: usize,
    pub kind: ChannelKind,
    pub label: String,
}

impl fmt::Display for ChannelInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StationConfig {
    /// Serial device path.
    pub port: String,
    pub baud: u32,
    /// One entry per pressure channel, in channel order.
    pub pressure: Vec<SensorClass>,
    pub temperature: usize,
    pub load_cells: usize,
    pub solenoids: usize,
    /// Samples kept per channel.
    pub history_len: usize,
    pub bit_order: SolenoidBitOrder,
    pub command_format: CommandWire,
    pub command_address: u8,
    pub layout: LinkLayout,
    pub read_timeout_ms: u64,
    /// Seconds between decode summaries in the log; 0 disables them.
    pub summary_interval_secs: u64,
}

impl Default for StationConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT.to_string(),
            baud: DEFAULT_BAUD,
            pressure: vec![
                SensorClass::High,
                SensorClass::Low,
                SensorClass::Low,
                SensorClass::Low,
            ],
            temperature: 0,
            load_cells: 0,
            solenoids: MAX_VALVES,
            history_len: DEFAULT_HISTORY_LEN,
            bit_order: SolenoidBitOrder::default(),
            command_format: CommandWire::default(),
            command_address: standlink_frame::DEFAULT_COMMAND_ADDRESS,
            layout: LinkLayout::default(),
            read_timeout_ms: DEFAULT_READ_TIMEOUT_MS,
            summary_interval_secs: DEFAULT_SUMMARY_INTERVAL_SECS,
        }
    }
}

impl StationConfig {
    /// Parse and validate a JSON config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| StationError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_json_str(&text)?;
        tracing::debug!(path = %path.display(), channels = config.channel_count(), "loaded config");
        Ok(config)
    }

    pub fn from_json_str(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let channels = self.channel_count();
        if channels == 0 {
            return Err(StationError::InvalidConfig(
                "at least one channel must be configured".to_string(),
            ));
        }
        if channels > MAX_CHANNELS {
            return Err(StationError::InvalidConfig(format!(
                "{channels} channels configured, at most {MAX_CHANNELS} supported"
            )));
        }
        if self.solenoids > MAX_VALVES {
            return Err(StationError::InvalidConfig(format!(
                "{} solenoids configured, at most {MAX_VALVES} supported",
                self.solenoids
            )));
        }
        if self.history_len == 0 {
            return Err(StationError::InvalidConfig(
                "history_len must be at least 1".to_string(),
            ));
        }
        if self.baud == 0 {
            return Err(StationError::InvalidConfig(
                "baud must be non-zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Total channels: pressure, then temperature, then load cells.
    pub fn channel_count(&self) -> usize {
        self.pressure.len() + self.temperature + self.load_cells
    }

    pub fn channel_kind(&self, index: usize) -> Option<ChannelKind> {
        let pressure = self.pressure.len();
        let temperature = pressure + self.temperature;
        match index {
            i if i < pressure => Some(ChannelKind::Pressure(self.pressure[i])),
            i if i < temperature => Some(ChannelKind::Temperature),
            i if i < self.channel_count() => Some(ChannelKind::LoadCell),
            _ => None,
        }
    }

    pub fn channels(&self) -> Vec<ChannelInfo> {
        let mut out = Vec::with_capacity(self.channel_count());
        let groups = [
            (self.pressure.len(), "P"),
            (self.temperature, "T"),
            (self.load_cells, "LC"),
        ];
        let mut index = 0;
        for (count, prefix) in groups {
            for n in 0..count {
                if let Some(kind) = self.channel_kind(index) {
                    out.push(ChannelInfo {
                        index,
                        kind,
                        label: format!("{prefix}_{n}"),
                    });
                }
                index += 1;
            }
        }
        out
    }

    pub fn layout(&self) -> Result<FrameLayout> {
        let channels = self.channel_count();
        let layout = match self.layout {
            LinkLayout::Live => FrameLayout::live(channels),
            LinkLayout::Capture => FrameLayout::capture(channels),
        };
        Ok(layout?)
    }

    pub fn codec(&self) -> Result<FrameCodec> {
        Ok(FrameCodec::new(self.layout()?))
    }

    pub fn command_format(&self) -> CommandFormat {
        match self.command_format {
            CommandWire::Text => CommandFormat::Text {
                address: self.command_address,
            },
            CommandWire::Binary => CommandFormat::Binary,
        }
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    /// `None` when summaries are disabled.
    pub fn summary_interval(&self) -> Option<Duration> {
        (self.summary_interval_secs > 0).then(|| Duration::from_secs(self.summary_interval_secs))
    }
}
