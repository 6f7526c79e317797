use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Subcommand};
use standlink_station::StationConfig;

use crate::exit::{station_error, CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod decode;
pub mod monitor;
pub mod ports;
pub mod send;
pub mod simulate;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Split a capture file into sessions and write one CSV per session.
    Decode(DecodeArgs),
    /// Decode a live link (or a recorded stream) and operate the valves.
    Monitor(MonitorArgs),
    /// Send a single solenoid command word.
    Send(SendArgs),
    /// Write a synthetic byte stream or capture file.
    Simulate(SimulateArgs),
    /// List serial ports.
    Ports(PortsArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Decode(args) => decode::run(args, format),
        Command::Monitor(args) => monitor::run(args, format),
        Command::Send(args) => send::run(args, format),
        Command::Simulate(args) => simulate::run(args, format),
        Command::Ports(args) => ports::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct DecodeArgs {
    /// Capture file to decode.
    pub capture: PathBuf,
    /// Directory for `session_NNN.csv` files.
    #[arg(long, default_value = "decoded")]
    pub out: PathBuf,
    /// Channels per capture frame.
    #[arg(long, default_value_t = standlink_frame::LEGACY_CAPTURE_CHANNELS)]
    pub channels: usize,
}

#[derive(Args, Debug)]
pub struct MonitorArgs {
    /// Station config (JSON). Defaults apply when omitted.
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,
    /// Serial port, overriding the config.
    #[arg(long, conflicts_with = "replay")]
    pub port: Option<String>,
    /// Replay a recorded live byte stream instead of opening a port.
    #[arg(long, value_name = "FILE")]
    pub replay: Option<PathBuf>,
    /// Log every frame to this CSV file.
    #[arg(long, value_name = "FILE")]
    pub log_csv: Option<PathBuf>,
    /// Exit after printing N snapshots.
    #[arg(long)]
    pub count: Option<usize>,
    /// Snapshot interval (e.g. 1s, 250ms).
    #[arg(long, default_value = "1s")]
    pub interval: String,
}

#[derive(Args, Debug)]
pub struct SendArgs {
    /// Serial port to write to.
    pub port: String,
    /// Valves to open (1-based, comma-separated). All others are closed.
    #[arg(long, value_delimiter = ',', conflicts_with = "estop")]
    pub open: Vec<usize>,
    /// Send the emergency-stop word (all valves closed).
    #[arg(long)]
    pub estop: bool,
    /// Station config (JSON) for bit order and command format.
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,
    /// Print the word without opening the port.
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Args, Debug)]
pub struct SimulateArgs {
    /// Output file.
    pub out: PathBuf,
    /// Frames per session.
    #[arg(long, default_value_t = 100)]
    pub frames: u32,
    /// Channels per frame.
    #[arg(long, default_value_t = 4)]
    pub channels: usize,
    /// Sample rate encoded in the timestamps.
    #[arg(long, default_value_t = 100)]
    pub rate: u32,
    /// Insert marker-free noise between frames.
    #[arg(long)]
    pub garbage: bool,
    /// Write the offline capture layout instead of a live stream.
    #[arg(long)]
    pub capture: bool,
    /// Sessions to write (capture layout only).
    #[arg(long, default_value_t = 1, requires = "capture")]
    pub sessions: usize,
}

#[derive(Args, Debug, Default)]
pub struct PortsArgs {}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

pub(crate) fn load_config(path: Option<&PathBuf>) -> CliResult<StationConfig> {
    match path {
        Some(path) => {
            StationConfig::load(path).map_err(|err| station_error("config load failed", err))
        }
        None => Ok(StationConfig::default()),
    }
}

pub(crate) fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        _ => Ok(Duration::from_secs(value)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_duration_seconds_and_millis() {
        assert_eq!(parse_duration("2s").unwrap(), Duration::from_secs(2));
        assert_eq!(parse_duration("150ms").unwrap(), Duration::from_millis(150));
        assert_eq!(parse_duration("3").unwrap(), Duration::from_secs(3));
    }

    #[test]
    fn parse_duration_rejects_invalid_values() {
        assert!(parse_duration("0s").is_err());
        assert!(parse_duration("bad").is_err());
        assert!(parse_duration("").is_err());
    }

    #[test]
    fn missing_config_file_is_data_invalid() {
        let err = load_config(Some(&PathBuf::from("/nonexistent/standlink.json"))).unwrap_err();
        assert_eq!(err.code, crate::exit::DATA_INVALID);
        assert_eq!(load_config(None).unwrap(), StationConfig::default());
    }
}
