mod cmd;
mod exit;
mod logging;
mod output;
mod sink;

use clap::Parser;

use crate::cmd::Command;
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "standlink", version, about = "Test-stand telemetry and valve control")]
struct Cli {
    /// Output format.
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<OutputFormat>,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(long, value_name = "LEVEL", default_value = "info", global = true)]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level);

    let format = cli.format.unwrap_or_else(OutputFormat::default_for_stdout);
    let result = cmd::run(cli.command, format);

    match result {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(err.code);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_monitor_replay() {
        let cli = Cli::try_parse_from([
            "standlink",
            "monitor",
            "--replay",
            "/tmp/stream.bin",
            "--count",
            "2",
            "--interval",
            "100ms",
        ])
        .expect("monitor args should parse");

        assert!(matches!(cli.command, Command::Monitor(_)));
    }

    #[test]
    fn rejects_port_with_replay() {
        let err = Cli::try_parse_from([
            "standlink",
            "monitor",
            "--port",
            "/dev/ttyACM0",
            "--replay",
            "/tmp/stream.bin",
        ])
        .expect_err("conflicting args should fail");

        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
    }

    #[test]
    fn parses_send_open_list() {
        let cli = Cli::try_parse_from(["standlink", "send", "/dev/ttyACM0", "--open", "1,3"])
            .expect("send args should parse");
        match cli.command {
            Command::Send(args) => assert_eq!(args.open, vec![1, 3]),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn rejects_open_with_estop() {
        let err = Cli::try_parse_from([
            "standlink",
            "send",
            "/dev/ttyACM0",
            "--open",
            "1",
            "--estop",
        ])
        .expect_err("conflicting args should fail");

        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
    }

    #[test]
    fn decode_defaults_to_legacy_channels() {
        let cli = Cli::try_parse_from(["standlink", "decode", "data.bin"])
            .expect("decode args should parse");
        match cli.command {
            Command::Decode(args) => {
                assert_eq!(args.channels, 4);
                assert_eq!(args.out, std::path::PathBuf::from("decoded"));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
