use standlink_frame::{command_bytes, CommandWriter};
use standlink_station::{CommandEncoder, StationConfig};
use standlink_transport::open_serial;
use tracing::info;

use crate::cmd::{load_config, SendArgs};
use crate::exit::{frame_error, station_error, transport_error, CliError, CliResult, SUCCESS};
use crate::output::{print_command, CommandOutput, OutputFormat};

pub fn run(args: SendArgs, format: OutputFormat) -> CliResult<i32> {
    let config = load_config(args.config.as_ref())?;
    let encoder = build_word(&config, &args.open, args.estop)?;
    let word = encoder.word();
    let bytes = command_bytes(word, config.command_format());

    let transport = if args.dry_run {
        "dry-run"
    } else {
        let link = open_serial(&args.port, config.baud, config.read_timeout())
            .map_err(|err| transport_error("open failed", err))?;
        let transport = link.transport_name();
        let mut writer = CommandWriter::with_format(link, config.command_format());
        writer
            .send(word)
            .map_err(|err| frame_error("send failed", err))?;
        info!(port = %args.port, word = %format!("0x{word:04X}"), "command sent");
        transport
    };

    print_command(
        &CommandOutput {
            word: format!("0x{word:04X}"),
            open_valves: encoder.open_valves().iter().map(|v| v + 1).collect(),
            bytes: bytes.len(),
            transport,
        },
        format,
    );
    Ok(SUCCESS)
}

/// Absolute word for the requested valves (1-based), all others closed.
fn build_word(config: &StationConfig, open: &[usize], estop: bool) -> CliResult<CommandEncoder> {
    let mut encoder = CommandEncoder::new(config.bit_order, config.solenoids)
        .map_err(|err| station_error("invalid config", err))?;
    if estop {
        encoder.emergency_stop();
        return Ok(encoder);
    }
    for &valve in open {
        let index = valve
            .checked_sub(1)
            .ok_or_else(|| CliError::usage("valves are numbered from 1"))?;
        encoder
            .set(index, true)
            .map_err(|err| station_error("invalid --open", err))?;
    }
    Ok(encoder)
}
