use std::io::BufRead;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use standlink_frame::{CommandWriter, FrameConfig, FrameError, FrameReader};
use standlink_station::{
    lock_store, ActorEnd, CommandChannel, CommandEncoder, DecodeActor, SharedStore,
    TelemetryStore,
};
use standlink_transport::{open_serial, LinkStream};
use tracing::{info, warn};

use crate::cmd::{load_config, parse_duration, MonitorArgs};
use crate::exit::{
    csv_error, frame_error, station_error, transport_error, CliError, CliResult, INTERNAL,
    SUCCESS, TRANSPORT_ERROR,
};
use crate::output::{print_report, print_snapshot, OutputFormat};
use crate::sink::LiveCsvSink;

/// Upper bound on how long the presentation loop sleeps between checks.
const POLL: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operator {
    /// 0-based valve index.
    Toggle(usize),
    EmergencyStop,
    Zero,
    Quit,
}

pub fn run(args: MonitorArgs, format: OutputFormat) -> CliResult<i32> {
    let interval = parse_duration(&args.interval)?;
    let mut config = load_config(args.config.as_ref())?;
    if let Some(port) = &args.port {
        config.port = port.clone();
    }
    let codec = config
        .codec()
        .map_err(|err| station_error("invalid config", err))?;

    let link = match &args.replay {
        Some(path) => LinkStream::replay(path),
        None => open_serial(&config.port, config.baud, config.read_timeout()),
    }
    .map_err(|err| transport_error("open failed", err))?;
    info!(transport = link.transport_name(), channels = config.channel_count(), "link open");

    let write_half = link
        .try_clone()
        .map_err(|err| transport_error("link split failed", err))?;
    let frame_config = FrameConfig {
        read_timeout: Some(config.read_timeout()),
        ..FrameConfig::default()
    };
    let reader = FrameReader::with_config_link(link, codec, frame_config)
        .map_err(|err| frame_error("link setup failed", err))?;
    let writer = CommandWriter::with_format(write_half, config.command_format());

    let store = TelemetryStore::new(&config).into_shared();
    let encoder = CommandEncoder::new(config.bit_order, config.solenoids)
        .map_err(|err| station_error("invalid config", err))?;
    let commands = Arc::new(CommandChannel::new(encoder));

    let mut actor = DecodeActor::new(reader, writer, Arc::clone(&store), Arc::clone(&commands))
        .with_summary_interval(config.summary_interval());
    if let Some(path) = &args.log_csv {
        let sink = LiveCsvSink::create(path, &config.channels())
            .map_err(|err| csv_error(&format!("failed creating {}", path.display()), err))?;
        actor = actor.with_sink(Box::new(sink));
    }
    let handle = actor
        .spawn()
        .map_err(|err| station_error("decode start failed", err))?;

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;
    let operator = spawn_operator_input()?;

    let mut printed = 0usize;
    let mut next_snapshot = Instant::now() + interval;
    while running.load(Ordering::SeqCst) && !handle.is_finished() {
        let wait = next_snapshot
            .saturating_duration_since(Instant::now())
            .min(POLL);
        match operator.recv_timeout(wait) {
            Ok(line) => match parse_operator(&line) {
                Ok(Some(Operator::Quit)) => break,
                Ok(Some(op)) => apply(op, &store, &commands),
                Ok(None) => {}
                Err(msg) => warn!(input = %line.trim(), "{msg}"),
            },
            Err(RecvTimeoutError::Timeout) => {}
            // stdin closed; keep monitoring without operator input.
            Err(RecvTimeoutError::Disconnected) => thread::sleep(wait),
        }

        if Instant::now() >= next_snapshot {
            show(&store, &commands, format);
            printed += 1;
            next_snapshot += interval;
            if args.count.is_some_and(|count| printed >= count) {
                break;
            }
        }
    }

    handle.stop();
    let report = handle
        .join()
        .map_err(|err| station_error("decode failed", err))?;
    show(&store, &commands, format);
    print_report(&report, format);

    if report.end == ActorEnd::TransportClosed {
        if let Some(err) = &report.link_error {
            return Err(CliError::new(TRANSPORT_ERROR, format!("link lost: {err}")));
        }
        if args.replay.is_none() {
            return Err(frame_error("link lost", FrameError::TransportClosed));
        }
    }
    Ok(SUCCESS)
}

fn show(store: &SharedStore, commands: &CommandChannel, format: OutputFormat) {
    let snapshot = lock_store(store).snapshot();
    let open: Vec<usize> = commands
        .current()
        .open_valves()
        .iter()
        .map(|v| v + 1)
        .collect();
    print_snapshot(&snapshot, &open, format);
}

fn apply(op: Operator, store: &SharedStore, commands: &CommandChannel) {
    match op {
        Operator::Toggle(valve) => match commands.toggle(valve) {
            Ok(word) => info!(valve = valve + 1, word = %format!("0x{word:04X}"), "valve toggled"),
            Err(err) => warn!(error = %err, "toggle rejected"),
        },
        Operator::EmergencyStop => {
            let word = commands.emergency_stop();
            info!(word = %format!("0x{word:04X}"), "all valves closed");
        }
        Operator::Zero => {
            let zeroed = lock_store(store).zero_pressures();
            info!(channels = ?zeroed, "pressures zeroed");
        }
        Operator::Quit => {}
    }
}

/// `t <n>` toggles valve n (1-based); `stop`, `zero` and `q` as named.
fn parse_operator(line: &str) -> Result<Option<Operator>, String> {
    let mut parts = line.split_whitespace();
    let Some(verb) = parts.next() else {
        return Ok(None);
    };
    let op = match verb {
        "t" | "toggle" => {
            let valve: usize = parts
                .next()
                .ok_or("usage: t <valve>")?
                .parse()
                .map_err(|_| "valve must be a number".to_string())?;
            let index = valve
                .checked_sub(1)
                .ok_or("valves are numbered from 1")?;
            Operator::Toggle(index)
        }
        "stop" | "estop" => Operator::EmergencyStop,
        "zero" => Operator::Zero,
        "q" | "quit" => Operator::Quit,
        other => return Err(format!("unknown command `{other}`")),
    };
    if parts.next().is_some() {
        return Err("unexpected trailing input".to_string());
    }
    Ok(Some(op))
}

fn spawn_operator_input() -> CliResult<Receiver<String>> {
    let (tx, rx) = mpsc::channel();
    thread::Builder::new()
        .name("standlink-stdin".to_string())
        .spawn(move || {
            for line in std::io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                if tx.send(line).is_err() {
                    break;
                }
            }
        })
        .map_err(|err| CliError::new(INTERNAL, format!("stdin reader failed: {err}")))?;
    Ok(rx)
}

fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}

#[cfg(test)]
mod tests {
    use standlink_station::{SolenoidBitOrder, StationConfig};

    use super::*;

    #[test]
    fn parses_operator_commands() {
        assert_eq!(parse_operator("t 3"), Ok(Some(Operator::Toggle(2))));
        assert_eq!(parse_operator("  stop "), Ok(Some(Operator::EmergencyStop)));
        assert_eq!(parse_operator("zero"), Ok(Some(Operator::Zero)));
        assert_eq!(parse_operator("q"), Ok(Some(Operator::Quit)));
        assert_eq!(parse_operator("   "), Ok(None));
    }

    #[test]
    fn rejects_bad_operator_input() {
        assert!(parse_operator("t").is_err());
        assert!(parse_operator("t 0").is_err());
        assert!(parse_operator("t x").is_err());
        assert!(parse_operator("t 1 2").is_err());
        assert!(parse_operator("open 1").is_err());
    }

    #[test]
    fn apply_drives_commands_and_store() {
        let config = StationConfig::default();
        let store = TelemetryStore::new(&config).into_shared();
        let commands = CommandChannel::new(
            CommandEncoder::new(SolenoidBitOrder::MsbFirst, config.solenoids).unwrap(),
        );

        apply(Operator::Toggle(0), &store, &commands);
        apply(Operator::Toggle(9), &store, &commands);
        assert_eq!(commands.current().word(), 0xC000);
        assert_eq!(commands.pending(), 1);

        apply(Operator::EmergencyStop, &store, &commands);
        assert_eq!(commands.next_word(), Some(0x8000));
        assert_eq!(commands.next_word(), None);

        apply(Operator::Zero, &store, &commands);
        assert_eq!(lock_store(&store).calibration().offset(0), 0.0);
    }
}
