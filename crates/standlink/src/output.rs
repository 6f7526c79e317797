use std::io::IsTerminal;

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;
use standlink_station::{ActorEnd, ActorReport, StoreSnapshot};

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
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

/// One decoded capture session.
#[derive(Debug, Serialize)]
pub struct SessionRow {
    pub session: usize,
    pub marker_offset: usize,
    pub frames: usize,
    pub trailing_bytes: usize,
    pub rate_hz: Option<f64>,
    pub rate: String,
    pub fault: Option<String>,
    pub output: Option<String>,
}

#[derive(Serialize)]
struct SnapshotOutput<'a> {
    #[serde(flatten)]
    snapshot: &'a StoreSnapshot,
    solenoid_bits: String,
    open_valves: &'a [usize],
}

#[derive(Serialize)]
struct ReportOutput {
    end: &'static str,
    frames: u64,
    dropped: u64,
    resyncs: u64,
    discarded_bytes: u64,
    commands_sent: u64,
    sink_errors: u64,
    rate_hz: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    link_error: Option<String>,
}

#[derive(Serialize)]
pub struct CommandOutput {
    pub word: String,
    pub open_valves: Vec<usize>,
    pub bytes: usize,
    pub transport: &'static str,
}

pub fn print_json<T: Serialize>(value: &T) {
    println!(
        "{}",
        serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
    );
}

fn new_table(header: Vec<&str>) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header);
    table
}

pub fn print_sessions(rows: &[SessionRow], format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            for row in rows {
                print_json(row);
            }
        }
        OutputFormat::Table => {
            let mut table = new_table(vec![
                "SESSION", "OFFSET", "FRAMES", "TRAILING", "RATE", "OUTPUT",
            ]);
            for row in rows {
                table.add_row(vec![
                    row.session.to_string(),
                    row.marker_offset.to_string(),
                    row.frames.to_string(),
                    row.trailing_bytes.to_string(),
                    row.rate.clone(),
                    row.output.clone().unwrap_or_else(|| "-".to_string()),
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            for row in rows {
                println!(
                    "session {:03}: {} frames, {} trailing bytes, rate {}{}",
                    row.session,
                    row.frames,
                    row.trailing_bytes,
                    row.rate,
                    row.fault
                        .as_deref()
                        .map(|f| format!(" (stopped: {f})"))
                        .unwrap_or_default()
                );
            }
        }
    }
}

pub fn print_snapshot(snapshot: &StoreSnapshot, open_valves: &[usize], format: OutputFormat) {
    let solenoid_bits = format!("{:016b}", snapshot.solenoid_state);
    match format {
        OutputFormat::Json => print_json(&SnapshotOutput {
            snapshot,
            solenoid_bits,
            open_valves,
        }),
        OutputFormat::Table => {
            let mut header = vec!["SEQ", "RATE", "SOLENOIDS"];
            header.extend(snapshot.channels.iter().map(|c| c.label.as_str()));
            let mut table = new_table(header);
            let mut row = vec![
                opt_to_string(snapshot.last_sequence),
                rate_label(snapshot.rate_hz),
                solenoid_bits,
            ];
            row.extend(snapshot.channels.iter().map(|c| value_label(c.value)));
            table.add_row(row);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            let channels: Vec<String> = snapshot
                .channels
                .iter()
                .map(|c| format!("{}={}", c.label, value_label(c.value)))
                .collect();
            println!(
                "seq={} rate={} solenoids={} open={:?} {}",
                opt_to_string(snapshot.last_sequence),
                rate_label(snapshot.rate_hz),
                solenoid_bits,
                open_valves,
                channels.join(" ")
            );
        }
    }
}

pub fn print_report(report: &ActorReport, format: OutputFormat) {
    let out = ReportOutput {
        end: match report.end {
            ActorEnd::StopRequested => "stopped",
            ActorEnd::TransportClosed => "closed",
        },
        frames: report.stats.frames,
        dropped: report.stats.dropped,
        resyncs: report.stats.resyncs,
        discarded_bytes: report.stats.discarded_bytes,
        commands_sent: report.commands_sent,
        sink_errors: report.sink_errors,
        rate_hz: report.rate_hz,
        link_error: report.link_error.clone(),
    };
    match format {
        OutputFormat::Json => print_json(&out),
        OutputFormat::Table => {
            let mut table = new_table(vec![
                "END", "FRAMES", "DROPPED", "RESYNCS", "DISCARDED", "COMMANDS", "RATE",
            ]);
            table.add_row(vec![
                out.end.to_string(),
                out.frames.to_string(),
                out.dropped.to_string(),
                out.resyncs.to_string(),
                out.discarded_bytes.to_string(),
                out.commands_sent.to_string(),
                rate_label(out.rate_hz),
            ]);
            println!("{table}");
            if let Some(err) = &out.link_error {
                println!("link error: {err}");
            }
        }
        OutputFormat::Pretty => {
            println!(
                "link {}: frames={} dropped={} resyncs={} discarded_bytes={} commands={} rate={}",
                out.end,
                out.frames,
                out.dropped,
                out.resyncs,
                out.discarded_bytes,
                out.commands_sent,
                rate_label(out.rate_hz)
            );
            if let Some(err) = &out.link_error {
                println!("link error: {err}");
            }
        }
    }
}

pub fn print_command(out: &CommandOutput, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(out),
        OutputFormat::Table => {
            let mut table = new_table(vec!["WORD", "OPEN", "BYTES", "TRANSPORT"]);
            table.add_row(vec![
                out.word.clone(),
                format!("{:?}", out.open_valves),
                out.bytes.to_string(),
                out.transport.to_string(),
            ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "sent {} (open {:?}) over {}",
                out.word, out.open_valves, out.transport
            );
        }
    }
}

pub fn rate_label(rate_hz: Option<f64>) -> String {
    match rate_hz {
        Some(rate) => format!("{rate:.2} Hz"),
        None => "unknown".to_string(),
    }
}

fn value_label(value: Option<f64>) -> String {
    value
        .map(|v| format!("{v:.1}"))
        .unwrap_or_else(|| "-".to_string())
}

fn opt_to_string<T: ToString>(value: Option<T>) -> String {
    value
        .map(|v| v.to_string())
        .unwrap_or_else(|| "-".to_string())
}
