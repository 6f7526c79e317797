//! CSV writers for live logging and offline decode output.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use standlink_frame::TelemetryFrame;
use standlink_station::{ChannelInfo, FrameSink};

/// Appends one row per live frame: timestamp, sequence, solenoid bits, raw
/// channel values in configured order.
pub struct LiveCsvSink<W: Write> {
    writer: csv::Writer<W>,
    channels: usize,
}

impl LiveCsvSink<File> {
    pub fn create(path: impl AsRef<Path>, channels: &[ChannelInfo]) -> csv::Result<Self> {
        Self::new(File::create(path)?, channels)
    }
}

impl<W: Write> LiveCsvSink<W> {
    /// Wrap a writer and emit the header row.
    pub fn new(inner: W, channels: &[ChannelInfo]) -> csv::Result<Self> {
        let mut writer = csv::Writer::from_writer(inner);
        let mut header = vec![
            "timestamp".to_string(),
            "seq".to_string(),
            "solenoids".to_string(),
        ];
        header.extend(channels.iter().map(|c| c.label.clone()));
        writer.write_record(&header)?;
        Ok(Self {
            writer,
            channels: channels.len(),
        })
    }
}

impl<W: Write + Send> FrameSink for LiveCsvSink<W> {
    fn record(&mut self, frame: &TelemetryFrame) -> std::io::Result<()> {
        let mut row = Vec::with_capacity(3 + self.channels);
        row.push(frame.timestamp_us.to_string());
        row.push(frame.sequence.to_string());
        row.push(frame.solenoid_bits());
        row.extend(
            frame
                .channels
                .iter()
                .take(self.channels)
                .map(u16::to_string),
        );
        self.writer.write_record(&row)?;
        Ok(())
    }

    fn finish(&mut self) -> std::io::Result<()> {
        self.writer.flush()
    }
}

/// Column names of an offline session file with `channels` channels.
pub fn session_header(channels: usize) -> Vec<String> {
    let mut header: Vec<String> = [
        "timestamp_us",
        "seq",
        "valid_mask",
        "status_bits",
        "solenoid_state",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();
    header.extend((0..channels).map(|i| format!("payload{i}_centi_psi")));
    header.extend((0..channels).map(|i| format!("raw_adc{i}")));
    header
}

/// Write one decoded session. The header is written even with no frames.
pub fn write_session<W: Write>(
    inner: W,
    frames: &[TelemetryFrame],
    channels: usize,
) -> csv::Result<()> {
    let mut writer = csv::Writer::from_writer(inner);
    writer.write_record(session_header(channels))?;
    for frame in frames {
        let mut row = vec![
            frame.timestamp_us.to_string(),
            frame.sequence.to_string(),
            frame.valid_mask.to_string(),
            frame.status_bits.to_string(),
            frame.solenoid_state.to_string(),
        ];
        row.extend(frame.payload_centi_psi.iter().map(u32::to_string));
        row.extend(frame.channels.iter().map(u16::to_string));
        writer.write_record(&row)?;
    }
    writer.flush()?;
    Ok(())
}

pub fn write_session_file(
    path: impl AsRef<Path>,
    frames: &[TelemetryFrame],
    channels: usize,
) -> csv::Result<()> {
    write_session(File::create(path)?, frames, channels)
}
