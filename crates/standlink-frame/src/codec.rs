use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{FrameError, Result};
use crate::layout::{FrameLayout, LayoutKind};

/// Default destination address appended to text commands.
pub const DEFAULT_COMMAND_ADDRESS: u8 = 2;

/// One decoded telemetry sample instant.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TelemetryFrame {
    /// Controller microsecond counter (wraps at 2^32).
    pub timestamp_us: u32,
    /// Controller frame counter (wraps at 2^32). Diagnostic only.
    pub sequence: u32,
    pub valid_mask: u8,
    pub status_bits: u8,
    /// Relay bitfield as reported by the controller.
    pub solenoid_state: u16,
    /// Raw unsigned samples, one per configured channel.
    pub channels: Vec<u16>,
    /// Engineering payloads in centi-PSI (capture layout only, empty otherwise).
    pub payload_centi_psi: Vec<u32>,
}

impl TelemetryFrame {
    /// Controller timestamp in seconds.
    pub fn timestamp_secs(&self) -> f64 {
        f64::from(self.timestamp_us) / 1_000_000.0
    }

    /// Timestamp as `MM:SS.mmm`.
    pub fn clock_label(&self) -> String {
        let secs = self.timestamp_secs();
        let minutes = (secs / 60.0).floor() as u64;
        format!("{:02}:{:06.3}", minutes, secs % 60.0)
    }

    /// Solenoid state as a 16-digit binary string, MSB first.
    pub fn solenoid_bits(&self) -> String {
        format!("{:016b}", self.solenoid_state)
    }
}

/// Decodes fixed-size spans into [`TelemetryFrame`]s for one layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameCodec {
    layout: FrameLayout,
}

impl FrameCodec {
    pub fn new(layout: FrameLayout) -> Self {
        Self { layout }
    }

    pub fn layout(&self) -> &FrameLayout {
        &self.layout
    }

    /// Frame size in bytes, marker excluded.
    pub fn frame_size(&self) -> usize {
        self.layout.frame_size()
    }

    /// Decode exactly one frame.
    ///
    /// Fails with `ShortSpan` unless `span.len() == frame_size()`.
    pub fn decode(&self, span: &[u8]) -> Result<TelemetryFrame> {
        self.layout.validate_span(span)?;

        let mut src = span;
        let timestamp_us = src.get_u32_le();
        let sequence = src.get_u32_le();
        let valid_mask = src.get_u8();
        let status_bits = src.get_u8();
        let solenoid_state = src.get_u16_le();

        let n = self.layout.channel_count();
        let payload_centi_psi = match self.layout.kind() {
            LayoutKind::Live => Vec::new(),
            LayoutKind::Capture => (0..n).map(|_| src.get_u32_le()).collect(),
        };
        let channels: Vec<u16> = (0..n).map(|_| src.get_u16_le()).collect();

        if src.has_remaining() {
            return Err(FrameError::DecodeFailure {
                field: "channels",
                reason: format!("{} trailing bytes after channel block", src.remaining()),
            });
        }

        Ok(TelemetryFrame {
            timestamp_us,
            sequence,
            valid_mask,
            status_bits,
            solenoid_state,
            channels,
            payload_centi_psi,
        })
    }

    /// Encode a frame into the wire format (marker excluded).
    pub fn encode(&self, frame: &TelemetryFrame, dst: &mut BytesMut) -> Result<()> {
        let n = self.layout.channel_count();
        if frame.channels.len() != n {
            return Err(FrameError::ShapeMismatch {
                field: "channels",
                expected: n,
                actual: frame.channels.len(),
            });
        }
        if self.layout.kind() == LayoutKind::Capture && frame.payload_centi_psi.len() != n {
            return Err(FrameError::ShapeMismatch {
                field: "payload_centi_psi",
                expected: n,
                actual: frame.payload_centi_psi.len(),
            });
        }

        dst.reserve(self.layout.frame_size());
        dst.put_u32_le(frame.timestamp_us);
        dst.put_u32_le(frame.sequence);
        dst.put_u8(frame.valid_mask);
        dst.put_u8(frame.status_bits);
        dst.put_u16_le(frame.solenoid_state);
        if self.layout.kind() == LayoutKind::Capture {
            for payload in &frame.payload_centi_psi {
                dst.put_u32_le(*payload);
            }
        }
        for value in &frame.channels {
            dst.put_u16_le(*value);
        }
        Ok(())
    }

    /// Encode a frame preceded by the layout's marker, as it appears on a live link.
    pub fn encode_with_marker(&self, frame: &TelemetryFrame, dst: &mut BytesMut) -> Result<()> {
        dst.reserve(self.layout.wire_size());
        dst.put_slice(self.layout.marker());
        self.encode(frame, dst)
    }
}

/// How the controller firmware expects solenoid commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandFormat {
    /// ASCII `0xHHHH,<address>\n`, the serial-monitor form.
    Text { address: u8 },
    /// Raw `u16` little-endian.
    Binary,
}

impl Default for CommandFormat {
    fn default() -> Self {
        CommandFormat::Text {
            address: DEFAULT_COMMAND_ADDRESS,
        }
    }
}

/// Encode a solenoid command word.
///
/// Wire format:
/// ```text
/// Text:   "0x8200,2\n"   (hex word, destination address)
/// Binary: 00 82          (u16 LE)
/// ```
pub fn encode_command(word: u16, format: CommandFormat, dst: &mut BytesMut) {
    match format {
        CommandFormat::Text { address } => {
            dst.put_slice(format!("0x{word:04X},{address}\n").as_bytes());
        }
        CommandFormat::Binary => {
            dst.reserve(2);
            dst.put_u16_le(word);
        }
    }
}

/// Encode a solenoid command word into a fresh buffer.
pub fn command_bytes(word: u16, format: CommandFormat) -> Bytes {
    let mut dst = BytesMut::with_capacity(16);
    encode_command(word, format, &mut dst);
    dst.freeze()
}
