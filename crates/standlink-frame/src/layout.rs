//! Wire layouts.
//!
//! Every frame starts with the same 12-byte little-endian header:
//!
//! ```text
//! ┌──────────────┬──────────────┬────────────┬─────────────┬────────────────┐
//! │ timestamp_us │ sequence     │ valid_mask │ status_bits │ solenoid_state │
//! │ u32 LE       │ u32 LE       │ u8         │ u8          │ u16 LE         │
//! └──────────────┴──────────────┴────────────┴─────────────┴────────────────┘
//! ```
//!
//! followed by a channel block whose shape depends on the layout kind:
//!
//! - [`LayoutKind::Live`]: `N × u16` raw samples. On the serial link every
//!   frame is preceded by the 2-byte sync marker `AA 55`.
//! - [`LayoutKind::Capture`]: `N × u32` engineering payloads (centi-PSI)
//!   then `N × u16` raw ADC counts. Captures are written back to back after a
//!   single 4-byte session marker `A5 A5 A5 A5`, with no per-frame marker.

use crate::error::{FrameError, Result};

/// Fixed header: timestamp (4) + sequence (4) + valid mask (1) + status (1) + solenoids (2).
pub const HEADER_SIZE: usize = 12;

/// Sync marker preceding every live frame.
pub const LIVE_SYNC: [u8; 2] = [0xAA, 0x55];

/// Session marker opening every power-cycle region of a capture (`0xA5A5A5A5` LE).
pub const SESSION_MARKER: [u8; 4] = [0xA5, 0xA5, 0xA5, 0xA5];

/// Channel count of the capture firmware that writes 36-byte frames.
pub const LEGACY_CAPTURE_CHANNELS: usize = 4;

/// Upper bound on operator-configured channel counts.
pub const MAX_CHANNELS: usize = 64;

const RAW_WIDTH: usize = 2;
const PAYLOAD_WIDTH: usize = 4;

/// Which family of wire format a layout describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LayoutKind {
    /// Serial stream: header + `N × u16`.
    Live,
    /// Flash capture: header + `N × u32` payload + `N × u16` raw ADC.
    Capture,
}

impl LayoutKind {
    /// Marker that delimits frames (live) or sessions (capture).
    pub fn marker(self) -> &'static [u8] {
        match self {
            LayoutKind::Live => &LIVE_SYNC,
            LayoutKind::Capture => &SESSION_MARKER,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LayoutKind::Live => "live",
            LayoutKind::Capture => "capture",
        }
    }
}

/// Immutable description of one concrete wire format.
///
/// Built once from the station configuration and handed to the codec by
/// value. The frame size is known before any decode attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameLayout {
    kind: LayoutKind,
    channels: usize,
}

impl FrameLayout {
    /// Build a layout, rejecting channel counts outside `1..=MAX_CHANNELS`.
    pub fn new(kind: LayoutKind, channels: usize) -> Result<Self> {
        if channels == 0 || channels > MAX_CHANNELS {
            return Err(FrameError::InvalidLayout {
                channels,
                max: MAX_CHANNELS,
            });
        }
        Ok(Self { kind, channels })
    }

    /// Live serial layout with `channels` raw samples.
    pub fn live(channels: usize) -> Result<Self> {
        Self::new(LayoutKind::Live, channels)
    }

    /// Capture layout with `channels` payload/raw pairs.
    pub fn capture(channels: usize) -> Result<Self> {
        Self::new(LayoutKind::Capture, channels)
    }

    /// The 36-byte capture layout (4 payloads + 4 raw ADC values).
    pub fn legacy_capture() -> Self {
        Self {
            kind: LayoutKind::Capture,
            channels: LEGACY_CAPTURE_CHANNELS,
        }
    }

    pub fn kind(&self) -> LayoutKind {
        self.kind
    }

    pub fn channel_count(&self) -> usize {
        self.channels
    }

    /// Bytes occupied by the engineering payload block (0 for live frames).
    pub fn payload_block_size(&self) -> usize {
        match self.kind {
            LayoutKind::Live => 0,
            LayoutKind::Capture => self.channels * PAYLOAD_WIDTH,
        }
    }

    /// Frame size in bytes, marker excluded.
    pub fn frame_size(&self) -> usize {
        HEADER_SIZE + self.payload_block_size() + self.channels * RAW_WIDTH
    }

    /// The layout's marker bytes.
    pub fn marker(&self) -> &'static [u8] {
        self.kind.marker()
    }

    /// Marker plus frame, the most bytes one live frame occupies on the wire.
    pub fn wire_size(&self) -> usize {
        self.marker().len() + self.frame_size()
    }

    /// Two layouts are compatible when all fixed fields match and only the
    /// channel count differs.
    pub fn is_compatible(&self, other: &FrameLayout) -> bool {
        self.kind == other.kind
    }

    /// Check that `span` is exactly one frame long. Never pads.
    pub fn validate_span(&self, span: &[u8]) -> Result<()> {
        let expected = self.frame_size();
        if span.len() != expected {
            return Err(FrameError::ShortSpan {
                expected,
                actual: span.len(),
            });
        }
        Ok(())
    }
}
