//! Fixed-layout telemetry framing for the test-stand link.
//!
//! This is the core of standlink. Every live frame on the serial link is:
//! - A 2-byte sync marker (`AA 55`) for stream synchronization
//! - A 12-byte little-endian header (timestamp, sequence, masks, solenoids)
//! - `N` little-endian `u16` channel samples, `N` fixed by configuration
//!
//! Offline captures use a 4-byte session marker and a wider frame; see
//! [`layout`] for both formats. No partial reads, no resync logic in user code.

#[cfg(feature = "async")]
pub mod async_codec;
pub mod codec;
pub mod error;
pub mod layout;
pub mod rate;
pub mod reader;
pub mod session;
pub mod sync;
pub mod writer;

#[cfg(feature = "async")]
pub use async_codec::SyncCodec;
pub use codec::{
    command_bytes, encode_command, CommandFormat, FrameCodec, TelemetryFrame,
    DEFAULT_COMMAND_ADDRESS,
};
pub use error::{FrameError, Result};
pub use layout::{
    FrameLayout, LayoutKind, HEADER_SIZE, LEGACY_CAPTURE_CHANNELS, LIVE_SYNC, MAX_CHANNELS,
    SESSION_MARKER,
};
pub use rate::{estimate_rate, RateEstimator};
pub use reader::{FrameConfig, FrameReader};
pub use session::{Session, SessionSplitter, Sessions};
pub use sync::{StreamSynchronizer, SyncEvent, SyncStats};
pub use writer::CommandWriter;
