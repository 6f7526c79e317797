//! Ground-station telemetry decoding and valve control for a test stand.
//!
//! standlink reads fixed-layout telemetry frames from the stand controller,
//! keeps a bounded calibrated history of every sensor channel, and sends
//! solenoid command words back over the same link.
//!
//! # Crate Structure
//!
//! - [`transport`]: Byte links (serial ports, recorded stream replay)
//! - [`frame`]: Frame layouts, codec, stream resync, capture session splitting
//! - [`station`]: Configuration, telemetry store, calibration, commands, decode actor

/// Re-export transport types.
pub mod transport {
    pub use standlink_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use standlink_frame::*;
}

/// Re-export ground-station types.
pub mod station {
    pub use standlink_station::*;
}
