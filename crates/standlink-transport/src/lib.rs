//! Byte-source abstraction for test-stand telemetry links.
//!
//! The controller talks to the ground station over a plain byte pipe:
//! - A USB/UART serial port (feature `serial`)
//! - A recorded byte stream replayed from disk
//!
//! This is the lowest layer of standlink. It knows nothing about frames;
//! everything above consumes the [`LinkStream`] type provided here.

pub mod error;
pub mod serial;
pub mod traits;

pub use error::{Result, TransportError};
pub use serial::{available_ports, open_serial, PortInfo, DEFAULT_BAUD};
pub use traits::LinkStream;
