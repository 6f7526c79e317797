//! Ground-station state for the test stand.
//!
//! This is the layer between the wire and the operator: configuration,
//! bounded telemetry history with read-time calibration, the valve command
//! word, and the decode actor that ties a link to all of it.

pub mod actor;
pub mod calibration;
pub mod command;
pub mod config;
pub mod error;
pub mod history;
pub mod store;

pub use actor::{ActorEnd, ActorHandle, ActorReport, DecodeActor, FrameSink, ACTOR_THREAD_NAME};
pub use calibration::{counts_to_volts, Calibration, SensorClass};
pub use command::{
    CommandChannel, CommandEncoder, CommandQueue, SolenoidBitOrder, MAX_VALVES, VALIDITY_BIT,
    VALVE_FIELD,
};
pub use config::{ChannelInfo, ChannelKind, CommandWire, LinkLayout, StationConfig};
pub use error::{Result, StationError};
pub use history::{ChannelHistory, Sample};
pub use store::{lock_store, ChannelSnapshot, Reading, SharedStore, StoreSnapshot, TelemetryStore};
