use std::path::PathBuf;

/// Errors raised by ground-station state and the decode actor.
#[derive(Debug, thiserror::Error)]
pub enum StationError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] standlink_transport::TransportError),

    /// Frame-level error.
    #[error("frame error: {0}")]
    Frame(#[from] standlink_frame::FrameError),

    /// Configuration file could not be read.
    #[error("failed to read config {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Configuration JSON is malformed.
    #[error("invalid config json: {0}")]
    ConfigParse(#[from] serde_json::Error),

    /// Configuration parsed but is not usable.
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    /// Channel index outside the configured channel list.
    #[error("channel {index} out of range ({count} configured)")]
    UnknownChannel { index: usize, count: usize },

    /// Channel exists but does not support the operation.
    #[error("channel {index} is not a pressure channel")]
    NotPressure { index: usize },

    /// Valve index outside the configured valve count.
    #[error("valve {index} out of range ({count} configured)")]
    InvalidValve { index: usize, count: usize },

    /// Decode actor thread could not be started.
    #[error("failed to spawn decode actor: {0}")]
    Spawn(std::io::Error),

    /// Decode actor thread panicked.
    #[error("decode actor panicked")]
    ActorPanicked,
}

pub type Result<T> = std::result::Result<T, StationError>;
