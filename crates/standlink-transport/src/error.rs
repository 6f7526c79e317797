use std::path::PathBuf;

/// Errors that can occur while opening or driving a telemetry link.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Failed to open the serial device or replay file.
    #[error("failed to open {path}: {reason}")]
    Open { path: PathBuf, reason: String },

    /// Failed to enumerate serial ports.
    #[error("failed to enumerate serial ports: {0}")]
    Enumerate(String),

    /// An I/O error occurred on the link.
    #[error("link I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The requested link type was not compiled in.
    #[error("unsupported link: {0}")]
    Unsupported(&'static str),
}

pub type Result<T> = std::result::Result<T, TransportError>;
