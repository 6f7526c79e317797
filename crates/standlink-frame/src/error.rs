/// Errors that can occur while decoding telemetry or encoding commands.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The span handed to the codec is not exactly one frame long.
    #[error("short span ({actual} bytes, frame is {expected})")]
    ShortSpan { expected: usize, actual: usize },

    /// The span has the right length but a field holds a nonsensical value.
    #[error("decode failure in field `{field}`: {reason}")]
    DecodeFailure { field: &'static str, reason: String },

    /// A layout was requested with an unusable channel count.
    #[error("channel count {channels} outside 1..={max}")]
    InvalidLayout { channels: usize, max: usize },

    /// A frame handed to the encoder does not have the layout's shape.
    #[error("frame has {actual} `{field}` values, layout has {expected}")]
    ShapeMismatch {
        field: &'static str,
        expected: usize,
        actual: usize,
    },

    /// No sync or session marker anywhere in the buffered bytes.
    #[error("no marker found in {searched} bytes")]
    NoMarkerFound { searched: usize },

    /// The byte source ended.
    #[error("transport closed")]
    TransportClosed,

    /// An I/O error occurred while reading telemetry or writing commands.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl FrameError {
    /// Whether this error only costs one frame (decoding can continue).
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            FrameError::ShortSpan { .. }
                | FrameError::DecodeFailure { .. }
                | FrameError::NoMarkerFound { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, FrameError>;
