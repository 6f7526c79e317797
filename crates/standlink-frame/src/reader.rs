use std::io::{ErrorKind, Read};
use std::time::Duration;

use standlink_transport::LinkStream;

use crate::codec::{FrameCodec, TelemetryFrame};
use crate::error::{FrameError, Result};
use crate::sync::{StreamSynchronizer, SyncEvent, SyncStats};

/// Default bytes requested from the link per read.
pub const DEFAULT_READ_CHUNK: usize = 4 * 1024;

/// Default read timeout for live links.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(100);

/// Configuration for the blocking frame reader.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Bytes requested from the link per read. Default: 4 KiB.
    pub read_chunk_size: usize,
    /// Read timeout applied to serial links. Default: 100 ms.
    pub read_timeout: Option<Duration>,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            read_chunk_size: DEFAULT_READ_CHUNK,
            read_timeout: Some(DEFAULT_READ_TIMEOUT),
        }
    }
}

/// Reads telemetry frames from any `Read` byte source.
///
/// Handles partial reads and resynchronization internally. A read that
/// returns 0 bytes is the end of the stream: bytes that can no longer form a
/// frame are flushed as a final `Resync`, then every later call returns
/// `FrameError::TransportClosed`. Timeouts are empty chunks, not errors.
pub struct FrameReader<T> {
    inner: T,
    sync: StreamSynchronizer,
    chunk: Vec<u8>,
    config: FrameConfig,
    closed: bool,
}

impl<T: Read> FrameReader<T> {
    /// Create a new frame reader with default configuration.
    pub fn new(inner: T, codec: FrameCodec) -> Self {
        Self::with_config(inner, codec, FrameConfig::default())
    }

    /// Create a new frame reader with explicit configuration.
    pub fn with_config(inner: T, codec: FrameCodec, config: FrameConfig) -> Self {
        Self {
            inner,
            sync: StreamSynchronizer::new(codec),
            chunk: vec![0u8; config.read_chunk_size.max(1)],
            config,
            closed: false,
        }
    }

    /// Perform at most one read and return every event it completed.
    ///
    /// Events still buffered from an earlier read are returned without
    /// touching the link. An empty vector means "nothing yet".
    pub fn poll(&mut self) -> Result<Vec<SyncEvent>> {
        let mut events = self.drain();
        if !events.is_empty() {
            return Ok(events);
        }
        if self.closed {
            return Err(FrameError::TransportClosed);
        }

        let read = match self.inner.read(&mut self.chunk) {
            Ok(n) => n,
            Err(err) if is_empty_read(err.kind()) => return Ok(events),
            Err(err) => return Err(FrameError::Io(err)),
        };

        if read == 0 {
            return match self.finish() {
                Some(event) => Ok(vec![event]),
                None => Err(FrameError::TransportClosed),
            };
        }

        self.sync.extend(&self.chunk[..read]);
        events = self.drain();
        Ok(events)
    }

    /// Read the next complete frame (blocking).
    ///
    /// Resync and dropped-frame events along the way are consumed and
    /// counted in [`FrameReader::stats`]. Returns
    /// `Err(FrameError::TransportClosed)` when EOF is reached.
    pub fn read_frame(&mut self) -> Result<TelemetryFrame> {
        loop {
            while let Some(event) = self.sync.next_event() {
                if let SyncEvent::Frame(frame) = event {
                    return Ok(frame);
                }
            }
            if self.closed {
                return Err(FrameError::TransportClosed);
            }

            let read = match self.inner.read(&mut self.chunk) {
                Ok(n) => n,
                Err(err) if is_empty_read(err.kind()) => continue,
                Err(err) => return Err(FrameError::Io(err)),
            };

            if read == 0 {
                self.finish();
                return Err(FrameError::TransportClosed);
            }

            self.sync.extend(&self.chunk[..read]);
        }
    }

    /// Mark the source as ended and flush the unframeable tail.
    ///
    /// Called on EOF; callers that give up on a link after a hard I/O error
    /// call it too so the tail is still accounted for.
    pub fn finish(&mut self) -> Option<SyncEvent> {
        self.closed = true;
        self.sync.finish()
    }

    /// Whether the source has reached end of stream.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    fn drain(&mut self) -> Vec<SyncEvent> {
        let mut events = Vec::new();
        while let Some(event) = self.sync.next_event() {
            events.push(event);
        }
        events
    }

    /// Synchronizer counters (frames, drops, resyncs).
    pub fn stats(&self) -> SyncStats {
        self.sync.stats()
    }

    /// Bytes buffered but not yet framed.
    pub fn pending(&self) -> usize {
        self.sync.pending()
    }

    /// Borrow the underlying byte source.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying byte source.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the reader and return the inner byte source.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Current frame reader configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}

impl FrameReader<LinkStream> {
    /// Create a frame reader for `LinkStream` and apply read timeout from config.
    pub fn with_config_link(
        mut inner: LinkStream,
        codec: FrameCodec,
        config: FrameConfig,
    ) -> Result<Self> {
        inner
            .set_read_timeout(config.read_timeout)
            .map_err(transport_to_frame_error)?;
        Ok(Self::with_config(inner, codec, config))
    }
}

fn is_empty_read(kind: ErrorKind) -> bool {
    matches!(
        kind,
        ErrorKind::Interrupted | ErrorKind::WouldBlock | ErrorKind::TimedOut
    )
}

pub(crate) fn transport_to_frame_error(err: standlink_transport::TransportError) -> FrameError {
    match err {
        standlink_transport::TransportError::Io(io) => FrameError::Io(io),
        other => FrameError::Io(std::io::Error::other(other.to_string())),
    }
}
