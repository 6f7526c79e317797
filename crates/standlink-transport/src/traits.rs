use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use std::time::Duration;

use tracing::debug;

use crate::error::{Result, TransportError};

/// A connected telemetry link. Implements Read + Write.
///
/// This is the fundamental I/O type returned by transport operations.
/// A serial link carries telemetry in and command words out. A replay link
/// reads a recorded byte stream and accepts (and discards) outgoing bytes so
/// the rest of the pipeline can run unchanged against a capture.
pub struct LinkStream {
    inner: LinkStreamInner,
}

enum LinkStreamInner {
    #[cfg(feature = "serial")]
    Serial(Box<dyn serialport::SerialPort>),
    Replay { file: File, discarded: u64 },
}

impl Read for LinkStream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match &mut self.inner {
            #[cfg(feature = "serial")]
            LinkStreamInner::Serial(port) => port.read(buf),
            LinkStreamInner::Replay { file, .. } => file.read(buf),
        }
    }
}

impl Write for LinkStream {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match &mut self.inner {
            #[cfg(feature = "serial")]
            LinkStreamInner::Serial(port) => port.write(buf),
            LinkStreamInner::Replay { discarded, .. } => {
                *discarded = discarded.saturating_add(buf.len() as u64);
                debug!(len = buf.len(), "replay link discarding outgoing bytes");
                Ok(buf.len())
            }
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match &mut self.inner {
            #[cfg(feature = "serial")]
            LinkStreamInner::Serial(port) => port.flush(),
            LinkStreamInner::Replay { .. } => Ok(()),
        }
    }
}

impl LinkStream {
    /// Wrap an opened serial port.
    #[cfg(feature = "serial")]
    pub(crate) fn from_serial(port: Box<dyn serialport::SerialPort>) -> Self {
        Self {
            inner: LinkStreamInner::Serial(port),
        }
    }

    /// Open a recorded byte stream for replay.
    pub fn replay(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| TransportError::Open {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        debug!(?path, "opened replay link");
        Ok(Self {
            inner: LinkStreamInner::Replay { file, discarded: 0 },
        })
    }

    /// Set read timeout on the underlying link.
    ///
    /// `None` means "block until data arrives" for serial ports. Replay links
    /// never block, so the timeout is ignored.
    pub fn set_read_timeout(&mut self, timeout: Option<Duration>) -> Result<()> {
        match &mut self.inner {
            #[cfg(feature = "serial")]
            LinkStreamInner::Serial(port) => {
                // serialport has no "infinite" timeout; a day is close enough.
                let timeout = timeout.unwrap_or(Duration::from_secs(86_400));
                port.set_timeout(timeout)
                    .map_err(|e| TransportError::Io(std::io::Error::other(e.to_string())))
            }
            LinkStreamInner::Replay { .. } => {
                let _ = timeout;
                Ok(())
            }
        }
    }

    /// Try to clone this link (creates a new handle to the same device or file).
    ///
    /// Used to split a link into a reading half and a writing half.
    pub fn try_clone(&self) -> Result<Self> {
        match &self.inner {
            #[cfg(feature = "serial")]
            LinkStreamInner::Serial(port) => {
                let cloned = port
                    .try_clone()
                    .map_err(|e| TransportError::Io(std::io::Error::other(e.to_string())))?;
                Ok(Self::from_serial(cloned))
            }
            LinkStreamInner::Replay { file, .. } => Ok(Self {
                inner: LinkStreamInner::Replay {
                    file: file.try_clone()?,
                    discarded: 0,
                },
            }),
        }
    }

    /// Bytes written to a replay link and dropped. Always 0 for serial links.
    pub fn discarded_writes(&self) -> u64 {
        match &self.inner {
            #[cfg(feature = "serial")]
            LinkStreamInner::Serial(_) => 0,
            LinkStreamInner::Replay { discarded, .. } => *discarded,
        }
    }

    /// Transport name for diagnostics.
    pub fn transport_name(&self) -> &'static str {
        match &self.inner {
            #[cfg(feature = "serial")]
            LinkStreamInner::Serial(_) => "serial",
            LinkStreamInner::Replay { .. } => "replay",
        }
    }
}

impl std::fmt::Debug for LinkStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.inner {
            #[cfg(feature = "serial")]
            LinkStreamInner::Serial(port) => f
                .debug_struct("LinkStream")
                .field("type", &"serial")
                .field("name", &port.name())
                .finish(),
            LinkStreamInner::Replay { discarded, .. } => f
                .debug_struct("LinkStream")
                .field("type", &"replay")
                .field("discarded", discarded)
                .finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_capture(tag: &str, contents: &[u8]) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(format!(
            "standlink-transport-{tag}-{}.bin",
            std::process::id()
        ));
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn replay_reads_recorded_bytes_then_eof() {
        let path = temp_capture("read", b"\xAA\x55abc");
        let mut link = LinkStream::replay(&path).unwrap();

        let mut buf = Vec::new();
        link.read_to_end(&mut buf).unwrap();
        assert_eq!(buf, b"\xAA\x55abc");

        let mut more = [0u8; 4];
        assert_eq!(link.read(&mut more).unwrap(), 0);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn replay_accepts_and_counts_writes() {
        let path = temp_capture("write", b"");
        let mut link = LinkStream::replay(&path).unwrap();

        link.write_all(b"0x8000,2\n").unwrap();
        link.flush().unwrap();

        assert_eq!(link.discarded_writes(), 9);
        assert_eq!(link.transport_name(), "replay");
        assert_eq!(std::fs::read(&path).unwrap(), b"");
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn replay_missing_file_is_open_error() {
        let result = LinkStream::replay("/nonexistent/standlink/capture.bin");
        assert!(matches!(result, Err(TransportError::Open { .. })));
    }

    #[test]
    fn cloned_replay_shares_file_position() {
        let path = temp_capture("clone", b"0123456789");
        let mut link = LinkStream::replay(&path).unwrap();
        let mut clone = link.try_clone().unwrap();

        let mut head = [0u8; 4];
        link.read_exact(&mut head).unwrap();
        let mut rest = Vec::new();
        clone.read_to_end(&mut rest).unwrap();

        assert_eq!(&head, b"0123");
        assert_eq!(rest, b"456789");
        assert!(link.set_read_timeout(Some(Duration::from_millis(5))).is_ok());
        let _ = std::fs::remove_file(&path);
    }
}
