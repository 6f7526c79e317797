use std::io::{ErrorKind, Write};

use bytes::BytesMut;

use crate::codec::{encode_command, CommandFormat};
use crate::error::{FrameError, Result};

/// Writes solenoid command words to any `Write` sink.
pub struct CommandWriter<T> {
    inner: T,
    buf: BytesMut,
    format: CommandFormat,
    sent: u64,
}

impl<T: Write> CommandWriter<T> {
    /// Create a command writer using the text command format.
    pub fn new(inner: T) -> Self {
        Self::with_format(inner, CommandFormat::default())
    }

    /// Create a command writer with an explicit wire format.
    pub fn with_format(inner: T, format: CommandFormat) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(32),
            format,
            sent: 0,
        }
    }

    /// Encode and send one command word (blocking), then flush.
    pub fn send(&mut self, word: u16) -> Result<()> {
        self.buf.clear();
        encode_command(word, self.format, &mut self.buf);

        let mut offset = 0usize;
        while offset < self.buf.len() {
            match self.inner.write(&self.buf[offset..]) {
                Ok(0) => return Err(FrameError::TransportClosed),
                Ok(n) => offset += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }

        self.flush()?;
        self.sent += 1;
        tracing::debug!("sent command 0x{word:04X}");
        Ok(())
    }

    /// Flush the underlying sink.
    pub fn flush(&mut self) -> Result<()> {
        loop {
            match self.inner.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }
    }

    /// Commands written successfully.
    pub fn sent(&self) -> u64 {
        self.sent
    }

    pub fn format(&self) -> CommandFormat {
        self.format
    }

    /// Borrow the underlying sink.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying sink.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the writer and return the inner sink.
    pub fn into_inner(self) -> T {
        self.inner
    }
}
