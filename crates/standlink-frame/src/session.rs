//! Offline capture splitting.
//!
//! A capture file holds one region per controller power cycle, each opened
//! by the 4-byte session marker and followed by back-to-back frames with no
//! per-frame sync. Regions are decoded independently: a damaged tail in one
//! session never affects another.

use tracing::{debug, info, warn};

use crate::codec::{FrameCodec, TelemetryFrame};
use crate::error::{FrameError, Result};
use crate::rate::estimate_rate;
use crate::sync::find_marker;

/// One power-cycle region of a capture.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    /// Discovery order, 0-based.
    pub index: usize,
    /// Offset of the session marker in the capture.
    pub marker_offset: usize,
    /// Region length in bytes, marker excluded.
    pub region_len: usize,
    /// Frames decoded before the region ran out or faulted.
    pub frames: Vec<TelemetryFrame>,
    /// Bytes left undecoded at the end of the region.
    pub trailing_bytes: usize,
    /// Why decoding stopped early, if it did.
    pub fault: Option<String>,
    /// Sample rate derived from frame timestamps.
    pub rate_hz: Option<f64>,
}

impl Session {
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Rate as `"123.45 Hz"` or `"unknown"`.
    pub fn rate_label(&self) -> String {
        match self.rate_hz {
            Some(rate) => format!("{rate:.2} Hz"),
            None => "unknown".to_string(),
        }
    }
}

/// Splits a capture buffer into sessions and decodes each one.
#[derive(Debug, Clone, Copy)]
pub struct SessionSplitter {
    codec: FrameCodec,
}

impl SessionSplitter {
    pub fn new(codec: FrameCodec) -> Self {
        Self { codec }
    }

    /// Offsets of every non-overlapping session marker, in order.
    pub fn marker_offsets(&self, data: &[u8]) -> Vec<usize> {
        let marker = self.codec.layout().marker();
        let mut offsets = Vec::new();
        let mut start = 0usize;
        while let Some(found) = find_marker(&data[start..], marker) {
            let offset = start + found;
            offsets.push(offset);
            start = offset + marker.len();
        }
        offsets
    }

    /// Locate every session and decode them one at a time, in marker order.
    ///
    /// Fails with `NoMarkerFound` only when the buffer holds no marker at all.
    /// A session is decoded only when the iterator reaches it, so callers can
    /// flush each one before the next is touched.
    pub fn sessions<'a>(&self, data: &'a [u8]) -> Result<Sessions<'a>> {
        let offsets = self.marker_offsets(data);
        if offsets.is_empty() {
            return Err(FrameError::NoMarkerFound {
                searched: data.len(),
            });
        }
        info!(sessions = offsets.len(), bytes = data.len(), "found session markers");
        Ok(Sessions {
            splitter: *self,
            data,
            offsets,
            next: 0,
        })
    }

    /// Split and decode a whole capture.
    ///
    /// Corruption inside a session truncates that session and nothing else.
    pub fn split(&self, data: &[u8]) -> Result<Vec<Session>> {
        Ok(self.sessions(data)?.collect())
    }

    /// Decode one region back to back, stopping at the first short tail or
    /// decode error.
    pub fn decode_session(&self, index: usize, marker_offset: usize, region: &[u8]) -> Session {
        let frame_size = self.codec.frame_size();
        let mut frames = Vec::with_capacity(region.len() / frame_size);
        let mut fault = None;
        let mut consumed = 0usize;

        for span in region.chunks_exact(frame_size) {
            match self.codec.decode(span) {
                Ok(frame) => {
                    frames.push(frame);
                    consumed += frame_size;
                }
                Err(err) => {
                    warn!(session = index, offset = consumed, error = %err, "abandoning session");
                    fault = Some(err.to_string());
                    break;
                }
            }
        }

        let rate_hz = estimate_rate(frames.iter().map(|f| f.timestamp_us));
        let trailing_bytes = region.len() - consumed;
        debug!(
            session = index,
            frames = frames.len(),
            trailing_bytes,
            "decoded session"
        );

        Session {
            index,
            marker_offset,
            region_len: region.len(),
            frames,
            trailing_bytes,
            fault,
            rate_hz,
        }
    }
}

/// Lazily decoded sessions of one capture.
#[derive(Debug)]
pub struct Sessions<'a> {
    splitter: SessionSplitter,
    data: &'a [u8],
    offsets: Vec<usize>,
    next: usize,
}

impl Sessions<'_> {
    /// Marker offsets of every session, decoded or not.
    pub fn marker_offsets(&self) -> &[usize] {
        &self.offsets
    }
}

impl Iterator for Sessions<'_> {
    type Item = Session;

    fn next(&mut self) -> Option<Session> {
        let index = self.next;
        let marker_offset = *self.offsets.get(index)?;
        self.next += 1;

        let start = marker_offset + self.splitter.codec.layout().marker().len();
        let end = self
            .offsets
            .get(index + 1)
            .copied()
            .unwrap_or(self.data.len());
        Some(
            self.splitter
                .decode_session(index, marker_offset, &self.data[start..end]),
        )
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.offsets.len() - self.next;
        (left, Some(left))
    }
}

impl ExactSizeIterator for Sessions<'_> {}
