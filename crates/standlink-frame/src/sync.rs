//! Live stream resynchronization.
//!
//! The serial link delivers bytes in arbitrary chunks with no delivery
//! guarantee. [`StreamSynchronizer`] buffers them, hunts for the layout's
//! sync marker, cuts one frame after each marker and throws away whatever
//! lies between frames. Resynchronization is lossy: discarded bytes are
//! counted and reported as [`SyncEvent::Resync`], never hidden.

use bytes::{Buf, BytesMut};
use tracing::{debug, warn};

use crate::codec::{FrameCodec, TelemetryFrame};
use crate::error::FrameError;

const INITIAL_BUFFER_CAPACITY: usize = 1024;

/// Outcome of one synchronizer step.
#[derive(Debug)]
pub enum SyncEvent {
    /// A complete frame was cut and decoded.
    Frame(TelemetryFrame),
    /// Bytes before the next marker (or with no marker at all) were dropped.
    Resync { discarded: usize },
    /// A frame-sized span followed a marker but failed to decode.
    Dropped { error: FrameError },
}

impl SyncEvent {
    pub fn into_frame(self) -> Option<TelemetryFrame> {
        match self {
            SyncEvent::Frame(frame) => Some(frame),
            _ => None,
        }
    }
}

/// Running counters for a synchronizer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncStats {
    pub frames: u64,
    pub dropped: u64,
    pub resyncs: u64,
    pub discarded_bytes: u64,
}

/// Recovers frames from an unbounded, arbitrarily chunked byte stream.
#[derive(Debug)]
pub struct StreamSynchronizer {
    codec: FrameCodec,
    buf: BytesMut,
    stats: SyncStats,
}

impl StreamSynchronizer {
    pub fn new(codec: FrameCodec) -> Self {
        Self {
            codec,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY.max(codec.layout().wire_size())),
            stats: SyncStats::default(),
        }
    }

    pub fn codec(&self) -> &FrameCodec {
        &self.codec
    }

    /// Append bytes without processing them.
    pub fn extend(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Process buffered bytes until the next event, or `None` when more
    /// input is needed.
    pub fn next_event(&mut self) -> Option<SyncEvent> {
        let mut buf = std::mem::take(&mut self.buf);
        let event = self.next_event_in(&mut buf);
        self.buf = buf;
        event
    }

    /// Append `bytes` and drain every event they complete, in stream order.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<SyncEvent> {
        self.extend(bytes);
        let mut events = Vec::new();
        while let Some(event) = self.next_event() {
            events.push(event);
        }
        events
    }

    /// Bytes buffered but not yet consumed.
    pub fn pending(&self) -> usize {
        self.buf.len()
    }

    pub fn stats(&self) -> SyncStats {
        self.stats
    }

    /// Drop buffered bytes (e.g. after the link was reopened).
    pub fn reset(&mut self) {
        self.buf.clear();
    }

    /// Flush at end of stream.
    ///
    /// Events still complete in the buffer must be drained first. Whatever
    /// remains (a held marker prefix or a torn frame) can never complete, so
    /// it is discarded and reported as one final `Resync`.
    pub fn finish(&mut self) -> Option<SyncEvent> {
        let mut buf = std::mem::take(&mut self.buf);
        let event = self.finish_in(&mut buf);
        self.buf = buf;
        event
    }

    /// One synchronizer step over an external buffer.
    ///
    /// Shared by [`StreamSynchronizer::next_event`] and the tokio codec,
    /// which owns its read buffer.
    pub(crate) fn next_event_in(&mut self, buf: &mut BytesMut) -> Option<SyncEvent> {
        if buf.is_empty() {
            return None;
        }

        let marker = self.codec.layout().marker();
        let width = marker.len();

        let Some(offset) = find_marker(buf, marker) else {
            // Keep only a tail that could still grow into a marker.
            let keep = marker_prefix_suffix(buf, marker);
            let discarded = buf.len() - keep;
            if discarded == 0 {
                return None;
            }
            buf.advance(discarded);
            self.record_resync(discarded, "no sync marker in buffered bytes");
            return Some(SyncEvent::Resync { discarded });
        };

        if offset > 0 {
            buf.advance(offset);
            self.record_resync(offset, "dropped bytes before sync marker");
            return Some(SyncEvent::Resync { discarded: offset });
        }

        let frame_size = self.codec.frame_size();
        if buf.len() - width < frame_size {
            return None;
        }

        buf.advance(width);
        let span = buf.split_to(frame_size);
        match self.codec.decode(&span) {
            Ok(frame) => {
                self.stats.frames += 1;
                Some(SyncEvent::Frame(frame))
            }
            Err(error) => {
                self.stats.dropped += 1;
                warn!(%error, "dropping undecodable frame");
                Some(SyncEvent::Dropped { error })
            }
        }
    }

    pub(crate) fn finish_in(&mut self, buf: &mut BytesMut) -> Option<SyncEvent> {
        if buf.is_empty() {
            return None;
        }
        let discarded = buf.len();
        buf.clear();
        self.record_resync(discarded, "discarded tail at end of stream");
        Some(SyncEvent::Resync { discarded })
    }

    fn record_resync(&mut self, discarded: usize, reason: &'static str) {
        self.stats.resyncs += 1;
        self.stats.discarded_bytes += discarded as u64;
        debug!(discarded, reason, "resync");
    }
}

/// Offset of the first occurrence of `marker` in `haystack`.
pub fn find_marker(haystack: &[u8], marker: &[u8]) -> Option<usize> {
    if marker.is_empty() || haystack.len() < marker.len() {
        return None;
    }
    haystack.windows(marker.len()).position(|w| w == marker)
}

/// Length of the longest suffix of `buf` that is a proper prefix of `marker`.
fn marker_prefix_suffix(buf: &[u8], marker: &[u8]) -> usize {
    let max = marker.len().saturating_sub(1).min(buf.len());
    (1..=max)
        .rev()
        .find(|&len| buf[buf.len() - len..] == marker[..len])
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use bytes::BufMut;

    use super::*;
    use crate::layout::{FrameLayout, SESSION_MARKER};

    const GARBAGE: [u8; 7] = [0x00, 0x13, 0xAA, 0x42, 0x55, 0xFF, 0xAA];

    fn live(n: usize) -> FrameCodec {
        FrameCodec::new(FrameLayout::live(n).unwrap())
    }

    fn frame(seq: u32, channels: Vec<u16>) -> TelemetryFrame {
        TelemetryFrame {
            timestamp_us: 1_000 * seq,
            sequence: seq,
            solenoid_state: 0x8000,
            channels,
            ..TelemetryFrame::default()
        }
    }

    fn wire(codec: &FrameCodec, frames: &[TelemetryFrame]) -> Vec<u8> {
        let mut buf = BytesMut::new();
        for f in frames {
            codec.encode_with_marker(f, &mut buf).unwrap();
        }
        buf.to_vec()
    }

    fn frames_of(events: Vec<SyncEvent>) -> Vec<TelemetryFrame> {
        events.into_iter().filter_map(SyncEvent::into_frame).collect()
    }

    #[test]
    fn decodes_documented_example() {
        let mut bytes = vec![0xAA, 0x55];
        bytes.put_u32_le(1_000_000);
        bytes.put_u32_le(1);
        bytes.put_u8(0);
        bytes.put_u8(0);
        bytes.put_u16_le(0x8200);
        bytes.put_u16_le(1234);

        let mut sync = StreamSynchronizer::new(live(1));
        let frames = frames_of(sync.feed(&bytes));

        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].timestamp_us, 1_000_000);
        assert_eq!(frames[0].sequence, 1);
        assert_eq!(frames[0].solenoid_state, 0x8200);
        assert_eq!(frames[0].channels, vec![1234]);
        assert_eq!(sync.pending(), 0);
    }

    #[test]
    fn chunk_size_invariance_at_every_split() {
        let codec = live(3);
        let expected = frame(9, vec![10, 20, 30]);
        let mut stream = GARBAGE.to_vec();
        stream.extend(wire(&codec, std::slice::from_ref(&expected)));

        for split in 0..=stream.len() {
            let mut sync = StreamSynchronizer::new(codec);
            let mut events = sync.feed(&stream[..split]);
            events.extend(sync.feed(&stream[split..]));

            let frames = frames_of(events);
            assert_eq!(frames, vec![expected.clone()], "split at {split}");
            assert_eq!(sync.stats().discarded_bytes, GARBAGE.len() as u64);
            assert_eq!(sync.pending(), 0);
        }
    }

    #[test]
    fn byte_by_byte_matches_single_chunk() {
        let codec = live(2);
        let sent = vec![frame(1, vec![1, 2]), frame(2, vec![3, 4]), frame(3, vec![5, 6])];
        let mut stream = GARBAGE.to_vec();
        for f in &sent {
            stream.extend(wire(&codec, std::slice::from_ref(f)));
            stream.extend_from_slice(&[0x01, 0x02]);
        }

        let mut whole = StreamSynchronizer::new(codec);
        let bulk = frames_of(whole.feed(&stream));

        let mut trickle = StreamSynchronizer::new(codec);
        let mut events = Vec::new();
        for b in &stream {
            events.extend(trickle.feed(std::slice::from_ref(b)));
        }

        assert_eq!(bulk, sent);
        assert_eq!(frames_of(events), sent);
        assert_eq!(
            whole.stats().discarded_bytes,
            trickle.stats().discarded_bytes
        );
    }

    /// Marker-free bytes that still contain marker-like values. Consecutive
    /// bytes never repeat and 0x55 never occurs, so neither `AA 55` nor four
    /// `A5`s can appear.
    fn markerless_noise(len: usize) -> Vec<u8> {
        const ALPHABET: [u8; 6] = [0x00, 0x13, 0xAA, 0xA5, 0x42, 0xFF];
        (0..len).map(|i| ALPHABET[(i * 7 + i / 3) % 6]).collect()
    }

    fn assert_markerless_drained(codec: FrameCodec, noise: &[u8]) {
        for chunk in [1usize, 2, 3, 7, 64, noise.len()] {
            let mut sync = StreamSynchronizer::new(codec);
            let mut frames = 0;
            for piece in noise.chunks(chunk) {
                frames += frames_of(sync.feed(piece)).len();
            }
            assert_eq!(frames, 0, "chunk {chunk}");
            assert!(sync.pending() < codec.layout().marker().len(), "chunk {chunk}");

            let tail = sync.pending();
            let last = sync.finish();
            if tail > 0 {
                assert!(matches!(last, Some(SyncEvent::Resync { discarded }) if discarded == tail));
            } else {
                assert!(last.is_none());
            }
            assert_eq!(sync.pending(), 0, "chunk {chunk}");
            assert_eq!(sync.stats().discarded_bytes, noise.len() as u64);
        }
    }

    #[test]
    fn markerless_stream_is_discarded_in_any_chunking() {
        let mut noise = markerless_noise(200);
        noise.push(0xAA);
        assert_eq!(find_marker(&noise, &[0xAA, 0x55]), None);
        assert_markerless_drained(live(4), &noise);
    }

    #[test]
    fn markerless_capture_stream_ending_in_marker_prefix() {
        let mut noise = markerless_noise(200);
        noise.extend_from_slice(&[0x00, 0xA5, 0xA5, 0xA5]);
        assert_eq!(find_marker(&noise, &SESSION_MARKER), None);
        assert_markerless_drained(FrameCodec::new(FrameLayout::legacy_capture()), &noise);
    }

    #[test]
    fn held_marker_prefix_is_flushed_at_end_of_stream() {
        let mut sync = StreamSynchronizer::new(live(1));
        let mut frames = 0;
        for b in [0x01, 0x02, 0x03, 0xAA] {
            frames += frames_of(sync.feed(&[b])).len();
        }
        assert_eq!(frames, 0);
        assert_eq!(sync.pending(), 1);

        assert!(matches!(sync.finish(), Some(SyncEvent::Resync { discarded: 1 })));
        assert_eq!(sync.pending(), 0);
        assert_eq!(sync.stats().discarded_bytes, 4);
        assert!(sync.finish().is_none());
    }

    #[test]
    fn split_marker_survives_no_marker_discard() {
        let codec = live(1);
        let f = frame(5, vec![77]);
        let bytes = wire(&codec, std::slice::from_ref(&f));

        let mut sync = StreamSynchronizer::new(codec);
        let mut first = vec![0x10, 0x20, 0x30];
        first.push(bytes[0]);
        let events = sync.feed(&first);
        assert!(matches!(events[..], [SyncEvent::Resync { discarded: 3 }]));
        assert_eq!(sync.pending(), 1);

        assert_eq!(frames_of(sync.feed(&bytes[1..])), vec![f]);
    }

    #[test]
    fn partial_frame_is_retained_until_complete() {
        let codec = live(4);
        let f = frame(1, vec![1, 2, 3, 4]);
        let bytes = wire(&codec, std::slice::from_ref(&f));

        let mut sync = StreamSynchronizer::new(codec);
        assert!(sync.feed(&bytes[..10]).is_empty());
        assert_eq!(sync.pending(), 10);
        assert_eq!(frames_of(sync.feed(&bytes[10..])), vec![f]);
    }

    #[test]
    fn frames_emitted_in_marker_order() {
        let codec = live(1);
        let sent: Vec<_> = (0..20).map(|i| frame(i, vec![i as u16])).collect();
        let mut sync = StreamSynchronizer::new(codec);
        assert_eq!(frames_of(sync.feed(&wire(&codec, &sent))), sent);
        assert_eq!(sync.stats().frames, 20);
    }

    #[test]
    fn corrupted_frame_costs_a_gap_not_the_stream() {
        let codec = live(2);
        let good = vec![frame(1, vec![1, 1]), frame(2, vec![2, 2])];
        let mut stream = wire(&codec, &good[..1]);
        // Truncated frame: marker and 5 bytes, then the next real frame.
        stream.extend_from_slice(&[0xAA, 0x55, 9, 9, 9, 9, 9]);
        stream.extend(wire(&codec, &good[1..]));

        let mut sync = StreamSynchronizer::new(codec);
        let events = sync.feed(&stream);
        let frames = frames_of(events);

        // The truncated frame swallows the head of the next one; what follows
        // is reported as a gap and the stream keeps decoding afterwards.
        assert_eq!(frames[0], good[0]);
        let mut more = wire(&codec, &[frame(3, vec![3, 3])]);
        more.insert(0, 0x00);
        let later = frames_of(sync.feed(&more));
        assert_eq!(later.last().map(|f| f.sequence), Some(3));
        assert!(sync.stats().resyncs >= 1);
    }

    #[test]
    fn capture_marker_used_for_capture_layout() {
        let codec = FrameCodec::new(FrameLayout::legacy_capture());
        let f = TelemetryFrame {
            channels: vec![1, 2, 3, 4],
            payload_centi_psi: vec![5, 6, 7, 8],
            ..TelemetryFrame::default()
        };
        let mut stream = vec![0xA5, 0x00];
        stream.extend(wire(&codec, std::slice::from_ref(&f)));

        let mut sync = StreamSynchronizer::new(codec);
        assert_eq!(frames_of(sync.feed(&stream)), vec![f]);
    }

    #[test]
    fn find_marker_edges() {
        assert_eq!(find_marker(&[0xAA, 0x55], &[0xAA, 0x55]), Some(0));
        assert_eq!(find_marker(&[0xAA], &[0xAA, 0x55]), None);
        assert_eq!(find_marker(&[1, 0xAA, 0xAA, 0x55], &[0xAA, 0x55]), Some(2));
        assert_eq!(marker_prefix_suffix(&[1, 2, 0xAA], &[0xAA, 0x55]), 1);
        assert_eq!(
            marker_prefix_suffix(&[0xA5, 0xA5, 0xA5], &SESSION_MARKER),
            3
        );
        assert_eq!(marker_prefix_suffix(&[1, 2, 3], &[0xAA, 0x55]), 0);
    }
}
