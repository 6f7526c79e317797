//! `tokio-util` codec for async links.

use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};

use crate::codec::{encode_command, CommandFormat, FrameCodec};
use crate::error::FrameError;
use crate::sync::{StreamSynchronizer, SyncEvent, SyncStats};

/// Frames telemetry in and command words out over an async byte stream.
///
/// Decoding yields the same [`SyncEvent`]s as [`StreamSynchronizer::feed`];
/// the read buffer is owned by `FramedRead`/`Framed`.
#[derive(Debug)]
pub struct SyncCodec {
    sync: StreamSynchronizer,
    format: CommandFormat,
}

impl SyncCodec {
    pub fn new(codec: FrameCodec, format: CommandFormat) -> Self {
        Self {
            sync: StreamSynchronizer::new(codec),
            format,
        }
    }

    pub fn stats(&self) -> SyncStats {
        self.sync.stats()
    }
}

impl Decoder for SyncCodec {
    type Item = SyncEvent;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<SyncEvent>, FrameError> {
        Ok(self.sync.next_event_in(src))
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<SyncEvent>, FrameError> {
        if let Some(event) = self.decode(src)? {
            return Ok(Some(event));
        }
        Ok(self.sync.finish_in(src))
    }
}

impl Encoder<u16> for SyncCodec {
    type Error = FrameError;

    fn encode(&mut self, word: u16, dst: &mut BytesMut) -> Result<(), FrameError> {
        encode_command(word, self.format, dst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use futures_util::{SinkExt, StreamExt};
    use tokio_util::codec::{FramedRead, FramedWrite};

    use super::*;
    use crate::codec::TelemetryFrame;
    use crate::layout::FrameLayout;

    fn codec() -> FrameCodec {
        FrameCodec::new(FrameLayout::live(1).unwrap())
    }

    #[tokio::test]
    async fn framed_read_yields_events_in_order() {
        let frames: Vec<_> = (0..3)
            .map(|i| TelemetryFrame {
                sequence: i,
                channels: vec![i as u16],
                ..TelemetryFrame::default()
            })
            .collect();
        let mut wire = BytesMut::new();
        wire.extend_from_slice(&[0x01]);
        for f in &frames {
            codec().encode_with_marker(f, &mut wire).unwrap();
        }
        wire.extend_from_slice(&[0xAA, 0x55, 0x00]);

        let bytes = wire.to_vec();
        let mut framed = FramedRead::new(
            bytes.as_slice(),
            SyncCodec::new(codec(), CommandFormat::Binary),
        );

        let mut decoded = Vec::new();
        let mut discarded = 0;
        while let Some(event) = framed.next().await {
            match event.unwrap() {
                SyncEvent::Frame(f) => decoded.push(f),
                SyncEvent::Resync { discarded: n } => discarded += n,
                SyncEvent::Dropped { error } => panic!("unexpected drop: {error}"),
            }
        }

        assert_eq!(decoded, frames);
        assert_eq!(discarded, 1 + 3);

        // The torn tail flushed at EOF is counted like every other gap.
        let stats = framed.decoder().stats();
        assert_eq!(stats.frames, 3);
        assert_eq!(stats.resyncs, 2);
        assert_eq!(stats.discarded_bytes, 4);
    }

    #[tokio::test]
    async fn framed_write_encodes_commands() {
        let mut out = Vec::new();
        {
            let mut framed = FramedWrite::new(
                &mut out,
                SyncCodec::new(codec(), CommandFormat::Text { address: 2 }),
            );
            framed.send(0x8000).await.unwrap();
            framed.send(0x8200).await.unwrap();
        }
        assert_eq!(out, b"0x8000,2\n0x8200,2\n");
    }
}
