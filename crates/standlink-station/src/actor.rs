//! Live decode loop on a dedicated thread.
//!
//! The actor owns the link. It talks to the rest of the process only through
//! the shared [`TelemetryStore`](crate::store::TelemetryStore) and the
//! [`CommandChannel`]: queued command words are written before every read,
//! decoded frames are ingested under one short store lock per read.

use std::io::{Read, Write};
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use standlink_frame::{
    CommandWriter, FrameError, FrameReader, SyncEvent, SyncStats, TelemetryFrame,
};
use tracing::{debug, info, warn};

use crate::command::CommandChannel;
use crate::error::{Result, StationError};
use crate::store::{lock_store, SharedStore};

/// Name of the decode thread.
pub const ACTOR_THREAD_NAME: &str = "standlink-decode";

/// Receives every decoded frame after it reaches the store.
pub trait FrameSink: Send {
    fn record(&mut self, frame: &TelemetryFrame) -> std::io::Result<()>;

    fn finish(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Why the decode loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActorEnd {
    /// `stop()` was called or the handle was dropped.
    StopRequested,
    /// The link is gone: end of stream, or a hard I/O error on either half.
    TransportClosed,
}

/// Final counters of a decode run.
#[derive(Debug, Clone, PartialEq)]
pub struct ActorReport {
    pub end: ActorEnd,
    pub stats: SyncStats,
    pub commands_sent: u64,
    pub sink_errors: u64,
    pub rate_hz: Option<f64>,
    /// The I/O error that took the link down, if it did not end cleanly.
    pub link_error: Option<String>,
}

impl ActorReport {
    /// Turn an end-of-stream into `FrameError::TransportClosed`.
    pub fn into_result(self) -> Result<Self> {
        match self.end {
            ActorEnd::StopRequested => Ok(self),
            ActorEnd::TransportClosed => Err(FrameError::TransportClosed.into()),
        }
    }
}

pub struct DecodeActor<R, W> {
    reader: FrameReader<R>,
    writer: CommandWriter<W>,
    store: SharedStore,
    commands: Arc<CommandChannel>,
    sink: Option<Box<dyn FrameSink>>,
    summary_interval: Option<Duration>,
}

impl<R, W> DecodeActor<R, W>
where
    R: Read + Send + 'static,
    W: Write + Send + 'static,
{
    pub fn new(
        reader: FrameReader<R>,
        writer: CommandWriter<W>,
        store: SharedStore,
        commands: Arc<CommandChannel>,
    ) -> Self {
        Self {
            reader,
            writer,
            store,
            commands,
            sink: None,
            summary_interval: None,
        }
    }

    pub fn with_sink(mut self, sink: Box<dyn FrameSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Log a decode summary this often. `None` logs only the final one.
    pub fn with_summary_interval(mut self, interval: Option<Duration>) -> Self {
        self.summary_interval = interval;
        self
    }

    /// Start the loop on its own thread.
    pub fn spawn(self) -> Result<ActorHandle> {
        let (stop_tx, stop_rx) = mpsc::channel();
        let thread = thread::Builder::new()
            .name(ACTOR_THREAD_NAME.to_string())
            .spawn(move || self.run(stop_rx))
            .map_err(StationError::Spawn)?;
        Ok(ActorHandle {
            stop: stop_tx,
            thread,
        })
    }

    /// Run on the current thread until stopped or the link is gone.
    ///
    /// Losing the link is an end of stream, not a failure: the sink is
    /// finished and the report is produced either way.
    pub fn run(mut self, stop: Receiver<()>) -> ActorReport {
        info!("decode actor started");
        let mut sink_errors = 0u64;
        let mut link_error = None;
        let mut last_summary = Instant::now();

        let end = loop {
            match stop.try_recv() {
                Ok(()) | Err(TryRecvError::Disconnected) => break ActorEnd::StopRequested,
                Err(TryRecvError::Empty) => {}
            }

            if let Err(err) = self.flush_commands() {
                link_error = self.link_lost("write", err);
                break ActorEnd::TransportClosed;
            }

            let events = match self.reader.poll() {
                Ok(events) => events,
                Err(err) => {
                    link_error = self.link_lost("read", err);
                    break ActorEnd::TransportClosed;
                }
            };
            sink_errors += self.dispatch(events);

            if let Some(interval) = self.summary_interval {
                if last_summary.elapsed() >= interval {
                    self.log_summary("decode summary");
                    last_summary = Instant::now();
                }
            }
        };

        if let Some(sink) = self.sink.as_mut() {
            if let Err(err) = sink.finish() {
                warn!(error = %err, "frame sink failed to finish");
                sink_errors += 1;
            }
        }
        self.log_summary("decode actor stopped");

        ActorReport {
            end,
            stats: self.reader.stats(),
            commands_sent: self.writer.sent(),
            sink_errors,
            rate_hz: lock_store(&self.store).rate_hz(),
            link_error,
        }
    }

    fn flush_commands(&mut self) -> std::result::Result<(), FrameError> {
        while let Some(word) = self.commands.next_word() {
            self.writer.send(word)?;
        }
        Ok(())
    }

    /// Close out the read side after the link ended on `half`.
    ///
    /// Returns the error text for anything other than a clean end of stream.
    fn link_lost(&mut self, half: &'static str, err: FrameError) -> Option<String> {
        if let Some(SyncEvent::Resync { discarded }) = self.reader.finish() {
            debug!(discarded, "discarded partial frame on link loss");
        }
        match err {
            FrameError::TransportClosed => {
                info!(half, "link closed");
                None
            }
            other => {
                warn!(half, error = %other, "link lost");
                Some(other.to_string())
            }
        }
    }

    /// Ingest frames and feed the sink. Returns sink failures.
    fn dispatch(&mut self, events: Vec<SyncEvent>) -> u64 {
        let frames: Vec<TelemetryFrame> = events
            .into_iter()
            .filter_map(SyncEvent::into_frame)
            .collect();
        if frames.is_empty() {
            return 0;
        }

        {
            let mut store = lock_store(&self.store);
            for frame in &frames {
                store.ingest(frame);
            }
        }

        let mut failures = 0;
        if let Some(sink) = self.sink.as_mut() {
            for frame in &frames {
                if let Err(err) = sink.record(frame) {
                    failures += 1;
                    debug!(seq = frame.sequence, error = %err, "frame sink rejected frame");
                }
            }
            if failures > 0 {
                warn!(failures, "frame sink errors");
            }
        }
        failures
    }

    fn log_summary(&self, message: &str) {
        let stats = self.reader.stats();
        let rate_hz = lock_store(&self.store).rate_hz();
        info!(
            frames = stats.frames,
            dropped = stats.dropped,
            resyncs = stats.resyncs,
            discarded_bytes = stats.discarded_bytes,
            commands = self.writer.sent(),
            rate_hz = ?rate_hz,
            "{message}"
        );
    }
}

/// Handle to a running decode actor.
#[derive(Debug)]
pub struct ActorHandle {
    stop: Sender<()>,
    thread: JoinHandle<ActorReport>,
}

impl ActorHandle {
    /// Ask the loop to exit after its current read.
    pub fn stop(&self) {
        // A closed channel means the loop already exited.
        let _ = self.stop.send(());
    }

    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    /// Wait for the loop to exit.
    pub fn join(self) -> Result<ActorReport> {
        self.thread
            .join()
            .map_err(|_| StationError::ActorPanicked)
    }
}
