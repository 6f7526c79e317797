//! Decoded telemetry state shared between the decode and presentation sides.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use standlink_frame::{RateEstimator, TelemetryFrame};
use tracing::info;

use crate::calibration::Calibration;
use crate::config::{ChannelInfo, ChannelKind, StationConfig};
use crate::error::{Result, StationError};
use crate::history::{ChannelHistory, Sample};

/// Store handle shared across threads.
pub type SharedStore = Arc<Mutex<TelemetryStore>>;

/// Lock a shared store, recovering the data if a holder panicked.
pub fn lock_store(store: &SharedStore) -> MutexGuard<'_, TelemetryStore> {
    store.lock().unwrap_or_else(PoisonError::into_inner)
}

/// One sample as read back, raw or calibrated.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Reading {
    pub timestamp_us: u32,
    pub value: f64,
}

/// Latest value of one channel.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChannelSnapshot {
    pub label: String,
    pub raw: Option<u16>,
    /// Calibrated for pressure channels, raw otherwise.
    pub value: Option<f64>,
    pub offset: f64,
}

/// Point-in-time view for presentation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoreSnapshot {
    pub frames: u64,
    pub last_sequence: Option<u32>,
    pub last_timestamp_us: Option<u32>,
    pub solenoid_state: u16,
    pub rate_hz: Option<f64>,
    pub channels: Vec<ChannelSnapshot>,
}

/// Bounded per-channel history plus calibration offsets.
///
/// Raw samples are never rewritten; calibration is applied on read.
#[derive(Debug, Clone)]
pub struct TelemetryStore {
    channels: Vec<ChannelInfo>,
    histories: Vec<ChannelHistory>,
    calibration: Calibration,
    solenoid_state: u16,
    last_sequence: Option<u32>,
    last_timestamp_us: Option<u32>,
    frames: u64,
    rate: RateEstimator,
}

impl TelemetryStore {
    pub fn new(config: &StationConfig) -> Self {
        Self::with_channels(config.channels(), config.history_len)
    }

    pub fn with_channels(channels: Vec<ChannelInfo>, history_len: usize) -> Self {
        let histories = channels
            .iter()
            .map(|_| ChannelHistory::new(history_len))
            .collect();
        let calibration = Calibration::new(channels.len());
        Self {
            channels,
            histories,
            calibration,
            solenoid_state: 0,
            last_sequence: None,
            last_timestamp_us: None,
            frames: 0,
            rate: RateEstimator::new(),
        }
    }

    pub fn into_shared(self) -> SharedStore {
        Arc::new(Mutex::new(self))
    }

    /// Append one frame's samples. Channels beyond the configured count
    /// are ignored.
    pub fn ingest(&mut self, frame: &TelemetryFrame) {
        for (history, &value) in self.histories.iter_mut().zip(&frame.channels) {
            history.push(Sample {
                timestamp_us: frame.timestamp_us,
                value,
            });
        }
        self.solenoid_state = frame.solenoid_state;
        self.last_sequence = Some(frame.sequence);
        self.last_timestamp_us = Some(frame.timestamp_us);
        self.rate.push(frame.timestamp_us);
        self.frames += 1;
    }

    /// Channel history, oldest first.
    ///
    /// With `calibrated`, pressure channels are converted to psi minus the
    /// current zero offset; other channels come back raw either way.
    pub fn read(&self, channel: usize, calibrated: bool) -> Result<Vec<Reading>> {
        let history = self.history_checked(channel)?;
        Ok(history
            .iter()
            .map(|s| self.reading(channel, *s, calibrated))
            .collect())
    }

    pub fn latest(&self, channel: usize, calibrated: bool) -> Result<Option<Reading>> {
        let history = self.history_checked(channel)?;
        Ok(history
            .latest()
            .map(|s| self.reading(channel, s, calibrated)))
    }

    /// Use the channel's latest pre-zero pressure as its new offset.
    ///
    /// Returns the offset, or `None` if the channel has no samples yet.
    pub fn zero(&mut self, channel: usize) -> Result<Option<f64>> {
        let class = match self.kind_checked(channel)? {
            ChannelKind::Pressure(class) => class,
            _ => return Err(StationError::NotPressure { index: channel }),
        };
        let Some(last) = self.histories[channel].latest() else {
            return Ok(None);
        };
        let offset = class.counts_to_psi(last.value);
        self.calibration.set_offset(channel, offset);
        info!(channel = %self.channels[channel], offset, "zeroed channel");
        Ok(Some(offset))
    }

    /// Zero every pressure channel that has data. Returns the channels zeroed.
    pub fn zero_pressures(&mut self) -> Vec<usize> {
        let pressure: Vec<usize> = self
            .channels
            .iter()
            .filter(|c| matches!(c.kind, ChannelKind::Pressure(_)))
            .map(|c| c.index)
            .collect();
        pressure
            .into_iter()
            .filter(|&c| matches!(self.zero(c), Ok(Some(_))))
            .collect()
    }

    pub fn clear_calibration(&mut self) {
        self.calibration.clear();
    }

    pub fn calibration(&self) -> &Calibration {
        &self.calibration
    }

    /// Solenoid word reported by the most recent frame.
    pub fn solenoid_state(&self) -> u16 {
        self.solenoid_state
    }

    pub fn frames_ingested(&self) -> u64 {
        self.frames
    }

    pub fn rate_hz(&self) -> Option<f64> {
        self.rate.estimate()
    }

    pub fn channels(&self) -> &[ChannelInfo] {
        &self.channels
    }

    pub fn history(&self, channel: usize) -> Option<&ChannelHistory> {
        self.histories.get(channel)
    }

    pub fn snapshot(&self) -> StoreSnapshot {
        let channels = self
            .channels
            .iter()
            .zip(&self.histories)
            .map(|(info, history)| {
                let latest = history.latest();
                ChannelSnapshot {
                    label: info.label.clone(),
                    raw: latest.map(|s| s.value),
                    value: latest.map(|s| self.reading(info.index, s, true).value),
                    offset: self.calibration.offset(info.index),
                }
            })
            .collect();
        StoreSnapshot {
            frames: self.frames,
            last_sequence: self.last_sequence,
            last_timestamp_us: self.last_timestamp_us,
            solenoid_state: self.solenoid_state,
            rate_hz: self.rate_hz(),
            channels,
        }
    }

    fn reading(&self, channel: usize, sample: Sample, calibrated: bool) -> Reading {
        let value = match self.channels[channel].kind {
            ChannelKind::Pressure(class) if calibrated => {
                self.calibration.apply(class, channel, sample.value)
            }
            _ => f64::from(sample.value),
        };
        Reading {
            timestamp_us: sample.timestamp_us,
            value,
        }
    }

    fn kind_checked(&self, channel: usize) -> Result<ChannelKind> {
        self.channels
            .get(channel)
            .map(|c| c.kind)
            .ok_or(StationError::UnknownChannel {
                index: channel,
                count: self.channels.len(),
            })
    }

    fn history_checked(&self, channel: usize) -> Result<&ChannelHistory> {
        self.histories
            .get(channel)
            .ok_or(StationError::UnknownChannel {
                index: channel,
                count: self.histories.len(),
            })
    }
}
