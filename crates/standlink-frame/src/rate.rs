//! Sample-rate estimation from controller timestamps.

/// Deltas above this (µs) are stalls or resets, not sampling intervals.
pub const MAX_USABLE_DELTA_US: u32 = 5_000_000;

/// Usable deltas required before a rate is reported.
pub const MIN_USABLE_DELTAS: u64 = 2;

/// Incremental rate estimator over a microsecond counter that wraps at 2^32.
///
/// Deltas are taken modulo 2^32, so a single wrap between two frames still
/// yields the true interval. Zero deltas and deltas above
/// [`MAX_USABLE_DELTA_US`] are ignored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RateEstimator {
    last: Option<u32>,
    total_us: u64,
    usable: u64,
}

impl RateEstimator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an estimator from an ordered sequence of timestamps.
    pub fn from_timestamps(timestamps: impl IntoIterator<Item = u32>) -> Self {
        let mut estimator = Self::new();
        for ts in timestamps {
            estimator.push(ts);
        }
        estimator
    }

    pub fn push(&mut self, timestamp_us: u32) {
        if let Some(last) = self.last {
            let delta = timestamp_us.wrapping_sub(last);
            if delta > 0 && delta <= MAX_USABLE_DELTA_US {
                self.total_us += u64::from(delta);
                self.usable += 1;
            }
        }
        self.last = Some(timestamp_us);
    }

    /// Number of deltas that passed the filter.
    pub fn usable_deltas(&self) -> u64 {
        self.usable
    }

    /// Mean rate in Hz, or `None` with fewer than two usable deltas.
    pub fn estimate(&self) -> Option<f64> {
        if self.usable < MIN_USABLE_DELTAS {
            return None;
        }
        let mean_delta = self.total_us as f64 / self.usable as f64;
        Some(1_000_000.0 / mean_delta)
    }

    /// Forget everything (new session or reconnect).
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Estimate the sample rate of an ordered timestamp sequence.
pub fn estimate_rate(timestamps: impl IntoIterator<Item = u32>) -> Option<f64> {
    RateEstimator::from_timestamps(timestamps).estimate()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn steady_100_hz() {
        assert_eq!(estimate_rate([0, 10_000, 20_000, 30_000]), Some(100.0));
    }

    #[test]
    fn unknown_with_fewer_than_two_deltas() {
        assert_eq!(estimate_rate(std::iter::empty::<u32>()), None);
        assert_eq!(estimate_rate([42]), None);
        assert_eq!(estimate_rate([0, 10_000]), None);
    }

    #[test]
    fn single_wraparound_is_tolerated() {
        let start = u32::MAX - 4_999;
        let ts = [start, start.wrapping_add(5_000), start.wrapping_add(10_000)];
        assert_eq!(estimate_rate(ts), Some(200.0));
    }

    #[test]
    fn stalls_and_repeats_are_ignored() {
        // 0 delta, a 6 s stall, and a backwards jump are all discarded.
        let ts = [0, 0, 1_000, 2_000, 6_002_000, 6_003_000, 5_000_000];
        let est = RateEstimator::from_timestamps(ts);
        assert_eq!(est.usable_deltas(), 3);
        assert_eq!(est.estimate(), Some(1_000.0));
    }

    #[test]
    fn five_second_delta_is_usable() {
        assert_eq!(estimate_rate([0, 5_000_000, 10_000_000]), Some(0.2));
    }

    #[test]
    fn reset_forgets_history() {
        let mut est = RateEstimator::from_timestamps([0, 10, 20]);
        assert!(est.estimate().is_some());
        est.reset();
        est.push(1_000_000);
        assert_eq!(est.estimate(), None);
    }
}
