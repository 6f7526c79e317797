use std::collections::VecDeque;

/// One raw channel sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sample {
    pub timestamp_us: u32,
    pub value: u16,
}

/// Bounded per-channel history. The oldest sample is evicted once full.
#[derive(Debug, Clone)]
pub struct ChannelHistory {
    samples: VecDeque<Sample>,
    capacity: usize,
}

impl ChannelHistory {
    /// `capacity` is clamped to at least one sample.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, sample: Sample) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn latest(&self) -> Option<Sample> {
        self.samples.back().copied()
    }

    /// Samples from oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &Sample> + '_ {
        self.samples.iter()
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(i: u32) -> Sample {
        Sample {
            timestamp_us: i * 100,
            value: i as u16,
        }
    }

    #[test]
    fn keeps_only_last_capacity_samples() {
        let mut history = ChannelHistory::new(150);
        for i in 0..(150 + 7) {
            history.push(sample(i));
        }
        assert_eq!(history.len(), 150);
        let values: Vec<u16> = history.iter().map(|s| s.value).collect();
        let expected: Vec<u16> = (7..157).collect();
        assert_eq!(values, expected);
        assert_eq!(history.latest(), Some(sample(156)));
    }

    #[test]
    fn zero_capacity_is_clamped() {
        let mut history = ChannelHistory::new(0);
        history.push(sample(1));
        history.push(sample(2));
        assert_eq!(history.capacity(), 1);
        assert_eq!(history.latest(), Some(sample(2)));
    }

    #[test]
    fn empty_history() {
        let mut history = ChannelHistory::new(3);
        assert!(history.is_empty());
        assert_eq!(history.latest(), None);
        history.push(sample(1));
        history.clear();
        assert!(history.is_empty());
    }
}
