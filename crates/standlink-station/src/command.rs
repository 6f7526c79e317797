//! Solenoid command words.
//!
//! A command is a 16-bit word: bit 15 is the validity flag and must always
//! be set; bits 9..=14 carry one bit per valve. Which valve owns which bit is
//! configuration, not a constant of the controller.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};

use crate::error::{Result, StationError};

/// Set on every word the ground station emits.
pub const VALIDITY_BIT: u16 = 0x8000;
/// Bits 9..=14.
pub const VALVE_FIELD: u16 = 0x7E00;
/// Valves addressable by the valve field.
pub const MAX_VALVES: usize = 6;

/// Mapping from valve index to command bit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SolenoidBitOrder {
    /// Valve `i` uses bit `14 - i`.
    #[default]
    MsbFirst,
    /// Valve `i` uses bit `9 + i`.
    LsbFirst,
}

impl SolenoidBitOrder {
    /// Bit mask for `valve`. Callers keep `valve < MAX_VALVES`.
    pub fn mask(self, valve: usize) -> u16 {
        debug_assert!(valve < MAX_VALVES);
        match self {
            Self::MsbFirst => 1 << (14 - valve),
            Self::LsbFirst => 1 << (9 + valve),
        }
    }
}

/// Holds the current valve word and applies toggles to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandEncoder {
    word: u16,
    order: SolenoidBitOrder,
    valves: usize,
}

impl CommandEncoder {
    /// Encoder with all valves closed.
    pub fn new(order: SolenoidBitOrder, valves: usize) -> Result<Self> {
        if valves > MAX_VALVES {
            return Err(StationError::InvalidConfig(format!(
                "{valves} solenoids configured, at most {MAX_VALVES} supported"
            )));
        }
        Ok(Self {
            word: VALIDITY_BIT,
            order,
            valves,
        })
    }

    /// Current word, validity bit included.
    pub fn word(&self) -> u16 {
        self.word
    }

    pub fn order(&self) -> SolenoidBitOrder {
        self.order
    }

    pub fn valves(&self) -> usize {
        self.valves
    }

    /// Flip every valve whose entry is `true`. `toggles` may be shorter
    /// than the valve count but never longer.
    pub fn build(&mut self, toggles: &[bool]) -> Result<u16> {
        if toggles.len() > self.valves {
            return Err(StationError::InvalidValve {
                index: toggles.len() - 1,
                count: self.valves,
            });
        }
        for (valve, _) in toggles.iter().enumerate().filter(|(_, flip)| **flip) {
            self.word ^= self.order.mask(valve);
        }
        self.word |= VALIDITY_BIT;
        Ok(self.word)
    }

    /// Flip one valve.
    pub fn toggle(&mut self, valve: usize) -> Result<u16> {
        self.check(valve)?;
        self.word = (self.word ^ self.order.mask(valve)) | VALIDITY_BIT;
        Ok(self.word)
    }

    /// Force one valve open or closed.
    pub fn set(&mut self, valve: usize, open: bool) -> Result<u16> {
        self.check(valve)?;
        let mask = self.order.mask(valve);
        if open {
            self.word |= mask;
        } else {
            self.word &= !mask;
        }
        self.word |= VALIDITY_BIT;
        Ok(self.word)
    }

    /// Close every valve. Returns the word to send.
    pub fn emergency_stop(&mut self) -> u16 {
        self.word = VALIDITY_BIT;
        self.word
    }

    pub fn is_open(&self, valve: usize) -> bool {
        valve < self.valves && self.word & self.order.mask(valve) != 0
    }

    pub fn open_valves(&self) -> Vec<usize> {
        (0..self.valves).filter(|&v| self.is_open(v)).collect()
    }

    fn check(&self, valve: usize) -> Result<()> {
        if valve >= self.valves {
            return Err(StationError::InvalidValve {
                index: valve,
                count: self.valves,
            });
        }
        Ok(())
    }
}

/// Outbound command words awaiting the decode actor.
#[derive(Debug, Default)]
pub struct CommandQueue {
    inner: Mutex<VecDeque<u16>>,
}

impl CommandQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, word: u16) {
        self.lock().push_back(word);
    }

    /// Drop everything pending and put `word` first.
    pub fn preempt(&self, word: u16) {
        let mut queue = self.lock();
        queue.clear();
        queue.push_front(word);
    }

    pub fn pop(&self) -> Option<u16> {
        self.lock().pop_front()
    }

    pub fn drain(&self) -> Vec<u16> {
        self.lock().drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<u16>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Encoder and queue behind one lock order: every mutation is enqueued
/// while the encoder is held, so queued words match the order of changes.
#[derive(Debug)]
pub struct CommandChannel {
    encoder: Mutex<CommandEncoder>,
    queue: CommandQueue,
}

impl CommandChannel {
    pub fn new(encoder: CommandEncoder) -> Self {
        Self {
            encoder: Mutex::new(encoder),
            queue: CommandQueue::new(),
        }
    }

    pub fn toggle(&self, valve: usize) -> Result<u16> {
        let mut encoder = self.encoder();
        let word = encoder.toggle(valve)?;
        self.queue.push(word);
        Ok(word)
    }

    pub fn set(&self, valve: usize, open: bool) -> Result<u16> {
        let mut encoder = self.encoder();
        let word = encoder.set(valve, open)?;
        self.queue.push(word);
        Ok(word)
    }

    pub fn build(&self, toggles: &[bool]) -> Result<u16> {
        let mut encoder = self.encoder();
        let word = encoder.build(toggles)?;
        self.queue.push(word);
        Ok(word)
    }

    /// Close all valves and jump the queue.
    pub fn emergency_stop(&self) -> u16 {
        let mut encoder = self.encoder();
        let word = encoder.emergency_stop();
        self.queue.preempt(word);
        tracing::warn!("emergency stop requested");
        word
    }

    /// Next word for the wire.
    pub fn next_word(&self) -> Option<u16> {
        self.queue.pop()
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Snapshot of the encoder state.
    pub fn current(&self) -> CommandEncoder {
        *self.encoder()
    }

    fn encoder(&self) -> MutexGuard<'_, CommandEncoder> {
        self.encoder.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
