//! Fixed-size pulse-height histogram.
//!
//! The detector reports a 12-bit pulse height, so every spectrum in the system has
//! exactly [`CHANNEL_COUNT`] bins. Counts are kept in a boxed array and indexed by
//! [`Channel`], which is always in range.

use std::fmt;

/// Number of energy channels produced by the detector.
pub const CHANNEL_COUNT: usize = 4096;

/// A validated channel index in `0..CHANNEL_COUNT`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Channel(u16);

impl Channel {
    /// Returns the channel for `index`, or `None` if it is out of range.
    pub fn new(index: u16) -> Option<Self> {
        ((index as usize) < CHANNEL_COUNT).then_some(Self(index))
    }

    /// Decodes the two pulse-height bytes of a hardware record.
    ///
    /// `channel = floor((high * 256 + low) / 16)`. A 16-bit value shifted right by
    /// four always lands in `0..4096`, so decoding cannot fail.
    pub fn from_pulse_bytes(high: u8, low: u8) -> Self {
        Self(u16::from_be_bytes([high, low]) >> 4)
    }

    /// Channel index as `usize`.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Counts per energy channel.
#[derive(Clone, PartialEq, Eq)]
pub struct Histogram {
    counts: Box<[u64; CHANNEL_COUNT]>,
}

impl Histogram {
    /// Creates an all-zero histogram.
    pub fn new() -> Self {
        Self {
            counts: Box::new([0; CHANNEL_COUNT]),
        }
    }

    /// Adds one count to `channel`.
    pub fn increment(&mut self, channel: Channel) {
        self.counts[channel.index()] += 1;
    }

    /// Overwrites the count of a channel.
    pub fn set(&mut self, channel: Channel, count: u64) {
        self.counts[channel.index()] = count;
    }

    /// Count stored in `channel`.
    pub fn get(&self, channel: Channel) -> u64 {
        self.counts[channel.index()]
    }

    /// All counts in channel order.
    pub fn counts(&self) -> &[u64; CHANNEL_COUNT] {
        &self.counts
    }

    /// Sum over every channel.
    pub fn total(&self) -> u64 {
        self.counts.iter().sum()
    }

    /// True when every channel is zero.
    pub fn is_empty(&self) -> bool {
        self.counts.iter().all(|&c| c == 0)
    }

    /// Adds `other` element-wise into `self`.
    pub fn accumulate(&mut self, other: &Histogram) {
        for (acc, &count) in self.counts.iter_mut().zip(other.counts.iter()) {
            *acc += count;
        }
    }
}

impl Default for Histogram {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Histogram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let occupied = self.counts.iter().filter(|&&c| c > 0).count();
        f.debug_struct("Histogram")
            .field("total", &self.total())
            .field("occupied_channels", &occupied)
            .finish()
    }
}
