//! State shared between the acquisition actor and the aggregation loop.
//!
//! # Access discipline
//!
//! - The acquisition actor only ever calls [`AcquisitionState::record`] and
//!   [`AcquisitionState::record_dropped`].
//! - The aggregation loop only ever calls [`AcquisitionState::take_period`] and
//!   [`AcquisitionState::take_rate_count`].
//!
//! The histogram and the period total live behind one mutex and are swapped out
//! together, so a count can never land between the read and the reset of a snapshot.
//! The rate counter is reset on its own schedule and is a plain atomic swap.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::data::histogram::{Channel, Histogram};

/// Counts gathered since the last logging-window snapshot.
#[derive(Debug, Default)]
pub struct PeriodCounts {
    /// Per-channel counts
    pub histogram: Histogram,
    /// Number of samples recorded; always equals `histogram.total()`
    pub total: u64,
}

/// Shared acquisition counters.
#[derive(Debug, Default)]
pub struct AcquisitionState {
    period: Mutex<PeriodCounts>,
    rate_counter: AtomicU64,
    dropped: AtomicU64,
}

impl AcquisitionState {
    /// Creates zeroed state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one decoded sample.
    pub fn record(&self, channel: Channel) {
        {
            let mut period = self.period.lock();
            period.histogram.increment(channel);
            period.total += 1;
        }
        self.rate_counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a sample that could not be decoded.
    pub fn record_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    /// Swaps the current period for a zeroed one and returns the old counts.
    pub fn take_period(&self) -> PeriodCounts {
        // Allocated before locking; the critical section is a swap.
        let fresh = PeriodCounts::default();
        std::mem::replace(&mut *self.period.lock(), fresh)
    }

    /// Returns the number of samples since the previous call and resets the counter.
    pub fn take_rate_count(&self) -> u64 {
        self.rate_counter.swap(0, Ordering::AcqRel)
    }

    /// Samples recorded in the current period, without resetting.
    pub fn period_total(&self) -> u64 {
        self.period.lock().total
    }

    /// Malformed samples dropped since the state was created.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}
