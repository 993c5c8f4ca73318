//! Realtime, livetime and countrate bookkeeping.
//!
//! Every registered pulse blinds the detector for a short, fixed dead time `K`. Over a
//! pass window of length `dt` measured at countrate `r`, the detector was therefore
//! live for `dt * (1 - r * K)`. The most recent countrate is applied to the whole
//! window.
//!
//! The live fraction is clamped to `[0, 1]`: above `1 / K` counts per second the
//! detector is saturated and livetime stops advancing instead of running backwards.

use std::time::Duration;

/// Shortest rate window that yields a usable countrate.
pub const MIN_RATE_WINDOW: Duration = Duration::from_millis(1);

/// Fraction of a window during which the detector was able to register pulses.
pub fn live_fraction(countrate: f64, dead_time_per_count: f64) -> f64 {
    let fraction = 1.0 - countrate * dead_time_per_count;
    if fraction.is_nan() {
        return 0.0;
    }
    fraction.clamp(0.0, 1.0)
}

/// Acquisition clocks. Owned by the aggregation loop only.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct TimingState {
    realtime: f64,
    livetime: f64,
    countrate: f64,
}

impl TimingState {
    /// Zeroed clocks.
    pub fn new() -> Self {
        Self::default()
    }

    /// Elapsed wall time in seconds.
    pub fn realtime(&self) -> f64 {
        self.realtime
    }

    /// Dead-time corrected time in seconds; never exceeds [`Self::realtime`].
    pub fn livetime(&self) -> f64 {
        self.livetime
    }

    /// Most recent counts per second.
    pub fn countrate(&self) -> f64 {
        self.countrate
    }

    /// Sets the countrate from `counts` seen over `elapsed`.
    ///
    /// Windows shorter than [`MIN_RATE_WINDOW`] are rejected and leave the previous
    /// countrate in place; returns whether the update was applied.
    pub fn update_countrate(&mut self, counts: u64, elapsed: Duration) -> bool {
        if elapsed < MIN_RATE_WINDOW {
            return false;
        }
        self.countrate = counts as f64 / elapsed.as_secs_f64();
        true
    }

    /// Integrates one pass window into realtime and livetime.
    pub fn advance(&mut self, elapsed: Duration, dead_time_per_count: f64) {
        let dt = elapsed.as_secs_f64();
        self.realtime += dt;
        self.livetime += dt * live_fraction(self.countrate, dead_time_per_count);
    }
}
