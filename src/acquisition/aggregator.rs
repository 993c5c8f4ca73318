//! Aggregation loop state: the three schedules, the clocks and the union spectrum.
//!
//! [`Aggregator::tick`] is called once per loop iteration with a single clock
//! reading. Each schedule fires independently when its window has elapsed:
//!
//! | window    | action                                                    |
//! |-----------|-----------------------------------------------------------|
//! | countrate | swap the rate counter, divide by the measured elapsed time |
//! | pass      | integrate realtime and dead-time corrected livetime        |
//! | logging   | swap the period histogram out, fold it into the union      |
//!
//! After the schedules, the capture limit is checked against realtime.

use chrono::{DateTime, TimeDelta, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use crate::acquisition::timing::{TimingState, MIN_RATE_WINDOW};
use crate::config::AcquisitionConfig;
use crate::data::{AcquisitionState, Histogram, SnapshotRecord};

/// A periodic window restarted from the moment it fires.
#[derive(Clone, Copy, Debug)]
struct Window {
    interval: Duration,
    started: Instant,
}

impl Window {
    fn new(interval: Duration, now: Instant) -> Self {
        Self {
            interval,
            started: now,
        }
    }

    /// Elapsed time if the window is due.
    fn due(&self, now: Instant) -> Option<Duration> {
        let elapsed = now.saturating_duration_since(self.started);
        (elapsed >= self.interval).then_some(elapsed)
    }

    fn restart(&mut self, now: Instant) {
        self.started = now;
    }
}

/// What happened during one tick.
#[derive(Debug, Default)]
pub struct TickReport {
    /// Snapshot taken at a logging boundary, already folded into the union
    pub snapshot: Option<SnapshotRecord>,
    /// Realtime has passed the capture limit
    pub capture_complete: bool,
}

/// Final accumulation handed back by [`Aggregator::finish`].
#[derive(Debug)]
pub struct Totals {
    /// Sum of every snapshot plus the trailing partial period
    pub union: Histogram,
    /// Final clocks
    pub timing: TimingState,
    /// Sample count of each complete logging window, in order
    pub window_totals: Vec<u64>,
}

/// Owns everything the aggregation loop mutates.
pub struct Aggregator {
    state: Arc<AcquisitionState>,
    timing: TimingState,
    union: Histogram,
    window_totals: Vec<u64>,
    rate_window: Window,
    pass_window: Window,
    log_window: Window,
    dead_time_per_count: f64,
    capture_limit: Option<f64>,
    last_snapshot_at: Option<DateTime<Utc>>,
}

impl Aggregator {
    /// Start all three windows at `now`.
    pub fn new(state: Arc<AcquisitionState>, config: &AcquisitionConfig, now: Instant) -> Self {
        Self {
            state,
            timing: TimingState::new(),
            union: Histogram::new(),
            window_totals: Vec::new(),
            rate_window: Window::new(config.countrate_interval, now),
            pass_window: Window::new(config.pass_interval, now),
            log_window: Window::new(config.logging_interval, now),
            dead_time_per_count: config.dead_time_per_count,
            capture_limit: config.capture_limit(),
            last_snapshot_at: None,
        }
    }

    /// Current clocks.
    pub fn timing(&self) -> &TimingState {
        &self.timing
    }

    /// Union of all snapshots taken so far.
    pub fn union(&self) -> &Histogram {
        &self.union
    }

    /// Totals of the completed logging windows.
    pub fn window_totals(&self) -> &[u64] {
        &self.window_totals
    }

    /// Evaluate every schedule against one clock reading.
    pub fn tick(&mut self, now: Instant) -> TickReport {
        let mut report = TickReport::default();

        if let Some(elapsed) = self.rate_window.due(now) {
            // A window too short to measure keeps its counts for the next attempt.
            if elapsed >= MIN_RATE_WINDOW {
                let counts = self.state.take_rate_count();
                self.timing.update_countrate(counts, elapsed);
                self.rate_window.restart(now);
            }
        }

        if let Some(elapsed) = self.pass_window.due(now) {
            self.timing.advance(elapsed, self.dead_time_per_count);
            self.pass_window.restart(now);
        }

        if self.log_window.due(now).is_some() {
            self.log_window.restart(now);
            report.snapshot = Some(self.snapshot());
        }

        report.capture_complete = self
            .capture_limit
            .is_some_and(|limit| self.timing.realtime() > limit);

        report
    }

    /// Swap the period out, fold it into the union and wrap it as a record.
    fn snapshot(&mut self) -> SnapshotRecord {
        let period = self.state.take_period();
        self.union.accumulate(&period.histogram);
        self.window_totals.push(period.total);
        SnapshotRecord::new(self.next_timestamp(Utc::now()), period.total, period.histogram)
    }

    // Snapshot timestamps must be strictly increasing even if the wall clock steps back.
    fn next_timestamp(&mut self, wall_clock: DateTime<Utc>) -> DateTime<Utc> {
        let mut ts = wall_clock;
        if let Some(last) = self.last_snapshot_at {
            if ts <= last {
                ts = last + TimeDelta::microseconds(1);
            }
        }
        self.last_snapshot_at = Some(ts);
        ts
    }

    /// Fold whatever the current period holds into the union and return the totals.
    ///
    /// Call this only once the acquisition actor has stopped; the period is read with
    /// the same swap as a snapshot, so samples already folded by an earlier snapshot
    /// are not counted again.
    pub fn finish(mut self) -> Totals {
        let remainder = self.state.take_period();
        self.union.accumulate(&remainder.histogram);
        Totals {
            union: self.union,
            timing: self.timing,
            window_totals: self.window_totals,
        }
    }
}
