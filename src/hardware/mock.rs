//! Mock Detector
//!
//! Simulated pulse source for running the pipeline without physical hardware.
//!
//! # Behaviour
//!
//! - Pulses arrive at a fixed rate (counts per second), evenly spaced
//! - Each pulse lands in a Gaussian photopeak, or uniformly across the spectrum
//!   with the configured background fraction
//! - Optional record limit (idles afterwards) and failure injection for tests
//!
//! The default photopeak sits at channel 661 with a sigma of 20 channels, which
//! roughly resembles Cs-137 on an uncalibrated RadAngel.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::data::{Channel, CHANNEL_COUNT};
use crate::error::{AppResult, DaqError};
use crate::hardware::{SampleRecord, SampleSource};

/// Spaces events evenly at a fixed rate and waits for them within a read timeout.
#[derive(Debug)]
pub(crate) struct Pacer {
    period: Duration,
    next_due: Instant,
}

impl Pacer {
    /// A pacer emitting `rate_cps` events per second. Non-positive rates never fire.
    pub(crate) fn new(rate_cps: f64) -> Self {
        let period = if rate_cps > 0.0 && rate_cps.is_finite() {
            Duration::try_from_secs_f64(1.0 / rate_cps).unwrap_or(Duration::MAX)
        } else {
            Duration::MAX
        };
        Self {
            period,
            next_due: Instant::now(),
        }
    }

    /// Blocks up to `timeout` for the next event. Returns whether it is due.
    pub(crate) fn wait(&mut self, timeout: Duration) -> bool {
        if self.period == Duration::MAX {
            std::thread::sleep(timeout);
            return false;
        }
        let now = Instant::now();
        if self.next_due > now {
            let wait = (self.next_due - now).min(timeout);
            std::thread::sleep(wait);
            if Instant::now() < self.next_due {
                return false;
            }
        }
        match self.next_due.checked_add(self.period) {
            Some(next) => self.next_due = next,
            // Next event is beyond the clock's range.
            None => self.period = Duration::MAX,
        }
        true
    }
}

/// Synthetic detector.
///
/// # Example
///
/// ```rust,ignore
/// let source = MockSource::new(500.0).with_peak(661, 20.0).with_seed(7);
/// ```
pub struct MockSource {
    pacer: Pacer,
    peak_channel: f64,
    peak_sigma: f64,
    background_fraction: f64,
    limit: Option<u64>,
    rng: StdRng,
    emitted: Arc<AtomicU64>,
    fail_next: Arc<AtomicBool>,
}

impl MockSource {
    /// Create a mock detector registering `rate_cps` pulses per second.
    pub fn new(rate_cps: f64) -> Self {
        Self {
            pacer: Pacer::new(rate_cps),
            peak_channel: 661.0,
            peak_sigma: 20.0,
            background_fraction: 0.3,
            limit: None,
            rng: StdRng::from_entropy(),
            emitted: Arc::new(AtomicU64::new(0)),
            fail_next: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Move the photopeak.
    pub fn with_peak(mut self, channel: u16, sigma: f64) -> Self {
        self.peak_channel = f64::from(channel);
        self.peak_sigma = sigma.max(0.0);
        self
    }

    /// Fraction of pulses spread uniformly over all channels (clamped to 0..=1).
    pub fn with_background(mut self, fraction: f64) -> Self {
        self.background_fraction = fraction.clamp(0.0, 1.0);
        self
    }

    /// Stop emitting after `records` pulses; later reads idle until the timeout.
    pub fn with_limit(mut self, records: u64) -> Self {
        self.limit = Some(records);
        self
    }

    /// Use a deterministic random sequence.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    /// Shared counter of records handed out so far.
    pub fn emitted_counter(&self) -> Arc<AtomicU64> {
        Arc::clone(&self.emitted)
    }

    /// Handle that makes the next read fail with `SourceUnavailable`.
    pub fn failure_switch(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.fail_next)
    }

    fn sample_channel(&mut self) -> Channel {
        let value = if self.rng.gen_bool(self.background_fraction) {
            self.rng.gen_range(0.0..CHANNEL_COUNT as f64)
        } else {
            // Box-Muller
            let u1: f64 = self.rng.gen_range(f64::EPSILON..1.0);
            let u2: f64 = self.rng.gen();
            let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
            self.peak_channel + z * self.peak_sigma
        };
        let index = value.clamp(0.0, (CHANNEL_COUNT - 1) as f64) as u16;
        Channel::new(index).unwrap_or_else(|| Channel::from_pulse_bytes(0xFF, 0xFF))
    }
}

impl SampleSource for MockSource {
    fn name(&self) -> &str {
        "mock"
    }

    fn read(&mut self, timeout: Duration) -> AppResult<Option<SampleRecord>> {
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(DaqError::SourceUnavailable(
                "mock detector disconnected".to_string(),
            ));
        }

        if let Some(limit) = self.limit {
            if self.emitted.load(Ordering::Acquire) >= limit {
                std::thread::sleep(timeout);
                return Ok(None);
            }
        }

        if !self.pacer.wait(timeout) {
            return Ok(None);
        }

        let channel = self.sample_channel();
        self.emitted.fetch_add(1, Ordering::AcqRel);
        Ok(Some(SampleRecord::for_channel(channel)))
    }
}
