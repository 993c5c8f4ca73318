//! Hardware sample sources.
//!
//! A [`SampleSource`] wraps an already-opened detector interface and hands out one
//! fixed-size record per registered pulse. Reads are bounded: an implementation must
//! return within the timeout it is given, with `Ok(None)` if nothing arrived, so the
//! acquisition actor can observe its stop signal between reads.
//!
//! # Available Sources
//!
//! - [`RawDeviceSource`] - HID raw device node opened non-blocking (unix)
//! - [`MockSource`] - Synthetic detector with a Gaussian photopeak
//! - [`ReplaySource`] - Plays back a raw capture file

pub mod mock;
pub mod raw_device;
pub mod replay;

pub use mock::MockSource;
pub use raw_device::RawDeviceSource;
pub use replay::ReplaySource;

use std::fmt;
use std::time::Duration;

use crate::data::Channel;
use crate::error::{AppResult, DaqError};

/// Size of one HID report delivered by the detector.
pub const RECORD_SIZE: usize = 62;

/// One raw hardware record.
///
/// Byte 0 is a report header; bytes 1 and 2 carry the pulse height, big-endian,
/// with the lowest four bits below the ADC resolution.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct SampleRecord {
    bytes: [u8; RECORD_SIZE],
    len: usize,
}

impl SampleRecord {
    /// Copies up to [`RECORD_SIZE`] bytes out of a device read.
    pub fn from_slice(data: &[u8]) -> Self {
        let len = data.len().min(RECORD_SIZE);
        let mut bytes = [0u8; RECORD_SIZE];
        bytes[..len].copy_from_slice(&data[..len]);
        Self { bytes, len }
    }

    /// Builds a full-length record whose pulse height decodes to `channel`.
    pub fn for_channel(channel: Channel) -> Self {
        let pulse = (channel.index() as u16) << 4;
        let mut bytes = [0u8; RECORD_SIZE];
        bytes[1..3].copy_from_slice(&pulse.to_be_bytes());
        Self {
            bytes,
            len: RECORD_SIZE,
        }
    }

    /// Valid bytes of the record.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len]
    }

    /// Decodes the pulse height into an energy channel.
    pub fn channel(&self) -> AppResult<Channel> {
        if self.len < 3 {
            return Err(DaqError::MalformedSample { len: self.len });
        }
        Ok(Channel::from_pulse_bytes(self.bytes[1], self.bytes[2]))
    }
}

impl fmt::Debug for SampleRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SampleRecord")
            .field("len", &self.len)
            .field("head", &&self.bytes[..self.len.min(3)])
            .finish()
    }
}

/// Bounded-latency access to a detector.
///
/// Implementations are driven from a blocking worker thread, so `read` may block,
/// but never for longer than `timeout`. Any `Err` is treated as terminal.
pub trait SampleSource: Send {
    /// Human readable source name for logs.
    fn name(&self) -> &str;

    /// Waits up to `timeout` for the next record.
    fn read(&mut self, timeout: Duration) -> AppResult<Option<SampleRecord>>;
}

impl<S: SampleSource + ?Sized> SampleSource for Box<S> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn read(&mut self, timeout: Duration) -> AppResult<Option<SampleRecord>> {
        (**self).read(timeout)
    }
}
