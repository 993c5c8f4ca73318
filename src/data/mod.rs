//! Spectrum data structures and the state shared between the acquisition actors.

pub mod histogram;
pub mod snapshot;
pub mod state;

pub use histogram::{Channel, Histogram, CHANNEL_COUNT};
pub use snapshot::{zulu_timestamp, SnapshotRecord};
pub use state::{AcquisitionState, PeriodCounts};
