//! Pulse-height spectrum acquisition for RadAngel-class gamma detectors.
//!
//! The detector reports one fixed-size record per registered pulse; the first three
//! bytes carry a 12-bit channel index. This crate turns that stream into a
//! 4096-channel spectrum:
//!
//! - [`hardware`]: sample sources (raw device node, synthetic detector, capture replay)
//! - [`acquisition`]: the acquisition actor, the aggregation loop and dead-time correction
//! - [`sinks`]: the per-window snapshot log and the optional remote sink
//! - [`export`]: SPE spectrum files
//! - [`config`], [`error`], [`logging`]: ambient plumbing
//!
//! ```rust,ignore
//! let settings = Settings::load()?;
//! let source = MockSource::new(500.0);
//! let summary = run_with_settings(&settings, source, CancellationToken::new()).await?;
//! summary.export_spe(&settings.storage.spe_file, &settings.acquisition.device_id)?;
//! ```

pub mod acquisition;
pub mod config;
pub mod data;
pub mod error;
pub mod export;
pub mod hardware;
pub mod logging;
pub mod sinks;

pub use acquisition::{run_acquisition, run_with_settings, RunSummary, StopReason};
pub use config::Settings;
pub use error::{AppResult, DaqError};
