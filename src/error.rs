//! Custom error types for the application.
//!
//! This module defines the primary error type, `DaqError`, shared by every part of
//! the acquisition pipeline. Using the `thiserror` crate, it keeps the failure kinds
//! of the pipeline distinct so callers can decide what is fatal and what is not.
//!
//! ## Error Hierarchy
//!
//! - **`SourceUnavailable`**: The hardware source can no longer be read. Terminal for
//!   the acquisition actor and never retried. The run still returns whatever was
//!   accumulated before the failure.
//! - **`MalformedSample`**: A record too short to decode into a channel. Hardware noise
//!   is expected, so these are dropped and counted rather than propagated.
//! - **`SinkWrite`**: A log or remote sink failed to accept a snapshot. Reported, but
//!   acquisition carries on.
//! - **`Config`** / **`Configuration`**: Parse failures from `figment` and semantic
//!   validation failures respectively.
//! - **`Io`**, **`Csv`**, **`Serialization`**: Wrapped errors from the underlying crates.
//!
//! By using `#[from]`, `DaqError` can be created from the wrapped error types with the
//! `?` operator.

use thiserror::Error;

/// Convenience alias for results using the application error type.
pub type AppResult<T> = std::result::Result<T, DaqError>;

/// Application error type.
#[derive(Error, Debug)]
pub enum DaqError {
    /// Configuration could not be loaded or parsed.
    #[error("Configuration error: {0}")]
    Config(#[from] Box<figment::Error>),

    /// Configuration parsed but holds invalid values.
    #[error("Configuration validation error: {0}")]
    Configuration(String),

    /// Underlying file or device I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV encoding failure in the snapshot log.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON encoding failure for remote records.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The sample source failed terminally.
    #[error("Sample source unavailable: {0}")]
    SourceUnavailable(String),

    /// A record could not be decoded to a channel index.
    #[error("Malformed sample: record holds {len} bytes, at least 3 are required")]
    MalformedSample {
        /// Number of valid bytes in the record.
        len: usize,
    },

    /// A snapshot sink rejected a write.
    #[error("Sink '{sink}' write failed: {reason}")]
    SinkWrite {
        /// Name of the failing sink.
        sink: String,
        /// Failure description.
        reason: String,
    },
}

impl From<figment::Error> for DaqError {
    fn from(err: figment::Error) -> Self {
        DaqError::Config(Box::new(err))
    }
}

impl DaqError {
    /// Builds a [`DaqError::SinkWrite`] from any displayable cause.
    pub fn sink_write(sink: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        DaqError::SinkWrite {
            sink: sink.into(),
            reason: reason.to_string(),
        }
    }
}
