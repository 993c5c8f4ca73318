//! Logging-window snapshots.

use chrono::{DateTime, SecondsFormat, Utc};

use crate::data::Histogram;

/// Timestamp layout used by the log file and the SPE header.
pub const ZULU_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Formats `ts` as `YYYY-MM-DDTHH:MM:SSZ`.
pub fn zulu_timestamp(ts: &DateTime<Utc>) -> String {
    ts.format(ZULU_FORMAT).to_string()
}

/// Histogram and count taken at a logging boundary. Immutable once built.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SnapshotRecord {
    timestamp: DateTime<Utc>,
    total: u64,
    histogram: Histogram,
}

impl SnapshotRecord {
    /// Bundle a swapped-out period.
    pub fn new(timestamp: DateTime<Utc>, total: u64, histogram: Histogram) -> Self {
        Self {
            timestamp,
            total,
            histogram,
        }
    }

    /// When the snapshot was taken.
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Samples recorded during the window.
    pub fn total(&self) -> u64 {
        self.total
    }

    /// Per-channel counts of the window.
    pub fn histogram(&self) -> &Histogram {
        &self.histogram
    }

    /// RFC 3339 timestamp with millisecond precision, for structured logs.
    pub fn timestamp_rfc3339(&self) -> String {
        self.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
    }
}
