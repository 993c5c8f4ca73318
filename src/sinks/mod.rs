//! Destinations for logging-window snapshots.
//!
//! - [`LogSink`]: local, append-only, always written. [`CsvLogSink`] writes one line
//!   per snapshot: `timestamp,count,ch0,...,ch4095`.
//! - [`RemoteSink`]: optional, best effort. The acquisition loop bounds every insert
//!   with a timeout and only logs failures, so a broken remote never stalls the run.
//!   [`JsonLinesSink`] spools [`RemoteRecord`]s as JSON lines for a forwarder to ship.

pub mod log_file;
pub mod remote;

pub use log_file::CsvLogSink;
pub use remote::{JsonLinesSink, RemoteRecord};

use async_trait::async_trait;

use crate::data::SnapshotRecord;
use crate::error::AppResult;

/// Local snapshot log.
pub trait LogSink: Send {
    /// Append one snapshot.
    fn append(&mut self, record: &SnapshotRecord) -> AppResult<()>;

    /// Push buffered lines to the underlying storage.
    fn flush(&mut self) -> AppResult<()>;
}

impl<S: LogSink + ?Sized> LogSink for Box<S> {
    fn append(&mut self, record: &SnapshotRecord) -> AppResult<()> {
        (**self).append(record)
    }

    fn flush(&mut self) -> AppResult<()> {
        (**self).flush()
    }
}

/// Write-only remote store for snapshots.
#[async_trait]
pub trait RemoteSink: Send {
    /// Sink name for logs.
    fn name(&self) -> &str;

    /// Store one record.
    async fn insert(&mut self, record: &RemoteRecord) -> AppResult<()>;
}
