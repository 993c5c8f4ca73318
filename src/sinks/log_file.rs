//! CSV snapshot log.
use std::fs::File;
use std::io::Write;
use std::path::Path;

use tracing::info;

use crate::data::{zulu_timestamp, SnapshotRecord};
use crate::error::{AppResult, DaqError};
use crate::sinks::LogSink;

/// Writes each snapshot as one headerless CSV line.
pub struct CsvLogSink<W: Write = File> {
    writer: csv::Writer<W>,
}

impl CsvLogSink<File> {
    /// Create (truncate) the log file at `path`.
    pub fn create(path: impl AsRef<Path>) -> AppResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let file = File::create(path)?;
        info!("Snapshot log opened at '{}'.", path.display());
        Ok(Self::from_writer(file))
    }
}

impl<W: Write> CsvLogSink<W> {
    /// Log into any writer.
    pub fn from_writer(inner: W) -> Self {
        let writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(inner);
        Self { writer }
    }

    /// Flush and hand back the underlying writer.
    pub fn into_inner(self) -> AppResult<W> {
        self.writer
            .into_inner()
            .map_err(|e| DaqError::Io(e.into_error()))
    }
}

impl<W: Write + Send> LogSink for CsvLogSink<W> {
    fn append(&mut self, record: &SnapshotRecord) -> AppResult<()> {
        let head = [
            zulu_timestamp(&record.timestamp()),
            record.total().to_string(),
        ];
        let channels = record.histogram().counts().iter().map(u64::to_string);
        self.writer.write_record(head.into_iter().chain(channels))?;
        Ok(())
    }

    fn flush(&mut self) -> AppResult<()> {
        self.writer.flush()?;
        Ok(())
    }
}
