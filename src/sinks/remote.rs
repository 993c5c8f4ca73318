//! Remote snapshot records and the JSON-lines spool sink.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;

use crate::data::SnapshotRecord;
use crate::error::{AppResult, DaqError};
use crate::sinks::RemoteSink;

/// Record shape expected by the remote spectrum store.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteRecord {
    /// Snapshot time
    pub date: DateTime<Utc>,
    /// Counts for all 4096 channels
    pub channels: Vec<u64>,
    /// Counts in the logging window
    pub cpm: u64,
}

impl From<&SnapshotRecord> for RemoteRecord {
    fn from(snapshot: &SnapshotRecord) -> Self {
        Self {
            date: snapshot.timestamp(),
            channels: snapshot.histogram().counts().to_vec(),
            cpm: snapshot.total(),
        }
    }
}

/// Appends each record as one JSON line.
pub struct JsonLinesSink {
    path: PathBuf,
    file: File,
}

impl JsonLinesSink {
    /// Open `path` for appending, creating it if needed.
    pub async fn open(path: impl AsRef<Path>) -> AppResult<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|e| DaqError::sink_write(path.display().to_string(), e))?;
        Ok(Self { path, file })
    }

    /// Spool file location.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl RemoteSink for JsonLinesSink {
    fn name(&self) -> &str {
        "jsonl"
    }

    async fn insert(&mut self, record: &RemoteRecord) -> AppResult<()> {
        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');
        self.file
            .write_all(&line)
            .await
            .map_err(|e| DaqError::sink_write(self.name(), e))?;
        self.file
            .flush()
            .await
            .map_err(|e| DaqError::sink_write(self.name(), e))?;
        Ok(())
    }
}
