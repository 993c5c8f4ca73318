//! Replay of raw capture files.
//!
//! A capture file is a plain concatenation of [`RECORD_SIZE`]-byte reports, as dumped
//! from a raw device node. Records are paced at a fixed rate (or handed out as fast as
//! they are read). Reaching the end of the file is reported as `SourceUnavailable`,
//! which stops the run the same way an unplugged detector would.

use std::fs::File;
use std::io::{BufReader, ErrorKind, Read};
use std::path::Path;
use std::time::Duration;

use crate::error::{AppResult, DaqError};
use crate::hardware::mock::Pacer;
use crate::hardware::{SampleRecord, SampleSource, RECORD_SIZE};

/// Source reading records back from a capture file.
pub struct ReplaySource<R = BufReader<File>> {
    reader: R,
    name: String,
    pacer: Option<Pacer>,
    replayed: u64,
}

impl ReplaySource {
    /// Open a capture file.
    pub fn open(path: impl AsRef<Path>) -> AppResult<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| {
            DaqError::SourceUnavailable(format!(
                "failed to open capture '{}': {e}",
                path.display()
            ))
        })?;
        Ok(Self::from_reader(
            BufReader::new(file),
            path.display().to_string(),
        ))
    }
}

impl<R: Read + Send> ReplaySource<R> {
    /// Replay records from any reader.
    pub fn from_reader(reader: R, name: impl Into<String>) -> Self {
        Self {
            reader,
            name: name.into(),
            pacer: None,
            replayed: 0,
        }
    }

    /// Hand out records at `rate_cps` per second instead of as fast as possible.
    pub fn with_rate(mut self, rate_cps: f64) -> Self {
        self.pacer = Some(Pacer::new(rate_cps));
        self
    }

    /// Records replayed so far.
    pub fn replayed(&self) -> u64 {
        self.replayed
    }
}

impl<R: Read + Send> SampleSource for ReplaySource<R> {
    fn name(&self) -> &str {
        &self.name
    }

    fn read(&mut self, timeout: Duration) -> AppResult<Option<SampleRecord>> {
        if let Some(pacer) = self.pacer.as_mut() {
            if !pacer.wait(timeout) {
                return Ok(None);
            }
        }

        let mut buffer = [0u8; RECORD_SIZE];
        match self.reader.read_exact(&mut buffer) {
            Ok(()) => {
                self.replayed += 1;
                Ok(Some(SampleRecord::from_slice(&buffer)))
            }
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => {
                Err(DaqError::SourceUnavailable(format!(
                    "capture '{}' exhausted after {} records",
                    self.name, self.replayed
                )))
            }
            Err(e) => Err(DaqError::SourceUnavailable(format!(
                "capture '{}' unreadable: {e}",
                self.name
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn capture(channels: &[u16]) -> Vec<u8> {
        channels
            .iter()
            .flat_map(|&c| {
                let mut report = [0u8; RECORD_SIZE];
                report[1..3].copy_from_slice(&(c << 4).to_be_bytes());
                report
            })
            .collect()
    }

    #[test]
    fn test_replay_yields_records_in_order() {
        let data = capture(&[5, 600, 4095]);
        let mut source = ReplaySource::from_reader(Cursor::new(data), "memory");
        let timeout = Duration::from_millis(1);

        let decoded: Vec<usize> = (0..3)
            .map(|_| source.read(timeout).unwrap().unwrap().channel().unwrap().index())
            .collect();
        assert_eq!(decoded, vec![5, 600, 4095]);
        assert_eq!(source.replayed(), 3);

        let err = source.read(timeout).unwrap_err();
        assert!(err.to_string().contains("exhausted after 3 records"));
    }

    #[test]
    fn test_trailing_partial_record_ends_replay() {
        let mut data = capture(&[1]);
        data.extend_from_slice(&[0, 1]);
        let mut source = ReplaySource::from_reader(Cursor::new(data), "memory");
        let timeout = Duration::from_millis(1);

        assert!(source.read(timeout).unwrap().is_some());
        assert!(matches!(
            source.read(timeout),
            Err(DaqError::SourceUnavailable(_))
        ));
    }

    #[test]
    fn test_missing_capture_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(ReplaySource::open(dir.path().join("none.bin")).is_err());
    }
}
