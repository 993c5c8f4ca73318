//! HID raw device source.
//!
//! On Linux the detector shows up as `/dev/hidrawN` once the kernel has bound it.
//! Each `read(2)` on that node returns exactly one report. The node is opened with
//! `O_NONBLOCK`, and an empty read is retried in short sleeps until the caller's
//! timeout expires, so the actor never spins and never blocks past its poll window.

use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::Path;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::error::{AppResult, DaqError};
use crate::hardware::{SampleRecord, SampleSource, RECORD_SIZE};

/// Sleep between empty non-blocking reads.
const EMPTY_READ_BACKOFF: Duration = Duration::from_millis(1);

/// Detector attached through a raw device node.
pub struct RawDeviceSource {
    name: String,
    file: File,
    buffer: [u8; RECORD_SIZE],
}

impl RawDeviceSource {
    /// Open the device node in non-blocking mode.
    ///
    /// # Errors
    ///
    /// `SourceUnavailable` if the node cannot be opened.
    pub fn open(path: impl AsRef<Path>) -> AppResult<Self> {
        let path = path.as_ref();
        let file = open_nonblocking(path).map_err(|e| {
            DaqError::SourceUnavailable(format!("failed to open '{}': {e}", path.display()))
        })?;
        debug!(device = %path.display(), "raw device opened");
        Ok(Self {
            name: path.display().to_string(),
            file,
            buffer: [0; RECORD_SIZE],
        })
    }
}

#[cfg(unix)]
fn open_nonblocking(path: &Path) -> std::io::Result<File> {
    use std::os::unix::fs::OpenOptionsExt;

    std::fs::OpenOptions::new()
        .read(true)
        .custom_flags(libc::O_NONBLOCK)
        .open(path)
}

#[cfg(not(unix))]
fn open_nonblocking(_path: &Path) -> std::io::Result<File> {
    Err(std::io::Error::new(
        ErrorKind::Unsupported,
        "raw device access requires a unix platform",
    ))
}

impl SampleSource for RawDeviceSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn read(&mut self, timeout: Duration) -> AppResult<Option<SampleRecord>> {
        let deadline = Instant::now() + timeout;
        loop {
            match self.file.read(&mut self.buffer) {
                Ok(0) => {
                    return Err(DaqError::SourceUnavailable(format!(
                        "device '{}' closed",
                        self.name
                    )))
                }
                Ok(n) => return Ok(Some(SampleRecord::from_slice(&self.buffer[..n]))),
                Err(e) if e.kind() == ErrorKind::WouldBlock => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Ok(None);
                    }
                    std::thread::sleep(EMPTY_READ_BACKOFF.min(deadline - now));
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    return Err(DaqError::SourceUnavailable(format!(
                        "read from '{}' failed: {e}",
                        self.name
                    )))
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_missing_device_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let result = RawDeviceSource::open(dir.path().join("hidraw99"));
        assert!(matches!(result, Err(DaqError::SourceUnavailable(_))));
    }

    #[cfg(unix)]
    #[test]
    fn test_regular_file_reads_then_reports_closed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("capture.bin");
        let mut report = [0u8; RECORD_SIZE];
        report[1] = 0x29;
        report[2] = 0x50;
        std::fs::write(&path, report).unwrap();

        let mut source = RawDeviceSource::open(&path).unwrap();
        let record = source.read(Duration::from_millis(5)).unwrap().unwrap();
        assert_eq!(record.channel().unwrap().index(), 0x2950 >> 4);

        // A regular file hits EOF, which for a device node means it went away.
        assert!(matches!(
            source.read(Duration::from_millis(5)),
            Err(DaqError::SourceUnavailable(_))
        ));
    }
}
