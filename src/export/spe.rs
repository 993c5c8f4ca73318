//! SPE spectrum export.
//!
//! The ASCII SPE layout understood by common gamma-spectroscopy tools:
//!
//! ```text
//! $SPEC_REM:            free remarks (timestamp, device, times)
//! $MEAS_TIM:            "<realtime> <livetime>" as whole seconds
//! $DATA:                "0 4095" followed by one count per line
//! $ENER_FIT / $ENER_DATA / $KROMEK_INFO
//! ```
//!
//! The trailing blocks describe the RadAngel hardware (factory energy fit, two
//! calibration points, discriminator setting, detector identifiers) and are written
//! verbatim from [`SpeMetadata`].

use chrono::{DateTime, Utc};
use std::fmt;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::data::{zulu_timestamp, Histogram, CHANNEL_COUNT};
use crate::error::AppResult;

/// Fixed hardware description appended after the data block.
#[derive(Clone, Debug, PartialEq)]
pub struct SpeMetadata {
    /// Linear energy fit `(offset, slope)`
    pub energy_fit: (f64, f64),
    /// Calibration points as `(channel, energy keV)` text pairs
    pub energy_points: [(&'static str, &'static str); 2],
    /// Lower level discriminator
    pub lld: u32,
    /// Product family identifier
    pub product_family: &'static str,
    /// Detector type
    pub detector_type: &'static str,
    /// Detector type identifier
    pub detector_type_id: u32,
}

impl SpeMetadata {
    /// Factory values of the Kromek RadAngel (RA4S).
    pub const RADANGEL: SpeMetadata = SpeMetadata {
        energy_fit: (-357.199955175409, 0.969844070381318),
        energy_points: [("494.1", "122"), ("1050.47809878844", "661.6")],
        lld: 402,
        product_family: "RADANGEL",
        detector_type: "RA4S",
        detector_type_id: 256,
    };
}

impl Default for SpeMetadata {
    fn default() -> Self {
        Self::RADANGEL
    }
}

/// Render a spectrum as an SPE document, stamped with the current time.
pub fn export(histogram: &Histogram, realtime: f64, livetime: f64, device_id: &str) -> String {
    export_at(histogram, realtime, livetime, device_id, Utc::now())
}

/// Render a spectrum as an SPE document with an explicit timestamp.
pub fn export_at(
    histogram: &Histogram,
    realtime: f64,
    livetime: f64,
    device_id: &str,
    timestamp: DateTime<Utc>,
) -> String {
    SpeDocument {
        histogram,
        realtime,
        livetime,
        device_id,
        timestamp,
        meta: &SpeMetadata::RADANGEL,
    }
    .to_string()
}

/// Write an SPE document in one pass.
pub fn write_spe<W: Write>(
    w: &mut W,
    histogram: &Histogram,
    realtime: f64,
    livetime: f64,
    device_id: &str,
    timestamp: DateTime<Utc>,
    meta: &SpeMetadata,
) -> std::io::Result<()> {
    let doc = SpeDocument {
        histogram,
        realtime,
        livetime,
        device_id,
        timestamp,
        meta,
    };
    write!(w, "{doc}")
}

struct SpeDocument<'a> {
    histogram: &'a Histogram,
    realtime: f64,
    livetime: f64,
    device_id: &'a str,
    timestamp: DateTime<Utc>,
    meta: &'a SpeMetadata,
}

impl fmt::Display for SpeDocument<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "$SPEC_REM:")?;
        writeln!(f, "#timestamp,device_ID,realtime,livetime")?;
        writeln!(
            f,
            "{},{},{:.3},{:.3}",
            zulu_timestamp(&self.timestamp),
            self.device_id,
            self.realtime,
            self.livetime
        )?;
        writeln!(f, "$MEAS_TIM:")?;
        writeln!(
            f,
            "{} {}",
            whole_seconds(self.realtime),
            whole_seconds(self.livetime)
        )?;
        writeln!(f, "$DATA:")?;
        writeln!(f, "0 {}", CHANNEL_COUNT - 1)?;
        for count in self.histogram.counts().iter() {
            writeln!(f, "{count}")?;
        }

        let meta = self.meta;
        writeln!(f, "$ENER_FIT:")?;
        writeln!(f, "{} {}", meta.energy_fit.0, meta.energy_fit.1)?;
        writeln!(f, "$ENER_DATA:")?;
        writeln!(f, "{}", meta.energy_points.len())?;
        for (channel, energy) in meta.energy_points {
            writeln!(f, "{channel} {energy}")?;
        }
        writeln!(f, "$KROMEK_INFO:")?;
        writeln!(f, "LLD:\n{}", meta.lld)?;
        writeln!(f, "SCO:\noff")?;
        writeln!(f, "PRODUCT_FAMILY:\n{}", meta.product_family)?;
        writeln!(f, "DETECTOR_TYPE:\n{}", meta.detector_type)?;
        write!(f, "DETECTOR_TYPE_ID:\n{}", meta.detector_type_id)
    }
}

/// Export straight to a file.
pub fn write_spe_file(
    path: impl AsRef<Path>,
    histogram: &Histogram,
    realtime: f64,
    livetime: f64,
    device_id: &str,
) -> AppResult<()> {
    let mut w = BufWriter::new(File::create(path.as_ref())?);
    write_spe(
        &mut w,
        histogram,
        realtime,
        livetime,
        device_id,
        Utc::now(),
        &SpeMetadata::RADANGEL,
    )?;
    w.flush()?;
    Ok(())
}

// Truncates toward zero; negative or NaN input clamps to 0.
fn whole_seconds(seconds: f64) -> u64 {
    seconds as u64
}
