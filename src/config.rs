//! Configuration System using Figment
//!
//! Settings are loaded from:
//! 1. `config/radangel.toml` (base configuration, optional)
//! 2. Environment variables (prefixed with `RADANGEL_`, `__` separates sections)
//!
//! Every field has a default matching the stock RadAngel timing, so an absent file
//! yields a usable configuration.
//!
//! ```text
//! RADANGEL_APPLICATION__LOG_LEVEL=debug
//! RADANGEL_ACQUISITION__CAPTURE_TIME_SECS=300
//! RADANGEL_REMOTE__ENABLED=true
//! ```

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{AppResult, DaqError};

/// Default configuration file location.
pub const DEFAULT_CONFIG_PATH: &str = "config/radangel.toml";

/// Top-level settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Application settings
    pub application: ApplicationConfig,
    /// Acquisition timing and device settings
    pub acquisition: AcquisitionConfig,
    /// Output file locations
    pub storage: StorageConfig,
    /// Remote sink settings
    pub remote: RemoteConfig,
}

/// Application-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplicationConfig {
    /// Application name
    pub name: String,
    /// Logging level (trace, debug, info, warn, error)
    pub log_level: String,
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            name: "radangel".to_string(),
            log_level: "info".to_string(),
        }
    }
}

/// Acquisition configuration.
///
/// The three windows nest: `pass_interval` ≤ `countrate_interval` ≤ `logging_interval`,
/// and the control loop ticks at `tick_interval`, which must not exceed the pass window.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AcquisitionConfig {
    /// Device node of the detector (e.g. `/dev/hidraw3`)
    pub device_path: Option<PathBuf>,
    /// Identifier written into the SPE header
    pub device_id: String,
    /// Stop once realtime exceeds this many seconds (0 or negative = unlimited)
    pub capture_time_secs: f64,
    /// Countrate measurement window
    #[serde(with = "humantime_serde")]
    pub countrate_interval: Duration,
    /// Realtime/livetime integration window
    #[serde(with = "humantime_serde")]
    pub pass_interval: Duration,
    /// Snapshot and log window
    #[serde(with = "humantime_serde")]
    pub logging_interval: Duration,
    /// Control loop cadence
    #[serde(with = "humantime_serde")]
    pub tick_interval: Duration,
    /// Upper bound on a single source read
    #[serde(with = "humantime_serde")]
    pub poll_timeout: Duration,
    /// Detector dead time per registered count, in seconds
    pub dead_time_per_count: f64,
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            device_path: None,
            device_id: "0".to_string(),
            capture_time_secs: -1.0,
            countrate_interval: Duration::from_secs(1),
            pass_interval: Duration::from_millis(100),
            logging_interval: Duration::from_secs(60),
            tick_interval: Duration::from_millis(10),
            poll_timeout: Duration::from_millis(5),
            dead_time_per_count: 1e-5,
        }
    }
}

impl AcquisitionConfig {
    /// Capture limit, or `None` when the run is unbounded.
    pub fn capture_limit(&self) -> Option<f64> {
        (self.capture_time_secs > 0.0).then_some(self.capture_time_secs)
    }
}

/// Output file locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// CSV snapshot log
    pub log_file: PathBuf,
    /// Final SPE spectrum
    pub spe_file: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            log_file: PathBuf::from("radangel.log"),
            spe_file: PathBuf::from("radangel.spe"),
        }
    }
}

/// Remote sink configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// Whether snapshots are forwarded to the remote sink
    pub enabled: bool,
    /// Spool file receiving one JSON record per snapshot
    pub spool_path: PathBuf,
    /// Upper bound on a single insert
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            spool_path: PathBuf::from("radangel-remote.jsonl"),
            timeout: Duration::from_secs(2),
        }
    }
}

impl Settings {
    /// Load settings from [`DEFAULT_CONFIG_PATH`] and the environment.
    pub fn load() -> AppResult<Self> {
        Self::load_from(DEFAULT_CONFIG_PATH)
    }

    /// Load settings from a specific file path, then apply `RADANGEL_` overrides.
    ///
    /// A missing file is not an error; defaults fill every field it would have set.
    pub fn load_from<P: AsRef<Path>>(path: P) -> AppResult<Self> {
        let settings: Self = Figment::new()
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed("RADANGEL_").split("__"))
            .extract()?;

        settings.validate()?;
        Ok(settings)
    }

    /// Validate settings after loading
    ///
    /// Checks:
    /// - Log level is valid (trace, debug, info, warn, error)
    /// - Every interval is non-zero and the windows nest
    /// - Dead time per count is finite and non-negative
    /// - The remote spool path is set when the remote sink is enabled
    pub fn validate(&self) -> AppResult<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.application.log_level.as_str()) {
            return Err(DaqError::Configuration(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.application.log_level,
                valid_levels.join(", ")
            )));
        }

        let acq = &self.acquisition;
        for (name, value) in [
            ("countrate_interval", acq.countrate_interval),
            ("pass_interval", acq.pass_interval),
            ("logging_interval", acq.logging_interval),
            ("tick_interval", acq.tick_interval),
            ("poll_timeout", acq.poll_timeout),
        ] {
            if value.is_zero() {
                return Err(DaqError::Configuration(format!(
                    "'{name}' must be greater than zero"
                )));
            }
        }

        if acq.pass_interval > acq.countrate_interval
            || acq.countrate_interval > acq.logging_interval
        {
            return Err(DaqError::Configuration(format!(
                "Windows must nest: pass ({:?}) <= countrate ({:?}) <= logging ({:?})",
                acq.pass_interval, acq.countrate_interval, acq.logging_interval
            )));
        }

        if acq.tick_interval > acq.pass_interval {
            return Err(DaqError::Configuration(format!(
                "tick_interval ({:?}) must not exceed pass_interval ({:?})",
                acq.tick_interval, acq.pass_interval
            )));
        }

        if !acq.dead_time_per_count.is_finite() || acq.dead_time_per_count < 0.0 {
            return Err(DaqError::Configuration(format!(
                "Invalid dead_time_per_count {}. Must be a finite value >= 0",
                acq.dead_time_per_count
            )));
        }

        if self.remote.enabled && self.remote.spool_path.as_os_str().is_empty() {
            return Err(DaqError::Configuration(
                "Remote sink enabled but 'spool_path' is empty".to_string(),
            ));
        }

        Ok(())
    }
}
