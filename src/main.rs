//! `radangel`: acquire a spectrum, log per-window snapshots, export SPE.
//!
//! Usage:
//!   radangel -p /dev/hidraw3 -c 600 capture.log
//!   radangel --mock 500 --spe demo.spe
//!   radangel --replay run.raw --replay-rate 250 -d

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use radangel_daq::acquisition::{run_with_settings, StopReason};
use radangel_daq::config::{Settings, DEFAULT_CONFIG_PATH};
use radangel_daq::hardware::{MockSource, RawDeviceSource, ReplaySource, SampleSource};
use radangel_daq::logging;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Stop after this many seconds of realtime (0 or negative = until Ctrl-C)
    #[arg(short = 'c', long, allow_negative_numbers = true)]
    capture_time: Option<f64>,

    /// Forward snapshots to the remote sink
    #[arg(short = 'd', long)]
    database: bool,

    /// Detector device node
    #[arg(short = 'p', long)]
    path: Option<PathBuf>,

    /// Use a synthetic detector at this many counts per second
    #[arg(long, value_name = "RATE", conflicts_with_all = ["path", "replay"])]
    mock: Option<f64>,

    /// Replay a raw capture file instead of reading a device
    #[arg(long, value_name = "FILE", conflicts_with = "path")]
    replay: Option<PathBuf>,

    /// Pace replayed records at this many counts per second (default: as fast as read)
    #[arg(long, value_name = "CPS", requires = "replay")]
    replay_rate: Option<f64>,

    /// SPE output file
    #[arg(long, value_name = "FILE")]
    spe: Option<PathBuf>,

    /// Snapshot log file
    logfile: Option<PathBuf>,
}

impl Args {
    /// Fold command line overrides into the loaded settings.
    fn apply(&self, settings: &mut Settings) {
        if let Some(secs) = self.capture_time {
            settings.acquisition.capture_time_secs = secs;
        }
        if self.database {
            settings.remote.enabled = true;
        }
        if let Some(path) = &self.path {
            settings.acquisition.device_path = Some(path.clone());
        }
        if let Some(spe) = &self.spe {
            settings.storage.spe_file = spe.clone();
        }
        if let Some(log) = &self.logfile {
            settings.storage.log_file = log.clone();
        }
    }

    fn open_source(&self, settings: &Settings) -> Result<Box<dyn SampleSource>> {
        if let Some(rate) = self.mock {
            return Ok(Box::new(MockSource::new(rate)));
        }
        if let Some(capture) = &self.replay {
            let source = ReplaySource::open(capture)
                .with_context(|| format!("Failed to open capture '{}'", capture.display()))?;
            return Ok(match self.replay_rate {
                Some(rate) => Box::new(source.with_rate(rate)),
                None => Box::new(source),
            });
        }
        let Some(device) = settings.acquisition.device_path.as_ref() else {
            bail!("No detector configured: pass --path, --mock or --replay");
        };
        let source = RawDeviceSource::open(device)
            .with_context(|| format!("Failed to open detector '{}'", device.display()))?;
        Ok(Box::new(source))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut settings = Settings::load_from(&args.config)
        .with_context(|| format!("Failed to load '{}'", args.config.display()))?;
    args.apply(&mut settings);
    settings.validate().context("Invalid configuration")?;

    logging::init(&settings.application.log_level);
    info!("{} starting", settings.application.name);

    let source = args.open_source(&settings)?;
    info!("Reading from {}", source.name());

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupted, finishing run");
            ctrl_c.cancel();
        }
    });

    let summary = run_with_settings(&settings, source, cancel)
        .await
        .context("Acquisition failed to start")?;

    summary
        .export_spe(&settings.storage.spe_file, &settings.acquisition.device_id)
        .with_context(|| {
            format!(
                "Failed to write spectrum to '{}'",
                settings.storage.spe_file.display()
            )
        })?;
    info!(
        "Spectrum of {} counts written to '{}'",
        summary.union.total(),
        settings.storage.spe_file.display()
    );
    if summary.dropped_samples > 0 {
        warn!("{} malformed samples dropped", summary.dropped_samples);
    }

    if let StopReason::SourceUnavailable(reason) = summary.stop_reason {
        bail!("Detector lost: {reason}");
    }
    Ok(())
}
