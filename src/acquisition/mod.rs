//! Acquisition pipeline.
//!
//! A run is two cooperating tasks sharing one [`AcquisitionState`]:
//!
//! - the [`AcquisitionActor`] on a blocking worker, reading the source and
//!   incrementing the period histogram and rate counter;
//! - the aggregation loop on the caller's task, driving the [`Aggregator`] on a fixed
//!   tick, handing snapshots to the sinks and deciding when to stop.
//!
//! The loop stops on the first of: capture time reached, the caller's
//! [`CancellationToken`] fired, or the actor exiting because the source failed. On
//! every path the actor is cancelled and joined before the final period is folded
//! into the union, so the returned [`RunSummary`] holds every sample the actor
//! recorded exactly once.

pub mod actor;
pub mod aggregator;
pub mod timing;

pub use actor::{AcquisitionActor, ActorStats};
pub use aggregator::{Aggregator, TickReport, Totals};
pub use timing::{live_fraction, TimingState, MIN_RATE_WINDOW};

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinError;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::config::Settings;
use crate::data::{AcquisitionState, Histogram, SnapshotRecord};
use crate::error::AppResult;
use crate::export::write_spe_file;
use crate::hardware::SampleSource;
use crate::sinks::{CsvLogSink, JsonLinesSink, LogSink, RemoteRecord, RemoteSink};

/// Why a run ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StopReason {
    /// Realtime passed the configured capture time
    CaptureComplete,
    /// The caller cancelled the run
    Interrupted,
    /// The source failed; carries the failure description
    SourceUnavailable(String),
}

/// Everything a finished run hands back.
#[derive(Debug)]
pub struct RunSummary {
    /// All snapshots plus the trailing partial period
    pub union: Histogram,
    /// Elapsed seconds
    pub realtime: f64,
    /// Dead-time corrected seconds
    pub livetime: f64,
    /// Last measured counts per second
    pub countrate: f64,
    /// Sample count of each completed logging window
    pub window_totals: Vec<u64>,
    /// Records dropped as malformed
    pub dropped_samples: u64,
    /// How the run ended
    pub stop_reason: StopReason,
}

impl RunSummary {
    /// Write the union spectrum as an SPE file.
    pub fn export_spe(&self, path: impl AsRef<Path>, device_id: &str) -> AppResult<()> {
        write_spe_file(path, &self.union, self.realtime, self.livetime, device_id)
    }
}

/// Run one acquisition to completion against the given sinks.
///
/// Sink failures never end the run: log-sink errors and remote failures or timeouts
/// are reported with `warn!` and the snapshot is otherwise dropped for that sink.
pub async fn run_acquisition<S, L>(
    settings: &Settings,
    source: S,
    log_sink: L,
    remote: Option<Box<dyn RemoteSink>>,
    cancel: CancellationToken,
) -> RunSummary
where
    S: SampleSource + 'static,
    L: LogSink,
{
    let span = info_span!("acquisition", run_id = %Uuid::new_v4(), source = source.name());
    drive(settings, source, log_sink, remote, cancel)
        .instrument(span)
        .await
}

async fn drive<S, L>(
    settings: &Settings,
    source: S,
    mut log_sink: L,
    mut remote: Option<Box<dyn RemoteSink>>,
    cancel: CancellationToken,
) -> RunSummary
where
    S: SampleSource + 'static,
    L: LogSink,
{
    let config = &settings.acquisition;
    let state = Arc::new(AcquisitionState::new());
    let actor_cancel = cancel.child_token();
    // Stops the actor even if this future is dropped mid-run.
    let _stop_actor = actor_cancel.clone().drop_guard();
    let mut actor = AcquisitionActor::new(
        source,
        Arc::clone(&state),
        config.poll_timeout,
        actor_cancel.clone(),
    )
    .spawn();

    let mut aggregator = Aggregator::new(Arc::clone(&state), config, Instant::now());
    let mut ticker = tokio::time::interval(config.tick_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!(
        capture_time = ?config.capture_limit(),
        logging_interval = ?config.logging_interval,
        "Acquisition started"
    );

    let mut actor_joined = false;
    let stop_reason = loop {
        tokio::select! {
            now = ticker.tick() => {
                let report = aggregator.tick(now);
                if let Some(snapshot) = report.snapshot {
                    let timing = aggregator.timing();
                    info!(
                        "Snapshot of {} counts, realtime {:.3} s, livetime {:.3} s",
                        snapshot.total(),
                        timing.realtime(),
                        timing.livetime()
                    );
                    emit(&snapshot, &mut log_sink, &mut remote, settings.remote.timeout).await;
                }
                if report.capture_complete {
                    break StopReason::CaptureComplete;
                }
            }
            joined = &mut actor, if !actor_joined => {
                actor_joined = true;
                break stop_reason_for_actor(joined);
            }
            _ = cancel.cancelled() => {
                break StopReason::Interrupted;
            }
        }
    };

    actor_cancel.cancel();
    if !actor_joined {
        match actor.await {
            Ok(Ok(stats)) => debug!(recorded = stats.recorded, "actor joined"),
            Ok(Err(e)) => warn!(error = %e, "source failed while stopping"),
            Err(e) => error!(error = %e, "acquisition actor did not shut down cleanly"),
        }
    }

    let dropped_samples = state.dropped();
    let totals = aggregator.finish();
    if let Err(e) = log_sink.flush() {
        warn!(error = %e, "Failed to flush snapshot log");
    }

    info!(
        reason = ?stop_reason,
        total = totals.union.total(),
        dropped = dropped_samples,
        "Acquisition finished, realtime {:.3} s, livetime {:.3} s",
        totals.timing.realtime(),
        totals.timing.livetime()
    );

    RunSummary {
        union: totals.union,
        realtime: totals.timing.realtime(),
        livetime: totals.timing.livetime(),
        countrate: totals.timing.countrate(),
        window_totals: totals.window_totals,
        dropped_samples,
        stop_reason,
    }
}

fn stop_reason_for_actor(joined: Result<AppResult<ActorStats>, JoinError>) -> StopReason {
    match joined {
        // Only a cancelled token ends the actor cleanly.
        Ok(Ok(_)) => StopReason::Interrupted,
        Ok(Err(e)) => StopReason::SourceUnavailable(e.to_string()),
        Err(e) => StopReason::SourceUnavailable(format!("acquisition actor aborted: {e}")),
    }
}

/// Hand one snapshot to the log sink, then to the remote sink if present.
async fn emit<L: LogSink>(
    snapshot: &SnapshotRecord,
    log_sink: &mut L,
    remote: &mut Option<Box<dyn RemoteSink>>,
    timeout: Duration,
) {
    if let Err(e) = log_sink.append(snapshot).and_then(|()| log_sink.flush()) {
        warn!(error = %e, "Failed to write snapshot to log");
    }

    let Some(sink) = remote.as_mut() else {
        return;
    };
    let record = RemoteRecord::from(snapshot);
    match tokio::time::timeout(timeout, sink.insert(&record)).await {
        Ok(Ok(())) => debug!(
            sink = sink.name(),
            at = %snapshot.timestamp_rfc3339(),
            "snapshot forwarded"
        ),
        Ok(Err(e)) => warn!(sink = sink.name(), error = %e, "Remote insert failed"),
        Err(_) => warn!(sink = sink.name(), ?timeout, "Remote insert timed out"),
    }
}

/// Open the configured sinks and run an acquisition.
///
/// # Errors
///
/// Fails before any sample is read if the snapshot log cannot be created. A remote
/// spool that cannot be opened only disables the remote sink.
pub async fn run_with_settings<S>(
    settings: &Settings,
    source: S,
    cancel: CancellationToken,
) -> AppResult<RunSummary>
where
    S: SampleSource + 'static,
{
    let log_sink = CsvLogSink::create(&settings.storage.log_file)?;

    let remote: Option<Box<dyn RemoteSink>> = if settings.remote.enabled {
        match JsonLinesSink::open(&settings.remote.spool_path).await {
            Ok(sink) => {
                info!("Remote spool at '{}'.", sink.path().display());
                Some(Box::new(sink))
            }
            Err(e) => {
                warn!(error = %e, "Remote sink disabled");
                None
            }
        }
    } else {
        None
    };

    Ok(run_acquisition(settings, source, log_sink, remote, cancel).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DaqError;
    use crate::hardware::MockSource;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tracing_test::traced_test;

    #[derive(Clone, Default)]
    struct CountingLog {
        appended: Arc<AtomicUsize>,
    }

    impl LogSink for CountingLog {
        fn append(&mut self, _record: &SnapshotRecord) -> AppResult<()> {
            self.appended.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn flush(&mut self) -> AppResult<()> {
            Ok(())
        }
    }

    struct BrokenRemote {
        attempts: Arc<Mutex<u32>>,
    }

    #[async_trait]
    impl RemoteSink for BrokenRemote {
        fn name(&self) -> &str {
            "broken"
        }

        async fn insert(&mut self, _record: &RemoteRecord) -> AppResult<()> {
            *self.attempts.lock() += 1;
            Err(DaqError::sink_write("broken", "connection refused"))
        }
    }

    struct StalledRemote;

    #[async_trait]
    impl RemoteSink for StalledRemote {
        fn name(&self) -> &str {
            "stalled"
        }

        async fn insert(&mut self, _record: &RemoteRecord) -> AppResult<()> {
            std::future::pending::<()>().await;
            Ok(())
        }
    }

    fn fast_settings(capture_secs: f64) -> Settings {
        let mut settings = Settings::default();
        let acq = &mut settings.acquisition;
        acq.capture_time_secs = capture_secs;
        acq.pass_interval = Duration::from_millis(10);
        acq.countrate_interval = Duration::from_millis(20);
        acq.logging_interval = Duration::from_millis(50);
        acq.tick_interval = Duration::from_millis(2);
        acq.poll_timeout = Duration::from_millis(2);
        settings.remote.timeout = Duration::from_millis(20);
        settings
    }

    #[tokio::test]
    #[traced_test]
    async fn test_failing_remote_does_not_block_log() {
        let settings = fast_settings(0.3);
        let log = CountingLog::default();
        let attempts = Arc::new(Mutex::new(0));
        let remote: Box<dyn RemoteSink> = Box::new(BrokenRemote {
            attempts: Arc::clone(&attempts),
        });

        let summary = run_acquisition(
            &settings,
            MockSource::new(1000.0).with_seed(4),
            log.clone(),
            Some(remote),
            CancellationToken::new(),
        )
        .await;

        assert_eq!(summary.stop_reason, StopReason::CaptureComplete);
        let snapshots = summary.window_totals.len();
        assert!(snapshots >= 4);
        assert_eq!(log.appended.load(Ordering::SeqCst), snapshots);
        assert_eq!(*attempts.lock() as usize, snapshots);
        assert!(logs_contain("Remote insert failed"));
    }

    #[tokio::test]
    #[traced_test]
    async fn test_stalled_remote_times_out() {
        let settings = fast_settings(0.2);
        let log = CountingLog::default();

        let start = std::time::Instant::now();
        let summary = run_acquisition(
            &settings,
            MockSource::new(500.0).with_seed(8),
            log.clone(),
            Some(Box::new(StalledRemote)),
            CancellationToken::new(),
        )
        .await;

        assert_eq!(summary.stop_reason, StopReason::CaptureComplete);
        assert!(start.elapsed() < Duration::from_secs(3));
        assert_eq!(
            log.appended.load(Ordering::SeqCst),
            summary.window_totals.len()
        );
        assert!(logs_contain("Remote insert timed out"));
    }

    #[test]
    fn test_stop_reason_for_failed_actor() {
        let reason = stop_reason_for_actor(Ok(Err(DaqError::SourceUnavailable(
            "unplugged".to_string(),
        ))));
        assert_eq!(
            reason,
            StopReason::SourceUnavailable("Sample source unavailable: unplugged".to_string())
        );
        assert_eq!(
            stop_reason_for_actor(Ok(Ok(ActorStats::default()))),
            StopReason::Interrupted
        );
    }
}
