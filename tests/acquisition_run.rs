//! End-to-end acquisition runs against synthetic and replayed sources.

use parking_lot::Mutex;
use radangel_daq::{
    acquisition::{run_acquisition, run_with_settings, StopReason},
    config::Settings,
    data::{Channel, Histogram, SnapshotRecord},
    error::AppResult,
    hardware::{MockSource, ReplaySource, SampleRecord},
    sinks::{LogSink, RemoteRecord},
};
use std::io::Cursor;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Keeps every appended snapshot in memory.
#[derive(Clone, Default)]
struct CapturingSink {
    records: Arc<Mutex<Vec<SnapshotRecord>>>,
    flushes: Arc<Mutex<usize>>,
}

impl LogSink for CapturingSink {
    fn append(&mut self, record: &SnapshotRecord) -> AppResult<()> {
        self.records.lock().push(record.clone());
        Ok(())
    }

    fn flush(&mut self) -> AppResult<()> {
        *self.flushes.lock() += 1;
        Ok(())
    }
}

/// Short windows so a run completes in well under a second.
fn fast_settings(capture_secs: f64) -> Settings {
    let mut settings = Settings::default();
    let acq = &mut settings.acquisition;
    acq.capture_time_secs = capture_secs;
    acq.pass_interval = Duration::from_millis(10);
    acq.countrate_interval = Duration::from_millis(50);
    acq.logging_interval = Duration::from_millis(100);
    acq.tick_interval = Duration::from_millis(2);
    acq.poll_timeout = Duration::from_millis(2);
    settings.validate().expect("test settings are valid");
    settings
}

#[tokio::test]
async fn test_capture_time_run_loses_no_samples() {
    let settings = fast_settings(0.5);
    let source = MockSource::new(4000.0).with_limit(600).with_seed(3);
    let emitted = source.emitted_counter();
    let sink = CapturingSink::default();

    let summary = run_acquisition(
        &settings,
        source,
        sink.clone(),
        None,
        CancellationToken::new(),
    )
    .await;

    assert_eq!(summary.stop_reason, StopReason::CaptureComplete);
    assert!(summary.realtime > 0.5);
    assert!(summary.livetime <= summary.realtime);
    assert_eq!(summary.dropped_samples, 0);

    // Every record the source handed out is in the union exactly once.
    assert_eq!(summary.union.total(), emitted.load(Ordering::SeqCst));
    assert_eq!(summary.union.total(), 600);

    // Union = sum of snapshots + trailing partial period.
    let records = sink.records.lock();
    assert!(!records.is_empty());
    let totals: Vec<u64> = records.iter().map(SnapshotRecord::total).collect();
    assert_eq!(summary.window_totals, totals);

    let mut from_snapshots = Histogram::new();
    for record in records.iter() {
        assert_eq!(record.histogram().total(), record.total());
        from_snapshots.accumulate(record.histogram());
    }
    let partial = summary.union.total() - from_snapshots.total();
    for (union, snap) in summary
        .union
        .counts()
        .iter()
        .zip(from_snapshots.counts().iter())
    {
        assert!(union >= snap);
    }
    assert_eq!(from_snapshots.total() + partial, 600);

    assert!(records.windows(2).all(|w| w[0].timestamp() < w[1].timestamp()));
    assert!(*sink.flushes.lock() >= 1);
}

#[tokio::test]
async fn test_cancelled_run_is_interrupted() {
    let settings = fast_settings(-1.0);
    let source = MockSource::new(2000.0).with_seed(5);
    let emitted = source.emitted_counter();
    let cancel = CancellationToken::new();

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(250)).await;
        trigger.cancel();
    });

    let start = std::time::Instant::now();
    let summary = run_acquisition(&settings, source, CapturingSink::default(), None, cancel).await;

    assert_eq!(summary.stop_reason, StopReason::Interrupted);
    assert!(start.elapsed() < Duration::from_secs(2));
    assert_eq!(summary.union.total(), emitted.load(Ordering::SeqCst));
    assert!(summary.union.total() > 0);
}

#[tokio::test]
async fn test_dropped_run_stops_reading_source() {
    let settings = fast_settings(-1.0);
    let source = MockSource::new(2000.0).with_seed(6);
    let emitted = source.emitted_counter();

    let run = run_acquisition(
        &settings,
        source,
        CapturingSink::default(),
        None,
        CancellationToken::new(),
    );
    assert!(tokio::time::timeout(Duration::from_millis(100), run)
        .await
        .is_err());

    // Let the actor observe the cancellation and finish its last poll.
    tokio::time::sleep(Duration::from_millis(50)).await;
    let after_drop = emitted.load(Ordering::SeqCst);
    assert!(after_drop > 0);

    tokio::time::sleep(Duration::from_millis(250)).await;
    assert_eq!(emitted.load(Ordering::SeqCst), after_drop);
}

#[tokio::test]
async fn test_source_loss_returns_partial_summary() {
    let settings = fast_settings(10.0);
    let source = MockSource::new(2000.0).with_seed(9);
    let emitted = source.emitted_counter();
    let unplug = source.failure_switch();

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(250)).await;
        unplug.store(true, Ordering::SeqCst);
    });

    let summary = run_acquisition(
        &settings,
        source,
        CapturingSink::default(),
        None,
        CancellationToken::new(),
    )
    .await;

    match &summary.stop_reason {
        StopReason::SourceUnavailable(reason) => assert!(reason.contains("disconnected")),
        other => panic!("unexpected stop reason {other:?}"),
    }
    assert!(summary.realtime < 10.0);
    assert!(summary.union.total() > 0);
    assert_eq!(summary.union.total(), emitted.load(Ordering::SeqCst));
}

#[tokio::test]
async fn test_replay_until_exhausted() {
    let settings = fast_settings(-1.0);
    let mut capture = Vec::new();
    for index in [1u16, 16, 16, 4095, 100, 100, 100] {
        let channel = Channel::new(index).unwrap();
        capture.extend_from_slice(SampleRecord::for_channel(channel).as_bytes());
    }
    let source = ReplaySource::from_reader(Cursor::new(capture), "fixture");

    let summary = run_acquisition(
        &settings,
        source,
        CapturingSink::default(),
        None,
        CancellationToken::new(),
    )
    .await;

    assert!(matches!(
        summary.stop_reason,
        StopReason::SourceUnavailable(ref reason) if reason.contains("exhausted after 7 records")
    ));
    assert_eq!(summary.union.total(), 7);
    assert_eq!(summary.union.get(Channel::new(16).unwrap()), 2);
    assert_eq!(summary.union.get(Channel::new(100).unwrap()), 3);
    assert_eq!(summary.union.get(Channel::new(4095).unwrap()), 1);
}

#[tokio::test]
async fn test_paced_replay_spans_records_over_rate() {
    let settings = fast_settings(-1.0);
    let mut capture = Vec::new();
    for _ in 0..30 {
        let channel = Channel::new(661).unwrap();
        capture.extend_from_slice(SampleRecord::for_channel(channel).as_bytes());
    }
    // 30 records at 100 cps take about 0.3 s to run out.
    let source = ReplaySource::from_reader(Cursor::new(capture), "paced").with_rate(100.0);

    let summary = run_acquisition(
        &settings,
        source,
        CapturingSink::default(),
        None,
        CancellationToken::new(),
    )
    .await;

    assert!(matches!(
        summary.stop_reason,
        StopReason::SourceUnavailable(ref reason) if reason.contains("exhausted after 30 records")
    ));
    assert_eq!(summary.union.total(), 30);
    assert!(
        summary.realtime > 0.2 && summary.realtime < 1.0,
        "realtime {} not near 30 records / 100 cps",
        summary.realtime
    );
    assert!(!summary.window_totals.is_empty());
}

#[tokio::test]
async fn test_run_with_settings_writes_log_and_spool() {
    let dir = tempfile::tempdir().unwrap();
    let mut settings = fast_settings(0.35);
    settings.storage.log_file = dir.path().join("logs").join("run.log");
    settings.remote.enabled = true;
    settings.remote.spool_path = dir.path().join("remote.jsonl");

    let source = MockSource::new(3000.0).with_seed(11);
    let summary = run_with_settings(&settings, source, CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(summary.stop_reason, StopReason::CaptureComplete);

    let log = std::fs::read_to_string(&settings.storage.log_file).unwrap();
    let lines: Vec<&str> = log.lines().collect();
    assert_eq!(lines.len(), summary.window_totals.len());
    for (line, total) in lines.iter().zip(&summary.window_totals) {
        let fields: Vec<&str> = line.split(',').collect();
        assert_eq!(fields.len(), 2 + 4096);
        assert!(fields[0].ends_with('Z'));
        assert_eq!(fields[1], total.to_string());
    }

    let spool = std::fs::read_to_string(&settings.remote.spool_path).unwrap();
    let records: Vec<RemoteRecord> = spool
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(records.len(), summary.window_totals.len());
    assert!(records.iter().all(|r| r.channels.len() == 4096));
    let cpm: Vec<u64> = records.iter().map(|r| r.cpm).collect();
    assert_eq!(cpm, summary.window_totals);
}

#[tokio::test]
async fn test_run_with_settings_fails_without_log_file() {
    let dir = tempfile::tempdir().unwrap();
    let blocker = dir.path().join("not-a-dir");
    std::fs::write(&blocker, b"").unwrap();

    let mut settings = fast_settings(0.1);
    settings.storage.log_file = blocker.join("run.log");

    let result = run_with_settings(
        &settings,
        MockSource::new(100.0),
        CancellationToken::new(),
    )
    .await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_export_after_run() {
    let dir = tempfile::tempdir().unwrap();
    let settings = fast_settings(0.2);
    let source = MockSource::new(1000.0).with_limit(50).with_seed(2);

    let summary = run_acquisition(
        &settings,
        source,
        CapturingSink::default(),
        None,
        CancellationToken::new(),
    )
    .await;

    let path = dir.path().join("run.spe");
    summary.export_spe(&path, "0").unwrap();
    let text = std::fs::read_to_string(&path).unwrap();
    let data: u64 = text
        .lines()
        .skip(7)
        .take(4096)
        .map(|l| l.parse::<u64>().unwrap())
        .sum();
    assert_eq!(data, 50);
}
