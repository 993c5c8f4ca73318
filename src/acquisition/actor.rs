//! Acquisition actor: drains the sample source into the shared histogram.
//!
//! The actor runs on a blocking worker because hardware reads are synchronous. It
//! polls the source with a bounded timeout and checks its cancellation token once per
//! iteration, so it stops at most one poll interval after being cancelled. It only
//! increments shared state; resets belong to the aggregation loop.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, trace};

use crate::data::AcquisitionState;
use crate::error::AppResult;
use crate::hardware::SampleSource;

/// Counts kept by the actor itself, returned when it stops.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ActorStats {
    /// Records decoded and recorded
    pub recorded: u64,
    /// Records dropped as malformed
    pub dropped: u64,
}

/// Reads the source until cancelled or until the source fails.
pub struct AcquisitionActor<S> {
    source: S,
    state: Arc<AcquisitionState>,
    poll_timeout: Duration,
    cancel: CancellationToken,
}

impl<S: SampleSource> AcquisitionActor<S> {
    /// Bind a source to shared state.
    pub fn new(
        source: S,
        state: Arc<AcquisitionState>,
        poll_timeout: Duration,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            source,
            state,
            poll_timeout,
            cancel,
        }
    }

    /// Run the read loop on the current thread.
    ///
    /// The source is dropped when this returns, on every path.
    ///
    /// # Errors
    ///
    /// `SourceUnavailable` (or whatever the source reported) when a read fails.
    pub fn run(mut self) -> AppResult<ActorStats> {
        let mut stats = ActorStats::default();
        debug!(source = self.source.name(), "acquisition actor started");

        while !self.cancel.is_cancelled() {
            match self.source.read(self.poll_timeout) {
                Ok(Some(record)) => match record.channel() {
                    Ok(channel) => {
                        self.state.record(channel);
                        stats.recorded += 1;
                    }
                    Err(e) => {
                        trace!(error = %e, "dropping sample");
                        self.state.record_dropped();
                        stats.dropped += 1;
                    }
                },
                Ok(None) => {}
                Err(e) => {
                    error!(source = self.source.name(), error = %e, "sample source failed");
                    return Err(e);
                }
            }
        }

        debug!(
            recorded = stats.recorded,
            dropped = stats.dropped,
            "acquisition actor stopped"
        );
        Ok(stats)
    }
}

impl<S: SampleSource + 'static> AcquisitionActor<S> {
    /// Run the read loop on Tokio's blocking pool, inside the caller's span.
    pub fn spawn(self) -> JoinHandle<AppResult<ActorStats>> {
        let span = tracing::Span::current();
        tokio::task::spawn_blocking(move || {
            let _entered = span.enter();
            self.run()
        })
    }
}
