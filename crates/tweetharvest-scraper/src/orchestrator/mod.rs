//! Session lifecycle: validation, partitioning, worker fan-out and the final
//! report.

mod delivery;
mod partition;
mod worker;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{mpsc, watch};
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tweetharvest_core::AppConfig;
use uuid::Uuid;

use crate::dedup::Deduplicator;
use crate::error::ScrapeError;
use crate::progress::{ProgressSnapshot, ProgressTracker, SessionState};
use crate::session::{Credential, SessionFactory};
use crate::sink::TweetSink;
use crate::types::{ScrapeReport, ScrapeRequest, UnitOutcome, UnitStatus, WorkUnit};

use partition::{partition, validate_request};

/// Engine tuning knobs, usually derived from [`AppConfig`].
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub max_parallelism: usize,
    /// Retries per `advance` (and per session open) on transient errors.
    pub max_advance_retries: u32,
    pub backoff_base_ms: u64,
    /// Whole-unit attempts, each with a fresh session.
    pub max_unit_attempts: u32,
    /// Trailing window for the acceptance-rate estimate.
    pub progress_window: Duration,
    /// Cadence of snapshots pushed to subscribers.
    pub progress_interval: Duration,
    pub sink_queue_capacity: usize,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            max_parallelism: 5,
            max_advance_retries: 3,
            backoff_base_ms: 1_000,
            max_unit_attempts: 2,
            progress_window: Duration::from_secs(60),
            progress_interval: Duration::from_secs(1),
            sink_queue_capacity: 256,
        }
    }
}

impl EngineSettings {
    #[must_use]
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            max_parallelism: config.max_parallelism,
            max_advance_retries: config.max_advance_retries,
            backoff_base_ms: config.backoff_base_ms,
            max_unit_attempts: config.max_unit_attempts,
            progress_window: Duration::from_secs(config.progress_window_secs),
            sink_queue_capacity: config.sink_queue_capacity,
            ..Self::default()
        }
    }
}

/// State shared by the workers of one session. Dropped with the session, so
/// fingerprints and counters never carry over to the next run.
pub(crate) struct SessionShared {
    pub(crate) settings: EngineSettings,
    pub(crate) factory: Arc<dyn SessionFactory>,
    pub(crate) credential: Credential,
    pub(crate) dedup: Deduplicator,
    pub(crate) tracker: Arc<ProgressTracker>,
    pub(crate) stop: CancellationToken,
    pub(crate) target: u64,
    target_hit: AtomicBool,
}

impl SessionShared {
    /// Stops every worker once the session-wide target is met.
    pub(crate) fn target_reached(&self) {
        if !self.target_hit.swap(true, Ordering::AcqRel) {
            tracing::info!(target = self.target, "session target reached, stopping workers");
        }
        self.stop.cancel();
    }
}

/// Coordinates scrape sessions against one session factory and sink.
pub struct Orchestrator {
    settings: EngineSettings,
    factory: Arc<dyn SessionFactory>,
    sink: Arc<dyn TweetSink>,
    credential: Credential,
}

impl Orchestrator {
    #[must_use]
    pub fn new(
        settings: EngineSettings,
        factory: Arc<dyn SessionFactory>,
        sink: Arc<dyn TweetSink>,
        credential: Credential,
    ) -> Self {
        Self {
            settings,
            factory,
            sink,
            credential,
        }
    }

    /// Validates `request`, partitions it and starts collecting in the
    /// background. Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`ScrapeError::InvalidRequest`] if validation fails; nothing is
    /// spawned in that case.
    pub fn start(&self, request: ScrapeRequest) -> Result<ScrapeHandle, ScrapeError> {
        validate_request(&request, &self.settings, Utc::now().date_naive())?;
        let units = partition(&request);

        let session_id = Uuid::new_v4();
        let tracker = Arc::new(ProgressTracker::new(
            request.target,
            units.len(),
            self.settings.progress_window,
        ));
        let stop = CancellationToken::new();
        let shared = Arc::new(SessionShared {
            settings: self.settings.clone(),
            factory: Arc::clone(&self.factory),
            credential: self.credential.clone(),
            dedup: Deduplicator::new(),
            tracker: Arc::clone(&tracker),
            stop: stop.clone(),
            target: request.target,
            target_hit: AtomicBool::new(false),
        });
        let (snapshot_tx, snapshot_rx) = watch::channel(tracker.snapshot());

        tracing::info!(
            session = %session_id,
            query = %request.query,
            mode = %request.mode,
            range = %request.range,
            target = request.target,
            units = units.len(),
            "scrape session started"
        );

        let task = tokio::spawn(run_session(
            session_id,
            units,
            shared,
            Arc::clone(&self.sink),
            snapshot_tx,
        ));

        Ok(ScrapeHandle {
            id: session_id,
            stop,
            tracker,
            snapshots: snapshot_rx,
            task,
        })
    }

    /// Asks every worker of `handle`'s session to stop at its next checkpoint.
    pub fn cancel(&self, handle: &ScrapeHandle) {
        handle.cancel();
    }

    #[must_use]
    pub fn progress(&self, handle: &ScrapeHandle) -> ProgressSnapshot {
        handle.progress()
    }
}

/// Caller-side handle to a running session.
pub struct ScrapeHandle {
    id: Uuid,
    stop: CancellationToken,
    tracker: Arc<ProgressTracker>,
    snapshots: watch::Receiver<ProgressSnapshot>,
    task: JoinHandle<Result<ScrapeReport, ScrapeError>>,
}

impl ScrapeHandle {
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Cooperative stop. In-flight page loads finish and their tweets are
    /// still delivered.
    pub fn cancel(&self) {
        if !self.stop.is_cancelled() {
            tracing::info!(session = %self.id, "cancellation requested");
        }
        self.stop.cancel();
    }

    /// Fresh snapshot straight from the tracker. Never waits on workers.
    #[must_use]
    pub fn progress(&self) -> ProgressSnapshot {
        self.tracker.snapshot()
    }

    /// Receiver of snapshots pushed on a fixed cadence and once at the end.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<ProgressSnapshot> {
        self.snapshots.clone()
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Waits for the session to end.
    ///
    /// # Errors
    ///
    /// Returns [`ScrapeError::AllUnitsFailed`] if no unit succeeded, or
    /// [`ScrapeError::Aborted`] if the session task panicked.
    pub async fn wait(self) -> Result<ScrapeReport, ScrapeError> {
        self.task
            .await
            .map_err(|e| ScrapeError::Aborted(e.to_string()))?
    }
}

async fn run_session(
    session_id: Uuid,
    units: Vec<WorkUnit>,
    shared: Arc<SessionShared>,
    sink: Arc<dyn TweetSink>,
    snapshot_tx: watch::Sender<ProgressSnapshot>,
) -> Result<ScrapeReport, ScrapeError> {
    let tracker = Arc::clone(&shared.tracker);
    let (delivery_tx, delivery_rx) = mpsc::channel(shared.settings.sink_queue_capacity.max(1));
    let delivery = tokio::spawn(delivery::run_delivery(
        delivery_rx,
        sink,
        Arc::clone(&tracker),
    ));

    let mut workers = JoinSet::new();
    for unit in units {
        workers.spawn(worker::run_unit(
            unit,
            Arc::clone(&shared),
            delivery_tx.clone(),
        ));
    }
    // Workers hold the only remaining senders; the queue closes when they end.
    drop(delivery_tx);

    let mut ticker = tokio::time::interval(shared.settings.progress_interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    let mut outcomes: Vec<UnitOutcome> = Vec::new();
    loop {
        tokio::select! {
            joined = workers.join_next() => match joined {
                Some(Ok(outcome)) => outcomes.push(outcome),
                Some(Err(e)) => {
                    tracker.unit_failed();
                    tracker.worker_finished();
                    tracing::error!(session = %session_id, error = %e, "work unit task aborted");
                }
                None => break,
            },
            _ = ticker.tick() => {
                snapshot_tx.send_replace(tracker.snapshot());
            }
        }
    }

    let drained = delivery
        .await
        .map_err(|e| ScrapeError::Aborted(format!("delivery task: {e}")))?;
    if drained.unmatched_refreshes > 0 {
        tracing::info!(
            session = %session_id,
            unmatched_refreshes = drained.unmatched_refreshes,
            "count refreshes dropped for tweets cut by the target"
        );
    }
    let tweets = drained.tweets;
    outcomes.sort_by_key(|o| o.unit.id);

    let progress = tracker.snapshot();
    let state = if progress.units_total > 0 && progress.units_failed == progress.units_total {
        SessionState::Failed
    } else if shared.stop.is_cancelled() && !shared.target_hit.load(Ordering::Acquire) {
        SessionState::Cancelled
    } else {
        SessionState::Completed
    };
    tracker.set_state(state);
    let snapshot = tracker.snapshot();
    snapshot_tx.send_replace(snapshot.clone());

    tracing::info!(
        session = %session_id,
        state = %state,
        accepted = snapshot.accepted,
        duplicates = snapshot.duplicates,
        errors = snapshot.errors,
        units_succeeded = snapshot.units_succeeded,
        units_failed = snapshot.units_failed,
        "scrape session finished"
    );

    if state == SessionState::Failed {
        let failures = outcomes
            .into_iter()
            .filter_map(|o| match o.status {
                UnitStatus::Failed(failure) => Some(failure),
                _ => None,
            })
            .collect();
        return Err(ScrapeError::AllUnitsFailed { failures });
    }

    Ok(ScrapeReport {
        session_id,
        tweets,
        units: outcomes,
        snapshot,
    })
}
