//! Per-unit worker: an explicit state machine over one browser session.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tweetharvest_core::Tweet;

use crate::error::WorkUnitFailure;
use crate::fingerprint::Fingerprint;
use crate::parse::parse_fragment;
use crate::rate_limit::{backoff_delay, retry_with_backoff};
use crate::session::{Advance, BrowserSession, RawFragment};
use crate::types::{UnitOutcome, UnitStatus, WorkUnit};

use super::delivery::Delivery;
use super::SessionShared;

#[derive(Debug)]
enum WorkerState {
    Pending,
    /// `attempt` is 1 for a fresh advance and grows with each retry.
    Advancing {
        attempt: u32,
    },
    BackingOff {
        attempt: u32,
        delay: Duration,
    },
    Reading(RawFragment),
    Parsing(RawFragment),
    Deduplicating(VecDeque<Tweet>),
    Delivering {
        fingerprint: Fingerprint,
        tweet: Tweet,
        rest: VecDeque<Tweet>,
    },
    Exhausted,
    Cancelled,
    Failed(String),
}

/// How one session attempt ended.
#[derive(Debug, PartialEq, Eq)]
enum AttemptEnd {
    Exhausted,
    Cancelled,
    Failed(String),
}

#[derive(Debug, Default)]
struct UnitStats {
    fragments: u32,
    parse_errors: u32,
    accepted: u64,
    duplicates: u64,
}

struct Worker<'a> {
    unit: &'a WorkUnit,
    shared: &'a SessionShared,
    session: &'a mut Box<dyn BrowserSession>,
    deliveries: &'a mpsc::Sender<Delivery>,
    stats: &'a mut UnitStats,
}

impl Worker<'_> {
    async fn run(mut self) -> AttemptEnd {
        let mut state = WorkerState::Pending;
        loop {
            state = match state {
                WorkerState::Exhausted => return AttemptEnd::Exhausted,
                WorkerState::Cancelled => return AttemptEnd::Cancelled,
                WorkerState::Failed(reason) => return AttemptEnd::Failed(reason),
                other => self.step(other).await,
            };
        }
    }

    async fn step(&mut self, state: WorkerState) -> WorkerState {
        let settings = &self.shared.settings;
        match state {
            WorkerState::Pending => WorkerState::Advancing { attempt: 1 },

            WorkerState::Advancing { attempt } => {
                // Checkpoint: the only place a new page load can begin.
                if self.shared.stop.is_cancelled() {
                    return WorkerState::Cancelled;
                }
                match self.session.advance().await {
                    Ok(Advance::Fragment(fragment)) => WorkerState::Reading(fragment),
                    Ok(Advance::EndOfResults) => WorkerState::Exhausted,
                    Err(e) if e.is_transient() && attempt <= settings.max_advance_retries => {
                        let delay = backoff_delay(attempt, settings.backoff_base_ms, &e);
                        tracing::warn!(
                            query = %self.unit.query,
                            unit = self.unit.id,
                            since = %self.unit.range.since,
                            until = %self.unit.range.until,
                            attempt,
                            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                            error = %e,
                            "advance failed, backing off"
                        );
                        WorkerState::BackingOff { attempt, delay }
                    }
                    Err(e) => WorkerState::Failed(format!("advance failed: {e}")),
                }
            }

            WorkerState::BackingOff { attempt, delay } => {
                tokio::select! {
                    () = self.shared.stop.cancelled() => WorkerState::Cancelled,
                    () = tokio::time::sleep(delay) => WorkerState::Advancing { attempt: attempt + 1 },
                }
            }

            WorkerState::Reading(fragment) => {
                self.stats.fragments += 1;
                tracing::debug!(
                    unit = self.unit.id,
                    position = fragment.position,
                    bytes = fragment.html.len(),
                    "read fragment"
                );
                WorkerState::Parsing(fragment)
            }

            WorkerState::Parsing(fragment) => match parse_fragment(&fragment) {
                Ok(tweets) => WorkerState::Deduplicating(tweets.into()),
                Err(e) => {
                    self.stats.parse_errors += 1;
                    tracing::warn!(
                        query = %self.unit.query,
                        unit = self.unit.id,
                        since = %self.unit.range.since,
                        until = %self.unit.range.until,
                        position = fragment.position,
                        error = %e,
                        "skipping unparseable fragment"
                    );
                    WorkerState::Advancing { attempt: 1 }
                }
            },

            WorkerState::Deduplicating(mut queue) => {
                let Some(tweet) = queue.pop_front() else {
                    return WorkerState::Advancing { attempt: 1 };
                };
                let fingerprint = Fingerprint::of(&tweet);
                if self.shared.dedup.accept_fingerprint(fingerprint) {
                    WorkerState::Delivering {
                        fingerprint,
                        tweet,
                        rest: queue,
                    }
                } else {
                    self.shared.tracker.record_duplicate();
                    self.stats.duplicates += 1;
                    // A closed queue only means the session is shutting down.
                    let _ = self
                        .deliveries
                        .send(Delivery::Refreshed { fingerprint, tweet })
                        .await;
                    WorkerState::Deduplicating(queue)
                }
            }

            WorkerState::Delivering {
                fingerprint,
                tweet,
                rest,
            } => {
                let target = self.shared.target;
                // Count first, then deliver: a crash in between under-reports.
                if !self.shared.tracker.try_record_accepted(target) {
                    self.shared.target_reached();
                    return WorkerState::Cancelled;
                }
                self.stats.accepted += 1;
                if self
                    .deliveries
                    .send(Delivery::Accepted { fingerprint, tweet })
                    .await
                    .is_err()
                {
                    return WorkerState::Failed("delivery queue closed".to_string());
                }
                if self.shared.tracker.accepted() >= target {
                    self.shared.target_reached();
                }
                WorkerState::Deduplicating(rest)
            }

            terminal @ (WorkerState::Exhausted
            | WorkerState::Cancelled
            | WorkerState::Failed(_)) => terminal,
        }
    }
}

/// Runs one work unit to completion, retrying failed attempts with a fresh
/// session up to `max_unit_attempts` times.
pub(crate) async fn run_unit(
    unit: WorkUnit,
    shared: Arc<SessionShared>,
    deliveries: mpsc::Sender<Delivery>,
) -> UnitOutcome {
    let settings = &shared.settings;
    shared.tracker.worker_started();
    tracing::info!(
        query = %unit.query,
        unit = unit.id,
        since = %unit.range.since,
        until = %unit.range.until,
        "work unit started"
    );

    let mut stats = UnitStats::default();
    let mut attempts = 0u32;
    let status = loop {
        if shared.stop.is_cancelled() {
            break UnitStatus::Cancelled;
        }
        attempts += 1;

        let open = retry_with_backoff(settings.max_advance_retries, settings.backoff_base_ms, || {
            shared.factory.open(&unit, &shared.credential)
        });
        let opened = tokio::select! {
            () = shared.stop.cancelled() => None,
            opened = open => Some(opened),
        };
        let Some(opened) = opened else {
            break UnitStatus::Cancelled;
        };

        let reason = match opened {
            Ok(mut session) => {
                let end = Worker {
                    unit: &unit,
                    shared: &shared,
                    session: &mut session,
                    deliveries: &deliveries,
                    stats: &mut stats,
                }
                .run()
                .await;
                session.close().await;
                match end {
                    AttemptEnd::Exhausted => break UnitStatus::Exhausted,
                    AttemptEnd::Cancelled => break UnitStatus::Cancelled,
                    AttemptEnd::Failed(reason) => reason,
                }
            }
            Err(e) => format!("could not open session: {e}"),
        };

        shared.tracker.record_error();
        tracing::warn!(
            query = %unit.query,
            unit = unit.id,
            since = %unit.range.since,
            until = %unit.range.until,
            attempt = attempts,
            error = %reason,
            "work unit attempt failed"
        );

        if attempts >= settings.max_unit_attempts || shared.stop.is_cancelled() {
            break UnitStatus::Failed(WorkUnitFailure {
                unit_id: unit.id,
                range: unit.range,
                attempts,
                reason,
            });
        }
    };

    if status.is_success() {
        shared.tracker.unit_succeeded();
    } else {
        shared.tracker.unit_failed();
    }
    shared.tracker.worker_finished();
    tracing::info!(
        unit = unit.id,
        status = ?status,
        accepted = stats.accepted,
        duplicates = stats.duplicates,
        fragments = stats.fragments,
        parse_errors = stats.parse_errors,
        "work unit finished"
    );

    UnitOutcome {
        unit,
        status,
        attempts,
        fragments: stats.fragments,
        parse_errors: stats.parse_errors,
        accepted: stats.accepted,
        duplicates: stats.duplicates,
    }
}
