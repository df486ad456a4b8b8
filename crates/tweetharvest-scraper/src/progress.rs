//! Session-wide progress counters and ETA estimation.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};

/// Lifecycle of a scrape session as seen by observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Running,
    /// Target reached or every unit ran out of results.
    Completed,
    Cancelled,
    /// Every work unit failed.
    Failed,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionState::Running => write!(f, "running"),
            SessionState::Completed => write!(f, "completed"),
            SessionState::Cancelled => write!(f, "cancelled"),
            SessionState::Failed => write!(f, "failed"),
        }
    }
}

/// Point-in-time copy of the tracker's counters.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressSnapshot {
    pub state: SessionState,
    pub target: u64,
    pub accepted: u64,
    pub duplicates: u64,
    /// Failed unit attempts plus sink failures.
    pub errors: u64,
    pub workers_active: usize,
    pub units_total: usize,
    pub units_succeeded: usize,
    pub units_failed: usize,
    pub elapsed: Duration,
    /// Acceptances per minute over the trailing window.
    pub rate_per_minute: f64,
    /// Remaining time at the current rate; `None` while the rate is zero.
    pub eta: Option<Duration>,
    pub estimated_completion: Option<DateTime<Utc>>,
}

impl ProgressSnapshot {
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.state != SessionState::Running
    }
}

/// Lock-light counters shared by every worker of one session.
///
/// Counters are atomics. The only lock guards the timestamps of recent
/// acceptances and is held for a push or a prune.
#[derive(Debug)]
pub struct ProgressTracker {
    target: u64,
    units_total: usize,
    window: Duration,
    started: Instant,
    started_wall: DateTime<Utc>,
    accepted: AtomicU64,
    duplicates: AtomicU64,
    errors: AtomicU64,
    workers_active: AtomicUsize,
    units_succeeded: AtomicUsize,
    units_failed: AtomicUsize,
    state: Mutex<SessionState>,
    recent: Mutex<VecDeque<Instant>>,
}

impl ProgressTracker {
    #[must_use]
    pub fn new(target: u64, units_total: usize, window: Duration) -> Self {
        Self::starting_at(target, units_total, window, Instant::now())
    }

    pub(crate) fn starting_at(
        target: u64,
        units_total: usize,
        window: Duration,
        started: Instant,
    ) -> Self {
        Self {
            target,
            units_total,
            window: window.max(Duration::from_secs(1)),
            started,
            started_wall: Utc::now(),
            accepted: AtomicU64::new(0),
            duplicates: AtomicU64::new(0),
            errors: AtomicU64::new(0),
            workers_active: AtomicUsize::new(0),
            units_succeeded: AtomicUsize::new(0),
            units_failed: AtomicUsize::new(0),
            state: Mutex::new(SessionState::Running),
            recent: Mutex::new(VecDeque::new()),
        }
    }

    pub fn record_accepted(&self) {
        self.accepted.fetch_add(1, Ordering::AcqRel);
        self.push_recent(Instant::now());
    }

    /// Counts one acceptance unless `limit` has already been reached.
    ///
    /// Returns `false` when no slot is left; the caller must then drop the
    /// record instead of delivering it.
    pub fn try_record_accepted(&self, limit: u64) -> bool {
        let reserved = self
            .accepted
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (n < limit).then_some(n + 1)
            })
            .is_ok();
        if reserved {
            self.push_recent(Instant::now());
        }
        reserved
    }

    pub fn record_duplicate(&self) {
        self.duplicates.fetch_add(1, Ordering::AcqRel);
    }

    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::AcqRel);
    }

    pub fn worker_started(&self) {
        self.workers_active.fetch_add(1, Ordering::AcqRel);
    }

    pub fn worker_finished(&self) {
        let _ = self
            .workers_active
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));
    }

    pub fn unit_succeeded(&self) {
        self.units_succeeded.fetch_add(1, Ordering::AcqRel);
    }

    pub fn unit_failed(&self) {
        self.units_failed.fetch_add(1, Ordering::AcqRel);
    }

    pub fn set_state(&self, state: SessionState) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = state;
    }

    #[must_use]
    pub fn accepted(&self) -> u64 {
        self.accepted.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn snapshot(&self) -> ProgressSnapshot {
        self.snapshot_at(Instant::now())
    }

    fn push_recent(&self, at: Instant) {
        let mut recent = self.recent.lock().unwrap_or_else(PoisonError::into_inner);
        recent.push_back(at);
        prune(&mut recent, at, self.window);
    }

    pub(crate) fn record_accepted_at(&self, at: Instant) {
        self.accepted.fetch_add(1, Ordering::AcqRel);
        self.push_recent(at);
    }

    #[allow(clippy::cast_precision_loss)]
    pub(crate) fn snapshot_at(&self, now: Instant) -> ProgressSnapshot {
        let accepted = self.accepted.load(Ordering::Acquire);
        let elapsed = now.saturating_duration_since(self.started);

        let in_window = {
            let mut recent = self.recent.lock().unwrap_or_else(PoisonError::into_inner);
            prune(&mut recent, now, self.window);
            recent.len()
        };

        // Early in a run the window is only partly filled.
        let span = self.window.min(elapsed).as_secs_f64();
        let rate_per_sec = if span > 0.0 {
            in_window as f64 / span
        } else {
            0.0
        };

        let remaining = self.target.saturating_sub(accepted);
        let eta = if remaining == 0 {
            Some(Duration::ZERO)
        } else if rate_per_sec > 0.0 {
            // Absurd targets at a trickle overflow `Duration`; report unknown.
            Duration::try_from_secs_f64(remaining as f64 / rate_per_sec).ok()
        } else {
            None
        };
        let estimated_completion = eta.and_then(|eta| {
            let ahead = chrono::Duration::from_std(elapsed.checked_add(eta)?).ok()?;
            self.started_wall.checked_add_signed(ahead)
        });

        ProgressSnapshot {
            state: *self.state.lock().unwrap_or_else(PoisonError::into_inner),
            target: self.target,
            accepted,
            duplicates: self.duplicates.load(Ordering::Acquire),
            errors: self.errors.load(Ordering::Acquire),
            workers_active: self.workers_active.load(Ordering::Acquire),
            units_total: self.units_total,
            units_succeeded: self.units_succeeded.load(Ordering::Acquire),
            units_failed: self.units_failed.load(Ordering::Acquire),
            elapsed,
            rate_per_minute: rate_per_sec * 60.0,
            eta,
            estimated_completion,
        }
    }
}

fn prune(recent: &mut VecDeque<Instant>, now: Instant, window: Duration) {
    while recent
        .front()
        .is_some_and(|t| now.saturating_duration_since(*t) > window)
    {
        recent.pop_front();
    }
}

/// Formats a duration for humans: `45s`, `5m 30s`, `2h 15m`.
#[must_use]
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs < 60 {
        format!("{secs}s")
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m", secs / 3600, (secs % 3600) / 60)
    }
}

#[cfg(test)]
#[path = "progress_test.rs"]
mod tests;
