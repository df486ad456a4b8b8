//! Request and result types for one scrape session.

use serde::Serialize;
use tweetharvest_core::{DateRange, SearchMode, Tweet};
use uuid::Uuid;

use crate::error::WorkUnitFailure;
use crate::progress::ProgressSnapshot;

/// Caller input to [`crate::Orchestrator::start`].
#[derive(Debug, Clone)]
pub struct ScrapeRequest {
    pub query: String,
    pub range: DateRange,
    pub mode: SearchMode,
    /// Session-wide limit on accepted tweets.
    pub target: u64,
    /// Requested number of concurrent workers.
    pub parallelism: usize,
    /// Optional relative tweet density per day of `range`. Days with higher
    /// density end up in narrower work units.
    pub density_hints: Option<Vec<f64>>,
}

impl ScrapeRequest {
    #[must_use]
    pub fn new(query: impl Into<String>, range: DateRange, target: u64, parallelism: usize) -> Self {
        Self {
            query: query.into(),
            range,
            mode: SearchMode::Recency,
            target,
            parallelism,
            density_hints: None,
        }
    }

    #[must_use]
    pub fn with_mode(mut self, mode: SearchMode) -> Self {
        self.mode = mode;
        self
    }

    #[must_use]
    pub fn with_density_hints(mut self, hints: Vec<f64>) -> Self {
        self.density_hints = Some(hints);
        self
    }
}

/// A date slice of the request, consumed by exactly one worker at a time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkUnit {
    /// 0-based index in partition order.
    pub id: usize,
    pub query: String,
    pub mode: SearchMode,
    pub range: DateRange,
    /// Advisory share of the session target. Workers stop on the session-wide
    /// limit, not on this value.
    pub target: u64,
}

/// How a work unit ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnitStatus {
    /// The timeline ran out of results.
    Exhausted,
    /// Stopped by `cancel` or because the session target was reached.
    Cancelled,
    Failed(WorkUnitFailure),
}

impl UnitStatus {
    #[must_use]
    pub fn is_success(&self) -> bool {
        !matches!(self, UnitStatus::Failed(_))
    }
}

/// Per-unit statistics included in the final report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitOutcome {
    pub unit: WorkUnit,
    pub status: UnitStatus,
    /// Whole-unit attempts made (fresh session each).
    pub attempts: u32,
    pub fragments: u32,
    pub parse_errors: u32,
    pub accepted: u64,
    pub duplicates: u64,
}

/// Final result of a session that did not fail fatally.
#[derive(Debug, Clone)]
pub struct ScrapeReport {
    pub session_id: Uuid,
    /// Accepted tweets in acceptance order, with the last observed counts.
    pub tweets: Vec<Tweet>,
    pub units: Vec<UnitOutcome>,
    pub snapshot: ProgressSnapshot,
}

impl ScrapeReport {
    #[must_use]
    pub fn failed_units(&self) -> Vec<&WorkUnitFailure> {
        self.units
            .iter()
            .filter_map(|u| match &u.status {
                UnitStatus::Failed(failure) => Some(failure),
                _ => None,
            })
            .collect()
    }
}
