use thiserror::Error;
use tweetharvest_core::DateRange;

/// The rendered fragment does not look like a search timeline at all.
///
/// Fragment-local: the worker logs it and moves on to the next fragment.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("unrecognized page layout in fragment {position}: {reason}")]
    UnrecognizedLayout { position: u32, reason: String },
}

/// Failure while driving a browser session.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("render of {url} timed out")]
    Timeout { url: String },

    #[error("rate limited by {domain} (retry after {retry_after_secs}s)")]
    RateLimited {
        domain: String,
        retry_after_secs: u64,
    },

    #[error("unexpected HTTP status {status} from {url}")]
    UnexpectedStatus { status: u16, url: String },

    #[error("invalid session endpoint \"{url}\": {reason}")]
    InvalidEndpoint { url: String, reason: String },
}

impl FetchError {
    /// Returns `true` if retrying the same step after a delay may succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        crate::rate_limit::is_retriable(self)
    }
}

/// Failure reported by a [`crate::sink::TweetSink`].
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("sink I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("sink serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("sink rejected tweet {id}: {reason}")]
    Rejected { id: String, reason: String },
}

/// A work unit that exhausted every whole-unit attempt.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("work unit {unit_id} ({range}) failed after {attempts} attempts: {reason}")]
pub struct WorkUnitFailure {
    pub unit_id: usize,
    pub range: DateRange,
    pub attempts: u32,
    pub reason: String,
}

/// Session-level errors surfaced to the caller of the orchestrator.
#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("invalid scrape request: {0}")]
    InvalidRequest(String),

    #[error("all {} work units failed", failures.len())]
    AllUnitsFailed { failures: Vec<WorkUnitFailure> },

    #[error("scrape session task aborted: {0}")]
    Aborted(String),
}
