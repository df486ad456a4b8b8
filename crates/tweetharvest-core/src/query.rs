//! Search request primitives shared by the engine and its callers.

use std::str::FromStr;

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::CoreError;

/// Ordering of the search timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    /// Newest first (the "Latest" tab).
    Recency,
    /// Platform-ranked (the "Top" tab).
    Relevance,
}

impl std::fmt::Display for SearchMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SearchMode::Recency => write!(f, "latest"),
            SearchMode::Relevance => write!(f, "top"),
        }
    }
}

impl FromStr for SearchMode {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "latest" | "live" | "recency" => Ok(SearchMode::Recency),
            "top" | "relevance" => Ok(SearchMode::Relevance),
            other => Err(CoreError::UnknownSearchMode(other.to_string())),
        }
    }
}

/// Half-open span of calendar days, `since` inclusive and `until` exclusive,
/// matching the platform's `since:`/`until:` search operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub since: NaiveDate,
    pub until: NaiveDate,
}

impl DateRange {
    /// # Errors
    ///
    /// Returns [`CoreError::EmptyDateRange`] unless `since < until`.
    pub fn new(since: NaiveDate, until: NaiveDate) -> Result<Self, CoreError> {
        if since >= until {
            return Err(CoreError::EmptyDateRange {
                since: since.to_string(),
                until: until.to_string(),
            });
        }
        Ok(Self { since, until })
    }

    /// Number of whole days covered.
    #[must_use]
    pub fn days(&self) -> u32 {
        u32::try_from((self.until - self.since).num_days()).unwrap_or(0)
    }

    /// Sub-range starting `offset` days after `since` and spanning `len` days.
    #[must_use]
    pub fn slice(&self, offset: u32, len: u32) -> DateRange {
        let since = self.since + Duration::days(i64::from(offset));
        DateRange {
            since,
            until: since + Duration::days(i64::from(len)),
        }
    }
}

impl std::fmt::Display for DateRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}..{}", self.since, self.until)
    }
}
