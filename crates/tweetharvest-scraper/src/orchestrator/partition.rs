//! Request validation and date-range partitioning.

use chrono::{Days, NaiveDate};

use crate::error::ScrapeError;
use crate::types::{ScrapeRequest, WorkUnit};

use super::EngineSettings;

/// First day with public posts on the platform.
fn platform_start() -> NaiveDate {
    NaiveDate::from_ymd_opt(2006, 3, 21).unwrap_or(NaiveDate::MIN)
}

/// Checks a request before any work is spawned. `today` is the current UTC
/// date; search results can extend to the end of it, so `until` may be
/// tomorrow at the latest.
pub(crate) fn validate_request(
    request: &ScrapeRequest,
    settings: &EngineSettings,
    today: NaiveDate,
) -> Result<(), ScrapeError> {
    let invalid = |msg: String| Err(ScrapeError::InvalidRequest(msg));

    if request.query.trim().is_empty() {
        return invalid("query must not be empty".to_string());
    }
    if request.target == 0 {
        return invalid("target count must be greater than zero".to_string());
    }
    if request.parallelism == 0 || request.parallelism > settings.max_parallelism {
        return invalid(format!(
            "parallelism {} outside 1..={}",
            request.parallelism, settings.max_parallelism
        ));
    }

    let range = request.range;
    if range.since >= range.until {
        return invalid(format!("date range {range} is empty"));
    }
    let first_day = platform_start();
    if range.since < first_day {
        return invalid(format!("since {} is before {first_day}", range.since));
    }
    let horizon = today.checked_add_days(Days::new(1)).unwrap_or(today);
    if range.until > horizon {
        return invalid(format!(
            "until {} is beyond the data horizon {horizon}",
            range.until
        ));
    }

    if let Some(hints) = &request.density_hints {
        let days = range.days() as usize;
        if hints.len() != days {
            return invalid(format!(
                "expected {days} density hints (one per day), got {}",
                hints.len()
            ));
        }
        if hints.iter().any(|h| !h.is_finite() || *h < 0.0) {
            return invalid("density hints must be finite and non-negative".to_string());
        }
        if hints.iter().sum::<f64>() <= 0.0 {
            return invalid("density hints must not all be zero".to_string());
        }
    }

    Ok(())
}

/// Splits the request into `min(parallelism, days)` whole-day units.
///
/// Without hints every unit spans the same number of days, the first units
/// taking one extra day when the split is uneven. With hints each unit covers
/// roughly the same cumulative density, so dense stretches get narrow units.
/// Assumes the request passed [`validate_request`].
pub(crate) fn partition(request: &ScrapeRequest) -> Vec<WorkUnit> {
    let days = request.range.days();
    let count = u32::try_from(request.parallelism)
        .unwrap_or(u32::MAX)
        .min(days)
        .max(1);

    let spans = match &request.density_hints {
        Some(hints) => weighted_spans(hints, count),
        None => even_spans(days, count),
    };
    let unit_target = request.target.div_ceil(u64::from(count));

    let mut offset = 0;
    spans
        .into_iter()
        .enumerate()
        .map(|(id, len)| {
            let unit = WorkUnit {
                id,
                query: request.query.trim().to_string(),
                mode: request.mode,
                range: request.range.slice(offset, len),
                target: unit_target,
            };
            offset += len;
            unit
        })
        .collect()
}

fn even_spans(days: u32, count: u32) -> Vec<u32> {
    let base = days / count;
    let extra = days % count;
    (0..count).map(|i| base + u32::from(i < extra)).collect()
}

#[allow(clippy::cast_precision_loss)]
fn weighted_spans(hints: &[f64], count: u32) -> Vec<u32> {
    let days = hints.len();
    let count = count as usize;
    let total: f64 = hints.iter().sum();

    let mut spans = Vec::with_capacity(count);
    let mut start = 0usize;
    let mut cumulative = 0.0;
    for k in 0..count {
        let units_left = count - k;
        if units_left == 1 {
            spans.push(days - start);
            break;
        }
        let boundary = total * (k + 1) as f64 / count as f64;
        // Each later unit needs at least one day.
        let max_end = days - (units_left - 1);

        let mut end = start + 1;
        cumulative += hints[start];
        while end < max_end && cumulative + hints[end] / 2.0 < boundary {
            cumulative += hints[end];
            end += 1;
        }
        spans.push(end - start);
        start = end;
    }

    spans
        .into_iter()
        .map(|len| u32::try_from(len).unwrap_or(u32::MAX))
        .collect()
}
