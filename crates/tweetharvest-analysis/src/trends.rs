//! Hashtag, mention and keyword frequency plus volume-spike detection.

use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

use chrono::{DateTime, TimeZone, Utc};
use regex::Regex;
use serde::Serialize;
use tweetharvest_core::Tweet;

const TOP_TAGS: usize = 10;
const TOP_KEYWORDS: usize = 20;
const MIN_KEYWORD_LEN: usize = 4;
const SPIKE_WINDOW_SECS: i64 = 3600;

// Only used to strip tags from keyword text; tag counts come from the
// parsed `Tweet::hashtags` and `Tweet::mentions`.
static HASHTAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"#\w+").expect("static hashtag regex is valid"));
static MENTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"@\w+").expect("static mention regex is valid"));
static URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"https?\S+|www\S+").expect("static URL regex is valid"));
static WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\w+\b").expect("static word regex is valid"));

static STOPWORDS: LazyLock<HashSet<&'static str>> = LazyLock::new(|| {
    [
        "yang", "dan", "di", "ke", "dari", "untuk", "pada", "dengan", "ini", "itu", "tidak",
        "juga", "sudah", "akan", "bisa", "ada", "karena", "tapi", "atau", "saja", "lagi",
        "the", "is", "are", "was", "were", "be", "been", "being", "have", "has", "had", "do",
        "does", "did", "will", "would", "could", "should", "may", "might", "can", "a", "an",
        "in", "on", "at", "to", "for", "of", "with", "this", "that", "from", "they", "there",
        "their", "what", "when", "just", "about", "your", "like",
    ]
    .into_iter()
    .collect()
});

/// Hourly volume peak.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpikeInfo {
    pub has_spike: bool,
    /// Start of the busiest hour.
    pub peak_time: DateTime<Utc>,
    pub peak_count: usize,
    pub average_count: f64,
    pub threshold: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendReport {
    pub top_hashtags: Vec<(String, usize)>,
    pub top_mentions: Vec<(String, usize)>,
    pub top_keywords: Vec<(String, usize)>,
    /// `None` when there are no tweets.
    pub spike: Option<SpikeInfo>,
}

#[must_use]
pub fn detect_trends(tweets: &[Tweet]) -> TrendReport {
    TrendReport {
        top_hashtags: top_n(tweets.iter().flat_map(|t| t.hashtags.iter().cloned()), TOP_TAGS),
        top_mentions: top_n(tweets.iter().flat_map(|t| t.mentions.iter().cloned()), TOP_TAGS),
        top_keywords: top_n(tweets.iter().flat_map(|t| keywords(&t.text)), TOP_KEYWORDS),
        spike: detect_spike(tweets),
    }
}

/// Lowercased words of at least four characters that are not stopwords,
/// after URLs, hashtags and mentions are removed.
#[must_use]
pub fn keywords(text: &str) -> Vec<String> {
    let stripped = URL.replace_all(text, "");
    let stripped = HASHTAG.replace_all(&stripped, "");
    let stripped = MENTION.replace_all(&stripped, "").to_lowercase();
    WORD.find_iter(&stripped)
        .map(|m| m.as_str())
        .filter(|w| w.chars().count() >= MIN_KEYWORD_LEN && !STOPWORDS.contains(w))
        .map(str::to_string)
        .collect()
}

/// Most frequent values, ties broken by first appearance.
fn top_n(values: impl IntoIterator<Item = String>, n: usize) -> Vec<(String, usize)> {
    let mut counts: HashMap<String, (usize, usize)> = HashMap::new();
    for (order, value) in values.into_iter().enumerate() {
        counts.entry(value).or_insert((0, order)).0 += 1;
    }
    let mut ranked: Vec<(String, (usize, usize))> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1 .0.cmp(&a.1 .0).then(a.1 .1.cmp(&b.1 .1)));
    ranked
        .into_iter()
        .take(n)
        .map(|(value, (count, _))| (value, count))
        .collect()
}

/// Flags the busiest hour when it exceeds the mean hourly volume by two
/// standard deviations (or by half the mean when all hours are equal).
#[allow(clippy::cast_precision_loss)]
fn detect_spike(tweets: &[Tweet]) -> Option<SpikeInfo> {
    let mut windows: HashMap<i64, usize> = HashMap::new();
    for tweet in tweets {
        *windows
            .entry(tweet.timestamp.timestamp().div_euclid(SPIKE_WINDOW_SECS))
            .or_insert(0) += 1;
    }

    let (&peak_window, &peak_count) = windows
        .iter()
        .max_by(|a, b| a.1.cmp(b.1).then(b.0.cmp(a.0)))?;

    let n = windows.len() as f64;
    let mean = windows.values().sum::<usize>() as f64 / n;
    // Sample standard deviation, zero for a single window.
    let std = if windows.len() > 1 {
        let var = windows
            .values()
            .map(|&c| (c as f64 - mean).powi(2))
            .sum::<f64>()
            / (n - 1.0);
        var.sqrt()
    } else {
        0.0
    };
    let threshold = if std > 0.0 { mean + 2.0 * std } else { mean * 1.5 };

    Some(SpikeInfo {
        has_spike: peak_count as f64 > threshold,
        peak_time: Utc
            .timestamp_opt(peak_window * SPIKE_WINDOW_SECS, 0)
            .single()
            .unwrap_or_default(),
        peak_count,
        average_count: mean,
        threshold,
    })
}
