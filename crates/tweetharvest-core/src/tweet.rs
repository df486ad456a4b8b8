use std::hash::{Hash, Hasher};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single post collected from the search timeline.
///
/// Equality and hashing consider only `id`: two observations of the same post
/// with different engagement counts are the same logical tweet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tweet {
    /// Platform-assigned status id, e.g. `"1790000000000000000"`.
    pub id: String,
    /// Author handle without the leading `@`.
    pub author_handle: String,
    pub author_name: Option<String>,
    pub text: String,
    /// Post time, always UTC.
    pub timestamp: DateTime<Utc>,
    pub reply_count: Option<u64>,
    pub retweet_count: Option<u64>,
    pub like_count: Option<u64>,
    /// Lowercased hashtags without the leading `#`.
    pub hashtags: Vec<String>,
    /// Lowercased handles mentioned in the text, without the leading `@`.
    pub mentions: Vec<String>,
    /// Image and video poster URLs attached to the post.
    pub media: Vec<String>,
    /// Canonical status URL, e.g. `"https://x.com/user/status/123"`.
    pub url: String,
}

impl Tweet {
    /// Returns `true` when `id` looks like a platform status id (ASCII digits).
    #[must_use]
    pub fn has_platform_id(&self) -> bool {
        !self.id.is_empty() && self.id.bytes().all(|b| b.is_ascii_digit())
    }

    /// Overwrites engagement counts with those from a later observation of
    /// the same post. Counts missing from `newer` keep their current value.
    pub fn refresh_counts(&mut self, newer: &Tweet) {
        if newer.reply_count.is_some() {
            self.reply_count = newer.reply_count;
        }
        if newer.retweet_count.is_some() {
            self.retweet_count = newer.retweet_count;
        }
        if newer.like_count.is_some() {
            self.like_count = newer.like_count;
        }
    }
}

impl PartialEq for Tweet {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Tweet {}

impl Hash for Tweet {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn tweet(id: &str, likes: Option<u64>) -> Tweet {
        Tweet {
            id: id.to_string(),
            author_handle: "someone".to_string(),
            author_name: Some("Some One".to_string()),
            text: "hello world".to_string(),
            timestamp: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
            reply_count: Some(1),
            retweet_count: None,
            like_count: likes,
            hashtags: vec![],
            mentions: vec![],
            media: vec![],
            url: format!("https://x.com/someone/status/{id}"),
        }
    }

    #[test]
    fn equality_ignores_counts() {
        assert_eq!(tweet("42", Some(1)), tweet("42", Some(900)));
        assert_ne!(tweet("42", Some(1)), tweet("43", Some(1)));
    }

    #[test]
    fn platform_id_requires_digits() {
        assert!(tweet("1790000000000000000", None).has_platform_id());
        assert!(!tweet("analytics", None).has_platform_id());
        assert!(!tweet("", None).has_platform_id());
    }

    #[test]
    fn refresh_counts_keeps_known_values_when_newer_is_missing() {
        let mut first = tweet("7", Some(10));
        let mut newer = tweet("7", Some(25));
        newer.reply_count = None;
        newer.retweet_count = Some(3);
        first.refresh_counts(&newer);
        assert_eq!(first.like_count, Some(25));
        assert_eq!(first.reply_count, Some(1));
        assert_eq!(first.retweet_count, Some(3));
    }

    #[test]
    fn serializes_timestamp_as_rfc3339_utc() {
        let json = serde_json::to_value(tweet("1", None)).unwrap();
        assert_eq!(json["timestamp"], "2024-05-01T12:00:00Z");
    }
}
