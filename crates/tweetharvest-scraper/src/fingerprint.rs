//! Stable duplicate-detection keys for tweets.

use sha2::{Digest, Sha256};
use tweetharvest_core::Tweet;

use crate::parse_helpers::normalize_whitespace;

/// Width of the timestamp bucket used by the fallback key.
const FALLBACK_BUCKET_SECS: i64 = 3600;

/// SHA-256 key identifying one logical post.
///
/// Derived from the platform status id when it is well formed. Degraded
/// parses without a usable id fall back to author handle, normalized text and
/// the hour the post was made in, so engagement counts never affect the key.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    #[must_use]
    pub fn of(tweet: &Tweet) -> Self {
        let mut hasher = Sha256::new();
        if tweet.has_platform_id() {
            hasher.update(b"id\0");
            hasher.update(tweet.id.as_bytes());
        } else {
            let bucket = tweet.timestamp.timestamp().div_euclid(FALLBACK_BUCKET_SECS);
            hasher.update(b"fallback\0");
            hasher.update(tweet.author_handle.to_lowercase().as_bytes());
            hasher.update(b"\0");
            hasher.update(normalize_whitespace(&tweet.text).to_lowercase().as_bytes());
            hasher.update(b"\0");
            hasher.update(bucket.to_be_bytes());
        }
        Self(hasher.finalize().into())
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let hex = self.to_string();
        write!(f, "Fingerprint({})", &hex[..12])
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;

    fn tweet(id: &str, handle: &str, text: &str, secs: i64) -> Tweet {
        Tweet {
            id: id.to_string(),
            author_handle: handle.to_string(),
            author_name: None,
            text: text.to_string(),
            timestamp: Utc.timestamp_opt(secs, 0).unwrap(),
            reply_count: Some(1),
            retweet_count: None,
            like_count: Some(2),
            hashtags: vec![],
            mentions: vec![],
            media: vec![],
            url: String::new(),
        }
    }

    #[test]
    fn id_key_ignores_counts_and_text() {
        let a = tweet("1790000000000000001", "alice", "hello", 1_700_000_000);
        let mut b = tweet("1790000000000000001", "alice", "hello (edited)", 1_700_000_000);
        b.like_count = Some(999);
        assert_eq!(Fingerprint::of(&a), Fingerprint::of(&b));
    }

    #[test]
    fn distinct_ids_differ() {
        let a = tweet("1", "alice", "hello", 1_700_000_000);
        let b = tweet("2", "alice", "hello", 1_700_000_000);
        assert_ne!(Fingerprint::of(&a), Fingerprint::of(&b));
    }

    #[test]
    fn fallback_normalizes_case_and_whitespace() {
        let a = tweet("", "Alice", "Hello   world", 1_700_000_000);
        let b = tweet("", "alice", "hello world\n", 1_700_000_100);
        assert_eq!(Fingerprint::of(&a), Fingerprint::of(&b));
    }

    #[test]
    fn fallback_separates_hour_buckets() {
        let a = tweet("", "alice", "hello", 1_699_999_200);
        let b = tweet("", "alice", "hello", 1_699_999_200 + 3600);
        assert_ne!(Fingerprint::of(&a), Fingerprint::of(&b));
    }

    #[test]
    fn malformed_id_uses_fallback() {
        let a = tweet("abc", "alice", "hello", 1_700_000_000);
        let b = tweet("xyz", "alice", "hello", 1_700_000_000);
        assert_eq!(Fingerprint::of(&a), Fingerprint::of(&b));
    }

    #[test]
    fn display_is_lowercase_hex() {
        let fp = Fingerprint::of(&tweet("1", "a", "b", 0));
        let hex = fp.to_string();
        assert_eq!(hex.len(), 64);
        assert!(hex.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }
}
