//! Low-level string helpers used by the timeline parser.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

static HASHTAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"#(\w+)").expect("static hashtag regex is valid"));

static MENTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"@(\w{1,15})").expect("static mention regex is valid"));

/// Parses an engagement count as rendered on the action bar.
///
/// Accepts plain digits with thousands separators (`"1,234"`), abbreviated
/// values (`"1.2K"`, `"3M"`), and aria labels that lead with the number
/// (`"12 Replies. Reply"`). An empty string means the button is present with
/// no count, i.e. zero.
#[must_use]
pub(crate) fn parse_count(raw: &str) -> Option<u64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Some(0);
    }

    let token = trimmed.split_whitespace().next()?;
    let (number, multiplier) = match token.chars().last()? {
        'K' | 'k' => (&token[..token.len() - 1], 1_000.0),
        'M' | 'm' => (&token[..token.len() - 1], 1_000_000.0),
        'B' | 'b' => (&token[..token.len() - 1], 1_000_000_000.0),
        _ => (token, 1.0),
    };

    let cleaned: String = number.chars().filter(|c| *c != ',').collect();
    if cleaned.is_empty() || !cleaned.chars().all(|c| c.is_ascii_digit() || c == '.') {
        return None;
    }

    let value: f64 = cleaned.parse().ok()?;
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let count = (value * multiplier).round() as u64;
    Some(count)
}

/// Collapses all whitespace runs (including newlines) to single spaces.
#[must_use]
pub(crate) fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Lowercased hashtags in order of first appearance, without `#`.
#[must_use]
pub(crate) fn extract_hashtags(text: &str) -> Vec<String> {
    dedupe(
        HASHTAG
            .captures_iter(text)
            .map(|c| c[1].to_lowercase()),
    )
}

/// Lowercased mentioned handles in order of first appearance, without `@`.
#[must_use]
pub(crate) fn extract_mentions(text: &str) -> Vec<String> {
    dedupe(
        MENTION
            .captures_iter(text)
            .map(|c| c[1].to_lowercase()),
    )
}

/// Drops repeated values while keeping first-seen order.
pub(crate) fn dedupe(values: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut seen = HashSet::new();
    values
        .into_iter()
        .filter(|v| seen.insert(v.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn count_plain_digits() {
        assert_eq!(parse_count("42"), Some(42));
    }

    #[test]
    fn count_thousands_separator() {
        assert_eq!(parse_count("1,234"), Some(1_234));
    }

    #[test]
    fn count_abbreviated_thousands() {
        assert_eq!(parse_count("1.2K"), Some(1_200));
    }

    #[test]
    fn count_abbreviated_millions() {
        assert_eq!(parse_count("3M"), Some(3_000_000));
    }

    #[test]
    fn count_from_aria_label() {
        assert_eq!(parse_count("12 Replies. Reply"), Some(12));
    }

    #[test]
    fn count_empty_means_zero() {
        assert_eq!(parse_count("  "), Some(0));
    }

    #[test]
    fn count_label_without_number_is_none() {
        assert_eq!(parse_count("Reply"), None);
    }

    #[test]
    fn whitespace_is_collapsed() {
        assert_eq!(normalize_whitespace("  a\n\nb \t c "), "a b c");
    }

    #[test]
    fn hashtags_are_lowercased_and_unique() {
        assert_eq!(
            extract_hashtags("#Rust is great, #rust and #Tokio"),
            vec!["rust".to_string(), "tokio".to_string()]
        );
    }

    #[test]
    fn mentions_are_lowercased_and_unique() {
        assert_eq!(
            extract_mentions("cc @Alice and @bob, thanks @alice"),
            vec!["alice".to_string(), "bob".to_string()]
        );
    }
}
