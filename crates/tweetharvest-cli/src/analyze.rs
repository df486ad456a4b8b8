//! `tweetharvest analyze`: summary of a previously collected file.

use std::path::Path;

use anyhow::Context;
use tweetharvest_analysis::Lexicon;
use tweetharvest_core::Tweet;

use crate::summary::print_analysis;

pub(crate) async fn run_analyze(input: &Path, lexicon: Option<&Path>) -> anyhow::Result<()> {
    let lexicon = match lexicon {
        Some(path) => Lexicon::load(path)?,
        None => Lexicon::builtin(),
    };
    let content = tokio::fs::read_to_string(input)
        .await
        .with_context(|| format!("failed to read {}", input.display()))?;
    let tweets = parse_json_lines(&content)?;
    println!("{} tweets in {}", tweets.len(), input.display());
    print_analysis(&tweets, &lexicon);
    Ok(())
}

/// Parses one tweet per non-blank line.
fn parse_json_lines(content: &str) -> anyhow::Result<Vec<Tweet>> {
    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(idx, line)| {
            serde_json::from_str(line).with_context(|| format!("invalid tweet on line {}", idx + 1))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const LINE: &str = r#"{"id":"1","author_handle":"a","author_name":null,"text":"great","timestamp":"2024-05-01T00:00:00Z","reply_count":null,"retweet_count":null,"like_count":3,"hashtags":[],"mentions":[],"media":[],"url":"https://x.com/a/status/1"}"#;

    #[test]
    fn parses_lines_and_skips_blanks() {
        let content = format!("{LINE}\n\n{}\n", LINE.replace(r#""id":"1""#, r#""id":"2""#));
        let tweets = parse_json_lines(&content).unwrap();
        assert_eq!(tweets.len(), 2);
        assert_eq!(tweets[1].id, "2");
    }

    #[test]
    fn reports_the_bad_line_number() {
        let content = format!("{LINE}\nnot json\n");
        let err = parse_json_lines(&content).unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }
}
