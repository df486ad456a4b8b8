//! Human-readable progress and end-of-run output.

use tweetharvest_analysis::{
    detect_trends, summarize_sentiment, Lexicon, SentimentLabel, TrendReport,
};
use tweetharvest_core::Tweet;
use tweetharvest_scraper::{format_duration, ProgressSnapshot, ScrapeReport, UnitStatus};

pub(crate) fn progress_line(snapshot: &ProgressSnapshot) -> String {
    let eta = snapshot
        .eta
        .map_or_else(|| "unknown".to_string(), format_duration);
    format!(
        "[{}] {}/{} collected | {} duplicates | {} errors | {} workers | {:.1}/min | ETA {} | elapsed {}",
        snapshot.state,
        snapshot.accepted,
        snapshot.target,
        snapshot.duplicates,
        snapshot.errors,
        snapshot.workers_active,
        snapshot.rate_per_minute,
        eta,
        format_duration(snapshot.elapsed),
    )
}

pub(crate) fn print_report(report: &ScrapeReport, lexicon: &Lexicon) {
    let snapshot = &report.snapshot;
    println!(
        "session {} {}: {} tweets, {} duplicates skipped, {}/{} units succeeded",
        report.session_id,
        snapshot.state,
        snapshot.accepted,
        snapshot.duplicates,
        snapshot.units_succeeded,
        snapshot.units_total,
    );
    for outcome in &report.units {
        let status = match &outcome.status {
            UnitStatus::Exhausted => "exhausted".to_string(),
            UnitStatus::Cancelled => "stopped".to_string(),
            UnitStatus::Failed(failure) => format!("failed: {}", failure.reason),
        };
        println!(
            "  unit {} {}: {} accepted, {} pages, {} attempts, {status}",
            outcome.unit.id,
            outcome.unit.range,
            outcome.accepted,
            outcome.fragments,
            outcome.attempts,
        );
    }
    print_analysis(&report.tweets, lexicon);
}

pub(crate) fn print_analysis(tweets: &[Tweet], lexicon: &Lexicon) {
    if tweets.is_empty() {
        println!("no tweets to analyse");
        return;
    }

    let sentiment = summarize_sentiment(tweets, lexicon);
    println!(
        "sentiment: {:.1}% positive, {:.1}% negative, {:.1}% neutral (average {:+.2})",
        sentiment.percentage(SentimentLabel::Positive),
        sentiment.percentage(SentimentLabel::Negative),
        sentiment.percentage(SentimentLabel::Neutral),
        sentiment.average_score,
    );

    let trends = detect_trends(tweets);
    print_trends(&trends);
}

fn print_trends(trends: &TrendReport) {
    print_ranked("top hashtags", "#", &trends.top_hashtags);
    print_ranked("top mentions", "@", &trends.top_mentions);
    print_ranked("top keywords", "", &trends.top_keywords);
    if let Some(spike) = &trends.spike {
        if spike.has_spike {
            println!(
                "volume spike: {} tweets in the hour from {} (threshold {:.1})",
                spike.peak_count, spike.peak_time, spike.threshold
            );
        }
    }
}

fn print_ranked(title: &str, prefix: &str, ranked: &[(String, usize)]) {
    if ranked.is_empty() {
        return;
    }
    let items: Vec<String> = ranked
        .iter()
        .map(|(value, count)| format!("{prefix}{value} ({count})"))
        .collect();
    println!("{title}: {}", items.join(", "));
}
