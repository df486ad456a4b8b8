//! Single delivery point between workers and the sink.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::mpsc;
use tweetharvest_core::Tweet;

use crate::fingerprint::Fingerprint;
use crate::progress::ProgressTracker;
use crate::sink::TweetSink;

/// Message from a worker to the delivery task.
#[derive(Debug)]
pub(crate) enum Delivery {
    /// First observation of a post. Already counted as accepted.
    Accepted {
        fingerprint: Fingerprint,
        tweet: Tweet,
    },
    /// A later observation of an accepted post, possibly with newer counts.
    Refreshed {
        fingerprint: Fingerprint,
        tweet: Tweet,
    },
}

/// What the delivery task hands back once the queue is closed.
#[derive(Debug)]
pub(crate) struct Drained {
    /// Accepted tweets in delivery order, with the latest observed counts.
    pub tweets: Vec<Tweet>,
    /// Held refreshes whose acceptance never arrived, e.g. because the
    /// session target was hit after the dedup insert. Dropped at drain.
    pub unmatched_refreshes: usize,
}

/// Drains the bounded queue until every worker has dropped its sender.
///
/// Each accepted tweet is appended to the sink exactly once. Refreshes only
/// update the counts kept for the final report; a refresh that overtakes its
/// own acceptance is held until the acceptance arrives.
pub(crate) async fn run_delivery(
    mut rx: mpsc::Receiver<Delivery>,
    sink: Arc<dyn TweetSink>,
    tracker: Arc<ProgressTracker>,
) -> Drained {
    let mut tweets: Vec<Tweet> = Vec::new();
    let mut index: HashMap<Fingerprint, usize> = HashMap::new();
    let mut early_refreshes: HashMap<Fingerprint, Tweet> = HashMap::new();

    while let Some(delivery) = rx.recv().await {
        match delivery {
            Delivery::Accepted {
                fingerprint,
                mut tweet,
            } => {
                if let Err(e) = sink.append(&tweet).await {
                    tracker.record_error();
                    tracing::warn!(id = %tweet.id, error = %e, "sink rejected tweet");
                }
                if let Some(newer) = early_refreshes.remove(&fingerprint) {
                    tweet.refresh_counts(&newer);
                }
                index.insert(fingerprint, tweets.len());
                tweets.push(tweet);
            }
            Delivery::Refreshed { fingerprint, tweet } => match index.get(&fingerprint) {
                Some(&i) => tweets[i].refresh_counts(&tweet),
                None => {
                    early_refreshes
                        .entry(fingerprint)
                        .and_modify(|held| held.refresh_counts(&tweet))
                        .or_insert(tweet);
                }
            },
        }
    }

    let unmatched_refreshes = early_refreshes.len();
    drop(early_refreshes);

    tracing::debug!(
        delivered = tweets.len(),
        unmatched_refreshes,
        "delivery queue drained"
    );
    Drained {
        tweets,
        unmatched_refreshes,
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::Utc;

    use super::*;
    use crate::sink::MemorySink;

    fn tweet(id: &str, likes: u64) -> Tweet {
        Tweet {
            id: id.to_string(),
            author_handle: "alice".to_string(),
            author_name: None,
            text: "hi".to_string(),
            timestamp: Utc::now(),
            reply_count: None,
            retweet_count: None,
            like_count: Some(likes),
            hashtags: vec![],
            mentions: vec![],
            media: vec![],
            url: String::new(),
        }
    }

    fn accepted(t: Tweet) -> Delivery {
        Delivery::Accepted {
            fingerprint: Fingerprint::of(&t),
            tweet: t,
        }
    }

    fn refreshed(t: Tweet) -> Delivery {
        Delivery::Refreshed {
            fingerprint: Fingerprint::of(&t),
            tweet: t,
        }
    }

    #[tokio::test]
    async fn sink_sees_first_observation_report_keeps_latest_counts() {
        let sink = Arc::new(MemorySink::new());
        let tracker = Arc::new(ProgressTracker::new(10, 1, Duration::from_secs(60)));
        let (tx, rx) = mpsc::channel(8);
        let task = tokio::spawn(run_delivery(rx, sink.clone(), tracker));

        tx.send(refreshed(tweet("2", 7))).await.unwrap();
        tx.send(accepted(tweet("1", 1))).await.unwrap();
        tx.send(refreshed(tweet("1", 5))).await.unwrap();
        tx.send(accepted(tweet("2", 3))).await.unwrap();
        drop(tx);

        let drained = task.await.unwrap();
        let tweets = drained.tweets;
        assert_eq!(drained.unmatched_refreshes, 0);
        assert_eq!(sink.len(), 2);
        assert_eq!(sink.tweets()[0].like_count, Some(1));
        assert_eq!(tweets[0].like_count, Some(5));
        assert_eq!(tweets[1].like_count, Some(7));
    }

    #[tokio::test]
    async fn refresh_without_acceptance_is_dropped_at_drain() {
        let sink = Arc::new(MemorySink::new());
        let tracker = Arc::new(ProgressTracker::new(10, 1, Duration::from_secs(60)));
        let (tx, rx) = mpsc::channel(8);
        let task = tokio::spawn(run_delivery(rx, sink.clone(), tracker));

        tx.send(accepted(tweet("1", 1))).await.unwrap();
        tx.send(refreshed(tweet("9", 4))).await.unwrap();
        tx.send(refreshed(tweet("9", 6))).await.unwrap();
        drop(tx);

        let drained = task.await.unwrap();
        assert_eq!(drained.unmatched_refreshes, 1);
        assert_eq!(drained.tweets.len(), 1);
        assert_eq!(drained.tweets[0].id, "1");
        assert_eq!(sink.len(), 1);
    }
}
