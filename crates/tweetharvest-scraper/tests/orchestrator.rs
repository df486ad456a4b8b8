//! End-to-end session scenarios against scripted in-memory browser sessions.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use tokio::sync::Notify;
use tweetharvest_core::{DateRange, Tweet};
use tweetharvest_scraper::{
    Advance, BrowserSession, Credential, EngineSettings, FetchError, MemorySink, Orchestrator,
    RawFragment, ScrapeError, ScrapeRequest, SessionFactory, SessionState, SinkError, TweetSink,
    UnitStatus, WorkUnit,
};

// ---------------------------------------------------------------------------
// Fakes
// ---------------------------------------------------------------------------

#[derive(Clone)]
enum Step {
    Page(String),
    /// Blocks until notified, then returns the page.
    Gated(Arc<Notify>, String),
    Slow(Duration, String),
    Transient,
    Permanent,
    End,
}

type Script = dyn Fn(usize, u32) -> Vec<Step> + Send + Sync;

struct ScriptedFactory {
    script: Box<Script>,
    opens: Mutex<HashMap<usize, u32>>,
    advances: Arc<AtomicUsize>,
    closes: Arc<AtomicUsize>,
}

impl ScriptedFactory {
    fn new(script: impl Fn(usize, u32) -> Vec<Step> + Send + Sync + 'static) -> Arc<Self> {
        Arc::new(Self {
            script: Box::new(script),
            opens: Mutex::new(HashMap::new()),
            advances: Arc::new(AtomicUsize::new(0)),
            closes: Arc::new(AtomicUsize::new(0)),
        })
    }

    fn opens_for(&self, unit: usize) -> u32 {
        self.opens.lock().unwrap().get(&unit).copied().unwrap_or(0)
    }
}

#[async_trait]
impl SessionFactory for ScriptedFactory {
    async fn open(
        &self,
        unit: &WorkUnit,
        _credential: &Credential,
    ) -> Result<Box<dyn BrowserSession>, FetchError> {
        let attempt = {
            let mut opens = self.opens.lock().unwrap();
            let n = opens.entry(unit.id).or_insert(0);
            *n += 1;
            *n
        };
        Ok(Box::new(ScriptedSession {
            steps: (self.script)(unit.id, attempt).into(),
            position: 0,
            advances: Arc::clone(&self.advances),
            closes: Arc::clone(&self.closes),
        }))
    }
}

struct ScriptedSession {
    steps: VecDeque<Step>,
    position: u32,
    advances: Arc<AtomicUsize>,
    closes: Arc<AtomicUsize>,
}

impl ScriptedSession {
    fn fragment(&mut self, html: String) -> Advance {
        let fragment = RawFragment {
            html,
            position: self.position,
        };
        self.position += 1;
        Advance::Fragment(fragment)
    }
}

#[async_trait]
impl BrowserSession for ScriptedSession {
    async fn advance(&mut self) -> Result<Advance, FetchError> {
        self.advances.fetch_add(1, Ordering::SeqCst);
        match self.steps.pop_front().unwrap_or(Step::End) {
            Step::Page(html) => Ok(self.fragment(html)),
            Step::Gated(gate, html) => {
                gate.notified().await;
                Ok(self.fragment(html))
            }
            Step::Slow(delay, html) => {
                tokio::time::sleep(delay).await;
                Ok(self.fragment(html))
            }
            Step::Transient => Err(FetchError::Timeout {
                url: "https://x.com/search".to_string(),
            }),
            Step::Permanent => Err(FetchError::UnexpectedStatus {
                status: 403,
                url: "https://x.com/search".to_string(),
            }),
            Step::End => Ok(Advance::EndOfResults),
        }
    }

    async fn close(&mut self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }
}

struct RejectingSink;

#[async_trait]
impl TweetSink for RejectingSink {
    async fn append(&self, tweet: &Tweet) -> Result<(), SinkError> {
        Err(SinkError::Rejected {
            id: tweet.id.clone(),
            reason: "read-only".to_string(),
        })
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn page(ids: &[&str]) -> String {
    let articles: String = ids
        .iter()
        .map(|id| {
            format!(
                r#"<article data-testid="tweet">
  <div data-testid="User-Name"><span>User {id}</span><span>@user{id}</span></div>
  <a href="/user{id}/status/{id}"><time datetime="2024-01-01T10:00:00Z">Jan 1</time></a>
  <div data-testid="tweetText"><span>tweet number {id}</span></div>
  <button data-testid="like"><span>{id}</span></button>
</article>"#
            )
        })
        .collect();
    format!(r#"<main><div data-testid="primaryColumn">{articles}</div></main>"#)
}

fn settings() -> EngineSettings {
    EngineSettings {
        max_parallelism: 8,
        max_advance_retries: 2,
        backoff_base_ms: 1,
        max_unit_attempts: 2,
        progress_window: Duration::from_secs(60),
        progress_interval: Duration::from_millis(5),
        sink_queue_capacity: 4,
    }
}

fn request(days: u64, parallelism: usize, target: u64) -> ScrapeRequest {
    let since = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
    let until = since + chrono::Days::new(days);
    ScrapeRequest::new("rust", DateRange::new(since, until).unwrap(), target, parallelism)
}

fn orchestrator(factory: Arc<ScriptedFactory>, sink: Arc<dyn TweetSink>) -> Orchestrator {
    Orchestrator::new(settings(), factory, sink, Credential::new("secret"))
}

fn ids(tweets: &[Tweet]) -> Vec<String> {
    tweets.iter().map(|t| t.id.clone()).collect()
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[tokio::test]
async fn overlapping_workers_deliver_each_tweet_once() {
    let factory = ScriptedFactory::new(|unit, _| {
        let a = format!("{}1", unit + 1);
        let b = format!("{}2", unit + 1);
        let c = format!("{}3", unit + 1);
        vec![
            Step::Page(page(&[&a, &b, "999"])),
            Step::Page(page(&[&b, &c])),
            Step::End,
        ]
    });
    let sink = Arc::new(MemorySink::new());
    let handle = orchestrator(factory, sink.clone())
        .start(request(4, 4, 1_000))
        .unwrap();
    let report = handle.wait().await.unwrap();

    let delivered = ids(&sink.tweets());
    let distinct: HashSet<_> = delivered.iter().cloned().collect();
    assert_eq!(delivered.len(), 13);
    assert_eq!(distinct.len(), 13);
    assert_eq!(report.snapshot.accepted, 13);
    assert_eq!(report.snapshot.duplicates, 7);
    assert_eq!(report.snapshot.state, SessionState::Completed);
    assert_eq!(report.tweets.len(), 13);
    assert!(report.units.iter().all(|u| u.status == UnitStatus::Exhausted));
}

#[tokio::test]
async fn replayed_fragment_yields_one_accept_and_one_duplicate() {
    let factory = ScriptedFactory::new(|_, _| {
        vec![Step::Page(page(&["42"])), Step::Page(page(&["42"])), Step::End]
    });
    let sink = Arc::new(MemorySink::new());
    let report = orchestrator(factory, sink.clone())
        .start(request(1, 1, 10))
        .unwrap()
        .wait()
        .await
        .unwrap();

    assert_eq!(sink.len(), 1);
    assert_eq!(report.snapshot.accepted, 1);
    assert_eq!(report.snapshot.duplicates, 1);
    assert_eq!(report.units[0].fragments, 2);
}

#[tokio::test]
async fn unrecognized_fragment_is_skipped_and_the_unit_keeps_going() {
    let factory = ScriptedFactory::new(|_, _| {
        vec![
            Step::Page(page(&["1"])),
            Step::Page(r#"<html><body><div data-testid="loginButton"></div></body></html>"#.to_string()),
            Step::Page(page(&["2"])),
            Step::End,
        ]
    });
    let sink = Arc::new(MemorySink::new());
    let report = orchestrator(factory.clone(), sink.clone())
        .start(request(1, 1, 10))
        .unwrap()
        .wait()
        .await
        .unwrap();

    let unit = &report.units[0];
    assert_eq!(unit.status, UnitStatus::Exhausted);
    assert_eq!(unit.fragments, 3);
    assert_eq!(unit.parse_errors, 1);
    assert_eq!(unit.attempts, 1);
    assert_eq!(report.snapshot.errors, 0);
    assert_eq!(report.snapshot.state, SessionState::Completed);
    assert_eq!(ids(&sink.tweets()), vec!["1", "2"]);
    assert_eq!(factory.opens_for(0), 1);
}

#[tokio::test]
async fn target_count_caps_acceptance_across_workers() {
    let factory = ScriptedFactory::new(|unit, _| {
        (0..50)
            .map(|page_no| {
                let ids: Vec<String> = (0..5).map(|i| format!("{unit}{page_no:03}{i}")).collect();
                let refs: Vec<&str> = ids.iter().map(String::as_str).collect();
                Step::Page(page(&refs))
            })
            .collect()
    });
    let sink = Arc::new(MemorySink::new());
    let report = orchestrator(factory.clone(), sink.clone())
        .start(request(3, 3, 7))
        .unwrap()
        .wait()
        .await
        .unwrap();

    assert_eq!(report.snapshot.accepted, 7);
    assert_eq!(sink.len(), 7);
    assert_eq!(report.snapshot.state, SessionState::Completed);
    assert!(report.units.iter().all(|u| u.status == UnitStatus::Cancelled));
    // Workers wound down long before their 50 pages were used up.
    assert!(factory.advances.load(Ordering::SeqCst) < 150);
}

#[tokio::test]
async fn one_failing_unit_out_of_four_is_a_partial_failure() {
    let factory = ScriptedFactory::new(|unit, _| {
        if unit == 2 {
            vec![Step::Permanent]
        } else {
            let id = format!("{}00", unit + 1);
            vec![Step::Page(page(&[&id])), Step::End]
        }
    });
    let sink = Arc::new(MemorySink::new());
    let report = orchestrator(factory.clone(), sink.clone())
        .start(request(4, 4, 100))
        .unwrap()
        .wait()
        .await
        .unwrap();

    assert_eq!(report.snapshot.units_succeeded, 3);
    assert_eq!(report.snapshot.units_failed, 1);
    assert_eq!(report.snapshot.errors, 2);
    assert_eq!(report.snapshot.state, SessionState::Completed);

    let mut delivered = ids(&sink.tweets());
    delivered.sort();
    assert_eq!(delivered, ["100", "200", "400"]);

    let failed = report.failed_units();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].unit_id, 2);
    assert_eq!(failed[0].attempts, 2);
    assert_eq!(factory.opens_for(2), 2);
    // Every opened session is closed again.
    assert_eq!(factory.closes.load(Ordering::SeqCst), 5);
}

#[tokio::test]
async fn transient_errors_are_retried_within_the_same_attempt() {
    let factory = ScriptedFactory::new(|_, _| {
        vec![
            Step::Transient,
            Step::Transient,
            Step::Page(page(&["7"])),
            Step::End,
        ]
    });
    let sink = Arc::new(MemorySink::new());
    let report = orchestrator(factory.clone(), sink.clone())
        .start(request(1, 1, 10))
        .unwrap()
        .wait()
        .await
        .unwrap();

    assert_eq!(sink.len(), 1);
    assert_eq!(report.snapshot.errors, 0);
    assert_eq!(report.units[0].attempts, 1);
    assert_eq!(factory.opens_for(0), 1);
}

#[tokio::test]
async fn exhausted_retries_fail_the_attempt_and_open_a_fresh_session() {
    let factory = ScriptedFactory::new(|_, attempt| {
        if attempt == 1 {
            vec![Step::Transient, Step::Transient, Step::Transient]
        } else {
            vec![Step::Page(page(&["8"])), Step::End]
        }
    });
    let sink = Arc::new(MemorySink::new());
    let report = orchestrator(factory.clone(), sink.clone())
        .start(request(1, 1, 10))
        .unwrap()
        .wait()
        .await
        .unwrap();

    assert_eq!(report.units[0].status, UnitStatus::Exhausted);
    assert_eq!(report.units[0].attempts, 2);
    assert_eq!(report.snapshot.errors, 1);
    assert_eq!(sink.len(), 1);
}

#[tokio::test]
async fn session_fails_only_when_every_unit_fails() {
    let factory = ScriptedFactory::new(|_, _| vec![Step::Permanent]);
    let sink = Arc::new(MemorySink::new());
    let handle = orchestrator(factory, sink)
        .start(request(2, 2, 10))
        .unwrap();
    let mut progress = handle.subscribe();

    match handle.wait().await {
        Err(ScrapeError::AllUnitsFailed { failures }) => {
            assert_eq!(failures.len(), 2);
            assert!(failures.iter().all(|f| f.attempts == 2));
        }
        other => panic!("expected AllUnitsFailed, got {other:?}"),
    }
    assert_eq!(progress.borrow_and_update().state, SessionState::Failed);
}

#[tokio::test]
async fn cancel_stops_new_advances_and_keeps_delivered_tweets() {
    let gate = Arc::new(Notify::new());
    let script_gate = Arc::clone(&gate);
    let factory = ScriptedFactory::new(move |_, _| {
        vec![
            Step::Page(page(&["1", "2"])),
            Step::Gated(Arc::clone(&script_gate), page(&["3"])),
            Step::Page(page(&["4"])),
            Step::Page(page(&["5"])),
            Step::End,
        ]
    });
    let sink = Arc::new(MemorySink::new());
    let orchestrator = orchestrator(factory.clone(), sink.clone());
    let handle = orchestrator.start(request(1, 1, 100)).unwrap();

    tokio::time::timeout(Duration::from_secs(5), async {
        while factory.advances.load(Ordering::SeqCst) < 2 {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    })
    .await
    .expect("second advance started");

    orchestrator.cancel(&handle);
    gate.notify_one();
    let report = handle.wait().await.unwrap();

    assert_eq!(factory.advances.load(Ordering::SeqCst), 2);
    assert_eq!(ids(&sink.tweets()), ["1", "2", "3"]);
    assert_eq!(report.snapshot.state, SessionState::Cancelled);
    assert_eq!(report.units[0].status, UnitStatus::Cancelled);
}

#[tokio::test]
async fn snapshots_never_go_backwards() {
    let factory = ScriptedFactory::new(|unit, _| {
        let mut steps: Vec<Step> = (0..10)
            .map(|n| {
                let fresh = format!("{unit}{n:02}");
                Step::Slow(Duration::from_millis(3), page(&[&fresh, "shared"]))
            })
            .collect();
        steps.push(Step::End);
        steps
    });
    let sink = Arc::new(MemorySink::new());
    let handle = orchestrator(factory, sink)
        .start(request(3, 3, 1_000))
        .unwrap();

    let mut rx = handle.subscribe();
    let collector = tokio::spawn(async move {
        let mut seen = vec![rx.borrow_and_update().clone()];
        while rx.changed().await.is_ok() {
            let snapshot = rx.borrow_and_update().clone();
            let done = snapshot.is_terminal();
            seen.push(snapshot);
            if done {
                break;
            }
        }
        seen
    });

    let mut polled = Vec::new();
    while !handle.is_finished() {
        polled.push(handle.progress());
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
    let report = handle.wait().await.unwrap();
    let pushed = collector.await.unwrap();

    for series in [&polled, &pushed] {
        for pair in series.windows(2) {
            assert!(pair[0].accepted <= pair[1].accepted);
            assert!(pair[0].duplicates <= pair[1].duplicates);
        }
    }
    let last = pushed.last().unwrap();
    assert!(last.is_terminal());
    assert_eq!(last.accepted, report.snapshot.accepted);
    assert_eq!(report.snapshot.accepted, 31);
}

#[tokio::test]
async fn sink_failures_are_counted_but_not_fatal() {
    let factory = ScriptedFactory::new(|_, _| vec![Step::Page(page(&["1", "2"])), Step::End]);
    let report = orchestrator(factory, Arc::new(RejectingSink))
        .start(request(1, 1, 10))
        .unwrap()
        .wait()
        .await
        .unwrap();

    assert_eq!(report.snapshot.accepted, 2);
    assert_eq!(report.snapshot.errors, 2);
    assert_eq!(report.tweets.len(), 2);
}

#[tokio::test]
async fn invalid_requests_are_rejected_before_spawning() {
    let factory = ScriptedFactory::new(|_, _| vec![Step::End]);
    let orchestrator = orchestrator(factory.clone(), Arc::new(MemorySink::new()));

    let err = orchestrator.start(request(3, 0, 10)).err().unwrap();
    assert!(matches!(err, ScrapeError::InvalidRequest(_)));
    let err = orchestrator.start(request(3, 1, 0)).err().unwrap();
    assert!(matches!(err, ScrapeError::InvalidRequest(_)));
    assert_eq!(factory.opens_for(0), 0);
}

#[tokio::test]
async fn later_observations_refresh_reported_counts() {
    let factory = ScriptedFactory::new(|_, _| {
        let first = page(&["5"]);
        let later = first.replace(r#"<span>5</span></button>"#, r#"<span>1.5K</span></button>"#);
        vec![Step::Page(first), Step::Page(later), Step::End]
    });
    let sink = Arc::new(MemorySink::new());
    let report = orchestrator(factory, sink.clone())
        .start(request(1, 1, 10))
        .unwrap()
        .wait()
        .await
        .unwrap();

    assert_eq!(sink.tweets()[0].like_count, Some(5));
    assert_eq!(report.tweets[0].like_count, Some(1_500));
}
