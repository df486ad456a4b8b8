//! Scrape orchestration, timeline parsing and deduplication for tweetharvest.

pub mod dedup;
pub mod error;
pub mod fingerprint;
pub mod orchestrator;
pub mod parse;
pub(crate) mod parse_helpers;
pub mod progress;
pub mod rate_limit;
pub mod session;
pub mod sink;
pub mod types;

pub use dedup::Deduplicator;
pub use error::{FetchError, ParseError, ScrapeError, SinkError, WorkUnitFailure};
pub use fingerprint::Fingerprint;
pub use orchestrator::{EngineSettings, Orchestrator, ScrapeHandle};
pub use parse::parse_fragment;
pub use progress::{format_duration, ProgressSnapshot, ProgressTracker, SessionState};
pub use session::{
    Advance, BrowserSession, BrowserlessSessionFactory, BrowserlessSettings, Credential,
    RawFragment, SessionFactory,
};
pub use sink::{MemorySink, TweetSink};
pub use types::{ScrapeReport, ScrapeRequest, UnitOutcome, UnitStatus, WorkUnit};
