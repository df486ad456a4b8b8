//! Append-only destination for accepted tweets.

use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use tweetharvest_core::Tweet;

use crate::error::SinkError;

/// Receives each accepted tweet once per session.
///
/// `Ok` means the record was accepted for eventual persistence, not that it
/// has been flushed. Implementations must tolerate concurrent calls.
#[async_trait]
pub trait TweetSink: Send + Sync {
    /// # Errors
    ///
    /// Returns [`SinkError`] if the record could not be accepted.
    async fn append(&self, tweet: &Tweet) -> Result<(), SinkError>;
}

/// In-memory sink, mostly for tests and embedding callers.
#[derive(Debug, Default)]
pub struct MemorySink {
    tweets: Mutex<Vec<Tweet>>,
}

impl MemorySink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of everything appended so far, in append order.
    #[must_use]
    pub fn tweets(&self) -> Vec<Tweet> {
        self.tweets
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tweets.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl TweetSink for MemorySink {
    async fn append(&self, tweet: &Tweet) -> Result<(), SinkError> {
        self.tweets
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(tweet.clone());
        Ok(())
    }
}
