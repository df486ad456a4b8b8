//! Session-wide novelty arbiter.

use std::collections::HashSet;
use std::sync::{Mutex, PoisonError};

use tweetharvest_core::Tweet;

use crate::fingerprint::Fingerprint;

/// Set of fingerprints accepted so far in one session.
///
/// `accept` is the only mutual-exclusion point between workers. Fingerprints
/// are hashed before the lock is taken, so the critical section is a single
/// `HashSet::insert`.
#[derive(Debug, Default)]
pub struct Deduplicator {
    seen: Mutex<HashSet<Fingerprint>>,
}

impl Deduplicator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` exactly once per distinct fingerprint, however many
    /// callers race on it.
    pub fn accept(&self, tweet: &Tweet) -> bool {
        self.accept_fingerprint(Fingerprint::of(tweet))
    }

    pub fn accept_fingerprint(&self, fingerprint: Fingerprint) -> bool {
        self.seen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(fingerprint)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.seen.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
