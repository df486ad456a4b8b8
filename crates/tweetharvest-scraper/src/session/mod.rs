//! Browser session boundary.
//!
//! The engine never talks to an automation driver directly: it opens a
//! [`BrowserSession`] per work-unit attempt through a [`SessionFactory`] and
//! pulls rendered fragments with [`BrowserSession::advance`].

mod browserless;

pub use browserless::{search_url, BrowserlessSessionFactory, BrowserlessSettings};

use async_trait::async_trait;

use crate::error::FetchError;
use crate::types::WorkUnit;

/// One chunk of rendered timeline content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFragment {
    /// Rendered HTML of the timeline region.
    pub html: String,
    /// 0-based index of this fragment within its session.
    pub position: u32,
}

/// Result of one successful `advance` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Advance {
    Fragment(RawFragment),
    EndOfResults,
}

/// Opaque platform credential (the session cookie). Never logged.
#[derive(Clone, Default)]
pub struct Credential(Option<String>);

impl Credential {
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        let token = token.into();
        if token.trim().is_empty() {
            Self(None)
        } else {
            Self(Some(token))
        }
    }

    #[must_use]
    pub fn anonymous() -> Self {
        Self(None)
    }

    /// The raw token, for adapters that must hand it to the browser.
    #[must_use]
    pub fn expose(&self) -> Option<&str> {
        self.0.as_deref()
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Credential")
            .field(&self.0.as_ref().map(|_| "[redacted]"))
            .finish()
    }
}

/// A live browser session bound to one work unit. Owned by exactly one worker.
#[async_trait]
pub trait BrowserSession: Send {
    /// Loads the next scroll increment and returns the newly rendered content.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError`]; [`FetchError::is_transient`] decides whether the
    /// worker backs off and retries or fails the attempt.
    async fn advance(&mut self) -> Result<Advance, FetchError>;

    /// Releases browser resources. Best effort; never fails.
    async fn close(&mut self);
}

/// Opens browser sessions for work units.
#[async_trait]
pub trait SessionFactory: Send + Sync {
    /// # Errors
    ///
    /// Returns [`FetchError`] if the session cannot be established.
    async fn open(
        &self,
        unit: &WorkUnit,
        credential: &Credential,
    ) -> Result<Box<dyn BrowserSession>, FetchError>;
}
