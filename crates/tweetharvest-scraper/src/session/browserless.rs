//! [`SessionFactory`] backed by a Browserless `/function` endpoint.
//!
//! Browserless renders are stateless, so a session is a cursor: the n-th
//! `advance` renders the search page, scrolls it `n` times and returns the
//! timeline region. End of results is an explicit empty-results marker, or
//! `stall_limit` renders in a row that show the same set of status ids.

use std::sync::{Arc, LazyLock};
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use reqwest::{Client, StatusCode, Url};
use serde_json::json;
use sha2::{Digest, Sha256};
use tweetharvest_core::{AppConfig, SearchMode};

use super::{Advance, BrowserSession, Credential, RawFragment, SessionFactory};
use crate::error::FetchError;
use crate::types::WorkUnit;

const SEARCH_ENDPOINT: &str = "https://x.com/search";
const COOKIE_DOMAIN: &str = ".x.com";
const WAIT_SELECTOR: &str = r#"article[data-testid="tweet"], [data-testid="emptyState"]"#;
const EMPTY_STATE_MARKER: &str = r#"data-testid="emptyState""#;

/// Slack on top of the in-browser budget before the HTTP call is abandoned.
const REQUEST_SLACK: Duration = Duration::from_secs(15);

const RENDER_SCRIPT: &str = r#"export default async function ({ page, context }) {
  if (context.userAgent) await page.setUserAgent(context.userAgent);
  if (context.cookie) await page.setCookie(context.cookie);
  await page.goto(context.url, { waitUntil: "domcontentloaded", timeout: context.timeoutMs });
  try {
    await page.waitForSelector(context.waitSelector, { timeout: context.timeoutMs });
  } catch (e) {}
  for (let i = 0; i < context.scrolls; i++) {
    await page.evaluate(() => window.scrollTo(0, document.body.scrollHeight));
    await new Promise((resolve) => setTimeout(resolve, context.scrollPauseMs));
  }
  const main = await page.$("main");
  const html = main ? await page.evaluate((el) => el.outerHTML, main) : await page.content();
  return { data: html, type: "text/html" };
}"#;

static STATUS_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/status/(\d+)").expect("static status id regex is valid"));

#[derive(Debug, Clone)]
pub struct BrowserlessSettings {
    pub base_url: String,
    pub token: Option<String>,
    /// Budget for navigation and the first timeline paint.
    pub render_timeout: Duration,
    /// Pause after each scroll so the next page can load.
    pub scroll_pause: Duration,
    /// Identical renders in a row before the timeline counts as exhausted.
    pub stall_limit: u32,
    pub user_agent: String,
    pub lang: Option<String>,
}

impl BrowserlessSettings {
    #[must_use]
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            base_url: config.browserless_url.clone(),
            token: config.browserless_token.clone(),
            render_timeout: Duration::from_secs(config.render_timeout_secs),
            scroll_pause: Duration::from_millis(config.scroll_pause_ms),
            stall_limit: config.stall_limit.max(1),
            user_agent: config.user_agent.clone(),
            lang: config.lang.clone(),
        }
    }
}

pub struct BrowserlessSessionFactory {
    client: Client,
    endpoint: Url,
    settings: Arc<BrowserlessSettings>,
}

impl BrowserlessSessionFactory {
    /// # Errors
    ///
    /// Returns [`FetchError::InvalidEndpoint`] if `base_url` is not an
    /// absolute URL, or [`FetchError::Http`] if the HTTP client cannot be
    /// built.
    pub fn new(settings: BrowserlessSettings) -> Result<Self, FetchError> {
        let raw = format!("{}/function", settings.base_url.trim_end_matches('/'));
        let mut endpoint = Url::parse(&raw).map_err(|e| FetchError::InvalidEndpoint {
            url: settings.base_url.clone(),
            reason: e.to_string(),
        })?;
        if let Some(token) = &settings.token {
            endpoint.query_pairs_mut().append_pair("token", token);
        }

        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            client,
            endpoint,
            settings: Arc::new(settings),
        })
    }
}

#[async_trait]
impl SessionFactory for BrowserlessSessionFactory {
    async fn open(
        &self,
        unit: &WorkUnit,
        credential: &Credential,
    ) -> Result<Box<dyn BrowserSession>, FetchError> {
        let search_url = search_url(unit, self.settings.lang.as_deref())?;
        tracing::debug!(unit = unit.id, url = %search_url, "opening browserless session");
        Ok(Box::new(BrowserlessSession {
            client: self.client.clone(),
            endpoint: self.endpoint.clone(),
            settings: Arc::clone(&self.settings),
            search_url,
            cookie: credential.expose().map(str::to_owned),
            position: 0,
            last_digest: None,
            unchanged: 0,
        }))
    }
}

/// Builds the search page URL for `unit`, e.g.
/// `https://x.com/search?q=rust+until%3A2024-05-02+since%3A2024-05-01&src=typed_query&f=live`.
///
/// # Errors
///
/// Returns [`FetchError::InvalidEndpoint`] if the URL cannot be constructed.
pub fn search_url(unit: &WorkUnit, lang: Option<&str>) -> Result<String, FetchError> {
    let mut query = format!(
        "{} until:{} since:{}",
        unit.query.trim(),
        unit.range.until,
        unit.range.since
    );
    if let Some(lang) = lang.filter(|l| !l.trim().is_empty()) {
        query.push_str(" lang:");
        query.push_str(lang.trim());
    }

    let mut url = Url::parse(SEARCH_ENDPOINT).map_err(|e| FetchError::InvalidEndpoint {
        url: SEARCH_ENDPOINT.to_string(),
        reason: e.to_string(),
    })?;
    {
        let mut pairs = url.query_pairs_mut();
        pairs.append_pair("q", &query).append_pair("src", "typed_query");
        if unit.mode == SearchMode::Recency {
            pairs.append_pair("f", "live");
        }
    }
    Ok(url.to_string())
}

struct BrowserlessSession {
    client: Client,
    endpoint: Url,
    settings: Arc<BrowserlessSettings>,
    search_url: String,
    cookie: Option<String>,
    position: u32,
    last_digest: Option<[u8; 32]>,
    unchanged: u32,
}

impl BrowserlessSession {
    async fn render(&self, scrolls: u32) -> Result<String, FetchError> {
        let settings = &self.settings;
        let cookie = self.cookie.as_deref().map(|value| {
            json!({ "name": "auth_token", "value": value, "domain": COOKIE_DOMAIN, "path": "/" })
        });
        let body = json!({
            "code": RENDER_SCRIPT,
            "context": {
                "url": self.search_url,
                "cookie": cookie,
                "scrolls": scrolls,
                "scrollPauseMs": u64::try_from(settings.scroll_pause.as_millis()).unwrap_or(u64::MAX),
                "waitSelector": WAIT_SELECTOR,
                "timeoutMs": u64::try_from(settings.render_timeout.as_millis()).unwrap_or(u64::MAX),
                "userAgent": settings.user_agent,
            }
        });
        let budget = settings.render_timeout + settings.scroll_pause * scrolls + REQUEST_SLACK;

        let response = self
            .client
            .post(self.endpoint.clone())
            .timeout(budget)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after_secs = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.trim().parse::<u64>().ok())
                .unwrap_or(60);
            return Err(FetchError::RateLimited {
                domain: self.endpoint.host_str().unwrap_or_default().to_string(),
                retry_after_secs,
            });
        }
        if status == StatusCode::REQUEST_TIMEOUT || status == StatusCode::GATEWAY_TIMEOUT {
            return Err(FetchError::Timeout {
                url: self.search_url.clone(),
            });
        }
        if !status.is_success() {
            return Err(FetchError::UnexpectedStatus {
                status: status.as_u16(),
                url: self.search_url.clone(),
            });
        }

        response.text().await.map_err(|e| self.classify(e))
    }

    fn classify(&self, err: reqwest::Error) -> FetchError {
        if err.is_timeout() {
            FetchError::Timeout {
                url: self.search_url.clone(),
            }
        } else {
            FetchError::Http(err)
        }
    }
}

/// Digest of the status ids visible in a render, in order.
fn timeline_digest(html: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    for caps in STATUS_ID_RE.captures_iter(html) {
        hasher.update(caps[1].as_bytes());
        hasher.update(b",");
    }
    hasher.finalize().into()
}

#[async_trait]
impl BrowserSession for BrowserlessSession {
    async fn advance(&mut self) -> Result<Advance, FetchError> {
        let html = self.render(self.position).await?;

        if html.contains(EMPTY_STATE_MARKER) {
            return Ok(Advance::EndOfResults);
        }

        let digest = timeline_digest(&html);
        if self.last_digest == Some(digest) {
            self.unchanged += 1;
            if self.unchanged >= self.settings.stall_limit {
                tracing::debug!(
                    url = %self.search_url,
                    position = self.position,
                    "timeline stopped changing"
                );
                return Ok(Advance::EndOfResults);
            }
        } else {
            self.unchanged = 0;
            self.last_digest = Some(digest);
        }

        let fragment = RawFragment {
            html,
            position: self.position,
        };
        self.position += 1;
        Ok(Advance::Fragment(fragment))
    }

    async fn close(&mut self) {
        tracing::debug!(url = %self.search_url, renders = self.position, "closing browserless session");
    }
}
