//! Extraction of [`Tweet`] records from rendered search-timeline HTML.
//!
//! The field mapping follows the `data-testid` attributes of the x.com web
//! client. Every function here is pure and safe to call from any worker.

use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use scraper::{ElementRef, Html, Node, Selector};
use tweetharvest_core::Tweet;

use crate::error::ParseError;
use crate::parse_helpers::{
    dedupe, extract_hashtags, extract_mentions, normalize_whitespace, parse_count,
};
use crate::session::RawFragment;

const CANONICAL_ORIGIN: &str = "https://x.com";

struct Selectors {
    timeline: Selector,
    article: Selector,
    empty_state: Selector,
    login_wall: Selector,
    promoted_marker: Selector,
    social_context: Selector,
    span: Selector,
    status_link: Selector,
    user_name: Selector,
    time: Selector,
    text: Selector,
    reply: Selector,
    retweet: Selector,
    like: Selector,
    photo: Selector,
    video: Selector,
}

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("static CSS selector is valid")
}

static SELECTORS: LazyLock<Selectors> = LazyLock::new(|| Selectors {
    timeline: selector(r#"[data-testid="primaryColumn"], div[aria-label^="Timeline"]"#),
    article: selector(r#"article[data-testid="tweet"]"#),
    empty_state: selector(r#"[data-testid="emptyState"]"#),
    login_wall: selector(r#"[data-testid="loginButton"], [data-testid="login"]"#),
    promoted_marker: selector(r#"[data-testid="placementTracking"]"#),
    social_context: selector(r#"[data-testid="socialContext"]"#),
    span: selector("span"),
    status_link: selector(r#"a[href*="/status/"]"#),
    user_name: selector(r#"[data-testid="User-Name"]"#),
    time: selector("time[datetime]"),
    text: selector(r#"[data-testid="tweetText"]"#),
    reply: selector(r#"[data-testid="reply"]"#),
    retweet: selector(r#"[data-testid="retweet"], [data-testid="unretweet"]"#),
    like: selector(r#"[data-testid="like"], [data-testid="unlike"]"#),
    photo: selector(r#"[data-testid="tweetPhoto"] img[src]"#),
    video: selector("video[poster]"),
});

static STATUS_HREF_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:https?://(?:www\.)?(?:x|twitter)\.com)?/([A-Za-z0-9_]+)/status/([^/?#]+)")
        .expect("static status href regex is valid")
});

/// Parses every organic tweet in `fragment`, in document order.
///
/// Promoted entries and articles missing a status link, author handle or
/// timestamp are skipped. Missing counts and media are tolerated.
///
/// # Errors
///
/// Returns [`ParseError::UnrecognizedLayout`] when the fragment contains
/// neither a timeline container, a tweet article, nor an empty-results
/// marker (for example a login wall or a redesigned page).
pub fn parse_fragment(fragment: &RawFragment) -> Result<Vec<Tweet>, ParseError> {
    let document = Html::parse_document(&fragment.html);
    let sel = &*SELECTORS;

    let mut articles = document.select(&sel.article).peekable();
    let recognized = articles.peek().is_some()
        || document.select(&sel.timeline).next().is_some()
        || document.select(&sel.empty_state).next().is_some();
    if !recognized {
        let reason = if document.select(&sel.login_wall).next().is_some() {
            "login wall instead of search timeline"
        } else {
            "no timeline container or tweet articles"
        };
        return Err(ParseError::UnrecognizedLayout {
            position: fragment.position,
            reason: reason.to_string(),
        });
    }

    let mut tweets = Vec::new();
    for article in articles {
        if is_promoted(article) {
            tracing::debug!(position = fragment.position, "skipping promoted entry");
            continue;
        }
        match parse_article(article) {
            Some(tweet) => tweets.push(tweet),
            None => tracing::debug!(position = fragment.position, "skipping malformed entry"),
        }
    }
    Ok(tweets)
}

fn is_promoted(article: ElementRef<'_>) -> bool {
    let sel = &*SELECTORS;
    if article.select(&sel.promoted_marker).next().is_some() {
        return true;
    }
    if article
        .select(&sel.social_context)
        .any(|ctx| collect_text(ctx).eq_ignore_ascii_case("promoted"))
    {
        return true;
    }
    article.select(&sel.span).any(|span| {
        let own = own_text(span);
        (own == "Ad" || own == "Promoted") && !inside_authored_content(span)
    })
}

/// True for elements within the post body or the author's name, where an
/// "Ad" label is user text rather than a placement marker.
fn inside_authored_content(element: ElementRef<'_>) -> bool {
    element
        .ancestors()
        .filter_map(ElementRef::wrap)
        .any(|a| matches!(a.value().attr("data-testid"), Some("tweetText" | "User-Name")))
}

fn parse_article(article: ElementRef<'_>) -> Option<Tweet> {
    let sel = &*SELECTORS;

    let time = article.select(&sel.time).next()?;
    let timestamp = DateTime::parse_from_rfc3339(time.value().attr("datetime")?.trim())
        .ok()?
        .with_timezone(&Utc);

    // The link wrapping <time> is the permalink; quoted tweets have their own.
    let href = enclosing_link(time)
        .or_else(|| article.select(&sel.status_link).next())
        .and_then(|a| a.value().attr("href"))?;
    let caps = STATUS_HREF_RE.captures(href)?;
    let href_handle = caps.get(1)?.as_str();
    let id = caps.get(2)?.as_str().to_string();

    let (author_handle, author_name) = author(article, href_handle);
    if author_handle.is_empty() || id.is_empty() {
        return None;
    }

    let text = article
        .select(&sel.text)
        .next()
        .map(collect_text)
        .unwrap_or_default();

    let hashtags = extract_hashtags(&text);
    let mentions = extract_mentions(&text);

    let media = dedupe(
        article
            .select(&sel.photo)
            .filter_map(|img| img.value().attr("src"))
            .chain(
                article
                    .select(&sel.video)
                    .filter_map(|v| v.value().attr("poster")),
            )
            .map(str::to_string),
    );

    Some(Tweet {
        url: format!("{CANONICAL_ORIGIN}/{author_handle}/status/{id}"),
        id,
        author_handle,
        author_name,
        text,
        timestamp,
        reply_count: count(article, &sel.reply),
        retweet_count: count(article, &sel.retweet),
        like_count: count(article, &sel.like),
        hashtags,
        mentions,
        media,
    })
}

/// Handle and display name from the `User-Name` block. The handle falls back
/// to the permalink path when the `@handle` span is missing.
fn author(article: ElementRef<'_>, href_handle: &str) -> (String, Option<String>) {
    let sel = &*SELECTORS;
    let mut handle = None;
    let mut name = None;

    if let Some(block) = article.select(&sel.user_name).next() {
        for span in block.select(&sel.span) {
            let own = own_text(span);
            if own.is_empty() {
                continue;
            }
            if let Some(stripped) = own.strip_prefix('@') {
                if handle.is_none() && !stripped.is_empty() {
                    handle = Some(stripped.to_string());
                }
            } else if name.is_none() && own != "·" {
                name = Some(own);
            }
        }
    }

    (handle.unwrap_or_else(|| href_handle.to_string()), name)
}

fn count(article: ElementRef<'_>, selector: &Selector) -> Option<u64> {
    let button = article.select(selector).next()?;
    let visible = collect_text(button);
    if !visible.is_empty() {
        return parse_count(&visible);
    }
    // Zero counts render no digits; the aria label then reads just "Reply".
    button
        .value()
        .attr("aria-label")
        .and_then(parse_count)
        .or(Some(0))
}

fn enclosing_link(element: ElementRef<'_>) -> Option<ElementRef<'_>> {
    element
        .ancestors()
        .filter_map(ElementRef::wrap)
        .find(|a| a.value().name() == "a" && a.value().attr("href").is_some())
}

/// Whitespace-normalized text of `element`, with emoji images rendered as
/// their `alt` text.
fn collect_text(element: ElementRef<'_>) -> String {
    let mut out = String::new();
    for node in element.descendants() {
        match node.value() {
            Node::Text(text) => out.push_str(text),
            Node::Element(el) if el.name() == "img" => {
                if let Some(alt) = el.attr("alt") {
                    out.push_str(alt);
                }
            }
            _ => {}
        }
    }
    normalize_whitespace(&out)
}

/// Text of the direct text children of `element`, ignoring nested markup.
fn own_text(element: ElementRef<'_>) -> String {
    let mut joined = String::new();
    for child in element.children() {
        if let Some(text) = child.value().as_text() {
            joined.push_str(text);
        }
    }
    normalize_whitespace(&joined)
}

#[cfg(test)]
#[path = "parse_test.rs"]
mod tests;
