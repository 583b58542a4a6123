//! Provider adapters that turn a keyword list into candidate [`RawItem`]s.
//!
//! Each adapter queries one external provider and keeps only the items whose
//! title or body mentions one of the tracked keywords. Adapters fail
//! independently; the [`crate::fetch::FetchCoordinator`] isolates failures.
//!
//! # Supported Sources
//!
//! | Source | Module | Method | Notes |
//! |--------|--------|--------|-------|
//! | Hacker News | [`hackernews`] | Algolia search API | Reach = points + comments |
//! | Reddit | [`reddit`] | `search.json` | Reach = score + comments |
//! | Stack Overflow | [`stackexchange`] | Stack Exchange search API | Reach = view count |
//! | GitHub | [`github`] | Repository search API | Optional token; reach = stars |
//! | News feeds | [`news_rss`] | Google News RSS + configured feeds | RSS 2.0 and Atom |
//! | CNN Lite | [`cnn_lite`] | HTML scraping | Headlines only |
//! | Wikipedia | [`wikipedia`] | Wikimedia pageviews API | One trend item per keyword |
//!
//! # Common Patterns
//!
//! Each adapter module exports a struct implementing [`Source`] and a pure
//! `parse_*` function over the provider's response body so parsing can be
//! tested without the network.

pub mod cnn_lite;
pub mod github;
pub mod hackernews;
pub mod news_rss;
pub mod reddit;
pub mod stackexchange;
pub mod wikipedia;

use crate::config::SourcesConfig;
use crate::error::AdapterError;
use crate::models::{MAX_ITEM_TEXT_CHARS, RawItem};
use crate::utils::{clean_text, truncate_chars};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use itertools::Itertools;
use regex::{Regex, RegexBuilder};
use futures::stream::{self, StreamExt};
use reqwest::{Client, Response};
use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

pub use cnn_lite::CnnLiteSource;
pub use github::GithubSource;
pub use hackernews::HackerNewsSource;
pub use news_rss::NewsRssSource;
pub use reddit::RedditSource;
pub use stackexchange::StackExchangeSource;
pub use wikipedia::WikipediaSource;

const USER_AGENT: &str = concat!("mention_watch/", env!("CARGO_PKG_VERSION"));

/// Requests one adapter keeps in flight at once.
pub const REQUEST_CONCURRENCY: usize = 4;

/// A single external content provider.
#[async_trait]
pub trait Source: Send + Sync {
    /// Stable name recorded as `sourceName` on produced items.
    fn name(&self) -> &'static str;

    /// Upper bound on one provider request.
    fn timeout(&self) -> Duration;

    /// Upper bound on one `fetch` call over `keywords` keywords.
    ///
    /// Adapters that issue one request per keyword scale this with
    /// [`batched_deadline`].
    fn deadline(&self, _keywords: usize) -> Duration {
        self.timeout()
    }

    /// Return the provider's items that match any of `keywords`.
    async fn fetch(&self, keywords: &[String]) -> Result<Vec<RawItem>, AdapterError>;
}

/// Case-insensitive keyword matcher shared by all adapters.
///
/// Keywords are matched as literal substrings; the first keyword (in input
/// order) that occurs wins. Keywords differing only in case collapse into
/// the first spelling.
#[derive(Debug, Clone)]
pub struct KeywordMatcher {
    patterns: Vec<(String, Regex)>,
}

impl KeywordMatcher {
    pub fn new(keywords: &[String]) -> Self {
        let patterns = keywords
            .iter()
            .map(|k| k.trim())
            .filter(|k| !k.is_empty())
            .unique_by(|k| k.to_lowercase())
            .filter_map(|k| {
                RegexBuilder::new(&regex::escape(k))
                    .case_insensitive(true)
                    .build()
                    .ok()
                    .map(|re| (k.to_string(), re))
            })
            .collect();
        Self { patterns }
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// The first keyword that occurs in any of `fields`.
    pub fn first_match(&self, fields: &[&str]) -> Option<&str> {
        self.patterns
            .iter()
            .find(|(_, re)| fields.iter().any(|f| re.is_match(f)))
            .map(|(k, _)| k.as_str())
    }
}

/// Field values an adapter extracted from one provider record.
#[derive(Debug, Default)]
pub(crate) struct Candidate<'a> {
    pub title: &'a str,
    pub body: &'a str,
    pub url: &'a str,
    pub timestamp: Option<DateTime<Utc>>,
    pub reach: u64,
}

impl Candidate<'_> {
    /// Match against `matcher` and build a [`RawItem`] when a keyword hits.
    pub(crate) fn into_item(self, source_name: &str, matcher: &KeywordMatcher) -> Option<RawItem> {
        if self.url.trim().is_empty() {
            return None;
        }
        let title = clean_text(self.title);
        let body = clean_text(self.body);
        let keyword = matcher.first_match(&[&title, &body])?.to_string();

        let text = match (title.is_empty(), body.is_empty()) {
            (false, false) => format!("{title}: {body}"),
            (false, true) => title,
            (true, _) => body,
        };

        Some(RawItem {
            keyword,
            source_name: source_name.to_string(),
            text: truncate_chars(&text, MAX_ITEM_TEXT_CHARS),
            url: self.url.trim().to_string(),
            timestamp: self.timestamp.unwrap_or_else(Utc::now),
            estimated_reach: self.reach,
        })
    }
}

/// Time needed for `requests` requests of at most `per_request` each, run
/// [`REQUEST_CONCURRENCY`] at a time.
pub fn batched_deadline(per_request: Duration, requests: usize) -> Duration {
    let waves = requests.div_ceil(REQUEST_CONCURRENCY).max(1);
    per_request.saturating_mul(u32::try_from(waves).unwrap_or(u32::MAX))
}

/// Run `request` for every target, [`REQUEST_CONCURRENCY`] at a time, and
/// concatenate the items in target order.
///
/// A failed target is logged and skipped. The call fails only when every
/// target failed.
pub(crate) async fn fetch_each<'a, T, F, Fut>(
    source: &'static str,
    targets: &'a [T],
    request: F,
) -> Result<Vec<RawItem>, AdapterError>
where
    T: Display,
    F: FnMut(&'a T) -> Fut,
    Fut: Future<Output = Result<Vec<RawItem>, AdapterError>>,
{
    // Build the (lazy) futures up front so no closure-typed `Map` adapter is
    // held across the await; this keeps the `Send` proof for `#[async_trait]`
    // callers tractable.
    let pending: Vec<Fut> = targets.iter().map(request).collect();
    let results: Vec<_> = stream::iter(pending)
        .buffered(REQUEST_CONCURRENCY)
        .collect()
        .await;

    let mut items = Vec::new();
    let mut last_error = None;
    let mut succeeded = 0usize;
    for (target, result) in targets.iter().zip(results) {
        match result {
            Ok(found) => {
                succeeded += 1;
                debug!(source, %target, count = found.len(), "Request finished");
                items.extend(found);
            }
            Err(e) => {
                warn!(source, %target, error = %e, "Request failed; skipping");
                last_error = Some(e);
            }
        }
    }

    match last_error {
        Some(e) if succeeded == 0 => Err(e),
        _ => Ok(items),
    }
}

/// Build the shared HTTP client used by every adapter.
pub fn http_client() -> Result<Client, reqwest::Error> {
    Client::builder().user_agent(USER_AGENT).gzip(true).build()
}

/// Map non-success statuses to [`AdapterError::Status`].
pub(crate) fn check_status(response: Response) -> Result<Response, AdapterError> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(AdapterError::Status {
            status: status.as_u16(),
        })
    }
}

/// Build the enabled adapters from configuration.
pub fn build_sources(config: &SourcesConfig, client: Client) -> Vec<Arc<dyn Source>> {
    let mut sources: Vec<Arc<dyn Source>> = Vec::new();

    if config.hackernews.enabled {
        sources.push(Arc::new(HackerNewsSource::new(
            client.clone(),
            config.hackernews.timeout(hackernews::DEFAULT_TIMEOUT),
        )));
    }
    if config.reddit.enabled {
        sources.push(Arc::new(RedditSource::new(
            client.clone(),
            config.reddit.timeout(reddit::DEFAULT_TIMEOUT),
        )));
    }
    if config.stackexchange.enabled {
        sources.push(Arc::new(StackExchangeSource::new(
            client.clone(),
            config.stackexchange.timeout(stackexchange::DEFAULT_TIMEOUT),
        )));
    }
    if config.github.enabled {
        sources.push(Arc::new(GithubSource::new(
            client.clone(),
            config.github.timeout(github::DEFAULT_TIMEOUT),
            config.github_token.clone(),
        )));
    }
    if config.news_rss.enabled {
        sources.push(Arc::new(NewsRssSource::new(
            client.clone(),
            config.news_rss.timeout(news_rss::DEFAULT_TIMEOUT),
            config.feeds.clone(),
            config.google_news,
        )));
    }
    if config.cnn_lite.enabled {
        sources.push(Arc::new(CnnLiteSource::new(
            client.clone(),
            config.cnn_lite.timeout(cnn_lite::DEFAULT_TIMEOUT),
        )));
    }
    if config.wikipedia.enabled {
        sources.push(Arc::new(WikipediaSource::new(
            client,
            config.wikipedia.timeout(wikipedia::DEFAULT_TIMEOUT),
        )));
    }

    info!(
        count = sources.len(),
        names = %sources.iter().map(|s| s.name()).join(","),
        "Registered provider adapters"
    );
    sources
}
