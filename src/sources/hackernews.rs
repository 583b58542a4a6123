//! Hacker News adapter backed by the Algolia search API.
//!
//! Stories are searched per keyword, newest first. Items without an external
//! link fall back to the discussion page on `news.ycombinator.com`.

use super::{Candidate, KeywordMatcher, Source, batched_deadline, check_status, fetch_each};
use crate::error::AdapterError;
use crate::models::RawItem;
use async_trait::async_trait;
use chrono::DateTime;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::instrument;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
const SEARCH_URL: &str = "https://hn.algolia.com/api/v1/search_by_date";
const HITS_PER_PAGE: u32 = 30;

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    hits: Vec<Hit>,
}

#[derive(Debug, Deserialize)]
struct Hit {
    #[serde(rename = "objectID")]
    object_id: String,
    title: Option<String>,
    url: Option<String>,
    story_text: Option<String>,
    points: Option<u64>,
    num_comments: Option<u64>,
    created_at_i: Option<i64>,
}

pub struct HackerNewsSource {
    client: Client,
    timeout: Duration,
}

impl HackerNewsSource {
    pub fn new(client: Client, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    async fn search(&self, keyword: &str, matcher: &KeywordMatcher) -> Result<Vec<RawItem>, AdapterError> {
        let hits_per_page = HITS_PER_PAGE.to_string();
        let response = self
            .client
            .get(SEARCH_URL)
            .query(&[
                ("query", keyword),
                ("tags", "story"),
                ("hitsPerPage", hits_per_page.as_str()),
            ])
            .timeout(self.timeout)
            .send()
            .await?;
        let body = check_status(response)?.text().await?;
        parse_search(&body, matcher)
    }
}

#[async_trait]
impl Source for HackerNewsSource {
    fn name(&self) -> &'static str {
        "hackernews"
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    fn deadline(&self, keywords: usize) -> Duration {
        batched_deadline(self.timeout, keywords)
    }

    #[instrument(level = "info", skip_all, fields(source = "hackernews"))]
    async fn fetch(&self, keywords: &[String]) -> Result<Vec<RawItem>, AdapterError> {
        let matcher = KeywordMatcher::new(keywords);
        fetch_each(self.name(), keywords, |keyword| self.search(keyword, &matcher)).await
    }
}

/// Parse an Algolia search response into matching items.
pub fn parse_search(body: &str, matcher: &KeywordMatcher) -> Result<Vec<RawItem>, AdapterError> {
    let response: SearchResponse = serde_json::from_str(body)?;

    Ok(response
        .hits
        .into_iter()
        .filter_map(|hit| {
            let url = hit.url.filter(|u| !u.is_empty()).unwrap_or_else(|| {
                format!("https://news.ycombinator.com/item?id={}", hit.object_id)
            });
            Candidate {
                title: hit.title.as_deref().unwrap_or_default(),
                body: hit.story_text.as_deref().unwrap_or_default(),
                url: &url,
                timestamp: hit
                    .created_at_i
                    .and_then(|secs| DateTime::from_timestamp(secs, 0)),
                reach: hit.points.unwrap_or(0) + hit.num_comments.unwrap_or(0),
            }
            .into_item("hackernews", matcher)
        })
        .collect())
}
