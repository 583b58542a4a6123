//! Stack Overflow adapter using the Stack Exchange search API.
//!
//! The API always gzip-compresses responses; the shared client decodes them.

use super::{Candidate, KeywordMatcher, Source, batched_deadline, check_status, fetch_each};
use crate::error::AdapterError;
use crate::models::RawItem;
use async_trait::async_trait;
use chrono::DateTime;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{instrument, warn};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
const SEARCH_URL: &str = "https://api.stackexchange.com/2.3/search/advanced";

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<Question>,
    quota_remaining: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct Question {
    title: Option<String>,
    body: Option<String>,
    link: Option<String>,
    view_count: Option<u64>,
    creation_date: Option<i64>,
}

pub struct StackExchangeSource {
    client: Client,
    timeout: Duration,
}

impl StackExchangeSource {
    pub fn new(client: Client, timeout: Duration) -> Self {
        Self { client, timeout }
    }
}

#[async_trait]
impl Source for StackExchangeSource {
    fn name(&self) -> &'static str {
        "stackexchange"
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    fn deadline(&self, keywords: usize) -> Duration {
        batched_deadline(self.timeout, keywords)
    }

    #[instrument(level = "info", skip_all, fields(source = "stackexchange"))]
    async fn fetch(&self, keywords: &[String]) -> Result<Vec<RawItem>, AdapterError> {
        let matcher = &KeywordMatcher::new(keywords);
        fetch_each(self.name(), keywords, |keyword| async move {
            let response = self
                .client
                .get(SEARCH_URL)
                .query(&[
                    ("order", "desc"),
                    ("sort", "creation"),
                    ("q", keyword.as_str()),
                    ("site", "stackoverflow"),
                    ("filter", "withbody"),
                    ("pagesize", "25"),
                ])
                .timeout(self.timeout)
                .send()
                .await?;
            let body = check_status(response)?.text().await?;
            parse_search(&body, matcher)
        })
        .await
    }
}

/// Parse a Stack Exchange search response into matching items.
pub fn parse_search(body: &str, matcher: &KeywordMatcher) -> Result<Vec<RawItem>, AdapterError> {
    let response: SearchResponse = serde_json::from_str(body)?;
    if response.quota_remaining == Some(0) {
        warn!("Stack Exchange quota exhausted");
    }

    Ok(response
        .items
        .into_iter()
        .filter_map(|q| {
            Candidate {
                title: q.title.as_deref().unwrap_or_default(),
                body: q.body.as_deref().unwrap_or_default(),
                url: q.link.as_deref().unwrap_or_default(),
                timestamp: q
                    .creation_date
                    .and_then(|secs| DateTime::from_timestamp(secs, 0)),
                reach: q.view_count.unwrap_or(0),
            }
            .into_item("stackexchange", matcher)
        })
        .collect())
}
