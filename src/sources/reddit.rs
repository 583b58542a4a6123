//! Reddit adapter using the public `search.json` listing.

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
const SEARCH_URL: &str = "https://www.reddit.com/search.json";

#[derive(Debug, Deserialize)]
struct Listing {
    data: ListingData,
}

#[derive(Debug, Deserialize)]
struct ListingData {
    #[serde(default)]
    children: Vec<Child>,
}

#[derive(Debug, Deserialize)]
struct Child {
    data: Post,
}

#[derive(Debug, Deserialize)]
struct Post {
    title: Option<String>,
    selftext: Option<String>,
    permalink: Option<String>,
    score: Option<i64>,
    num_comments: Option<u64>,
    created_utc: Option<f64>,
}

pub struct RedditSource {
    client: Client,
    timeout: Duration,
}

impl RedditSource {
    pub fn new(client: Client, timeout: Duration) -> Self {
        Self { client, timeout }
    }
}

#[async_trait]
impl Source for RedditSource {
    fn name(&self) -> &'static str {
        "reddit"
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    fn deadline(&self, keywords: usize) -> Duration {
        batched_deadline(self.timeout, keywords)
    }

    #[instrument(level = "info", skip_all, fields(source = "reddit"))]
    async fn fetch(&self, keywords: &[String]) -> Result<Vec<RawItem>, AdapterError> {
        let matcher = &KeywordMatcher::new(keywords);
        fetch_each(self.name(), keywords, |keyword| async move {
            let response = self
                .client
                .get(SEARCH_URL)
                .query(&[("q", keyword.as_str()), ("sort", "new"), ("limit", "25")])
                .timeout(self.timeout)
                .send()
                .await?;
            let body = check_status(response)?.text().await?;
            parse_listing(&body, matcher)
        })
        .await
    }
}

/// Parse a Reddit listing into matching items.
pub fn parse_listing(body: &str, matcher: &KeywordMatcher) -> Result<Vec<RawItem>, AdapterError> {
    let listing: Listing = serde_json::from_str(body)?;

    Ok(listing
        .data
        .children
        .into_iter()
        .filter_map(|child| {
            let post = child.data;
            let url = post
                .permalink
                .as_deref()
                .map(|p| format!("https://www.reddit.com{p}"))
                .unwrap_or_default();
            let reach = post.score.unwrap_or(0).max(0) as u64 + post.num_comments.unwrap_or(0);
            Candidate {
                title: post.title.as_deref().unwrap_or_default(),
                body: post.selftext.as_deref().unwrap_or_default(),
                url: &url,
                timestamp: post
                    .created_utc
                    .and_then(|secs| DateTime::from_timestamp(secs as i64, 0)),
                reach,
            }
            .into_item("reddit", matcher)
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIXTURE: &str = r#"{
        "kind": "Listing",
        "data": {
            "children": [
                {"kind": "t3", "data": {"title": "Tokio 2.0 when?", "selftext": "",
                  "permalink": "/r/rust/comments/abc/tokio_20_when/", "score": 88,
                  "num_comments": 12, "created_utc": 1700000000.0}},
                {"kind": "t3", "data": {"title": "Downvoted post", "selftext": "mentions tokio",
                  "permalink": "/r/rust/comments/def/", "score": -4, "num_comments": 1}},
                {"kind": "t3", "data": {"title": "Unrelated", "permalink": "/r/x/"}}
            ]
        }
    }"#;

    #[test]
    fn test_parse_listing() {
        let matcher = KeywordMatcher::new(&["tokio".to_string()]);
        let items = parse_listing(FIXTURE, &matcher).unwrap();

        assert_eq!(items.len(), 2);
        assert_eq!(
            items[0].url,
            "https://www.reddit.com/r/rust/comments/abc/tokio_20_when/"
        );
        assert_eq!(items[0].estimated_reach, 100);
        assert_eq!(items[1].estimated_reach, 1);
        assert_eq!(items[0].keyword, "tokio");
    }

    #[test]
    fn test_parse_listing_rejects_wrong_shape() {
        let matcher = KeywordMatcher::new(&["tokio".to_string()]);
        assert!(parse_listing(r#"{"error": 429}"#, &matcher).is_err());
    }
}
