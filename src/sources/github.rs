//! GitHub adapter using the repository search API.
//!
//! Unauthenticated requests are heavily rate limited, so a token is sent when
//! one is configured.

use super::{Candidate, KeywordMatcher, Source, batched_deadline, check_status, fetch_each};
use crate::error::AdapterError;
use crate::models::RawItem;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::instrument;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);
const SEARCH_URL: &str = "https://api.github.com/search/repositories";

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<Repository>,
}

#[derive(Debug, Deserialize)]
struct Repository {
    full_name: Option<String>,
    description: Option<String>,
    html_url: Option<String>,
    stargazers_count: Option<u64>,
    updated_at: Option<DateTime<Utc>>,
}

pub struct GithubSource {
    client: Client,
    timeout: Duration,
    token: Option<String>,
}

impl GithubSource {
    pub fn new(client: Client, timeout: Duration, token: Option<String>) -> Self {
        Self {
            client,
            timeout,
            token,
        }
    }
}

#[async_trait]
impl Source for GithubSource {
    fn name(&self) -> &'static str {
        "github"
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    fn deadline(&self, keywords: usize) -> Duration {
        batched_deadline(self.timeout, keywords)
    }

    #[instrument(level = "info", skip_all, fields(source = "github", authenticated = self.token.is_some()))]
    async fn fetch(&self, keywords: &[String]) -> Result<Vec<RawItem>, AdapterError> {
        let matcher = &KeywordMatcher::new(keywords);
        fetch_each(self.name(), keywords, |keyword| async move {
            let mut request = self
                .client
                .get(SEARCH_URL)
                .query(&[
                    ("q", keyword.as_str()),
                    ("sort", "updated"),
                    ("per_page", "20"),
                ])
                .header("Accept", "application/vnd.github+json")
                .timeout(self.timeout);
            if let Some(token) = &self.token {
                request = request.bearer_auth(token);
            }

            let body = check_status(request.send().await?)?.text().await?;
            parse_search(&body, matcher)
        })
        .await
    }
}

/// Parse a repository search response into matching items.
pub fn parse_search(body: &str, matcher: &KeywordMatcher) -> Result<Vec<RawItem>, AdapterError> {
    let response: SearchResponse = serde_json::from_str(body)?;

    Ok(response
        .items
        .into_iter()
        .filter_map(|repo| {
            Candidate {
                title: repo.full_name.as_deref().unwrap_or_default(),
                body: repo.description.as_deref().unwrap_or_default(),
                url: repo.html_url.as_deref().unwrap_or_default(),
                timestamp: repo.updated_at,
                reach: repo.stargazers_count.unwrap_or(0),
            }
            .into_item("github", matcher)
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_search() {
        let body = r#"{
            "total_count": 2,
            "items": [
                {"full_name": "tokio-rs/tokio", "description": "A runtime for writing reliable asynchronous applications with Rust.",
                 "html_url": "https://github.com/tokio-rs/tokio", "stargazers_count": 25000,
                 "updated_at": "2024-05-01T12:00:00Z"},
                {"full_name": "someone/dotfiles", "description": null,
                 "html_url": "https://github.com/someone/dotfiles", "stargazers_count": 1}
            ]
        }"#;
        let matcher = KeywordMatcher::new(&["rust".to_string()]);
        let items = parse_search(body, &matcher).unwrap();

        assert_eq!(items.len(), 1);
        assert_eq!(items[0].url, "https://github.com/tokio-rs/tokio");
        assert_eq!(items[0].estimated_reach, 25000);
        assert_eq!(items[0].timestamp.to_rfc3339(), "2024-05-01T12:00:00+00:00");
    }
}
