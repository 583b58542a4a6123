//! Wikipedia pageview-trend adapter.
//!
//! For each keyword, looks up the English Wikipedia article of the same name
//! and reports its total user pageviews over the last week as a single item.
//! Keywords without an article are skipped.

use super::{KeywordMatcher, Source, batched_deadline, check_status, fetch_each};
use crate::error::AdapterError;
use crate::models::RawItem;
use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, NaiveDate, NaiveDateTime, Utc};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, instrument};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);
const PAGEVIEWS_URL: &str =
    "https://wikimedia.org/api/rest_v1/metrics/pageviews/per-article/en.wikipedia/all-access/user";
const WINDOW_DAYS: i64 = 7;

#[derive(Debug, Deserialize)]
struct PageviewsResponse {
    #[serde(default)]
    items: Vec<PageviewDay>,
}

#[derive(Debug, Deserialize)]
struct PageviewDay {
    /// `YYYYMMDDHH`
    timestamp: String,
    views: u64,
}

pub struct WikipediaSource {
    client: Client,
    timeout: Duration,
}

impl WikipediaSource {
    pub fn new(client: Client, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    async fn trend(
        &self,
        keyword: &str,
        (start, end): (NaiveDate, NaiveDate),
        matcher: &KeywordMatcher,
    ) -> Result<Vec<RawItem>, AdapterError> {
        let title = article_title(keyword);
        if title.is_empty() {
            return Ok(Vec::new());
        }
        let url = format!(
            "{PAGEVIEWS_URL}/{}/daily/{}/{}",
            urlencoding::encode(&title),
            start.format("%Y%m%d"),
            end.format("%Y%m%d")
        );

        let response = self.client.get(&url).timeout(self.timeout).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            debug!(%keyword, "No Wikipedia article");
            return Ok(Vec::new());
        }
        let body = check_status(response)?.text().await?;
        Ok(parse_pageviews(&body, &title, matcher)?.into_iter().collect())
    }
}

#[async_trait]
impl Source for WikipediaSource {
    fn name(&self) -> &'static str {
        "wikipedia"
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    fn deadline(&self, keywords: usize) -> Duration {
        batched_deadline(self.timeout, keywords)
    }

    #[instrument(level = "info", skip_all, fields(source = "wikipedia"))]
    async fn fetch(&self, keywords: &[String]) -> Result<Vec<RawItem>, AdapterError> {
        let matcher = &KeywordMatcher::new(keywords);
        let end = Utc::now().date_naive();
        let start = end - ChronoDuration::days(WINDOW_DAYS);

        fetch_each(self.name(), keywords, |keyword| {
            self.trend(keyword, (start, end), matcher)
        })
        .await
    }
}

/// Turn a keyword into a Wikipedia article title (`rust lang` -> `Rust_lang`).
pub fn article_title(keyword: &str) -> String {
    let joined = keyword.split_whitespace().collect::<Vec<_>>().join("_");
    let mut chars = joined.chars();
    match chars.next() {
        None => String::new(),
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
    }
}

/// Summarize a pageviews response into one trend item.
///
/// Returns `None` when the article had no views in the window.
pub fn parse_pageviews(
    body: &str,
    title: &str,
    matcher: &KeywordMatcher,
) -> Result<Option<RawItem>, AdapterError> {
    let response: PageviewsResponse = serde_json::from_str(body)?;
    let total: u64 = response.items.iter().map(|d| d.views).sum();
    if total == 0 {
        return Ok(None);
    }

    let display = title.replace('_', " ");
    let Some(keyword) = matcher.first_match(&[&display]) else {
        return Ok(None);
    };
    let latest = response
        .items
        .iter()
        .filter_map(|d| NaiveDateTime::parse_from_str(&format!("{}00", d.timestamp), "%Y%m%d%H%M").ok())
        .max()
        .map(|naive| DateTime::<Utc>::from_naive_utc_and_offset(naive, Utc));

    Ok(Some(RawItem {
        keyword: keyword.to_string(),
        source_name: "wikipedia".to_string(),
        text: format!(
            "Wikipedia article \"{display}\" received {total} views in the last {WINDOW_DAYS} days"
        ),
        url: format!("https://en.wikipedia.org/wiki/{}", urlencoding::encode(title)),
        timestamp: latest.unwrap_or_else(Utc::now),
        estimated_reach: total,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_article_title() {
        assert_eq!(article_title("rust lang"), "Rust_lang");
        assert_eq!(article_title("  tokio  "), "Tokio");
        assert_eq!(article_title(""), "");
    }

    #[test]
    fn test_parse_pageviews_sums_window() {
        let body = r#"{"items": [
            {"article": "Rust_(programming_language)", "timestamp": "2024050100", "views": 1200},
            {"article": "Rust_(programming_language)", "timestamp": "2024050200", "views": 800}
        ]}"#;
        let matcher = KeywordMatcher::new(&["rust".to_string()]);
        let item = parse_pageviews(body, "Rust", &matcher).unwrap().unwrap();

        assert_eq!(item.estimated_reach, 2000);
        assert_eq!(item.url, "https://en.wikipedia.org/wiki/Rust");
        assert_eq!(item.keyword, "rust");
        assert_eq!(item.timestamp.to_rfc3339(), "2024-05-02T00:00:00+00:00");
        assert!(item.text.contains("2000 views"));
    }

    #[test]
    fn test_parse_pageviews_zero_views() {
        let matcher = KeywordMatcher::new(&["rust".to_string()]);
        let body = r#"{"items": [{"timestamp": "2024050100", "views": 0}]}"#;
        assert!(parse_pageviews(body, "Rust", &matcher).unwrap().is_none());
    }
}
