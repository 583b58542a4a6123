//! CNN Lite headline adapter.
//!
//! Scrapes the [CNN Lite](https://lite.cnn.com) front page, a text-only
//! version of CNN whose markup is minimal and stable. Only headlines are
//! matched; article bodies are not fetched.
//!
//! # URL Pattern
//!
//! Headlines link with relative URLs that are resolved against the front
//! page, e.g. `https://lite.cnn.com/2025/05/06/article-slug`.

use super::{Candidate, KeywordMatcher, Source, check_status};
use crate::error::AdapterError;
use crate::models::RawItem;
use async_trait::async_trait;
use reqwest::Client;
use scraper::{Html, Selector};
use std::time::Duration;
use tracing::{debug, info, instrument};
use url::Url;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);
const FRONT_PAGE_URL: &str = "https://lite.cnn.com";

/// Front-page headlines have no engagement signal of their own.
const HEADLINE_REACH: u64 = 1_000;

pub struct CnnLiteSource {
    client: Client,
    timeout: Duration,
}

impl CnnLiteSource {
    pub fn new(client: Client, timeout: Duration) -> Self {
        Self { client, timeout }
    }
}

#[async_trait]
impl Source for CnnLiteSource {
    fn name(&self) -> &'static str {
        "cnn_lite"
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    #[instrument(level = "info", skip_all, fields(source = "cnn_lite"))]
    async fn fetch(&self, keywords: &[String]) -> Result<Vec<RawItem>, AdapterError> {
        let matcher = KeywordMatcher::new(keywords);
        let response = self
            .client
            .get(FRONT_PAGE_URL)
            .timeout(self.timeout)
            .send()
            .await?;
        let html = check_status(response)?.text().await?;

        let items = parse_front_page(&html, FRONT_PAGE_URL, &matcher)?;
        info!(count = items.len(), "Matched CNN Lite headlines");
        Ok(items)
    }
}

/// Extract headlines matching `matcher` from a CNN Lite front page.
pub fn parse_front_page(
    html: &str,
    base_url: &str,
    matcher: &KeywordMatcher,
) -> Result<Vec<RawItem>, AdapterError> {
    let base = Url::parse(base_url).map_err(|e| AdapterError::Decode(e.to_string()))?;
    let document = Html::parse_document(html);
    let story_selector = Selector::parse(".card--lite a[href]")
        .map_err(|e| AdapterError::Decode(e.to_string()))?;

    let mut items = Vec::new();
    for element in document.select(&story_selector) {
        let Some(href) = element.value().attr("href") else {
            continue;
        };
        let Ok(resolved) = base.join(href) else {
            continue;
        };
        let headline = element.text().collect::<Vec<_>>().join(" ");
        let url = resolved.to_string();

        if let Some(item) = (Candidate {
            title: &headline,
            body: "",
            url: &url,
            timestamp: None,
            reach: HEADLINE_REACH,
        })
        .into_item("cnn_lite", matcher)
        {
            debug!(%url, keyword = %item.keyword, "CNN Lite headline matched");
            items.push(item);
        }
    }

    Ok(items)
}
