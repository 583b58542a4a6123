//! News feed adapter.
//!
//! Two kinds of feeds are read on every fetch:
//!
//! 1. A Google News RSS search per keyword (when enabled)
//! 2. Each configured feed URL, once, matched against all keywords
//!
//! Both RSS 2.0 (`<item>`) and Atom (`<entry>`) documents are understood.
//! A configured feed that fails is logged and skipped; only a failure of
//! every request fails the adapter.

use super::{Candidate, KeywordMatcher, Source, batched_deadline, check_status, fetch_each};
use crate::error::AdapterError;
use crate::models::RawItem;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use reqwest::Client;
use std::time::Duration;
use tracing::instrument;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20);
const GOOGLE_NEWS_URL: &str = "https://news.google.com/rss/search";

/// Feeds carry no engagement signal, so every entry gets the same reach.
const FEED_REACH: u64 = 500;

/// One `<item>` or `<entry>` as read from a feed.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct FeedEntry {
    pub title: String,
    pub link: String,
    pub summary: String,
    pub published: Option<DateTime<Utc>>,
}

pub struct NewsRssSource {
    client: Client,
    timeout: Duration,
    feeds: Vec<String>,
    google_news: bool,
}

impl NewsRssSource {
    pub fn new(client: Client, timeout: Duration, feeds: Vec<String>, google_news: bool) -> Self {
        Self {
            client,
            timeout,
            feeds,
            google_news,
        }
    }

    async fn get_feed(&self, url: &str) -> Result<Vec<FeedEntry>, AdapterError> {
        let response = self.client.get(url).timeout(self.timeout).send().await?;
        let body = check_status(response)?.text().await?;
        parse_feed(&body)
    }
}

#[async_trait]
impl Source for NewsRssSource {
    fn name(&self) -> &'static str {
        "news_rss"
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    fn deadline(&self, keywords: usize) -> Duration {
        let google = if self.google_news { keywords } else { 0 };
        batched_deadline(self.timeout, google + self.feeds.len())
    }

    #[instrument(level = "info", skip_all, fields(source = "news_rss", feeds = self.feeds.len()))]
    async fn fetch(&self, keywords: &[String]) -> Result<Vec<RawItem>, AdapterError> {
        let matcher = &KeywordMatcher::new(keywords);
        let mut urls: Vec<String> = Vec::new();
        if self.google_news {
            urls.extend(keywords.iter().map(|k| google_news_url(k)));
        }
        urls.extend(self.feeds.iter().cloned());

        fetch_each(self.name(), &urls, |url| async move {
            self.get_feed(url)
                .await
                .map(|entries| entries_to_items(entries, matcher))
        })
        .await
    }
}

fn google_news_url(keyword: &str) -> String {
    format!(
        "{GOOGLE_NEWS_URL}?q={}&hl=en-US&gl=US&ceid=US:en",
        urlencoding::encode(keyword)
    )
}

/// Convert feed entries into matching items.
pub fn entries_to_items(entries: Vec<FeedEntry>, matcher: &KeywordMatcher) -> Vec<RawItem> {
    entries
        .iter()
        .filter_map(|entry| {
            Candidate {
                title: &entry.title,
                body: &entry.summary,
                url: &entry.link,
                timestamp: entry.published,
                reach: FEED_REACH,
            }
            .into_item("news_rss", matcher)
        })
        .collect()
}

#[derive(Clone, Copy, PartialEq)]
enum Field {
    Title,
    Link,
    Summary,
    Published,
}

/// Parse an RSS 2.0 or Atom document into entries.
pub fn parse_feed(xml: &str) -> Result<Vec<FeedEntry>, AdapterError> {
    let mut reader = Reader::from_str(xml);

    let mut entries = Vec::new();
    let mut current: Option<FeedEntry> = None;
    let mut field: Option<Field> = None;
    let mut buf = String::new();
    let mut saw_root = false;

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                let name = e.name();
                let name = name.as_ref();
                match name {
                    b"rss" | b"feed" | b"rdf:RDF" => saw_root = true,
                    b"item" | b"entry" => current = Some(FeedEntry::default()),
                    _ if current.is_some() => {
                        if let Some(f) = field_for(name) {
                            field = Some(f);
                            buf.clear();
                        }
                        if name == b"link" {
                            if let (Some(entry), Some(href)) = (current.as_mut(), href_of(&e)) {
                                entry.link = href;
                            }
                        }
                    }
                    _ => {}
                }
            }
            Event::Empty(e) => {
                if e.name().as_ref() == b"link" {
                    if let (Some(entry), Some(href)) = (current.as_mut(), href_of(&e)) {
                        if entry.link.is_empty() || is_alternate(&e) {
                            entry.link = href;
                        }
                    }
                }
            }
            Event::Text(t) => {
                if field.is_some() {
                    buf.push_str(&String::from_utf8_lossy(&t.into_inner()));
                }
            }
            Event::CData(c) => {
                if field.is_some() {
                    buf.push_str(&String::from_utf8_lossy(&c.into_inner()));
                }
            }
            Event::GeneralRef(r) => {
                if field.is_some() {
                    buf.push_str(&resolve_entity(&String::from_utf8_lossy(&r)));
                }
            }
            Event::End(e) => {
                let name = e.name();
                let name = name.as_ref();
                if name == b"item" || name == b"entry" {
                    if let Some(entry) = current.take() {
                        entries.push(entry);
                    }
                } else if let (Some(entry), Some(f)) = (current.as_mut(), field) {
                    if field_for(name) == Some(f) {
                        apply_field(entry, f, buf.trim());
                        field = None;
                        buf.clear();
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !saw_root {
        return Err(AdapterError::Decode("document is not an RSS or Atom feed".into()));
    }
    Ok(entries)
}

fn field_for(name: &[u8]) -> Option<Field> {
    match name {
        b"title" => Some(Field::Title),
        b"link" => Some(Field::Link),
        b"description" | b"summary" | b"content" | b"content:encoded" => Some(Field::Summary),
        b"pubDate" | b"published" | b"updated" | b"dc:date" => Some(Field::Published),
        _ => None,
    }
}

fn apply_field(entry: &mut FeedEntry, field: Field, value: &str) {
    match field {
        Field::Title => entry.title = value.to_string(),
        Field::Link => {
            if !value.is_empty() {
                entry.link = value.to_string();
            }
        }
        Field::Summary => {
            if entry.summary.is_empty() {
                entry.summary = value.to_string();
            }
        }
        Field::Published => {
            if entry.published.is_none() {
                entry.published = parse_date(value);
            }
        }
    }
}

fn href_of(e: &BytesStart<'_>) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.as_ref() == b"href")
        .map(|a| String::from_utf8_lossy(&a.value).into_owned())
}

fn is_alternate(e: &BytesStart<'_>) -> bool {
    e.attributes()
        .flatten()
        .find(|a| a.key.as_ref() == b"rel")
        .is_none_or(|a| a.value.as_ref() == b"alternate")
}

fn resolve_entity(name: &str) -> String {
    match name {
        "amp" => "&".into(),
        "lt" => "<".into(),
        "gt" => ">".into(),
        "quot" => "\"".into(),
        "apos" => "'".into(),
        _ => {
            let code = name
                .strip_prefix("#x")
                .or_else(|| name.strip_prefix("#X"))
                .and_then(|hex| u32::from_str_radix(hex, 16).ok())
                .or_else(|| name.strip_prefix('#').and_then(|d| d.parse().ok()));
            code.and_then(char::from_u32)
                .map(String::from)
                .unwrap_or_default()
        }
    }
}

/// RSS uses RFC 2822 dates, Atom uses RFC 3339.
fn parse_date(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(value)
        .or_else(|_| DateTime::parse_from_rfc3339(value))
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}
