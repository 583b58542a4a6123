//! Enrichment service: sentiment and topic labels for mention text.
//!
//! Each sub-operation prefers the remote classifier when one is configured
//! and falls back to the deterministic [`lexicon`] heuristics on absence,
//! error, timeout, or an unusable response. Callers never see an error.

pub mod lexicon;
pub mod remote;

use crate::config::ClassifierConfig;
use crate::models::{Classification, Sentiment};
use crate::utils::truncate_chars;
use remote::{HttpClassifier, MAX_REMOTE_INPUT_CHARS, RemoteClassifier, RetryClassifier};
use reqwest::Client;
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Minimum remote confidence for a topic label to be kept.
pub const TOPIC_THRESHOLD: f64 = 0.3;

#[derive(Debug, Default)]
struct Counters {
    remote: AtomicU64,
    remote_failures: AtomicU64,
    fallback: AtomicU64,
}

/// Snapshot of the diagnostic counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichmentStats {
    /// Sub-operations answered by the remote classifier.
    pub remote_calls: u64,
    /// Remote attempts that failed or returned nothing usable.
    pub remote_failures: u64,
    /// Sub-operations answered by the local heuristics.
    pub fallback_calls: u64,
}

pub struct Enricher {
    remote: Option<Arc<dyn RemoteClassifier>>,
    counters: Counters,
}

impl Enricher {
    /// Local heuristics only.
    pub fn local() -> Self {
        Self {
            remote: None,
            counters: Counters::default(),
        }
    }

    pub fn with_remote(remote: Arc<dyn RemoteClassifier>) -> Self {
        Self {
            remote: Some(remote),
            counters: Counters::default(),
        }
    }

    /// Build from configuration; no `url` means local heuristics only.
    pub fn from_config(config: &ClassifierConfig, client: Client) -> Self {
        match &config.url {
            Some(url) => {
                info!(url = %url, topics_url = ?config.topics_url, "Remote classifier configured");
                let http = HttpClassifier::new(
                    client,
                    url.clone(),
                    config.topics_url.clone(),
                    config.token.clone(),
                    config.timeout(),
                );
                Self::with_remote(Arc::new(RetryClassifier::new(
                    http,
                    config.max_retries,
                    Duration::from_millis(500),
                )))
            }
            None => {
                info!("No remote classifier configured; using local heuristics");
                Self::local()
            }
        }
    }

    pub fn has_remote(&self) -> bool {
        self.remote.is_some()
    }

    /// Classify text. Always resolves to a valid pair.
    pub async fn classify(&self, text: &str) -> Classification {
        let (sentiment, topics) = tokio::join!(self.sentiment(text), self.topics(text));
        Classification { sentiment, topics }
    }

    pub async fn sentiment(&self, text: &str) -> Sentiment {
        if let Some(remote) = &self.remote {
            let input = truncate_chars(text, MAX_REMOTE_INPUT_CHARS);
            match remote.sentiment(&input).await {
                Ok(label) => {
                    self.counters.remote.fetch_add(1, Ordering::Relaxed);
                    return label;
                }
                Err(e) => {
                    self.counters.remote_failures.fetch_add(1, Ordering::Relaxed);
                    warn!(error = %e, "Remote sentiment failed; using fallback");
                }
            }
        }
        self.counters.fallback.fetch_add(1, Ordering::Relaxed);
        lexicon::sentiment(text)
    }

    pub async fn topics(&self, text: &str) -> Vec<String> {
        if let Some(remote) = &self.remote {
            let input = truncate_chars(text, MAX_REMOTE_INPUT_CHARS);
            let candidates = lexicon::category_names();
            match remote.topics(&input, &candidates).await {
                Ok(scored) => {
                    let kept = select_topics(scored);
                    if !kept.is_empty() {
                        self.counters.remote.fetch_add(1, Ordering::Relaxed);
                        return kept;
                    }
                    self.counters.remote_failures.fetch_add(1, Ordering::Relaxed);
                    debug!("No remote topic met the confidence bar; using fallback");
                }
                Err(e) => {
                    self.counters.remote_failures.fetch_add(1, Ordering::Relaxed);
                    warn!(error = %e, "Remote topics failed; using fallback");
                }
            }
        }
        self.counters.fallback.fetch_add(1, Ordering::Relaxed);
        lexicon::topics(text)
    }

    pub fn stats(&self) -> EnrichmentStats {
        EnrichmentStats {
            remote_calls: self.counters.remote.load(Ordering::Relaxed),
            remote_failures: self.counters.remote_failures.load(Ordering::Relaxed),
            fallback_calls: self.counters.fallback.load(Ordering::Relaxed),
        }
    }
}

/// Keep labels at or above [`TOPIC_THRESHOLD`], best first, at most
/// [`lexicon::MAX_TOPICS`].
pub fn select_topics(mut scored: Vec<(String, f64)>) -> Vec<String> {
    scored.sort_by(|a, b| b.1.total_cmp(&a.1));
    scored
        .into_iter()
        .filter(|(_, score)| *score >= TOPIC_THRESHOLD)
        .take(lexicon::MAX_TOPICS)
        .map(|(label, _)| label)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{StubClassifier, StubReply};
    use std::sync::atomic::Ordering;

    fn scored(pairs: &[(&str, f64)]) -> Vec<(String, f64)> {
        pairs.iter().map(|(l, s)| (l.to_string(), *s)).collect()
    }

    #[tokio::test]
    async fn test_local_positive() {
        let enricher = Enricher::local();
        let c = enricher.classify("This is an amazing breakthrough").await;
        assert_eq!(c.sentiment, Sentiment::Positive);
        assert!(!c.topics.is_empty());
    }

    #[tokio::test]
    async fn test_local_negative() {
        let enricher = Enricher::local();
        let c = enricher
            .classify("stock prices crash amid fraud investigation")
            .await;
        assert_eq!(c.sentiment, Sentiment::Negative);
    }

    #[tokio::test]
    async fn test_local_general_topic() {
        let enricher = Enricher::local();
        assert_eq!(enricher.topics("nothing to see here").await, vec!["general"]);
        let stats = enricher.stats();
        assert_eq!(stats.fallback_calls, 1);
        assert_eq!(stats.remote_calls, 0);
    }

    #[tokio::test]
    async fn test_remote_answer_used() {
        let stub = Arc::new(StubClassifier::new(StubReply::Fixed(
            Sentiment::Negative,
            scored(&[("technology", 0.9), ("sports", 0.1), ("science", 0.4)]),
        )));
        let enricher = Enricher::with_remote(stub.clone());

        let c = enricher.classify("This is an amazing breakthrough").await;
        assert_eq!(c.sentiment, Sentiment::Negative);
        assert_eq!(c.topics, vec!["technology", "science"]);
        assert_eq!(enricher.stats().remote_calls, 2);
        assert_eq!(enricher.stats().fallback_calls, 0);
    }

    #[tokio::test]
    async fn test_remote_failure_falls_back() {
        let stub = Arc::new(StubClassifier::new(StubReply::Fail));
        let enricher = Enricher::with_remote(stub.clone());

        let c = enricher.classify("This is an amazing breakthrough").await;
        assert_eq!(c.sentiment, Sentiment::Positive);
        assert_eq!(c.topics, vec!["general"]);

        let stats = enricher.stats();
        assert_eq!(stats.remote_failures, 2);
        assert_eq!(stats.fallback_calls, 2);
        assert_eq!(stub.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_low_confidence_topics_fall_back() {
        let stub = Arc::new(StubClassifier::new(StubReply::Fixed(
            Sentiment::Neutral,
            scored(&[("technology", 0.29), ("sports", 0.1)]),
        )));
        let enricher = Enricher::with_remote(stub);

        let topics = enricher.topics("stock prices crash amid fraud investigation").await;
        assert_eq!(topics, vec!["finance", "legal"]);
    }

    #[tokio::test]
    async fn test_remote_input_is_truncated() {
        let stub = Arc::new(StubClassifier::new(StubReply::Fixed(
            Sentiment::Neutral,
            scored(&[("technology", 0.9)]),
        )));
        let enricher = Enricher::with_remote(stub.clone());

        enricher.sentiment(&"x".repeat(2000)).await;
        assert_eq!(stub.last_input_chars.load(Ordering::SeqCst), MAX_REMOTE_INPUT_CHARS);
    }

    #[test]
    fn test_select_topics_threshold_and_cap() {
        let kept = select_topics(scored(&[
            ("a", 0.3),
            ("b", 0.95),
            ("c", 0.5),
            ("d", 0.4),
            ("e", 0.1),
        ]));
        assert_eq!(kept, vec!["b", "c", "d"]);
        assert!(select_topics(scored(&[("a", 0.2)])).is_empty());
    }

    #[test]
    fn test_from_config_without_url_is_local() {
        let enricher = Enricher::from_config(&ClassifierConfig::default(), Client::new());
        assert!(!enricher.has_remote());
    }
}
