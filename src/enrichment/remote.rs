//! Remote text classifier and a retry decorator around it.
//!
//! # Architecture
//!
//! - [`RemoteClassifier`]: async sentiment + zero-shot topic scoring
//! - [`HttpClassifier`]: Hugging Face–style inference API client
//! - [`RetryClassifier`]: decorator adding exponential backoff with jitter
//!
//! # Retry Strategy
//!
//! Only transient failures (transport errors, timeouts, HTTP 429 and 5xx)
//! are retried. The delay between attempts is:
//!
//! ```text
//! delay = min(base_delay * 2^(attempt-1), max_delay) + random_jitter(0..250ms)
//! ```

use crate::error::ClassifierError;
use crate::models::Sentiment;
use crate::utils::truncate_for_log;
use async_trait::async_trait;
use rand::{Rng, rng};
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::fmt;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, error, instrument, warn};

/// Maximum characters of input text sent to a remote model.
pub const MAX_REMOTE_INPUT_CHARS: usize = 512;

/// Backoff stops doubling after this many attempts; `max_delay` caps it anyway.
const MAX_BACKOFF_EXPONENT: usize = 16;

/// A remote model able to label text.
#[async_trait]
pub trait RemoteClassifier: Send + Sync {
    async fn sentiment(&self, text: &str) -> Result<Sentiment, ClassifierError>;

    /// Score each candidate label. Returned pairs are sorted by descending
    /// score.
    async fn topics(
        &self,
        text: &str,
        candidates: &[&str],
    ) -> Result<Vec<(String, f64)>, ClassifierError>;
}

impl ClassifierError {
    /// Whether another attempt could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            ClassifierError::Http(_) | ClassifierError::Timeout(_) => true,
            ClassifierError::Status { status } => *status == 429 || *status >= 500,
            ClassifierError::NotConfigured | ClassifierError::Shape(_) => false,
        }
    }
}

#[derive(Debug, Deserialize)]
struct LabelScore {
    label: String,
    score: f64,
}

/// Sentiment responses come back nested one level per input, or flat.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SentimentResponse {
    Nested(Vec<Vec<LabelScore>>),
    Flat(Vec<LabelScore>),
}

#[derive(Debug, Deserialize)]
struct ZeroShotResponse {
    labels: Vec<String>,
    scores: Vec<f64>,
}

/// Map a model label onto the local three-way label set.
pub fn map_sentiment_label(label: &str) -> Option<Sentiment> {
    let label = label.to_ascii_lowercase();
    if label.starts_with("pos") || label == "label_2" {
        Some(Sentiment::Positive)
    } else if label.starts_with("neg") || label == "label_0" {
        Some(Sentiment::Negative)
    } else if label.starts_with("neu") || label == "label_1" {
        Some(Sentiment::Neutral)
    } else {
        None
    }
}

/// Longest slice of an unparseable body kept in the error.
const BODY_SNIPPET_BYTES: usize = 200;

fn shape_error(e: serde_json::Error, body: &str) -> ClassifierError {
    ClassifierError::Shape(format!("{e}; body: {}", truncate_for_log(body, BODY_SNIPPET_BYTES)))
}

/// Pick the highest-scoring label from a sentiment response body.
pub fn parse_sentiment(body: &str) -> Result<Sentiment, ClassifierError> {
    let response: SentimentResponse = serde_json::from_str(body).map_err(|e| shape_error(e, body))?;
    let scores = match response {
        SentimentResponse::Nested(outer) => outer.into_iter().flatten().collect::<Vec<_>>(),
        SentimentResponse::Flat(flat) => flat,
    };

    let top = scores
        .into_iter()
        .max_by(|a, b| a.score.total_cmp(&b.score))
        .ok_or_else(|| ClassifierError::Shape("empty label list".to_string()))?;

    map_sentiment_label(&top.label)
        .ok_or_else(|| ClassifierError::Shape(format!("unknown sentiment label {:?}", top.label)))
}

/// Zip a zero-shot response into `(label, score)` pairs, best first.
pub fn parse_zero_shot(body: &str) -> Result<Vec<(String, f64)>, ClassifierError> {
    let response: ZeroShotResponse = serde_json::from_str(body).map_err(|e| shape_error(e, body))?;
    if response.labels.len() != response.scores.len() {
        return Err(ClassifierError::Shape(format!(
            "{} labels but {} scores",
            response.labels.len(),
            response.scores.len()
        )));
    }

    let mut pairs: Vec<(String, f64)> = response.labels.into_iter().zip(response.scores).collect();
    pairs.sort_by(|a, b| b.1.total_cmp(&a.1));
    Ok(pairs)
}

/// Client for a hosted inference API.
pub struct HttpClassifier {
    client: Client,
    sentiment_url: String,
    topics_url: String,
    token: Option<String>,
    timeout: Duration,
}

impl fmt::Debug for HttpClassifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpClassifier")
            .field("sentiment_url", &self.sentiment_url)
            .field("topics_url", &self.topics_url)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl HttpClassifier {
    pub fn new(
        client: Client,
        sentiment_url: String,
        topics_url: Option<String>,
        token: Option<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            client,
            topics_url: topics_url.unwrap_or_else(|| sentiment_url.clone()),
            sentiment_url,
            token,
            timeout,
        }
    }

    async fn post(&self, url: &str, body: serde_json::Value) -> Result<String, ClassifierError> {
        let mut request = self.client.post(url).json(&body);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let call = async {
            let response = request.send().await?;
            let status = response.status();
            if !status.is_success() {
                return Err(ClassifierError::Status {
                    status: status.as_u16(),
                });
            }
            Ok(response.text().await?)
        };

        tokio::time::timeout(self.timeout, call)
            .await
            .map_err(|_| ClassifierError::Timeout(self.timeout))?
    }
}

#[async_trait]
impl RemoteClassifier for HttpClassifier {
    #[instrument(level = "debug", skip_all, fields(chars = text.chars().count()))]
    async fn sentiment(&self, text: &str) -> Result<Sentiment, ClassifierError> {
        let body = self
            .post(&self.sentiment_url, json!({ "inputs": text }))
            .await?;
        parse_sentiment(&body)
    }

    #[instrument(level = "debug", skip_all, fields(candidates = candidates.len()))]
    async fn topics(
        &self,
        text: &str,
        candidates: &[&str],
    ) -> Result<Vec<(String, f64)>, ClassifierError> {
        let body = self
            .post(
                &self.topics_url,
                json!({
                    "inputs": text,
                    "parameters": { "candidate_labels": candidates, "multi_label": true },
                }),
            )
            .await?;
        parse_zero_shot(&body)
    }
}

/// Wrapper that adds exponential backoff retry logic to any
/// [`RemoteClassifier`].
pub struct RetryClassifier<T> {
    inner: T,
    max_retries: usize,
    base_delay: Duration,
    max_delay: Duration,
}

impl<T> RetryClassifier<T>
where
    T: RemoteClassifier,
{
    pub fn new(inner: T, max_retries: usize, base_delay: Duration) -> Self {
        Self {
            inner,
            max_retries,
            base_delay,
            max_delay: Duration::from_secs(10),
        }
    }

    async fn with_retries<R, F, Fut>(&self, op: &'static str, mut call: F) -> Result<R, ClassifierError>
    where
        F: FnMut() -> Fut + Send,
        Fut: std::future::Future<Output = Result<R, ClassifierError>> + Send,
        R: Send,
    {
        let total_t0 = Instant::now();
        let mut attempt = 0usize;

        loop {
            let attempt_t0 = Instant::now();
            match call().await {
                Ok(resp) => return Ok(resp),
                Err(e) => {
                    attempt += 1;
                    let attempt_dt = attempt_t0.elapsed();
                    let total_dt = total_t0.elapsed();

                    if !e.is_transient() || attempt > self.max_retries {
                        error!(
                            op,
                            attempt,
                            max = self.max_retries,
                            elapsed_ms_attempt = attempt_dt.as_millis() as u64,
                            elapsed_ms_total = total_dt.as_millis() as u64,
                            error = %e,
                            "Classifier call gave up"
                        );
                        return Err(e);
                    }

                    let mut delay = self.base_delay.saturating_mul(1 << (attempt - 1).min(MAX_BACKOFF_EXPONENT));
                    if delay > self.max_delay {
                        delay = self.max_delay;
                    }
                    let jitter_ms: u64 = rng().random_range(0..=250);
                    let delay = delay + Duration::from_millis(jitter_ms);

                    warn!(
                        op,
                        attempt,
                        max = self.max_retries,
                        elapsed_ms_attempt = attempt_dt.as_millis() as u64,
                        ?delay,
                        error = %e,
                        "Classifier attempt failed; backing off"
                    );
                    sleep(delay).await;
                }
            }
        }
    }
}

impl<T> fmt::Debug for RetryClassifier<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryClassifier")
            .field("max_retries", &self.max_retries)
            .field("base_delay", &self.base_delay)
            .field("max_delay", &self.max_delay)
            .finish()
    }
}

#[async_trait]
impl<T> RemoteClassifier for RetryClassifier<T>
where
    T: RemoteClassifier,
{
    async fn sentiment(&self, text: &str) -> Result<Sentiment, ClassifierError> {
        let label = self
            .with_retries("sentiment", || self.inner.sentiment(text))
            .await?;
        debug!(sentiment = %label, "Remote sentiment");
        Ok(label)
    }

    async fn topics(
        &self,
        text: &str,
        candidates: &[&str],
    ) -> Result<Vec<(String, f64)>, ClassifierError> {
        self.with_retries("topics", || self.inner.topics(text, candidates))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{StubClassifier, StubReply};
    use std::sync::atomic::Ordering;

    #[test]
    fn test_parse_sentiment_nested() {
        let body = r#"[[{"label":"negative","score":0.1},{"label":"positive","score":0.85},{"label":"neutral","score":0.05}]]"#;
        assert_eq!(parse_sentiment(body).unwrap(), Sentiment::Positive);
    }

    #[test]
    fn test_parse_sentiment_flat_numbered_labels() {
        let body = r#"[{"label":"LABEL_0","score":0.7},{"label":"LABEL_1","score":0.2}]"#;
        assert_eq!(parse_sentiment(body).unwrap(), Sentiment::Negative);
    }

    #[test]
    fn test_parse_sentiment_bad_shapes() {
        assert!(matches!(parse_sentiment("{}"), Err(ClassifierError::Shape(_))));
        assert!(matches!(parse_sentiment("[[]]"), Err(ClassifierError::Shape(_))));
        assert!(matches!(
            parse_sentiment(r#"[{"label":"joy","score":0.9}]"#),
            Err(ClassifierError::Shape(_))
        ));
    }

    #[test]
    fn test_parse_zero_shot_sorts() {
        let body = r#"{"sequence":"x","labels":["sports","technology"],"scores":[0.2,0.9]}"#;
        let pairs = parse_zero_shot(body).unwrap();
        assert_eq!(pairs[0].0, "technology");
        assert_eq!(pairs[1].0, "sports");
    }

    #[test]
    fn test_parse_zero_shot_mismatch() {
        let body = r#"{"labels":["a","b"],"scores":[0.2]}"#;
        assert!(parse_zero_shot(body).is_err());
    }

    #[test]
    fn test_transient_classification() {
        assert!(ClassifierError::Status { status: 503 }.is_transient());
        assert!(ClassifierError::Status { status: 429 }.is_transient());
        assert!(!ClassifierError::Status { status: 401 }.is_transient());
        assert!(!ClassifierError::Shape("x".into()).is_transient());
        assert!(ClassifierError::Timeout(Duration::from_secs(1)).is_transient());
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_recovers_after_transient_failures() {
        let stub = StubClassifier::new(StubReply::FailTimes(2, Sentiment::Positive));
        let retry = RetryClassifier::new(stub, 3, Duration::from_millis(100));

        assert_eq!(retry.sentiment("x").await.unwrap(), Sentiment::Positive);
        assert_eq!(retry.inner.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_gives_up() {
        let stub = StubClassifier::new(StubReply::Fail);
        let retry = RetryClassifier::new(stub, 2, Duration::from_millis(100));

        assert!(retry.sentiment("x").await.is_err());
        assert_eq!(retry.inner.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_skips_permanent_errors() {
        let stub = StubClassifier::new(StubReply::BadShape);
        let retry = RetryClassifier::new(stub, 5, Duration::from_millis(100));

        assert!(matches!(retry.topics("x", &["a"]).await, Err(ClassifierError::Shape(_))));
        assert_eq!(retry.inner.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_survives_large_retry_budget() {
        let stub = StubClassifier::new(StubReply::FailTimes(40, Sentiment::Neutral));
        let retry = RetryClassifier::new(stub, 64, Duration::from_millis(100));

        assert_eq!(retry.sentiment("x").await.unwrap(), Sentiment::Neutral);
        assert_eq!(retry.inner.calls.load(Ordering::SeqCst), 41);
    }

    #[test]
    fn test_shape_error_carries_truncated_body() {
        let body = format!("<html>{}</html>", "x".repeat(1000));
        let Err(ClassifierError::Shape(message)) = parse_zero_shot(&body) else {
            panic!("expected a shape error");
        };
        assert!(message.contains("body: <html>xxx"));
        assert!(message.contains("bytes)"));
        assert!(message.len() < body.len());
    }
}
