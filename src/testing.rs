//! Stub collaborators shared by the unit tests.

use crate::enrichment::Enricher;
use crate::enrichment::remote::RemoteClassifier;
use crate::error::{AdapterError, ClassifierError, PipelineError, StoreError};
use crate::fetch::FetchCoordinator;
use crate::gateway::Gateway;
use crate::models::{Classification, EnrichedMention, OwnerKeywords, RawItem, Sentiment};
use crate::pipeline::MentionPipeline;
use crate::realtime::Notifier;
use crate::sources::{Source, batched_deadline, fetch_each};
use crate::store::{DedupScope, KeywordDirectory, MemoryStore, MentionStore, StaticDirectory};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

pub fn raw_item(keyword: &str, url: &str) -> RawItem {
    RawItem {
        keyword: keyword.to_string(),
        source_name: "stub".to_string(),
        text: format!("{keyword}: something happened"),
        url: url.to_string(),
        timestamp: Utc::now(),
        estimated_reach: 10,
    }
}

pub fn mention(owner_id: &str, url: &str, keyword: &str) -> EnrichedMention {
    EnrichedMention::from_raw(
        owner_id,
        &raw_item(keyword, url),
        Classification {
            sentiment: Sentiment::Neutral,
            topics: vec!["general".to_string()],
        },
        50.0,
    )
}

pub fn owner(id: &str, keywords: &[&str]) -> OwnerKeywords {
    OwnerKeywords {
        id: id.to_string(),
        keywords: keywords.iter().map(|k| k.to_string()).collect(),
    }
}

pub fn pipeline_with(
    store: Arc<dyn MentionStore>,
    owners: Vec<OwnerKeywords>,
    sources: Vec<Arc<dyn Source>>,
) -> MentionPipeline {
    MentionPipeline::new(
        Arc::new(StaticDirectory::new(owners)),
        store.clone(),
        FetchCoordinator::new(sources),
        Gateway::new(store, Arc::new(Enricher::local()), Notifier::disabled()),
    )
}

pub enum StubBehavior {
    Items(Vec<RawItem>),
    Fail,
    Panic,
    Hang,
}

pub struct StubSource {
    name: &'static str,
    behavior: StubBehavior,
    timeout: Duration,
    delay: Option<Duration>,
    pub calls: AtomicUsize,
}

impl StubSource {
    pub fn new(name: &'static str, behavior: StubBehavior) -> Self {
        Self {
            name,
            behavior,
            timeout: Duration::from_secs(10),
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[async_trait]
impl Source for StubSource {
    fn name(&self) -> &'static str {
        self.name
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn fetch(&self, _keywords: &[String]) -> Result<Vec<RawItem>, AdapterError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match &self.behavior {
            StubBehavior::Items(items) => Ok(items.clone()),
            StubBehavior::Fail => Err(AdapterError::Status { status: 503 }),
            StubBehavior::Panic => panic!("stub source {} panicked", self.name),
            StubBehavior::Hang => std::future::pending().await,
        }
    }
}

/// Issues one simulated request per keyword, each taking `latency`.
///
/// The request itself is not bounded, so a `latency` beyond `timeout` only
/// ends through the coordinator's deadline.
pub struct KeywordSource {
    timeout: Duration,
    latency: Duration,
}

impl KeywordSource {
    pub fn new(timeout: Duration, latency: Duration) -> Self {
        Self { timeout, latency }
    }
}

#[async_trait]
impl Source for KeywordSource {
    fn name(&self) -> &'static str {
        "per-keyword"
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    fn deadline(&self, keywords: usize) -> Duration {
        batched_deadline(self.timeout, keywords)
    }

    async fn fetch(&self, keywords: &[String]) -> Result<Vec<RawItem>, AdapterError> {
        fetch_each(self.name(), keywords, |keyword| async move {
            tokio::time::sleep(self.latency).await;
            Ok::<_, AdapterError>(vec![raw_item(keyword, &format!("https://kw/{keyword}"))])
        })
        .await
    }
}

pub enum StubReply {
    Fixed(Sentiment, Vec<(String, f64)>),
    /// Transient failure on every call.
    Fail,
    /// Transient failure for the first N calls, then the given sentiment.
    FailTimes(usize, Sentiment),
    BadShape,
}

pub struct StubClassifier {
    reply: StubReply,
    pub calls: AtomicUsize,
    pub last_input_chars: AtomicUsize,
}

impl StubClassifier {
    pub fn new(reply: StubReply) -> Self {
        Self {
            reply,
            calls: AtomicUsize::new(0),
            last_input_chars: AtomicUsize::new(0),
        }
    }

    fn record(&self, text: &str) -> usize {
        self.last_input_chars
            .store(text.chars().count(), Ordering::SeqCst);
        self.calls.fetch_add(1, Ordering::SeqCst)
    }
}

#[async_trait]
impl RemoteClassifier for StubClassifier {
    async fn sentiment(&self, text: &str) -> Result<Sentiment, ClassifierError> {
        let previous = self.record(text);
        match &self.reply {
            StubReply::Fixed(sentiment, _) => Ok(*sentiment),
            StubReply::Fail => Err(ClassifierError::Status { status: 503 }),
            StubReply::FailTimes(n, sentiment) if previous >= *n => Ok(*sentiment),
            StubReply::FailTimes(..) => Err(ClassifierError::Status { status: 503 }),
            StubReply::BadShape => Err(ClassifierError::Shape("stub".to_string())),
        }
    }

    async fn topics(
        &self,
        text: &str,
        _candidates: &[&str],
    ) -> Result<Vec<(String, f64)>, ClassifierError> {
        let previous = self.record(text);
        match &self.reply {
            StubReply::Fixed(_, topics) => Ok(topics.clone()),
            StubReply::Fail => Err(ClassifierError::Status { status: 503 }),
            StubReply::FailTimes(n, _) if previous >= *n => Ok(Vec::new()),
            StubReply::FailTimes(..) => Err(ClassifierError::Status { status: 503 }),
            StubReply::BadShape => Err(ClassifierError::Shape("stub".to_string())),
        }
    }
}

/// A [`MemoryStore`] with injectable failures.
pub struct FlakyStore {
    inner: MemoryStore,
    conflict_on_insert: bool,
    fail_url: Option<String>,
    fail_count: bool,
    panic_count_for: Option<String>,
}

impl FlakyStore {
    fn base() -> Self {
        Self {
            inner: MemoryStore::new(DedupScope::PerOwner),
            conflict_on_insert: false,
            fail_url: None,
            fail_count: false,
            panic_count_for: None,
        }
    }

    /// Existence check misses, insert reports a conflict.
    pub fn conflict_on_insert() -> Self {
        Self {
            conflict_on_insert: true,
            ..Self::base()
        }
    }

    pub fn fail_url(url: &str) -> Self {
        Self {
            fail_url: Some(url.to_string()),
            ..Self::base()
        }
    }

    pub fn fail_count() -> Self {
        Self {
            fail_count: true,
            ..Self::base()
        }
    }

    /// Counting records for `owner_id` panics.
    pub fn panic_on_count(owner_id: &str) -> Self {
        Self {
            panic_count_for: Some(owner_id.to_string()),
            ..Self::base()
        }
    }
}

#[async_trait]
impl MentionStore for FlakyStore {
    async fn find_one(
        &self,
        owner_id: &str,
        url: &str,
        keyword: &str,
    ) -> Result<Option<EnrichedMention>, StoreError> {
        if self.conflict_on_insert {
            return Ok(None);
        }
        self.inner.find_one(owner_id, url, keyword).await
    }

    async fn insert(&self, mention: EnrichedMention) -> Result<EnrichedMention, StoreError> {
        if self.conflict_on_insert {
            return Err(StoreError::Conflict {
                url: mention.url,
                keyword: mention.keyword,
            });
        }
        if self.fail_url.as_deref() == Some(mention.url.as_str()) {
            return Err(StoreError::Io(std::io::Error::other("disk full")));
        }
        self.inner.insert(mention).await
    }

    async fn count(&self, owner_id: &str) -> Result<usize, StoreError> {
        if self.fail_count {
            return Err(StoreError::Io(std::io::Error::other("count unavailable")));
        }
        if self.panic_count_for.as_deref() == Some(owner_id) {
            panic!("count for {owner_id} blew up");
        }
        self.inner.count(owner_id).await
    }
}

pub enum DirectoryFault {
    /// Listing returns an error.
    Error,
    /// Listing panics on the first call, then succeeds.
    PanicOnce,
}

/// Wraps a [`StaticDirectory`] and injects a listing fault.
pub struct FaultyDirectory {
    inner: StaticDirectory,
    fault: DirectoryFault,
    pub calls: AtomicUsize,
}

impl FaultyDirectory {
    pub fn new(owners: Vec<OwnerKeywords>, fault: DirectoryFault) -> Self {
        Self {
            inner: StaticDirectory::new(owners),
            fault,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl KeywordDirectory for FaultyDirectory {
    async fn list_owners_with_keywords(&self) -> Result<Vec<OwnerKeywords>, PipelineError> {
        let previous = self.calls.fetch_add(1, Ordering::SeqCst);
        match self.fault {
            DirectoryFault::Error => Err(PipelineError::Directory("connection refused".to_string())),
            DirectoryFault::PanicOnce if previous == 0 => panic!("directory blew up"),
            DirectoryFault::PanicOnce => self.inner.list_owners_with_keywords().await,
        }
    }

    async fn get_owner(&self, owner_id: &str) -> Result<Option<OwnerKeywords>, PipelineError> {
        self.inner.get_owner(owner_id).await
    }
}
