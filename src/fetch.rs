//! Fetch coordinator: fans one keyword list out to every provider adapter
//! and fans the results back in.
//!
//! One task is spawned per adapter. Each task runs under the adapter's own
//! deadline for the keyword count; an elapsed deadline, an adapter error, or a panicking task all
//! resolve to an [`AdapterError`] for that adapter alone. The coordinator
//! waits for every task to settle before returning.

use crate::error::AdapterError;
use crate::models::RawItem;
use crate::sources::Source;
use futures::future::join_all;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};

/// What one adapter produced during a fan-out.
#[derive(Debug)]
pub struct AdapterOutcome {
    pub source: &'static str,
    pub result: Result<Vec<RawItem>, AdapterError>,
    pub elapsed: Duration,
}

pub struct FetchCoordinator {
    sources: Vec<Arc<dyn Source>>,
}

impl FetchCoordinator {
    pub fn new(sources: Vec<Arc<dyn Source>>) -> Self {
        Self { sources }
    }

    pub fn source_names(&self) -> Vec<&'static str> {
        self.sources.iter().map(|s| s.name()).collect()
    }

    /// Fetch from every adapter and concatenate the items that came back.
    ///
    /// Failed adapters are logged and contribute nothing. Duplicates across
    /// adapters are kept.
    #[instrument(level = "info", skip_all, fields(keywords = keywords.len(), adapters = self.sources.len()))]
    pub async fn fetch_all(&self, keywords: &[String]) -> Vec<RawItem> {
        let mut items = Vec::new();
        let mut failed = 0usize;

        for outcome in self.fetch_outcomes(keywords).await {
            let elapsed_ms = outcome.elapsed.as_millis() as u64;
            match outcome.result {
                Ok(found) => {
                    debug!(source = outcome.source, count = found.len(), elapsed_ms, "Adapter finished");
                    items.extend(found);
                }
                Err(e) => {
                    failed += 1;
                    warn!(
                        source = outcome.source,
                        elapsed_ms,
                        error = %e,
                        "Adapter failed; contributing zero items"
                    );
                }
            }
        }

        info!(count = items.len(), failed, "Fetched candidate items");
        items
    }

    /// Run the fan-out and report each adapter's result separately.
    ///
    /// An empty keyword list returns immediately without invoking adapters.
    pub async fn fetch_outcomes(&self, keywords: &[String]) -> Vec<AdapterOutcome> {
        if keywords.is_empty() {
            return Vec::new();
        }
        let keywords: Arc<[String]> = keywords.into();

        let handles = self.sources.iter().map(|source| {
            let source = Arc::clone(source);
            let keywords = Arc::clone(&keywords);
            let name = source.name();
            let handle = tokio::spawn(async move {
                let limit = source.deadline(keywords.len());
                match tokio::time::timeout(limit, source.fetch(&keywords)).await {
                    Ok(result) => result,
                    Err(_) => Err(AdapterError::Timeout(limit)),
                }
            });
            async move {
                let started = Instant::now();
                let result = match handle.await {
                    Ok(result) => result,
                    Err(e) => Err(AdapterError::Join(e.to_string())),
                };
                AdapterOutcome {
                    source: name,
                    result,
                    elapsed: started.elapsed(),
                }
            }
        });

        join_all(handles).await
    }
}
