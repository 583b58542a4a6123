//! Dedup & persistence gateway.
//!
//! For each raw item: existence check on the dedup key, enrichment,
//! insert, then a best-effort realtime notification. The existence check
//! and the insert are separate calls; the store's unique constraint settles
//! races between concurrent callers.

use crate::enrichment::Enricher;
use crate::error::StoreError;
use crate::models::{EnrichedMention, RawItem};
use crate::realtime::{MENTION_CREATED, Notifier};
use crate::store::MentionStore;
use rand::{Rng, rng};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// What happened to one raw item.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreOutcome {
    Stored(EnrichedMention),
    /// Already stored; nothing was enriched or published.
    Skipped,
    /// Lost an insert race; treated as already processed.
    Conflict,
}

/// Per-batch tally.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub stored: usize,
    pub skipped: usize,
    pub conflicts: usize,
    pub failed: usize,
    pub delivered: usize,
}

pub struct Gateway {
    store: Arc<dyn MentionStore>,
    enricher: Arc<Enricher>,
    notifier: Notifier,
}

impl Gateway {
    pub fn new(store: Arc<dyn MentionStore>, enricher: Arc<Enricher>, notifier: Notifier) -> Self {
        Self {
            store,
            enricher,
            notifier,
        }
    }

    pub fn enricher(&self) -> &Enricher {
        &self.enricher
    }

    /// Store one item for `owner_id` unless it is already present.
    pub async fn store(&self, owner_id: &str, item: &RawItem) -> Result<StoreOutcome, StoreError> {
        Ok(self.store_and_notify(owner_id, item).await?.0)
    }

    async fn store_and_notify(
        &self,
        owner_id: &str,
        item: &RawItem,
    ) -> Result<(StoreOutcome, bool), StoreError> {
        if self
            .store
            .find_one(owner_id, &item.url, &item.keyword)
            .await?
            .is_some()
        {
            return Ok((StoreOutcome::Skipped, false));
        }

        let classification = self.enricher.classify(&item.text).await;
        let engagement_score: f64 = rng().random_range(0.0..100.0);
        let mention = EnrichedMention::from_raw(owner_id, item, classification, engagement_score);

        let saved = match self.store.insert(mention).await {
            Ok(saved) => saved,
            Err(StoreError::Conflict { url, keyword }) => {
                info!(owner = owner_id, url = %url, keyword = %keyword, "Mention stored concurrently; skipping");
                return Ok((StoreOutcome::Conflict, false));
            }
            Err(e) => return Err(e),
        };

        let delivered = self.notifier.notify(owner_id, MENTION_CREATED, &saved).await;
        debug!(
            owner = owner_id,
            url = %saved.url,
            sentiment = %saved.sentiment,
            delivered,
            "Stored mention"
        );
        Ok((StoreOutcome::Stored(saved), delivered))
    }

    /// Feed items through [`store`](Self::store) one at a time, in order.
    /// A failing item is logged with its url and skipped.
    #[instrument(level = "info", skip_all, fields(owner = owner_id, items = items.len()))]
    pub async fn process_items(&self, owner_id: &str, items: &[RawItem]) -> BatchSummary {
        let mut summary = BatchSummary::default();

        for item in items {
            match self.store_and_notify(owner_id, item).await {
                Ok((StoreOutcome::Stored(_), delivered)) => {
                    summary.stored += 1;
                    if delivered {
                        summary.delivered += 1;
                    }
                }
                Ok((StoreOutcome::Skipped, _)) => summary.skipped += 1,
                Ok((StoreOutcome::Conflict, _)) => summary.conflicts += 1,
                Err(e) => {
                    summary.failed += 1;
                    warn!(
                        url = %item.url,
                        keyword = %item.keyword,
                        source = %item.source_name,
                        error = %e,
                        "Failed to process item"
                    );
                }
            }
        }

        info!(
            stored = summary.stored,
            skipped = summary.skipped,
            conflicts = summary.conflicts,
            failed = summary.failed,
            "Processed items"
        );
        summary
    }
}
