//! Single-owner poll cycle body and the per-owner lock both cycle kinds
//! acquire before running it.

use crate::error::PipelineError;
use crate::fetch::FetchCoordinator;
use crate::gateway::Gateway;
use crate::models::{OwnerKeywords, PollOutcome};
use crate::store::{KeywordDirectory, MentionStore};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::{info, instrument, warn};

/// Keyed async mutex: at most one cycle body runs per owner at a time.
#[derive(Default)]
pub struct OwnerLocks {
    locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

/// Held for the duration of one owner's body; released on drop.
pub struct OwnerGuard {
    _guard: OwnedMutexGuard<()>,
}

impl OwnerLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, owner_id: &str) -> Arc<AsyncMutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|p| p.into_inner());
        Arc::clone(locks.entry(owner_id.to_string()).or_default())
    }

    /// Wait for the owner's lock.
    pub async fn acquire(&self, owner_id: &str) -> OwnerGuard {
        OwnerGuard {
            _guard: self.slot(owner_id).lock_owned().await,
        }
    }

    /// Whether a body currently holds the owner's lock. Never creates a slot.
    pub fn is_locked(&self, owner_id: &str) -> bool {
        let locks = self.locks.lock().unwrap_or_else(|p| p.into_inner());
        locks
            .get(owner_id)
            .is_some_and(|slot| slot.try_lock().is_err())
    }

    pub fn len(&self) -> usize {
        self.locks.lock().unwrap_or_else(|p| p.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Result of one owner's body.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OwnerRun {
    pub mentions_added: usize,
    /// False when any step logged an error; the count is then best effort.
    pub clean: bool,
}

pub struct MentionPipeline {
    directory: Arc<dyn KeywordDirectory>,
    store: Arc<dyn MentionStore>,
    fetcher: FetchCoordinator,
    gateway: Gateway,
    locks: OwnerLocks,
}

impl MentionPipeline {
    pub fn new(
        directory: Arc<dyn KeywordDirectory>,
        store: Arc<dyn MentionStore>,
        fetcher: FetchCoordinator,
        gateway: Gateway,
    ) -> Self {
        Self {
            directory,
            store,
            fetcher,
            gateway,
            locks: OwnerLocks::new(),
        }
    }

    pub fn directory(&self) -> &dyn KeywordDirectory {
        self.directory.as_ref()
    }

    pub fn gateway(&self) -> &Gateway {
        &self.gateway
    }

    pub fn locks(&self) -> &OwnerLocks {
        &self.locks
    }

    /// Count, fetch, store, count again, for one owner.
    ///
    /// `mentions_added` is the record-count delta. If either count fails the
    /// gateway's own tally of stored items is reported instead.
    #[instrument(level = "info", skip_all, fields(owner = %owner.id, keywords = owner.keywords.len()))]
    pub async fn process_owner(&self, owner: &OwnerKeywords) -> OwnerRun {
        let _guard = self.locks.acquire(&owner.id).await;
        let started = Instant::now();
        let mut clean = true;

        let before = match self.store.count(&owner.id).await {
            Ok(n) => Some(n),
            Err(e) => {
                warn!(error = %e, "Could not read record count before processing");
                clean = false;
                None
            }
        };

        let items = self.fetcher.fetch_all(&owner.keywords).await;
        let summary = self.gateway.process_items(&owner.id, &items).await;
        if summary.failed > 0 {
            clean = false;
        }

        let after = match self.store.count(&owner.id).await {
            Ok(n) => Some(n),
            Err(e) => {
                warn!(error = %e, "Could not read record count after processing");
                clean = false;
                None
            }
        };

        let mentions_added = match (before, after) {
            (Some(before), Some(after)) => after.saturating_sub(before),
            _ => summary.stored,
        };

        info!(
            mentions_added,
            clean,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Owner processed"
        );
        OwnerRun {
            mentions_added,
            clean,
        }
    }

    /// Manual, on-demand cycle for one owner.
    ///
    /// Only a missing owner (or an unreachable directory) is an error;
    /// processing failures still report a best-effort count.
    #[instrument(level = "info", skip(self))]
    pub async fn poll_for_owner(&self, owner_id: &str) -> Result<PollOutcome, PipelineError> {
        let owner = self
            .directory
            .get_owner(owner_id)
            .await?
            .ok_or_else(|| PipelineError::OwnerNotFound(owner_id.to_string()))?;

        let run = self.process_owner(&owner).await;
        Ok(PollOutcome {
            mentions_added: run.mentions_added,
        })
    }
}
