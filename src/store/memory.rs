//! In-process record store and a static keyword directory.

use super::{DedupKey, DedupScope, KeywordDirectory, MentionStore};
use crate::error::{PipelineError, StoreError};
use crate::models::{EnrichedMention, OwnerKeywords};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

#[derive(Default)]
struct Inner {
    records: Vec<EnrichedMention>,
    index: HashMap<DedupKey, usize>,
}

/// Record store backed by a vector and a unique index on the dedup key.
///
/// The existence check and the insert take the same lock, so the unique
/// index is authoritative even under concurrent callers.
pub struct MemoryStore {
    scope: DedupScope,
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new(scope: DedupScope) -> Self {
        Self {
            scope,
            inner: RwLock::new(Inner::default()),
        }
    }

    pub fn scope(&self) -> DedupScope {
        self.scope
    }

    pub async fn contains(&self, mention: &EnrichedMention) -> bool {
        self.inner
            .read()
            .await
            .index
            .contains_key(&self.scope.key_of(mention))
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.records.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn all(&self) -> Vec<EnrichedMention> {
        self.inner.read().await.records.clone()
    }
}

#[async_trait]
impl MentionStore for MemoryStore {
    async fn find_one(
        &self,
        owner_id: &str,
        url: &str,
        keyword: &str,
    ) -> Result<Option<EnrichedMention>, StoreError> {
        let key = self.scope.key(owner_id, url, keyword);
        let inner = self.inner.read().await;
        Ok(inner.index.get(&key).map(|&i| inner.records[i].clone()))
    }

    async fn insert(&self, mention: EnrichedMention) -> Result<EnrichedMention, StoreError> {
        let key = self.scope.key_of(&mention);
        let mut inner = self.inner.write().await;
        if inner.index.contains_key(&key) {
            return Err(StoreError::Conflict {
                url: mention.url,
                keyword: mention.keyword,
            });
        }
        let position = inner.records.len();
        inner.records.push(mention.clone());
        inner.index.insert(key, position);
        Ok(mention)
    }

    async fn count(&self, owner_id: &str) -> Result<usize, StoreError> {
        Ok(self
            .inner
            .read()
            .await
            .records
            .iter()
            .filter(|m| m.owner_id == owner_id)
            .count())
    }
}

/// Keyword directory over a fixed owner list, typically from configuration.
#[derive(Debug, Clone, Default)]
pub struct StaticDirectory {
    owners: Vec<OwnerKeywords>,
}

impl StaticDirectory {
    pub fn new(owners: Vec<OwnerKeywords>) -> Self {
        let owners = owners
            .into_iter()
            .map(|mut owner| {
                owner.keywords.retain(|k| !k.trim().is_empty());
                owner
            })
            .collect();
        Self { owners }
    }
}

#[async_trait]
impl KeywordDirectory for StaticDirectory {
    async fn list_owners_with_keywords(&self) -> Result<Vec<OwnerKeywords>, PipelineError> {
        Ok(self
            .owners
            .iter()
            .filter(|o| !o.keywords.is_empty())
            .cloned()
            .collect())
    }

    async fn get_owner(&self, owner_id: &str) -> Result<Option<OwnerKeywords>, PipelineError> {
        Ok(self.owners.iter().find(|o| o.id == owner_id).cloned())
    }
}
