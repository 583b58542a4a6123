//! Collaborator interfaces the pipeline persists through, and their
//! implementations.
//!
//! - [`MentionStore`]: the record store (`find_one`, `insert`, `count`)
//! - [`KeywordDirectory`]: the account/keyword store
//!
//! # Dedup scope
//!
//! Uniqueness of stored mentions is a deployment decision, expressed as a
//! [`DedupScope`] that both the existence check and the store's own
//! constraint follow:
//!
//! | Scope | Key | Meaning |
//! |-------|-----|---------|
//! | `per-owner` (default) | `(owner, url, keyword)` | each owner gets its own copy of an item per keyword |
//! | `global` | `url` | an item is stored once, for the first owner that matched it |

pub mod json;
pub mod memory;

use crate::error::{PipelineError, StoreError};
use crate::models::{EnrichedMention, OwnerKeywords};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use json::JsonLinesStore;
pub use memory::{MemoryStore, StaticDirectory};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum DedupScope {
    #[default]
    PerOwner,
    Global,
}

/// The identity a store enforces uniqueness on.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DedupKey {
    Owner {
        owner_id: String,
        url: String,
        keyword: String,
    },
    Url(String),
}

impl DedupScope {
    pub fn key(self, owner_id: &str, url: &str, keyword: &str) -> DedupKey {
        match self {
            DedupScope::PerOwner => DedupKey::Owner {
                owner_id: owner_id.to_string(),
                url: url.to_string(),
                keyword: keyword.to_string(),
            },
            DedupScope::Global => DedupKey::Url(url.to_string()),
        }
    }

    pub fn key_of(self, mention: &EnrichedMention) -> DedupKey {
        self.key(&mention.owner_id, &mention.url, &mention.keyword)
    }
}

/// Durable storage for enriched mentions.
///
/// `find_one` and `insert` both follow the store's [`DedupScope`]; `insert`
/// rejects a duplicate with [`StoreError::Conflict`].
#[async_trait]
pub trait MentionStore: Send + Sync {
    async fn find_one(
        &self,
        owner_id: &str,
        url: &str,
        keyword: &str,
    ) -> Result<Option<EnrichedMention>, StoreError>;

    async fn insert(&self, mention: EnrichedMention) -> Result<EnrichedMention, StoreError>;

    /// Number of records stored for `owner_id`.
    async fn count(&self, owner_id: &str) -> Result<usize, StoreError>;
}

/// Source of owners and the keywords they track.
#[async_trait]
pub trait KeywordDirectory: Send + Sync {
    /// Owners with at least one tracked keyword.
    async fn list_owners_with_keywords(&self) -> Result<Vec<OwnerKeywords>, PipelineError>;

    async fn get_owner(&self, owner_id: &str) -> Result<Option<OwnerKeywords>, PipelineError>;
}
