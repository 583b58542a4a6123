//! Data models for raw candidate items and stored mentions.
//!
//! - [`RawItem`]: an ephemeral candidate produced by a provider adapter
//! - [`EnrichedMention`]: the durable, classified record
//! - [`Classification`]: the sentiment/topic pair produced by enrichment
//! - [`CycleResult`] / [`PollOutcome`]: what a poll cycle reports upward
//!
//! Stored records serialize with camelCase field names so they can be handed
//! to realtime subscribers and external readers unchanged.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Maximum length, in characters, of the text carried by a [`RawItem`].
pub const MAX_ITEM_TEXT_CHARS: usize = 500;

/// Sentinel topic emitted when no category matches.
pub const GENERAL_TOPIC: &str = "general";

/// A candidate content item matched by an adapter for one keyword.
///
/// Raw items only live for the duration of one poll cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct RawItem {
    /// The tracked keyword this item matched.
    pub keyword: String,
    /// Name of the adapter that produced the item.
    pub source_name: String,
    /// Plain text, at most [`MAX_ITEM_TEXT_CHARS`] characters.
    pub text: String,
    pub url: String,
    pub timestamp: DateTime<Utc>,
    pub estimated_reach: u64,
}

/// Three-way sentiment label. There is no "unknown" state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    Negative,
    Neutral,
}

impl Sentiment {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Positive => "positive",
            Self::Negative => "negative",
            Self::Neutral => "neutral",
        }
    }
}

impl fmt::Display for Sentiment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Output of the enrichment service for one piece of text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub sentiment: Sentiment,
    /// One to three topic labels.
    pub topics: Vec<String>,
}

/// A classified mention as persisted by the gateway.
///
/// Never mutated after creation by this crate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichedMention {
    pub id: Uuid,
    pub owner_id: String,
    pub keyword: String,
    pub source_name: String,
    pub text: String,
    pub url: String,
    pub timestamp: DateTime<Utc>,
    pub sentiment: Sentiment,
    pub topics: Vec<String>,
    pub estimated_reach: u64,
    pub engagement_score: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl EnrichedMention {
    /// Build a new record from a raw item and its classification.
    pub fn from_raw(
        owner_id: &str,
        item: &RawItem,
        classification: Classification,
        engagement_score: f64,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            owner_id: owner_id.to_string(),
            keyword: item.keyword.clone(),
            source_name: item.source_name.clone(),
            text: item.text.clone(),
            url: item.url.clone(),
            timestamp: item.timestamp,
            sentiment: classification.sentiment,
            topics: classification.topics,
            estimated_reach: item.estimated_reach,
            engagement_score,
            created_at: now,
            updated_at: now,
        }
    }
}

/// One owner and the keywords tracked on its behalf.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnerKeywords {
    pub id: String,
    #[serde(default)]
    pub keywords: Vec<String>,
}

/// Totals reported by a scheduled cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CycleResult {
    pub owners_processed: usize,
    pub mentions_added: usize,
}

/// Totals reported by a manual single-owner cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PollOutcome {
    pub mentions_added: usize,
}
