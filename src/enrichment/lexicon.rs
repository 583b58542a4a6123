//! Deterministic fallback classifier.
//!
//! Both functions are pure: identical input text always yields identical
//! output. Matching is substring-based over the lower-cased text.

use crate::models::{GENERAL_TOPIC, Sentiment};

/// Maximum number of topic labels emitted.
pub const MAX_TOPICS: usize = 3;

pub const POSITIVE_WORDS: &[&str] = &[
    "amazing",
    "awesome",
    "breakthrough",
    "excellent",
    "fantastic",
    "great",
    "impressive",
    "innovative",
    "love",
    "outstanding",
    "praise",
    "recommend",
    "success",
    "surge",
    "thrilled",
    "wonderful",
    "record high",
    "improved",
    "celebrate",
    "milestone",
];

pub const NEGATIVE_WORDS: &[&str] = &[
    "awful",
    "bankrupt",
    "breach",
    "complaint",
    "crash",
    "decline",
    "disappoint",
    "failure",
    "fraud",
    "hate",
    "investigation",
    "lawsuit",
    "layoff",
    "outage",
    "recall",
    "scandal",
    "terrible",
    "vulnerability",
    "worst",
    "plunge",
];

/// Category → keywords, in the order categories are reported.
pub const CATEGORIES: &[(&str, &[&str])] = &[
    (
        "technology",
        &[
            "software",
            "technology",
            "artificial intelligence",
            "machine learning",
            "open source",
            "developer",
            "programming",
            "cloud",
            "startup",
            "smartphone",
        ],
    ),
    (
        "business",
        &[
            "revenue",
            "earnings",
            "acquisition",
            "merger",
            "ceo",
            "company",
            "market share",
            "customer",
            "layoff",
        ],
    ),
    (
        "finance",
        &[
            "stock",
            "shares",
            "investor",
            "nasdaq",
            "bitcoin",
            "crypto",
            "interest rate",
            "inflation",
            "bank",
        ],
    ),
    (
        "politics",
        &[
            "election",
            "senate",
            "congress",
            "president",
            "government",
            "minister",
            "parliament",
            "policy",
        ],
    ),
    (
        "security",
        &[
            "breach",
            "vulnerability",
            "malware",
            "ransomware",
            "exploit",
            "phishing",
            "cve-",
        ],
    ),
    (
        "legal",
        &["lawsuit", "court", "fraud", "investigation", "regulator", "settlement"],
    ),
    (
        "health",
        &["health", "medical", "vaccine", "hospital", "disease", "clinical"],
    ),
    (
        "science",
        &["research", "scientist", "study finds", "physics", "nasa", "climate"],
    ),
    (
        "entertainment",
        &["movie", "film", "music", "album", "celebrity", "streaming", "game"],
    ),
    (
        "sports",
        &["football", "soccer", "basketball", "baseball", "tournament", "championship"],
    ),
];

fn hits(text: &str, words: &[&str]) -> usize {
    words.iter().filter(|w| text.contains(*w)).count()
}

/// Word-list sentiment: a side wins only with a margin of more than one hit.
pub fn sentiment(text: &str) -> Sentiment {
    let text = text.to_lowercase();
    let positive = hits(&text, POSITIVE_WORDS);
    let negative = hits(&text, NEGATIVE_WORDS);

    if positive > negative + 1 {
        Sentiment::Positive
    } else if negative > positive + 1 {
        Sentiment::Negative
    } else {
        Sentiment::Neutral
    }
}

/// Up to [`MAX_TOPICS`] matching categories in [`CATEGORIES`] order, or
/// `["general"]` when nothing matches. Never empty.
pub fn topics(text: &str) -> Vec<String> {
    let text = text.to_lowercase();
    let found: Vec<String> = CATEGORIES
        .iter()
        .filter(|(_, words)| words.iter().any(|w| text.contains(w)))
        .map(|(category, _)| category.to_string())
        .take(MAX_TOPICS)
        .collect();

    if found.is_empty() {
        vec![GENERAL_TOPIC.to_string()]
    } else {
        found
    }
}

/// Candidate labels offered to a zero-shot remote model.
pub fn category_names() -> Vec<&'static str> {
    CATEGORIES.iter().map(|(name, _)| *name).collect()
}
