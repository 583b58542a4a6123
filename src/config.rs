//! YAML configuration file and its defaults.
//!
//! Every field is optional. Command-line flags (see [`crate::cli`]) override
//! file values after loading.
//!
//! ```yaml
//! schedule:
//!   interval: "*/10 * * * *"
//!   enabled: true
//! dedup_scope: per-owner
//! classifier:
//!   url: https://api-inference.huggingface.co/models/cardiffnlp/twitter-roberta-base-sentiment-latest
//!   topics_url: https://api-inference.huggingface.co/models/facebook/bart-large-mnli
//!   timeout_secs: 10
//! sources:
//!   github: { timeout_secs: 20 }
//!   wikipedia: { enabled: false }
//!   feeds:
//!     - https://blog.rust-lang.org/feed.xml
//! store:
//!   path: ./data/mentions.jsonl
//! owners:
//!   - id: acme
//!     keywords: [acme, "acme corp"]
//! ```

use crate::models::OwnerKeywords;
use crate::store::DedupScope;
use serde::Deserialize;
use std::error::Error;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, instrument};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub schedule: ScheduleConfig,
    pub dedup_scope: DedupScope,
    pub classifier: ClassifierConfig,
    pub sources: SourcesConfig,
    pub store: StoreConfig,
    pub owners: Vec<OwnerKeywords>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    /// Duration (`10m`) or minute-step cron (`*/10 * * * *`).
    pub interval: String,
    pub enabled: bool,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            interval: "10m".to_string(),
            enabled: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Sentiment model endpoint. Absent means local heuristics only.
    pub url: Option<String>,
    /// Zero-shot topic model endpoint. Defaults to `url` when absent.
    pub topics_url: Option<String>,
    pub token: Option<String>,
    pub timeout_secs: u64,
    pub max_retries: usize,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            url: None,
            topics_url: None,
            token: None,
            timeout_secs: 10,
            max_retries: 2,
        }
    }
}

impl ClassifierConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Per-adapter switch and timeout override.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SourceToggle {
    pub enabled: bool,
    pub timeout_secs: Option<u64>,
}

impl Default for SourceToggle {
    fn default() -> Self {
        Self {
            enabled: true,
            timeout_secs: None,
        }
    }
}

impl SourceToggle {
    pub fn timeout(&self, default: Duration) -> Duration {
        self.timeout_secs.map(Duration::from_secs).unwrap_or(default)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SourcesConfig {
    pub hackernews: SourceToggle,
    pub reddit: SourceToggle,
    pub stackexchange: SourceToggle,
    pub github: SourceToggle,
    pub news_rss: SourceToggle,
    pub cnn_lite: SourceToggle,
    pub wikipedia: SourceToggle,
    pub github_token: Option<String>,
    /// Extra RSS/Atom feeds read by the news adapter.
    pub feeds: Vec<String>,
    /// Query Google News RSS per keyword.
    pub google_news: bool,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            hackernews: SourceToggle::default(),
            reddit: SourceToggle::default(),
            stackexchange: SourceToggle::default(),
            github: SourceToggle::default(),
            news_rss: SourceToggle::default(),
            cnn_lite: SourceToggle::default(),
            wikipedia: SourceToggle::default(),
            github_token: None,
            feeds: Vec::new(),
            google_news: true,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// JSON-lines file for durable storage. Absent means in-memory only.
    pub path: Option<PathBuf>,
}

impl Settings {
    /// Parse settings from YAML text.
    pub fn from_yaml(text: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(text)
    }

    /// Load settings from a YAML file.
    #[instrument(level = "info", skip_all, fields(path = %path.display()))]
    pub async fn load(path: &Path) -> Result<Self, Box<dyn Error + Send + Sync>> {
        let text = tokio::fs::read_to_string(path).await?;
        let settings = Self::from_yaml(&text)?;
        info!(
            owners = settings.owners.len(),
            feeds = settings.sources.feeds.len(),
            "Loaded configuration"
        );
        Ok(settings)
    }
}
