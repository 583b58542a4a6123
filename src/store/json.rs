//! Durable record store writing one JSON object per line.
//!
//! On open, existing lines are loaded into an in-memory index; malformed
//! lines are logged and skipped. Each insert appends a line and flushes
//! before the record becomes visible to readers.
//!
//! ```text
//! data/
//! └── mentions.jsonl   # {"id":"…","ownerId":"acme","url":"…",…}
//! ```

use super::{DedupScope, MentionStore, memory::MemoryStore};
use crate::error::StoreError;
use crate::models::EnrichedMention;
use crate::utils::ensure_writable_parent;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{info, instrument, warn};

pub struct JsonLinesStore {
    path: PathBuf,
    memory: MemoryStore,
    file: Mutex<File>,
}

impl JsonLinesStore {
    #[instrument(level = "info", skip_all, fields(path = %path.display(), ?scope))]
    pub async fn open(path: &Path, scope: DedupScope) -> Result<Self, StoreError> {
        ensure_writable_parent(path)
            .await
            .map_err(|e| StoreError::Io(std::io::Error::other(e.to_string())))?;

        let memory = MemoryStore::new(scope);
        let mut loaded = 0usize;
        let mut skipped = 0usize;

        match tokio::fs::read_to_string(path).await {
            Ok(text) => {
                for (line_no, line) in text.lines().enumerate() {
                    if line.trim().is_empty() {
                        continue;
                    }
                    match serde_json::from_str::<EnrichedMention>(line) {
                        Ok(mention) => match memory.insert(mention).await {
                            Ok(_) => loaded += 1,
                            Err(_) => skipped += 1,
                        },
                        Err(e) => {
                            warn!(line = line_no + 1, error = %e, "Skipping malformed stored mention");
                            skipped += 1;
                        }
                    }
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        let file = OpenOptions::new().create(true).append(true).open(path).await?;
        info!(loaded, skipped, "Opened mention store");

        Ok(Self {
            path: path.to_path_buf(),
            memory,
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl MentionStore for JsonLinesStore {
    async fn find_one(
        &self,
        owner_id: &str,
        url: &str,
        keyword: &str,
    ) -> Result<Option<EnrichedMention>, StoreError> {
        self.memory.find_one(owner_id, url, keyword).await
    }

    async fn insert(&self, mention: EnrichedMention) -> Result<EnrichedMention, StoreError> {
        let mut file = self.file.lock().await;
        if self.memory.contains(&mention).await {
            return Err(StoreError::Conflict {
                url: mention.url,
                keyword: mention.keyword,
            });
        }

        let mut line = serde_json::to_string(&mention)?;
        line.push('\n');
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;

        self.memory.insert(mention).await
    }

    async fn count(&self, owner_id: &str) -> Result<usize, StoreError> {
        self.memory.count(owner_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::mention;

    #[tokio::test]
    async fn test_records_survive_reopen() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("data/mentions.jsonl");

        {
            let store = JsonLinesStore::open(&path, DedupScope::PerOwner).await.unwrap();
            store.insert(mention("o1", "https://a", "rust")).await.unwrap();
            store.insert(mention("o1", "https://b", "rust")).await.unwrap();
            assert!(store.insert(mention("o1", "https://a", "rust")).await.is_err());
        }

        let reopened = JsonLinesStore::open(&path, DedupScope::PerOwner).await.unwrap();
        assert_eq!(reopened.count("o1").await.unwrap(), 2);
        assert!(
            reopened
                .find_one("o1", "https://b", "rust")
                .await
                .unwrap()
                .is_some()
        );
        assert!(reopened.insert(mention("o1", "https://b", "rust")).await.is_err());
    }

    #[tokio::test]
    async fn test_malformed_lines_are_skipped() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("mentions.jsonl");
        let good = serde_json::to_string(&mention("o1", "https://a", "rust")).unwrap();
        tokio::fs::write(&path, format!("{good}\nnot json\n\n")).await.unwrap();

        let store = JsonLinesStore::open(&path, DedupScope::PerOwner).await.unwrap();
        assert_eq!(store.count("o1").await.unwrap(), 1);
        assert_eq!(store.path(), path.as_path());
    }
}
