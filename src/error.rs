//! Error types for each failure scope of the pipeline.
//!
//! Failures are contained at the smallest scope that produced them:
//!
//! | Error | Scope | Outcome |
//! |-------|-------|---------|
//! | [`AdapterError`] | one provider adapter | logged, adapter contributes zero items |
//! | [`ClassifierError`] | one remote classification | logged, local heuristic used instead |
//! | [`StoreError`] | one record-store call | conflicts are treated as already processed |
//! | [`PipelineError`] | one owner / one cycle | only `OwnerNotFound` reaches external callers |

use std::time::Duration;
use thiserror::Error;

/// A single provider adapter failed to produce items.
#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("provider returned HTTP {status}")]
    Status { status: u16 },

    #[error("could not decode provider response: {0}")]
    Decode(String),

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("adapter task aborted: {0}")]
    Join(String),
}

impl From<serde_json::Error> for AdapterError {
    fn from(e: serde_json::Error) -> Self {
        AdapterError::Decode(e.to_string())
    }
}

impl From<quick_xml::Error> for AdapterError {
    fn from(e: quick_xml::Error) -> Self {
        AdapterError::Decode(e.to_string())
    }
}

/// The remote classifier could not be used for one call.
#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("remote classifier is not configured")]
    NotConfigured,

    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("classifier returned HTTP {status}")]
    Status { status: u16 },

    #[error("unexpected response shape: {0}")]
    Shape(String),

    #[error("timed out after {0:?}")]
    Timeout(Duration),
}

/// Record-store failures.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store's uniqueness constraint rejected the insert.
    #[error("mention already stored for url {url} (keyword {keyword})")]
    Conflict { url: String, keyword: String },

    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("store serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors surfaced by the pipeline entry points.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("owner not found: {0}")]
    OwnerNotFound(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("keyword directory unavailable: {0}")]
    Directory(String),
}

/// A cadence expression could not be understood.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CadenceError {
    #[error("empty cadence expression")]
    Empty,

    #[error("invalid duration {0:?}; expected forms like 30s, 10m or 1h")]
    Duration(String),

    #[error("unsupported cron expression {0:?}; only \"*/N * * * *\" is accepted")]
    Cron(String),

    #[error("cadence must be greater than zero")]
    Zero,
}
