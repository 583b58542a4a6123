//! # Mention Watch
//!
//! Keyword mention ingestion and enrichment.
//!
//! ## Architecture
//!
//! 1. **Scheduling**: [`scheduler`] fires cycles on a cadence, one at a time
//! 2. **Fetching**: [`fetch`] fans each owner's keywords out to every
//!    [`sources`] adapter concurrently
//! 3. **Dedup & persistence**: [`gateway`] skips items already stored,
//!    classifies new ones through [`enrichment`], and inserts them into a
//!    [`store`]
//! 4. **Fan-out**: [`realtime`] pushes each new record to live subscribers
//!
//! [`pipeline`] ties steps 2–4 together for one owner and is shared by
//! scheduled cycles and manual polls.

pub mod cli;
pub mod config;
pub mod enrichment;
pub mod error;
pub mod fetch;
pub mod gateway;
pub mod models;
pub mod pipeline;
pub mod realtime;
pub mod scheduler;
pub mod sources;
pub mod store;
pub mod utils;

#[cfg(test)]
pub(crate) mod testing;
