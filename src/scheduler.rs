//! Poll cycle scheduler.
//!
//! A process-wide single-flight guard keeps scheduled cycles from
//! overlapping: a timer fire that finds a cycle still running is skipped
//! and logged, never queued. The guard is released by `Drop`, so it comes
//! back whether the cycle finished, failed, or panicked.
//!
//! Per-owner exclusion is handled separately by the pipeline's owner locks,
//! which manual polls acquire as well.

use crate::error::{CadenceError, PipelineError};
use crate::models::CycleResult;
use crate::pipeline::MentionPipeline;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tokio::time::MissedTickBehavior;
use tracing::{error, info, instrument, warn};

/// How often scheduled cycles fire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cadence(Duration);

impl Cadence {
    pub fn every(period: Duration) -> Self {
        Self(period)
    }

    pub fn period(self) -> Duration {
        self.0
    }
}

impl Default for Cadence {
    fn default() -> Self {
        Self(Duration::from_secs(600))
    }
}

impl FromStr for Cadence {
    type Err = CadenceError;

    /// Accepts `30s`, `10m`, `1h` or `*/N * * * *` (every N minutes).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(CadenceError::Empty);
        }

        let period = if s.contains(' ') {
            parse_cron(s)?
        } else {
            parse_duration(s)?
        };
        if period.is_zero() {
            return Err(CadenceError::Zero);
        }
        Ok(Self(period))
    }
}

fn parse_duration(s: &str) -> Result<Duration, CadenceError> {
    let bad = || CadenceError::Duration(s.to_string());
    let split = s.find(|c: char| !c.is_ascii_digit()).ok_or_else(bad)?;
    let (number, unit) = s.split_at(split);
    let n: u64 = number.parse().map_err(|_| bad())?;
    let secs = match unit {
        "s" => n,
        "m" => n.checked_mul(60).ok_or_else(bad)?,
        "h" => n.checked_mul(3600).ok_or_else(bad)?,
        _ => return Err(bad()),
    };
    Ok(Duration::from_secs(secs))
}

fn parse_cron(s: &str) -> Result<Duration, CadenceError> {
    let bad = || CadenceError::Cron(s.to_string());
    let fields: Vec<&str> = s.split_whitespace().collect();
    if fields.len() != 5 || fields[1..].iter().any(|f| *f != "*") {
        return Err(bad());
    }
    let minutes: u64 = match fields[0] {
        "*" => 1,
        step => step
            .strip_prefix("*/")
            .and_then(|n| n.parse().ok())
            .ok_or_else(bad)?,
    };
    Ok(Duration::from_secs(minutes.checked_mul(60).ok_or_else(bad)?))
}

/// Releases the single-flight flag when dropped.
pub(crate) struct RunningGuard<'a> {
    flag: &'a AtomicBool,
}

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

pub struct Scheduler {
    pipeline: Arc<MentionPipeline>,
    running: AtomicBool,
}

impl Scheduler {
    pub fn new(pipeline: Arc<MentionPipeline>) -> Self {
        Self {
            pipeline,
            running: AtomicBool::new(false),
        }
    }

    pub fn pipeline(&self) -> &Arc<MentionPipeline> {
        &self.pipeline
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub(crate) fn try_begin(&self) -> Option<RunningGuard<'_>> {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| RunningGuard {
                flag: &self.running,
            })
    }

    /// One scheduled pass over every owner with keywords.
    ///
    /// Returns `{0, 0}` without doing anything if a scheduled cycle is
    /// already running. A fault that escapes per-owner handling ends the
    /// cycle early with the totals gathered so far.
    #[instrument(level = "info", skip_all)]
    pub async fn run_scheduled_cycle(&self) -> CycleResult {
        let Some(_guard) = self.try_begin() else {
            info!("Scheduled cycle already running; skipping this trigger");
            return CycleResult::default();
        };

        let started = Instant::now();
        let mut result = CycleResult::default();

        match AssertUnwindSafe(self.cycle_body(&mut result))
            .catch_unwind()
            .await
        {
            Ok(Ok(())) => {}
            Ok(Err(fault)) => error!(error = %fault, "Scheduled cycle aborted"),
            Err(panic) => error!(reason = %panic_message(&*panic), "Scheduled cycle panicked"),
        }

        let stats = self.pipeline.gateway().enricher().stats();
        info!(
            owners_processed = result.owners_processed,
            mentions_added = result.mentions_added,
            remote_calls = stats.remote_calls,
            remote_failures = stats.remote_failures,
            fallback_calls = stats.fallback_calls,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Scheduled cycle finished"
        );
        result
    }

    async fn cycle_body(&self, result: &mut CycleResult) -> Result<(), PipelineError> {
        let owners = self.pipeline.directory().list_owners_with_keywords().await?;
        info!(owners = owners.len(), "Starting scheduled cycle");

        for owner in &owners {
            match AssertUnwindSafe(self.pipeline.process_owner(owner))
                .catch_unwind()
                .await
            {
                Ok(run) => {
                    result.mentions_added += run.mentions_added;
                    if run.clean {
                        result.owners_processed += 1;
                    } else {
                        warn!(owner = %owner.id, "Owner finished with errors");
                    }
                }
                Err(panic) => {
                    error!(owner = %owner.id, reason = %panic_message(&*panic), "Owner processing panicked");
                }
            }
        }
        Ok(())
    }

    /// Fire scheduled cycles every `cadence` until `shutdown` resolves.
    ///
    /// Each cycle runs in its own task, so a cycle that overruns the period
    /// makes the next fire hit the single-flight guard and be skipped.
    pub async fn run<F>(self: Arc<Self>, cadence: Cadence, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let mut ticker = tokio::time::interval(cadence.period());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tokio::pin!(shutdown);

        info!(period = ?cadence.period(), "Scheduler started");
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Scheduler stopping");
                    break;
                }
                _ = ticker.tick() => {
                    let scheduler = Arc::clone(&self);
                    tokio::spawn(async move {
                        scheduler.run_scheduled_cycle().await;
                    });
                }
            }
        }
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
