//! # Mention Watch
//!
//! Polls content providers for the keywords each owner tracks, classifies
//! new mentions, stores each one once, and pushes it to live subscribers.
//!
//! ## Usage
//!
//! ```sh
//! mention_watch --config ./config.yaml run --follow
//! mention_watch --config ./config.yaml poll acme
//! ```

use anyhow::{Context, anyhow};
use clap::Parser;
use mention_watch::cli::{Cli, Command};
use mention_watch::config::Settings;
use mention_watch::enrichment::Enricher;
use mention_watch::fetch::FetchCoordinator;
use mention_watch::gateway::Gateway;
use mention_watch::pipeline::MentionPipeline;
use mention_watch::realtime::{BroadcastHub, Notifier, RealtimeEvent};
use mention_watch::scheduler::{Cadence, Scheduler};
use mention_watch::sources::{build_sources, http_client};
use mention_watch::store::{JsonLinesStore, MemoryStore, MentionStore, StaticDirectory};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info, instrument, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "mention_watch starting up");

    let cli = Cli::parse();
    debug!(?cli.config, ?cli.command, "Parsed CLI arguments");

    let mut settings = match &cli.config {
        Some(path) => Settings::load(path)
            .await
            .map_err(|e| anyhow!("failed to load {}: {e}", path.display()))?,
        None => Settings::default(),
    };
    cli.apply(&mut settings);

    let cadence: Cadence = settings
        .schedule
        .interval
        .parse()
        .with_context(|| format!("invalid schedule interval {:?}", settings.schedule.interval))?;

    if settings.owners.is_empty() {
        warn!("No owners configured; cycles will have nothing to do");
    }

    let client = http_client().context("building HTTP client")?;
    let store: Arc<dyn MentionStore> = match &settings.store.path {
        Some(path) => Arc::new(
            JsonLinesStore::open(path, settings.dedup_scope)
                .await
                .with_context(|| format!("opening mention store at {}", path.display()))?,
        ),
        None => {
            info!("No store path configured; mentions are kept in memory");
            Arc::new(MemoryStore::new(settings.dedup_scope))
        }
    };

    let hub = Arc::new(BroadcastHub::new());
    let enricher = Arc::new(Enricher::from_config(&settings.classifier, client.clone()));
    let fetcher = FetchCoordinator::new(build_sources(&settings.sources, client));
    let pipeline = Arc::new(MentionPipeline::new(
        Arc::new(StaticDirectory::new(settings.owners.clone())),
        store.clone(),
        fetcher,
        Gateway::new(store, enricher, Notifier::new(hub.clone())),
    ));
    let scheduler = Arc::new(Scheduler::new(pipeline.clone()));

    match cli.command() {
        Command::Once => {
            let result = scheduler.run_scheduled_cycle().await;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Command::Poll { owner } => {
            let outcome = pipeline.poll_for_owner(&owner).await?;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }
        Command::Run { follow } => {
            if !settings.schedule.enabled {
                warn!("Scheduling is disabled; use `once` or `poll` to run cycles");
                return Ok(());
            }
            if follow {
                for owner in &settings.owners {
                    tokio::spawn(follow_owner(owner.id.clone(), hub.subscribe_owner(&owner.id)));
                }
            }
            scheduler
                .run(cadence, async {
                    if let Err(e) = tokio::signal::ctrl_c().await {
                        warn!(error = %e, "Could not listen for Ctrl-C");
                        std::future::pending::<()>().await;
                    }
                })
                .await;
        }
    }

    info!("mention_watch finished");
    Ok(())
}

/// Print each mention published for `owner` as one JSON line.
#[instrument(level = "info", skip(rx))]
async fn follow_owner(owner: String, mut rx: broadcast::Receiver<RealtimeEvent>) {
    loop {
        match rx.recv().await {
            Ok(event) => println!("{}", event.payload),
            Err(broadcast::error::RecvError::Lagged(missed)) => {
                warn!(missed, "Follower fell behind; events dropped");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}
