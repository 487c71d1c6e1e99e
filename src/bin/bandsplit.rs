//! Split text from stdin into numbered parts and optionally queue them
//!
//! Usage:
//!   bandsplit [--max-chars N] [--now | --schedule-in SECS] [--events] < input.txt
//!
//! Without `--now` or `--schedule-in` the batch is only split. Deliveries go
//! to an in-process backend, so this is a dry run of what a real delivery
//! service would receive. The resulting batch is printed as JSON; with
//! `--events` every batch event is also written to stderr as one JSON line.

use anyhow::{Context, Result};
use chrono::{TimeDelta, Utc};
use clap::Parser;
use dotenvy::dotenv;
use log::{error, info, warn};
use std::sync::Arc;
use tokio::io::AsyncReadExt;
use tokio::sync::broadcast::{self, error::TryRecvError};

use bandsplit::core::Config;
use bandsplit::features::delivery::{BatchEvent, DeliveryCoordinator, MemoryBackend};
use bandsplit::{estimate_segments, DeliveryError};

#[derive(Debug, Parser)]
#[command(about = "Split text into numbered parts and queue them for delivery")]
struct Args {
    /// Maximum characters per part (overrides BANDSPLIT_MAX_CHARS)
    #[arg(long)]
    max_chars: Option<usize>,

    /// Send the first part right away and space the rest by the interval
    #[arg(long, conflicts_with = "schedule_in")]
    now: bool,

    /// Schedule the first part this many seconds from now
    #[arg(long)]
    schedule_in: Option<u64>,

    /// Write batch events to stderr as JSON lines
    #[arg(long, default_value_t = false)]
    events: bool,
}

/// Drain pending events, writing each as a JSON line when `echo` is set
fn drain_events(rx: &mut broadcast::Receiver<BatchEvent>, echo: bool) -> Result<()> {
    loop {
        match rx.try_recv() {
            Ok(event) if echo => eprintln!("{}", serde_json::to_string(&event)?),
            Ok(_) => {}
            Err(TryRecvError::Lagged(missed)) => warn!("Dropped {missed} batch event(s)"),
            Err(_) => return Ok(()),
        }
    }
}

/// First target time for `--schedule-in`
fn schedule_base(secs: u64) -> Result<chrono::DateTime<Utc>> {
    i64::try_from(secs)
        .ok()
        .and_then(TimeDelta::try_seconds)
        .and_then(|delay| Utc::now().checked_add_signed(delay))
        .with_context(|| format!("--schedule-in {secs} is too far in the future"))
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv().ok();

    let mut config = Config::from_env()?;

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&config.log_level))
        .init();

    let args = Args::parse();
    if let Some(max_chars) = args.max_chars {
        config.split.max_chars = max_chars;
        config.split.validate()?;
    }

    let mut text = String::new();
    tokio::io::stdin()
        .read_to_string(&mut text)
        .await
        .context("Failed to read text from stdin")?;

    info!(
        "Read {} chars, expecting about {} part(s)",
        text.chars().count(),
        estimate_segments(&text, config.split.max_chars)
    );

    let backend = Arc::new(MemoryBackend::new());
    let coordinator = DeliveryCoordinator::new(backend.clone(), config.split.clone());
    let mut events = coordinator.subscribe();

    match coordinator.load_text(&text).await {
        Ok(total) => info!("Split into {total} part(s)"),
        Err(DeliveryError::InputEmpty) => {
            warn!("Nothing to split: input is blank");
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    }

    let scheduled = match (args.now, args.schedule_in) {
        (true, _) => Some(coordinator.send_immediately().await),
        (false, Some(secs)) => Some(coordinator.schedule_batch(schedule_base(secs)?).await),
        (false, None) => None,
    };

    match scheduled {
        Some(Ok(outcome)) if !outcome.is_complete() => warn!(
            "{} part(s) left pending: delivery queue is full",
            outcome.deferred
        ),
        Some(Ok(outcome)) => info!(
            "Queued {} part(s); {} outstanding at the backend",
            outcome.scheduled,
            backend.len()
        ),
        Some(Err(e)) => error!("Scheduling failed: {e}"),
        None => {}
    }

    drain_events(&mut events, args.events)?;

    let items = coordinator.snapshot().await;
    println!("{}", serde_json::to_string_pretty(&items)?);

    Ok(())
}
