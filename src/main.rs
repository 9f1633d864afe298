//! F1 Fantasy Settlement - Entry Point
//!
//! Settles one round and prints the JSON report to stdout.
//!
//! Wiring sequence:
//! 1. Parse CLI arguments
//! 2. Load config.toml + validate (defaults when absent)
//! 3. Init tracing (JSON structured logging), then log the loaded config
//! 4. Create ErgastFeed (implements RaceFeed port)
//! 5. Create FileRepository (implements RosterStore + Repository ports)
//! 6. Run the SettlementCoordinator for the selected round
//! 7. Exit 0 if both halves succeeded, 2 otherwise

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};

use f1_fantasy_settlement::adapters::feeds::ErgastFeed;
use f1_fantasy_settlement::adapters::persistence::FileRepository;
use f1_fantasy_settlement::config::loader::load_or_default;
use f1_fantasy_settlement::ports::race_feed::RoundSelector;
use f1_fantasy_settlement::usecases::SettlementCoordinator;

/// Exit code when at least one settlement half failed.
const EXIT_INCOMPLETE: u8 = 2;

/// Settle a fantasy F1 round: score rosters and reprice assets.
#[derive(Parser, Debug)]
#[command(name = "f1-settlement")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to the configuration file (defaults apply when absent).
    #[arg(short, long)]
    config: Option<String>,

    /// Compute everything but persist nothing.
    #[arg(long)]
    dry_run: bool,

    /// Check that the feed and the store are reachable, then exit.
    #[arg(long)]
    health: bool,

    /// Round number, or `current` for the latest race.
    #[arg(default_value = "current")]
    round: RoundSelector,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // ── 1. Parse CLI ────────────────────────────────────────
    let cli = Cli::parse();

    // ── 2. Load configuration ───────────────────────────────
    let mut config =
        load_or_default(cli.config.as_deref()).context("Failed to load configuration")?;
    if cli.dry_run {
        config.service.dry_run = true;
    }

    // ── 3. Initialize structured JSON logging ───────────────
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.service.log_level)),
        )
        .with_writer(std::io::stderr)
        .json()
        .init();

    info!(
        source = cli.config.as_deref().unwrap_or("built-in defaults"),
        log_level = %config.service.log_level,
        timeout_seconds = config.feed.timeout_seconds,
        "Configuration loaded"
    );

    info!(
        name = %config.service.name,
        version = env!("CARGO_PKG_VERSION"),
        dry_run = config.service.dry_run,
        round = %cli.round,
        feed = %config.feed.base_url,
        data_dir = %config.persistence.data_dir,
        "Starting settlement"
    );

    if config.service.dry_run {
        warn!("Dry-run mode: results computed but NOTHING persisted");
    }

    // ── 4. Race feed ────────────────────────────────────────
    let feed = Arc::new(ErgastFeed::new(&config.feed).context("Failed to create race feed")?);

    // ── 5. File repository ──────────────────────────────────
    let repo = Arc::new(
        FileRepository::from_data_dir(&config.persistence.data_dir)
            .await
            .context("Failed to open data directory")?,
    );

    // ── 6. Settle ───────────────────────────────────────────
    let coordinator = SettlementCoordinator::new(feed, Arc::clone(&repo), repo, &config);

    if cli.health {
        let health = coordinator.health().await;
        println!(
            "{}",
            serde_json::to_string_pretty(&health).context("Failed to serialize health")?
        );
        return Ok(if health.feed && health.store {
            ExitCode::SUCCESS
        } else {
            ExitCode::from(EXIT_INCOMPLETE)
        });
    }

    let report = coordinator.settle_round(cli.round).await;

    println!(
        "{}",
        serde_json::to_string_pretty(&report).context("Failed to serialize report")?
    );

    // ── 7. Exit status ──────────────────────────────────────
    if report.is_success() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::from(EXIT_INCOMPLETE))
    }
}
