//! Settlement Use Case - Round Scoring and Repricing
//!
//! Settles one fantasy round against the official race result:
//! 1. Fetch the raw result from the race feed (bounded by a timeout)
//! 2. Normalize it into `Outcome`s
//! 3. Resolve the calendar round and its roster snapshot
//! 4. Score every roster
//! 5. Reprice drivers and constructors from selection demand
//! 6. Persist scores, price history and current prices
//!
//! Scoring and pricing are independent halves: either may fail while
//! the other succeeds. A failure before the round is resolved fails
//! both and writes nothing.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::run_state::{RunState, RunTracker};
use crate::config::AppConfig;
use crate::domain::asset::{AssetId, AssetPool, AssetPrice, PriceHistoryEntry};
use crate::domain::error::{SettlementError, Stage, StageFailure};
use crate::domain::normalizer::normalize;
use crate::domain::outcome::RaceResult;
use crate::domain::pricing::{PoolTally, PricingEngine, RepricedAsset, SelectionTally};
use crate::domain::roster::{RosterSelection, Round, RoundId, ScoreResult};
use crate::domain::scoring::{OutcomeIndex, ScoringEngine};
use crate::ports::race_feed::{RaceFeed, RoundSelector};
use crate::ports::repository::{Repository, RosterStore};

// ── Report ──────────────────────────────────────────────────

/// Result of the scoring half.
#[derive(Debug, Clone, Serialize)]
pub struct ScoringSummary {
  pub round_id: RoundId,
  pub rosters_scored: usize,
  pub scores: Vec<ScoreResult>,
  /// False on dry runs.
  pub persisted: bool,
}

/// Pricing result of one asset pool.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PoolPricing {
  /// Prices computed this run.
  Repriced { assets: Vec<RepricedAsset> },
  /// History already recorded for the round; prices were left alone.
  AlreadyPriced { prices: Vec<AssetPrice> },
}

impl PoolPricing {
  /// Published price per asset, whichever way it was obtained.
  pub fn prices(&self) -> Vec<AssetPrice> {
    match self {
      Self::Repriced { assets } => assets
        .iter()
        .map(|a| AssetPrice {
          asset: a.asset.clone(),
          price: a.new_price,
        })
        .collect(),
      Self::AlreadyPriced { prices } => prices.clone(),
    }
  }

  pub const fn is_already_priced(&self) -> bool {
    matches!(self, Self::AlreadyPriced { .. })
  }
}

/// Result of the pricing half.
#[derive(Debug, Clone, Serialize)]
pub struct PricingSummary {
  pub round_id: RoundId,
  pub drivers: PoolPricing,
  pub constructors: PoolPricing,
  /// False on dry runs.
  pub persisted: bool,
}

impl PricingSummary {
  pub const fn pool(&self, pool: AssetPool) -> &PoolPricing {
    match pool {
      AssetPool::Drivers => &self.drivers,
      AssetPool::Constructors => &self.constructors,
    }
  }
}

/// Outcome of one settlement run.
#[derive(Debug, Clone, Serialize)]
pub struct SettlementReport {
  pub run_id: Uuid,
  pub selector: RoundSelector,
  pub dry_run: bool,
  pub race: Option<RaceResult>,
  pub round: Option<Round>,
  /// `Done` only when both halves completed; otherwise the first failed
  /// half, scoring before pricing.
  pub final_state: RunState,
  pub scoring: Result<ScoringSummary, StageFailure>,
  pub pricing: Result<PricingSummary, StageFailure>,
  pub started_at: DateTime<Utc>,
  pub finished_at: DateTime<Utc>,
}

impl SettlementReport {
  /// Both halves completed.
  pub const fn is_success(&self) -> bool {
    self.scoring.is_ok() && self.pricing.is_ok()
  }
}

/// Health of the coordinator's collaborators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CollaboratorHealth {
  pub feed: bool,
  pub store: bool,
}

// ── Coordinator ─────────────────────────────────────────────

/// Facts established so far, reported even when the run fails.
#[derive(Default)]
struct Progress {
  race: Option<RaceResult>,
  round: Option<Round>,
}

/// Inputs of the scoring and pricing halves.
struct Prepared {
  race: RaceResult,
  round: Round,
  rosters: Vec<RosterSelection>,
}

/// Round-scoped settlement coordinator.
pub struct SettlementCoordinator<F: RaceFeed, S: RosterStore, R: Repository> {
  feed: Arc<F>,
  rosters: Arc<S>,
  repo: Arc<R>,
  scoring: ScoringEngine,
  pricing: PricingEngine,
  /// Upper bound on the feed call.
  feed_timeout: Duration,
  /// Compute everything, persist nothing.
  dry_run: bool,
}

impl<F: RaceFeed, S: RosterStore, R: Repository> SettlementCoordinator<F, S, R> {
  /// Create a coordinator with the configured rules.
  pub fn new(feed: Arc<F>, rosters: Arc<S>, repo: Arc<R>, config: &AppConfig) -> Self {
    Self {
      feed,
      rosters,
      repo,
      scoring: ScoringEngine::new(config.scoring.points_table()),
      pricing: config.pricing.engine(),
      feed_timeout: Duration::from_secs(config.feed.timeout_seconds),
      dry_run: config.service.dry_run,
    }
  }

  /// Override the configured dry-run flag.
  #[must_use]
  pub fn with_dry_run(mut self, dry_run: bool) -> Self {
    self.dry_run = dry_run;
    self
  }

  /// Override the configured feed timeout.
  #[must_use]
  pub fn with_feed_timeout(mut self, timeout: Duration) -> Self {
    self.feed_timeout = timeout;
    self
  }

  pub async fn health(&self) -> CollaboratorHealth {
    let (feed, store) = tokio::join!(self.feed.is_healthy(), self.repo.is_healthy());
    CollaboratorHealth { feed, store }
  }

  /// Settle the selected round.
  ///
  /// Never returns an error: failures are reported per half in the
  /// report. Re-running for a settled round overwrites scores and leaves
  /// already-priced pools untouched.
  #[instrument(skip(self, selector), fields(selector = %selector, dry_run = self.dry_run))]
  pub async fn settle_round(&self, selector: RoundSelector) -> SettlementReport {
    let run_id = Uuid::new_v4();
    let started_at = Utc::now();
    let mut run = RunTracker::new(run_id);
    let mut progress = Progress::default();

    let (scoring, pricing) = match self.prepare(selector, &mut run, &mut progress).await {
      Ok(prepared) => {
        self
          .settle(&prepared.race, &prepared.round, &prepared.rosters, &mut run)
          .await
      }
      Err(failure) => {
        run.fail_at(failure.stage, failure.cause.clone());
        (Err(failure.clone()), Err(failure))
      }
    };

    let report = SettlementReport {
      run_id,
      selector,
      dry_run: self.dry_run,
      race: progress.race,
      round: progress.round,
      final_state: run.state().clone(),
      scoring,
      pricing,
      started_at,
      finished_at: Utc::now(),
    };

    if report.is_success() {
      info!(%run_id, "Settlement complete");
    } else {
      warn!(
        %run_id,
        scoring_ok = report.scoring.is_ok(),
        pricing_ok = report.pricing.is_ok(),
        "Settlement incomplete"
      );
    }

    report
  }

  // ── Fetching / Normalizing ──

  async fn prepare(
    &self,
    selector: RoundSelector,
    run: &mut RunTracker,
    progress: &mut Progress,
  ) -> Result<Prepared, StageFailure> {
    let raw = self.fetch(selector).await.map_err(fetch_failure)?;

    run.advance(RunState::Normalizing);
    let race = normalize(&raw).map_err(|cause| StageFailure::new(Stage::Normalizing, cause))?;
    info!(
      race = %race.race_name,
      race_date = %race.race_date,
      competitors = race.outcomes.len(),
      "Race result normalized"
    );

    let race_date = race.race_date;
    progress.race = Some(race.clone());

    let round = match self.repo.find_round_by_date(race_date).await {
      Ok(Some(round)) => round,
      Ok(None) => return Err(fetch_failure(SettlementError::RoundNotMatched { race_date })),
      Err(e) => return Err(fetch_failure(SettlementError::store(&e))),
    };
    if let RoundSelector::Round(requested) = selector {
      if requested != round.id {
        warn!(
          requested,
          matched = round.id,
          "Feed round number differs from calendar round"
        );
      }
    }
    info!(round_id = round.id, round = %round.name, "Round resolved");

    let round_id = round.id;
    progress.round = Some(round.clone());

    let rosters = self
      .rosters
      .rosters_for_round(round_id)
      .await
      .map_err(|e| {
        fetch_failure(SettlementError::NoRostersForRound {
          round_id,
          reason: format!("{e:#}"),
        })
      })?;
    info!(round_id, rosters = rosters.len(), "Roster snapshot loaded");

    Ok(Prepared {
      race,
      round,
      rosters,
    })
  }

  /// Single feed call, bounded by the configured timeout.
  async fn fetch(&self, selector: RoundSelector) -> Result<serde_json::Value, SettlementError> {
    match tokio::time::timeout(self.feed_timeout, self.feed.fetch_results(selector)).await {
      Ok(Ok(raw)) => Ok(raw),
      Ok(Err(e)) => Err(SettlementError::no_race(format!("{e:#}"))),
      Err(_) => Err(SettlementError::no_race(format!(
        "feed did not answer within {}s",
        self.feed_timeout.as_secs_f64()
      ))),
    }
  }

  // ── Scoring / Pricing / Persisting ──

  async fn settle(
    &self,
    race: &RaceResult,
    round: &Round,
    rosters: &[RosterSelection],
    run: &mut RunTracker,
  ) -> (
    Result<ScoringSummary, StageFailure>,
    Result<PricingSummary, StageFailure>,
  ) {
    run.advance(RunState::Scoring);
    let scores = self.score_rosters(race, round.id, rosters);

    run.advance(RunState::Pricing);
    let pricing = self.price_round(round.id, rosters).await;
    if let Err(failure) = &pricing {
      warn!(round_id = round.id, %failure, "Pricing half failed");
    }

    run.advance(RunState::Persisting);
    let scoring = self.persist_scores(round.id, scores).await;
    let pricing = match pricing {
      Ok(summary) => self.persist_prices(summary).await,
      Err(failure) => Err(failure),
    };

    match scoring.as_ref().err().or_else(|| pricing.as_ref().err()) {
      Some(failure) => run.fail_at(failure.stage, failure.cause.clone()),
      None => run.finish(),
    }
    (scoring, pricing)
  }

  fn score_rosters(
    &self,
    race: &RaceResult,
    round_id: RoundId,
    rosters: &[RosterSelection],
  ) -> Vec<ScoreResult> {
    let index = OutcomeIndex::new(&race.outcomes);
    let computed_at = Utc::now();

    let scores: Vec<ScoreResult> = rosters
      .iter()
      .map(|roster| {
        let breakdown = self.scoring.breakdown(roster, &index);
        ScoreResult {
          roster_id: roster.roster_id,
          owner_id: roster.owner_id,
          round_id,
          driver_points: breakdown.driver_points,
          constructor_points: breakdown.constructor_points,
          total_points: breakdown.total,
          computed_at,
        }
      })
      .collect();

    info!(round_id, rosters = scores.len(), "Rosters scored");
    scores
  }

  async fn price_round(
    &self,
    round_id: RoundId,
    rosters: &[RosterSelection],
  ) -> Result<PricingSummary, StageFailure> {
    if rosters.is_empty() {
      return Err(StageFailure::new(
        Stage::Pricing,
        SettlementError::NoRostersForRound {
          round_id,
          reason: "roster snapshot is empty".to_string(),
        },
      ));
    }

    let driver_history = self
      .repo
      .price_history(AssetPool::Drivers, round_id)
      .await
      .map_err(store_failure(Stage::Pricing))?;
    let constructor_history = self
      .repo
      .price_history(AssetPool::Constructors, round_id)
      .await
      .map_err(store_failure(Stage::Pricing))?;
    let driver_prices = self
      .repo
      .current_prices(AssetPool::Drivers)
      .await
      .map_err(store_failure(Stage::Pricing))?;
    let constructor_prices = self
      .repo
      .current_prices(AssetPool::Constructors)
      .await
      .map_err(store_failure(Stage::Pricing))?;

    let tally = SelectionTally::from_rosters(
      rosters,
      driver_prices.keys().chain(constructor_prices.keys()).cloned(),
    );
    info!(
      round_id,
      driver_selections = tally.drivers.total(),
      constructor_selections = tally.constructors.total(),
      "Selection tally built"
    );
    let (driver_tally, constructor_tally) = tally.into_pools();

    Ok(PricingSummary {
      round_id,
      drivers: self.price_pool(AssetPool::Drivers, &driver_prices, driver_tally, driver_history),
      constructors: self.price_pool(
        AssetPool::Constructors,
        &constructor_prices,
        constructor_tally,
        constructor_history,
      ),
      persisted: false,
    })
  }

  fn price_pool(
    &self,
    pool: AssetPool,
    prices: &BTreeMap<AssetId, f64>,
    tally: PoolTally,
    history: Vec<PriceHistoryEntry>,
  ) -> PoolPricing {
    if !history.is_empty() {
      info!(%pool, recorded = history.len(), "Pool already priced for round, skipping");
      return PoolPricing::AlreadyPriced {
        prices: history
          .into_iter()
          .map(|entry| AssetPrice {
            asset: entry.asset,
            price: entry.price,
          })
          .collect(),
      };
    }

    let assets = self.pricing.reprice_pool(prices, tally);
    info!(%pool, assets = assets.len(), "Pool repriced");
    PoolPricing::Repriced { assets }
  }

  async fn persist_scores(
    &self,
    round_id: RoundId,
    scores: Vec<ScoreResult>,
  ) -> Result<ScoringSummary, StageFailure> {
    let persisted = if self.dry_run {
      info!(round_id, records = scores.len(), "Dry run, scores not persisted");
      false
    } else {
      self
        .repo
        .upsert_scores(&scores)
        .await
        .map_err(store_failure(Stage::Persisting))?;
      info!(round_id, records = scores.len(), "Scores persisted");
      true
    };

    Ok(ScoringSummary {
      round_id,
      rosters_scored: scores.len(),
      scores,
      persisted,
    })
  }

  async fn persist_prices(
    &self,
    mut summary: PricingSummary,
  ) -> Result<PricingSummary, StageFailure> {
    if self.dry_run {
      info!(round_id = summary.round_id, "Dry run, prices not persisted");
      return Ok(summary);
    }

    let recorded_at = Utc::now();
    let history: Vec<PriceHistoryEntry> = [&summary.drivers, &summary.constructors]
      .into_iter()
      .filter_map(|pool| match pool {
        PoolPricing::Repriced { assets } => Some(assets),
        PoolPricing::AlreadyPriced { .. } => None,
      })
      .flatten()
      .map(|asset| PriceHistoryEntry {
        asset: asset.asset.clone(),
        round_id: summary.round_id,
        price: asset.new_price,
        recorded_at,
      })
      .collect();

    if !history.is_empty() {
      let recorded = self
        .repo
        .record_prices(&history)
        .await
        .map_err(store_failure(Stage::Persisting))?;
      info!(
        round_id = summary.round_id,
        repriced = history.len(),
        recorded,
        "Prices persisted"
      );
    }

    summary.persisted = true;
    Ok(summary)
  }
}

fn fetch_failure(cause: SettlementError) -> StageFailure {
  StageFailure::new(Stage::Fetching, cause)
}

fn store_failure(stage: Stage) -> impl Fn(anyhow::Error) -> StageFailure {
  move |e| StageFailure::new(stage, SettlementError::store(&e))
}
