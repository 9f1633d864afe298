//! Repository Ports - Roster Snapshot and Settlement Persistence
//!
//! Rosters, the round calendar and asset prices are owned by the rest
//! of the game; settlement reads them and writes back score records,
//! price history and current prices. Storage is a simple keyed record
//! store:
//! - scores: upsert by `(roster_id, round_id)`
//! - price history: insert-if-absent by `(asset, round_id)`
//! - current prices: update by asset, only together with the history
//!   entry that records the new price

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::domain::asset::{AssetId, AssetPool, PriceHistoryEntry};
use crate::domain::roster::{RosterSelection, Round, RoundId, ScoreResult};

/// Trait for roster snapshot providers.
#[async_trait]
pub trait RosterStore: Send + Sync + 'static {
  /// All rosters entered for a round. Supplies no race-outcome data.
  async fn rosters_for_round(&self, round_id: RoundId) -> anyhow::Result<Vec<RosterSelection>>;
}

/// Trait for settlement persistence.
#[async_trait]
pub trait Repository: Send + Sync + 'static {
  /// Calendar round whose race falls on `race_date`.
  async fn find_round_by_date(&self, race_date: NaiveDate) -> anyhow::Result<Option<Round>>;

  /// Current price of every asset in a pool.
  async fn current_prices(&self, pool: AssetPool) -> anyhow::Result<BTreeMap<AssetId, f64>>;

  /// Insert or replace score records, keyed by `(roster_id, round_id)`.
  async fn upsert_scores(&self, scores: &[ScoreResult]) -> anyhow::Result<()>;

  /// Score records of a round.
  async fn load_scores(&self, round_id: RoundId) -> anyhow::Result<Vec<ScoreResult>>;

  /// Recorded history of a pool for a round (empty if not yet priced).
  async fn price_history(
    &self,
    pool: AssetPool,
    round_id: RoundId,
  ) -> anyhow::Result<Vec<PriceHistoryEntry>>;

  /// Record repriced assets: append the entries whose `(asset, round_id)`
  /// is not yet recorded and set each such asset's current price to the
  /// entry's price.
  ///
  /// History and price change become visible together or not at all.
  /// Recorded entries are never overwritten and their prices are never
  /// applied twice. Returns the number of entries recorded.
  async fn record_prices(&self, entries: &[PriceHistoryEntry]) -> anyhow::Result<usize>;

  /// Check if the store is readable and writable.
  async fn is_healthy(&self) -> bool;
}
