//! In-Memory Repository
//!
//! Same keyed-record semantics as `FileRepository`, held behind a
//! `RwLock`. Seeded with builder methods.

use std::collections::BTreeMap;

use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use tokio::sync::RwLock;

use super::price_book::PriceBook;
use crate::domain::asset::{AssetId, AssetPool, AssetPrice, CarNumber, PriceHistoryEntry};
use crate::domain::roster::{RosterId, RosterSelection, Round, RoundId, ScoreResult};
use crate::ports::repository::{Repository, RosterStore};

#[derive(Debug, Default)]
struct Store {
    rounds: Vec<Round>,
    prices: PriceBook,
    rosters: BTreeMap<RoundId, Vec<RosterSelection>>,
    scores: BTreeMap<(RoundId, RosterId), ScoreResult>,
    history: Vec<PriceHistoryEntry>,
}

/// Process-local settlement store.
#[derive(Debug, Default)]
pub struct InMemoryRepository {
    store: RwLock<Store>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_round(mut self, id: RoundId, name: &str, race_date: NaiveDate) -> Self {
        self.store.get_mut().rounds.push(Round {
            id,
            name: name.to_string(),
            race_date,
        });
        self
    }

    pub fn with_driver_price(mut self, car: u32, price: f64) -> Self {
        self.store.get_mut().prices.drivers.insert(CarNumber(car), price);
        self
    }

    pub fn with_constructor_price(mut self, key: &str, price: f64) -> Self {
        self.store
            .get_mut()
            .prices
            .constructors
            .insert(key.into(), price);
        self
    }

    pub fn with_roster(mut self, roster: RosterSelection) -> Self {
        self.store
            .get_mut()
            .rosters
            .entry(roster.round_id)
            .or_default()
            .push(roster);
        self
    }

    /// Snapshot of the current prices.
    pub async fn price_book(&self) -> PriceBook {
        self.store.read().await.prices.clone()
    }

    /// Every history entry in insertion order.
    pub async fn all_history(&self) -> Vec<PriceHistoryEntry> {
        self.store.read().await.history.clone()
    }
}

#[async_trait]
impl RosterStore for InMemoryRepository {
    async fn rosters_for_round(&self, round_id: RoundId) -> Result<Vec<RosterSelection>> {
        Ok(self
            .store
            .read()
            .await
            .rosters
            .get(&round_id)
            .cloned()
            .unwrap_or_default())
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn find_round_by_date(&self, race_date: NaiveDate) -> Result<Option<Round>> {
        Ok(self
            .store
            .read()
            .await
            .rounds
            .iter()
            .find(|r| r.race_date == race_date)
            .cloned())
    }

    async fn current_prices(&self, pool: AssetPool) -> Result<BTreeMap<AssetId, f64>> {
        Ok(self.store.read().await.prices.pool(pool))
    }

    async fn upsert_scores(&self, scores: &[ScoreResult]) -> Result<()> {
        let mut store = self.store.write().await;
        for score in scores {
            store
                .scores
                .insert((score.round_id, score.roster_id), score.clone());
        }
        Ok(())
    }

    async fn load_scores(&self, round_id: RoundId) -> Result<Vec<ScoreResult>> {
        Ok(self
            .store
            .read()
            .await
            .scores
            .range((round_id, RosterId::MIN)..=(round_id, RosterId::MAX))
            .map(|(_, s)| s.clone())
            .collect())
    }

    async fn price_history(
        &self,
        pool: AssetPool,
        round_id: RoundId,
    ) -> Result<Vec<PriceHistoryEntry>> {
        Ok(self
            .store
            .read()
            .await
            .history
            .iter()
            .filter(|e| e.round_id == round_id && e.asset.pool() == pool)
            .cloned()
            .collect())
    }

    async fn record_prices(&self, entries: &[PriceHistoryEntry]) -> Result<usize> {
        let mut store = self.store.write().await;
        let mut recorded = Vec::new();
        for entry in entries {
            let key = entry.key();
            if store.history.iter().any(|e| e.key() == key) {
                continue;
            }
            store.history.push(entry.clone());
            recorded.push(AssetPrice {
                asset: entry.asset.clone(),
                price: entry.price,
            });
        }
        store.prices.apply(&recorded);
        Ok(recorded.len())
    }

    async fn is_healthy(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::domain::asset::ConstructorKey;

    #[tokio::test]
    async fn test_builder_seeds_store() {
        let date = NaiveDate::from_ymd_opt(2025, 3, 16).unwrap();
        let repo = InMemoryRepository::new()
            .with_round(1, "Australia", date)
            .with_driver_price(1, 30.0)
            .with_constructor_price("mclaren", 25.0)
            .with_roster(RosterSelection::new(7, 70, 1).with_drivers([1]));

        assert_eq!(repo.find_round_by_date(date).await.unwrap().unwrap().id, 1);
        assert_eq!(repo.current_prices(AssetPool::Drivers).await.unwrap().len(), 1);
        assert_eq!(repo.rosters_for_round(1).await.unwrap().len(), 1);
        assert!(repo.rosters_for_round(2).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_scores_scoped_to_round() {
        let repo = InMemoryRepository::new();
        let make = |roster_id, round_id| ScoreResult {
            roster_id,
            owner_id: 1,
            round_id,
            driver_points: 1.0,
            constructor_points: 0.0,
            total_points: 1.0,
            computed_at: Utc::now(),
        };
        repo.upsert_scores(&[make(1, 1), make(2, 1), make(1, 2)])
            .await
            .unwrap();
        repo.upsert_scores(&[make(1, 1)]).await.unwrap();

        assert_eq!(repo.load_scores(1).await.unwrap().len(), 2);
        assert_eq!(repo.load_scores(2).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_history_never_overwritten() {
        let repo = InMemoryRepository::new();
        let entry = |price| PriceHistoryEntry {
            asset: AssetId::Constructor("ferrari".into()),
            round_id: 5,
            price,
            recorded_at: Utc::now(),
        };
        assert_eq!(repo.record_prices(&[entry(20.0)]).await.unwrap(), 1);
        assert_eq!(repo.record_prices(&[entry(21.0)]).await.unwrap(), 0);

        let history = repo.all_history().await;
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].price, 20.0);
        // The rejected entry's price is not applied either.
        assert_eq!(repo.price_book().await.constructors[&ConstructorKey::from("ferrari")], 20.0);
    }
}
