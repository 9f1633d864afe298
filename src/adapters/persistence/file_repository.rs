//! File Repository - Concrete Adapter for the Repository Ports
//!
//! Keyed record store on the local filesystem:
//!
//! ```text
//! {data_dir}/calendar.json              rounds (read-only)
//! {data_dir}/prices.json                current prices (atomic snapshot)
//! {data_dir}/rosters/round-{id}.jsonl   roster snapshot per round
//! {data_dir}/scores/round-{id}.json     score records per round (upsert)
//! {data_dir}/price_history.jsonl        append-only price history
//! ```
//!
//! The price history is the commit point for repricing. `prices.json`
//! records how many history entries it reflects and is rolled forward
//! from the log whenever it lags behind, so a failed snapshot write
//! never loses a recorded price.
//!
//! The use cases only know the `Repository` / `RosterStore` traits,
//! never files or JSON.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{info, instrument, warn};

use super::jsonl::JsonlLog;
use super::price_book::PriceBook;
use super::snapshot::SnapshotFile;
use crate::domain::asset::{AssetId, AssetPool, PriceHistoryEntry};
use crate::domain::roster::{RosterSelection, Round, RoundId, ScoreResult};
use crate::ports::repository::{Repository, RosterStore};

/// Filesystem-backed settlement store.
pub struct FileRepository {
    /// Root directory.
    data_dir: PathBuf,
    /// Round calendar.
    calendar: SnapshotFile<Vec<Round>>,
    /// Current prices.
    prices: SnapshotFile<PriceBook>,
    /// Append-only price history.
    history: JsonlLog<PriceHistoryEntry>,
    /// Serializes read-modify-write cycles.
    write_lock: Mutex<()>,
}

impl FileRepository {
    /// Open a repository rooted at `data_dir`, creating it if needed.
    pub async fn from_data_dir(data_dir: &str) -> Result<Self> {
        let dir = Path::new(data_dir);
        fs::create_dir_all(dir)
            .await
            .with_context(|| format!("Failed to create data directory {}", dir.display()))?;

        Ok(Self {
            data_dir: dir.to_path_buf(),
            calendar: SnapshotFile::new(dir.join("calendar.json")),
            prices: SnapshotFile::new(dir.join("prices.json")),
            history: JsonlLog::new(dir.join("price_history.jsonl")),
            write_lock: Mutex::new(()),
        })
    }

    fn scores_file(&self, round_id: RoundId) -> SnapshotFile<Vec<ScoreResult>> {
        SnapshotFile::new(
            self.data_dir
                .join("scores")
                .join(format!("round-{round_id}.json")),
        )
    }

    fn rosters_log(&self, round_id: RoundId) -> JsonlLog<RosterSelection> {
        JsonlLog::new(
            self.data_dir
                .join("rosters")
                .join(format!("round-{round_id}.jsonl")),
        )
    }

    /// Replace the round calendar.
    pub async fn save_calendar(&self, rounds: &[Round]) -> Result<()> {
        self.calendar.save(&rounds.to_vec()).await
    }

    /// Replace the whole price book. History recorded so far counts as
    /// already reflected in it.
    pub async fn save_price_book(&self, book: &PriceBook) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut book = book.clone();
        book.history_applied = self.history.load_all().await?.len();
        self.prices.save(&book).await
    }

    /// Add rosters to their rounds' snapshots.
    pub async fn append_rosters(&self, rosters: &[RosterSelection]) -> Result<()> {
        let mut by_round: BTreeMap<RoundId, Vec<RosterSelection>> = BTreeMap::new();
        for roster in rosters {
            by_round
                .entry(roster.round_id)
                .or_default()
                .push(roster.clone());
        }
        for (round_id, batch) in by_round {
            self.rosters_log(round_id).append(&batch).await?;
        }
        Ok(())
    }

    /// Full price history across all rounds.
    pub async fn load_price_history(&self) -> Result<Vec<PriceHistoryEntry>> {
        self.history.load_all().await
    }

    /// Stored prices with every recorded history entry applied.
    async fn settled_book(&self, history: &[PriceHistoryEntry]) -> Result<PriceBook> {
        let mut book = self.prices.load_or_default().await?;
        let rolled = book.catch_up(history);
        if rolled > 0 {
            warn!(rolled, "Price snapshot behind history, rolled forward");
        }
        Ok(book)
    }
}

#[async_trait]
impl RosterStore for FileRepository {
    #[instrument(skip(self))]
    async fn rosters_for_round(&self, round_id: RoundId) -> Result<Vec<RosterSelection>> {
        let rosters = self.rosters_log(round_id).load_all().await?;
        Ok(rosters
            .into_iter()
            .filter(|r| r.round_id == round_id)
            .collect())
    }
}

#[async_trait]
impl Repository for FileRepository {
    async fn find_round_by_date(&self, race_date: NaiveDate) -> Result<Option<Round>> {
        let rounds = self.calendar.load_or_default().await?;
        Ok(rounds.into_iter().find(|r| r.race_date == race_date))
    }

    async fn current_prices(&self, pool: AssetPool) -> Result<BTreeMap<AssetId, f64>> {
        let history = self.history.load_all().await?;
        Ok(self.settled_book(&history).await?.pool(pool))
    }

    #[instrument(skip(self, scores), fields(count = scores.len()))]
    async fn upsert_scores(&self, scores: &[ScoreResult]) -> Result<()> {
        let _guard = self.write_lock.lock().await;

        let mut by_round: BTreeMap<RoundId, Vec<&ScoreResult>> = BTreeMap::new();
        for score in scores {
            by_round.entry(score.round_id).or_default().push(score);
        }

        for (round_id, batch) in by_round {
            let file = self.scores_file(round_id);
            let mut records: BTreeMap<_, _> = file
                .load_or_default()
                .await?
                .into_iter()
                .map(|s| (s.roster_id, s))
                .collect();

            for score in batch {
                records.insert(score.roster_id, score.clone());
            }

            let records: Vec<_> = records.into_values().collect();
            file.save(&records).await?;
            info!(round_id, records = records.len(), "Score records written");
        }

        Ok(())
    }

    async fn load_scores(&self, round_id: RoundId) -> Result<Vec<ScoreResult>> {
        self.scores_file(round_id).load_or_default().await
    }

    async fn price_history(
        &self,
        pool: AssetPool,
        round_id: RoundId,
    ) -> Result<Vec<PriceHistoryEntry>> {
        Ok(self
            .history
            .load_all()
            .await?
            .into_iter()
            .filter(|e| e.round_id == round_id && e.asset.pool() == pool)
            .collect())
    }

    #[instrument(skip(self, entries), fields(count = entries.len()))]
    async fn record_prices(&self, entries: &[PriceHistoryEntry]) -> Result<usize> {
        let _guard = self.write_lock.lock().await;

        let mut history = self.history.load_all().await?;
        let mut seen: HashSet<(AssetId, RoundId)> =
            history.iter().map(PriceHistoryEntry::key).collect();

        let fresh: Vec<PriceHistoryEntry> = entries
            .iter()
            .filter(|e| seen.insert(e.key()))
            .cloned()
            .collect();
        if fresh.is_empty() {
            return Ok(0);
        }

        let mut book = self.settled_book(&history).await?;

        // Committed once the log append lands.
        self.history.append(&fresh).await?;
        history.extend(fresh.iter().cloned());

        book.catch_up(&history);
        self.prices
            .save(&book)
            .await
            .context("Price history recorded but price snapshot not updated")?;

        info!(recorded = fresh.len(), "Repriced assets recorded");
        Ok(fresh.len())
    }

    async fn is_healthy(&self) -> bool {
        let test_path = self.data_dir.join(".health_check");
        let result = fs::write(&test_path, b"ok").await;
        let _ = fs::remove_file(&test_path).await;
        result.is_ok()
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::domain::asset::CarNumber;

    async fn repo() -> (tempfile::TempDir, FileRepository) {
        let dir = tempfile::tempdir().unwrap();
        let repo = FileRepository::from_data_dir(dir.path().to_str().unwrap())
            .await
            .unwrap();
        (dir, repo)
    }

    fn score(roster_id: u64, round_id: RoundId, total: f64) -> ScoreResult {
        ScoreResult {
            roster_id,
            owner_id: roster_id,
            round_id,
            driver_points: total,
            constructor_points: 0.0,
            total_points: total,
            computed_at: Utc::now(),
        }
    }

    fn entry(car: u32, round_id: RoundId, price: f64) -> PriceHistoryEntry {
        PriceHistoryEntry {
            asset: AssetId::Driver(CarNumber(car)),
            round_id,
            price,
            recorded_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_round_lookup_by_date() {
        let (_dir, repo) = repo().await;
        let date = NaiveDate::from_ymd_opt(2025, 6, 29).unwrap();
        repo.save_calendar(&[Round {
            id: 11,
            name: "Austria".to_string(),
            race_date: date,
        }])
        .await
        .unwrap();

        assert_eq!(repo.find_round_by_date(date).await.unwrap().unwrap().id, 11);
        assert!(
            repo.find_round_by_date(date.succ_opt().unwrap())
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_scores_are_replaced_by_key() {
        let (_dir, repo) = repo().await;
        repo.upsert_scores(&[score(1, 3, 10.0), score(2, 3, 20.0)])
            .await
            .unwrap();
        repo.upsert_scores(&[score(1, 3, 15.5)]).await.unwrap();

        let scores = repo.load_scores(3).await.unwrap();
        assert_eq!(scores.len(), 2);
        assert_eq!(scores[0].total_points, 15.5);
        assert_eq!(scores[1].total_points, 20.0);
        assert!(repo.load_scores(4).await.unwrap().is_empty());
    }

    fn driver_price(drivers: &BTreeMap<AssetId, f64>, car: u32) -> f64 {
        drivers[&AssetId::Driver(CarNumber(car))]
    }

    #[tokio::test]
    async fn test_history_insert_if_absent() {
        let (_dir, repo) = repo().await;
        assert_eq!(
            repo.record_prices(&[entry(1, 3, 30.0), entry(44, 3, 20.0)])
                .await
                .unwrap(),
            2
        );
        // Same keys again with different prices: nothing is written.
        assert_eq!(
            repo.record_prices(&[entry(1, 3, 99.0), entry(1, 4, 31.0)])
                .await
                .unwrap(),
            1
        );

        let round3 = repo.price_history(AssetPool::Drivers, 3).await.unwrap();
        assert_eq!(round3.len(), 2);
        assert_eq!(round3[0].price, 30.0);
        assert!(
            repo.price_history(AssetPool::Constructors, 3)
                .await
                .unwrap()
                .is_empty()
        );
        assert_eq!(repo.load_price_history().await.unwrap().len(), 3);

        // The skipped 99.0 never reached the current price.
        let drivers = repo.current_prices(AssetPool::Drivers).await.unwrap();
        assert_eq!(driver_price(&drivers, 1), 31.0);
        assert_eq!(driver_price(&drivers, 44), 20.0);
    }

    #[tokio::test]
    async fn test_recorded_price_survives_failed_snapshot_write() {
        let (dir, repo) = repo().await;
        let mut book = PriceBook::default();
        book.drivers.insert(CarNumber(4), 30.0);
        book.drivers.insert(CarNumber(81), 28.0);
        repo.save_price_book(&book).await.unwrap();

        // A directory in the way of the tmp file breaks the snapshot write.
        let blocker = dir.path().join("prices.json.tmp");
        std::fs::create_dir(&blocker).unwrap();
        assert!(repo.record_prices(&[entry(4, 3, 30.9)]).await.is_err());

        // The history landed, so the new price is already current.
        assert_eq!(repo.price_history(AssetPool::Drivers, 3).await.unwrap().len(), 1);
        let drivers = repo.current_prices(AssetPool::Drivers).await.unwrap();
        assert_eq!(driver_price(&drivers, 4), 30.9);

        // A retry records nothing twice; the next write persists the catch-up.
        std::fs::remove_dir(&blocker).unwrap();
        assert_eq!(repo.record_prices(&[entry(4, 3, 30.9)]).await.unwrap(), 0);
        assert_eq!(repo.record_prices(&[entry(81, 4, 27.2)]).await.unwrap(), 1);

        let on_disk: PriceBook = serde_json::from_str(
            &std::fs::read_to_string(dir.path().join("prices.json")).unwrap(),
        )
        .unwrap();
        assert_eq!(on_disk.history_applied, 2);
        assert_eq!(on_disk.drivers[&CarNumber(4)], 30.9);
        assert_eq!(on_disk.drivers[&CarNumber(81)], 27.2);
    }

    #[tokio::test]
    async fn test_torn_history_line_keeps_later_records() {
        let (dir, repo) = repo().await;
        std::fs::write(
            dir.path().join("price_history.jsonl"),
            "{\"asset\":{\"kind\":\"driver\",\"id\":1},\"round",
        )
        .unwrap();

        assert_eq!(repo.record_prices(&[entry(44, 2, 20.0)]).await.unwrap(), 1);

        let round2 = repo.price_history(AssetPool::Drivers, 2).await.unwrap();
        assert_eq!(round2.len(), 1);
        assert_eq!(round2[0].asset, AssetId::Driver(CarNumber(44)));
    }

    #[tokio::test]
    async fn test_prices_and_rosters() {
        let (_dir, repo) = repo().await;
        let mut book = PriceBook::default();
        book.drivers.insert(CarNumber(1), 30.0);
        repo.save_price_book(&book).await.unwrap();

        repo.record_prices(&[entry(1, 3, 30.9)]).await.unwrap();
        let drivers = repo.current_prices(AssetPool::Drivers).await.unwrap();
        assert_eq!(driver_price(&drivers, 1), 30.9);

        repo.append_rosters(&[
            RosterSelection::new(1, 1, 3).with_drivers([1]),
            RosterSelection::new(2, 2, 4).with_drivers([1]),
        ])
        .await
        .unwrap();
        assert_eq!(repo.rosters_for_round(3).await.unwrap().len(), 1);
        assert!(repo.rosters_for_round(5).await.unwrap().is_empty());
        assert!(repo.is_healthy().await);
    }
}
