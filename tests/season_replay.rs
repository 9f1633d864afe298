//! Season Replay - Multi-round Settlement Simulation
//!
//! Replays a short synthetic season through the coordinator against the
//! in-memory store, checking that prices drift with demand round after
//! round and that every round leaves its own history.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::NaiveDate;
use serde_json::json;

use f1_fantasy_settlement::adapters::persistence::InMemoryRepository;
use f1_fantasy_settlement::config::AppConfig;
use f1_fantasy_settlement::domain::asset::CarNumber;
use f1_fantasy_settlement::domain::roster::RosterSelection;
use f1_fantasy_settlement::ports::race_feed::{RaceFeed, RoundSelector};
use f1_fantasy_settlement::ports::repository::Repository;
use f1_fantasy_settlement::usecases::SettlementCoordinator;

/// Serves one canned result per round number.
struct ReplayFeed {
    races: BTreeMap<u32, serde_json::Value>,
}

#[async_trait::async_trait]
impl RaceFeed for ReplayFeed {
    async fn fetch_results(&self, selector: RoundSelector) -> anyhow::Result<serde_json::Value> {
        let round = match selector {
            RoundSelector::Round(n) => n,
            RoundSelector::Latest => *self
                .races
                .keys()
                .next_back()
                .ok_or_else(|| anyhow::anyhow!("season has no races"))?,
        };
        self.races
            .get(&round)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("round {round} not raced yet"))
    }

    async fn is_healthy(&self) -> bool {
        true
    }
}

fn date(round: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 3, 2).unwrap() + chrono::Duration::weeks(i64::from(round))
}

/// Car 1 wins every race; car 2 always retires.
fn race(round: u32) -> serde_json::Value {
    json!({
        "MRData": { "RaceTable": { "Races": [{
            "season": "2025",
            "round": round.to_string(),
            "raceName": format!("Round {round} Grand Prix"),
            "date": date(round).to_string(),
            "Results": [
                {
                    "number": "1", "position": "1", "positionText": "1",
                    "Driver": { "permanentNumber": "1" },
                    "Constructor": { "constructorId": "alpha" }
                },
                {
                    "number": "3", "position": "2", "positionText": "2",
                    "Driver": { "permanentNumber": "3" },
                    "Constructor": { "constructorId": "beta" }
                },
                {
                    "number": "2", "position": "3", "positionText": "R",
                    "Driver": { "permanentNumber": "2" },
                    "Constructor": { "constructorId": "alpha" }
                }
            ]
        }]}}
    })
}

const ROUNDS: u32 = 3;

fn season_repo() -> InMemoryRepository {
    let mut repo = InMemoryRepository::new()
        .with_driver_price(1, 20.0)
        .with_driver_price(2, 20.0)
        .with_driver_price(3, 20.0)
        .with_constructor_price("alpha", 20.0)
        .with_constructor_price("beta", 20.0);

    for round in 1..=ROUNDS {
        repo = repo.with_round(round, &format!("Round {round}"), date(round));
        // Everybody wants car 1, nobody wants car 2.
        for roster_id in 0..4u64 {
            repo = repo.with_roster(
                RosterSelection::new(u64::from(round) * 100 + roster_id, roster_id, round)
                    .with_drivers([1, 3])
                    .with_constructors([if roster_id % 2 == 0 { "alpha" } else { "beta" }]),
            );
        }
    }
    repo
}

#[tokio::test]
async fn test_replay_season_drifts_prices_with_demand() {
    let repo = Arc::new(season_repo());
    let feed = ReplayFeed {
        races: (1..=ROUNDS).map(|r| (r, race(r))).collect(),
    };
    let coordinator = SettlementCoordinator::new(
        Arc::new(feed),
        Arc::clone(&repo),
        Arc::clone(&repo),
        &AppConfig::default(),
    );

    let mut favourite = vec![20.0];
    let mut ignored = vec![20.0];

    for round in 1..=ROUNDS {
        let report = coordinator.settle_round(RoundSelector::Round(round)).await;
        assert!(report.is_success(), "round {round} failed: {report:?}");
        assert_eq!(report.round.as_ref().unwrap().id, round);

        let scores = repo.load_scores(round).await.unwrap();
        assert_eq!(scores.len(), 4);
        // 50 + 36 for the drivers, then half of either team's lineup.
        let alpha = scores.iter().find(|s| s.owner_id == 0).unwrap();
        assert_eq!(alpha.total_points, 86.0 + 20.0);
        let beta = scores.iter().find(|s| s.owner_id == 1).unwrap();
        assert_eq!(beta.total_points, 86.0 + 18.0);

        let book = repo.price_book().await;
        favourite.push(book.drivers[&CarNumber(1)]);
        ignored.push(book.drivers[&CarNumber(2)]);
    }

    assert!(favourite.windows(2).all(|w| w[1] > w[0]), "{favourite:?}");
    assert!(ignored.windows(2).all(|w| w[1] < w[0]), "{ignored:?}");

    // Three drivers + two constructors per round.
    let history = repo.all_history().await;
    assert_eq!(history.len(), 5 * ROUNDS as usize);
    for round in 1..=ROUNDS {
        assert_eq!(history.iter().filter(|e| e.round_id == round).count(), 5);
    }
}

#[tokio::test]
async fn test_unraced_round_is_no_race() {
    let repo = Arc::new(season_repo());
    let feed = ReplayFeed {
        races: BTreeMap::from([(1, race(1))]),
    };
    let coordinator = SettlementCoordinator::new(
        Arc::new(feed),
        Arc::clone(&repo),
        Arc::clone(&repo),
        &AppConfig::default(),
    );

    let report = coordinator.settle_round(RoundSelector::Round(2)).await;
    assert!(report.scoring.is_err());
    assert!(report.pricing.is_err());
    assert!(repo.all_history().await.is_empty());

    let latest = coordinator.settle_round(RoundSelector::Latest).await;
    assert!(latest.is_success());
    assert_eq!(latest.round.unwrap().id, 1);
}
