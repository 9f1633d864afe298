//! Fantasy scoring engine.
//!
//! Maps normalized outcomes to fantasy points for a roster:
//! - Drivers: table points of each picked car's own outcome.
//! - Constructors: table points of **every** car the constructor entered,
//!   scaled by the constructor factor (one half by default). The user's
//!   driver picks play no part in constructor points.
//!
//! Scoring never fails. Cars or constructors missing from the result
//! (session not run, data lag, stale roster) simply score zero.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::asset::{CarNumber, ConstructorKey};
use super::outcome::{CompetitorOutcome, Outcome};
use super::roster::RosterSelection;

/// Default points for ranks 1..=20.
pub const DEFAULT_RANK_POINTS: [i32; 20] =
    [50, 36, 30, 24, 20, 16, 12, 8, 4, 2, 1, 1, 0, 0, 0, 0, 0, 0, 0, 0];

/// Default retirement penalty.
pub const DEFAULT_RETIRED_PENALTY: i32 = -10;

/// Default non-start penalty.
pub const DEFAULT_DID_NOT_START_PENALTY: i32 = -1;

/// Default scaling applied to constructor lineup points.
pub const DEFAULT_CONSTRUCTOR_FACTOR: f64 = 0.5;

/// Rank → points mapping plus penalties.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointsTable {
    /// Points for rank `i + 1`. Ranks past the end score 0.
    rank_points: Vec<i32>,
    retired_penalty: i32,
    did_not_start_penalty: i32,
    constructor_factor: f64,
}

impl Default for PointsTable {
    fn default() -> Self {
        Self {
            rank_points: DEFAULT_RANK_POINTS.to_vec(),
            retired_penalty: DEFAULT_RETIRED_PENALTY,
            did_not_start_penalty: DEFAULT_DID_NOT_START_PENALTY,
            constructor_factor: DEFAULT_CONSTRUCTOR_FACTOR,
        }
    }
}

impl PointsTable {
    pub const fn new(
        rank_points: Vec<i32>,
        retired_penalty: i32,
        did_not_start_penalty: i32,
        constructor_factor: f64,
    ) -> Self {
        Self {
            rank_points,
            retired_penalty,
            did_not_start_penalty,
            constructor_factor,
        }
    }

    /// Points for a single outcome.
    pub fn points_for(&self, outcome: Outcome) -> i32 {
        match outcome {
            Outcome::Finished { rank: 0 } => 0,
            Outcome::Finished { rank } => usize::try_from(rank - 1)
                .ok()
                .and_then(|idx| self.rank_points.get(idx))
                .copied()
                .unwrap_or(0),
            Outcome::Retired => self.retired_penalty,
            Outcome::DidNotStart => self.did_not_start_penalty,
        }
    }

    pub const fn constructor_factor(&self) -> f64 {
        self.constructor_factor
    }
}

/// Per-race lookup built once and shared by every roster.
#[derive(Debug, Clone, Default)]
pub struct OutcomeIndex {
    by_car: HashMap<CarNumber, Outcome>,
    by_constructor: HashMap<ConstructorKey, Vec<Outcome>>,
}

impl OutcomeIndex {
    pub fn new(outcomes: &[CompetitorOutcome]) -> Self {
        let mut index = Self::default();
        for competitor in outcomes {
            index
                .by_car
                .entry(competitor.car_number)
                .or_insert(competitor.outcome);
            index
                .by_constructor
                .entry(competitor.constructor.clone())
                .or_default()
                .push(competitor.outcome);
        }
        index
    }

    pub fn outcome_of(&self, car: CarNumber) -> Option<Outcome> {
        self.by_car.get(&car).copied()
    }

    /// Outcomes of every car the constructor entered (empty if unknown).
    pub fn lineup_of(&self, constructor: &ConstructorKey) -> &[Outcome] {
        self.by_constructor
            .get(constructor)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

/// Points of one roster, split by source.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct ScoreBreakdown {
    pub driver_points: f64,
    /// Already scaled by the constructor factor.
    pub constructor_points: f64,
    pub total: f64,
}

/// Stateless scorer holding the points table.
#[derive(Debug, Clone, Default)]
pub struct ScoringEngine {
    table: PointsTable,
}

impl ScoringEngine {
    pub const fn new(table: PointsTable) -> Self {
        Self { table }
    }

    pub const fn table(&self) -> &PointsTable {
        &self.table
    }

    /// Total points of a roster against a race's outcomes.
    pub fn score(&self, selection: &RosterSelection, outcomes: &[CompetitorOutcome]) -> f64 {
        self.breakdown(selection, &OutcomeIndex::new(outcomes)).total
    }

    /// Points of a roster against a prebuilt index, split by source.
    pub fn breakdown(&self, selection: &RosterSelection, index: &OutcomeIndex) -> ScoreBreakdown {
        let driver_points: i32 = selection
            .drivers
            .iter()
            .filter_map(|car| index.outcome_of(*car))
            .map(|outcome| self.table.points_for(outcome))
            .sum();

        let constructor_points: f64 = selection
            .constructors
            .iter()
            .map(|key| self.constructor_points(index.lineup_of(key)))
            .sum();

        let driver_points = f64::from(driver_points);
        ScoreBreakdown {
            driver_points,
            constructor_points,
            total: driver_points + constructor_points,
        }
    }

    /// Scaled points of a full constructor lineup.
    pub fn constructor_points(&self, lineup: &[Outcome]) -> f64 {
        let raw: i32 = lineup.iter().map(|o| self.table.points_for(*o)).sum();
        f64::from(raw) * self.table.constructor_factor
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn race() -> Vec<CompetitorOutcome> {
        vec![
            CompetitorOutcome::new(1, "red_bull", Outcome::Finished { rank: 1 }),
            CompetitorOutcome::new(22, "red_bull", Outcome::Retired),
            CompetitorOutcome::new(16, "ferrari", Outcome::Finished { rank: 2 }),
            CompetitorOutcome::new(44, "ferrari", Outcome::Retired),
            CompetitorOutcome::new(23, "williams", Outcome::DidNotStart),
            CompetitorOutcome::new(55, "williams", Outcome::Finished { rank: 11 }),
            CompetitorOutcome::new(31, "haas", Outcome::Retired),
            CompetitorOutcome::new(87, "haas", Outcome::Retired),
            CompetitorOutcome::new(18, "aston_martin", Outcome::UNCLASSIFIED),
        ]
    }

    #[test]
    fn test_points_table_defaults() {
        let table = PointsTable::default();
        assert_eq!(table.points_for(Outcome::Finished { rank: 1 }), 50);
        assert_eq!(table.points_for(Outcome::Finished { rank: 2 }), 36);
        assert_eq!(table.points_for(Outcome::Finished { rank: 12 }), 1);
        assert_eq!(table.points_for(Outcome::Finished { rank: 20 }), 0);
        assert_eq!(table.points_for(Outcome::Finished { rank: 21 }), 0);
        assert_eq!(table.points_for(Outcome::UNCLASSIFIED), 0);
        assert_eq!(table.points_for(Outcome::Retired), -10);
        assert_eq!(table.points_for(Outcome::DidNotStart), -1);
    }

    #[test]
    fn test_default_rank_points_strictly_decreasing_until_floor() {
        let ranks = DEFAULT_RANK_POINTS;
        assert!(ranks.iter().all(|p| *p >= 0));
        assert!(ranks.windows(2).all(|w| w[0] >= w[1]));
    }

    #[test]
    fn test_retired_plus_second_scores_26() {
        let engine = ScoringEngine::default();
        let roster = RosterSelection::new(1, 1, 1).with_drivers([44, 16]);
        assert_eq!(engine.score(&roster, &race()), 26.0);
    }

    #[test]
    fn test_constructor_first_and_retired_scores_20() {
        let engine = ScoringEngine::default();
        let roster = RosterSelection::new(1, 1, 1).with_constructors(["red_bull"]);
        assert_eq!(engine.score(&roster, &race()), 20.0);
    }

    #[test]
    fn test_constructor_uses_full_lineup_not_driver_picks() {
        let engine = ScoringEngine::default();
        // Picks only Leclerc, but Ferrari's points include Hamilton's retirement.
        let roster = RosterSelection::new(1, 1, 1)
            .with_drivers([16])
            .with_constructors(["ferrari"]);
        let breakdown = engine.breakdown(&roster, &OutcomeIndex::new(&race()));
        assert_eq!(breakdown.driver_points, 36.0);
        assert_eq!(breakdown.constructor_points, 13.0);
        assert_eq!(breakdown.total, 49.0);
    }

    #[test]
    fn test_constructor_without_finishers_keeps_scaled_penalties() {
        let engine = ScoringEngine::default();
        let roster = RosterSelection::new(1, 1, 1).with_constructors(["haas"]);
        assert_eq!(engine.score(&roster, &race()), -10.0);
    }

    #[test]
    fn test_fractional_total() {
        let engine = ScoringEngine::default();
        // Williams: -1 + 1 = 0. Ferrari: (36 - 10) / 2 = 13.
        let roster = RosterSelection::new(1, 1, 1).with_constructors(["williams", "ferrari"]);
        assert_eq!(engine.score(&roster, &race()), 13.0);

        let lineup = [Outcome::Finished { rank: 12 }];
        assert_eq!(engine.constructor_points(&lineup), 0.5);
    }

    #[test]
    fn test_unknown_picks_score_zero() {
        let engine = ScoringEngine::default();
        let roster = RosterSelection::new(1, 1, 1)
            .with_drivers([99, 98])
            .with_constructors(["brawn"]);
        assert_eq!(engine.score(&roster, &race()), 0.0);
        assert_eq!(engine.score(&roster, &[]), 0.0);
    }

    #[test]
    fn test_custom_table() {
        let table = PointsTable::new(vec![25, 18, 15], -5, -2, 1.0);
        let engine = ScoringEngine::new(table);
        let roster = RosterSelection::new(1, 1, 1)
            .with_drivers([1, 23])
            .with_constructors(["red_bull"]);
        // Drivers: 25 - 2 = 23; Red Bull: (25 - 5) * 1.0 = 20.
        assert_eq!(engine.score(&roster, &race()), 43.0);
    }
}
