//! Canonical race outcomes.
//!
//! Everything downstream of the normalizer branches on [`Outcome`] only,
//! never on raw feed text.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::asset::{CarNumber, ConstructorKey};

/// How a car's race ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    /// Classified at `rank`. Rank 0 marks an unclassified or unparseable
    /// position and is worth no points.
    Finished { rank: u32 },
    /// Started but did not reach the flag.
    Retired,
    /// Entered but withdrawn or never started.
    DidNotStart,
}

impl Outcome {
    pub const UNCLASSIFIED: Self = Self::Finished { rank: 0 };

    pub const fn is_classified(&self) -> bool {
        matches!(self, Self::Finished { rank } if *rank > 0)
    }
}

/// One car's result in one race.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompetitorOutcome {
    pub car_number: CarNumber,
    pub constructor: ConstructorKey,
    pub outcome: Outcome,
}

impl CompetitorOutcome {
    pub fn new(car_number: u32, constructor: &str, outcome: Outcome) -> Self {
        Self {
            car_number: CarNumber(car_number),
            constructor: ConstructorKey::from(constructor),
            outcome,
        }
    }
}

/// Normalized race result: race identity plus one outcome per car.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RaceResult {
    pub race_date: NaiveDate,
    pub race_name: String,
    pub season: Option<String>,
    /// Championship round number as published by the feed.
    pub round: Option<u32>,
    pub outcomes: Vec<CompetitorOutcome>,
}
