//! Rosters, rounds and score records.
//!
//! Rosters are owned by the team-management side of the game; settlement
//! only reads them. Score records are the settlement output.

use std::collections::BTreeSet;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::asset::{CarNumber, ConstructorKey};

/// Lightweight round identifier (calendar id of a race weekend).
pub type RoundId = u32;

/// Lightweight roster identifier.
pub type RosterId = u64;

/// One race weekend of the competition calendar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Round {
    pub id: RoundId,
    pub name: String,
    /// Race day; the feed's race date is matched against this.
    pub race_date: NaiveDate,
}

/// A participant's picks for one round.
///
/// Sets are order-irrelevant and a car or constructor counts at most once
/// per roster. Cardinality is a game rule and is not checked here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterSelection {
    pub roster_id: RosterId,
    pub owner_id: u64,
    pub round_id: RoundId,
    #[serde(default)]
    pub drivers: BTreeSet<CarNumber>,
    #[serde(default)]
    pub constructors: BTreeSet<ConstructorKey>,
}

impl RosterSelection {
    pub fn new(roster_id: RosterId, owner_id: u64, round_id: RoundId) -> Self {
        Self {
            roster_id,
            owner_id,
            round_id,
            drivers: BTreeSet::new(),
            constructors: BTreeSet::new(),
        }
    }

    /// Builder-style helper: add driver picks.
    #[must_use]
    pub fn with_drivers(mut self, drivers: impl IntoIterator<Item = u32>) -> Self {
        self.drivers.extend(drivers.into_iter().map(CarNumber));
        self
    }

    /// Builder-style helper: add constructor picks.
    #[must_use]
    pub fn with_constructors<'a>(mut self, keys: impl IntoIterator<Item = &'a str>) -> Self {
        self.constructors.extend(keys.into_iter().map(ConstructorKey::from));
        self
    }
}

/// Settled score of one roster for one round.
///
/// Keyed by `(roster_id, round_id)`; a re-run replaces the record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreResult {
    pub roster_id: RosterId,
    pub owner_id: u64,
    pub round_id: RoundId,
    pub driver_points: f64,
    pub constructor_points: f64,
    /// Driver points plus scaled constructor points; may be fractional.
    pub total_points: f64,
    pub computed_at: DateTime<Utc>,
}

impl ScoreResult {
    pub const fn key(&self) -> (RosterId, RoundId) {
        (self.roster_id, self.round_id)
    }

    /// Equality on everything except the computation timestamp.
    pub fn same_score(&self, other: &Self) -> bool {
        self.key() == other.key()
            && self.owner_id == other.owner_id
            && self.driver_points == other.driver_points
            && self.constructor_points == other.constructor_points
            && self.total_points == other.total_points
    }
}
