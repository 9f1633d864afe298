//! Priceable assets: drivers (by car number) and constructors (by team key).
//!
//! Identities here are the game's identities, and they match the feed
//! number-for-number, so no lookup table sits between them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::roster::RoundId;

// ────────────────────────────────────────────
// Identities
// ────────────────────────────────────────────

/// Permanent competition number of a driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CarNumber(pub u32);

impl std::fmt::Display for CarNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Constructor (team) identifier as published by the feed, e.g. `red_bull`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConstructorKey(pub String);

impl std::fmt::Display for ConstructorKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ConstructorKey {
    fn from(key: &str) -> Self {
        Self(key.to_string())
    }
}

/// The two independently-priced asset pools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetPool {
    Drivers,
    Constructors,
}

impl std::fmt::Display for AssetPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Drivers => write!(f, "drivers"),
            Self::Constructors => write!(f, "constructors"),
        }
    }
}

/// A priceable entity.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum AssetId {
    Driver(CarNumber),
    Constructor(ConstructorKey),
}

impl AssetId {
    /// Pool this asset is priced against.
    pub const fn pool(&self) -> AssetPool {
        match self {
            Self::Driver(_) => AssetPool::Drivers,
            Self::Constructor(_) => AssetPool::Constructors,
        }
    }
}

impl std::fmt::Display for AssetId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Driver(number) => write!(f, "driver:{}", number.0),
            Self::Constructor(key) => write!(f, "constructor:{key}"),
        }
    }
}

// ────────────────────────────────────────────
// Prices
// ────────────────────────────────────────────

/// Current market price of an asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetPrice {
    pub asset: AssetId,
    pub price: f64,
}

/// Frozen price snapshot for one asset at one round.
///
/// Appended once per `(asset, round_id)` and never rewritten.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceHistoryEntry {
    pub asset: AssetId,
    pub round_id: RoundId,
    pub price: f64,
    pub recorded_at: DateTime<Utc>,
}

impl PriceHistoryEntry {
    /// Storage key used for insert-if-absent semantics.
    pub fn key(&self) -> (AssetId, RoundId) {
        (self.asset.clone(), self.round_id)
    }
}
