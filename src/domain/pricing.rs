//! Demand-driven asset pricing.
//!
//! Each round, every asset's price moves toward a target implied by how
//! often it was picked relative to the pool average:
//!
//! ```text
//! avg     = total_selections / asset_count          (0 if no assets)
//! demand  = (selections − avg) / avg                (0 if avg is 0)
//! target  = prior × (1 + learning_rate × demand)
//! new     = (1 − w) × prior + w × target            w = 0.3
//! ```
//!
//! rounded to one decimal place. Drivers and constructors are separate
//! pools: each is normalized only against itself.
//!
//! Selection counts come from a [`SelectionTally`] built in one pass over
//! the round's rosters before any price is computed.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use rust_decimal::prelude::*;
use serde::Serialize;

use super::asset::{AssetId, AssetPool};
use super::roster::RosterSelection;

/// Fraction of relative demand applied to the target price.
pub const DEFAULT_LEARNING_RATE: f64 = 0.1;

/// Share of the target move applied per round.
pub const DEFAULT_TARGET_WEIGHT: f64 = 0.3;

/// Decimal places kept on published prices.
pub const DEFAULT_PRICE_DECIMALS: u32 = 1;

// ────────────────────────────────────────────
// Selection tally
// ────────────────────────────────────────────

/// Selection counts for one asset pool.
///
/// Only assets registered at construction are counted; picks of unknown
/// assets are ignored and do not inflate the pool total.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoolTally {
    counts: BTreeMap<AssetId, u64>,
    total: u64,
}

impl PoolTally {
    /// Zeroed tally over the given pool.
    pub fn new(pool: impl IntoIterator<Item = AssetId>) -> Self {
        Self {
            counts: pool.into_iter().map(|asset| (asset, 0)).collect(),
            total: 0,
        }
    }

    fn record(&mut self, asset: &AssetId) {
        if let Some(count) = self.counts.get_mut(asset) {
            *count += 1;
            self.total += 1;
        }
    }

    pub fn count(&self, asset: &AssetId) -> u64 {
        self.counts.get(asset).copied().unwrap_or(0)
    }

    pub const fn total(&self) -> u64 {
        self.total
    }

    pub fn asset_count(&self) -> usize {
        self.counts.len()
    }

    /// Mean selections per asset; 0 for an empty pool.
    #[allow(clippy::cast_precision_loss)]
    pub fn average(&self) -> f64 {
        if self.counts.is_empty() {
            0.0
        } else {
            self.total as f64 / self.counts.len() as f64
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&AssetId, u64)> {
        self.counts.iter().map(|(asset, count)| (asset, *count))
    }
}

/// Per-round selection counts for both pools.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionTally {
    pub drivers: PoolTally,
    pub constructors: PoolTally,
}

impl SelectionTally {
    /// Count, for every pooled asset, how many rosters picked it.
    ///
    /// `pool` lists every priced asset; its pool membership is taken from
    /// the [`AssetId`] variant.
    pub fn from_rosters<'a>(
        rosters: impl IntoIterator<Item = &'a RosterSelection>,
        pool: impl IntoIterator<Item = AssetId>,
    ) -> Self {
        let (drivers, constructors): (Vec<_>, Vec<_>) = pool
            .into_iter()
            .partition(|asset| asset.pool() == AssetPool::Drivers);

        let mut tally = Self {
            drivers: PoolTally::new(drivers),
            constructors: PoolTally::new(constructors),
        };

        for roster in rosters {
            for car in &roster.drivers {
                tally.drivers.record(&AssetId::Driver(*car));
            }
            for key in &roster.constructors {
                tally.constructors.record(&AssetId::Constructor(key.clone()));
            }
        }

        tally
    }

    pub const fn pool(&self, pool: AssetPool) -> &PoolTally {
        match pool {
            AssetPool::Drivers => &self.drivers,
            AssetPool::Constructors => &self.constructors,
        }
    }

    /// Split into per-pool tallies.
    pub fn into_pools(self) -> (PoolTally, PoolTally) {
        (self.drivers, self.constructors)
    }
}

// ────────────────────────────────────────────
// Pricing engine
// ────────────────────────────────────────────

/// Repricing outcome for one asset.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RepricedAsset {
    pub asset: AssetId,
    pub prior_price: f64,
    pub selections: u64,
    pub relative_demand: f64,
    pub new_price: f64,
}

/// Damped demand-adjustment pricer.
#[derive(Debug, Clone)]
pub struct PricingEngine {
    learning_rate: f64,
    target_weight: f64,
    decimals: u32,
}

impl Default for PricingEngine {
    fn default() -> Self {
        Self::new(DEFAULT_LEARNING_RATE, DEFAULT_TARGET_WEIGHT, DEFAULT_PRICE_DECIMALS)
    }
}

impl PricingEngine {
    pub const fn new(learning_rate: f64, target_weight: f64, decimals: u32) -> Self {
        Self {
            learning_rate,
            target_weight,
            decimals,
        }
    }

    pub const fn learning_rate(&self) -> f64 {
        self.learning_rate
    }

    pub const fn target_weight(&self) -> f64 {
        self.target_weight
    }

    /// Normalized deviation of `selection_count` from the pool average.
    #[allow(clippy::cast_precision_loss)]
    pub fn relative_demand(selection_count: u64, total_selections: u64, asset_count: usize) -> f64 {
        if asset_count == 0 {
            return 0.0;
        }
        let average = total_selections as f64 / asset_count as f64;
        if average > 0.0 {
            (selection_count as f64 - average) / average
        } else {
            0.0
        }
    }

    /// Damped price before rounding.
    ///
    /// Unfused arithmetic: a fused multiply-add moves results that sit on
    /// a rounding tie.
    #[allow(clippy::suboptimal_flops)]
    pub fn damped_price(
        &self,
        prior_price: f64,
        selection_count: u64,
        total_selections: u64,
        asset_count: usize,
    ) -> f64 {
        let demand = Self::relative_demand(selection_count, total_selections, asset_count);
        let target = prior_price * (1.0 + self.learning_rate * demand);
        (1.0 - self.target_weight) * prior_price + self.target_weight * target
    }

    /// New published price for one asset.
    pub fn reprice(
        &self,
        prior_price: f64,
        selection_count: u64,
        total_selections: u64,
        asset_count: usize,
    ) -> f64 {
        round_price(
            self.damped_price(prior_price, selection_count, total_selections, asset_count),
            self.decimals,
        )
    }

    /// Reprice every asset of one pool.
    ///
    /// `prior_prices` and `tally` must describe the same pool; assets
    /// priced but absent from the tally count as zero selections.
    pub fn reprice_pool(
        &self,
        prior_prices: &BTreeMap<AssetId, f64>,
        tally: PoolTally,
    ) -> Vec<RepricedAsset> {
        let total = tally.total();
        let asset_count = prior_prices.len().max(tally.asset_count());

        prior_prices
            .iter()
            .map(|(asset, prior)| {
                let selections = tally.count(asset);
                RepricedAsset {
                    asset: asset.clone(),
                    prior_price: *prior,
                    selections,
                    relative_demand: Self::relative_demand(selections, total, asset_count),
                    new_price: self.reprice(*prior, selections, total, asset_count),
                }
            })
            .collect()
    }
}

/// Round half-to-even at `decimals` places.
///
/// Rounds the exact binary value of `value`, not its shortest decimal
/// rendering: `5.45` is stored just above the tie and rounds to `5.5`.
pub fn round_price(value: f64, decimals: u32) -> f64 {
    Decimal::from_f64_retain(value)
        .map(|d| d.round_dp(decimals))
        .and_then(|d| d.to_f64())
        .unwrap_or(value)
}
