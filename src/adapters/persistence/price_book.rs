//! Price Book - Current Asset Prices Document
//!
//! Current prices of both pools as one serializable document, shared by
//! the file and in-memory repositories. The file store treats the price
//! history as its commit log and rolls this document forward from it.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::asset::{
    AssetId, AssetPool, AssetPrice, CarNumber, ConstructorKey, PriceHistoryEntry,
};

/// Current price of every driver and constructor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PriceBook {
    #[serde(default)]
    pub drivers: BTreeMap<CarNumber, f64>,
    #[serde(default)]
    pub constructors: BTreeMap<ConstructorKey, f64>,
    /// Number of price-history records reflected in these prices.
    #[serde(default)]
    pub history_applied: usize,
}

impl PriceBook {
    /// Prices of one pool keyed by asset.
    pub fn pool(&self, pool: AssetPool) -> BTreeMap<AssetId, f64> {
        match pool {
            AssetPool::Drivers => self
                .drivers
                .iter()
                .map(|(car, price)| (AssetId::Driver(*car), *price))
                .collect(),
            AssetPool::Constructors => self
                .constructors
                .iter()
                .map(|(key, price)| (AssetId::Constructor(key.clone()), *price))
                .collect(),
        }
    }

    /// Overwrite prices by asset; unknown assets are added.
    pub fn apply(&mut self, prices: &[AssetPrice]) {
        for update in prices {
            self.set(&update.asset, update.price);
        }
    }

    /// Apply the prices of history records past `history_applied`.
    ///
    /// `history` is the full log in recorded order. Returns the number of
    /// records rolled forward.
    pub fn catch_up(&mut self, history: &[PriceHistoryEntry]) -> usize {
        let pending = history.get(self.history_applied..).unwrap_or_default();
        for entry in pending {
            self.set(&entry.asset, entry.price);
        }
        self.history_applied = history.len();
        pending.len()
    }

    fn set(&mut self, asset: &AssetId, price: f64) {
        match asset {
            AssetId::Driver(car) => {
                self.drivers.insert(*car, price);
            }
            AssetId::Constructor(key) => {
                self.constructors.insert(key.clone(), price);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn entry(car: u32, round_id: u32, price: f64) -> PriceHistoryEntry {
        PriceHistoryEntry {
            asset: AssetId::Driver(CarNumber(car)),
            round_id,
            price,
            recorded_at: Utc::now(),
        }
    }

    #[test]
    fn test_catch_up_applies_only_unseen_records() {
        let mut book = PriceBook::default();
        book.drivers.insert(CarNumber(4), 30.0);

        let mut history = vec![entry(4, 1, 30.9)];
        assert_eq!(book.catch_up(&history), 1);
        assert_eq!(book.drivers[&CarNumber(4)], 30.9);

        // Already-applied records are not re-applied over a later price.
        book.drivers.insert(CarNumber(4), 35.0);
        assert_eq!(book.catch_up(&history), 0);
        assert_eq!(book.drivers[&CarNumber(4)], 35.0);

        history.push(entry(4, 2, 31.5));
        assert_eq!(book.catch_up(&history), 1);
        assert_eq!(book.drivers[&CarNumber(4)], 31.5);
        assert_eq!(book.history_applied, 2);
    }

    #[test]
    fn test_json_shape_uses_plain_keys() {
        let mut book = PriceBook::default();
        book.apply(&[
            AssetPrice {
                asset: AssetId::Driver(CarNumber(44)),
                price: 22.5,
            },
            AssetPrice {
                asset: AssetId::Constructor("ferrari".into()),
                price: 30.0,
            },
        ]);

        let json = serde_json::to_value(&book).unwrap();
        assert_eq!(json["drivers"]["44"], 22.5);
        assert_eq!(json["constructors"]["ferrari"], 30.0);

        let back: PriceBook = serde_json::from_value(json).unwrap();
        assert_eq!(back, book);
    }

    #[test]
    fn test_pool_view() {
        let mut book = PriceBook::default();
        book.drivers.insert(CarNumber(1), 30.0);
        book.constructors.insert("red_bull".into(), 28.0);

        let drivers = book.pool(AssetPool::Drivers);
        assert_eq!(drivers.len(), 1);
        assert_eq!(drivers[&AssetId::Driver(CarNumber(1))], 30.0);
        assert_eq!(book.pool(AssetPool::Constructors).len(), 1);
    }
}
