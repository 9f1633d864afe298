//! Configuration Module - TOML-based Settlement Configuration
//!
//! Loads and validates configuration from `config.toml`. Every section
//! has defaults, so a missing file or section runs the game's standard
//! rules. Points tables and pricing constants live here, never in the
//! use cases.

pub mod loader;

use serde::Deserialize;

use crate::domain::pricing::{
  DEFAULT_LEARNING_RATE, DEFAULT_PRICE_DECIMALS, DEFAULT_TARGET_WEIGHT, PricingEngine,
};
use crate::domain::scoring::{
  DEFAULT_CONSTRUCTOR_FACTOR, DEFAULT_DID_NOT_START_PENALTY, DEFAULT_RANK_POINTS,
  DEFAULT_RETIRED_PENALTY, PointsTable,
};

/// Top-level settlement configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
  /// Service identity and run mode.
  pub service: ServiceConfig,
  /// Upstream race-result feed.
  pub feed: FeedConfig,
  /// Points table.
  pub scoring: ScoringConfig,
  /// Demand-driven pricing parameters.
  pub pricing: PricingConfig,
  /// Persistence configuration.
  pub persistence: PersistenceConfig,
}

/// Service identity configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
  /// Human-readable service name.
  pub name: String,
  /// Log level (trace, debug, info, warn, error).
  pub log_level: String,
  /// Compute everything but persist nothing.
  pub dry_run: bool,
}

impl Default for ServiceConfig {
  fn default() -> Self {
    Self {
      name: "f1-settlement".to_string(),
      log_level: default_log_level(),
      dry_run: false,
    }
  }
}

/// Race-result feed configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
  /// Ergast-compatible API root.
  pub base_url: String,
  /// Season path segment (`current` or a year).
  pub season: String,
  /// Upper bound on the feed call, in seconds.
  pub timeout_seconds: u64,
}

impl Default for FeedConfig {
  fn default() -> Self {
    Self {
      base_url: "https://api.jolpi.ca/ergast/f1".to_string(),
      season: "current".to_string(),
      timeout_seconds: default_timeout(),
    }
  }
}

/// Points table configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
  /// Points for ranks 1, 2, 3, ... Ranks past the end score 0.
  pub rank_points: Vec<i32>,
  /// Points for a retirement (negative).
  pub retired_penalty: i32,
  /// Points for a withdrawal / non-start (negative).
  pub did_not_start_penalty: i32,
  /// Scaling applied to a constructor's full-lineup points.
  pub constructor_factor: f64,
}

impl Default for ScoringConfig {
  fn default() -> Self {
    Self {
      rank_points: DEFAULT_RANK_POINTS.to_vec(),
      retired_penalty: DEFAULT_RETIRED_PENALTY,
      did_not_start_penalty: DEFAULT_DID_NOT_START_PENALTY,
      constructor_factor: DEFAULT_CONSTRUCTOR_FACTOR,
    }
  }
}

impl ScoringConfig {
  /// Build the domain points table.
  pub fn points_table(&self) -> PointsTable {
    PointsTable::new(
      self.rank_points.clone(),
      self.retired_penalty,
      self.did_not_start_penalty,
      self.constructor_factor,
    )
  }
}

/// Pricing configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PricingConfig {
  /// Scale of relative demand in the target price.
  pub learning_rate: f64,
  /// Share of the target move applied per round (damping).
  pub target_weight: f64,
  /// Decimal places kept on published prices.
  pub price_decimals: u32,
}

impl Default for PricingConfig {
  fn default() -> Self {
    Self {
      learning_rate: DEFAULT_LEARNING_RATE,
      target_weight: DEFAULT_TARGET_WEIGHT,
      price_decimals: DEFAULT_PRICE_DECIMALS,
    }
  }
}

impl PricingConfig {
  /// Build the domain pricing engine.
  pub const fn engine(&self) -> PricingEngine {
    PricingEngine::new(self.learning_rate, self.target_weight, self.price_decimals)
  }
}

/// Persistence configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PersistenceConfig {
  /// Directory holding calendar, prices, rosters, scores and history.
  pub data_dir: String,
}

impl Default for PersistenceConfig {
  fn default() -> Self {
    Self {
      data_dir: default_data_dir(),
    }
  }
}

// Default value functions for serde

fn default_log_level() -> String {
  "info".to_string()
}

fn default_timeout() -> u64 {
  10
}

fn default_data_dir() -> String {
  "data".to_string()
}
